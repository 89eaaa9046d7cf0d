//! The seed signature: the built-in types and values every compilation unit
//! starts from.

use hir::{
    CtorDef, Ident, Path, SigItem, Signature, TypeDecl, TypeExpr, ValueDescr,
};
use std::rc::Rc;
use utility::Atom;

fn constr(ident: Ident, arguments: Vec<TypeExpr>) -> TypeExpr {
    TypeExpr::Constr(Path::Ident(ident), arguments)
}

fn var(name: &str) -> TypeExpr {
    TypeExpr::Var(Atom::from(name))
}

/// The built-in declarations, in dependency order.
///
/// The unsafe variant additionally exposes in-place string mutation.
pub(crate) fn signature(unsafe_string: bool) -> Signature {
    let int = Ident::fresh(Atom::INT);
    let char_ = Ident::fresh(Atom::CHAR);
    let string = Ident::fresh(Atom::STRING);
    let float = Ident::fresh(Atom::FLOAT);
    let bool_ = Ident::fresh(Atom::BOOL);
    let unit = Ident::fresh(Atom::UNIT);
    let exn = Ident::fresh(Atom::EXN);
    let array = Ident::fresh(Atom::ARRAY);
    let list = Ident::fresh(Atom::LIST);
    let option = Ident::fresh(Atom::OPTION);

    let int_ty = || constr(int, Vec::new());
    let char_ty = || constr(char_, Vec::new());
    let string_ty = || constr(string, Vec::new());
    let unit_ty = || constr(unit, Vec::new());

    let mut items = vec![
        SigItem::Type(int, Rc::new(TypeDecl::abstract_(Vec::new()))),
        SigItem::Type(char_, Rc::new(TypeDecl::abstract_(Vec::new()))),
        SigItem::Type(string, Rc::new(TypeDecl::abstract_(Vec::new()))),
        SigItem::Type(float, Rc::new(TypeDecl::abstract_(Vec::new()))),
        SigItem::Type(
            bool_,
            Rc::new(TypeDecl::variant(
                Vec::new(),
                vec![
                    CtorDef {
                        name: Atom::FALSE,
                        args: Vec::new(),
                    },
                    CtorDef {
                        name: Atom::TRUE,
                        args: Vec::new(),
                    },
                ],
            )),
        ),
        SigItem::Type(
            unit,
            Rc::new(TypeDecl::variant(
                Vec::new(),
                vec![CtorDef {
                    name: Atom::from("()"),
                    args: Vec::new(),
                }],
            )),
        ),
        SigItem::Type(exn, Rc::new(TypeDecl::abstract_(Vec::new()))),
        SigItem::Type(
            array,
            Rc::new(TypeDecl::abstract_(vec![Atom::from("a")])),
        ),
        SigItem::Type(
            list,
            Rc::new(TypeDecl::variant(
                vec![Atom::from("a")],
                vec![
                    CtorDef {
                        name: Atom::NIL,
                        args: Vec::new(),
                    },
                    CtorDef {
                        name: Atom::CONS,
                        args: vec![var("a"), constr(list, vec![var("a")])],
                    },
                ],
            )),
        ),
        SigItem::Type(
            option,
            Rc::new(TypeDecl::variant(
                vec![Atom::from("a")],
                vec![
                    CtorDef {
                        name: Atom::NONE,
                        args: Vec::new(),
                    },
                    CtorDef {
                        name: Atom::SOME,
                        args: vec![var("a")],
                    },
                ],
            )),
        ),
        SigItem::Value(
            Ident::fresh(Atom::from("raise")),
            Rc::new(ValueDescr::primitive(
                TypeExpr::arrow(constr(exn, Vec::new()), var("a")),
                Atom::from("%raise"),
                1,
            )),
        ),
        SigItem::Value(
            Ident::fresh(Atom::from("string_length")),
            Rc::new(ValueDescr::primitive(
                TypeExpr::arrow(string_ty(), int_ty()),
                Atom::from("%string_length"),
                1,
            )),
        ),
        SigItem::Value(
            Ident::fresh(Atom::from("string_get")),
            Rc::new(ValueDescr::primitive(
                TypeExpr::arrow(string_ty(), TypeExpr::arrow(int_ty(), char_ty())),
                Atom::from("%string_get"),
                2,
            )),
        ),
    ];

    if unsafe_string {
        items.push(SigItem::Value(
            Ident::fresh(Atom::from("string_set")),
            Rc::new(ValueDescr::primitive(
                TypeExpr::arrow(
                    string_ty(),
                    TypeExpr::arrow(int_ty(), TypeExpr::arrow(char_ty(), unit_ty())),
                ),
                Atom::from("%string_set"),
                3,
            )),
        ));
    }

    items
}
