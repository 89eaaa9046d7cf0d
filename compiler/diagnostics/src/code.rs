//! Diagnostic codes.

use std::fmt;

/// A code uniquely identifying a class of diagnostics.
#[derive(PartialEq, Eq, Debug, Clone, Copy, PartialOrd, Ord, Hash)]
pub enum Code {
    Error(ErrorCode),
    Lint(LintCode),
}

impl fmt::Display for Code {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Error(code) => code.fmt(f),
            Self::Lint(code) => code.fmt(f),
        }
    }
}

impl From<ErrorCode> for Code {
    fn from(code: ErrorCode) -> Self {
        Self::Error(code)
    }
}

impl From<LintCode> for Code {
    fn from(code: LintCode) -> Self {
        Self::Lint(code)
    }
}

/// An error code.
#[derive(PartialEq, Eq, Debug, Clone, Copy, PartialOrd, Ord, Hash)]
pub enum ErrorCode {
    /// Unbound name in some namespace.
    E001,
    /// Binding is not a module.
    E002,
    /// Illegal binding name (reserved internal marker).
    E003,
    /// Compiled interface declares a different unit name (illegal renaming).
    E004,
    /// Two sources disagree on the identity of an imported unit.
    E005,
    /// Imported unit requires the recursive-types capability.
    E006,
    /// Module alias chain does not reach a concrete module (dangling path).
    E007,
    /// Functor applied to a module not matching its parameter signature.
    E008,
    /// No compiled interface found for a unit name.
    E009,
    /// Module is not a functor but is applied to an argument.
    E010,
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

/// A lint code.
#[derive(PartialEq, Eq, Debug, Clone, Copy, PartialOrd, Ord, Hash)]
pub enum LintCode {
    /// A binding is never used.
    UnusedBinding,
    /// An open shadows an existing binding.
    ShadowedBinding,
}

impl fmt::Display for LintCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnusedBinding => write!(f, "unused-binding"),
            Self::ShadowedBinding => write!(f, "shadowed-binding"),
        }
    }
}
