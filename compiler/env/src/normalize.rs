//! Alias-aware path normalization.
//!
//! A module declared as an alias of another path is transparently expanded
//! wherever a canonical path is required. Sub-paths are normalized first; the
//! argument side of a functor application is always normalized in lax mode so
//! an unresolved argument cannot abort normalization of the whole path.

use crate::{EnvError, Environment, Session};
use hir::Path;
use std::collections::HashSet;

pub(crate) fn normalize(
    session: &Session,
    env: &Environment,
    path: &Path,
    lax: bool,
) -> Result<Path, EnvError> {
    let mut seen = HashSet::new();
    normalize_rec(session, env, path, path, lax, &mut seen)
}

fn normalize_rec(
    session: &Session,
    env: &Environment,
    original: &Path,
    path: &Path,
    lax: bool,
    seen: &mut HashSet<Path>,
) -> Result<Path, EnvError> {
    let structural = match path {
        Path::Ident(_) => path.clone(),
        Path::Dot(prefix, member) => {
            normalize_rec(session, env, original, prefix, lax, seen)?.dot(*member)
        }
        Path::Apply(functor, argument) => {
            let functor = normalize_rec(session, env, original, functor, lax, seen)?;
            // An unresolved functor argument must not abort the whole path.
            let argument = normalize_rec(session, env, original, argument, true, seen)?;
            functor.apply(argument)
        }
    };

    expand_alias(session, env, original, structural, lax, seen)
}

fn expand_alias(
    session: &Session,
    env: &Environment,
    original: &Path,
    path: Path,
    lax: bool,
    seen: &mut HashSet<Path>,
) -> Result<Path, EnvError> {
    match env.find_module(session, &path) {
        Ok(decl) => match decl.alias_of() {
            Some(target) => {
                if !seen.insert(path.clone()) {
                    // An alias cycle: terminate with the last resolved path
                    // (lax) or report the chain as dangling (strict).
                    return if lax {
                        Ok(path)
                    } else {
                        Err(EnvError::Dangling {
                            original: original.clone(),
                            furthest: path,
                        })
                    };
                }

                record_required_global(session, &path, target, lax);

                let target = target.clone();
                normalize_rec(session, env, original, &target, lax, seen)
            }
            None => Ok(path),
        },
        Err(error) if error.is_not_found() => {
            if lax {
                Ok(path)
            } else {
                Err(EnvError::Dangling {
                    original: original.clone(),
                    furthest: path,
                })
            }
        }
        Err(error) => Err(error),
    }
}

/// Record the target's root unit as a link-time dependency when an alias
/// crosses into a different persistent unit.
fn record_required_global(session: &Session, source: &Path, target: &Path, lax: bool) {
    if lax || session.config.transparent_modules {
        return;
    }

    let head = target.head();

    if !head.is_persistent() || head.name() == session.current_unit() {
        return;
    }
    // Staying within the same unit is not a crossing.
    if source.head() == head {
        return;
    }

    session.record_required_global(head);
}
