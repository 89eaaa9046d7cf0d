//! Error handling mechanisms.

use crate::reporter::ErasedReportedError;

pub type Result<T = (), E = ErasedReportedError> = std::result::Result<T, E>;

/// The accumulated healthiness of a larger operation.
///
/// Unlike a plain [`Result`], a tainted health does not abort the surrounding
/// computation: it records that *some* error was reported while the work
/// continues, so several independent errors can surface in one run.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
#[must_use]
pub enum Health {
    #[default]
    Untainted,
    Tainted(ErasedReportedError),
}

impl Health {
    pub fn taint(&mut self, error: ErasedReportedError) {
        if *self == Self::Untainted {
            *self = Self::Tainted(error);
        }
    }
}

impl From<Health> for Result {
    fn from(health: Health) -> Self {
        match health {
            Health::Untainted => Ok(()),
            Health::Tainted(error) => Err(error),
        }
    }
}

#[cfg(test)]
mod test {
    use super::{Health, Result};
    use crate::reporter::ErasedReportedError;

    #[test]
    fn the_first_taint_sticks() {
        let mut health = Health::default();
        assert_eq!(health, Health::Untainted);

        health.taint(ErasedReportedError::new_unchecked());
        health.taint(ErasedReportedError::new_unchecked());

        assert!(matches!(health, Health::Tainted(_)));
        assert!(Result::from(health).is_err());
    }
}
