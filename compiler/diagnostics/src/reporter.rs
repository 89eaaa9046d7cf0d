//! The diagnostic reporter.

use super::{Severity, UntaggedDiagnostic};
use std::{
    collections::BTreeSet,
    mem,
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, Ordering},
    },
};
use utility::pluralize;

/// A diagnostic reporter.
pub struct Reporter {
    kind: ReporterKind,
}

impl Reporter {
    fn new(kind: ReporterKind) -> Self {
        Self { kind }
    }

    pub fn silent() -> Self {
        Self::new(ReporterKind::Silent)
    }

    pub fn buffer(diagnostics: Buffer) -> Self {
        Self::new(ReporterKind::Buffer(diagnostics))
    }

    pub fn stderr() -> Self {
        Self::new(ReporterKind::Stderr)
    }

    pub fn buffered_stderr(reported_any_errors: Arc<AtomicBool>) -> Self {
        Self::new(ReporterKind::BufferedStderr(StderrBuffer {
            errors: Mutex::default(),
            warnings: Mutex::default(),
            reported_any_errors,
        }))
    }

    pub(super) fn report(&self, diagnostic: UntaggedDiagnostic) -> ErasedReportedError {
        match &self.kind {
            ReporterKind::Silent => {}
            ReporterKind::Buffer(diagnostics) => {
                diagnostics.lock().unwrap().insert(diagnostic);
            }
            ReporterKind::Stderr => stderr_print(&diagnostic.format()),
            ReporterKind::BufferedStderr(buffer) => match diagnostic.severity {
                Severity::Bug | Severity::Error => {
                    buffer.errors.lock().unwrap().insert(diagnostic);
                }
                Severity::Warning => {
                    buffer.warnings.lock().unwrap().insert(diagnostic);
                }
                Severity::Debug => stderr_print(&diagnostic.format()),
            },
        }

        ErasedReportedError::new()
    }
}

impl Drop for Reporter {
    fn drop(&mut self) {
        if let ReporterKind::BufferedStderr(buffer) = &self.kind {
            buffer.report();
        }
    }
}

enum ReporterKind {
    Silent,
    Buffer(Buffer),
    Stderr,
    BufferedStderr(StderrBuffer),
}

pub type Buffer = Arc<Mutex<BTreeSet<UntaggedDiagnostic>>>;

struct StderrBuffer {
    errors: Mutex<BTreeSet<UntaggedDiagnostic>>,
    warnings: Mutex<BTreeSet<UntaggedDiagnostic>>,
    reported_any_errors: Arc<AtomicBool>,
}

impl StderrBuffer {
    fn report(&self) {
        let warnings = mem::take(&mut *self.warnings.lock().unwrap());

        for warning in &warnings {
            stderr_print(&warning.format());
        }

        if !warnings.is_empty() {
            Self::report_warning_summary(&warnings);
        }

        let errors = mem::take(&mut *self.errors.lock().unwrap());

        for error in &errors {
            stderr_print(&error.format());
        }

        if !errors.is_empty() {
            self.reported_any_errors.store(true, Ordering::SeqCst);
            Self::report_error_summary(&errors);
        }
    }

    fn report_error_summary(errors: &BTreeSet<UntaggedDiagnostic>) {
        let summary = super::Diagnostic::error()
            .message(pluralize!(
                errors.len(),
                "aborting due to previous error",
                format!("aborting due to {} previous errors", errors.len()),
            ))
            .untagged
            .format();

        stderr_print(&summary);
    }

    fn report_warning_summary(warnings: &BTreeSet<UntaggedDiagnostic>) {
        let summary = super::Diagnostic::warning()
            .message(format!(
                "emitted {} {}",
                warnings.len(),
                pluralize!(warnings.len(), "warning")
            ))
            .untagged
            .format();

        stderr_print(&summary);
    }
}

fn stderr_print(message: &impl std::fmt::Display) {
    eprintln!("{message}");
    eprintln!();
}

/// A witness to / token for a [reported](super::Diagnostic::report) error.
///
/// A value of this type is a proof that an error was reported (neglecting buffering).
/// Using this as an error type instead of let's say `()` makes it a bit harder to
/// accidentally / thoughtlessly return an error without reporting anything
/// (which would lead to an internal compiler error in the driver) since such a witness
/// can only be constructed by [`super::Diagnostic::report`] or by [`Self::new_unchecked`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ErasedReportedError(());

impl ErasedReportedError {
    const fn new() -> Self {
        Self(())
    }

    pub const fn new_unchecked() -> Self {
        Self::new()
    }
}
