//! The diagnostics system.

use span::{Span, Spanning};
use std::{collections::BTreeSet, ops::Deref};
use utility::Str;

pub use code::{Code, ErrorCode, LintCode};
pub use reporter::Reporter;

mod code;
mod format;

pub mod error;
pub mod reporter;

/// A complex diagnostic message, optionally with source locations.
///
/// The severity is fixed at construction time by [`Self::error`], [`Self::bug`],
/// [`Self::warning`] and [`Self::debug`]; the builder methods never change it.
#[derive(PartialEq, Eq, PartialOrd, Ord)]
#[must_use]
pub struct Diagnostic {
    untagged: UntaggedDiagnostic,
}

impl Diagnostic {
    fn new(severity: Severity) -> Self {
        Self {
            untagged: Box::new(UnboxedUntaggedDiagnostic::new(severity)),
        }
    }

    /// Create a diagnostic for an internal compiler error (ICE).
    pub fn bug() -> Self {
        Self::new(Severity::Bug)
    }

    /// Create a diagnostic for a user error.
    pub fn error() -> Self {
        Self::new(Severity::Error)
    }

    /// Create a diagnostic for a warning.
    pub fn warning() -> Self {
        Self::new(Severity::Warning)
    }

    /// Create a diagnostic for an internal debugging message.
    pub fn debug() -> Self {
        Self::new(Severity::Debug)
    }

    pub fn code(mut self, code: impl Into<Code>) -> Self {
        self.untagged.code = Some(code.into());
        self
    }

    /// Add a text message describing the issue.
    ///
    /// # Strict Guidelines
    ///
    /// * The message should not contain any line breaks
    /// * The message should not start with an upper case letter
    /// * The message should not end in a punctuation mark (like a period)
    /// * Surround source code snippets with (directional) single quotation marks,
    ///   i.e. `‘` (U+2018) to the left and `’` (U+2019) to the right
    /// * The message should be able to stand on its own without the additional
    ///   information provided by labels and subdiagnostics. Exceptions are possible
    pub fn message(mut self, message: impl Into<Str>) -> Self {
        self.untagged.message = Some(message.into());
        self
    }

    fn _span(mut self, spanning: impl Spanning, label: Option<Str>, role: Role) -> Self {
        self.untagged.highlights.insert(Highlight {
            span: spanning.span(),
            label,
            role,
        });
        self
    }

    /// Reference and label a code snippet as one of the focal points of the diagnostic.
    pub fn span(self, spanning: impl Spanning, label: impl Into<Str>) -> Self {
        self._span(spanning, Some(label.into()), Role::Primary)
    }

    /// Reference a code snippet as one of the focal points of the diagnostic.
    pub fn unlabeled_span(self, spanning: impl Spanning) -> Self {
        self._span(spanning, None, Role::Primary)
    }

    /// Reference and label a code snippet as auxiliary information for the diagnostic.
    pub fn label(self, spanning: impl Spanning, label: impl Into<Str>) -> Self {
        self._span(spanning, Some(label.into()), Role::Secondary)
    }

    /// Reference and label several very and equally important code snippets.
    pub fn spans<I>(mut self, spannings: I, label: impl Into<Str>) -> Self
    where
        I: IntoIterator<Item: Spanning>,
    {
        let label = label.into();
        self.untagged
            .highlights
            .extend(spannings.into_iter().map(|spanning| Highlight {
                span: spanning.span(),
                label: Some(label.clone()),
                role: Role::Primary,
            }));
        self
    }

    fn subdiagnostic(mut self, severity: Subseverity, message: Str) -> Self {
        self.untagged
            .subdiagnostics
            .push(Subdiagnostic { severity, message });
        self
    }

    /// Add further clarifying information.
    ///
    /// # Strict Guidelines
    ///
    /// * Same rules as for [`Self::message`] apply
    /// * May span multiple lines
    pub fn note(self, message: impl Into<Str>) -> Self {
        self.subdiagnostic(Subseverity::Note, message.into())
    }

    /// Add steps or tips to solve the diagnosed issue.
    ///
    /// # Strict Guidelines
    ///
    /// * Same rules as for [`Self::message`] apply
    /// * Do not pose a question like `did you mean …?`
    /// * May span multiple lines
    pub fn help(self, message: impl Into<Str>) -> Self {
        self.subdiagnostic(Subseverity::Help, message.into())
    }

    pub fn with(self, builder: impl FnOnce(Self) -> Self) -> Self {
        builder(self)
    }

    /// Report the diagnostic, obtaining a witness to that report.
    pub fn report(self, reporter: &Reporter) -> reporter::ErasedReportedError {
        reporter.report(self.untagged)
    }

    /// Report a diagnostic whose report does not need to be witnessed (warnings, debug output).
    pub fn emit(self, reporter: &Reporter) {
        let _: reporter::ErasedReportedError = reporter.report(self.untagged);
    }
}

impl Deref for Diagnostic {
    type Target = UnboxedUntaggedDiagnostic;

    fn deref(&self) -> &Self::Target {
        &self.untagged
    }
}

pub type UntaggedDiagnostic = Box<UnboxedUntaggedDiagnostic>;

#[derive(PartialEq, Eq, PartialOrd, Ord)]
pub struct UnboxedUntaggedDiagnostic {
    // Highlights come first since they should have the highest priority when ordering.
    // This places diagnostics close to “source order” (with buffered reporters):
    // Diagnostics for locations higher up in the file come first or “above” (in the
    // terminal for example), those lower down in the source also come last in the output.
    pub highlights: BTreeSet<Highlight>,
    pub subdiagnostics: Vec<Subdiagnostic>,
    pub code: Option<Code>,
    pub message: Option<Str>,
    pub severity: Severity,
}

impl UnboxedUntaggedDiagnostic {
    fn new(severity: Severity) -> Self {
        Self {
            highlights: BTreeSet::new(),
            subdiagnostics: Vec::new(),
            code: None,
            message: None,
            severity,
        }
    }

    pub fn format(&self) -> String {
        format::format(self)
    }
}

/// A highlighted code snippet.
#[derive(PartialEq, Eq, Debug, Clone, PartialOrd, Ord)]
pub struct Highlight {
    pub span: Span,
    pub role: Role,
    pub label: Option<Str>,
}

/// The role of a highlighted code snippet — focal point or auxiliary note.
#[derive(PartialEq, Eq, Debug, Clone, Copy, PartialOrd, Ord)]
pub enum Role {
    /// A focal point of the diagnostic.
    Primary,
    /// An auxilary note of the diagnostic.
    Secondary,
}

/// Part of a [complex error message](Diagnostic) providing extra text messages.
#[derive(PartialEq, Eq, Clone, PartialOrd, Ord)]
pub struct Subdiagnostic {
    pub severity: Subseverity,
    pub message: Str,
}

/// Level of severity of a diagnostic.
#[derive(Clone, Copy, PartialEq, Eq, Debug, PartialOrd, Ord)]
pub enum Severity {
    /// An internal compiler error (ICE).
    Bug,
    /// A user error.
    Error,
    Warning,
    Debug,
}

impl Severity {
    const fn name(self) -> &'static str {
        match self {
            Self::Bug => "internal compiler error",
            Self::Error => "error",
            Self::Warning => "warning",
            Self::Debug => "internal debugging message",
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, PartialOrd, Ord)]
pub enum Subseverity {
    /// An auxiliary note.
    Note,
    /// A message containing steps to solve an issue.
    Help,
}

impl Subseverity {
    const fn name(self) -> &'static str {
        match self {
            Self::Note => "note",
            Self::Help => "help",
        }
    }
}
