//! Plain-text diagnostic formatting.
//!
//! Rich rendering (colors, source-line excerpts) is the concern of an external
//! renderer; this subsystem only carries enough formatting for logs and tests.

use super::{Subdiagnostic, UnboxedUntaggedDiagnostic};
use std::fmt;
use unicode_width::UnicodeWidthStr;

pub(super) fn format(diagnostic: &UnboxedUntaggedDiagnostic) -> String {
    Formatter { diagnostic }.to_string()
}

struct Formatter<'a> {
    diagnostic: &'a UnboxedUntaggedDiagnostic,
}

impl fmt::Display for Formatter<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let diagnostic = self.diagnostic;

        write!(f, "{}", diagnostic.severity.name())?;

        if let Some(code) = diagnostic.code {
            write!(f, "[{code}]")?;
        }

        if let Some(message) = &diagnostic.message {
            write!(f, ": {message}")?;
        }

        for highlight in &diagnostic.highlights {
            write!(f, "\n --> {:?}", highlight.span)?;

            if let Some(label) = &highlight.label {
                write!(f, ": {label}")?;
            }
        }

        for subdiagnostic in &diagnostic.subdiagnostics {
            format_subdiagnostic(subdiagnostic, f)?;
        }

        Ok(())
    }
}

fn format_subdiagnostic(subdiagnostic: &Subdiagnostic, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let name = subdiagnostic.severity.name();
    // Continuation lines are aligned below the first line of the message.
    let padding = " ".repeat(name.width() + ": ".width());

    for (index, line) in subdiagnostic.message.lines().enumerate() {
        if index == 0 {
            write!(f, "\n{name}: {line}")?;
        } else {
            write!(f, "\n{padding}{line}")?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod test {
    use crate::{Diagnostic, ErrorCode};
    use span::Span;

    #[test]
    fn format_error_with_code_and_highlights() {
        let diagnostic = Diagnostic::error()
            .code(ErrorCode::E005)
            .message("the files ‘a.orni’ and ‘b.orni’ make inconsistent assumptions over ‘Core’")
            .unlabeled_span(Span::new(10, 14))
            .note("imported units must agree on their dependencies");

        assert_eq!(
            diagnostic.format(),
            "error[E005]: the files ‘a.orni’ and ‘b.orni’ make inconsistent assumptions over ‘Core’\n\
              --> 10..14\n\
             note: imported units must agree on their dependencies",
        );
    }

    #[test]
    fn format_multi_line_note_alignment() {
        let diagnostic = Diagnostic::warning().message("head").note("first\nsecond");

        assert_eq!(
            diagnostic.format(),
            "warning: head\nnote: first\n      second",
        );
    }
}
