//! Diagnostic rendering for human-readable terminal output.

use crate::diagnostic::Diagnostic;
use crate::severity::Severity;

/// Trait for rendering diagnostics into formatted output strings.
pub trait DiagnosticRenderer {
    /// Renders a single diagnostic into a formatted string.
    fn render(&self, diag: &Diagnostic) -> String;
}

/// Renders diagnostics in a rustc-style terminal format.
///
/// Produces output like:
/// ```text
/// warning[W301]: 'q' is not assigned on every path of a combinational rule
///   --> top.ctrl::comb_0
///    = note: ...
///    = help: ...
/// ```
pub struct TerminalRenderer {
    /// Whether to use ANSI color codes for the header.
    pub color: bool,
}

impl TerminalRenderer {
    /// Creates a new terminal renderer.
    pub fn new(color: bool) -> Self {
        Self { color }
    }

    fn header(&self, diag: &Diagnostic) -> String {
        let plain = format!("{}[{}]", diag.severity, diag.code);
        if !self.color {
            return plain;
        }
        let color = match diag.severity {
            Severity::Warning => "33",
            Severity::Note => "36",
        };
        format!("\x1b[1;{color}m{plain}\x1b[0m")
    }
}

impl DiagnosticRenderer for TerminalRenderer {
    fn render(&self, diag: &Diagnostic) -> String {
        let mut out = String::new();

        out.push_str(&format!("{}: {}\n", self.header(diag), diag.message));

        if let Some(location) = &diag.location {
            out.push_str(&format!("  --> {location}\n"));
        }

        for note in &diag.notes {
            out.push_str(&format!("   = note: {note}\n"));
        }

        for help in &diag.help {
            out.push_str(&format!("   = help: {help}\n"));
        }

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::code::DiagnosticCode;

    #[test]
    fn render_warning_with_location_and_notes() {
        let diag = Diagnostic::warning(DiagnosticCode::LATCH_HAZARD, "latch inferred for 'q'")
            .at("top.ctrl::comb_0")
            .with_note("'q' keeps its previous value when 'en' is low")
            .with_help("assign 'q' in every branch");

        let output = TerminalRenderer::new(false).render(&diag);

        assert!(output.starts_with("warning[W301]: latch inferred for 'q'\n"));
        assert!(output.contains("  --> top.ctrl::comb_0\n"));
        assert!(output.contains("= note: 'q' keeps its previous value when 'en' is low"));
        assert!(output.contains("= help: assign 'q' in every branch"));
    }

    #[test]
    fn render_without_location() {
        let diag = Diagnostic::note(DiagnosticCode::LOOP_NOT_UNROLLED, "loop kept rolled");
        let output = TerminalRenderer::new(false).render(&diag);
        assert_eq!(output, "note[L401]: loop kept rolled\n");
        assert!(!output.contains("-->"));
    }

    #[test]
    fn render_with_color() {
        let diag = Diagnostic::warning(DiagnosticCode::EMPTY_SEQUENTIAL, "no writes");
        let output = TerminalRenderer::new(true).render(&diag);
        assert!(output.contains("\x1b[1;33mwarning[W302]\x1b[0m"));
    }
}
