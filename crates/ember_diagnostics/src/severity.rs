//! How serious a diagnostic is.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Severity of a diagnostic, ordered `Note < Warning`.
///
/// Structural problems that stop simulation or lowering are `Result` errors,
/// so every diagnostic describes a run that continued.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Context about a decision the tools made, such as a loop kept rolled.
    Note,
    /// A likely modeling mistake, such as a latch hazard.
    Warning,
}

impl Severity {
    /// The lowercase name used in rendered headers.
    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Note => "note",
            Severity::Warning => "warning",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn worst_is_max() {
        let worst = [Severity::Note, Severity::Warning, Severity::Note]
            .into_iter()
            .max();
        assert_eq!(worst, Some(Severity::Warning));
    }

    #[test]
    fn serialized_lowercase() {
        assert_eq!(serde_json::to_string(&Severity::Warning).unwrap(), "\"warning\"");
        assert_eq!(Severity::Note.to_string(), "note");
    }
}
