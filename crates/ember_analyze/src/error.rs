//! Errors raised while analyzing rule bodies and building the dependency graph.

use ember_ir::ElabError;

/// Fatal problems found by the usage analyzer or the dependency builder.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AnalyzeError {
    /// The design's topology is malformed.
    #[error(transparent)]
    Elab(#[from] ElabError),

    /// A rule body uses a construct outside the supported subset.
    #[error("unsupported construct in rule '{rule}': {construct}")]
    UnsupportedConstruct {
        /// Path of the rule.
        rule: String,
        /// Description of the offending construct.
        construct: String,
    },

    /// A bit width cannot be determined statically.
    #[error("ambiguous width in rule '{rule}': {detail}")]
    AmbiguousWidth {
        /// Path of the rule.
        rule: String,
        /// What could not be sized.
        detail: String,
    },

    /// Combinational rules depend on each other in a loop.
    #[error("combinational cycle: {}", cycle.join(" -> "))]
    CombinationalCycle {
        /// Rule paths along the cycle; the first rule is repeated at the end.
        cycle: Vec<String>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_cycle() {
        let err = AnalyzeError::CombinationalCycle {
            cycle: vec!["top::a".into(), "top::b".into(), "top::a".into()],
        };
        assert_eq!(format!("{err}"), "combinational cycle: top::a -> top::b -> top::a");
    }

    #[test]
    fn display_unsupported() {
        let err = AnalyzeError::UnsupportedConstruct {
            rule: "top::tick".into(),
            construct: "while loop".into(),
        };
        assert_eq!(
            format!("{err}"),
            "unsupported construct in rule 'top::tick': while loop"
        );
    }

    #[test]
    fn elab_is_transparent() {
        let err: AnalyzeError = ElabError::ZeroWidth {
            signal: "top.w".into(),
        }
        .into();
        assert_eq!(format!("{err}"), "signal 'top.w' has zero width");
    }
}
