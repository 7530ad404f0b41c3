// Karules Error Types
// Compile-stage failures shared across the DSL modules

use thiserror::Error;

/// Errors raised while compiling a rule set.
///
/// Every variant aborts the whole compile: a malformed rule set must never
/// partially overwrite the target configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompileError {
    /// A modifier token with no recognized sign and no special form.
    #[error("unknown modifier '{token}' in expression '{expr}'")]
    UnknownModifier { token: String, expr: String },

    /// A symbolic app name with no registered bundle-identifier pattern.
    #[error("unknown app: '{0}'")]
    UnknownApp(String),

    /// Key expression with no tokens.
    #[error("key expression cannot be empty")]
    EmptyExpression,

    /// DSL misuse, e.g. a mode helper invoked with no resolvable mode name.
    #[error("{0}")]
    Usage(String),
}

impl CompileError {
    pub(crate) fn unknown_modifier(token: &str, expr: &str) -> Self {
        CompileError::UnknownModifier {
            token: token.to_string(),
            expr: expr.to_string(),
        }
    }
}
