// Karules Action Normalizer
// Converts heterogeneous to-side inputs into the document's action schema

use serde::Serialize;
use serde_json::Value;

use crate::error::CompileError;
use crate::key::{parse_to, ToKey};

/// Variable assignment payload of a `set_variable` action.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VariableAssignment {
    pub name: String,
    pub value: Value,
}

/// A normalized to-side action, ready for serialization.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Action {
    /// A key press descriptor parsed from an expression string.
    Key(ToKey),
    /// A shell command (the `!` shorthand).
    Shell { shell_command: String },
    /// A mode/variable assignment.
    SetVariable { set_variable: VariableAssignment },
    /// Opaque document fragment emitted as authored
    /// (`mouse_key`, `software_function`, ...).
    Raw(Value),
    /// Ordered action sequence; order is playback order.
    Seq(Vec<Action>),
}

impl Action {
    /// `set_variable` action assigning `value` to the named variable.
    pub fn set_variable(name: impl Into<String>, value: impl Into<Value>) -> Self {
        Action::SetVariable {
            set_variable: VariableAssignment {
                name: name.into(),
                value: value.into(),
            },
        }
    }

    /// `shell_command` action running `command`.
    pub fn shell(command: impl Into<String>) -> Self {
        Action::Shell {
            shell_command: command.into(),
        }
    }
}

/// To-side input accepted by the rule builder before normalization.
///
/// The input shape is resolved once here rather than by runtime type
/// inspection scattered through the pipeline.
#[derive(Debug, Clone, PartialEq)]
pub enum ToSpec {
    /// Compact expression string, e.g. `"f6 +shift"` or `"!open -a 'Finder'"`.
    Expr(String),
    /// An action that needs no further normalization.
    Action(Action),
    /// Opaque document fragment passed through unchanged.
    Raw(Value),
    /// Ordered list, normalized element-wise.
    Seq(Vec<ToSpec>),
}

impl From<&str> for ToSpec {
    fn from(expr: &str) -> Self {
        ToSpec::Expr(expr.to_string())
    }
}

impl From<String> for ToSpec {
    fn from(expr: String) -> Self {
        ToSpec::Expr(expr)
    }
}

impl From<Action> for ToSpec {
    fn from(action: Action) -> Self {
        ToSpec::Action(action)
    }
}

impl From<Value> for ToSpec {
    fn from(fragment: Value) -> Self {
        ToSpec::Raw(fragment)
    }
}

impl<T: Into<ToSpec>> From<Vec<T>> for ToSpec {
    fn from(items: Vec<T>) -> Self {
        ToSpec::Seq(items.into_iter().map(Into::into).collect())
    }
}

/// Normalize a to-side specification into its action.
///
/// A leading `!` on a string always produces a shell command, never a hotkey
/// description. Structured inputs pass through unchanged.
pub fn normalize_to(spec: ToSpec) -> Result<Action, CompileError> {
    match spec {
        ToSpec::Expr(expr) => {
            if let Some(command) = expr.strip_prefix('!') {
                Ok(Action::shell(command))
            } else {
                Ok(Action::Key(parse_to(&expr)?))
            }
        }
        ToSpec::Action(action) => Ok(action),
        ToSpec::Raw(fragment) => Ok(Action::Raw(fragment)),
        ToSpec::Seq(items) => {
            let actions = items
                .into_iter()
                .map(normalize_to)
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Action::Seq(actions))
        }
    }
}
