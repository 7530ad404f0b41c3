// Karules Key Expressions
// Parses compact strings like "a +control -shift" into from/to key descriptors

use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;

use crate::error::CompileError;

/// The key reference at the head of an expression.
///
/// Serializes as a single-entry object: `{"key_code": "a"}`, or
/// `{"pointing_button": "button5"}` when the first token carried a
/// `class:value` separator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyRef {
    KeyCode(String),
    Event { class: String, value: String },
}

impl Serialize for KeyRef {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(1))?;
        match self {
            KeyRef::KeyCode(code) => map.serialize_entry("key_code", code)?,
            KeyRef::Event { class, value } => map.serialize_entry(class, value)?,
        }
        map.end()
    }
}

/// Mandatory/optional modifier partition of a from-side expression.
///
/// Mandatory modifiers must be held for the rule to match; optional ones may
/// or may not be. The distinction exists only on the from side.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FromModifiers {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub mandatory: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub optional: Vec<String>,
}

/// Parsed from-side key expression.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FromKey {
    #[serde(flatten)]
    pub key: KeyRef,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modifiers: Option<FromModifiers>,
}

/// Parsed to-side key expression: flat modifier list plus an optional lazy
/// flag (`"right_option lazy"`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToKey {
    #[serde(flatten)]
    pub key: KeyRef,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub modifiers: Vec<String>,
    #[serde(skip_serializing_if = "is_false")]
    pub lazy: bool,
}

fn is_false(value: &bool) -> bool {
    !*value
}

fn key_ref(token: &str) -> KeyRef {
    match token.split_once(':') {
        Some((class, value)) => KeyRef::Event {
            class: class.to_string(),
            value: value.to_string(),
        },
        None => KeyRef::KeyCode(token.to_string()),
    }
}

/// Parse a from-side expression like `"a +control -shift"`.
///
/// `+name` is a mandatory modifier, `-name` an optional one. Modifier names
/// are passed through structurally (`any` included), not validated against
/// Karabiner's master list.
pub fn parse_from(expr: &str) -> Result<FromKey, CompileError> {
    let mut tokens = expr.split_whitespace();
    let head = tokens.next().ok_or(CompileError::EmptyExpression)?;

    let mut modifiers: Option<FromModifiers> = None;
    for token in tokens {
        let mods = modifiers.get_or_insert_with(FromModifiers::default);
        if let Some(name) = token.strip_prefix('+') {
            mods.mandatory.push(name.to_string());
        } else if let Some(name) = token.strip_prefix('-') {
            mods.optional.push(name.to_string());
        } else {
            return Err(CompileError::unknown_modifier(token, expr));
        }
    }

    Ok(FromKey {
        key: key_ref(head),
        modifiers,
    })
}

/// Parse a to-side expression like `"f6 +shift"` or `"right_option lazy"`.
///
/// Only `+name` modifiers are legal here; the unsigned `lazy` token sets the
/// lazy flag instead of adding a modifier.
pub fn parse_to(expr: &str) -> Result<ToKey, CompileError> {
    let mut tokens = expr.split_whitespace();
    let head = tokens.next().ok_or(CompileError::EmptyExpression)?;

    let mut result = ToKey {
        key: key_ref(head),
        modifiers: Vec::new(),
        lazy: false,
    };
    for token in tokens {
        if token == "lazy" {
            result.lazy = true;
        } else if let Some(name) = token.strip_prefix('+') {
            result.modifiers.push(name.to_string());
        } else {
            return Err(CompileError::unknown_modifier(token, expr));
        }
    }

    Ok(result)
}
