// Karules Rule Builder
// Assembles one manipulator record per invocation

use indexmap::IndexMap;
use serde::Serialize;
use serde_json::Value;

use crate::action::{normalize_to, Action, ToSpec};
use crate::condition::Condition;
use crate::error::CompileError;
use crate::key::{parse_from, FromKey};

/// Parameter map attached to a manipulator (`basic.*` timing knobs).
pub type Parameters = IndexMap<String, Value>;

/// From-side input accepted by the rule builder.
#[derive(Debug, Clone, PartialEq)]
pub enum FromSpec {
    /// Compact expression string, e.g. `"caps_lock -any"`.
    Expr(String),
    /// Already-structured descriptor, emitted as authored.
    Raw(Value),
}

impl From<&str> for FromSpec {
    fn from(expr: &str) -> Self {
        FromSpec::Expr(expr.to_string())
    }
}

impl From<String> for FromSpec {
    fn from(expr: String) -> Self {
        FromSpec::Expr(expr)
    }
}

impl From<Value> for FromSpec {
    fn from(fragment: Value) -> Self {
        FromSpec::Raw(fragment)
    }
}

/// From-side of a manipulator after normalization.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FromField {
    Key(FromKey),
    Raw(Value),
}

/// Delayed-action payload.
///
/// Sub-actions are attached as authored; callers produce them with the
/// mode/action helpers beforehand. The builder does not normalize them.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DelayedAction {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to_if_invoked: Option<Action>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to_if_canceled: Option<Action>,
}

impl DelayedAction {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn if_invoked(mut self, action: Action) -> Self {
        self.to_if_invoked = Some(action);
        self
    }

    pub fn if_canceled(mut self, action: Action) -> Self {
        self.to_if_canceled = Some(action);
        self
    }
}

/// Manipulator type tag. Karabiner only defines `basic` here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ManipulatorKind {
    Basic,
}

/// One remapping rule: a from-expression plus to-side action variants and
/// optional conditions/parameters. Absent fields are omitted entirely from
/// the serialized record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Manipulator {
    #[serde(rename = "type")]
    pub kind: ManipulatorKind,
    pub from: FromField,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to: Option<Action>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to_if_alone: Option<Action>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to_if_held_down: Option<Action>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to_delayed_action: Option<DelayedAction>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to_after_key_up: Option<Action>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conditions: Option<Vec<Condition>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parameters: Option<Parameters>,
}

/// Optional fields of a rule, builder-style.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RuleOptions {
    pub to: Option<ToSpec>,
    pub to_if_alone: Option<ToSpec>,
    pub to_if_held_down: Option<ToSpec>,
    pub to_after_key_up: Option<ToSpec>,
    pub to_delayed_action: Option<DelayedAction>,
    pub conditions: Option<Vec<Condition>>,
    pub parameters: Option<Parameters>,
}

impl RuleOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn to(mut self, to: impl Into<ToSpec>) -> Self {
        self.to = Some(to.into());
        self
    }

    pub fn to_if_alone(mut self, to: impl Into<ToSpec>) -> Self {
        self.to_if_alone = Some(to.into());
        self
    }

    pub fn to_if_held_down(mut self, to: impl Into<ToSpec>) -> Self {
        self.to_if_held_down = Some(to.into());
        self
    }

    pub fn to_after_key_up(mut self, to: impl Into<ToSpec>) -> Self {
        self.to_after_key_up = Some(to.into());
        self
    }

    pub fn to_delayed_action(mut self, delayed: DelayedAction) -> Self {
        self.to_delayed_action = Some(delayed);
        self
    }

    /// Append one explicit condition.
    pub fn condition(mut self, condition: Condition) -> Self {
        self.conditions.get_or_insert_with(Vec::new).push(condition);
        self
    }

    /// Replace the explicit condition list.
    pub fn conditions(mut self, conditions: impl IntoIterator<Item = Condition>) -> Self {
        self.conditions = Some(conditions.into_iter().collect());
        self
    }

    /// Insert one explicit parameter.
    pub fn parameter(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.parameters
            .get_or_insert_with(Parameters::new)
            .insert(name.into(), value.into());
        self
    }

    /// Replace the explicit parameter map.
    pub fn parameters(mut self, parameters: Parameters) -> Self {
        self.parameters = Some(parameters);
        self
    }
}

/// Build one manipulator. Explicit `conditions`/`parameters` always win over
/// the ambient defaults; there is no merge of both.
pub(crate) fn build_rule(
    from: FromSpec,
    options: RuleOptions,
    ambient_conditions: Option<&[Condition]>,
    ambient_parameters: Option<&Parameters>,
) -> Result<Manipulator, CompileError> {
    let conditions = options
        .conditions
        .or_else(|| ambient_conditions.map(|c| c.to_vec()));
    let parameters = options.parameters.or_else(|| ambient_parameters.cloned());

    let from = match from {
        FromSpec::Expr(expr) => FromField::Key(parse_from(&expr)?),
        FromSpec::Raw(fragment) => FromField::Raw(fragment),
    };

    Ok(Manipulator {
        kind: ManipulatorKind::Basic,
        from,
        to: options.to.map(normalize_to).transpose()?,
        to_if_alone: options.to_if_alone.map(normalize_to).transpose()?,
        to_if_held_down: options.to_if_held_down.map(normalize_to).transpose()?,
        to_delayed_action: options.to_delayed_action,
        to_after_key_up: options.to_after_key_up.map(normalize_to).transpose()?,
        conditions,
        parameters,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_minimal_rule_omits_absent_fields() {
        let rule = build_rule("caps_lock -any".into(), RuleOptions::new().to("left_control"), None, None)
            .unwrap();
        assert_eq!(
            serde_json::to_value(&rule).unwrap(),
            json!({
                "type": "basic",
                "from": {"key_code": "caps_lock", "modifiers": {"optional": ["any"]}},
                "to": {"key_code": "left_control"}
            })
        );
    }

    #[test]
    fn test_from_raw_passthrough() {
        let fragment = json!({"key_code": "a", "modifiers": {"mandatory": ["control"]}});
        let rule =
            build_rule(FromSpec::Raw(fragment.clone()), RuleOptions::new(), None, None).unwrap();
        assert_eq!(
            serde_json::to_value(&rule).unwrap(),
            json!({"type": "basic", "from": fragment})
        );
    }

    #[test]
    fn test_explicit_conditions_win_over_ambient() {
        let ambient = vec![Condition::variable_if("ambient", true)];
        let explicit = Condition::variable_unless("explicit", true);
        let rule = build_rule(
            "a".into(),
            RuleOptions::new().condition(explicit.clone()),
            Some(&ambient),
            None,
        )
        .unwrap();
        assert_eq!(rule.conditions, Some(vec![explicit]));
    }

    #[test]
    fn test_ambient_conditions_used_when_no_explicit() {
        let ambient = vec![Condition::variable_if("ambient", true)];
        let rule = build_rule("a".into(), RuleOptions::new(), Some(&ambient), None).unwrap();
        assert_eq!(rule.conditions, Some(ambient));
    }

    #[test]
    fn test_explicit_parameters_win_over_ambient() {
        let mut ambient = Parameters::new();
        ambient.insert("basic.to_if_alone_timeout_milliseconds".to_string(), json!(500));
        let rule = build_rule(
            "a".into(),
            RuleOptions::new().parameter("basic.to_delayed_action_delay_milliseconds", 300),
            None,
            Some(&ambient),
        )
        .unwrap();
        let parameters = rule.parameters.unwrap();
        assert_eq!(parameters.len(), 1);
        assert_eq!(
            parameters["basic.to_delayed_action_delay_milliseconds"],
            json!(300)
        );
    }

    #[test]
    fn test_delayed_action_attached_as_authored() {
        let delayed = DelayedAction::new()
            .if_invoked(Action::set_variable("mode", true))
            .if_canceled(Action::Raw(json!({"key_code": "d"})));
        let rule = build_rule(
            "d".into(),
            RuleOptions::new().to_delayed_action(delayed),
            None,
            None,
        )
        .unwrap();
        assert_eq!(
            serde_json::to_value(&rule).unwrap()["to_delayed_action"],
            json!({
                "to_if_invoked": {"set_variable": {"name": "mode", "value": true}},
                "to_if_canceled": {"key_code": "d"}
            })
        );
    }

    #[test]
    fn test_parse_error_aborts_rule() {
        let result = build_rule("a".into(), RuleOptions::new().to("b ~x"), None, None);
        assert!(matches!(result, Err(CompileError::UnknownModifier { .. })));
    }
}
