// Karules Group and Scope Builders
// Named rule groups with stackable ambient mode/condition/parameter state

use indexmap::IndexMap;
use serde::Serialize;
use serde_json::Value;

use crate::action::Action;
use crate::condition::Condition;
use crate::error::CompileError;
use crate::rule::{build_rule, FromSpec, Manipulator, Parameters, RuleOptions};

/// Registered app-name table: symbolic name to bundle-identifier patterns.
pub type AppRegistry = IndexMap<String, Vec<String>>;

/// Bundle-identifier pattern list accepted by [`Ruleset::app`]. A single
/// pattern wraps into a one-element list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundlePatterns(pub Vec<String>);

impl From<&str> for BundlePatterns {
    fn from(pattern: &str) -> Self {
        BundlePatterns(vec![pattern.to_string()])
    }
}

impl From<String> for BundlePatterns {
    fn from(pattern: String) -> Self {
        BundlePatterns(vec![pattern])
    }
}

impl From<Vec<String>> for BundlePatterns {
    fn from(patterns: Vec<String>) -> Self {
        BundlePatterns(patterns)
    }
}

impl From<Vec<&str>> for BundlePatterns {
    fn from(patterns: Vec<&str>) -> Self {
        BundlePatterns(patterns.into_iter().map(str::to_string).collect())
    }
}

/// Ambient defaults in effect for rules built inside a scope.
///
/// Entering a scoped block derives a child context; the parent value is put
/// back when the block returns, normally or with an error.
#[derive(Debug, Clone, Default)]
struct ScopeContext {
    default_mode: Option<String>,
    conditions: Option<Vec<Condition>>,
    parameters: Option<Parameters>,
}

/// One named, independently enable/disable-able bundle of manipulators.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Group {
    pub description: String,
    pub manipulators: Vec<Manipulator>,
    /// Present only when the group is disabled; an enabled group carries no
    /// `enabled` key at all.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
}

/// Group construction options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupOptions {
    /// Skip the body entirely and emit nothing.
    pub skip: bool,
    /// Emit `enabled: false` when set to false.
    pub enabled: bool,
}

impl Default for GroupOptions {
    fn default() -> Self {
        Self {
            skip: false,
            enabled: true,
        }
    }
}

impl GroupOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn skip(mut self, skip: bool) -> Self {
        self.skip = skip;
        self
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }
}

/// Top-level rule set builder.
///
/// Register app patterns first, then declare groups in output order; rules
/// can only be built inside a group body.
#[derive(Debug, Default)]
pub struct Ruleset {
    apps: AppRegistry,
    groups: Vec<Group>,
}

impl Ruleset {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a symbolic app name for `app_if`/`app_unless`.
    pub fn app(&mut self, name: impl Into<String>, patterns: impl Into<BundlePatterns>) {
        self.apps.insert(name.into(), patterns.into().0);
    }

    /// Declare a group with default options.
    pub fn group<F>(&mut self, description: impl Into<String>, body: F) -> Result<(), CompileError>
    where
        F: FnOnce(&mut GroupScope<'_>) -> Result<(), CompileError>,
    {
        self.group_with(description, GroupOptions::default(), body)
    }

    /// Declare a group. The body runs with a fresh manipulator collector and
    /// empty ambient scope state; groups do not nest.
    pub fn group_with<F>(
        &mut self,
        description: impl Into<String>,
        options: GroupOptions,
        body: F,
    ) -> Result<(), CompileError>
    where
        F: FnOnce(&mut GroupScope<'_>) -> Result<(), CompileError>,
    {
        let description = description.into();
        if options.skip {
            log::debug!("skipping group '{}'", description);
            return Ok(());
        }

        let mut scope = GroupScope {
            apps: &self.apps,
            manipulators: Vec::new(),
            ctx: ScopeContext::default(),
        };
        body(&mut scope)?;
        let GroupScope { manipulators, .. } = scope;

        log::debug!(
            "group '{}' built with {} manipulator(s)",
            description,
            manipulators.len()
        );
        self.groups.push(Group {
            description,
            manipulators,
            enabled: if options.enabled { None } else { Some(false) },
        });
        Ok(())
    }

    /// Groups in declaration order.
    pub fn groups(&self) -> &[Group] {
        &self.groups
    }
}

/// Open group collector plus the ambient scope helpers.
///
/// Only [`Ruleset::group`] creates one, so a rule built outside an open group
/// is unrepresentable.
pub struct GroupScope<'a> {
    apps: &'a AppRegistry,
    manipulators: Vec<Manipulator>,
    ctx: ScopeContext,
}

impl GroupScope<'_> {
    /// Build a `from -> to` rule with default options and append it to the
    /// group.
    pub fn rule(
        &mut self,
        from: impl Into<FromSpec>,
        to: impl Into<crate::action::ToSpec>,
    ) -> Result<(), CompileError> {
        self.rule_with(from, RuleOptions::new().to(to))
    }

    /// Build a rule with explicit options. Ambient conditions/parameters fill
    /// in where the options leave them unset.
    pub fn rule_with(
        &mut self,
        from: impl Into<FromSpec>,
        options: RuleOptions,
    ) -> Result<(), CompileError> {
        let manipulator = build_rule(
            from.into(),
            options,
            self.ctx.conditions.as_deref(),
            self.ctx.parameters.as_ref(),
        )?;
        self.manipulators.push(manipulator);
        Ok(())
    }

    /// Set the default mode name used by the mode helpers in this group.
    pub fn default_mode(&mut self, name: impl Into<String>) {
        self.ctx.default_mode = Some(name.into());
    }

    fn resolve_mode(&self, name: Option<&str>) -> Result<String, CompileError> {
        match name {
            Some(name) => Ok(name.to_string()),
            None => self.ctx.default_mode.clone().ok_or_else(|| {
                CompileError::Usage(
                    "mode helper called without a name and no default_mode in scope".to_string(),
                )
            }),
        }
    }

    /// `set_variable` action turning the mode on. `None` resolves to the
    /// group's default mode.
    pub fn mode_on(&self, name: Option<&str>) -> Result<Action, CompileError> {
        Ok(Action::set_variable(self.resolve_mode(name)?, true))
    }

    /// `set_variable` action turning the mode off.
    pub fn mode_off(&self, name: Option<&str>) -> Result<Action, CompileError> {
        Ok(Action::set_variable(self.resolve_mode(name)?, false))
    }

    /// Bare `variable_if` condition testing the mode.
    pub fn mode_if(&self, name: Option<&str>) -> Result<Condition, CompileError> {
        Ok(Condition::variable_if(self.resolve_mode(name)?, true))
    }

    /// Bare `variable_unless` condition testing the mode.
    pub fn mode_unless(&self, name: Option<&str>) -> Result<Condition, CompileError> {
        Ok(Condition::variable_unless(self.resolve_mode(name)?, true))
    }

    fn resolve_app(&self, name: &str) -> Result<Vec<String>, CompileError> {
        self.apps
            .get(name)
            .cloned()
            .ok_or_else(|| CompileError::UnknownApp(name.to_string()))
    }

    /// Condition matching when a registered app is frontmost.
    pub fn app_if(&self, name: &str) -> Result<Condition, CompileError> {
        Ok(Condition::app_if(self.resolve_app(name)?))
    }

    /// Condition matching when a registered app is not frontmost.
    pub fn app_unless(&self, name: &str) -> Result<Condition, CompileError> {
        Ok(Condition::app_unless(self.resolve_app(name)?))
    }

    /// Run `body` with extra conditions stacked onto the ambient defaults.
    /// The prior ambient state is restored afterwards, also when the body
    /// returns an error.
    pub fn with_conditions<F>(
        &mut self,
        conditions: impl IntoIterator<Item = Condition>,
        body: F,
    ) -> Result<(), CompileError>
    where
        F: FnOnce(&mut Self) -> Result<(), CompileError>,
    {
        let parent = self.ctx.clone();
        let mut stacked = self.ctx.conditions.take().unwrap_or_default();
        stacked.extend(conditions);
        self.ctx.conditions = Some(stacked);

        let result = body(self);
        self.ctx = parent;
        result
    }

    /// Run `body` with extra default parameters merged over the ambient ones.
    /// Same stacking discipline as [`GroupScope::with_conditions`].
    pub fn with_parameters<F>(
        &mut self,
        parameters: impl IntoIterator<Item = (String, Value)>,
        body: F,
    ) -> Result<(), CompileError>
    where
        F: FnOnce(&mut Self) -> Result<(), CompileError>,
    {
        let parent = self.ctx.clone();
        let mut merged = self.ctx.parameters.take().unwrap_or_default();
        merged.extend(parameters);
        self.ctx.parameters = Some(merged);

        let result = body(self);
        self.ctx = parent;
        result
    }

    /// Scoped form of [`GroupScope::mode_if`].
    pub fn with_mode_if<F>(&mut self, name: Option<&str>, body: F) -> Result<(), CompileError>
    where
        F: FnOnce(&mut Self) -> Result<(), CompileError>,
    {
        let condition = self.mode_if(name)?;
        self.with_conditions([condition], body)
    }

    /// Scoped form of [`GroupScope::mode_unless`].
    pub fn with_mode_unless<F>(&mut self, name: Option<&str>, body: F) -> Result<(), CompileError>
    where
        F: FnOnce(&mut Self) -> Result<(), CompileError>,
    {
        let condition = self.mode_unless(name)?;
        self.with_conditions([condition], body)
    }

    /// Scoped form of [`GroupScope::app_if`].
    pub fn with_app_if<F>(&mut self, name: &str, body: F) -> Result<(), CompileError>
    where
        F: FnOnce(&mut Self) -> Result<(), CompileError>,
    {
        let condition = self.app_if(name)?;
        self.with_conditions([condition], body)
    }

    /// Scoped form of [`GroupScope::app_unless`].
    pub fn with_app_unless<F>(&mut self, name: &str, body: F) -> Result<(), CompileError>
    where
        F: FnOnce(&mut Self) -> Result<(), CompileError>,
    {
        let condition = self.app_unless(name)?;
        self.with_conditions([condition], body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_rule_requires_open_group_by_construction() {
        // GroupScope is only handed out by Ruleset::group; this test pins the
        // collector behavior itself.
        let mut rules = Ruleset::new();
        rules
            .group("Caps Lock", |g| g.rule("caps_lock -any", "left_control"))
            .unwrap();
        assert_eq!(rules.groups().len(), 1);
        assert_eq!(rules.groups()[0].manipulators.len(), 1);
    }

    #[test]
    fn test_group_order_is_declaration_order() {
        let mut rules = Ruleset::new();
        rules.group("zeta", |g| g.rule("a", "b")).unwrap();
        rules.group("alpha", |g| g.rule("c", "d")).unwrap();
        let names: Vec<_> = rules.groups().iter().map(|g| g.description.as_str()).collect();
        assert_eq!(names, vec!["zeta", "alpha"]);
    }

    #[test]
    fn test_skip_group_emits_nothing() {
        let mut rules = Ruleset::new();
        rules
            .group_with("skipped", GroupOptions::new().skip(true), |_| {
                panic!("body must not run when skipped");
            })
            .unwrap();
        assert!(rules.groups().is_empty());
    }

    #[test]
    fn test_disabled_group_serializes_enabled_false() {
        let mut rules = Ruleset::new();
        rules
            .group_with("off", GroupOptions::new().enabled(false), |g| {
                g.rule("a", "b")
            })
            .unwrap();
        rules.group("on", |g| g.rule("c", "d")).unwrap();

        let value = serde_json::to_value(rules.groups()).unwrap();
        assert_eq!(value[0]["enabled"], json!(false));
        assert!(value[1].get("enabled").is_none());
    }

    #[test]
    fn test_ambient_conditions_apply_inside_scope() {
        let mut rules = Ruleset::new();
        rules
            .group("scoped", |g| {
                g.with_conditions([Condition::variable_if("m", true)], |g| {
                    g.rule("j", "down_arrow")
                })?;
                g.rule("k", "up_arrow")
            })
            .unwrap();

        let manipulators = &rules.groups()[0].manipulators;
        assert_eq!(
            manipulators[0].conditions,
            Some(vec![Condition::variable_if("m", true)])
        );
        // Restored after the block: the following rule has no conditions.
        assert_eq!(manipulators[1].conditions, None);
    }

    #[test]
    fn test_nested_scopes_stack_and_restore() {
        let mut rules = Ruleset::new();
        rules
            .group("nested", |g| {
                g.default_mode("outer");
                g.with_mode_if(None, |g| {
                    g.with_mode_if(Some("inner"), |g| g.rule("a", "b"))?;
                    g.rule("c", "d")
                })?;
                g.rule("e", "f")
            })
            .unwrap();

        let manipulators = &rules.groups()[0].manipulators;
        assert_eq!(manipulators[0].conditions.as_ref().unwrap().len(), 2);
        assert_eq!(manipulators[1].conditions.as_ref().unwrap().len(), 1);
        assert_eq!(manipulators[2].conditions, None);
    }

    #[test]
    fn test_scope_restored_after_body_error() {
        let mut rules = Ruleset::new();
        rules
            .group("recovering", |g| {
                let failed = g.with_conditions([Condition::variable_if("m", true)], |g| {
                    g.rule("bad ~token", "x")
                });
                assert!(failed.is_err());
                // Ambient state is back to the pre-block value.
                g.rule("a", "b")
            })
            .unwrap();

        assert_eq!(rules.groups()[0].manipulators[0].conditions, None);
    }

    #[test]
    fn test_with_parameters_merges_over_ambient() {
        let mut rules = Ruleset::new();
        rules
            .group("params", |g| {
                g.with_parameters(
                    [("basic.to_if_alone_timeout_milliseconds".to_string(), json!(500))],
                    |g| {
                        g.with_parameters(
                            [("basic.to_delayed_action_delay_milliseconds".to_string(), json!(300))],
                            |g| g.rule("a", "b"),
                        )
                    },
                )
            })
            .unwrap();

        let parameters = rules.groups()[0].manipulators[0].parameters.as_ref().unwrap();
        assert_eq!(parameters.len(), 2);
    }

    #[test]
    fn test_mode_helpers_use_default_mode() {
        let mut rules = Ruleset::new();
        rules
            .group("modes", |g| {
                g.default_mode("mouse-mode");
                let on = g.mode_on(None)?;
                assert_eq!(
                    serde_json::to_value(&on).unwrap(),
                    json!({"set_variable": {"name": "mouse-mode", "value": true}})
                );
                let off = g.mode_off(Some("mouse-scroll"))?;
                assert_eq!(
                    serde_json::to_value(&off).unwrap(),
                    json!({"set_variable": {"name": "mouse-scroll", "value": false}})
                );
                Ok(())
            })
            .unwrap();
    }

    #[test]
    fn test_mode_helper_without_default_is_usage_error() {
        let mut rules = Ruleset::new();
        let result = rules.group("no default", |g| {
            g.mode_on(None)?;
            Ok(())
        });
        assert!(matches!(result, Err(CompileError::Usage(_))));
    }

    #[test]
    fn test_unknown_app_error() {
        let mut rules = Ruleset::new();
        let result = rules.group("apps", |g| {
            g.app_if("unregistered")?;
            Ok(())
        });
        assert_eq!(
            result,
            Err(CompileError::UnknownApp("unregistered".to_string()))
        );
    }

    #[test]
    fn test_app_registry_single_and_multiple_patterns() {
        let mut rules = Ruleset::new();
        rules.app("slack", "^com\\.tinyspeck\\.slackmacgap$");
        rules.app("terminals", vec!["^com\\.apple\\.Terminal$", "^com\\.googlecode\\.iterm2$"]);
        rules
            .group("apps", |g| {
                let one = g.app_if("slack")?;
                assert_eq!(
                    serde_json::to_value(&one).unwrap()["bundle_identifiers"],
                    json!(["^com\\.tinyspeck\\.slackmacgap$"])
                );
                let two = g.app_unless("terminals")?;
                assert_eq!(
                    serde_json::to_value(&two).unwrap()["bundle_identifiers"]
                        .as_array()
                        .unwrap()
                        .len(),
                    2
                );
                Ok(())
            })
            .unwrap();
    }

    #[test]
    fn test_group_body_error_aborts_group() {
        let mut rules = Ruleset::new();
        let result = rules.group("broken", |g| g.rule("a ~x", "b"));
        assert!(result.is_err());
        assert!(rules.groups().is_empty());
    }
}
