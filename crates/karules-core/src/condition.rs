// Karules Conditions
// Mode-variable and frontmost-application match conditions

use serde::Serialize;
use serde_json::Value;

/// Test direction of a variable condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VariableTest {
    VariableIf,
    VariableUnless,
}

/// A `variable_if`/`variable_unless` condition on a named variable.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VariableCondition {
    pub name: String,
    #[serde(rename = "type")]
    pub test: VariableTest,
    pub value: Value,
}

/// Test direction of a frontmost-application condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AppTest {
    FrontmostApplicationIf,
    FrontmostApplicationUnless,
}

/// A frontmost-application condition over bundle-identifier patterns.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AppCondition {
    pub bundle_identifiers: Vec<String>,
    #[serde(rename = "type")]
    pub test: AppTest,
}

/// A single manipulator condition.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Condition {
    Variable(VariableCondition),
    App(AppCondition),
    /// Opaque condition fragment emitted as authored.
    Raw(Value),
}

impl Condition {
    pub fn variable_if(name: impl Into<String>, value: impl Into<Value>) -> Self {
        Condition::Variable(VariableCondition {
            name: name.into(),
            test: VariableTest::VariableIf,
            value: value.into(),
        })
    }

    pub fn variable_unless(name: impl Into<String>, value: impl Into<Value>) -> Self {
        Condition::Variable(VariableCondition {
            name: name.into(),
            test: VariableTest::VariableUnless,
            value: value.into(),
        })
    }

    pub fn app_if(bundle_identifiers: Vec<String>) -> Self {
        Condition::App(AppCondition {
            bundle_identifiers,
            test: AppTest::FrontmostApplicationIf,
        })
    }

    pub fn app_unless(bundle_identifiers: Vec<String>) -> Self {
        Condition::App(AppCondition {
            bundle_identifiers,
            test: AppTest::FrontmostApplicationUnless,
        })
    }
}
