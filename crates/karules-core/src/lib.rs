// Karules Core Library
// DSL-to-document compiler for Karabiner-Elements complex modification rules

pub mod action;
pub mod condition;
pub mod document;
pub mod error;
pub mod group;
pub mod install;
pub mod key;
pub mod rule;

pub use action::{normalize_to, Action, ToSpec, VariableAssignment};
pub use condition::{AppCondition, AppTest, Condition, VariableCondition, VariableTest};
pub use document::canonicalize;
pub use error::CompileError;
pub use group::{AppRegistry, BundlePatterns, Group, GroupOptions, GroupScope, Ruleset};
pub use install::{
    default_config_path, install, splice_rules, InstallError, InstallOptions, InstallOutcome,
};
pub use key::{parse_from, parse_to, FromKey, FromModifiers, KeyRef, ToKey};
pub use rule::{
    DelayedAction, FromField, FromSpec, Manipulator, ManipulatorKind, Parameters, RuleOptions,
};
