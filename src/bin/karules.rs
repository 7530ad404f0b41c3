// Karules CLI
// Compiles the rule set defined in `config` and installs it into karabiner.json
//
// The rule set lives in this file: edit `config`, then `cargo run` to compile
// and install it. Use --dry-run to inspect the output first.

use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{bail, Context};
use clap::Parser;
use serde_json::json;

use karules_core::{
    default_config_path, install, Action, CompileError, DelayedAction, GroupOptions, GroupScope,
    InstallOptions, RuleOptions, Ruleset, ToSpec,
};

/// Karabiner-Elements rule compiler
#[derive(Parser, Debug)]
#[command(name = "karules")]
#[command(version)]
#[command(about = "Compiles a declarative rule set into karabiner.json", long_about = None)]
struct Args {
    /// Target karabiner.json (defaults to $XDG_CONFIG_HOME/karabiner/karabiner.json)
    #[arg(short, long, value_name = "PATH")]
    path: Option<PathBuf>,

    /// Print the compiled rules without touching the config file
    #[arg(long)]
    dry_run: bool,

    /// Skip the timestamped backup of the existing config
    #[arg(long)]
    no_backup: bool,

    /// Compile only, report success and exit
    #[arg(long)]
    check: bool,

    /// Do not invoke karabiner_cli after writing
    #[arg(long)]
    no_reload: bool,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

/// Tap/hold mode key: alone it types itself, held it arms the mode.
fn key_mode(g: &mut GroupScope<'_>, key: &str, mode: &str) -> Result<(), CompileError> {
    let delayed = DelayedAction::new()
        .if_canceled(Action::Raw(json!({ "key_code": key })))
        .if_invoked(g.mode_on(Some(mode))?);
    g.rule_with(
        key,
        RuleOptions::new()
            .to_if_alone(ToSpec::Raw(json!({ "key_code": key, "halt": true })))
            .to_after_key_up(g.mode_off(Some(mode))?)
            .to_delayed_action(delayed)
            .parameter("basic.to_if_held_down_threshold_milliseconds", 300)
            .parameter("basic.to_delayed_action_delay_milliseconds", 300),
    )
}

/// The rule set. Edit this to taste.
fn config(rules: &mut Ruleset) -> Result<(), CompileError> {
    rules.app("slack", "^com\\.tinyspeck\\.slackmacgap$");
    rules.app("ghostty", "^com\\.mitchellh\\.ghostty$");

    rules.group("Caps Lock", |g| g.rule("caps_lock -any", "left_control"))?;

    rules.group("Mouse buttons", |g| {
        // button5 -> mission control
        g.rule("pointing_button:button5 -any", "f3")
    })?;

    rules.group("Tmux", |g| {
        g.with_app_unless("ghostty", |g| {
            // Focus the terminal, wait, then replay the prefix key.
            g.rule(
                "a +control",
                vec![
                    ToSpec::from("!open -a 'Terminal'"),
                    ToSpec::Raw(json!({"key_code": "vk_none", "hold_down_milliseconds": 100})),
                    ToSpec::from("a +control"),
                ],
            )
        })
    })?;

    rules.group("Tab mode", |g| {
        g.rule_with(
            "tab",
            RuleOptions::new().to("right_option lazy").to_if_alone("tab"),
        )?;

        g.rule("j +right_option", "down_arrow")?;
        g.rule("k +right_option", "up_arrow")?;

        g.with_app_if("slack", |g| {
            g.rule("h +right_option", "f6 +shift")?;
            g.rule("l +right_option", "f6")?;
            g.rule("semicolon +right_option", "right_arrow")
        })?;

        g.rule("h +right_option", "left_arrow")?;
        g.rule("l +right_option", "right_arrow")?;

        g.rule("w +right_option", "right_arrow +right_option")?;
        g.rule("b +right_option", "left_arrow +right_option")?;
        g.rule("u +right_option", "page_up")?;
        g.rule("d +right_option", "page_down")
    })?;

    rules.group_with("Mouse mode", GroupOptions::new().enabled(false), |g| {
        g.default_mode("mouse-mode");
        let scroll = "mouse-scroll";
        let step = 1000;
        let wheel = 50;

        key_mode(g, "d", "mouse-mode")?;
        g.with_mode_if(None, |g| {
            g.rule("left_shift +right_shift", g.mode_off(None)?)?;
            g.rule("right_shift +left_shift", g.mode_off(None)?)
        })?;
        g.rule("left_shift +right_shift", g.mode_on(None)?)?;
        g.rule("right_shift +left_shift", g.mode_on(None)?)?;

        g.with_mode_if(None, |g| {
            g.with_mode_if(Some(scroll), |g| {
                g.rule("j -any", json!({"mouse_key": {"vertical_wheel": wheel}}))?;
                g.rule("k -any", json!({"mouse_key": {"vertical_wheel": -wheel}}))?;
                g.rule("h -any", json!({"mouse_key": {"horizontal_wheel": wheel}}))?;
                g.rule("l -any", json!({"mouse_key": {"horizontal_wheel": -wheel}}))
            })?;

            // normal movement
            g.rule("j -any", json!({"mouse_key": {"y": step}}))?;
            g.rule("k -any", json!({"mouse_key": {"y": -step}}))?;
            g.rule("h -any", json!({"mouse_key": {"x": -step}}))?;
            g.rule("l -any", json!({"mouse_key": {"x": step}}))?;

            // mode modifiers
            g.rule_with(
                "s -any",
                RuleOptions::new()
                    .to(g.mode_on(Some(scroll))?)
                    .to_after_key_up(g.mode_off(Some(scroll))?),
            )?;
            g.rule("c -any", json!({"mouse_key": {"speed_multiplier": 0.5}}))?;
            g.rule("f -any", json!({"mouse_key": {"speed_multiplier": 2.0}}))?;

            // buttons
            g.rule("b -any", json!({"pointing_button": "button1"}))?;
            g.rule("spacebar -any", json!({"pointing_button": "button1"}))?;
            g.rule("n -any", json!({"pointing_button": "button2"}))?;

            // position
            g.rule(
                "m -any",
                json!({"software_function": {"set_mouse_cursor_position": {"x": "50%", "y": "50%"}}}),
            )
        })
    })?;

    rules.group("MacOS double CmdQ", |g| {
        g.default_mode("macos-q-command");
        let armed = g.mode_if(None)?;
        g.rule_with(
            "q +command",
            RuleOptions::new().to("q +command").condition(armed),
        )?;
        g.rule_with(
            "q +command",
            RuleOptions::new().to(g.mode_on(None)?).to_delayed_action(
                DelayedAction::new()
                    .if_canceled(g.mode_off(None)?)
                    .if_invoked(g.mode_off(None)?),
            ),
        )
    })?;

    rules.group("terminal 1-9", |g| {
        g.with_app_if("ghostty", |g| {
            for i in 1..=9 {
                g.rule(format!("{i} +left_command"), format!("{i} +command"))?;
            }
            Ok(())
        })?;
        for i in 1..=9 {
            g.rule(format!("{i} +left_option"), format!("{i} +command"))?;
        }
        Ok(())
    })?;

    rules.group("Apps", |g| {
        g.rule("j +right_command", "!open -a 'Terminal'")?;
        g.rule("k +right_command", "!open -a 'Safari'")?;
        g.rule("semicolon +right_command", "!open -a 'Mail'")?;

        g.rule("f +right_command", "!open -a 'Finder'")?;
        g.rule("s +right_command", "!open -a 'Slack'")?;
        g.rule("c +right_command", "!open -a 'Google Chrome'")?;
        g.rule("n +right_command", "!open -a 'Notes'")?;

        g.rule("t +right_command", "t +control +command +option")
    })
}

fn reload(path: &Path) -> anyhow::Result<()> {
    match Command::new("karabiner_cli")
        .arg("--format-json")
        .arg(path)
        .status()
    {
        Ok(status) if status.success() => Ok(()),
        Ok(status) => bail!("karabiner_cli exited with {status}"),
        Err(e) => {
            // Karabiner may not be installed where the compile runs.
            log::warn!("could not run karabiner_cli: {e}");
            Ok(())
        }
    }
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let filter = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(filter)).init();

    let mut rules = Ruleset::new();
    config(&mut rules)?;
    let document = rules.compile()?;

    if args.check {
        println!("Rule set compiled: {} group(s)", rules.groups().len());
        return Ok(());
    }

    if args.dry_run {
        println!("{}", serde_json::to_string_pretty(&document)?);
        return Ok(());
    }

    let path = match args.path {
        Some(path) => path,
        None => default_config_path().context("could not resolve the karabiner.json path")?,
    };

    let options = InstallOptions {
        backup: !args.no_backup,
        dry_run: false,
    };
    let outcome = install(&path, &document, &options)
        .with_context(|| format!("failed to update {}", path.display()))?;

    if let Some(backup) = &outcome.backup_path {
        println!("Backed up existing config to: {}", backup.display());
    }
    println!(
        "Wrote {} rule group(s) to {}",
        rules.groups().len(),
        path.display()
    );

    if !args.no_reload {
        reload(&path)?;
    }
    Ok(())
}
