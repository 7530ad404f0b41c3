// Karules Installer
// Splices compiled rules into an existing karabiner.json

use std::fs;
use std::path::{Path, PathBuf};

use serde_json::Value;

/// Errors raised while updating the target configuration file.
#[derive(Debug, thiserror::Error)]
pub enum InstallError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("config has no profiles[0].complex_modifications.rules array")]
    MissingRulesPath,
}

/// Install options.
#[derive(Debug, Clone)]
pub struct InstallOptions {
    /// Copy the existing file to `<path>.backup.<timestamp>` before writing.
    pub backup: bool,
    /// Compile and splice but write nothing.
    pub dry_run: bool,
}

impl Default for InstallOptions {
    fn default() -> Self {
        Self {
            backup: true,
            dry_run: false,
        }
    }
}

/// Outcome of an install run.
#[derive(Debug, Clone)]
pub struct InstallOutcome {
    pub path: PathBuf,
    pub backup_path: Option<PathBuf>,
    pub written: bool,
}

/// Default Karabiner config location:
/// `$XDG_CONFIG_HOME/karabiner/karabiner.json`.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("karabiner").join("karabiner.json"))
}

/// Replace the rules array of a serialized Karabiner config, leaving every
/// other key untouched.
pub fn splice_rules(config_text: &str, rules: &Value) -> Result<String, InstallError> {
    let mut config: Value = serde_json::from_str(config_text)?;
    let slot = config
        .get_mut("profiles")
        .and_then(|profiles| profiles.get_mut(0))
        .and_then(|profile| profile.get_mut("complex_modifications"))
        .and_then(|mods| mods.get_mut("rules"))
        .filter(|rules| rules.is_array())
        .ok_or(InstallError::MissingRulesPath)?;
    *slot = rules.clone();
    Ok(serde_json::to_string(&config)?)
}

/// Write `rules` into the config at `path`.
///
/// The whole document is spliced in memory before anything touches the disk,
/// so a failed compile or parse leaves the target file as it was.
pub fn install(
    path: &Path,
    rules: &Value,
    options: &InstallOptions,
) -> Result<InstallOutcome, InstallError> {
    let original = fs::read_to_string(path)?;
    let updated = splice_rules(&original, rules)?;

    if options.dry_run {
        log::info!("dry run: not writing {}", path.display());
        return Ok(InstallOutcome {
            path: path.to_path_buf(),
            backup_path: None,
            written: false,
        });
    }

    let backup_path = if options.backup {
        Some(backup_file(path)?)
    } else {
        None
    };
    fs::write(path, updated)?;
    log::info!("wrote rules to {}", path.display());

    Ok(InstallOutcome {
        path: path.to_path_buf(),
        backup_path,
        written: true,
    })
}

fn backup_file(path: &Path) -> Result<PathBuf, std::io::Error> {
    let stamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
    let backup = PathBuf::from(format!("{}.backup.{}", path.display(), stamp));
    fs::copy(path, &backup)?;
    log::info!("backed up existing config to {}", backup.display());
    Ok(backup)
}
