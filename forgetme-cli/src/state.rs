use anyhow::{Context, Result};
use std::fs;
use std::path::PathBuf;

/// Overrides the default `~/.forgetme` location.
pub const HOME_ENV: &str = "FORGETME_HOME";

pub fn forgetme_home() -> Result<PathBuf> {
    if let Some(dir) = std::env::var_os(HOME_ENV).filter(|v| !v.is_empty()) {
        return Ok(PathBuf::from(dir));
    }
    let home = std::env::var("HOME").context("HOME is not set")?;
    Ok(PathBuf::from(home).join(".forgetme"))
}

pub fn ensure_forgetme_home() -> Result<PathBuf> {
    let dir = forgetme_home()?;
    fs::create_dir_all(&dir).with_context(|| format!("create {}", dir.display()))?;
    Ok(dir)
}

/// Key-value document holding tasks and flags.
pub fn storage_path() -> Result<PathBuf> {
    Ok(ensure_forgetme_home()?.join("storage.json"))
}

/// Pending triggers and permission state of the local scheduler.
pub fn scheduler_path() -> Result<PathBuf> {
    Ok(ensure_forgetme_home()?.join("scheduler.json"))
}

/// Marker written by a successful upgrade; `premium restore` looks for it.
pub fn receipt_path() -> Result<PathBuf> {
    Ok(ensure_forgetme_home()?.join("premium.receipt"))
}
