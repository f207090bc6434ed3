use anyhow::{Context, Result};
use chrono::Duration;
use chrono_tz::Tz;
use forgetme_core::{DEFAULT_DEBOUNCE_MS, ReminderPolicy, parse_timezone, per_day_limit};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::state::ensure_forgetme_home;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub profile: ProfileSection,
    pub reminders: RemindersSection,
    pub notifications: NotificationsSection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfileSection {
    /// IANA zone used to decide what "today" is.
    pub timezone: String,
}

impl Default for ProfileSection {
    fn default() -> Self {
        Self {
            timezone: "America/Chicago".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemindersSection {
    pub trigger_ceiling: usize,
    pub base_occurrences_single: usize,
    pub base_occurrences_with_repeat: usize,
    /// Includes the base trigger.
    pub max_triggers_per_day: usize,
    pub min_lead_secs: i64,
    pub debounce_ms: i64,
}

impl Default for RemindersSection {
    fn default() -> Self {
        let policy = ReminderPolicy::default();
        Self {
            trigger_ceiling: policy.trigger_ceiling,
            base_occurrences_single: policy.base_occurrences_single,
            base_occurrences_with_repeat: policy.base_occurrences_with_repeat,
            max_triggers_per_day: policy.max_triggers_per_day,
            min_lead_secs: policy.min_lead_secs,
            debounce_ms: DEFAULT_DEBOUNCE_MS,
        }
    }
}

impl RemindersSection {
    pub fn policy(&self) -> ReminderPolicy {
        ReminderPolicy {
            trigger_ceiling: self.trigger_ceiling,
            base_occurrences_single: self.base_occurrences_single,
            base_occurrences_with_repeat: self.base_occurrences_with_repeat,
            max_triggers_per_day: self.max_triggers_per_day,
            min_lead_secs: self.min_lead_secs,
        }
    }

    pub fn debounce(&self) -> Duration {
        Duration::milliseconds(self.debounce_ms.max(0))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationsSection {
    /// How the local scheduler answers a permission request while undetermined.
    pub grant_on_request: bool,
}

impl Default for NotificationsSection {
    fn default() -> Self {
        Self {
            grant_on_request: true,
        }
    }
}

impl Config {
    pub fn timezone(&self) -> Result<Tz> {
        parse_timezone(&self.profile.timezone).context("config.toml [profile].timezone")
    }
}

pub fn config_path() -> Result<PathBuf> {
    Ok(ensure_forgetme_home()?.join("config.toml"))
}

pub fn load_config() -> Result<Config> {
    load_config_from(&config_path()?)
}

pub fn load_config_from(p: &Path) -> Result<Config> {
    if !p.exists() {
        return Ok(Config::default());
    }
    let s = fs::read_to_string(p).with_context(|| format!("read {}", p.display()))?;
    toml::from_str(&s).with_context(|| format!("parse {}", p.display()))
}

pub fn save_config_to(p: &Path, cfg: &Config) -> Result<()> {
    let s = toml::to_string_pretty(cfg).context("serialize config")?;
    fs::write(p, s).with_context(|| format!("write {}", p.display()))?;
    Ok(())
}

pub fn init_config() -> Result<()> {
    let p = config_path()?;
    if p.exists() {
        println!("Config already exists: {}", p.display());
        return Ok(());
    }
    save_config_to(&p, &Config::default())?;
    println!("Wrote {}", p.display());
    Ok(())
}

pub fn config_check() -> Result<()> {
    let p = config_path()?;
    let cfg = load_config_from(&p)?;
    let tz = cfg.timezone()?;
    let policy = cfg.reminders.policy();

    println!("Config: {}", p.display());
    if !p.exists() {
        println!("(file missing; showing defaults, run `forgetme config init` to write them)");
    }
    println!("\n[profile]");
    println!("timezone = {tz}");
    println!("\n[reminders]");
    println!("trigger_ceiling = {}", policy.trigger_ceiling);
    println!("base_occurrences_single = {}", policy.base_occurrences_single);
    println!("base_occurrences_with_repeat = {}", policy.base_occurrences_with_repeat);
    println!("max_triggers_per_day = {}", policy.max_triggers_per_day);
    println!("min_lead_secs = {}", policy.min_lead_secs);
    println!("debounce_ms = {}", cfg.reminders.debounce_ms);
    println!("\n[notifications]");
    println!("grant_on_request = {}", cfg.notifications.grant_on_request);

    for warning in policy_warnings(&policy) {
        println!("\nwarning: {warning}");
    }
    Ok(())
}

pub fn policy_warnings(policy: &ReminderPolicy) -> Vec<String> {
    let mut out = Vec::new();
    let day_max = per_day_limit(1);
    if policy.max_triggers_per_day == 0 {
        out.push("max_triggers_per_day = 0 is treated as 1 (base trigger only)".to_string());
    }
    if policy.max_triggers_per_day > day_max {
        out.push(format!(
            "max_triggers_per_day = {} exceeds {day_max}, the most one day can hold; it is capped",
            policy.max_triggers_per_day
        ));
    } else if policy.max_triggers_per_day > policy.trigger_ceiling {
        out.push("max_triggers_per_day is above trigger_ceiling; the first day will use the whole budget".to_string());
    }
    if policy.trigger_ceiling < policy.base_occurrences_single {
        out.push("trigger_ceiling is below base_occurrences_single; chains will be truncated".to_string());
    }
    out
}
