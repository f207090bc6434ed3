use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use clap::Subcommand;
use forgetme_core::Entitlement;
use std::path::PathBuf;

use crate::app::App;
use crate::state::receipt_path;

#[derive(Subcommand, Debug)]
pub enum PremiumCommand {
    /// Unlock reminders
    Upgrade,
    /// Restore a previous upgrade on this machine
    Restore,
    /// Drop premium and remove every reminder
    Revoke,
    /// Show premium state
    Status,
}

/// Local purchase flow: upgrading writes a receipt file, restoring checks for it.
pub struct ReceiptEntitlement {
    path: PathBuf,
}

impl ReceiptEntitlement {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn revoke(&self) -> Result<()> {
        if self.path.exists() {
            std::fs::remove_file(&self.path).with_context(|| format!("remove {}", self.path.display()))?;
        }
        Ok(())
    }
}

#[async_trait]
impl Entitlement for ReceiptEntitlement {
    async fn upgrade(&self) -> Result<bool> {
        tokio::fs::write(&self.path, Utc::now().to_rfc3339())
            .await
            .with_context(|| format!("write {}", self.path.display()))?;
        Ok(true)
    }

    async fn restore(&self) -> Result<bool> {
        Ok(tokio::fs::try_exists(&self.path).await.unwrap_or(false))
    }
}

pub async fn run(app: &mut App, cmd: PremiumCommand) -> Result<()> {
    let entitlement = ReceiptEntitlement::new(receipt_path()?);
    run_with(app, &entitlement, cmd).await
}

pub async fn run_with(app: &mut App, entitlement: &ReceiptEntitlement, cmd: PremiumCommand) -> Result<()> {
    match cmd {
        PremiumCommand::Upgrade => {
            if app.controller.upgrade(&mut app.store, entitlement).await? {
                println!("Premium unlocked. Reminders are available.");
            } else {
                println!("Upgrade did not complete.");
            }
        }
        PremiumCommand::Restore => {
            if app.controller.restore(&mut app.store, entitlement).await? {
                println!("Premium restored.");
            } else {
                println!("No previous upgrade found.");
            }
        }
        PremiumCommand::Revoke => {
            let cancelled = app.controller.revoke_premium(&mut app.store).await?;
            entitlement.revoke()?;
            println!("Premium revoked ({cancelled} notifications cancelled)");
        }
        PremiumCommand::Status => {
            let with_reminder = app.store.tasks().iter().filter(|t| t.reminder.is_some()).count();
            println!("premium: {}", app.store.is_premium());
            println!("tasks with reminders: {with_reminder}");
        }
    }
    Ok(())
}
