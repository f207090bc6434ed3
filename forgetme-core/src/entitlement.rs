//! Premium entitlement collaborator.

use async_trait::async_trait;

#[async_trait]
pub trait Entitlement: Send + Sync {
    /// Purchase flow. Resolves to whether the user is now premium.
    async fn upgrade(&self) -> anyhow::Result<bool>;

    /// Restore a previous purchase.
    async fn restore(&self) -> anyhow::Result<bool>;
}

/// Entitlement with a fixed answer; used by the CLI and tests.
#[derive(Debug, Clone, Copy)]
pub struct StaticEntitlement(pub bool);

#[async_trait]
impl Entitlement for StaticEntitlement {
    async fn upgrade(&self) -> anyhow::Result<bool> {
        Ok(self.0)
    }

    async fn restore(&self) -> anyhow::Result<bool> {
        Ok(self.0)
    }
}
