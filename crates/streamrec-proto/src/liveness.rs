//! Liveness probing contract.

use async_trait::async_trait;

/// Answers "is this channel streamable at this quality right now?".
///
/// Implementations must never fail towards the caller: transport errors,
/// unresolvable URLs and protocol errors all count as "not live" and are
/// logged where they happen.
#[async_trait]
pub trait LivenessOracle: Send + Sync {
    /// Returns true when `channel` is currently live at (or above) `quality`.
    async fn probe(&self, channel: &str, quality: &str) -> bool;
}
