//! Notification adapter that writes notices to the structured log.
//!
//! Delivery channels (push, SMS) live in a separate service that tails
//! these events; the engine only emits them.

use async_trait::async_trait;
use tracing::info;

use crate::ports::{Audience, Notice, Notifier};

#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, audience: &Audience, notice: &Notice) -> anyhow::Result<()> {
        let audience = serde_json::to_string(audience)?;
        let notice = serde_json::to_string(notice)?;
        info!(target: "trade_notice", audience = %audience, notice = %notice, "Notice emitted");
        Ok(())
    }
}
