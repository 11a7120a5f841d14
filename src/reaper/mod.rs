//! Background deletion of expired conversations.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;

use crate::db::Repository;
use crate::errors::AppError;

/// Delete every conversation whose deadline is at or before `now`.
pub async fn sweep(repo: &Repository, now: DateTime<Utc>) -> Result<u64, AppError> {
    let deleted = repo.delete_expired_conversations(now).await?;
    if deleted > 0 {
        tracing::info!("Reaped {} expired conversations", deleted);
    }
    Ok(deleted)
}

/// Run [`sweep`] every `period` until the runtime shuts down.
pub fn spawn(repo: Arc<Repository>, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            interval.tick().await;
            if let Err(e) = sweep(&repo, Utc::now()).await {
                tracing::error!("Conversation reaper failed: {}", e);
            }
        }
    })
}
