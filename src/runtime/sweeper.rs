//! Periodic expiry sweep
//!
//! Reads already ignore expired records; the sweep only reclaims memory.
//! One task on a fixed interval covers all three stores.

use super::DialogueStores;
use chrono::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// How many records one sweep removed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub contexts: usize,
    pub history: usize,
    pub retries: usize,
}

impl SweepReport {
    pub fn total(&self) -> usize {
        self.contexts + self.history + self.retries
    }
}

pub async fn sweep_once(stores: &DialogueStores, retry_window: Duration) -> SweepReport {
    SweepReport {
        contexts: stores.contexts.sweep().await,
        history: stores.history.sweep().await,
        retries: stores.retries.sweep(retry_window).await,
    }
}

/// Sweep every `interval` until `cancel` fires
pub fn spawn_sweeper(
    stores: DialogueStores,
    retry_window: Duration,
    interval: std::time::Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // The first tick completes immediately
        ticker.tick().await;

        loop {
            tokio::select! {
                () = cancel.cancelled() => {
                    tracing::debug!("Sweeper stopped");
                    break;
                }
                _ = ticker.tick() => {
                    let report = sweep_once(&stores, retry_window).await;
                    if report.total() > 0 {
                        tracing::debug!(
                            contexts = report.contexts,
                            history = report.history,
                            retries = report.retries,
                            "Swept expired dialogue state"
                        );
                    }
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DialogueConfig;
    use crate::dialogue::{ContextPatch, ConversationKey, IntentKind, Role};
    use crate::testing::ManualClock;
    use serde_json::json;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_sweep_once_reclaims_expired_state() {
        let clock = Arc::new(ManualClock::default());
        let config = DialogueConfig::default();
        let stores = DialogueStores::in_memory(&config, clock.clone());
        let key = ConversationKey::new("u", "c");

        stores.contexts.update(&key, ContextPatch::data(json!({}))).await;
        stores.history.append(&key, Role::User, "hi").await;
        stores.retries.mark_failed(&key, IntentKind::EventCreation).await;

        assert_eq!(sweep_once(&stores, config.retry_window).await, SweepReport::default());

        clock.advance(Duration::minutes(31));
        let report = sweep_once(&stores, config.retry_window).await;
        assert_eq!(
            report,
            SweepReport {
                contexts: 1,
                history: 1,
                retries: 1
            }
        );
        assert_eq!(report.total(), 3);
    }

    #[tokio::test]
    async fn test_sweeper_stops_on_cancel() {
        let clock = Arc::new(ManualClock::default());
        let stores = DialogueStores::in_memory(&DialogueConfig::default(), clock);
        let cancel = CancellationToken::new();
        let handle = spawn_sweeper(
            stores,
            Duration::minutes(5),
            std::time::Duration::from_millis(5),
            cancel.clone(),
        );

        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        cancel.cancel();
        tokio::time::timeout(std::time::Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap();
    }
}
