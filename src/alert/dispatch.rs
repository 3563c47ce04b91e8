use anyhow::{Context, Result};
use serde::Serialize;
use tracing::{info, warn};

use crate::alert::engine::{build_alert, AlertContext};
use crate::alert::sink::AlertSink;
use crate::state::{NotificationStore, RecordKind};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DispatchSummary {
    pub sent: usize,
    pub failed: usize,
}

/// Sends one notification per pending record of `kind` and marks a record
/// notified only after every sink accepted it.
///
/// A crash between sending and marking re-sends on the next run; a failed
/// send leaves the record pending.
pub async fn dispatch_pending(
    store: &NotificationStore,
    kind: RecordKind,
    ctx: &AlertContext,
    sinks: &[Box<dyn AlertSink>],
) -> Result<DispatchSummary> {
    let mut summary = DispatchSummary::default();
    if sinks.is_empty() {
        warn!("no alert sinks configured, leaving {kind} records pending");
        return Ok(summary);
    }

    for record in store.pending_unnotified(kind) {
        let record = record.with_context(|| format!("failed reading pending {kind} records"))?;
        let event = build_alert(&record, ctx);

        let mut delivered = true;
        for sink in sinks {
            if let Err(err) = sink.send(&event).await {
                warn!("failed sending {} via {}: {err:#}", event.key, sink.name());
                delivered = false;
            }
        }
        if !delivered {
            summary.failed += 1;
            continue;
        }

        store
            .mark_notified(&event.key)
            .with_context(|| format!("failed marking {} notified", event.key))?;
        summary.sent += 1;
    }

    if summary.sent + summary.failed > 0 {
        info!(
            "{kind}: {} notification(s) sent, {} failed",
            summary.sent, summary.failed
        );
    }
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    use anyhow::{anyhow, Result};
    use async_trait::async_trait;

    use super::{dispatch_pending, DispatchSummary};
    use crate::alert::engine::{AlertContext, AlertEvent};
    use crate::alert::sink::AlertSink;
    use crate::state::{NotificationStore, Observation, RecordKey, RecordKind};

    #[derive(Default)]
    struct RecordingSink {
        titles: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl AlertSink for RecordingSink {
        fn name(&self) -> &str {
            "recording"
        }

        async fn send(&self, event: &AlertEvent) -> Result<()> {
            self.titles.lock().unwrap().push(event.title.clone());
            Ok(())
        }
    }

    /// Fails every call whose ordinal is listed.
    struct FlakySink {
        calls: AtomicUsize,
        fail_on: Vec<usize>,
    }

    #[async_trait]
    impl AlertSink for FlakySink {
        fn name(&self) -> &str {
            "flaky"
        }

        async fn send(&self, _event: &AlertEvent) -> Result<()> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_on.contains(&call) {
                Err(anyhow!("webhook returned 500"))
            } else {
                Ok(())
            }
        }
    }

    struct ForwardSink(Arc<RecordingSink>);

    #[async_trait]
    impl AlertSink for ForwardSink {
        fn name(&self) -> &str {
            self.0.name()
        }

        async fn send(&self, event: &AlertEvent) -> Result<()> {
            self.0.send(event).await
        }
    }

    fn seeded_store() -> NotificationStore {
        let store = NotificationStore::open_in_memory().unwrap();
        for version in ["1.17.0", "1.18.0"] {
            store
                .record_observation(&Observation::SolanaCluster {
                    version: version.to_string(),
                    cluster: "devnet".to_string(),
                })
                .unwrap();
        }
        store
    }

    #[tokio::test]
    async fn sends_each_pending_record_once() {
        let store = seeded_store();
        let recording = Arc::new(RecordingSink::default());
        let sinks: Vec<Box<dyn AlertSink>> = vec![Box::new(ForwardSink(Arc::clone(&recording)))];
        let ctx = AlertContext::default();

        let first = dispatch_pending(&store, RecordKind::SolanaCluster, &ctx, &sinks)
            .await
            .unwrap();
        assert_eq!(first, DispatchSummary { sent: 2, failed: 0 });

        let second = dispatch_pending(&store, RecordKind::SolanaCluster, &ctx, &sinks)
            .await
            .unwrap();
        assert_eq!(second, DispatchSummary::default());
        assert_eq!(recording.titles.lock().unwrap().len(), 2);
        assert!(store
            .is_notified(&RecordKey::solana_cluster("1.18.0", "devnet"))
            .unwrap());
    }

    #[tokio::test]
    async fn failed_send_leaves_record_pending() {
        let store = seeded_store();
        let sinks: Vec<Box<dyn AlertSink>> = vec![Box::new(FlakySink {
            calls: AtomicUsize::new(0),
            fail_on: vec![0],
        })];
        let ctx = AlertContext::default();

        let summary = dispatch_pending(&store, RecordKind::SolanaCluster, &ctx, &sinks)
            .await
            .unwrap();
        assert_eq!(summary, DispatchSummary { sent: 1, failed: 1 });
        assert!(!store
            .is_notified(&RecordKey::solana_cluster("1.17.0", "devnet"))
            .unwrap());
        assert!(store
            .is_notified(&RecordKey::solana_cluster("1.18.0", "devnet"))
            .unwrap());

        let retry = dispatch_pending(&store, RecordKind::SolanaCluster, &ctx, &sinks)
            .await
            .unwrap();
        assert_eq!(retry, DispatchSummary { sent: 1, failed: 0 });
        assert_eq!(store.pending_unnotified(RecordKind::SolanaCluster).count(), 0);
    }

    #[tokio::test]
    async fn no_sinks_marks_nothing() {
        let store = seeded_store();
        let summary = dispatch_pending(
            &store,
            RecordKind::SolanaCluster,
            &AlertContext::default(),
            &[],
        )
        .await
        .unwrap();
        assert_eq!(summary, DispatchSummary::default());
        assert_eq!(store.pending_unnotified(RecordKind::SolanaCluster).count(), 2);
    }
}
