//! Lifecycle-gated topic subscription for one metric.
//!
//! A [`TopicMetricSync`] watches the simulation id, keeps at most one broker
//! subscription open for the current owned simulation, reduces every payload
//! into an [`AggregateRecord`], and writes it to the snapshot store. The
//! store is the source of truth for what the view shows: the presented
//! aggregate mirrors the store key, so values written by other components
//! (a handed-over snapshot, a reset) reach the view the same way.
//!
//! All work happens inside [`TopicMetricSync::process_pending`], which the
//! owner of the view calls whenever it is scheduled. Each call first handles
//! id changes, then status transitions and payloads in the order they
//! arrived, then store updates.

use std::fmt::Write as _;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::aggregate::AggregateRecord;
use crate::broker::{MessageBroker, TopicSubscription};
use crate::error::{MalformedPayload, SyncError, SyncResult};
use crate::lifecycle::{SimulationId, SimulationLifecycle};
use crate::reactive::{Broadcast, EventStream};
use crate::store::SnapshotValue;

use super::config::SyncConfig;
use super::metric::{ReduceContext, TopicMetric};
use super::rehydrate::RehydrationReader;
use super::reset::ResetOnRestart;

/// A change in the presented aggregate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MetricUpdate {
    /// New data to show.
    Aggregate(AggregateRecord),
    /// Nothing to show (reset or no data yet).
    Cleared,
}

/// Running counters for one sync.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncStats {
    pub subscriptions_opened: u64,
    pub subscription_failures: u64,
    pub payloads_applied: u64,
    pub malformed_dropped: u64,
    pub unowned_skipped: u64,
}

/// What one [`TopicMetricSync::process_pending`] call did.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PumpReport {
    pub id_changes: usize,
    pub resets: usize,
    pub payloads_applied: usize,
    pub presented_changes: usize,
}

impl PumpReport {
    /// True when nothing was processed.
    #[must_use]
    pub const fn is_idle(&self) -> bool {
        self.id_changes == 0 && self.resets == 0 && self.payloads_applied == 0 && self.presented_changes == 0
    }
}

#[derive(Debug)]
struct ActiveTopic {
    simulation_id: SimulationId,
    subscription: TopicSubscription,
}

#[derive(Debug)]
struct Attachment {
    ids: EventStream<SimulationId>,
    snapshots: EventStream<SnapshotValue>,
    reset: ResetOnRestart,
    topic: Option<ActiveTopic>,
}

/// Keeps one metric's aggregate in sync with its per-simulation topic.
///
/// Attach when the view mounts; dropping the sync detaches it.
pub struct TopicMetricSync<M: TopicMetric> {
    metric: M,
    lifecycle: Arc<dyn SimulationLifecycle>,
    broker: Arc<dyn MessageBroker>,
    config: SyncConfig,
    attachment: Option<Attachment>,
    current: Option<AggregateRecord>,
    updates: Broadcast<MetricUpdate>,
    stats: SyncStats,
    last_error: Option<SyncError>,
}

impl<M: TopicMetric> std::fmt::Debug for TopicMetricSync<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TopicMetricSync")
            .field("store_key", &self.metric.store_key())
            .field("attached", &self.attachment.is_some())
            .field("live_topic", &self.live_topic())
            .field("current", &self.current)
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}

impl<M: TopicMetric> TopicMetricSync<M> {
    /// Create a detached sync.
    pub fn new(
        metric: M,
        lifecycle: Arc<dyn SimulationLifecycle>,
        broker: Arc<dyn MessageBroker>,
        config: SyncConfig,
    ) -> SyncResult<Self> {
        config.validate()?;
        Ok(Self {
            metric,
            lifecycle,
            broker,
            config,
            attachment: None,
            current: None,
            updates: Broadcast::new("metricUpdates"),
            stats: SyncStats::default(),
            last_error: None,
        })
    }

    /// Start watching. Shows the stored aggregate right away when the client
    /// is inside an active simulation, then processes whatever is pending.
    ///
    /// Attaching an attached sync detaches it first.
    pub fn attach(&mut self) -> SyncResult<PumpReport> {
        self.detach();

        let key = self.metric.store_key().to_string();
        let snapshots = self.lifecycle.select_snapshot(&key)?;
        let ids = self.lifecycle.simulation_id_stream();
        let reset = ResetOnRestart::new(key.clone(), self.lifecycle.status_stream());
        self.attachment = Some(Attachment {
            ids,
            snapshots,
            reset,
            topic: None,
        });
        debug!(key = %key, "metric sync attached");

        let rehydrated = RehydrationReader::new(key).read(self.lifecycle.as_ref())?;
        self.present(rehydrated);

        self.process_pending()
    }

    /// Stop watching. Every subscription is cancelled before this returns;
    /// nothing queued for them is processed afterwards.
    pub fn detach(&mut self) {
        if let Some(attachment) = self.attachment.take() {
            drop(attachment);
            debug!(key = %self.metric.store_key(), "metric sync detached");
        }
        self.current = None;
    }

    /// Process everything queued since the last call.
    pub fn process_pending(&mut self) -> SyncResult<PumpReport> {
        let Some(mut attachment) = self.attachment.take() else {
            return Ok(PumpReport::default());
        };
        let result = self.pump(&mut attachment);
        self.attachment = Some(attachment);
        result
    }

    fn pump(&mut self, att: &mut Attachment) -> SyncResult<PumpReport> {
        let mut report = PumpReport::default();

        while let Some(id) = att.ids.try_recv() {
            report.id_changes += 1;
            self.switch_simulation(att, id);
        }

        let (payloads_applied, resets) = self.drain_in_order(att)?;
        report.payloads_applied = payloads_applied;
        report.resets = resets;
        report.presented_changes = self.mirror_store(att);

        Ok(report)
    }

    fn switch_simulation(&mut self, att: &mut Attachment, id: SimulationId) {
        // Close the previous subscription before anything else.
        if let Some(previous) = att.topic.take() {
            debug!(simulation_id = %previous.simulation_id, "superseded by simulation id change");
            drop(previous);
        }

        if id.is_empty() {
            return;
        }
        if !self.lifecycle.client_owns_active_simulation() {
            debug!(simulation_id = %id, "simulation not started by this client; not subscribing");
            return;
        }

        let topic = match self.metric.topic().render(&id) {
            Ok(topic) => topic,
            Err(e) => {
                warn!(simulation_id = %id, error = %e, "cannot derive topic");
                self.stats.subscription_failures += 1;
                self.last_error = Some(e.into());
                return;
            }
        };

        match TopicSubscription::open(Arc::clone(&self.broker), topic.as_str(), self.config.payload_queue_capacity) {
            Ok(subscription) => {
                self.stats.subscriptions_opened += 1;
                att.topic = Some(ActiveTopic {
                    simulation_id: id,
                    subscription,
                });
            }
            Err(e) => {
                warn!(topic = %topic, error = %e, "subscription refused; showing no data");
                self.stats.subscription_failures += 1;
                self.last_error = Some(e.into());
            }
        }
    }

    /// Payloads and status transitions, merged by arrival stamp. Returns
    /// `(payloads applied, resets written)`.
    fn drain_in_order(&mut self, att: &mut Attachment) -> SyncResult<(usize, usize)> {
        let mut applied = 0;
        let mut resets = 0;
        let mut budget = self.config.max_payloads_per_pump;

        loop {
            let Some(active) = att.topic.as_ref() else {
                break;
            };
            if budget == 0 {
                if active.subscription.pending() > 0 {
                    // Transitions newer than the unread payloads wait too.
                    return Ok((applied, resets));
                }
                break;
            }
            let Some((sequence, body)) = active.subscription.try_next_stamped() else {
                break;
            };
            budget -= 1;
            let simulation_id = active.simulation_id.clone();
            let topic = active.subscription.topic().to_string();

            resets += att.reset.process_before(self.lifecycle.as_ref(), sequence)?;

            if !self.lifecycle.is_client_still_in_active_simulation() {
                info!(topic = %topic, "client left the simulation; closing topic subscription");
                att.topic = None;
                break;
            }
            if !self.lifecycle.client_owns_active_simulation() {
                self.stats.unowned_skipped += 1;
                continue;
            }

            match self.reduce(&simulation_id, &topic, &body) {
                Ok(record) => {
                    self.lifecycle
                        .write_snapshot(self.metric.store_key(), SnapshotValue::Aggregate(record))?;
                    self.stats.payloads_applied += 1;
                    applied += 1;
                }
                Err(e) => {
                    warn!(topic = %topic, error = %e, "dropping malformed payload");
                    self.stats.malformed_dropped += 1;
                    self.last_error = Some(e.into());
                }
            }
        }

        resets += att.reset.process_pending(self.lifecycle.as_ref())?;
        Ok((applied, resets))
    }

    fn reduce(&self, simulation_id: &SimulationId, topic: &str, body: &str) -> Result<AggregateRecord, MalformedPayload> {
        let payload: M::Payload = serde_json::from_str(body).map_err(|e| MalformedPayload::Decode {
            topic: topic.to_string(),
            message: e.to_string(),
        })?;
        let output_timestamp = self.format_output_timestamp();
        self.metric.reduce(
            payload,
            &ReduceContext {
                simulation_id,
                output_timestamp: &output_timestamp,
            },
        )
    }

    fn format_output_timestamp(&self) -> String {
        let Some(dt) = self
            .lifecycle
            .output_timestamp()
            .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0))
        else {
            return String::new();
        };
        let mut out = String::new();
        if write!(out, "{}", dt.format(&self.config.timestamp_format)).is_err() {
            warn!(format = %self.config.timestamp_format, "invalid timestamp format");
            return String::new();
        }
        out
    }

    fn mirror_store(&mut self, att: &Attachment) -> usize {
        let mut changes = 0;
        while let Some(value) = att.snapshots.try_recv() {
            if !self.lifecycle.is_client_still_in_active_simulation() {
                continue;
            }
            let SnapshotValue::Aggregate(record) = value else {
                continue;
            };
            if self.present(record.into_present()) {
                changes += 1;
            }
        }
        changes
    }

    fn present(&mut self, next: Option<AggregateRecord>) -> bool {
        if self.current == next {
            return false;
        }
        self.current = next;
        let update = match &self.current {
            Some(record) => MetricUpdate::Aggregate(record.clone()),
            None => MetricUpdate::Cleared,
        };
        self.updates.publish(&update);
        true
    }

    /// The aggregate the view should show; `None` means "no data".
    #[must_use]
    pub fn current_aggregate(&self) -> Option<&AggregateRecord> {
        self.current.as_ref()
    }

    /// Raw stored aggregate, sentinel included.
    pub fn stored_aggregate(&self) -> SyncResult<Option<AggregateRecord>> {
        let value = self.lifecycle.read_snapshot(self.metric.store_key())?;
        Ok(value.and_then(|v| v.as_aggregate().cloned()))
    }

    /// Changes to [`current_aggregate`](Self::current_aggregate), emitted only
    /// when the presented value actually changes.
    #[must_use]
    pub fn updates(&self) -> EventStream<MetricUpdate> {
        self.updates.subscribe()
    }

    /// True between `attach` and `detach`.
    #[must_use]
    pub const fn is_attached(&self) -> bool {
        self.attachment.is_some()
    }

    /// Topic of the open broker subscription.
    #[must_use]
    pub fn live_topic(&self) -> Option<&str> {
        self.attachment
            .as_ref()
            .and_then(|a| a.topic.as_ref())
            .map(|t| t.subscription.topic())
    }

    /// Simulation of the open broker subscription.
    #[must_use]
    pub fn live_simulation_id(&self) -> Option<&SimulationId> {
        self.attachment
            .as_ref()
            .and_then(|a| a.topic.as_ref())
            .map(|t| &t.simulation_id)
    }

    /// Counters since creation.
    #[must_use]
    pub const fn stats(&self) -> SyncStats {
        self.stats
    }

    /// Most recent dropped payload or refused subscription.
    #[must_use]
    pub const fn last_error(&self) -> Option<&SyncError> {
        self.last_error.as_ref()
    }

    /// The metric definition.
    #[must_use]
    pub const fn metric(&self) -> &M {
        &self.metric
    }

    /// The active configuration.
    #[must_use]
    pub const fn config(&self) -> &SyncConfig {
        &self.config
    }
}

impl<M: TopicMetric> Drop for TopicMetricSync<M> {
    fn drop(&mut self) {
        self.detach();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::broker::InMemoryBroker;
    use crate::lifecycle::{SessionLifecycle, SimulationStatus};
    use crate::store::KeyedStore;
    use crate::sync::VoltageViolationMetric;

    struct Fixture {
        session: Arc<SessionLifecycle>,
        broker: Arc<InMemoryBroker>,
        sync: TopicMetricSync<VoltageViolationMetric>,
    }

    fn fixture(config: SyncConfig) -> Fixture {
        let store = Arc::new(KeyedStore::<SnapshotValue>::new());
        let session = Arc::new(SessionLifecycle::new(store).unwrap());
        let broker = Arc::new(InMemoryBroker::new());
        let sync = TopicMetricSync::new(VoltageViolationMetric::new(), session.clone(), broker.clone(), config).unwrap();
        Fixture { session, broker, sync }
    }

    const TOPIC_1: &str = "/topic/goss.gridappsd.simulation.voltage_violation.1.output";

    #[test]
    fn new_rejects_invalid_config() {
        let store = Arc::new(KeyedStore::<SnapshotValue>::new());
        let session = Arc::new(SessionLifecycle::new(store).unwrap());
        let config = SyncConfig {
            max_payloads_per_pump: 0,
            ..SyncConfig::default()
        };
        let err = TopicMetricSync::new(VoltageViolationMetric::new(), session, Arc::new(InMemoryBroker::new()), config)
            .unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn detached_sync_processes_nothing() {
        let mut f = fixture(SyncConfig::default());
        f.session.start_simulation("1", true).unwrap();
        assert!(f.sync.process_pending().unwrap().is_idle());
        assert_eq!(f.broker.live_subscriptions(TOPIC_1), 0);
    }

    #[test]
    fn timestamp_uses_configured_format() {
        let mut f = fixture(SyncConfig {
            timestamp_format: "%H:%M".to_string(),
            ..SyncConfig::default()
        });
        f.sync.attach().unwrap();
        f.session.start_simulation("1", true).unwrap();
        f.session.set_output_timestamp(3_600 + 120).unwrap();
        f.sync.process_pending().unwrap();

        f.broker.publish(TOPIC_1, r#"{"a": 1}"#);
        f.sync.process_pending().unwrap();
        assert_eq!(f.sync.current_aggregate().unwrap().timestamp, "01:02");
    }

    #[test]
    fn unknown_output_time_leaves_timestamp_empty() {
        let mut f = fixture(SyncConfig::default());
        f.sync.attach().unwrap();
        f.session.start_simulation("1", true).unwrap();
        f.sync.process_pending().unwrap();

        f.broker.publish(TOPIC_1, r#"{"a": 0}"#);
        f.sync.process_pending().unwrap();
        let current = f.sync.current_aggregate().unwrap();
        assert_eq!((current.count, current.count_at_zero), (1, 1));
        assert!(current.timestamp.is_empty());
    }

    #[test]
    fn pump_bound_defers_remaining_payloads() {
        let mut f = fixture(SyncConfig {
            max_payloads_per_pump: 2,
            ..SyncConfig::default()
        });
        f.sync.attach().unwrap();
        f.session.start_simulation("1", true).unwrap();
        f.sync.process_pending().unwrap();

        for body in [r#"{"a": 1}"#, r#"{"a": 1, "b": 2}"#, r#"{"a": 1, "b": 2, "c": 3}"#] {
            f.broker.publish(TOPIC_1, body);
        }
        assert_eq!(f.sync.process_pending().unwrap().payloads_applied, 2);
        assert_eq!(f.sync.current_aggregate().unwrap().count, 2);
        assert_eq!(f.sync.process_pending().unwrap().payloads_applied, 1);
        assert_eq!(f.sync.current_aggregate().unwrap().count, 3);
    }

    #[test]
    fn pump_bound_holds_back_later_restart() {
        let mut f = fixture(SyncConfig {
            max_payloads_per_pump: 1,
            ..SyncConfig::default()
        });
        f.sync.attach().unwrap();
        f.session.start_simulation("1", true).unwrap();
        f.sync.process_pending().unwrap();

        f.broker.publish(TOPIC_1, r#"{"a": 1}"#);
        f.broker.publish(TOPIC_1, r#"{"a": 1, "b": 2}"#);
        f.session.set_status(SimulationStatus::Starting).unwrap();

        let first = f.sync.process_pending().unwrap();
        assert_eq!((first.payloads_applied, first.resets), (1, 0));
        let second = f.sync.process_pending().unwrap();
        assert_eq!((second.payloads_applied, second.resets), (1, 1));
        assert_eq!(f.sync.current_aggregate(), None);
        assert!(f.sync.stored_aggregate().unwrap().unwrap().is_sentinel());
    }

    #[test]
    fn updates_emit_only_on_change() {
        let mut f = fixture(SyncConfig::default());
        let updates = f.sync.updates();
        f.sync.attach().unwrap();
        f.session.start_simulation("1", true).unwrap();
        f.sync.process_pending().unwrap();

        f.broker.publish(TOPIC_1, r#"{"a": 1}"#);
        f.broker.publish(TOPIC_1, r#"{"b": 7}"#);
        f.sync.process_pending().unwrap();

        let expected = MetricUpdate::Aggregate(AggregateRecord::new(1, 0, ""));
        assert_eq!(updates.drain(), vec![expected]);
    }

    #[test]
    fn reattach_keeps_single_subscription() {
        let mut f = fixture(SyncConfig::default());
        f.session.start_simulation("1", true).unwrap();
        f.sync.attach().unwrap();
        f.sync.attach().unwrap();
        assert_eq!(f.broker.live_subscriptions(TOPIC_1), 1);
        assert_eq!(f.sync.live_topic(), Some(TOPIC_1));
        assert_eq!(f.sync.stats().subscriptions_opened, 2);
    }

    #[test]
    fn drop_cancels_subscription() {
        let f = fixture(SyncConfig::default());
        let Fixture { session, broker, mut sync } = f;
        session.start_simulation("1", true).unwrap();
        sync.attach().unwrap();
        assert_eq!(broker.live_subscriptions(TOPIC_1), 1);
        drop(sync);
        assert_eq!(broker.live_subscriptions(TOPIC_1), 0);
    }
}
