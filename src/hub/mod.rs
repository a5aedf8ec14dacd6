//! Central event hub
//!
//! The hub decouples the platform's feature domains: producers publish
//! namespaced events, subscribers register patterns, and the hub fans each
//! accepted event out with per-handler fault isolation. One failing
//! subscriber can never prevent the others from seeing an event.
//!
//! # Components
//!
//! - `event` - canonical envelope with priority and propagation fields
//! - `registry` - pattern subscriptions, most-specific-first matching
//! - `history` - bounded ring buffer of accepted events
//! - `errors` - publish errors and per-dispatch failure reports
//!
//! # Publish pipeline
//!
//! validate -> depth ceiling -> history append -> match -> isolated fan-out
//! -> bulk failure logging -> `hub.error.handler` side-channel.
//!
//! # Propagation
//!
//! Handlers responding to an event publish through its [`Propagation`]
//! context (or [`EventHub::publish_derived`]). The derived event's depth is
//! forced to cause + 1 and checked against the configured ceiling, so event
//! loops die out instead of cascading. A cause with `propagate=false`
//! rejects derived publishes outright.
//!
//! No lock is held while handlers run, so handlers may publish, subscribe,
//! and unsubscribe freely.

mod errors;
mod event;
mod history;
mod registry;

pub use errors::{
    DispatchReport, HandlerError, HandlerFailure, PublishError, PublishResult,
};
pub use event::{generate_event_id, Event, Priority};
pub use history::EventHistory;
pub use registry::{Pattern, SubscriptionHandle, SubscriptionRegistry};

use std::collections::BTreeMap;
use std::future::Future;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use futures_util::FutureExt;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::sync::mpsc;

use crate::catalog::CategoryCatalog;
use crate::observability::{LifecycleEvent, MetricsRegistry};

use registry::HandlerSlot;

/// Receiving side of a channel subscription
pub type EventReceiver = mpsc::UnboundedReceiver<Arc<Event>>;

/// Hub tuning knobs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HubConfig {
    /// Ceiling on derived-event depth; a derived publish past this fails
    #[serde(default = "default_max_propagation_depth")]
    pub max_propagation_depth: u32,
    /// Bounded history size; oldest events are evicted beyond this
    #[serde(default = "default_history_capacity")]
    pub history_capacity: usize,
}

fn default_max_propagation_depth() -> u32 {
    5
}

fn default_history_capacity() -> usize {
    1000
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            max_propagation_depth: default_max_propagation_depth(),
            history_capacity: default_history_capacity(),
        }
    }
}

/// Causal publish context handed to synchronous handlers
///
/// Publishing through this context marks the new event as a direct response
/// to the one being handled, which is what the propagation rules act on.
pub struct Propagation<'a> {
    hub: &'a EventHub,
    cause: &'a Event,
}

impl<'a> Propagation<'a> {
    /// The event being handled
    pub fn cause(&self) -> &Event {
        self.cause
    }

    /// Publish a derived event in response to the cause
    pub fn publish(&self, event: Event) -> PublishResult<DispatchReport> {
        self.hub.publish_derived(self.cause, event)
    }
}

/// Per-category subscription and history counts
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryCount {
    pub category: String,
    pub subscriptions: usize,
    pub events: usize,
}

/// The central dispatcher
///
/// Constructed explicitly and shared as `Arc<EventHub>`; there is no
/// process-global instance.
pub struct EventHub {
    config: HubConfig,
    registry: SubscriptionRegistry,
    history: EventHistory,
    catalog: Arc<CategoryCatalog>,
    metrics: Arc<MetricsRegistry>,
}

impl EventHub {
    /// Create a hub with the builtin catalog and a fresh metrics registry
    pub fn new(config: HubConfig) -> Self {
        Self::with_parts(
            config,
            Arc::new(CategoryCatalog::builtin()),
            Arc::new(MetricsRegistry::new()),
        )
    }

    /// Create a hub with injected catalog and metrics
    pub fn with_parts(
        config: HubConfig,
        catalog: Arc<CategoryCatalog>,
        metrics: Arc<MetricsRegistry>,
    ) -> Self {
        let history = EventHistory::new(config.history_capacity);
        Self {
            config,
            registry: SubscriptionRegistry::new(),
            history,
            catalog,
            metrics,
        }
    }

    /// The hub's configuration
    pub fn config(&self) -> &HubConfig {
        &self.config
    }

    /// The shared category catalog
    pub fn catalog(&self) -> &Arc<CategoryCatalog> {
        &self.catalog
    }

    /// The shared metrics registry
    pub fn metrics(&self) -> &Arc<MetricsRegistry> {
        &self.metrics
    }

    // ==================== Subscriptions ====================

    /// Register a synchronous handler
    ///
    /// The handler runs inline during publish. Errors and panics are
    /// captured per handler and never reach the publisher.
    pub fn subscribe<F>(&self, pattern: &str, subscriber_id: &str, handler: F) -> SubscriptionHandle
    where
        F: Fn(&Event, &Propagation<'_>) -> Result<(), HandlerError> + Send + Sync + 'static,
    {
        self.record_subscription(
            pattern,
            subscriber_id,
            self.registry
                .subscribe_slot(pattern, subscriber_id, HandlerSlot::Sync(Arc::new(handler))),
        )
    }

    /// Register a channel subscription
    ///
    /// Matching events arrive as `Arc<Event>` on the returned receiver.
    /// Delivery is fire-and-forget: publish never waits on the consumer.
    pub fn subscribe_channel(
        &self,
        pattern: &str,
        subscriber_id: &str,
    ) -> (SubscriptionHandle, EventReceiver) {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = self.record_subscription(
            pattern,
            subscriber_id,
            self.registry
                .subscribe_slot(pattern, subscriber_id, HandlerSlot::Channel(tx)),
        );
        (handle, rx)
    }

    /// Register an asynchronous handler on a dedicated worker task
    ///
    /// The worker drains a channel subscription and runs the handler per
    /// event. Errors and panics are captured per event and reported through
    /// [`EventHub::report_handler_failure`].
    pub fn subscribe_task<F, Fut>(
        self: &Arc<Self>,
        pattern: &str,
        subscriber_id: &str,
        handler: F,
    ) -> SubscriptionHandle
    where
        F: Fn(Arc<Event>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), HandlerError>> + Send + 'static,
    {
        let (handle, mut rx) = self.subscribe_channel(pattern, subscriber_id);
        let hub = Arc::clone(self);
        let label = subscriber_id.to_string();

        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                let outcome = AssertUnwindSafe(handler(Arc::clone(&event)))
                    .catch_unwind()
                    .await;
                match outcome {
                    Ok(Ok(())) => {}
                    Ok(Err(error)) => hub.report_handler_failure(&label, &event, error),
                    Err(_) => hub.report_handler_failure(
                        &label,
                        &event,
                        HandlerError::msg("handler panicked"),
                    ),
                }
            }
        });

        handle
    }

    fn record_subscription(
        &self,
        pattern: &str,
        subscriber_id: &str,
        handle: SubscriptionHandle,
    ) -> SubscriptionHandle {
        self.metrics.increment_subscriptions();
        LifecycleEvent::SubscriptionAdded.emit(&[
            ("pattern", pattern),
            ("subscriber", subscriber_id),
        ]);
        handle
    }

    /// Remove a subscription; unknown handles are a no-op
    pub fn unsubscribe(&self, handle: &SubscriptionHandle) {
        if self.registry.unsubscribe(handle) {
            self.metrics.decrement_subscriptions();
            LifecycleEvent::SubscriptionRemoved.emit(&[("handle", &handle.to_string())]);
        }
    }

    /// Remove every subscription registered under a subscriber id
    pub fn unsubscribe_all(&self, subscriber_id: &str) -> usize {
        let removed = self.registry.unsubscribe_all(subscriber_id);
        for _ in 0..removed {
            self.metrics.decrement_subscriptions();
        }
        if removed > 0 {
            LifecycleEvent::SubscriptionRemoved.emit(&[
                ("count", &removed.to_string()),
                ("subscriber", subscriber_id),
            ]);
        }
        removed
    }

    /// Number of live subscriptions
    pub fn subscription_count(&self) -> usize {
        self.registry.len()
    }

    // ==================== Publish ====================

    /// Validate, record, and fan out an event
    ///
    /// Synchronous handlers complete before this returns; channel and task
    /// subscribers are handed the event without waiting. Handler failures
    /// are in the report, never in the Err: an Err means the event itself
    /// was rejected and reached no subscriber.
    pub fn publish(&self, event: Event) -> PublishResult<DispatchReport> {
        if let Err(error) = event.validate() {
            self.metrics.increment_events_rejected();
            LifecycleEvent::EventRejected.emit(&[
                ("error", &error.to_string()),
                ("source", &event.source),
                ("type", &event.event_type),
            ]);
            return Err(error);
        }

        let max = self.config.max_propagation_depth;
        if event.propagation_depth > max {
            self.metrics.increment_events_rejected();
            self.metrics.increment_propagation_rejections();
            LifecycleEvent::PropagationLimit.emit(&[
                ("depth", &event.propagation_depth.to_string()),
                ("id", &event.id),
                ("max", &max.to_string()),
                ("type", &event.event_type),
            ]);
            return Err(PublishError::PropagationLimitExceeded {
                event_type: event.event_type.clone(),
                depth: event.propagation_depth,
                max,
            });
        }

        let event = Arc::new(event);
        self.history.append(Arc::clone(&event));
        self.metrics.increment_events_published();
        LifecycleEvent::EventPublished.emit(&[("id", &event.id), ("type", &event.event_type)]);

        Ok(self.dispatch(&event))
    }

    /// Publish a derived event in direct response to `cause`
    ///
    /// The derived depth is forced to `cause.propagation_depth + 1`; the
    /// ceiling check in [`EventHub::publish`] then applies. Fails fast with
    /// `PropagationDisabled` when the cause forbids responses.
    pub fn publish_derived(
        &self,
        cause: &Event,
        mut event: Event,
    ) -> PublishResult<DispatchReport> {
        if !cause.propagate {
            self.metrics.increment_events_rejected();
            self.metrics.increment_propagation_rejections();
            LifecycleEvent::PropagationDenied.emit(&[
                ("cause_id", &cause.id),
                ("cause_type", &cause.event_type),
                ("type", &event.event_type),
            ]);
            return Err(PublishError::PropagationDisabled {
                cause_id: cause.id.clone(),
                cause_type: cause.event_type.clone(),
            });
        }

        event.propagation_depth = cause.propagation_depth.saturating_add(1);
        self.publish(event)
    }

    fn dispatch(&self, event: &Arc<Event>) -> DispatchReport {
        let matched = self.registry.matching(&event.event_type);

        let mut report = DispatchReport {
            matched: matched.len(),
            ..DispatchReport::default()
        };
        self.metrics.add_handlers_invoked(matched.len() as u64);

        // (subscriber, error, panicked) captured during the loop, logged
        // in bulk afterwards
        let mut captured: Vec<(String, HandlerError, bool)> = Vec::new();
        let mut dead: Vec<SubscriptionHandle> = Vec::new();

        for subscription in matched {
            match subscription.slot {
                HandlerSlot::Sync(handler) => {
                    let cause: &Event = event;
                    let propagation = Propagation { hub: self, cause };
                    let outcome =
                        catch_unwind(AssertUnwindSafe(|| handler(cause, &propagation)));
                    match outcome {
                        Ok(Ok(())) => report.delivered += 1,
                        Ok(Err(error)) => {
                            captured.push((subscription.subscriber_id, error, false));
                        }
                        Err(_) => {
                            captured.push((
                                subscription.subscriber_id,
                                HandlerError::msg("handler panicked"),
                                true,
                            ));
                        }
                    }
                }
                HandlerSlot::Channel(sender) => {
                    if sender.send(Arc::clone(event)).is_ok() {
                        report.delivered += 1;
                    } else {
                        captured.push((
                            subscription.subscriber_id,
                            HandlerError::msg("channel closed"),
                            false,
                        ));
                        dead.push(subscription.handle);
                    }
                }
            }
        }

        for (subscriber_id, error, panicked) in captured {
            self.metrics.increment_handler_failures();
            let lifecycle = if panicked {
                LifecycleEvent::HandlerPanicked
            } else {
                LifecycleEvent::HandlerFailed
            };
            lifecycle.emit(&[
                ("error", error.message()),
                ("event_id", &event.id),
                ("subscriber", &subscriber_id),
                ("type", &event.event_type),
            ]);
            self.emit_handler_error_event(&subscriber_id, event, &error);

            report.failed += 1;
            report.failures.push(HandlerFailure {
                subscriber_id,
                error,
            });
        }

        for handle in dead {
            if self.registry.unsubscribe(&handle) {
                self.metrics.decrement_subscriptions();
                LifecycleEvent::SubscriptionPruned.emit(&[("handle", &handle.to_string())]);
            }
        }

        report
    }

    /// Report a failure from a channel or task consumer
    ///
    /// Channel consumers run after publish has returned; this is their path
    /// into the same logs, metrics, and error side-channel that inline
    /// handlers get.
    pub fn report_handler_failure(&self, subscriber_id: &str, event: &Event, error: HandlerError) {
        self.metrics.increment_handler_failures();
        LifecycleEvent::HandlerFailed.emit(&[
            ("error", error.message()),
            ("event_id", &event.id),
            ("subscriber", subscriber_id),
            ("type", &event.event_type),
        ]);
        self.emit_handler_error_event(subscriber_id, event, &error);
    }

    /// Mirror a handler failure onto the `hub.error.handler` side-channel
    ///
    /// Failures while handling a `hub.` event stay in the logs only, so an
    /// error event can never beget another error event.
    fn emit_handler_error_event(&self, subscriber_id: &str, failed: &Event, error: &HandlerError) {
        if failed.event_type.starts_with("hub.") {
            return;
        }

        let error_event = Event::new(
            "hub",
            "hub.error.handler",
            json!({
                "eventId": failed.id,
                "eventType": failed.event_type,
                "subscriberId": subscriber_id,
                "error": error.message(),
            }),
        )
        .with_propagate(false);

        // Best effort: the side-channel never affects the original caller
        let _ = self.publish(error_event);
    }

    // ==================== Introspection ====================

    /// Snapshot of buffered history, oldest first
    pub fn history(&self) -> Vec<Arc<Event>> {
        self.history.snapshot()
    }

    /// History filtered by exact type and/or source, oldest first
    pub fn history_filtered(
        &self,
        event_type: Option<&str>,
        source: Option<&str>,
    ) -> Vec<Arc<Event>> {
        self.history.filtered(event_type, source)
    }

    /// Number of buffered history events
    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    /// Per-category counts of live subscriptions and buffered events
    ///
    /// Every catalog domain appears (zeros included). Domains outside the
    /// catalog group under `other`; global `*` subscriptions under
    /// `global`.
    pub fn counts_by_category(&self) -> Vec<CategoryCount> {
        let subscription_counts = self.registry.domain_counts();
        let event_counts = self.history.domain_counts();

        let mut buckets: BTreeMap<String, (usize, usize)> = self
            .catalog
            .ids()
            .into_iter()
            .map(|id| (id, (0, 0)))
            .collect();

        for (domain, count) in subscription_counts {
            let key = self.bucket_for(&domain);
            buckets.entry(key).or_insert((0, 0)).0 += count;
        }
        for (domain, count) in event_counts {
            let key = self.bucket_for(&domain);
            buckets.entry(key).or_insert((0, 0)).1 += count;
        }

        buckets
            .into_iter()
            .map(|(category, (subscriptions, events))| CategoryCount {
                category,
                subscriptions,
                events,
            })
            .collect()
    }

    fn bucket_for(&self, domain: &str) -> String {
        if domain == "*" {
            "global".to_string()
        } else if self.catalog.contains(domain) {
            domain.to_string()
        } else {
            "other".to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    fn hub() -> EventHub {
        EventHub::new(HubConfig::default())
    }

    fn small_hub(history_capacity: usize) -> EventHub {
        EventHub::new(HubConfig {
            max_propagation_depth: 5,
            history_capacity,
        })
    }

    fn event(event_type: &str) -> Event {
        Event::new("test", event_type, json!({}))
    }

    #[test]
    fn test_publish_delivers_to_matching_subscriber() {
        let hub = hub();
        let calls = Arc::new(AtomicUsize::new(0));

        let calls_clone = Arc::clone(&calls);
        hub.subscribe("social.*", "counter", move |_, _| {
            calls_clone.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        let report = hub.publish(event("social.post.created")).unwrap();
        assert_eq!(report.matched, 1);
        assert_eq!(report.delivered, 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        // Non-matching type reaches nobody
        let report = hub.publish(event("iot.sensor.read")).unwrap();
        assert_eq!(report.matched, 0);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_failing_handler_isolated_from_others() {
        let hub = hub();
        let calls = Arc::new(AtomicUsize::new(0));

        for i in 0..5 {
            let calls_clone = Arc::clone(&calls);
            hub.subscribe("a.b.c", &format!("sub-{}", i), move |_, _| {
                if i == 2 {
                    return Err(HandlerError::msg("simulated failure"));
                }
                calls_clone.fetch_add(1, Ordering::SeqCst);
                Ok(())
            });
        }

        let report = hub.publish(event("a.b.c")).unwrap();

        assert_eq!(report.matched, 5);
        assert_eq!(report.delivered, 4);
        assert_eq!(report.failed, 1);
        assert_eq!(report.failures[0].subscriber_id, "sub-2");
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn test_panicking_handler_isolated_from_others() {
        let hub = hub();
        let calls = Arc::new(AtomicUsize::new(0));

        hub.subscribe("a.b.c", "bomber", |_, _| panic!("boom"));
        let calls_clone = Arc::clone(&calls);
        hub.subscribe("a.b.c", "survivor", move |_, _| {
            calls_clone.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        let report = hub.publish(event("a.b.c")).unwrap();
        assert_eq!(report.failed, 1);
        assert_eq!(report.delivered, 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(report.failures[0].error.message(), "handler panicked");
    }

    #[test]
    fn test_handlers_run_most_specific_first() {
        let hub = hub();
        let order = Arc::new(Mutex::new(Vec::new()));

        for (pattern, label) in [("*", "global"), ("a.*", "domain"), ("a.b.c", "exact")] {
            let order_clone = Arc::clone(&order);
            hub.subscribe(pattern, label, move |_, _| {
                order_clone.lock().unwrap().push(label);
                Ok(())
            });
        }

        hub.publish(event("a.b.c")).unwrap();

        assert_eq!(*order.lock().unwrap(), vec!["exact", "domain", "global"]);
    }

    #[test]
    fn test_invalid_event_rejected_and_not_recorded() {
        let hub = hub();

        let result = hub.publish(event(""));
        assert!(matches!(result, Err(PublishError::InvalidEvent(_))));
        assert_eq!(hub.history_len(), 0);
    }

    #[test]
    fn test_derived_publish_increments_depth() {
        let hub = hub();
        let (_handle, mut rx) = hub.subscribe_channel("a.derived", "observer");

        hub.subscribe("a.trigger", "responder", |_, propagation| {
            propagation.publish(Event::new("test", "a.derived", json!({})))?;
            Ok(())
        });

        hub.publish(event("a.trigger")).unwrap();

        let derived = rx.try_recv().unwrap();
        assert_eq!(derived.propagation_depth, 1);
    }

    #[test]
    fn test_propagation_limit_rejects_and_skips_history() {
        let hub = hub();

        let mut cause = event("a.trigger");
        cause.propagation_depth = 5;
        // The cause itself is at the ceiling and publishable
        hub.publish(cause.clone()).unwrap();
        assert_eq!(hub.history_len(), 1);

        let result = hub.publish_derived(&cause, event("a.derived"));
        assert!(matches!(
            result,
            Err(PublishError::PropagationLimitExceeded { depth: 6, max: 5, .. })
        ));
        // The derived event was never recorded
        assert_eq!(hub.history_len(), 1);
    }

    #[test]
    fn test_propagation_limit_never_dispatches() {
        let hub = hub();
        let calls = Arc::new(AtomicUsize::new(0));

        let calls_clone = Arc::clone(&calls);
        hub.subscribe("a.derived", "observer", move |_, _| {
            calls_clone.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        let mut cause = event("a.trigger");
        cause.propagation_depth = 5;

        assert!(hub.publish_derived(&cause, event("a.derived")).is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_propagate_false_blocks_derived_publish() {
        let hub = hub();

        let cause = event("a.trigger").with_propagate(false);
        hub.publish(cause.clone()).unwrap();

        let result = hub.publish_derived(&cause, event("a.derived"));
        assert!(matches!(
            result,
            Err(PublishError::PropagationDisabled { .. })
        ));

        // Derived event is absent from history
        assert!(hub.history_filtered(Some("a.derived"), None).is_empty());
    }

    #[test]
    fn test_history_bounded_to_capacity() {
        let hub = small_hub(10);

        for n in 0..60 {
            hub.publish(Event::new("test", "a.b.c", json!({ "n": n })))
                .unwrap();
        }

        let history = hub.history();
        assert_eq!(history.len(), 10);
        assert_eq!(history[0].data["n"], 50);
        assert_eq!(history[9].data["n"], 59);
    }

    #[tokio::test]
    async fn test_channel_subscription_receives_events() {
        let hub = hub();
        let (_handle, mut rx) = hub.subscribe_channel("iot.*", "collector");

        hub.publish(event("iot.sensor.read")).unwrap();

        let received = rx.recv().await.unwrap();
        assert_eq!(received.event_type, "iot.sensor.read");
    }

    #[test]
    fn test_dead_channel_pruned_on_publish() {
        let hub = hub();
        let (_handle, rx) = hub.subscribe_channel("a.*", "gone");
        drop(rx);

        let report = hub.publish(event("a.b.c")).unwrap();
        assert_eq!(report.matched, 1);
        assert_eq!(report.failed, 1);

        // Subscription was pruned; the next publish matches nothing
        let report = hub.publish(event("a.b.c")).unwrap();
        assert_eq!(report.matched, 0);
        assert_eq!(hub.subscription_count(), 0);
    }

    #[test]
    fn test_unsubscribe_stops_delivery() {
        let hub = hub();
        let calls = Arc::new(AtomicUsize::new(0));

        let calls_clone = Arc::clone(&calls);
        let handle = hub.subscribe("a.*", "sub", move |_, _| {
            calls_clone.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        hub.publish(event("a.b.c")).unwrap();
        hub.unsubscribe(&handle);
        // Idempotent
        hub.unsubscribe(&handle);
        hub.publish(event("a.b.c")).unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_handler_failure_emits_hub_error_event() {
        let hub = hub();
        let (_handle, mut rx) = hub.subscribe_channel("hub.error.handler", "watcher");

        hub.subscribe("a.b.c", "broken", |_, _| Err(HandlerError::msg("boom")));
        hub.publish(event("a.b.c")).unwrap();

        let error_event = rx.try_recv().unwrap();
        assert_eq!(error_event.event_type, "hub.error.handler");
        assert_eq!(error_event.data["subscriberId"], "broken");
        assert_eq!(error_event.data["error"], "boom");
        assert!(!error_event.propagate);
    }

    #[test]
    fn test_hub_error_failures_do_not_recurse() {
        let hub = hub();

        // Fails on everything, including hub.error.handler itself
        hub.subscribe("*", "always-broken", |_, _| Err(HandlerError::msg("no")));

        // Terminates: failures on hub.* events log without emitting more
        // error events
        let report = hub.publish(event("a.b.c")).unwrap();
        assert_eq!(report.failed, 1);

        let error_events = hub.history_filtered(Some("hub.error.handler"), None);
        assert_eq!(error_events.len(), 1);
    }

    #[test]
    fn test_counts_by_category() {
        let hub = hub();

        hub.subscribe("social.*", "a", |_, _| Ok(()));
        hub.subscribe("social.post.created", "b", |_, _| Ok(()));
        hub.subscribe("*", "c", |_, _| Ok(()));

        hub.publish(event("social.post.created")).unwrap();
        hub.publish(event("mystery.thing.happened")).unwrap();

        let counts = hub.counts_by_category();
        let find = |category: &str| {
            counts
                .iter()
                .find(|c| c.category == category)
                .cloned()
                .unwrap_or_else(|| panic!("missing bucket {}", category))
        };

        assert_eq!(find("social").subscriptions, 2);
        assert_eq!(find("social").events, 1);
        assert_eq!(find("global").subscriptions, 1);
        assert_eq!(find("other").events, 1);
        // Catalog domains with no activity still appear
        assert_eq!(find("quantum").subscriptions, 0);
    }

    #[tokio::test]
    async fn test_task_subscription_runs_handler() {
        let hub = Arc::new(hub());
        let calls = Arc::new(AtomicUsize::new(0));

        let calls_clone = Arc::clone(&calls);
        hub.subscribe_task("gaming.*", "worker", move |event| {
            let calls = Arc::clone(&calls_clone);
            async move {
                assert_eq!(event.event_type, "gaming.match.finished");
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        });

        hub.publish(event("gaming.match.finished")).unwrap();

        // The worker runs on a spawned task; yield until it has
        for _ in 0..50 {
            if calls.load(Ordering::SeqCst) == 1 {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(2)).await;
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
