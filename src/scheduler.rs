//! Background tasks of the engine: periodic visibility checks, periodic view flushes, and the host
//! lifecycle listener.
use std::{
    sync::{Arc, Weak},
    time::Duration,
};

use derive_more::Display;
use rand::{thread_rng, Rng};
use tokio::{
    sync::watch,
    task::JoinHandle,
    time::{interval_at, Instant, MissedTickBehavior},
};

use crate::engine::{lock, Engine, Inner};

/// Lifecycle state of the host application.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AppState {
    /// Running in the foreground.
    #[display(fmt = "active")]
    Active,
    /// Visible but not receiving events (e.g., during a system dialog).
    #[display(fmt = "inactive")]
    Inactive,
    /// Running in the background.
    #[display(fmt = "background")]
    Background,
}

impl AppState {
    /// Whether the user has left the app. Views are flushed on this transition.
    pub fn is_backgrounded(&self) -> bool {
        matches!(self, AppState::Inactive | AppState::Background)
    }
}

/// Handles of running background tasks. Dropping the scheduler aborts them.
#[derive(Default)]
pub(crate) struct Scheduler {
    ticks: Option<[JoinHandle<()>; 2]>,
    listeners: Vec<JoinHandle<()>>,
}

impl Scheduler {
    fn abort_all(&mut self) {
        for task in self.ticks.take().into_iter().flatten() {
            task.abort();
        }
        for task in self.listeners.drain(..) {
            task.abort();
        }
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.abort_all();
    }
}

/// `tokio::time::interval` panics on a zero period.
const MIN_PERIOD: Duration = Duration::from_millis(1);

impl Engine {
    /// Start periodic visibility checks and view flushes.
    ///
    /// Calling `start()` on a running engine has no effect. Background tasks only hold a weak
    /// reference to the engine and end once every `Engine` handle is dropped.
    ///
    /// # Panics
    ///
    /// Panics if called outside of a Tokio runtime.
    pub fn start(&self) {
        let mut scheduler = lock(&self.inner.scheduler);
        if scheduler.ticks.is_some() {
            return;
        }

        let config = &self.inner.config;
        log::debug!(target: "annecy",
                    visibility_check_interval:debug = config.visibility_check_interval,
                    flush_interval:debug = config.flush_interval;
                    "starting engine");

        let visibility = tokio::spawn(visibility_loop(
            Arc::downgrade(&self.inner),
            config.visibility_check_interval.max(MIN_PERIOD),
        ));
        let flush = tokio::spawn(flush_loop(
            Arc::downgrade(&self.inner),
            config.flush_interval.max(MIN_PERIOD),
            config.flush_jitter,
        ));

        scheduler.ticks = Some([visibility, flush]);
    }

    /// Stop periodic ticks and lifecycle listeners.
    ///
    /// Pending views are not flushed; call [`Engine::flush_views`] first to deliver them.
    pub fn stop(&self) {
        log::debug!(target: "annecy", "stopping engine");
        lock(&self.inner.scheduler).abort_all();
    }

    /// Whether periodic ticks are running.
    pub fn is_running(&self) -> bool {
        lock(&self.inner.scheduler).ticks.is_some()
    }

    /// Follow host lifecycle changes published on `app_states`, flushing views whenever the app
    /// goes inactive or to background. The subscription lasts until [`Engine::stop`].
    ///
    /// # Panics
    ///
    /// Panics if called outside of a Tokio runtime.
    pub fn listen_app_state(&self, app_states: watch::Receiver<AppState>) {
        let task = tokio::spawn(app_state_loop(Arc::downgrade(&self.inner), app_states));
        lock(&self.inner.scheduler).listeners.push(task);
    }
}

async fn visibility_loop(inner: Weak<Inner>, period: Duration) {
    let mut interval = interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        interval.tick().await;
        let Some(inner) = inner.upgrade() else {
            return;
        };
        Engine { inner }.check_visibility();
    }
}

async fn flush_loop(inner: Weak<Inner>, period: Duration, max_jitter: Duration) {
    loop {
        tokio::time::sleep(jitter(period, max_jitter).max(MIN_PERIOD)).await;
        let Some(inner) = inner.upgrade() else {
            return;
        };
        Engine { inner }.send_views();
    }
}

async fn app_state_loop(inner: Weak<Inner>, mut app_states: watch::Receiver<AppState>) {
    while app_states.changed().await.is_ok() {
        let app_state = *app_states.borrow_and_update();
        let Some(inner) = inner.upgrade() else {
            return;
        };
        Engine { inner }.on_app_state_change(app_state);
    }
    log::debug!(target: "annecy", "app state publisher closed");
}

/// Apply randomized `jitter` to `interval`.
fn jitter(interval: Duration, jitter: Duration) -> Duration {
    Duration::saturating_sub(interval, thread_rng().gen_range(Duration::ZERO..=jitter))
}


#[cfg(test)]
mod tests {
    use std::{
        sync::{
            atomic::{AtomicBool, Ordering},
            Arc,
        },
        time::Duration,
    };

    use chrono::{TimeZone, Utc};
    use serde_json::json;
    use tokio::sync::watch;

    use super::AppState;
    use crate::{
        testing::{settle, MockTransport},
        ClientConfig, Configuration, Engine, Offer, VisibilityChecker,
    };

    struct Element {
        offer_id: &'static str,
        on_screen: AtomicBool,
    }

    impl VisibilityChecker for Element {
        fn offer_id(&self) -> &str {
            self.offer_id
        }

        fn is_visible(&self) -> bool {
            self.on_screen.load(Ordering::SeqCst)
        }
    }

    async fn ready_engine(transport: &Arc<MockTransport>) -> Engine {
        transport.reply("/offers", json!({"offers": [], "request_id": "R1"}));
        let engine = Engine::with_clock(
            ClientConfig::new().with_platform("android"),
            transport.clone(),
            Arc::new(|| Utc.timestamp_opt(1_500_000_000, 0).unwrap()),
        );
        engine.init(Configuration::new().with_token("token"));
        engine.get_offers(|_: &[Offer]| {}).await.unwrap();
        engine
    }

    #[test]
    fn backgrounded_states() {
        assert!(!AppState::Active.is_backgrounded());
        assert!(AppState::Inactive.is_backgrounded());
        assert!(AppState::Background.is_backgrounded());
        assert_eq!(AppState::Background.to_string(), "background");
    }

    #[tokio::test(start_paused = true)]
    async fn visibility_tick_runs_checkers_after_scroll() {
        let transport = MockTransport::new();
        let engine = ready_engine(&transport).await;
        let element = Arc::new(Element {
            offer_id: "A",
            on_screen: AtomicBool::new(false),
        });
        engine.add_tracking_checker(element.clone());
        engine.start();

        tokio::time::sleep(Duration::from_millis(900)).await;
        assert!(engine.tracked_views().is_empty());

        element.on_screen.store(true, Ordering::SeqCst);
        // Without a scroll nothing is re-checked.
        tokio::time::sleep(Duration::from_millis(800)).await;
        assert!(engine.tracked_views().is_empty());

        engine.on_scroll();
        tokio::time::sleep(Duration::from_millis(800)).await;
        assert_eq!(engine.tracked_views().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn flush_tick_sends_new_views() {
        let transport = MockTransport::new();
        let engine = ready_engine(&transport).await;
        transport.reply("/views", json!({}));
        engine.start();
        engine.track_offer_id("A");

        tokio::time::sleep(Duration::from_secs(29)).await;
        assert!(transport.requests_to("/views").is_empty());

        tokio::time::sleep(Duration::from_secs(2)).await;
        settle().await;
        assert_eq!(transport.requests_to("/views").len(), 1);

        // Nothing new: later ticks stay silent.
        tokio::time::sleep(Duration::from_secs(61)).await;
        settle().await;
        assert_eq!(transport.requests_to("/views").len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_cancels_ticks() {
        let transport = MockTransport::new();
        let engine = ready_engine(&transport).await;
        engine.start();
        assert!(engine.is_running());

        engine.stop();
        assert!(!engine.is_running());
        engine.track_offer_id("A");
        tokio::time::sleep(Duration::from_secs(31)).await;
        settle().await;

        assert!(transport.requests_to("/views").is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn start_is_idempotent() {
        let transport = MockTransport::new();
        let engine = ready_engine(&transport).await;
        transport.reply("/views", json!({}));
        engine.start();
        engine.start();
        engine.track_offer_id("A");

        tokio::time::sleep(Duration::from_secs(31)).await;
        settle().await;

        assert_eq!(transport.requests_to("/views").len(), 1);
    }

    #[tokio::test]
    async fn going_to_background_flushes_views() {
        let transport = MockTransport::new();
        let engine = ready_engine(&transport).await;
        transport.reply("/views", json!({}));
        engine.track_offer_id("A");

        engine.on_app_state_change(AppState::Active);
        settle().await;
        assert!(transport.requests_to("/views").is_empty());

        engine.on_app_state_change(AppState::Background);
        settle().await;
        assert_eq!(transport.requests_to("/views").len(), 1);
    }

    #[tokio::test]
    async fn listens_to_app_state_changes() {
        let transport = MockTransport::new();
        let engine = ready_engine(&transport).await;
        transport.reply("/views", json!({}));
        let (app_states, receiver) = watch::channel(AppState::Active);
        engine.listen_app_state(receiver);
        engine.track_offer_id("A");

        app_states.send(AppState::Inactive).unwrap();
        settle().await;

        assert_eq!(transport.requests_to("/views").len(), 1);
    }

    #[tokio::test]
    async fn stop_cancels_app_state_listener() {
        let transport = MockTransport::new();
        let engine = ready_engine(&transport).await;
        transport.reply("/views", json!({}));
        let (app_states, receiver) = watch::channel(AppState::Active);
        engine.listen_app_state(receiver);
        settle().await;

        engine.stop();
        settle().await;
        engine.track_offer_id("A");
        let _ = app_states.send(AppState::Background);
        settle().await;

        assert!(transport.requests_to("/views").is_empty());
    }
}
