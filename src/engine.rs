use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use reqwest::Url;

use crate::{
    checker::{LazyOffersListener, VisibilityChecker},
    clock::{epoch_seconds, Clock, SystemClock},
    configuration::RequestParams,
    response::{parse_lazy_offers, OffersResponse},
    scheduler::{AppState, Scheduler},
    transport::{Request, Transport},
    views::{TrackedView, ViewBatch, ViewBuffer},
    ClientConfig, Configuration, Error, Offer, Result,
};

const OFFERS_ENDPOINT: &str = "/offers";
const VIEWS_ENDPOINT: &str = "/views";

/// Fetches offers, resolves lazy offers, and reports offer views.
///
/// An `Engine` is cheap to clone; clones share the same state. All operations that talk to the
/// server spawn Tokio tasks, so the engine must be used from within a Tokio runtime.
///
/// # Lazy listeners
///
/// A [`LazyOffersListener`] is never called for a fetch that has been superseded by a newer
/// [`Engine::get_offers`] call, as long as the engine runs on a current-thread runtime. Listeners
/// are invoked after the engine's lock is released. On a multi-thread runtime, a `get_offers`
/// call that starts on another thread between the staleness check and the callback is not
/// excluded, so the listener may still receive the list of the older fetch once.
///
/// # Examples
/// ```no_run
/// # async fn run() -> annecy::Result<()> {
/// use annecy::{ClientConfig, Configuration};
///
/// let engine = ClientConfig::new().with_platform("ios").to_engine()?;
/// engine.init(Configuration::new().with_country("US").with_token("annecy-media-token"));
/// engine.start();
///
/// let offers = engine
///     .get_offers(|patched: &[annecy::Offer]| println!("{} offers", patched.len()))
///     .await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Engine {
    pub(crate) inner: Arc<Inner>,
}

pub(crate) struct Inner {
    pub(crate) config: ClientConfig,
    transport: Arc<dyn Transport>,
    clock: Arc<dyn Clock>,
    state: Mutex<State>,
    pub(crate) scheduler: Mutex<Scheduler>,
}

struct State {
    configuration: Option<Arc<Configuration>>,
    /// Incremented by every `get_offers()` call. Lazy results from older generations are
    /// discarded.
    generation: u64,
    /// Required for reporting views. Captured from the latest offers response.
    request_id: Option<String>,
    views: ViewBuffer,
    checkers: Vec<Arc<dyn VisibilityChecker>>,
    /// Set by anything that may have changed which offers are on screen.
    needs_check: bool,
}

/// Outcome of a view flush.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flush {
    /// [`Engine::init`] has not been called yet.
    NotInitialized,
    /// No offers response has provided a request id yet.
    NoRequestId,
    /// All tracked views have already been sent.
    NothingNew,
    /// A batch of `views` views has been delivered.
    Sent {
        /// Number of views in the batch.
        views: usize,
    },
}

/// Outcome of a lazy call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LazyResolution {
    /// A newer `get_offers()` call has started; the result was dropped.
    Stale,
    /// The offer list was patched and the listener notified.
    Applied { patched: usize },
}

/// Shared by all lazy calls of one `get_offers()` call.
#[derive(Clone)]
struct LazyBatch {
    generation: u64,
    token: String,
    offers: Arc<Mutex<Vec<Offer>>>,
    listener: Arc<dyn LazyOffersListener>,
}

enum PreparedFlush {
    Skip(Flush),
    Deliver { batch: ViewBatch, token: String },
}

/// Lock `mutex`, ignoring poisoning. State is only mutated in short non-panicking sections.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Engine {
    /// Create a new `Engine` using `transport` for all API calls.
    ///
    /// Use [`ClientConfig::to_engine`] to create an engine talking to the API over HTTP.
    pub fn new(config: ClientConfig, transport: Arc<dyn Transport>) -> Engine {
        Engine::with_clock(config, transport, Arc::new(SystemClock))
    }

    /// Create a new `Engine` that timestamps views using `clock`.
    pub fn with_clock(
        config: ClientConfig,
        transport: Arc<dyn Transport>,
        clock: Arc<dyn Clock>,
    ) -> Engine {
        Engine {
            inner: Arc::new(Inner {
                config,
                transport,
                clock,
                state: Mutex::new(State {
                    configuration: None,
                    generation: 0,
                    request_id: None,
                    views: ViewBuffer::new(),
                    checkers: Vec::new(),
                    needs_check: true,
                }),
                scheduler: Mutex::new(Scheduler::default()),
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, State> {
        lock(&self.inner.state)
    }

    /// Store the user and device configuration.
    ///
    /// Must be called before offers are fetched. Views are not reported until it is.
    pub fn init(&self, configuration: Configuration) {
        log::debug!(target: "annecy",
                    country:display = configuration.country,
                    locale:display = configuration.locale;
                    "initializing engine");
        self.state().configuration = Some(Arc::new(configuration));
    }

    /// Notify the engine that the offer list has scrolled.
    pub fn on_scroll(&self) {
        self.state().needs_check = true;
    }

    /// Register a visibility checker. Registering the same checker twice has no effect.
    pub fn add_tracking_checker(&self, checker: Arc<dyn VisibilityChecker>) {
        let mut state = self.state();
        if !state.checkers.iter().any(|c| same_checker(c, &checker)) {
            state.checkers.push(checker);
        }
        // The element has just been laid out and may already be on screen.
        state.needs_check = true;
    }

    /// Deregister a visibility checker. Does nothing if it is not registered.
    pub fn remove_tracking_checker(&self, checker: &Arc<dyn VisibilityChecker>) {
        self.state().checkers.retain(|c| !same_checker(c, checker));
    }

    /// Record that the offer `offer_id` has been seen. Returns whether a new view was recorded.
    ///
    /// Each offer is recorded once per session (see [`Engine::get_offers`]). Blank identifiers are
    /// ignored.
    pub fn track_offer_id(&self, offer_id: &str) -> bool {
        if offer_id.trim().is_empty() {
            return false;
        }

        let view_time = epoch_seconds(self.inner.clock.now());
        let tracked = self.state().views.track(offer_id, view_time);
        if tracked {
            log::trace!(target: "annecy", offer_id, view_time; "tracked offer view");
        }
        tracked
    }

    /// Views of the current session, both sent and pending.
    pub fn tracked_views(&self) -> Vec<TrackedView> {
        self.state().views.views().to_vec()
    }

    /// Run visibility checkers if anything could have changed since the last run.
    ///
    /// Every visible checker gets its offer tracked and is deregistered. Returns the number of
    /// visible checkers. Called periodically once the engine is [started](Engine::start).
    pub fn check_visibility(&self) -> usize {
        let checkers = {
            let mut state = self.state();
            if !state.needs_check {
                return 0;
            }
            state.needs_check = false;
            state.checkers.clone()
        };

        // Checkers run without the lock held, so they can call back into the engine.
        let mut visible = 0;
        for checker in checkers {
            if checker.is_visible() {
                log::trace!(target: "annecy", offer_id = checker.offer_id(); "offer is on screen");
                self.track_offer_id(checker.offer_id());
                self.remove_tracking_checker(&checker);
                visible += 1;
            }
        }
        visible
    }

    /// Handle a host lifecycle transition. Going inactive or to background flushes views.
    pub fn on_app_state_change(&self, app_state: AppState) {
        log::debug!(target: "annecy", app_state:display; "app state changed");
        if app_state.is_backgrounded() {
            self.send_views();
        }
    }

    /// Fetch offers.
    ///
    /// Starts a new session: pending views are flushed and forgotten. Lazy calls referenced by the
    /// response run in the background; whenever one resolves, `listener` receives the patched
    /// offer list. The returned list does not include lazy patches.
    ///
    /// Lazy results are dropped if `get_offers()` is called again before they arrive.
    ///
    /// # Errors
    ///
    /// - Any transport error of the offers request.
    /// - [`Error::MalformedResponse`] if the response is not an object.
    /// - [`Error::Decode`] if the response fields have unexpected shapes.
    pub async fn get_offers(
        &self,
        listener: impl LazyOffersListener + 'static,
    ) -> Result<Vec<Offer>> {
        let (generation, configuration, pending) = self.start_session();
        self.spawn_delivery(pending);

        let params = RequestParams::new(configuration.as_deref(), &self.inner.config.platform);
        let token = configuration
            .as_ref()
            .map(|configuration| configuration.token.clone())
            .unwrap_or_default();

        log::debug!(target: "annecy", generation; "fetching offers");
        let body = self
            .inner
            .transport
            .send(
                Request::get(OFFERS_ENDPOINT)
                    .with_query(params.to_query())
                    .with_token(token.clone()),
            )
            .await
            .inspect_err(|err| {
                log::warn!(target: "annecy", generation; "error fetching offers: {:?}", err);
            })?;

        let response = OffersResponse::from_value(body).inspect_err(|err| {
            log::warn!(target: "annecy", generation; "error parsing offers response: {:?}", err);
        })?;

        {
            let mut state = self.state();
            if state.generation == generation {
                if let Some(request_id) = response.request_id {
                    state.request_id = Some(request_id);
                }
            }
            state.needs_check = true;
        }

        log::debug!(target: "annecy",
                    generation,
                    offers = response.offers.len(),
                    lazy_calls = response.lazy_calls.len();
                    "fetched offers");

        let offers = response.offers;

        if !response.lazy_calls.is_empty() {
            let batch = LazyBatch {
                generation,
                token,
                offers: Arc::new(Mutex::new(offers.clone())),
                listener: Arc::new(listener),
            };

            for lazy_url in response.lazy_calls {
                let engine = self.clone();
                let batch = batch.clone();
                tokio::spawn(async move {
                    match engine.resolve_lazy(&batch, &lazy_url).await {
                        Ok(LazyResolution::Applied { patched }) => {
                            log::debug!(target: "annecy",
                                        generation = batch.generation,
                                        lazy_url,
                                        patched;
                                        "applied lazy offers");
                        }
                        Ok(LazyResolution::Stale) => {
                            log::debug!(target: "annecy",
                                        generation = batch.generation,
                                        lazy_url;
                                        "dropping lazy offers of a superseded request");
                        }
                        Err(err) => {
                            log::warn!(target: "annecy",
                                       generation = batch.generation,
                                       lazy_url;
                                       "lazy call failed: {:?}", err);
                        }
                    }
                });
            }
        }

        Ok(offers)
    }

    async fn resolve_lazy(&self, batch: &LazyBatch, lazy_url: &str) -> Result<LazyResolution> {
        let url = Url::parse(lazy_url).map_err(Error::InvalidUrl)?;

        let body = self
            .inner
            .transport
            .send(Request::get(url).with_token(batch.token.clone()))
            .await?;

        let lazy_offers = parse_lazy_offers(body)?;

        let (patched, offers) = {
            let mut state = self.state();
            state.needs_check = true;

            if state.generation != batch.generation {
                return Ok(LazyResolution::Stale);
            }

            let mut offers = lock(&batch.offers);
            let mut patched = 0;
            for lazy_offer in &lazy_offers {
                for offer in offers.iter_mut() {
                    if lazy_offer.apply_to(offer) {
                        patched += 1;
                    }
                }
            }
            (patched, offers.clone())
        };

        batch.listener.on_lazy_offers_loaded(&offers);

        Ok(LazyResolution::Applied { patched })
    }

    /// Report new views in the background.
    ///
    /// Failures are logged and dropped. See [`Engine::flush_views`].
    pub fn send_views(&self) {
        self.spawn_delivery(self.prepare_flush());
    }

    fn spawn_delivery(&self, prepared: PreparedFlush) {
        if let PreparedFlush::Deliver { batch, token } = prepared {
            let transport = self.inner.transport.clone();
            tokio::spawn(async move {
                match deliver(transport, batch, token).await {
                    Ok(flush) => {
                        log::debug!(target: "annecy", "views flushed: {:?}", flush);
                    }
                    Err(err) => {
                        log::warn!(target: "annecy", "dropping view batch: {:?}", err);
                    }
                }
            });
        }
    }

    /// Report new views and wait for the server to accept them.
    ///
    /// Views are marked as sent as soon as the batch is assembled, before the request starts. A
    /// failed batch is not retried, and views tracked while the request is in flight are left for
    /// the next flush.
    ///
    /// # Errors
    ///
    /// Any transport error of the views request. The batch is lost in that case.
    pub async fn flush_views(&self) -> Result<Flush> {
        match self.prepare_flush() {
            PreparedFlush::Skip(flush) => Ok(flush),
            PreparedFlush::Deliver { batch, token } => {
                deliver(self.inner.transport.clone(), batch, token).await
            }
        }
    }

    /// Start a new session: collect pending views and forget all views in one critical section,
    /// so nothing tracked in between is lost.
    fn start_session(&self) -> (u64, Option<Arc<Configuration>>, PreparedFlush) {
        let mut state = self.state();
        let pending = self.prepare_flush_locked(&mut state);
        state.views.reset();
        state.needs_check = true;
        state.generation += 1;
        (state.generation, state.configuration.clone(), pending)
    }

    fn prepare_flush(&self) -> PreparedFlush {
        self.prepare_flush_locked(&mut self.state())
    }

    fn prepare_flush_locked(&self, state: &mut State) -> PreparedFlush {
        let Some(configuration) = state.configuration.clone() else {
            return PreparedFlush::Skip(Flush::NotInitialized);
        };
        let Some(request_id) = state.request_id.clone() else {
            return PreparedFlush::Skip(Flush::NoRequestId);
        };

        let offers = state.views.take_new();
        if offers.is_empty() {
            return PreparedFlush::Skip(Flush::NothingNew);
        }

        PreparedFlush::Deliver {
            batch: ViewBatch {
                offers,
                params: RequestParams::new(Some(&configuration), &self.inner.config.platform),
                request_id,
            },
            token: configuration.token.clone(),
        }
    }

    #[cfg(test)]
    fn generation(&self) -> u64 {
        self.state().generation
    }

    #[cfg(test)]
    fn needs_check(&self) -> bool {
        self.state().needs_check
    }
}

async fn deliver(transport: Arc<dyn Transport>, batch: ViewBatch, token: String) -> Result<Flush> {
    let views = batch.offers.len();
    let body = serde_json::to_value(&batch)?;

    log::debug!(target: "annecy", views, request_id:display = batch.request_id; "sending views");
    transport
        .send(Request::post(VIEWS_ENDPOINT, body).with_token(token))
        .await?;

    Ok(Flush::Sent { views })
}

/// Checkers are compared by identity.
fn same_checker(a: &Arc<dyn VisibilityChecker>, b: &Arc<dyn VisibilityChecker>) -> bool {
    std::ptr::eq(Arc::as_ptr(a) as *const (), Arc::as_ptr(b) as *const ())
}
