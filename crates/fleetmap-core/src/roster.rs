// ── Location roster paging ──
//
// The device list behind a location popup. Filter changes replace the
// list from the first page; scrolling to the bottom appends the next
// page. At most one fetch is outstanding per roster: anything requested
// while one is pending (including its debounce window) is dropped, and
// the query is read from the filter when the debounce expires.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use indexmap::IndexSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::config::RosterConfig;
use crate::error::CoreError;
use crate::model::{Device, EntityId, RosterPage, Status};
use crate::source::RosterSource;

/// Shown in place of rows when the roster is empty.
pub const EMPTY_ROSTER_MESSAGE: &str = "No devices found";

// ── RosterFilter ────────────────────────────────────────────────────

/// Search text plus the set of statuses to include.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RosterFilter {
    search: String,
    /// Kept in activation order so the query is stable.
    statuses: IndexSet<Status>,
}

impl RosterFilter {
    pub fn new(search: impl Into<String>, statuses: impl IntoIterator<Item = Status>) -> Self {
        Self {
            search: search.into(),
            statuses: statuses.into_iter().collect(),
        }
    }

    /// Search text as typed.
    pub fn search(&self) -> &str {
        &self.search
    }

    pub fn statuses(&self) -> impl Iterator<Item = Status> + '_ {
        self.statuses.iter().copied()
    }

    pub fn is_active(&self, status: Status) -> bool {
        self.statuses.contains(&status)
    }

    /// Search text as sent to the server: trimmed, lower-cased, and
    /// omitted when blank.
    pub fn query_search(&self) -> Option<String> {
        let trimmed = self.search.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_lowercase())
    }

    /// Flip a status. Returns whether it is now active.
    fn toggle(&mut self, status: Status) -> bool {
        if self.statuses.shift_remove(&status) {
            false
        } else {
            self.statuses.insert(status);
            true
        }
    }
}

// ── Scroll geometry ─────────────────────────────────────────────────

/// Scroll position of the roster list, in pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScrollMetrics {
    pub scroll_top: f64,
    pub client_height: f64,
    pub scroll_height: f64,
}

impl ScrollMetrics {
    pub fn near_bottom(&self, threshold_px: f64) -> bool {
        self.scroll_top + self.client_height >= self.scroll_height - threshold_px
    }
}

// ── Outcomes ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchPolicy {
    /// Start over from the first page.
    Replace,
    /// Append the page behind the stored cursor.
    Append,
}

/// What a roster request ended up doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RosterOutcome {
    Replaced { count: u64, rows: usize },
    Appended { added: usize, rows: usize },
    /// Another fetch was outstanding; this one was not sent.
    Dropped,
    /// There is no further page.
    Exhausted,
    /// The roster was closed before the response was applied.
    Discarded,
    /// Scrolled, but not close enough to the bottom.
    Idle,
}

// ── RosterPaginator ─────────────────────────────────────────────────

#[derive(Debug, Default)]
struct RosterState {
    filter: RosterFilter,
    devices: Vec<Device>,
    count: u64,
    next: Option<String>,
    has_floorplan: bool,
    loaded: bool,
    in_flight: bool,
    /// Bumped on every filter edit.
    filter_generation: u64,
    /// Generation the last replace fetch was sent with.
    sent_generation: u64,
}

impl RosterState {
    fn apply(&mut self, policy: FetchPolicy, page: RosterPage) -> RosterOutcome {
        self.count = page.count;
        self.next = page.next;
        self.has_floorplan = page.has_floorplan;
        self.loaded = true;
        match policy {
            FetchPolicy::Replace => {
                self.devices = page.devices;
                RosterOutcome::Replaced {
                    count: self.count,
                    rows: self.devices.len(),
                }
            }
            FetchPolicy::Append => {
                let added = page.devices.len();
                self.devices.extend(page.devices);
                RosterOutcome::Appended {
                    added,
                    rows: self.devices.len(),
                }
            }
        }
    }
}

enum Request {
    First(RosterFilter),
    Next(String),
}

/// Marks the roster as loading until the fetch settles or its future is
/// dropped, whichever comes first.
struct InFlight<'a> {
    state: &'a Mutex<RosterState>,
    armed: bool,
}

impl<'a> InFlight<'a> {
    /// Claim the single fetch slot. Callers hold the state lock.
    fn claim(state: &mut RosterState, lock: &'a Mutex<RosterState>) -> Self {
        state.in_flight = true;
        Self { state: lock, armed: true }
    }

    fn settle(mut self, state: &mut RosterState) {
        state.in_flight = false;
        self.armed = false;
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.state
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .in_flight = false;
        }
    }
}

/// Paged, filterable device roster of one location.
///
/// Every method takes `&self`, so a paginator can be shared between the
/// input handlers of one popup. Dropping or [`close`](Self::close)-ing it
/// silences any late response.
pub struct RosterPaginator<S> {
    location: EntityId,
    source: Arc<S>,
    config: RosterConfig,
    state: Mutex<RosterState>,
    closed: CancellationToken,
}

impl<S: RosterSource> RosterPaginator<S> {
    pub fn new(location: EntityId, source: Arc<S>, config: RosterConfig) -> Self {
        Self {
            location,
            source,
            config,
            state: Mutex::new(RosterState::default()),
            closed: CancellationToken::new(),
        }
    }

    pub fn location(&self) -> &EntityId {
        &self.location
    }

    // ── Triggers ─────────────────────────────────────────────────────

    /// Load the first page with an empty filter.
    pub async fn open(&self) -> Result<RosterOutcome, CoreError> {
        self.fetch(FetchPolicy::Replace, Duration::ZERO).await
    }

    /// A search keystroke. Debounced.
    pub async fn set_search(&self, text: &str) -> Result<RosterOutcome, CoreError> {
        self.edit_filter(|f| {
            f.search = text.to_owned();
        });
        self.fetch(FetchPolicy::Replace, self.config.search_debounce)
            .await
    }

    /// A status filter toggle. Fires without waiting by default.
    pub async fn toggle_status(&self, status: Status) -> Result<RosterOutcome, CoreError> {
        self.edit_filter(|f| {
            let active = f.toggle(status);
            debug!(%status, active, "status filter toggled");
        });
        self.fetch(FetchPolicy::Replace, self.config.status_debounce)
            .await
    }

    /// Replace the whole filter. A changed search text is debounced like
    /// a keystroke; a status-only change is not.
    pub async fn set_filter(
        &self,
        search: &str,
        statuses: impl IntoIterator<Item = Status>,
    ) -> Result<RosterOutcome, CoreError> {
        let next = RosterFilter::new(search, statuses);
        let mut search_changed = false;
        self.edit_filter(|f| {
            search_changed = f.search != next.search;
            *f = next;
        });
        let delay = if search_changed {
            self.config.search_debounce
        } else {
            self.config.status_debounce
        };
        self.fetch(FetchPolicy::Replace, delay).await
    }

    /// Append the next page, if there is one.
    pub async fn load_more(&self) -> Result<RosterOutcome, CoreError> {
        self.fetch(FetchPolicy::Append, Duration::ZERO).await
    }

    /// A scroll event on the list. Loads more once within the threshold
    /// of the bottom.
    pub async fn on_scroll(&self, metrics: ScrollMetrics) -> Result<RosterOutcome, CoreError> {
        if !metrics.near_bottom(self.config.scroll_threshold_px) {
            return Ok(RosterOutcome::Idle);
        }
        self.fetch(FetchPolicy::Append, self.config.scroll_debounce)
            .await
    }

    /// Stop applying responses. Pending debounced fetches never fire.
    pub fn close(&self) {
        self.closed.cancel();
    }

    // ── Accessors ────────────────────────────────────────────────────

    pub fn devices(&self) -> Vec<Device> {
        self.state().devices.clone()
    }

    /// Total matching devices reported by the server.
    pub fn count(&self) -> u64 {
        self.state().count
    }

    pub fn has_more(&self) -> bool {
        self.state().next.is_some()
    }

    pub fn has_floorplan(&self) -> bool {
        self.state().has_floorplan
    }

    /// Whether the loading indicator should show.
    pub fn is_loading(&self) -> bool {
        self.state().in_flight
    }

    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }

    pub fn filter(&self) -> RosterFilter {
        self.state().filter.clone()
    }

    /// The filter was edited after the last list replacement was sent,
    /// e.g. because the edit arrived while a fetch was outstanding.
    pub fn is_filter_stale(&self) -> bool {
        let state = self.state();
        state.filter_generation != state.sent_generation
    }

    /// A first page has arrived and it had no rows.
    pub fn is_empty(&self) -> bool {
        let state = self.state();
        state.loaded && state.devices.is_empty()
    }

    /// Popup heading, e.g. `Rome (12)`.
    pub fn title(&self, location_name: &str) -> String {
        format!("{location_name} ({})", self.count())
    }

    // ── Fetch cycle ──────────────────────────────────────────────────

    fn state(&self) -> MutexGuard<'_, RosterState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn edit_filter(&self, edit: impl FnOnce(&mut RosterFilter)) {
        let mut state = self.state();
        edit(&mut state.filter);
        state.filter_generation += 1;
    }

    async fn fetch(&self, policy: FetchPolicy, delay: Duration) -> Result<RosterOutcome, CoreError> {
        if self.closed.is_cancelled() {
            return Ok(RosterOutcome::Discarded);
        }
        let loading = {
            let mut state = self.state();
            if state.in_flight {
                debug!(location = %self.location, ?policy, "fetch outstanding, dropping request");
                return Ok(RosterOutcome::Dropped);
            }
            if policy == FetchPolicy::Append && state.next.is_none() {
                return Ok(RosterOutcome::Exhausted);
            }
            InFlight::claim(&mut state, &self.state)
        };

        if !delay.is_zero() {
            tokio::select! {
                biased;
                () = self.closed.cancelled() => {
                    loading.settle(&mut self.state());
                    return Ok(RosterOutcome::Discarded);
                }
                () = tokio::time::sleep(delay) => {}
            }
        }

        // Read the request at fire time so the latest edit wins.
        let request = {
            let mut state = self.state();
            match policy {
                FetchPolicy::Replace => {
                    state.sent_generation = state.filter_generation;
                    Request::First(state.filter.clone())
                }
                FetchPolicy::Append => {
                    if let Some(cursor) = state.next.clone() {
                        Request::Next(cursor)
                    } else {
                        loading.settle(&mut state);
                        return Ok(RosterOutcome::Exhausted);
                    }
                }
            }
        };

        debug!(location = %self.location, ?policy, "fetching roster page");
        let result = match &request {
            Request::First(filter) => self.source.first_page(&self.location, filter).await,
            Request::Next(cursor) => self.source.next_page(cursor).await,
        };

        let mut state = self.state();
        loading.settle(&mut state);
        if self.closed.is_cancelled() {
            debug!(location = %self.location, "roster closed, ignoring late response");
            return Ok(RosterOutcome::Discarded);
        }
        match result {
            Ok(page) => Ok(state.apply(policy, page)),
            Err(e) => {
                warn!(location = %self.location, error = %e, "roster fetch failed");
                Err(e)
            }
        }
    }
}
