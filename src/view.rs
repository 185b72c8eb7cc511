//! Settlement screen state: one fetched snapshot, client-side filters per
//! tab, and the guarded mark-as-paid command.
//!
//! No operation here returns an error. Every failure is reported through the
//! outcome enums and leaves the already-loaded snapshot in place.
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info, instrument, warn};

use crate::api::routing::RouteClass;
use crate::api::SettlementService;
use crate::credentials::{revoke_after_unauthorized, CredentialStore};
use crate::error::ApiError;
use crate::model::{PayoutTarget, Role, Tab};
use crate::settlement::{
    compute_filtered_rows, format_inr, row_key, summary_metrics, total_pages,
    EventSettlementRow, GymSettlementRow, Page, SettlementOverview, SummaryMetrics,
    DEFAULT_PAGE_SIZE,
};

pub const GENERIC_FETCH_ERROR: &str = "Failed to load settlements. Please try again.";
pub const GENERIC_MARK_PAID_ERROR: &str = "Failed to mark payout as paid.";
pub const SESSION_EXPIRED: &str = "Admin session expired. Please log in again.";
pub const NOTHING_TO_SETTLE: &str = "Nothing to settle: net payable must be greater than zero.";

/// One fetch cycle. Data loaded earlier rides along in `Loading` and `Failed`
/// so it stays on screen during a refresh and after a failed one.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum FetchState {
    #[default]
    Idle,
    Loading {
        previous: Option<Arc<SettlementOverview>>,
    },
    Loaded(Arc<SettlementOverview>),
    Failed {
        message: String,
        previous: Option<Arc<SettlementOverview>>,
    },
}

impl FetchState {
    pub fn snapshot(&self) -> Option<&Arc<SettlementOverview>> {
        match self {
            FetchState::Idle => None,
            FetchState::Loading { previous } | FetchState::Failed { previous, .. } => {
                previous.as_ref()
            }
            FetchState::Loaded(snapshot) => Some(snapshot),
        }
    }

    pub fn is_loading(&self) -> bool {
        matches!(self, FetchState::Loading { .. })
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            FetchState::Failed { message, .. } => Some(message),
            _ => None,
        }
    }

    fn loading(&self) -> Self {
        FetchState::Loading {
            previous: self.snapshot().cloned(),
        }
    }

    fn failed(&self, message: String) -> Self {
        FetchState::Failed {
            message,
            previous: self.snapshot().cloned(),
        }
    }
}

/// Search, threshold, active tab and one page cursor per tab.
#[derive(Debug, Clone, PartialEq)]
pub struct Filters {
    tab: Tab,
    search: String,
    min_net: Option<f64>,
    gym_page: usize,
    event_page: usize,
}

impl Default for Filters {
    fn default() -> Self {
        Self {
            tab: Tab::Gyms,
            search: String::new(),
            min_net: None,
            gym_page: 1,
            event_page: 1,
        }
    }
}

impl Filters {
    pub fn tab(&self) -> Tab {
        self.tab
    }

    pub fn search(&self) -> &str {
        &self.search
    }

    pub fn min_net(&self) -> Option<f64> {
        self.min_net
    }

    pub fn page_of(&self, tab: Tab) -> usize {
        match tab {
            Tab::Gyms => self.gym_page,
            Tab::Events => self.event_page,
        }
    }

    /// Page of the active tab.
    pub fn page(&self) -> usize {
        self.page_of(self.tab)
    }

    fn page_mut(&mut self) -> &mut usize {
        match self.tab {
            Tab::Gyms => &mut self.gym_page,
            Tab::Events => &mut self.event_page,
        }
    }

    pub fn set_page(&mut self, page: usize) {
        *self.page_mut() = page;
    }

    pub fn set_search(&mut self, search: &str) {
        if self.search != search {
            self.search = search.to_string();
            self.set_page(1);
        }
    }

    pub fn set_min_net(&mut self, min_net: Option<f64>) {
        if self.min_net != min_net {
            self.min_net = min_net;
            self.set_page(1);
        }
    }

    pub fn set_tab(&mut self, tab: Tab) {
        if self.tab != tab {
            self.tab = tab;
            self.set_page(1);
        }
    }

    /// Drop search and threshold; the "clear filters" action of an empty result.
    pub fn clear(&mut self) {
        self.set_search("");
        self.set_min_net(None);
    }
}

/// What the operator is asked before a payout is recorded.
#[derive(Debug, Clone, PartialEq)]
pub struct PayoutPrompt {
    pub target: PayoutTarget,
    pub id: String,
    pub display_name: String,
    pub amount: f64,
}

impl PayoutPrompt {
    pub fn message(&self) -> String {
        format!(
            "Mark {} as paid to {}?",
            format_inr(self.amount),
            self.display_name
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Confirmation {
    /// Go ahead; the note is sent verbatim, possibly empty.
    Approved { note: String },
    Declined,
}

/// Blocking yes/no question put to the operator.
#[async_trait]
pub trait PayoutConfirmation: Send + Sync {
    async fn confirm(&self, prompt: &PayoutPrompt) -> Confirmation;
}

/// Approves every prompt with a fixed note.
#[derive(Debug, Clone, Default)]
pub struct AutoConfirm {
    pub note: String,
}

#[async_trait]
impl PayoutConfirmation for AutoConfirm {
    async fn confirm(&self, _prompt: &PayoutPrompt) -> Confirmation {
        Confirmation::Approved {
            note: self.note.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    Loaded,
    /// Retryable; the message is safe to show.
    Failed(String),
    /// The credential was cleared; send the operator to this role's login.
    LoginRequired(Role),
    /// The view was torn down before the response arrived.
    Discarded,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MarkPaidOutcome {
    Paid {
        message: Option<String>,
        refresh: FetchOutcome,
    },
    /// Rejected before any network call.
    Invalid(String),
    Declined,
    /// A request for this row is still outstanding.
    InFlight,
    Failed(String),
    LoginRequired(Role),
}

#[derive(Debug, Default)]
struct ViewState {
    fetch: FetchState,
    filters: Filters,
    marking: HashSet<String>,
}

pub struct SettlementView {
    service: Arc<dyn SettlementService>,
    store: Arc<dyn CredentialStore>,
    page_size: usize,
    state: Mutex<ViewState>,
    mounted: AtomicBool,
}

/// Clears a row's in-progress mark when the request finishes or is dropped.
struct MarkingGuard<'a> {
    view: &'a SettlementView,
    key: String,
}

impl Drop for MarkingGuard<'_> {
    fn drop(&mut self) {
        self.view.state().marking.remove(&self.key);
    }
}

impl SettlementView {
    pub fn new(service: Arc<dyn SettlementService>, store: Arc<dyn CredentialStore>) -> Self {
        Self::with_page_size(service, store, DEFAULT_PAGE_SIZE)
    }

    pub fn with_page_size(
        service: Arc<dyn SettlementService>,
        store: Arc<dyn CredentialStore>,
        page_size: usize,
    ) -> Self {
        Self {
            service,
            store,
            page_size: page_size.max(1),
            state: Mutex::new(ViewState::default()),
            mounted: AtomicBool::new(true),
        }
    }

    fn state(&self) -> MutexGuard<'_, ViewState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn is_mounted(&self) -> bool {
        self.mounted.load(Ordering::SeqCst)
    }

    /// Tear the view down. Responses arriving afterwards are dropped.
    pub fn unmount(&self) {
        self.mounted.store(false, Ordering::SeqCst);
    }

    pub fn fetch_state(&self) -> FetchState {
        self.state().fetch.clone()
    }

    pub fn snapshot(&self) -> Option<Arc<SettlementOverview>> {
        self.state().fetch.snapshot().cloned()
    }

    pub fn filters(&self) -> Filters {
        self.state().filters.clone()
    }

    pub fn metrics(&self) -> Option<SummaryMetrics> {
        self.snapshot().map(|s| summary_metrics(&s))
    }

    pub fn is_marking(&self, target: PayoutTarget, id: &str) -> bool {
        self.state().marking.contains(&row_key(target, id))
    }

    async fn handle_unauthorized(&self, class: RouteClass) -> Role {
        match revoke_after_unauthorized(self.store.as_ref(), class).await {
            Ok(Some(role)) => role,
            // Settlement endpoints are all admin routes.
            Ok(None) => Role::Admin,
            Err(err) => {
                warn!(?err, %class, "failed to clear credential after 401");
                class.guarded_role().unwrap_or(Role::Admin)
            }
        }
    }

    /// Fetch the full snapshot and replace the current one in a single step.
    /// Concurrent calls race and the last response to arrive wins.
    #[instrument(skip_all)]
    pub async fn fetch_overview(&self) -> FetchOutcome {
        if !self.is_mounted() {
            return FetchOutcome::Discarded;
        }
        {
            let mut st = self.state();
            st.fetch = st.fetch.loading();
        }

        let result = self.service.fetch_overview().await;
        if !self.is_mounted() {
            // The credential store outlives the view; a rejected token is
            // still dropped even though the view state is not touched.
            if let Err(ApiError::Unauthorized { class }) = &result {
                self.handle_unauthorized(*class).await;
            }
            debug!("view unmounted; dropping overview response");
            return FetchOutcome::Discarded;
        }

        match result {
            Ok(overview) => {
                info!(
                    gyms = overview.gyms.len(),
                    events = overview.events.len(),
                    "settlement overview loaded"
                );
                self.state().fetch = FetchState::Loaded(Arc::new(overview));
                FetchOutcome::Loaded
            }
            Err(ApiError::Unauthorized { class }) => {
                let role = self.handle_unauthorized(class).await;
                let mut st = self.state();
                st.fetch = st.fetch.failed(SESSION_EXPIRED.to_string());
                FetchOutcome::LoginRequired(role)
            }
            Err(err) => {
                warn!(?err, "failed to load settlement overview");
                let message = err.user_message(GENERIC_FETCH_ERROR);
                let mut st = self.state();
                st.fetch = st.fetch.failed(message.clone());
                FetchOutcome::Failed(message)
            }
        }
    }

    /// Record a payout for one partner, then refetch the snapshot.
    ///
    /// The amount must be positive and the operator must confirm. Only one
    /// request per row may be outstanding; other rows stay actionable.
    #[instrument(skip(self, display_name, confirmation))]
    pub async fn mark_as_paid(
        &self,
        target: PayoutTarget,
        id: &str,
        display_name: &str,
        net_amount: f64,
        confirmation: &dyn PayoutConfirmation,
    ) -> MarkPaidOutcome {
        if !(net_amount > 0.0) {
            return MarkPaidOutcome::Invalid(NOTHING_TO_SETTLE.to_string());
        }
        let key = row_key(target, id);
        let busy = self.state().marking.contains(&key);
        if busy {
            return MarkPaidOutcome::InFlight;
        }

        let prompt = PayoutPrompt {
            target,
            id: id.to_string(),
            display_name: display_name.to_string(),
            amount: net_amount,
        };
        let note = match confirmation.confirm(&prompt).await {
            Confirmation::Approved { note } => note,
            Confirmation::Declined => return MarkPaidOutcome::Declined,
        };

        // The prompt may have yielded; another request for the row could have
        // started in the meantime.
        let claimed = self.state().marking.insert(key.clone());
        if !claimed {
            return MarkPaidOutcome::InFlight;
        }
        let guard = MarkingGuard { view: self, key };
        let result = self.service.mark_paid(target, id, &note).await;
        drop(guard);

        match result {
            Ok(envelope) => {
                info!(%target, id, amount = net_amount, "payout marked as paid");
                let refresh = if self.is_mounted() {
                    self.fetch_overview().await
                } else {
                    FetchOutcome::Discarded
                };
                MarkPaidOutcome::Paid {
                    message: envelope.message,
                    refresh,
                }
            }
            Err(ApiError::Unauthorized { class }) => {
                MarkPaidOutcome::LoginRequired(self.handle_unauthorized(class).await)
            }
            Err(err) => {
                warn!(?err, %target, id, "failed to mark payout as paid");
                MarkPaidOutcome::Failed(err.user_message(GENERIC_MARK_PAID_ERROR))
            }
        }
    }

    pub fn set_search(&self, search: &str) {
        self.state().filters.set_search(search);
    }

    pub fn set_min_net(&self, min_net: Option<f64>) {
        self.state().filters.set_min_net(min_net);
    }

    pub fn set_tab(&self, tab: Tab) {
        self.state().filters.set_tab(tab);
    }

    /// Jump to `page` of the active tab. Not clamped.
    pub fn set_page(&self, page: usize) {
        self.state().filters.set_page(page);
    }

    pub fn clear_filters(&self) {
        self.state().filters.clear();
    }

    /// Page count of the active tab under the current filters.
    pub fn active_total_pages(&self) -> usize {
        let st = self.state();
        let len = match st.fetch.snapshot() {
            None => 0,
            Some(snapshot) => {
                let f = &st.filters;
                match f.tab {
                    Tab::Gyms => compute_filtered_rows(&snapshot.gyms, &f.search, f.min_net).len(),
                    Tab::Events => {
                        compute_filtered_rows(&snapshot.events, &f.search, f.min_net).len()
                    }
                }
            }
        };
        total_pages(len, self.page_size)
    }

    /// Advance the active tab; no-op on the last page.
    pub fn next_page(&self) -> bool {
        let total = self.active_total_pages();
        let mut st = self.state();
        let page = st.filters.page();
        if page >= total {
            return false;
        }
        st.filters.set_page(page + 1);
        true
    }

    /// Step back on the active tab; no-op on the first page.
    pub fn prev_page(&self) -> bool {
        let mut st = self.state();
        let page = st.filters.page();
        if page <= 1 {
            return false;
        }
        st.filters.set_page(page - 1);
        true
    }

    /// Current gyms page, or `None` before anything has loaded.
    pub fn gym_page(&self) -> Option<Page<GymSettlementRow>> {
        let st = self.state();
        let snapshot = st.fetch.snapshot()?;
        let f = &st.filters;
        let filtered = compute_filtered_rows(&snapshot.gyms, &f.search, f.min_net);
        Some(Page::build(&filtered, f.page_of(Tab::Gyms), self.page_size))
    }

    /// Current events page, or `None` before anything has loaded.
    pub fn event_page(&self) -> Option<Page<EventSettlementRow>> {
        let st = self.state();
        let snapshot = st.fetch.snapshot()?;
        let f = &st.filters;
        let filtered = compute_filtered_rows(&snapshot.events, &f.search, f.min_net);
        Some(Page::build(&filtered, f.page_of(Tab::Events), self.page_size))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_changes_reset_active_page_only() {
        let mut f = Filters::default();
        f.set_page(3);
        f.set_tab(Tab::Events);
        f.set_page(2);

        f.set_search("mumbai");
        assert_eq!(f.page_of(Tab::Events), 1);
        assert_eq!(f.page_of(Tab::Gyms), 3);

        f.set_tab(Tab::Gyms);
        assert_eq!(f.page(), 1);
    }

    #[test]
    fn unchanged_values_keep_page() {
        let mut f = Filters::default();
        f.set_search("pune");
        f.set_page(2);
        f.set_search("pune");
        f.set_min_net(None);
        f.set_tab(Tab::Gyms);
        assert_eq!(f.page(), 2);

        f.set_min_net(Some(500.0));
        assert_eq!(f.page(), 1);
    }

    #[test]
    fn failed_state_keeps_previous_snapshot() {
        let snapshot = Arc::new(SettlementOverview::default());
        let loaded = FetchState::Loaded(snapshot.clone());
        let loading = loaded.loading();
        assert!(loading.is_loading());
        assert_eq!(loading.snapshot(), Some(&snapshot));

        let failed = loading.failed("boom".into());
        assert_eq!(failed.error(), Some("boom"));
        assert_eq!(failed.snapshot(), Some(&snapshot));

        assert_eq!(FetchState::Idle.loading().snapshot(), None);
    }

    #[test]
    fn prompt_echoes_amount_and_recipient() {
        let prompt = PayoutPrompt {
            target: PayoutTarget::Gym,
            id: "g1".into(),
            display_name: "Iron Gym".into(),
            amount: 125000.5,
        };
        assert_eq!(prompt.message(), "Mark ₹1,25,000.50 as paid to Iron Gym?");
    }
}
