//! Keeps [`ViewState`] in step with the backend.
//!
//! All three event streams feed one channel that [`SyncLayer::pump`] drains on
//! the UI thread, so state is only ever touched from there.

use std::sync::mpsc::{self, Receiver, TryRecvError};

use crate::backend::{Backend, BackendEvent, EventKind, Pending, Subscription};
use crate::error::{Result, ViewError};
use crate::state::ViewState;
use crate::treemap::BreadcrumbItem;

pub struct SyncLayer {
    state: ViewState,
    events: Receiver<BackendEvent>,
    _subscriptions: Vec<Subscription>,
    scan: Option<Pending<()>>,
    home_query: Option<Pending<String>>,
    breadcrumbs_query: Option<Pending<Vec<BreadcrumbItem>>>,
    home_dir: Option<String>,
}

impl SyncLayer {
    /// Subscribe to every event stream and fire the startup queries.
    pub fn connect(backend: &dyn Backend) -> Self {
        let (tx, events) = mpsc::channel();
        let subscriptions = EventKind::ALL
            .iter()
            .map(|&kind| backend.subscribe(kind, tx.clone()))
            .collect();

        Self {
            state: ViewState::default(),
            events,
            _subscriptions: subscriptions,
            scan: None,
            home_query: Some(backend.get_home_dir()),
            breadcrumbs_query: Some(backend.get_breadcrumbs()),
            home_dir: None,
        }
    }

    pub fn state(&self) -> &ViewState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut ViewState {
        &mut self.state
    }

    /// The home directory, handed out once so the caller can prefill its path field.
    pub fn take_home_dir(&mut self) -> Option<String> {
        self.home_dir.take()
    }

    /// Whether a call is still outstanding and the UI should keep polling.
    pub fn is_waiting(&self) -> bool {
        self.state.is_scanning()
            || self.scan.is_some()
            || self.home_query.is_some()
            || self.breadcrumbs_query.is_some()
    }

    /// Validate and dispatch a scan request.
    ///
    /// A blank path is refused locally: an alert is raised and the backend is
    /// never called. Anything else is passed through untouched.
    pub fn start_scan(&mut self, backend: &dyn Backend, root: &str, min_size_kb: u64) -> Result<()> {
        if root.trim().is_empty() {
            let err = ViewError::EmptyScanPath;
            self.state.raise_alert(err.to_string());
            return Err(err);
        }

        log::info!("Starting scan of {} (min size {} KB)", root, min_size_kb);
        self.state.begin_scan();
        self.scan = Some(backend.start_scan(root, min_size_kb));
        self.poll_calls();
        Ok(())
    }

    /// Apply queued events and finished calls. Returns whether anything changed.
    pub fn pump(&mut self) -> bool {
        let mut changed = false;
        loop {
            match self.events.try_recv() {
                Ok(event) => {
                    self.apply(event);
                    changed = true;
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    log::warn!("Backend event channel closed");
                    break;
                }
            }
        }
        self.poll_calls() || changed
    }

    fn apply(&mut self, event: BackendEvent) {
        match event {
            BackendEvent::TreemapUpdate { rects } => {
                log::debug!("Treemap update with {} rects", rects.len());
                self.state.set_rects(rects);
                if self.state.is_scanning() {
                    log::info!("Scan complete");
                    self.state.end_scan();
                }
            }
            BackendEvent::BreadcrumbsUpdate { items } => {
                self.breadcrumbs_query = None;
                self.state.set_breadcrumbs(items);
            }
            BackendEvent::ScanProgress(progress) => {
                if !self.state.set_progress(progress) {
                    log::trace!("Progress outside of a scan ignored");
                }
            }
        }
    }

    fn poll_calls(&mut self) -> bool {
        let mut changed = false;

        if let Some(outcome) = self.scan.as_mut().and_then(Pending::poll) {
            self.scan = None;
            if let Err(err) = outcome {
                log::error!("Scan failed: {}", err);
                self.state.end_scan();
                self.state.raise_alert(format!("Scan failed: {err}"));
                changed = true;
            }
        }

        if let Some(outcome) = self.home_query.as_mut().and_then(Pending::poll) {
            self.home_query = None;
            match outcome {
                Ok(home) => {
                    self.home_dir = Some(home);
                    changed = true;
                }
                Err(err) => log::warn!("Failed to get home directory: {}", err),
            }
        }

        if let Some(outcome) = self.breadcrumbs_query.as_mut().and_then(Pending::poll) {
            self.breadcrumbs_query = None;
            match outcome {
                Ok(items) => {
                    self.state.set_breadcrumbs(items);
                    changed = true;
                }
                Err(err) => log::debug!("No breadcrumbs yet: {}", err),
            }
        }

        changed
    }
}
