//! Boundary to the scanning/layout backend.
//!
//! The backend pushes events and answers commands asynchronously. Calls hand
//! back a [`Pending`] that the UI thread polls once per frame; event streams are
//! delivered over `mpsc` channels registered through an [`EventBus`].

use serde::Deserialize;
use std::collections::HashMap;
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use crate::error::{Result, ViewError};
use crate::treemap::{BreadcrumbItem, NodeId, Rect, ScanProgress};

/// Event pushed by the backend. Wire form: `{"event": .., "payload": ..}`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "event", content = "payload", rename_all = "snake_case")]
pub enum BackendEvent {
    /// New layout for the current focus. Also marks the end of a scan.
    TreemapUpdate { rects: Vec<Rect> },
    BreadcrumbsUpdate { items: Vec<BreadcrumbItem> },
    ScanProgress(ScanProgress),
}

impl BackendEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            BackendEvent::TreemapUpdate { .. } => EventKind::TreemapUpdate,
            BackendEvent::BreadcrumbsUpdate { .. } => EventKind::BreadcrumbsUpdate,
            BackendEvent::ScanProgress(_) => EventKind::ScanProgress,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    TreemapUpdate,
    BreadcrumbsUpdate,
    ScanProgress,
}

impl EventKind {
    pub const ALL: [EventKind; 3] = [
        EventKind::TreemapUpdate,
        EventKind::BreadcrumbsUpdate,
        EventKind::ScanProgress,
    ];
}

/// Commands and queries the view issues. None of them block.
pub trait Backend {
    /// Register the single listener for `kind`. Dropping the guard unregisters it.
    fn subscribe(&self, kind: EventKind, tx: Sender<BackendEvent>) -> Subscription;

    fn start_scan(&self, root: &str, min_size_kb: u64) -> Pending<()>;

    fn set_zoom(&self, node: NodeId) -> Pending<()>;

    /// Parent of the current zoom focus; `None` at the scan root.
    fn get_parent_node(&self) -> Pending<Option<NodeId>>;

    fn get_home_dir(&self) -> Pending<String>;

    fn get_breadcrumbs(&self) -> Pending<Vec<BreadcrumbItem>>;
}

/// Result of an outstanding backend call, polled without blocking.
pub struct Pending<T> {
    rx: Receiver<Result<T>>,
    done: bool,
}

/// Completing half of a [`Pending`].
pub struct Resolver<T> {
    tx: Sender<Result<T>>,
}

pub fn pending<T>() -> (Resolver<T>, Pending<T>) {
    let (tx, rx) = mpsc::channel();
    (Resolver { tx }, Pending { rx, done: false })
}

impl<T> Pending<T> {
    /// An already-completed call.
    pub fn ready(value: Result<T>) -> Self {
        let (resolver, pending) = pending();
        resolver.resolve(value);
        pending
    }

    /// `Some` exactly once, when the call completes. A resolver dropped without
    /// answering yields [`ViewError::Disconnected`].
    pub fn poll(&mut self) -> Option<Result<T>> {
        if self.done {
            return None;
        }
        let outcome = match self.rx.try_recv() {
            Ok(value) => value,
            Err(TryRecvError::Empty) => return None,
            Err(TryRecvError::Disconnected) => Err(ViewError::Disconnected),
        };
        self.done = true;
        Some(outcome)
    }
}

impl<T> Resolver<T> {
    pub fn resolve(self, value: Result<T>) {
        // The caller may have dropped its Pending (fire-and-forget).
        let _ = self.tx.send(value);
    }
}

#[derive(Default)]
struct BusInner {
    next_token: u64,
    listeners: HashMap<EventKind, (u64, Sender<BackendEvent>)>,
}

/// Routes backend events to at most one listener per [`EventKind`].
#[derive(Clone, Default)]
pub struct EventBus {
    inner: Arc<Mutex<BusInner>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// A second subscription for the same kind replaces the first.
    pub fn subscribe(&self, kind: EventKind, tx: Sender<BackendEvent>) -> Subscription {
        let mut inner = lock(&self.inner);
        inner.next_token += 1;
        let token = inner.next_token;
        if inner.listeners.insert(kind, (token, tx)).is_some() {
            log::warn!("Replacing existing {:?} listener", kind);
        }
        Subscription {
            bus: Arc::downgrade(&self.inner),
            kind,
            token,
        }
    }

    /// Returns whether a listener received the event.
    pub fn emit(&self, event: BackendEvent) -> bool {
        let kind = event.kind();
        let inner = lock(&self.inner);
        match inner.listeners.get(&kind) {
            Some((_, tx)) => tx.send(event).is_ok(),
            None => {
                log::debug!("Dropping {:?} event, nobody is listening", kind);
                false
            }
        }
    }

    pub fn is_subscribed(&self, kind: EventKind) -> bool {
        lock(&self.inner).listeners.contains_key(&kind)
    }
}

/// Scoped registration on an [`EventBus`]; unregisters on drop.
pub struct Subscription {
    bus: Weak<Mutex<BusInner>>,
    kind: EventKind,
    token: u64,
}

impl Drop for Subscription {
    fn drop(&mut self) {
        let Some(inner) = self.bus.upgrade() else {
            return;
        };
        let mut inner = lock(&inner);
        // Only remove our own registration, not a later replacement.
        if inner.listeners.get(&self.kind).map(|(token, _)| *token) == Some(self.token) {
            inner.listeners.remove(&self.kind);
        }
    }
}

fn lock(inner: &Mutex<BusInner>) -> MutexGuard<'_, BusInner> {
    inner.lock().unwrap_or_else(PoisonError::into_inner)
}
