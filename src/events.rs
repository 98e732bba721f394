//! Slide events and synchronous observer lists
//!
//! Every component that raises notifications (content store, demo scheduler,
//! presentation state) owns an [`Observers`] list. Handlers run on the thread
//! that raised the event, in registration order, before the triggering call
//! returns. A failing or panicking handler is logged and skipped; it never
//! reaches the caller and never prevents later handlers from running.

use crate::content::{Slide, SlideId};
use log::error;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

/// A change to slide content or to the displayed slide
#[derive(Debug, Clone, PartialEq)]
pub enum SlideEvent {
    /// Slide created or edited; carries a snapshot of the new content
    Updated { id: SlideId, slide: Slide },
    /// Slide removed
    Deleted { id: SlideId },
    /// Slide (re)loaded from a file
    Loaded { id: SlideId, slide: Slide },
    /// The view moved to another slide
    NavigatedTo { id: SlideId },
}

impl SlideEvent {
    pub fn id(&self) -> SlideId {
        match self {
            Self::Updated { id, .. }
            | Self::Deleted { id }
            | Self::Loaded { id, .. }
            | Self::NavigatedTo { id } => *id,
        }
    }

    /// Slide snapshot for content events
    pub fn slide(&self) -> Option<&Slide> {
        match self {
            Self::Updated { slide, .. } | Self::Loaded { slide, .. } => Some(slide),
            Self::Deleted { .. } | Self::NavigatedTo { .. } => None,
        }
    }

    /// Action name as used in logs and by external listeners
    pub fn action(&self) -> &'static str {
        match self {
            Self::Updated { .. } => "update",
            Self::Deleted { .. } => "delete",
            Self::Loaded { .. } => "load",
            Self::NavigatedTo { .. } => "navigate",
        }
    }
}

/// Handle returned by [`Observers::subscribe`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Handler<E> = Arc<dyn Fn(&E) -> anyhow::Result<()> + Send + Sync>;

/// Ordered list of event handlers
pub struct Observers<E> {
    handlers: Mutex<Vec<(SubscriptionId, Handler<E>)>>,
    next_id: AtomicU64,
}

impl<E> Default for Observers<E> {
    fn default() -> Self {
        Self {
            handlers: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }
}

impl<E> Observers<E> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler; it sees every event raised after this call
    pub fn subscribe<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(&E) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.lock().push((id, Arc::new(handler)));
        id
    }

    /// Remove a handler. Returns false if it was not registered.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut handlers = self.lock();
        let before = handlers.len();
        handlers.retain(|(sub, _)| *sub != id);
        handlers.len() != before
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Deliver `event` to every handler registered at the time of the call.
    ///
    /// The list is snapshotted first so handlers may subscribe, unsubscribe
    /// or call back into the raising component without deadlocking.
    pub fn notify(&self, event: &E)
    where
        E: std::fmt::Debug,
    {
        let snapshot: Vec<Handler<E>> = self.lock().iter().map(|(_, h)| Arc::clone(h)).collect();

        for handler in snapshot {
            match panic::catch_unwind(AssertUnwindSafe(|| handler(event))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => error!("Error notifying observer of {:?}: {:#}", event, e),
                Err(_) => error!("Observer panicked while handling {:?}", event),
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, Vec<(SubscriptionId, Handler<E>)>> {
        // A handler never runs under this lock, so poisoning only follows a
        // panic inside Vec bookkeeping; the list itself is still usable.
        self.handlers.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
