//! Shared presentation state
//!
//! Keeps the editing view and the playback view consistent: the current slide
//! pointer plus transient per-slide edits. Edits are written through to the
//! content store, which remains the canonical copy; reads fall back to the
//! store when there is no local edit.

use crate::content::{ContentStore, Slide, SlideId};
use crate::events::{Observers, SlideEvent, SubscriptionId};
use chrono::{DateTime, Local};
use log::{debug, warn};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, Weak};

/// Owned copy of a slide's editable content
#[derive(Debug, Clone, PartialEq)]
pub struct SlideSnapshot {
    pub id: SlideId,
    pub title: String,
    pub body: String,
    pub last_modified: DateTime<Local>,
}

impl From<&Slide> for SlideSnapshot {
    fn from(slide: &Slide) -> Self {
        Self {
            id: slide.id,
            title: slide.title.clone(),
            body: slide.body.clone(),
            last_modified: slide.last_modified,
        }
    }
}

#[derive(Debug)]
struct Shared {
    current: SlideId,
    snapshots: HashMap<SlideId, SlideSnapshot>,
    last_modified: DateTime<Local>,
}

pub struct PresentationState {
    store: Arc<ContentStore>,
    shared: Mutex<Shared>,
    observers: Observers<SlideEvent>,
}

impl PresentationState {
    pub fn new(store: Arc<ContentStore>) -> Self {
        Self {
            store,
            shared: Mutex::new(Shared {
                current: 1,
                snapshots: HashMap::new(),
                last_modified: Local::now(),
            }),
            observers: Observers::new(),
        }
    }

    /// Follow content store changes: a deleted or reloaded slide drops its
    /// local edit so the next read sees the store's version.
    pub fn attach(state: &Arc<Self>) -> SubscriptionId {
        let weak: Weak<Self> = Arc::downgrade(state);
        state.store.subscribe(move |event: &SlideEvent| {
            let state = match weak.upgrade() {
                Some(state) => state,
                None => return Ok(()),
            };
            if let SlideEvent::Deleted { id } | SlideEvent::Loaded { id, .. } = event {
                if state.lock().snapshots.remove(id).is_some() {
                    debug!("Dropped local edit of slide {} after {}", id, event.action());
                }
            }
            Ok(())
        })
    }

    /// Record an edit, write it through to the store and notify observers.
    ///
    /// Returns `None` for an id the store rejects; nothing is recorded then.
    pub fn update(&self, id: SlideId, title: &str, body: &str) -> Option<SlideSnapshot> {
        if id == 0 {
            warn!("Ignored edit of slide 0, slide ids start at 1");
            return None;
        }
        let now = Local::now();
        let snapshot = SlideSnapshot {
            id,
            title: title.to_string(),
            body: body.to_string(),
            last_modified: now,
        };
        {
            let mut shared = self.lock();
            shared.snapshots.insert(id, snapshot.clone());
            shared.last_modified = now;
        }

        let slide = self.store.update(id, title, body, None)?;
        self.observers.notify(&SlideEvent::Updated { id, slide });
        Some(snapshot)
    }

    /// Local edit if there is one, otherwise the store's slide
    pub fn get(&self, id: SlideId) -> Option<SlideSnapshot> {
        if let Some(snapshot) = self.lock().snapshots.get(&id) {
            return Some(snapshot.clone());
        }
        self.store.get(id).as_ref().map(SlideSnapshot::from)
    }

    pub fn set_current(&self, id: SlideId) {
        self.lock().current = id;
        self.observers.notify(&SlideEvent::NavigatedTo { id });
    }

    pub fn current(&self) -> SlideId {
        self.lock().current
    }

    /// Time of the most recent local edit
    pub fn last_modified(&self) -> DateTime<Local> {
        self.lock().last_modified
    }

    pub fn subscribe<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(&SlideEvent) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.observers.subscribe(handler)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.observers.unsubscribe(id)
    }

    fn lock(&self) -> MutexGuard<'_, Shared> {
        self.shared.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
