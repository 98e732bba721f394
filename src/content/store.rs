//! Content store: the canonical slide collection
//!
//! All reads and writes go through [`ContentStore`]; the slide map itself is
//! never handed out. Observers are notified synchronously after the internal
//! lock has been released, so a handler may read the store again.

use crate::error::ContentResult;
use crate::events::{Observers, SlideEvent, SubscriptionId};
use log::{debug, info, warn};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use super::defaults::default_deck;
use super::file::{SlideFile, SlideFormat};
use super::slide::{Slide, SlideConfig, SlideId};

pub struct ContentStore {
    slides: Mutex<BTreeMap<SlideId, Slide>>,
    observers: Observers<SlideEvent>,
}

impl Default for ContentStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ContentStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self {
            slides: Mutex::new(BTreeMap::new()),
            observers: Observers::new(),
        }
    }

    /// Create a store seeded with the built-in booth deck
    pub fn with_default_deck() -> Self {
        let store = Self::new();
        {
            let mut slides = store.lock();
            for slide in default_deck() {
                slides.insert(slide.id, slide);
            }
            debug!("Loaded {} default slides", slides.len());
        }
        store
    }

    pub fn get(&self, id: SlideId) -> Option<Slide> {
        self.lock().get(&id).cloned()
    }

    /// Owned copy of every slide, ordered by id
    pub fn get_all(&self) -> BTreeMap<SlideId, Slide> {
        self.lock().clone()
    }

    pub fn count(&self) -> usize {
        self.lock().len()
    }

    pub fn ids(&self) -> Vec<SlideId> {
        self.lock().keys().copied().collect()
    }

    pub fn contains(&self, id: SlideId) -> bool {
        self.lock().contains_key(&id)
    }

    /// Create a slide; an existing id is replaced with a warning.
    ///
    /// Slide ids start at 1; id 0 is rejected and nothing is stored.
    pub fn create(&self, id: SlideId, title: &str, body: &str) -> Option<Slide> {
        if !accepts_id(id) {
            return None;
        }
        let slide = Slide::new(id, title, body);
        let replaced = self.lock().insert(id, slide.clone()).is_some();
        if replaced {
            warn!("Slide {} already exists, updating instead", id);
        } else {
            info!("Created new slide {}", id);
        }

        self.observers.notify(&SlideEvent::Updated {
            id,
            slide: slide.clone(),
        });
        Some(slide)
    }

    /// Set title and body, merge `config`, and notify observers.
    ///
    /// A missing slide is created. Returns the updated snapshot, or `None`
    /// for id 0.
    pub fn update(
        &self,
        id: SlideId,
        title: &str,
        body: &str,
        config: Option<SlideConfig>,
    ) -> Option<Slide> {
        if !accepts_id(id) {
            return None;
        }
        let snapshot = {
            let mut slides = self.lock();
            let slide = slides
                .entry(id)
                .or_insert_with(|| Slide::new(id, "", ""));
            slide.title = title.to_string();
            slide.body = body.to_string();
            if let Some(config) = config {
                slide.config.merge(config);
            }
            slide.touch();
            slide.clone()
        };

        debug!("Updated slide {}: {}", id, preview(title));
        self.observers.notify(&SlideEvent::Updated {
            id,
            slide: snapshot.clone(),
        });
        Some(snapshot)
    }

    /// Remove a slide. Returns false if it did not exist.
    pub fn delete(&self, id: SlideId) -> bool {
        if self.lock().remove(&id).is_none() {
            return false;
        }
        info!("Deleted slide {}", id);
        self.observers.notify(&SlideEvent::Deleted { id });
        true
    }

    /// Register a content observer (see [`Observers::subscribe`])
    pub fn subscribe<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(&SlideEvent) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.observers.subscribe(handler)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.observers.unsubscribe(id)
    }

    /// Write the whole deck to `path`
    pub fn save_to_file(&self, path: &Path, format: SlideFormat) -> ContentResult<()> {
        let file = {
            let slides = self.lock();
            SlideFile::from_slides(slides.values())
        };
        let count = file.slides.len();

        file.write(path, format).map_err(|e| {
            warn!("Error saving slides: {}", e);
            e
        })?;
        info!("Saved {} slides to {} ({})", count, path.display(), format);
        Ok(())
    }

    /// Replace the whole deck with the contents of `path`.
    ///
    /// The file is fully parsed and validated before anything is swapped in;
    /// on error the current deck is untouched. On success one `Loaded` event
    /// is raised per slide. Returns the number of slides loaded.
    pub fn load_from_file(&self, path: &Path, format: SlideFormat) -> ContentResult<usize> {
        let deck = SlideFile::read(path, format)
            .and_then(SlideFile::into_deck)
            .map_err(|e| {
                warn!("Error loading slides from {}: {}", path.display(), e);
                e
            })?;

        let loaded: Vec<Slide> = deck.values().cloned().collect();
        *self.lock() = deck;
        info!("Loaded {} slides from {} ({})", loaded.len(), path.display(), format);

        for slide in loaded.iter() {
            self.observers.notify(&SlideEvent::Loaded {
                id: slide.id,
                slide: slide.clone(),
            });
        }
        Ok(loaded.len())
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<SlideId, Slide>> {
        // Mutations are single assignments, so a poisoned map is still whole.
        self.slides.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Slide ids start at 1; a stored 0 would make the next save unloadable
fn accepts_id(id: SlideId) -> bool {
    if id == 0 {
        warn!("Rejected slide id 0, slide ids start at 1");
        return false;
    }
    true
}

fn preview(text: &str) -> String {
    const PREVIEW_CHARS: usize = 30;
    if text.chars().count() > PREVIEW_CHARS {
        format!("{}...", text.chars().take(PREVIEW_CHARS).collect::<String>())
    } else {
        text.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Arc;

    fn three_slides() -> ContentStore {
        let store = ContentStore::new();
        for id in 1..=3 {
            store.create(id, &format!("Slide {}", id), "body");
        }
        store
    }

    fn record(store: &ContentStore) -> Arc<Mutex<Vec<(SlideId, &'static str, Option<String>)>>> {
        let log = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&log);
        store.subscribe(move |event: &SlideEvent| {
            sink.lock().unwrap().push((
                event.id(),
                event.action(),
                event.slide().map(|s| s.title.clone()),
            ));
            Ok(())
        });
        log
    }

    #[test]
    fn test_update_round_trip() {
        let store = ContentStore::new();
        for id in [1, 4, 9] {
            store.update(id, &format!("Title {}", id), &format!("Body {}", id), None);
        }
        for id in [1, 4, 9] {
            let slide = store.get(id).unwrap();
            assert_eq!(slide.title, format!("Title {}", id));
            assert_eq!(slide.body, format!("Body {}", id));
        }
        assert_eq!(store.count(), 3);
    }

    #[test]
    fn test_update_notifies_once_and_late_observer_waits() {
        let store = three_slides();
        let first = record(&store);

        store.update(2, "T", "B", None);
        assert_eq!(*first.lock().unwrap(), vec![(2, "update", Some("T".to_string()))]);

        let second = record(&store);
        assert!(second.lock().unwrap().is_empty());

        store.update(3, "Next", "B", None);
        assert_eq!(first.lock().unwrap().len(), 2);
        assert_eq!(*second.lock().unwrap(), vec![(3, "update", Some("Next".to_string()))]);
    }

    #[test]
    fn test_create_existing_acts_as_update() {
        let store = three_slides();
        store.create(2, "Replaced", "new body");
        assert_eq!(store.count(), 3);
        assert_eq!(store.get(2).unwrap().title, "Replaced");
    }

    #[test]
    fn test_update_merges_config() {
        let store = ContentStore::new();
        store.update(1, "A", "B", Some(SlideConfig::default().with_size(1920, 1080)));
        store.update(
            1,
            "A",
            "B",
            Some(SlideConfig::default().with_extra("accent", json!("#FF6600"))),
        );

        let config = store.get(1).unwrap().config;
        assert_eq!(config.width, Some(1920));
        assert_eq!(config.extra["accent"], json!("#FF6600"));
    }

    #[test]
    fn test_delete() {
        let store = three_slides();
        let log = record(&store);

        assert!(!store.delete(7));
        assert!(store.delete(2));
        assert!(!store.contains(2));
        assert_eq!(*log.lock().unwrap(), vec![(2, "delete", None)]);
    }

    #[test]
    fn test_get_all_is_a_copy() {
        let store = three_slides();
        let mut all = store.get_all();
        all.get_mut(&1).unwrap().title = "mutated".to_string();
        all.remove(&2);

        assert_eq!(store.get(1).unwrap().title, "Slide 1");
        assert_eq!(store.count(), 3);
    }

    #[test]
    fn test_failing_observer_does_not_fail_update() {
        let store = three_slides();
        store.subscribe(|_: &SlideEvent| Err(anyhow::anyhow!("view closed")));
        let log = record(&store);

        let slide = store.update(1, "Still works", "", None).unwrap();
        assert_eq!(slide.title, "Still works");
        assert_eq!(log.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_observer_can_read_store() {
        let store = Arc::new(three_slides());
        let seen = Arc::new(Mutex::new(0));
        let (inner, sink) = (Arc::clone(&store), Arc::clone(&seen));
        store.subscribe(move |event: &SlideEvent| {
            *sink.lock().unwrap() = inner.get(event.id()).map(|s| s.body.len()).unwrap_or(0);
            Ok(())
        });

        store.update(1, "t", "four", None);
        assert_eq!(*seen.lock().unwrap(), 4);
    }

    #[test]
    fn test_save_then_load_reproduces_deck() {
        let dir = tempfile::tempdir().unwrap();
        let store = ContentStore::with_default_deck();
        store.update(3, "Edited", "Line 1\nLine 2", Some(SlideConfig::default().with_layout("split")));

        for name in ["deck.json", "deck.toml"] {
            let path = dir.path().join(name);
            let format = SlideFormat::from_path(&path);
            store.save_to_file(&path, format).unwrap();

            let restored = ContentStore::new();
            assert_eq!(restored.load_from_file(&path, format).unwrap(), 5);

            let (before, after) = (store.get_all(), restored.get_all());
            assert_eq!(before.len(), after.len());
            for (id, slide) in before.iter() {
                assert!(slide.same_content(&after[id]), "slide {} via {}", id, name);
            }
        }
    }

    #[test]
    fn test_slide_zero_is_rejected_and_deck_stays_loadable() {
        let store = three_slides();
        let log = record(&store);

        assert!(store.update(0, "Zero", "", None).is_none());
        assert!(store.create(0, "Zero", "").is_none());
        assert!(!store.contains(0));
        assert!(log.lock().unwrap().is_empty());

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("deck.json");
        store.save_to_file(&path, SlideFormat::Json).unwrap();

        let restored = ContentStore::new();
        assert_eq!(restored.load_from_file(&path, SlideFormat::Json).unwrap(), 3);
        assert_eq!(restored.ids(), vec![1, 2, 3]);
    }

    #[test]
    fn test_load_notifies_per_slide() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("deck.json");
        three_slides().save_to_file(&path, SlideFormat::Json).unwrap();

        let store = ContentStore::new();
        let log = record(&store);
        store.load_from_file(&path, SlideFormat::Json).unwrap();

        let events = log.lock().unwrap();
        let ids: Vec<SlideId> = events.iter().map(|(id, _, _)| *id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert!(events.iter().all(|(_, action, _)| *action == "load"));
    }

    #[test]
    fn test_failed_load_keeps_current_deck() {
        let dir = tempfile::tempdir().unwrap();
        let store = three_slides();
        let log = record(&store);

        let broken = dir.path().join("broken.json");
        std::fs::write(&broken, r#"{"slides": {"1": {"slide_id": 1, "title": "x"}, "2": "#).unwrap();
        assert!(store.load_from_file(&broken, SlideFormat::Json).is_err());

        let bad_key = dir.path().join("bad_key.json");
        std::fs::write(&bad_key, r#"{"slides": {"1": {"title": "x"}, "two": {"title": "y"}}}"#).unwrap();
        assert!(store.load_from_file(&bad_key, SlideFormat::Json).is_err());

        assert!(store
            .load_from_file(&dir.path().join("missing.json"), SlideFormat::Json)
            .is_err());

        assert_eq!(store.ids(), vec![1, 2, 3]);
        assert_eq!(store.get(1).unwrap().title, "Slide 1");
        assert!(log.lock().unwrap().is_empty());
    }

    #[test]
    fn test_preview_truncates_on_char_boundary() {
        assert_eq!(preview("short"), "short");
        let long = "ä".repeat(40);
        assert_eq!(preview(&long), format!("{}...", "ä".repeat(30)));
    }
}
