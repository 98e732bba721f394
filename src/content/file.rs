//! Slide file formats
//!
//! A slide file carries the whole deck plus export metadata:
//!
//! ```json
//! {
//!   "slides": { "1": { "slide_id": 1, "title": "...", "content": "...",
//!                      "config_data": {}, "last_modified": "..." } },
//!   "exported_at": "2025-06-01T10:15:00+02:00",
//!   "version": "4.0.0"
//! }
//! ```
//!
//! The same document is written as JSON or TOML.

use crate::error::{ContentError, ContentResult};
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::Path;

use super::slide::{Slide, SlideId};

/// Schema version written into every slide file
pub const SLIDE_FILE_VERSION: &str = "4.0.0";

/// Supported on-disk encodings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlideFormat {
    Json,
    Toml,
}

impl SlideFormat {
    /// Pick the format from the file extension; unknown extensions use JSON
    pub fn from_path(path: &Path) -> Self {
        match path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .as_deref()
        {
            Some("toml") => Self::Toml,
            _ => Self::Json,
        }
    }
}

impl fmt::Display for SlideFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SlideFormat::Json => write!(f, "JSON"),
            SlideFormat::Toml => write!(f, "TOML"),
        }
    }
}

/// On-disk document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlideFile {
    #[serde(default = "Local::now", deserialize_with = "super::slide::timestamp::deserialize")]
    pub exported_at: DateTime<Local>,
    #[serde(default)]
    pub version: String,
    /// Keyed by the stringified slide id. Kept after the plain values so the
    /// TOML encoding never emits a value after a table.
    pub slides: BTreeMap<String, Slide>,
}

impl SlideFile {
    pub fn from_slides<'a>(slides: impl IntoIterator<Item = &'a Slide>) -> Self {
        Self {
            slides: slides
                .into_iter()
                .map(|s| (s.id.to_string(), s.clone()))
                .collect(),
            exported_at: Local::now(),
            version: SLIDE_FILE_VERSION.to_string(),
        }
    }

    pub fn encode(&self, format: SlideFormat) -> ContentResult<String> {
        match format {
            SlideFormat::Json => Ok(serde_json::to_string_pretty(self)?),
            SlideFormat::Toml => Ok(toml::to_string_pretty(&self.without_nulls())?),
        }
    }

    /// Copy with every `null` in the free-form config dropped; TOML has no
    /// null, so these keys are omitted from TOML files.
    fn without_nulls(&self) -> Self {
        let mut file = self.clone();
        for slide in file.slides.values_mut() {
            let config = &mut slide.config;
            config.extra.retain(|_, value| !value.is_null());
            config.extra.values_mut().for_each(drop_nulls);
            if let Some(elements) = config.canvas_elements.as_mut() {
                elements.retain(|value| !value.is_null());
                elements.iter_mut().for_each(drop_nulls);
            }
        }
        file
    }

    pub fn decode(text: &str, format: SlideFormat) -> ContentResult<Self> {
        match format {
            SlideFormat::Json => Ok(serde_json::from_str(text)?),
            SlideFormat::Toml => Ok(toml::from_str(text)?),
        }
    }

    /// Convert to a deck keyed by numeric id.
    ///
    /// Fails on the first key that is not a positive integer, so a bad file
    /// never produces a partial deck. The map key wins over `slide_id`.
    pub fn into_deck(self) -> ContentResult<BTreeMap<SlideId, Slide>> {
        let mut deck = BTreeMap::new();
        for (key, mut slide) in self.slides {
            let id = match key.trim().parse::<SlideId>() {
                Ok(id) if id >= 1 => id,
                _ => return Err(ContentError::InvalidSlideId(key)),
            };
            slide.id = id;
            deck.insert(id, slide);
        }
        Ok(deck)
    }

    pub fn write(&self, path: &Path, format: SlideFormat) -> ContentResult<()> {
        let text = self.encode(format)?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| ContentError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        fs::write(path, text).map_err(|source| ContentError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn read(path: &Path, format: SlideFormat) -> ContentResult<Self> {
        let text = fs::read_to_string(path).map_err(|source| ContentError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::decode(&text, format)
    }
}

fn drop_nulls(value: &mut serde_json::Value) {
    match value {
        serde_json::Value::Object(map) => {
            map.retain(|_, v| !v.is_null());
            map.values_mut().for_each(drop_nulls);
        }
        serde_json::Value::Array(items) => {
            items.retain(|v| !v.is_null());
            items.iter_mut().for_each(drop_nulls);
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::slide::SlideConfig;
    use serde_json::json;
    use std::path::PathBuf;

    fn sample() -> Vec<Slide> {
        let mut first = Slide::new(1, "Shuttle", "Line A\nLine B");
        first.config = SlideConfig::default()
            .with_size(1920, 1080)
            .with_extra("accent", json!("#FF6600"));
        vec![first, Slide::new(2, "Safety", "Sensors")]
    }

    #[test]
    fn test_format_from_path() {
        assert_eq!(SlideFormat::from_path(&PathBuf::from("deck.toml")), SlideFormat::Toml);
        assert_eq!(SlideFormat::from_path(&PathBuf::from("deck.TOML")), SlideFormat::Toml);
        assert_eq!(SlideFormat::from_path(&PathBuf::from("deck.json")), SlideFormat::Json);
        assert_eq!(SlideFormat::from_path(&PathBuf::from("deck")), SlideFormat::Json);
    }

    #[test]
    fn test_both_formats_carry_the_same_deck() {
        let slides = sample();
        for format in [SlideFormat::Json, SlideFormat::Toml] {
            let text = SlideFile::from_slides(&slides).encode(format).unwrap();
            let deck = SlideFile::decode(&text, format).unwrap().into_deck().unwrap();

            assert_eq!(deck.len(), 2, "{}", format);
            assert!(deck[&1].same_content(&slides[0]), "{}", format);
            assert!(deck[&2].same_content(&slides[1]), "{}", format);
        }
    }

    #[test]
    fn test_toml_omits_nulls_from_config() {
        let mut slide = Slide::new(1, "Editor", "");
        slide.config = SlideConfig::default()
            .with_extra("note", json!(null))
            .with_extra("theme", json!({"accent": "#FF6600", "logo": null}));
        slide.config.canvas_elements = Some(vec![json!({"kind": "text", "font": null}), json!(null)]);

        let text = SlideFile::from_slides([&slide]).encode(SlideFormat::Toml).unwrap();
        let deck = SlideFile::decode(&text, SlideFormat::Toml).unwrap().into_deck().unwrap();

        let config = &deck[&1].config;
        assert!(!config.extra.contains_key("note"));
        assert_eq!(config.extra["theme"], json!({"accent": "#FF6600"}));
        assert_eq!(config.canvas_elements, Some(vec![json!({"kind": "text"})]));

        // JSON keeps them.
        let text = SlideFile::from_slides([&slide]).encode(SlideFormat::Json).unwrap();
        let deck = SlideFile::decode(&text, SlideFormat::Json).unwrap().into_deck().unwrap();
        assert_eq!(deck[&1].config.extra["note"], json!(null));
    }

    #[test]
    fn test_json_document_shape() {
        let text = SlideFile::from_slides(&sample()).encode(SlideFormat::Json).unwrap();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();

        assert_eq!(value["version"], json!("4.0.0"));
        assert!(value["exported_at"].is_string());
        assert_eq!(value["slides"]["1"]["content"], json!("Line A\nLine B"));
        assert_eq!(value["slides"]["1"]["config_data"]["slide_width"], json!(1920));
    }

    #[test]
    fn test_bad_slide_key_rejects_whole_file() {
        let text = r#"{"slides": {"1": {"slide_id": 1}, "intro": {"slide_id": 2}}}"#;
        let file = SlideFile::decode(text, SlideFormat::Json).unwrap();
        assert!(matches!(file.into_deck(), Err(ContentError::InvalidSlideId(k)) if k == "intro"));

        let text = r#"{"slides": {"0": {"slide_id": 0}}}"#;
        let file = SlideFile::decode(text, SlideFormat::Json).unwrap();
        assert!(file.into_deck().is_err());
    }

    #[test]
    fn test_write_creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("exports").join("deck.json");
        SlideFile::from_slides(&sample()).write(&path, SlideFormat::Json).unwrap();
        assert!(path.exists());
    }
}
