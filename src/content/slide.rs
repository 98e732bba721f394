//! Slide model
//!
//! Field names on disk follow the booth's slide file schema (`slide_id`,
//! `content`, `config_data`, `slide_width`, ...), so decks exported by earlier
//! kiosk releases keep loading.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Slide identifier, 1-based
pub type SlideId = u32;

/// Layout hints and arbitrary per-slide settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SlideConfig {
    /// Design width in pixels
    #[serde(rename = "slide_width", default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    /// Design height in pixels
    #[serde(rename = "slide_height", default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    /// Layout name used by the renderer (e.g. "text", "image_left")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub layout: Option<String>,
    /// Free-form canvas elements placed by the editor
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub canvas_elements: Option<Vec<serde_json::Value>>,
    /// Keys this version does not know about
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl SlideConfig {
    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = Some(width);
        self.height = Some(height);
        self
    }

    pub fn with_layout(mut self, layout: &str) -> Self {
        self.layout = Some(layout.to_string());
        self
    }

    pub fn with_extra(mut self, key: &str, value: serde_json::Value) -> Self {
        self.extra.insert(key.to_string(), value);
        self
    }

    /// Merge `other` into `self`: set fields overwrite, unset fields keep
    /// the current value, extension keys are inserted one by one.
    pub fn merge(&mut self, other: SlideConfig) {
        if other.width.is_some() {
            self.width = other.width;
        }
        if other.height.is_some() {
            self.height = other.height;
        }
        if other.layout.is_some() {
            self.layout = other.layout;
        }
        if other.canvas_elements.is_some() {
            self.canvas_elements = other.canvas_elements;
        }
        self.extra.extend(other.extra);
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// One titled content unit of the presentation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Slide {
    #[serde(rename = "slide_id")]
    pub id: SlideId,
    #[serde(default)]
    pub title: String,
    /// Newline-delimited bullet lines
    #[serde(rename = "content", default)]
    pub body: String,
    #[serde(default = "Local::now", deserialize_with = "timestamp::deserialize")]
    pub last_modified: DateTime<Local>,
    #[serde(rename = "config_data", default)]
    pub config: SlideConfig,
}

/// Lenient timestamp parsing: RFC 3339, or a naive ISO timestamp taken as
/// local time. Anything else falls back to "now" instead of failing the load.
pub(crate) mod timestamp {
    use chrono::{DateTime, Local, NaiveDateTime, TimeZone};
    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Local>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Ok(parse(&raw).unwrap_or_else(|| {
            log::debug!("Unparseable slide timestamp {:?}, using now", raw);
            Local::now()
        }))
    }

    pub fn parse(raw: &str) -> Option<DateTime<Local>> {
        if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
            return Some(ts.with_timezone(&Local));
        }
        let naive = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f").ok()?;
        Local.from_local_datetime(&naive).earliest()
    }
}

impl Slide {
    pub fn new(id: SlideId, title: &str, body: &str) -> Self {
        Self {
            id,
            title: title.to_string(),
            body: body.to_string(),
            config: SlideConfig::default(),
            last_modified: Local::now(),
        }
    }

    /// Body split into non-empty bullet lines
    pub fn bullets(&self) -> impl Iterator<Item = &str> {
        self.body.lines().map(str::trim).filter(|l| !l.is_empty())
    }

    pub fn touch(&mut self) {
        self.last_modified = Local::now();
    }

    /// Title/body/config equality, ignoring timestamps
    pub fn same_content(&self, other: &Slide) -> bool {
        self.id == other.id
            && self.title == other.title
            && self.body == other.body
            && self.config == other.config
    }
}
