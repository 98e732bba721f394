//! Show-control core for the trade-show booth kiosk
//!
//! The kiosk plays a slide presentation and keeps the booth's show hardware
//! (ESP32 LED/motion controllers and an Arduino GIGA dispatcher) in sync with
//! the slide on screen.
//!
//! - [`content`]: slide model, slide files and the canonical [`ContentStore`]
//! - [`hardware`]: serial connections and the [`DeviceRegistry`]
//! - [`demo`]: timed playback that emits one `page_<n>` signal per slide
//! - [`presentation`]: current slide and in-progress edits shared by views
//! - [`events`]: typed slide events and observer lists
//!
//! Components are built once at startup and shared by `Arc`:
//!
//! ```no_run
//! use std::sync::Arc;
//! use messe_stand::config::KioskConfig;
//! use messe_stand::content::ContentStore;
//! use messe_stand::demo::DemoScheduler;
//! use messe_stand::hardware::{DeviceRegistry, SystemPortOpener};
//!
//! let config = KioskConfig::default();
//! let store = Arc::new(ContentStore::with_default_deck());
//! let registry = Arc::new(DeviceRegistry::from_config(
//!     &config.hardware,
//!     Arc::new(SystemPortOpener),
//! ));
//! registry.connect_all();
//!
//! let demo = DemoScheduler::new(store, Arc::clone(&registry), &config.demo);
//! demo.start(1, None);
//! ```

pub mod config;
pub mod content;
pub mod demo;
pub mod error;
pub mod events;
pub mod hardware;
pub mod presentation;
pub mod worker;

pub use content::ContentStore;
pub use hardware::DeviceRegistry;
