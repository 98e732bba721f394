//! Slide content: model, persistence and the canonical store

pub mod defaults;
pub mod file;
pub mod slide;
pub mod store;

pub use file::{SlideFile, SlideFormat, SLIDE_FILE_VERSION};
pub use slide::{Slide, SlideConfig, SlideId};
pub use store::ContentStore;
