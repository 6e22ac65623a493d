//! Data models for the intake session

pub mod catalog;
pub mod outcome;
pub mod photo;
pub mod selection;

pub use catalog::{CatalogItem, ImageUpload};
pub use outcome::{FinalizeOutcome, FinalizeWarning};
pub use photo::QueuedPhoto;
pub use selection::{CurrentSession, Selection};
