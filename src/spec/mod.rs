//! # Spec Module
//!
//! Typed OpenAPI 3.1 document model produced by the plugin, the
//! `ObjectOrReference` wrapper used at every position that may hold a `$ref`,
//! and the route template translator.
//!
//! The model deliberately covers only what document assembly writes and what
//! the canonicalisation pass walks; unknown `x-*` keys round-trip through the
//! flattened `extensions` maps.

mod path;
mod reference;
mod types;

pub use path::{translate_path, TranslatedPath};
pub use reference::ObjectOrReference;
pub use types::*;
