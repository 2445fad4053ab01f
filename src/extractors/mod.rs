// src/extractors/mod.rs
pub mod cleaner;
pub mod section;
pub mod table;
pub mod text;

// Re-export the entry points of each stage
pub use cleaner::clean_text;
pub use text::extract_full_text;
