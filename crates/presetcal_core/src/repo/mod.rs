//! Preset persistence contracts and SQLite implementation.
//!
//! # Responsibility
//! - Keep the ordered preset list across app launches.
//! - Isolate SQL details from the preset book.
//!
//! # Invariants
//! - Persisted rows are validated on read; invalid data is reported, not masked.
//! - Callers decide how to react to load failures (see `load_presets_or_empty`).

pub mod preset_repo;
