//! Use-case orchestration on top of store and repository contracts.
//!
//! # Responsibility
//! - Coordinate presets with calendar events (`event_coordinator`).
//! - Run collection-level preset flows (`preset_book`).

pub mod event_coordinator;
pub mod preset_book;
