//! Domain model for event creation presets.
//!
//! # Responsibility
//! - Define the preset value object owned by the UI collaborator.
//! - Gate-keep the backend identifier format.
//!
//! # Invariants
//! - A preset never holds an empty title.
//! - The model knows nothing about concrete calendar backends.

pub mod identifier;
pub mod preset;
