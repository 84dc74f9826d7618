//! Flutter-facing bindings for presetcal core.

pub mod api;
