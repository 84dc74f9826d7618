//! CLI smoke entry point.
//!
//! # Responsibility
//! - Verify `presetcal_core` linkage without the Flutter host.
//! - Run one preset through an in-memory calendar and print the outcome.

use presetcal_core::{
    AuthorizationState, EventCoordinator, FixedPrompter, Preset, SqliteEventStore,
};
use std::error::Error;
use std::process::ExitCode;
use std::sync::Arc;

fn main() -> ExitCode {
    println!("presetcal_core ping={}", presetcal_core::ping());
    println!("presetcal_core version={}", presetcal_core::core_version());

    match calendar_round_trip() {
        Ok(identifier) => {
            println!("presetcal_core round_trip=ok identifier={identifier}");
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("presetcal_core round_trip=error error={err}");
            ExitCode::FAILURE
        }
    }
}

fn calendar_round_trip() -> Result<String, Box<dyn Error>> {
    let store = SqliteEventStore::open_in_memory(
        AuthorizationState::new(),
        Arc::new(FixedPrompter::granting()),
    )?;
    let mut coordinator = EventCoordinator::new(store);

    let mut preset = Preset::new("CLI smoke", 0, None)?;
    let identifier = coordinator.create_event(&preset)?;
    preset.set_event_identifier(&identifier)?;

    if coordinator.needs_update(&preset)? {
        return Err("fresh event drifted from its preset".into());
    }
    coordinator.remove_event(&preset)?;
    Ok(identifier)
}
