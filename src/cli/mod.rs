pub mod actions;
pub mod commands;
pub mod dispatch;
pub mod telemetry;

use crate::cli::actions::Action;
use anyhow::Result;

/// Parse the command line, install logging and build the action to run.
///
/// # Errors
///
/// Returns an error if logging cannot be initialized or the arguments are
/// invalid.
pub fn start() -> Result<Action> {
    let matches = commands::new().get_matches();

    telemetry::init(telemetry::level_from_count(matches.get_count("verbosity")))?;

    let action = dispatch::handler(&matches)?;

    Ok(action)
}
