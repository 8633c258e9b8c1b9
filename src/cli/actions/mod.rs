pub mod run;

use crate::collectors::config::CollectorConfig;
use crate::database::ConnectionSettings;
use std::path::PathBuf;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct OutputOptions {
    pub pretty: bool,
    pub stats_file: Option<PathBuf>,
}

#[derive(Debug)]
pub enum Action {
    Run {
        settings: ConnectionSettings,
        config: CollectorConfig,
        output: OutputOptions,
    },
    ShowVersion,
}
