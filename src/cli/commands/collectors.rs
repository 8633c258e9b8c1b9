use crate::collectors::GROUP_NAMES;
use clap::{Arg, Command};

/// Add `--collector.<group>` and `--no-collector.<group>` for every catalog
/// group. Groups are enabled by default and the last flag given wins.
pub fn add_collectors_args(mut cmd: Command) -> Command {
    for &name in GROUP_NAMES {
        let enable_flag: &'static str = Box::leak(format!("collector.{name}").into_boxed_str());
        let disable_flag: &'static str = Box::leak(format!("no-collector.{name}").into_boxed_str());

        let enable_help: &'static str =
            Box::leak(format!("Enable the {name} metric group [default: enabled]").into_boxed_str());
        let disable_help: &'static str =
            Box::leak(format!("Disable the {name} metric group").into_boxed_str());

        cmd = cmd
            .arg(
                Arg::new(enable_flag)
                    .long(enable_flag)
                    .help(enable_help)
                    .action(clap::ArgAction::SetTrue)
                    .default_value("true")
                    .hide_short_help(true),
            )
            .arg(
                Arg::new(disable_flag)
                    .long(disable_flag)
                    .help(disable_help)
                    .action(clap::ArgAction::SetTrue)
                    .overrides_with(enable_flag),
            );
    }
    cmd
}
