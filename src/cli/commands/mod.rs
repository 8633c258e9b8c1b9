pub mod collectors;

use clap::{
    Arg, ArgAction, ColorChoice, Command,
    builder::styling::{AnsiColor, Effects, Styles},
};

use self::collectors::add_collectors_args;

#[must_use]
pub fn new() -> Command {
    let styles = Styles::styled()
        .header(AnsiColor::Yellow.on_default() | Effects::BOLD)
        .usage(AnsiColor::Green.on_default() | Effects::BOLD)
        .literal(AnsiColor::Blue.on_default() | Effects::BOLD)
        .placeholder(AnsiColor::Green.on_default());

    let cmd = Command::new("oracledb_agent")
        .about("Collect Oracle Database telemetry and print it as JSON")
        .version(env!("CARGO_PKG_VERSION"))
        .color(ColorChoice::Auto)
        .styles(styles)
        .next_help_heading("Connection")
        .arg(
            Arg::new("username")
                .short('u')
                .long("username")
                .help("Database user name")
                .env("ORACLEDB_USERNAME"),
        )
        .arg(
            Arg::new("password")
                .long("password")
                .help("Database password")
                .env("ORACLEDB_PASSWORD")
                .hide_env_values(true),
        )
        .arg(
            Arg::new("hostname")
                .short('H')
                .long("hostname")
                .help("Database host name")
                .default_value("127.0.0.1")
                .env("ORACLEDB_HOSTNAME"),
        )
        .arg(
            Arg::new("port")
                .short('p')
                .long("port")
                .help("Database listener port")
                .default_value("1521")
                .env("ORACLEDB_PORT")
                .value_parser(clap::value_parser!(u16)),
        )
        .arg(
            Arg::new("service-name")
                .long("service-name")
                .help("Oracle service name")
                .default_value("")
                .env("ORACLEDB_SERVICE_NAME"),
        )
        .arg(
            Arg::new("connection-string")
                .long("connection-string")
                .help("Full connect string, takes precedence over hostname, port and service name")
                .env("ORACLEDB_CONNECTION_STRING"),
        )
        .arg(
            Arg::new("sys-dba")
                .long("sys-dba")
                .help("Connect with the SYSDBA privilege")
                .env("ORACLEDB_SYS_DBA")
                .action(ArgAction::SetTrue)
                .conflicts_with("sys-oper"),
        )
        .arg(
            Arg::new("sys-oper")
                .long("sys-oper")
                .help("Connect with the SYSOPER privilege")
                .env("ORACLEDB_SYS_OPER")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("max-open-connections")
                .long("max-open-connections")
                .help("Maximum number of pooled sessions")
                .default_value("5")
                .env("ORACLEDB_MAX_OPEN_CONNECTIONS")
                .value_parser(clap::value_parser!(u32).range(1..)),
        )
        .arg(
            Arg::new("disable-connection-pool")
                .long("disable-connection-pool")
                .help("Open a standalone session per query instead of using a pool")
                .env("ORACLEDB_DISABLE_CONNECTION_POOL")
                .action(ArgAction::SetTrue),
        )
        .next_help_heading("Collection")
        .arg(
            Arg::new("extended-metrics")
                .long("extended-metrics")
                .help("Collect extended metrics")
                .env("ORACLEDB_EXTENDED_METRICS")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("tablespaces")
                .long("tablespaces")
                .help("JSON array of tablespaces to collect, all when unset, none when empty")
                .env("ORACLEDB_TABLESPACES"),
        )
        .arg(
            Arg::new("max-tablespaces")
                .long("max-tablespaces")
                .help("Skip tablespace collection when more tablespaces exist and no list is given")
                .default_value("200")
                .env("ORACLEDB_MAX_TABLESPACES")
                .value_parser(clap::value_parser!(usize)),
        )
        .arg(
            Arg::new("skip-metrics-groups")
                .long("skip-metrics-groups")
                .help("Metric groups to skip, as a JSON array or comma separated list")
                .env("ORACLEDB_SKIP_METRICS_GROUPS"),
        )
        .arg(
            Arg::new("sys-metrics-source")
                .long("sys-metrics-source")
                .help("System metric view to read")
                .default_value("SYS")
                .env("ORACLEDB_SYS_METRICS_SOURCE")
                .value_parser(["SYS", "PDB", "ALL", "sys", "pdb", "all"]),
        )
        .arg(
            Arg::new("custom-metrics-query")
                .long("custom-metrics-query")
                .help("SQL query collected into custom samples")
                .env("ORACLEDB_CUSTOM_METRICS_QUERY"),
        )
        .arg(
            Arg::new("custom-metrics-config")
                .long("custom-metrics-config")
                .help("YAML file with custom queries to collect")
                .env("ORACLEDB_CUSTOM_METRICS_CONFIG")
                .value_parser(clap::value_parser!(std::path::PathBuf)),
        )
        .next_help_heading("Output")
        .arg(
            Arg::new("metrics")
                .long("metrics")
                .help("Only collect metrics")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("inventory")
                .long("inventory")
                .help("Only collect inventory")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("pretty")
                .long("pretty")
                .help("Pretty print the JSON payload")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("stats-file")
                .long("stats-file")
                .help("Write agent self-metrics in Prometheus text format to this file")
                .env("ORACLEDB_STATS_FILE")
                .value_parser(clap::value_parser!(std::path::PathBuf)),
        )
        .arg(
            Arg::new("show-version")
                .long("show-version")
                .help("Print build information and exit")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("verbosity")
                .short('v')
                .long("verbose")
                .help("Verbosity level: -v (warn), -vv (info), -vvv (debug), -vvvv (trace)")
                .action(ArgAction::Count)
                .global(true),
        )
        .next_help_heading("Metric groups");

    add_collectors_args(cmd)
}
