use crate::{
    cli::actions::{Action, OutputOptions},
    collectors::{
        GROUP_NAMES,
        config::{CollectorConfig, Endpoint, SysMetricsSource, parse_group_list, parse_tablespaces},
        custom,
    },
    database::ConnectionSettings,
};
use anyhow::{Context, Result, anyhow};
use clap::ArgMatches;
use secrecy::SecretString;
use std::path::PathBuf;
use tracing::{debug, info};

/// # Errors
///
/// Returns an error if required arguments are missing or a collection setting
/// is invalid
pub fn handler(matches: &ArgMatches) -> Result<Action> {
    if matches.get_flag("show-version") {
        return Ok(Action::ShowVersion);
    }

    let endpoint = endpoint(matches)?;
    let settings = connection_settings(matches, &endpoint)?;
    let config = collector_config(matches, endpoint)?;

    info!(
        endpoint = %config.endpoint,
        extended_metrics = config.extended_metrics,
        skipped = config.skipped_groups.len(),
        custom_queries = config.custom_queries.len(),
        pooled = settings.pooled(),
        "configuration loaded"
    );

    Ok(Action::Run {
        settings,
        config,
        output: OutputOptions {
            pretty: matches.get_flag("pretty"),
            stats_file: matches.get_one::<PathBuf>("stats-file").cloned(),
        },
    })
}

fn endpoint(matches: &ArgMatches) -> Result<Endpoint> {
    let hostname = matches
        .get_one::<String>("hostname")
        .cloned()
        .ok_or_else(|| anyhow!("Hostname is required. Please provide it using the --hostname flag."))?;

    let port = matches
        .get_one::<u16>("port")
        .copied()
        .ok_or_else(|| anyhow!("Port is required. Please provide it using the --port flag."))?;

    Ok(Endpoint {
        hostname,
        port,
        service_name: matches
            .get_one::<String>("service-name")
            .cloned()
            .unwrap_or_default(),
    })
}

fn connection_settings(matches: &ArgMatches, endpoint: &Endpoint) -> Result<ConnectionSettings> {
    let username = matches
        .get_one::<String>("username")
        .cloned()
        .ok_or_else(|| anyhow!("Username is required. Please provide it using the --username flag."))?;

    let password = SecretString::from(
        matches
            .get_one::<String>("password")
            .cloned()
            .ok_or_else(|| anyhow!("Password is required. Please provide it using the --password flag."))?,
    );

    Ok(ConnectionSettings {
        username,
        password,
        connect_string: connect_string(matches, endpoint),
        sys_dba: matches.get_flag("sys-dba"),
        sys_oper: matches.get_flag("sys-oper"),
        max_open_connections: matches
            .get_one::<u32>("max-open-connections")
            .copied()
            .unwrap_or(5),
        disable_connection_pool: matches.get_flag("disable-connection-pool"),
    })
}

/// `--connection-string` when given, otherwise an Easy Connect string.
#[must_use]
pub fn connect_string(matches: &ArgMatches, endpoint: &Endpoint) -> String {
    if let Some(raw) = matches
        .get_one::<String>("connection-string")
        .map(String::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
    {
        return raw.to_string();
    }

    format!("{}:{}/{}", endpoint.hostname, endpoint.port, endpoint.service_name)
}

fn collector_config(matches: &ArgMatches, endpoint: Endpoint) -> Result<CollectorConfig> {
    let tablespaces = parse_tablespaces(matches.get_one::<String>("tablespaces").map(String::as_str))?;

    let mut skipped: Vec<String> = matches
        .get_one::<String>("skip-metrics-groups")
        .map(|raw| parse_group_list(raw))
        .unwrap_or_default();
    skipped.extend(get_disabled_groups(matches));

    for name in &skipped {
        if !GROUP_NAMES.contains(&name.as_str()) {
            debug!(group = %name, "skipping unknown metric group");
        }
    }

    let sys_metrics_source = matches
        .get_one::<String>("sys-metrics-source")
        .map(|s| s.parse::<SysMetricsSource>())
        .transpose()?
        .unwrap_or_default();

    let custom_queries = match matches.get_one::<PathBuf>("custom-metrics-config") {
        Some(path) => custom::load_config(path).context("failed to load custom metrics config")?,
        None => Vec::new(),
    };

    let config = CollectorConfig::new()
        .with_outputs(matches.get_flag("metrics"), matches.get_flag("inventory"))
        .with_extended_metrics(matches.get_flag("extended-metrics"))
        .with_tablespaces(tablespaces)?
        .with_max_tablespaces(
            matches
                .get_one::<usize>("max-tablespaces")
                .copied()
                .unwrap_or(crate::collectors::config::DEFAULT_MAX_TABLESPACES),
        )
        .with_skipped(&skipped)
        .with_sys_metrics_source(sys_metrics_source)
        .with_custom_query(matches.get_one::<String>("custom-metrics-query").cloned())
        .with_custom_queries(custom_queries)
        .with_endpoint(endpoint);

    Ok(config)
}

/// Groups switched off with `--no-collector.<group>`.
#[must_use]
pub fn get_disabled_groups(matches: &ArgMatches) -> Vec<String> {
    GROUP_NAMES
        .iter()
        .filter(|&name| matches.get_flag(&format!("no-collector.{name}")))
        .map(|&name| name.to_string())
        .collect()
}
