use crate::collectors::custom::CustomQuery;
use crate::collectors::util::is_valid_identifier;
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

pub const DEFAULT_MAX_TABLESPACES: usize = 200;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid tablespace list, expected a JSON array of names: {0}")]
    TablespaceList(String),

    #[error("invalid tablespace name '{0}'")]
    TablespaceName(String),

    #[error("invalid sys metrics source '{0}', expected SYS, PDB or ALL")]
    SysMetricsSource(String),

    #[error("failed to read custom metrics config {path}: {reason}")]
    CustomConfigRead { path: String, reason: String },

    #[error("invalid custom metrics config {path}: {reason}")]
    CustomConfigParse { path: String, reason: String },
}

/// Which system metric view feeds the sys metric groups.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SysMetricsSource {
    #[default]
    Sys,
    Pdb,
    All,
}

impl SysMetricsSource {
    #[must_use]
    pub const fn includes_sys(self) -> bool {
        matches!(self, Self::Sys | Self::All)
    }

    #[must_use]
    pub const fn includes_pdb(self) -> bool {
        matches!(self, Self::Pdb | Self::All)
    }
}

impl FromStr for SysMetricsSource {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "SYS" | "" => Ok(Self::Sys),
            "PDB" => Ok(Self::Pdb),
            "ALL" => Ok(Self::All),
            _ => Err(ConfigError::SysMetricsSource(s.to_string())),
        }
    }
}

/// Where the collected entities are reported from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Endpoint {
    pub hostname: String,
    pub port: u16,
    pub service_name: String,
}

impl Default for Endpoint {
    fn default() -> Self {
        Self {
            hostname: "127.0.0.1".to_string(),
            port: 1521,
            service_name: String::new(),
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.hostname, self.port)
    }
}

/// Settings for one collection pass. Built once at startup and shared
/// read-only with every collection task.
#[derive(Clone, Debug)]
pub struct CollectorConfig {
    pub collect_metrics: bool,
    pub collect_inventory: bool,
    pub extended_metrics: bool,
    tablespaces: Option<Vec<String>>,
    pub skipped_groups: HashSet<String>,
    pub max_tablespaces: usize,
    pub sys_metrics_source: SysMetricsSource,
    pub custom_metrics_query: Option<String>,
    pub custom_queries: Vec<CustomQuery>,
    pub endpoint: Endpoint,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            collect_metrics: true,
            collect_inventory: true,
            extended_metrics: false,
            tablespaces: None,
            skipped_groups: HashSet::new(),
            max_tablespaces: DEFAULT_MAX_TABLESPACES,
            sys_metrics_source: SysMetricsSource::default(),
            custom_metrics_query: None,
            custom_queries: Vec::new(),
            endpoint: Endpoint::default(),
        }
    }
}

impl CollectorConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub const fn with_extended_metrics(mut self, enabled: bool) -> Self {
        self.extended_metrics = enabled;
        self
    }

    /// Restrict tablespace collection. `None` collects every tablespace
    /// (subject to the ceiling), an empty list collects none.
    ///
    /// # Errors
    ///
    /// Returns an error if a name is not a plain Oracle identifier.
    pub fn with_tablespaces(mut self, tablespaces: Option<Vec<String>>) -> Result<Self, ConfigError> {
        if let Some(names) = &tablespaces
            && let Some(bad) = names.iter().find(|n| !is_valid_identifier(n))
        {
            return Err(ConfigError::TablespaceName(bad.clone()));
        }
        self.tablespaces = tablespaces;
        Ok(self)
    }

    #[must_use]
    pub fn with_skipped(mut self, groups: &[String]) -> Self {
        self.skipped_groups = groups
            .iter()
            .map(|g| g.trim().to_string())
            .filter(|g| !g.is_empty())
            .collect();
        self
    }

    #[must_use]
    pub const fn with_max_tablespaces(mut self, max: usize) -> Self {
        self.max_tablespaces = max;
        self
    }

    #[must_use]
    pub const fn with_sys_metrics_source(mut self, source: SysMetricsSource) -> Self {
        self.sys_metrics_source = source;
        self
    }

    #[must_use]
    pub fn with_custom_query(mut self, query: Option<String>) -> Self {
        self.custom_metrics_query = query.filter(|q| !q.trim().is_empty());
        self
    }

    #[must_use]
    pub fn with_custom_queries(mut self, queries: Vec<CustomQuery>) -> Self {
        self.custom_queries = queries;
        self
    }

    #[must_use]
    pub fn with_endpoint(mut self, endpoint: Endpoint) -> Self {
        self.endpoint = endpoint;
        self
    }

    /// Select what the pass collects. Asking for neither means both.
    #[must_use]
    pub const fn with_outputs(mut self, metrics: bool, inventory: bool) -> Self {
        let all = !metrics && !inventory;
        self.collect_metrics = metrics || all;
        self.collect_inventory = inventory || all;
        self
    }

    #[must_use]
    pub fn tablespaces(&self) -> Option<&[String]> {
        self.tablespaces.as_deref()
    }

    #[must_use]
    pub fn is_skipped(&self, group: &str) -> bool {
        self.skipped_groups.contains(group)
    }

    /// `IN (...)` predicate restricting `column` to the allow-list, or `None`
    /// when no restriction applies.
    #[must_use]
    pub fn tablespace_predicate(&self, column: &str) -> Option<String> {
        let names = self.tablespaces.as_ref().filter(|n| !n.is_empty())?;
        let quoted: Vec<String> = names.iter().map(|n| format!("'{n}'")).collect();
        Some(format!("{column} IN ({})", quoted.join(",")))
    }
}

/// Parse the `--tablespaces` argument: a JSON array of names. A blank value
/// means no allow-list.
///
/// # Errors
///
/// Returns an error if the value is not a JSON array of strings.
pub fn parse_tablespaces(raw: Option<&str>) -> Result<Option<Vec<String>>, ConfigError> {
    match raw.map(str::trim) {
        None | Some("") => Ok(None),
        Some(json) => serde_json::from_str::<Vec<String>>(json)
            .map(Some)
            .map_err(|e| ConfigError::TablespaceList(e.to_string())),
    }
}

/// Parse skipped group names given either as a JSON array or a comma list.
#[must_use]
pub fn parse_group_list(raw: &str) -> Vec<String> {
    let raw = raw.trim();
    if raw.starts_with('[')
        && let Ok(list) = serde_json::from_str::<Vec<String>>(raw)
    {
        return list;
    }

    raw.split(',')
        .map(|s| s.trim().trim_matches('"').to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = CollectorConfig::new();
        assert!(config.collect_metrics);
        assert!(config.collect_inventory);
        assert!(!config.extended_metrics);
        assert!(config.tablespaces().is_none());
        assert_eq!(config.max_tablespaces, 200);
        assert_eq!(config.sys_metrics_source, SysMetricsSource::Sys);
        assert_eq!(config.endpoint.to_string(), "127.0.0.1:1521");
    }

    #[test]
    fn test_with_outputs() {
        let c = CollectorConfig::new().with_outputs(true, false);
        assert!(c.collect_metrics && !c.collect_inventory);

        let c = CollectorConfig::new().with_outputs(false, true);
        assert!(!c.collect_metrics && c.collect_inventory);

        let c = CollectorConfig::new().with_outputs(false, false);
        assert!(c.collect_metrics && c.collect_inventory);
    }

    #[test]
    fn test_parse_tablespaces() {
        assert!(matches!(parse_tablespaces(None), Ok(None)));
        assert!(matches!(parse_tablespaces(Some("  ")), Ok(None)));
        assert!(matches!(parse_tablespaces(Some("[]")), Ok(Some(ref v)) if v.is_empty()));
        assert!(matches!(
            parse_tablespaces(Some(r#"["USERS","SYSTEM"]"#)),
            Ok(Some(ref v)) if v.len() == 2
        ));
        assert!(matches!(
            parse_tablespaces(Some("USERS")),
            Err(ConfigError::TablespaceList(_))
        ));
    }

    #[test]
    fn test_rejects_unsafe_tablespace_names() {
        let result = CollectorConfig::new()
            .with_tablespaces(Some(vec!["USERS".into(), "X') OR ('1'='1".into()]));
        assert!(matches!(result, Err(ConfigError::TablespaceName(_))));
    }

    #[test]
    #[allow(clippy::unwrap_used)]
    fn test_tablespace_predicate() {
        let config = CollectorConfig::new()
            .with_tablespaces(Some(vec!["USERS".into(), "SYSAUX".into()]))
            .unwrap();
        assert_eq!(
            config.tablespace_predicate("a.TABLESPACE_NAME").as_deref(),
            Some("a.TABLESPACE_NAME IN ('USERS','SYSAUX')")
        );

        let empty = CollectorConfig::new().with_tablespaces(Some(vec![])).unwrap();
        assert!(empty.tablespace_predicate("TABLESPACE_NAME").is_none());
        assert!(CollectorConfig::new().tablespace_predicate("TABLESPACE_NAME").is_none());
    }

    #[test]
    fn test_parse_group_list() {
        assert_eq!(
            parse_group_list(r#"["sysstat","sga"]"#),
            vec!["sysstat".to_string(), "sga".to_string()]
        );
        assert_eq!(
            parse_group_list("sysstat, sga ,"),
            vec!["sysstat".to_string(), "sga".to_string()]
        );
        assert!(parse_group_list("").is_empty());
    }

    #[test]
    fn test_sys_metrics_source() {
        assert_eq!("pdb".parse::<SysMetricsSource>().ok(), Some(SysMetricsSource::Pdb));
        assert_eq!("All".parse::<SysMetricsSource>().ok(), Some(SysMetricsSource::All));
        assert!("CDB".parse::<SysMetricsSource>().is_err());
        assert!(SysMetricsSource::All.includes_sys() && SysMetricsSource::All.includes_pdb());
        assert!(!SysMetricsSource::Sys.includes_pdb());
    }

    #[test]
    fn test_with_skipped_trims() {
        let config = CollectorConfig::new().with_skipped(&[" sga ".into(), String::new()]);
        assert!(config.is_skipped("sga"));
        assert_eq!(config.skipped_groups.len(), 1);
    }
}
