//! The fixed catalog of diagnostic queries.

use crate::collectors::config::CollectorConfig;

pub mod instance;
pub mod sysmetrics;
pub mod tablespace;

pub(crate) const fn always(_: &CollectorConfig) -> bool {
    true
}

/// Allow-list clause for `column`, introduced by `keyword` (`WHERE`/`AND`),
/// or an empty string when the run is not restricted.
pub(crate) fn tablespace_clause(config: &CollectorConfig, keyword: &str, column: &str) -> String {
    config
        .tablespace_predicate(column)
        .map(|p| format!("\n    {keyword} {p}"))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[allow(clippy::unwrap_used)]
    fn test_tablespace_clause() {
        let config = CollectorConfig::new()
            .with_tablespaces(Some(vec!["USERS".into()]))
            .unwrap();
        assert_eq!(
            tablespace_clause(&config, "WHERE", "TABLESPACE_NAME"),
            "\n    WHERE TABLESPACE_NAME IN ('USERS')"
        );
        assert_eq!(tablespace_clause(&CollectorConfig::new(), "AND", "TABLESPACE_NAME"), "");
    }
}
