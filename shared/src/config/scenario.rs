//! Scenario definition: where the two clusters live and how replication is wired

use serde::{Deserialize, Serialize};
use serde_yaml::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

/// Account used by MatrixOne when a connection does not name one
pub const DEFAULT_ACCOUNT: &str = "sys";

/// Polling interval used when `validation.check_interval` is absent
pub const DEFAULT_CHECK_INTERVAL_SECS: u64 = 10;

/// A fully parsed `config/scenarios/<name>.yaml` document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioConfig {
    pub scenario_name: String,
    /// Registry key of the adapter driving this scenario
    pub scenario_type: String,
    pub source: ConnectionConfig,
    pub target: ConnectionConfig,
    #[serde(default, alias = "cdc_config", alias = "flink_cdc")]
    pub replication_config: ReplicationParams,
    #[serde(default)]
    pub validation: ValidationConfig,
}

/// Connection descriptor for one side of the replication link
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConnectionConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table: Option<String>,
}

impl ConnectionConfig {
    pub fn account_or_default(&self) -> &str {
        self.account.as_deref().unwrap_or(DEFAULT_ACCOUNT)
    }

    /// `host:port`, for log lines
    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("database", &self.database)
            .field("account", &self.account)
            .field("table", &self.table)
            .finish()
    }
}

/// Adapter-specific replication settings (sync mode, batch size, topic, ...)
///
/// Kept as an open mapping because every topology reads a different set of
/// keys; the typed accessors return `None` when a key is absent or has the
/// wrong shape.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct ReplicationParams(BTreeMap<String, Value>);

impl ReplicationParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert, mostly for tests
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// String value; numbers and booleans are rendered as text
    pub fn get_str(&self, key: &str) -> Option<String> {
        match self.0.get(key)? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }

    pub fn get_u64(&self, key: &str) -> Option<u64> {
        match self.0.get(key)? {
            Value::Number(n) => n.as_u64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Boolean flag. Also accepts the nested `{ enabled: bool }` form.
    pub fn get_bool(&self, key: &str) -> Option<bool> {
        match self.0.get(key)? {
            Value::Bool(b) => Some(*b),
            Value::Mapping(m) => m.get("enabled").and_then(Value::as_bool),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// List of strings. A comma-separated string is split.
    pub fn get_str_list(&self, key: &str) -> Option<Vec<String>> {
        match self.0.get(key)? {
            Value::Sequence(items) => Some(
                items
                    .iter()
                    .filter_map(|v| match v {
                        Value::String(s) => Some(s.clone()),
                        Value::Number(n) => Some(n.to_string()),
                        _ => None,
                    })
                    .collect(),
            ),
            Value::String(s) => Some(
                s.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(String::from)
                    .collect(),
            ),
            _ => None,
        }
    }
}

/// Convergence-check settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ValidationConfig {
    /// Seconds between row-count polls
    #[serde(default = "default_check_interval")]
    pub check_interval: u64,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

fn default_check_interval() -> u64 {
    DEFAULT_CHECK_INTERVAL_SECS
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            check_interval: DEFAULT_CHECK_INTERVAL_SECS,
            extra: BTreeMap::new(),
        }
    }
}

impl ValidationConfig {
    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.check_interval)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCENARIO: &str = r#"
scenario_name: MO to MO
scenario_type: mo_to_mo
source:
  host: 127.0.0.1
  port: 6001
  user: root
  password: "111"
  database: src_db
target:
  host: 127.0.0.1
  port: 6002
  user: root
  password: "111"
  database: dst_db
  account: acc1
cdc_config:
  sync_mode: full
  batch_size: 1000
  type_mapping:
    enabled: true
  tables: [a, b]
validation:
  check_interval: 5
  max_wait: 300
"#;

    #[test]
    fn test_parse_scenario_with_cdc_config_alias() {
        let config: ScenarioConfig = serde_yaml::from_str(SCENARIO).unwrap();

        assert_eq!(config.scenario_type, "mo_to_mo");
        assert_eq!(config.source.port, 6001);
        assert_eq!(config.source.account_or_default(), DEFAULT_ACCOUNT);
        assert_eq!(config.target.account_or_default(), "acc1");
        assert_eq!(
            config.replication_config.get_str("sync_mode").as_deref(),
            Some("full")
        );
        assert_eq!(config.replication_config.get_u64("batch_size"), Some(1000));
        assert_eq!(config.replication_config.get_bool("type_mapping"), Some(true));
        assert_eq!(
            config.replication_config.get_str_list("tables"),
            Some(vec!["a".to_string(), "b".to_string()])
        );
        assert_eq!(config.validation.check_interval(), Duration::from_secs(5));
        assert!(config.validation.extra.contains_key("max_wait"));
    }

    #[test]
    fn test_validation_defaults_when_absent() {
        let trimmed: String = SCENARIO
            .lines()
            .take_while(|line| !line.starts_with("cdc_config"))
            .collect::<Vec<_>>()
            .join("\n");
        let config: ScenarioConfig = serde_yaml::from_str(&trimmed).unwrap();

        assert_eq!(config.validation.check_interval, DEFAULT_CHECK_INTERVAL_SECS);
        assert!(config.replication_config.get("sync_mode").is_none());
    }

    #[test]
    fn test_debug_redacts_password() {
        let config: ScenarioConfig = serde_yaml::from_str(SCENARIO).unwrap();
        let rendered = format!("{:?}", config.source);
        assert!(!rendered.contains("111"));
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    fn test_str_list_from_comma_separated_string() {
        let params = ReplicationParams::new().with("tables", "t1, t2,,t3");
        assert_eq!(
            params.get_str_list("tables"),
            Some(vec!["t1".to_string(), "t2".to_string(), "t3".to_string()])
        );
    }
}
