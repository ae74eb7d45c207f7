//! Reads scenario and test-suite documents from the configuration directory
//!
//! Layout:
//! - `<config_dir>/scenarios/<name>.yaml`
//! - `<config_dir>/testcases/<file>`
//!
//! Nothing is cached; every call goes back to disk.

use serde::Serialize;
use serde_yaml::Value;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use super::scenario::ScenarioConfig;
use super::testsuite::TestSuite;
use crate::errors::{SharedError, SharedResult};

pub const DEFAULT_CONFIG_DIR: &str = "config";

const SCENARIO_EXTENSIONS: [&str; 2] = ["yaml", "yml"];

/// Discovery entry returned by [`ConfigLoader::list_scenarios`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScenarioSummary {
    /// File stem, i.e. the key passed to `--scenario`
    pub file: String,
    pub name: Option<String>,
    pub scenario_type: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ConfigLoader {
    config_dir: PathBuf,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new(DEFAULT_CONFIG_DIR)
    }
}

impl ConfigLoader {
    pub fn new(config_dir: impl Into<PathBuf>) -> Self {
        Self {
            config_dir: config_dir.into(),
        }
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    fn scenarios_dir(&self) -> PathBuf {
        self.config_dir.join("scenarios")
    }

    fn testcases_dir(&self) -> PathBuf {
        self.config_dir.join("testcases")
    }

    /// Load `scenarios/<name>.yaml` (or `.yml`)
    pub fn load_scenario(&self, name: &str) -> SharedResult<ScenarioConfig> {
        let dir = self.scenarios_dir();
        let path = SCENARIO_EXTENSIONS
            .iter()
            .map(|ext| dir.join(format!("{name}.{ext}")))
            .find(|p| p.is_file())
            .ok_or_else(|| SharedError::ScenarioNotFound {
                path: dir.join(format!("{name}.yaml")),
            })?;

        debug!("Loading scenario from {}", path.display());
        parse_file(&path)
    }

    /// Load a test-suite bundle from `testcases/<file>`
    pub fn load_testsuite(&self, file: &str) -> SharedResult<TestSuite> {
        let path = self.testcases_dir().join(file);
        if !path.is_file() {
            return Err(SharedError::TestSuiteNotFound { path });
        }

        debug!("Loading test suite from {}", path.display());
        parse_file(&path)
    }

    /// Every scenario definition in the scenarios directory, sorted by file key.
    ///
    /// Files are read leniently: missing fields show up as `None` and files
    /// that are not YAML at all are skipped with a warning.
    pub fn list_scenarios(&self) -> SharedResult<Vec<ScenarioSummary>> {
        let dir = self.scenarios_dir();
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => return Err(SharedError::Io { path: dir, source }),
        };

        let mut scenarios = Vec::new();
        for entry in entries {
            let path = entry
                .map_err(|source| SharedError::Io {
                    path: dir.clone(),
                    source,
                })?
                .path();

            let is_scenario = path
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| SCENARIO_EXTENSIONS.contains(&ext));
            if !is_scenario {
                continue;
            }

            let Some(file) = path.file_stem().and_then(|s| s.to_str()).map(String::from) else {
                continue;
            };

            let document: Value = match parse_file(&path) {
                Ok(document) => document,
                Err(e) => {
                    warn!("⚠️ Skipping unreadable scenario {}: {}", path.display(), e);
                    continue;
                }
            };

            scenarios.push(ScenarioSummary {
                file,
                name: string_field(&document, "scenario_name"),
                scenario_type: string_field(&document, "scenario_type"),
            });
        }

        scenarios.sort_by(|a, b| a.file.cmp(&b.file));
        Ok(scenarios)
    }
}

fn string_field(document: &Value, key: &str) -> Option<String> {
    document.get(key).and_then(Value::as_str).map(String::from)
}

fn parse_file<T: serde::de::DeserializeOwned>(path: &Path) -> SharedResult<T> {
    let contents = fs::read_to_string(path).map_err(|source| SharedError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_yaml::from_str(&contents).map_err(|e| SharedError::parse(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(dir: &Path, relative: &str, contents: &str) {
        let path = dir.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }

    fn scenario_yaml(name: &str, kind: &str) -> String {
        format!(
            r#"
scenario_name: {name}
scenario_type: {kind}
source: {{ host: 127.0.0.1, port: 6001, user: root, password: "111", database: src }}
target: {{ host: 127.0.0.1, port: 6002, user: root, password: "111", database: dst }}
validation: {{ check_interval: 2 }}
"#
        )
    }

    #[test]
    fn test_load_scenario_yaml_and_yml() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "scenarios/mo_to_mo.yaml", &scenario_yaml("MO", "mo_to_mo"));
        write(dir.path(), "scenarios/legacy.yml", &scenario_yaml("Legacy", "mo_to_mysql"));
        let loader = ConfigLoader::new(dir.path());

        let config = loader.load_scenario("mo_to_mo").unwrap();
        assert_eq!(config.scenario_name, "MO");
        assert_eq!(config.validation.check_interval, 2);

        let legacy = loader.load_scenario("legacy").unwrap();
        assert_eq!(legacy.scenario_type, "mo_to_mysql");
    }

    #[test]
    fn test_missing_files_are_not_found() {
        let dir = TempDir::new().unwrap();
        let loader = ConfigLoader::new(dir.path());

        let err = loader.load_scenario("nope").unwrap_err();
        assert!(matches!(err, SharedError::ScenarioNotFound { .. }));
        assert!(err.is_not_found());

        let err = loader.load_testsuite("nope.yaml").unwrap_err();
        assert!(matches!(err, SharedError::TestSuiteNotFound { .. }));
    }

    #[test]
    fn test_malformed_scenario_is_parse_error() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "scenarios/broken.yaml", "scenario_name: [unclosed");
        let loader = ConfigLoader::new(dir.path());

        let err = loader.load_scenario("broken").unwrap_err();
        assert!(matches!(err, SharedError::ParseError { .. }));
    }

    #[test]
    fn test_list_scenarios_sorted_and_lenient() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "scenarios/mo_to_mysql.yaml", &scenario_yaml("MO to MySQL", "mo_to_mysql"));
        write(dir.path(), "scenarios/cross_cluster.yaml", &scenario_yaml("Cross", "cross_cluster"));
        write(dir.path(), "scenarios/partial.yaml", "scenario_name: Partial\n");
        write(dir.path(), "scenarios/broken.yaml", "scenario_name: [unclosed");
        write(dir.path(), "scenarios/README.md", "not a scenario");
        let loader = ConfigLoader::new(dir.path());

        let scenarios = loader.list_scenarios().unwrap();
        let files: Vec<&str> = scenarios.iter().map(|s| s.file.as_str()).collect();
        assert_eq!(files, vec!["cross_cluster", "mo_to_mysql", "partial"]);

        assert_eq!(scenarios[0].scenario_type.as_deref(), Some("cross_cluster"));
        assert_eq!(scenarios[2].name.as_deref(), Some("Partial"));
        assert_eq!(scenarios[2].scenario_type, None);
    }

    #[test]
    fn test_list_scenarios_without_directory_is_empty() {
        let dir = TempDir::new().unwrap();
        let loader = ConfigLoader::new(dir.path().join("missing"));
        assert!(loader.list_scenarios().unwrap().is_empty());
    }
}
