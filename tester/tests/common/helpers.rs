//! Temporary configuration directories and runner construction

use cdc_tester::TestRunner;
use cdc_tester::testing::MemoryConnector;
use shared::ConfigLoader;
use std::fs;
use tempfile::TempDir;

use super::fixtures::TestFixtures;

/// A throwaway `config/` tree with `scenarios/` and `testcases/`
pub struct ConfigDir {
    dir: TempDir,
}

impl ConfigDir {
    pub fn new() -> Self {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("scenarios")).unwrap();
        fs::create_dir_all(dir.path().join("testcases")).unwrap();
        Self { dir }
    }

    pub fn with_scenario(self, name: &str, yaml: &str) -> Self {
        fs::write(self.dir.path().join("scenarios").join(format!("{name}.yaml")), yaml).unwrap();
        self
    }

    pub fn with_suite(self, file: &str, yaml: &str) -> Self {
        fs::write(self.dir.path().join("testcases").join(file), yaml).unwrap();
        self
    }

    pub fn loader(&self) -> ConfigLoader {
        ConfigLoader::new(self.dir.path())
    }
}

pub struct TestHelpers;

impl TestHelpers {
    /// Config dir holding `scenario` and the standard suite
    pub fn config_with(scenario: &str, yaml: &str) -> ConfigDir {
        ConfigDir::new()
            .with_scenario(scenario, yaml)
            .with_suite(TestFixtures::SUITE_FILE, TestFixtures::SUITE)
    }

    pub fn runner(config: &ConfigDir, scenario: &str, connector: &MemoryConnector) -> TestRunner {
        TestRunner::with_connector(scenario, config.loader(), connector.shared()).unwrap()
    }

    /// Both sides report `count` rows of the test table right away
    pub fn converged(connector: &MemoryConnector, count: i64) {
        connector.source().set_count(TestFixtures::TABLE, count);
        connector.target().set_count(TestFixtures::TABLE, count);
    }
}
