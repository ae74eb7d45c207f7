//! Ready-made scenario and suite values

use shared::{ConnectionConfig, ReplicationParams, ScenarioConfig, Step, SuiteInfo, TestCase, TestSuite, ValidationConfig};
use std::collections::BTreeMap;

pub fn connection(host: &str, database: &str) -> ConnectionConfig {
    ConnectionConfig {
        host: host.to_string(),
        port: 6001,
        user: "root".to_string(),
        password: "111".to_string(),
        database: database.to_string(),
        account: None,
        table: None,
    }
}

/// Scenario of the given type with the parameters its adapter needs
pub fn scenario(scenario_type: &str) -> ScenarioConfig {
    let replication_config = match scenario_type {
        "mo_to_mo" => ReplicationParams::new()
            .with("sync_mode", "incremental")
            .with("batch_size", 1000u64),
        "mo_to_mysql" => ReplicationParams::new()
            .with("sync_mode", "full")
            .with("batch_size", 500u64)
            .with("type_mapping", true),
        "cross_cluster" => ReplicationParams::new()
            .with("sync_level", "database")
            .with("sync_interval", 30u64),
        _ => ReplicationParams::new(),
    };

    ScenarioConfig {
        scenario_name: format!("{scenario_type} fixture"),
        scenario_type: scenario_type.to_string(),
        source: connection("source.local", "src_db"),
        target: connection("target.local", "tgt_db"),
        replication_config,
        validation: ValidationConfig::default(),
    }
}

pub fn case(id: &str, table: Option<&str>, steps: Vec<Step>) -> TestCase {
    TestCase {
        id: id.to_string(),
        name: format!("case {id}"),
        table: table.map(String::from),
        steps,
    }
}

pub fn suite(cases: Vec<TestCase>, groups: &[(&str, &[&str])]) -> TestSuite {
    TestSuite {
        test_suite: SuiteInfo {
            name: "fixture suite".to_string(),
            description: None,
        },
        test_groups: groups
            .iter()
            .map(|(name, ids)| (name.to_string(), ids.iter().map(|id| id.to_string()).collect()))
            .collect::<BTreeMap<_, _>>(),
        test_cases: cases,
    }
}
