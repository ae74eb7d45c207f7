//! Scenario and suite documents used across the integration tests

pub struct TestFixtures;

impl TestFixtures {
    pub const TABLE: &'static str = "cdc_test_base";
    pub const SUITE_FILE: &'static str = "suite.yaml";

    /// Scenario document with both sides on localhost
    pub fn scenario_yaml(scenario_type: &str, check_interval: u64, replication: &str) -> String {
        format!(
            r#"scenario_name: {scenario_type} integration
scenario_type: {scenario_type}
source:
  host: 127.0.0.1
  port: 6001
  user: root
  password: "111"
  database: src_db
  account: acc_src
target:
  host: 127.0.0.1
  port: 6002
  user: root
  password: "111"
  database: tgt_db
  account: acc_tgt
replication_config:
{replication}
validation:
  check_interval: {check_interval}
"#
        )
    }

    pub fn same_engine_yaml(check_interval: u64) -> String {
        Self::scenario_yaml(
            "mo_to_mo",
            check_interval,
            "  sync_mode: incremental\n  batch_size: 1000",
        )
    }

    pub fn cross_cluster_yaml() -> String {
        Self::scenario_yaml("cross_cluster", 2, "  sync_level: database\n  sync_interval: 30")
    }

    /// Two basic cases, one fulltext case and a group naming a missing id
    pub const SUITE: &'static str = r#"
test_suite:
  name: integration suite
  description: exercised by the harness integration tests
test_groups:
  basic: [tc_001, tc_002]
  fulltext: [tc_003]
  broken: [tc_404]
test_cases:
  - id: tc_001
    name: insert rows
    table: cdc_test_base
    steps:
      - action: update
        sql: INSERT INTO cdc_test_base (id, name) VALUES (1, 'a')
      - action: validate_sync
        timeout: 10
  - id: tc_002
    name: delete rows
    table: cdc_test_base
    steps:
      - action: delete
        sql: DELETE FROM cdc_test_base WHERE id = 1
      - action: validate_sync
        timeout: 10
  - id: tc_003
    name: fulltext search
    table: cdc_test_base
    steps:
      - action: validate_index_query
        sql: SELECT id FROM cdc_test_base WHERE MATCH(name) AGAINST('a')
      - action: update
        sql: UPDATE cdc_test_base SET name = 'b' WHERE id = 1
"#;

    pub const INDEX_SQL: &'static str = "SELECT id FROM cdc_test_base WHERE MATCH(name) AGAINST('a')";
    pub const INDEX_FOLLOWUP_SQL: &'static str = "UPDATE cdc_test_base SET name = 'b' WHERE id = 1";
}
