//! Test-suite bundle: grouped test cases made of typed steps

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

/// Default `validate_sync` timeout in seconds
pub const DEFAULT_SYNC_TIMEOUT_SECS: u64 = 60;

/// A parsed `config/testcases/<file>` document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestSuite {
    pub test_suite: SuiteInfo,
    /// Group tag -> ids of the cases belonging to it
    #[serde(default)]
    pub test_groups: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub test_cases: Vec<TestCase>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuiteInfo {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TestCase {
    pub id: String,
    pub name: String,
    /// Table under test; required by the table-scoped validation steps
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table: Option<String>,
    #[serde(default)]
    pub steps: Vec<Step>,
}

/// One action inside a test case, tagged by `action`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Step {
    /// Mutating statement run on the source
    Update { sql: String },
    /// Deleting statement run on the source
    Delete { sql: String },
    /// Wait until both sides hold the same non-zero row count
    ValidateSync {
        #[serde(default = "default_sync_timeout")]
        timeout: u64,
    },
    /// Run the same query on both sides and compare the result sets
    ValidateIndexQuery { sql: String },
    /// Compare every row of the case table, ordered by id
    ValidateData {
        #[serde(default, rename = "where", skip_serializing_if = "Option::is_none")]
        where_clause: Option<String>,
    },
}

fn default_sync_timeout() -> u64 {
    DEFAULT_SYNC_TIMEOUT_SECS
}

impl Step {
    pub fn action(&self) -> &'static str {
        match self {
            Step::Update { .. } => "update",
            Step::Delete { .. } => "delete",
            Step::ValidateSync { .. } => "validate_sync",
            Step::ValidateIndexQuery { .. } => "validate_index_query",
            Step::ValidateData { .. } => "validate_data",
        }
    }
}

/// Outcome of resolving a group tag against the suite
#[derive(Debug, Clone, PartialEq)]
pub struct CaseSelection<'a> {
    pub cases: Vec<&'a TestCase>,
    /// The group was undefined or empty and every case was selected
    pub fell_back: bool,
    /// Ids listed in the group that match no case
    pub unknown_ids: Vec<String>,
}

impl TestSuite {
    pub fn name(&self) -> &str {
        &self.test_suite.name
    }

    /// Cases of `group` in file order, or all cases when the group is
    /// undefined or empty.
    pub fn select_cases(&self, group: &str) -> CaseSelection<'_> {
        let ids = match self.test_groups.get(group) {
            Some(ids) if !ids.is_empty() => ids,
            _ => {
                return CaseSelection {
                    cases: self.test_cases.iter().collect(),
                    fell_back: true,
                    unknown_ids: Vec::new(),
                };
            }
        };

        let wanted: HashSet<&str> = ids.iter().map(String::as_str).collect();
        let cases: Vec<&TestCase> = self
            .test_cases
            .iter()
            .filter(|case| wanted.contains(case.id.as_str()))
            .collect();

        let known: HashSet<&str> = self.test_cases.iter().map(|c| c.id.as_str()).collect();
        let unknown_ids = ids
            .iter()
            .filter(|id| !known.contains(id.as_str()))
            .cloned()
            .collect();

        CaseSelection {
            cases,
            fell_back: false,
            unknown_ids,
        }
    }

    /// Defined group tags, sorted
    pub fn group_names(&self) -> Vec<&str> {
        self.test_groups.keys().map(String::as_str).collect()
    }
}
