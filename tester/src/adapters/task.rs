//! CDC task statements shared by the same-engine and cross-engine adapters
//!
//! The statements are built from `replication_config` and may be replaced
//! wholesale through the `create_task_sql` / `drop_task_sql` templates.
//! Placeholders: `{task}`, `{source_db}`, `{target_db}`, `{sync_mode}`,
//! `{batch_size}`. They are only sent to the source when `execute_task` is
//! set; otherwise the task is logged and treated as configured.

use shared::ScenarioConfig;
use tracing::{debug, info};

use super::SessionPair;
use crate::error::{Side, TesterError, TesterResult};

/// Where the task replicates to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskTarget {
    SameEngine,
    CrossEngine { type_mapping: bool },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReplicationTask {
    name: String,
    source_db: String,
    target_db: String,
    create_sql: String,
    drop_sql: String,
    execute: bool,
}

impl ReplicationTask {
    /// Build the task for `config`; `sync_mode` and `batch_size` are required
    pub fn from_scenario(config: &ScenarioConfig, target: TaskTarget) -> TesterResult<Self> {
        let params = &config.replication_config;
        let source_db = config.source.database.clone();
        let target_db = config.target.database.clone();

        let sync_mode = params
            .get_str("sync_mode")
            .ok_or_else(|| TesterError::config("replication_config.sync_mode is required"))?;
        let batch_size = params
            .get_u64("batch_size")
            .ok_or_else(|| TesterError::config("replication_config.batch_size must be a positive integer"))?;
        if batch_size == 0 {
            return Err(TesterError::config("replication_config.batch_size must be a positive integer"));
        }

        let name = params
            .get_str("task_name")
            .unwrap_or_else(|| format!("cdc_task_{source_db}_to_{target_db}"));

        let vars = [
            ("task", name.clone()),
            ("source_db", source_db.clone()),
            ("target_db", target_db.clone()),
            ("sync_mode", sync_mode.clone()),
            ("batch_size", batch_size.to_string()),
        ];

        let create_sql = match params.get_str("create_task_sql") {
            Some(template) => render(&template, &vars),
            None => {
                let mut sql = format!(
                    "CREATE CDC TASK IF NOT EXISTS {name} FROM {source_db} TO {target_db} \
                     WITH (sync_mode = '{sync_mode}', batch_size = {batch_size})"
                );
                if let TaskTarget::CrossEngine { type_mapping: true } = target {
                    sql.push_str(" WITH TYPE_MAPPING");
                }
                sql
            }
        };
        let drop_sql = match params.get_str("drop_task_sql") {
            Some(template) => render(&template, &vars),
            None => format!("DROP CDC TASK IF EXISTS {name}"),
        };

        Ok(Self {
            name,
            source_db,
            target_db,
            create_sql,
            drop_sql,
            execute: params.get_bool("execute_task").unwrap_or(false),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn create_sql(&self) -> &str {
        &self.create_sql
    }

    pub fn drop_sql(&self) -> &str {
        &self.drop_sql
    }

    /// Whether statements are sent to the source
    pub fn executes(&self) -> bool {
        self.execute
    }

    pub async fn create(&self, sessions: &mut SessionPair) -> TesterResult<()> {
        if !self.execute {
            info!(
                "✓ CDC task {} configured: {} -> {} (not executed)",
                self.name, self.source_db, self.target_db
            );
            debug!("   {}", self.create_sql);
            return Ok(());
        }

        sessions
            .execute(Side::Source, &self.create_sql, &[])
            .await
            .map_err(|e| TesterError::setup(format!("creating CDC task {}: {e}", self.name)))?;
        info!(
            "✓ CDC task {} created: {} -> {}",
            self.name, self.source_db, self.target_db
        );
        Ok(())
    }

    pub async fn remove(&self, sessions: &mut SessionPair) -> TesterResult<()> {
        if !self.execute {
            debug!("   {}", self.drop_sql);
            return Ok(());
        }

        sessions
            .execute(Side::Source, &self.drop_sql, &[])
            .await
            .map(|_| ())
    }
}

fn render(template: &str, vars: &[(&str, String)]) -> String {
    vars.iter().fold(template.to_string(), |sql, (key, value)| {
        sql.replace(&format!("{{{key}}}"), value)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::fixtures;

    #[test]
    fn test_default_statements() {
        let config = fixtures::scenario("mo_to_mo");
        let task = ReplicationTask::from_scenario(&config, TaskTarget::SameEngine).unwrap();

        assert_eq!(task.name(), "cdc_task_src_db_to_tgt_db");
        assert_eq!(
            task.create_sql(),
            "CREATE CDC TASK IF NOT EXISTS cdc_task_src_db_to_tgt_db FROM src_db TO tgt_db \
             WITH (sync_mode = 'incremental', batch_size = 1000)"
        );
        assert_eq!(task.drop_sql(), "DROP CDC TASK IF EXISTS cdc_task_src_db_to_tgt_db");
        assert!(!task.executes());
    }

    #[test]
    fn test_type_mapping_clause() {
        let config = fixtures::scenario("mo_to_mysql");
        let mapped = ReplicationTask::from_scenario(&config, TaskTarget::CrossEngine { type_mapping: true }).unwrap();
        let plain = ReplicationTask::from_scenario(&config, TaskTarget::CrossEngine { type_mapping: false }).unwrap();

        assert!(mapped.create_sql().ends_with(" WITH TYPE_MAPPING"));
        assert!(!plain.create_sql().contains("TYPE_MAPPING"));
    }

    #[test]
    fn test_templates_override_statements() {
        let mut config = fixtures::scenario("mo_to_mo");
        config.replication_config = config
            .replication_config
            .with("task_name", "nightly")
            .with("create_task_sql", "CREATE TASK {task} ON {source_db} MODE {sync_mode} BATCH {batch_size}")
            .with("drop_task_sql", "DROP TASK {task}")
            .with("execute_task", true);

        let task = ReplicationTask::from_scenario(&config, TaskTarget::SameEngine).unwrap();
        assert_eq!(task.create_sql(), "CREATE TASK nightly ON src_db MODE incremental BATCH 1000");
        assert_eq!(task.drop_sql(), "DROP TASK nightly");
        assert!(task.executes());
    }

    #[test]
    fn test_missing_parameters_are_configuration_errors() {
        let mut config = fixtures::scenario("mo_to_mo");
        config.replication_config = shared::ReplicationParams::new().with("batch_size", 10u64);
        let err = ReplicationTask::from_scenario(&config, TaskTarget::SameEngine).unwrap_err();
        assert!(err.is_configuration());
        assert!(err.to_string().contains("sync_mode"));

        config.replication_config = shared::ReplicationParams::new()
            .with("sync_mode", "full")
            .with("batch_size", 0u64);
        assert!(ReplicationTask::from_scenario(&config, TaskTarget::SameEngine).is_err());
    }
}
