//! MySQL-protocol sessions backed by sqlx
//!
//! Both MatrixOne and MySQL speak the MySQL wire protocol, so every adapter
//! uses the same session type. Each side gets one exclusive connection; there
//! is no pool.

use async_trait::async_trait;
use shared::ConnectionConfig;
use sqlx::mysql::{MySql, MySqlArguments, MySqlConnectOptions, MySqlConnection, MySqlRow};
use sqlx::query::Query;
use sqlx::{Column, Connection, Executor, Row as _, TypeInfo, ValueRef};
use tracing::{debug, info, warn};

use crate::error::{Side, TesterError, TesterResult};
use crate::traits::{SessionConnector, SqlSession};
use crate::types::{Row, SqlValue};

/// Connector producing [`MySqlSession`]s
#[derive(Debug, Clone, Copy, Default)]
pub struct MySqlConnector;

impl MySqlConnector {
    pub fn new() -> Self {
        Self
    }
}

/// Connection options for one side of a scenario
pub fn connect_options(config: &ConnectionConfig) -> MySqlConnectOptions {
    MySqlConnectOptions::new()
        .host(&config.host)
        .port(config.port)
        .username(&config.user)
        .password(&config.password)
        .database(&config.database)
        .charset("utf8mb4")
        // MatrixOne rejects these session variables during the handshake
        .pipes_as_concat(false)
        .no_engine_substitution(false)
        .timezone(None::<String>)
}

#[async_trait]
impl SessionConnector for MySqlConnector {
    async fn open(&self, side: Side, config: &ConnectionConfig) -> TesterResult<Box<dyn SqlSession>> {
        let options = connect_options(config);
        let conn = MySqlConnection::connect_with(&options)
            .await
            .map_err(|e| TesterError::Connection {
                side,
                endpoint: config.endpoint(),
                message: e.to_string(),
            })?;

        info!(
            "🔌 Connected to {} {}@{}",
            side,
            config.account_or_default(),
            config.endpoint()
        );
        Ok(Box::new(MySqlSession {
            side,
            conn: Some(conn),
        }))
    }
}

/// A single live connection to one side
pub struct MySqlSession {
    side: Side,
    conn: Option<MySqlConnection>,
}

#[async_trait]
impl SqlSession for MySqlSession {
    async fn execute(&mut self, sql: &str, params: &[SqlValue]) -> TesterResult<Vec<Row>> {
        let side = self.side;
        let conn = self
            .conn
            .as_mut()
            .ok_or(TesterError::NotConnected { side })?;

        let mut tx = conn.begin().await.map_err(|e| TesterError::sql(side, e))?;
        let rows = fetch_rows(&mut tx, sql, params)
            .await
            .map_err(|e| TesterError::sql(side, e))?;

        tx.commit().await.map_err(|e| TesterError::sql(side, e))?;

        debug!("{} returned {} rows for: {}", side, rows.len(), sql);
        Ok(rows.iter().map(decode_row).collect())
    }

    async fn close(&mut self) {
        if let Some(conn) = self.conn.take() {
            if let Err(e) = conn.close().await {
                warn!("⚠️ Error closing {} connection: {}", self.side, e);
            }
        }
    }
}

/// Publication, subscription and CDC task DDL cannot be prepared;
/// parameterless statements go over the text protocol.
async fn fetch_rows(
    conn: &mut MySqlConnection,
    sql: &str,
    params: &[SqlValue],
) -> Result<Vec<MySqlRow>, sqlx::Error> {
    match params {
        [] => conn.fetch_all(sqlx::raw_sql(sql)).await,
        _ => conn.fetch_all(bind_all(sqlx::query(sql), params)).await,
    }
}

fn bind_all<'q>(
    mut query: Query<'q, MySql, MySqlArguments>,
    params: &[SqlValue],
) -> Query<'q, MySql, MySqlArguments> {
    for param in params {
        query = match param.clone() {
            SqlValue::Null => query.bind(None::<String>),
            SqlValue::Int(v) => query.bind(v),
            SqlValue::UInt(v) => query.bind(v),
            SqlValue::Float(v) => query.bind(v),
            SqlValue::Text(v) => query.bind(v),
            SqlValue::Bytes(v) => query.bind(v),
        };
    }
    query
}

fn decode_row(row: &MySqlRow) -> Row {
    (0..row.columns().len())
        .map(|index| decode_cell(row, index))
        .collect()
}

fn decode_cell(row: &MySqlRow, index: usize) -> SqlValue {
    match row.try_get_raw(index) {
        Ok(raw) if !raw.is_null() => {}
        _ => return SqlValue::Null,
    }

    let type_name = row.columns()[index].type_info().name().to_ascii_uppercase();
    let decoded = if type_name.ends_with("UNSIGNED") {
        row.try_get_unchecked::<u64, _>(index).map(SqlValue::UInt)
    } else {
        match type_name.as_str() {
            "BOOLEAN" | "TINYINT" | "SMALLINT" | "MEDIUMINT" | "INT" | "BIGINT" | "YEAR" => {
                row.try_get_unchecked::<i64, _>(index).map(SqlValue::Int)
            }
            "FLOAT" | "DOUBLE" => row.try_get_unchecked::<f64, _>(index).map(SqlValue::Float),
            _ => row.try_get_unchecked::<String, _>(index).map(SqlValue::Text),
        }
    };

    decoded
        .or_else(|_| row.try_get_unchecked::<Vec<u8>, _>(index).map(SqlValue::Bytes))
        .unwrap_or(SqlValue::Null)
}
