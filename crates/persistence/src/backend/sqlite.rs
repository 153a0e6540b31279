//! SQLite 会话
//!
//! 主要用于嵌入式部署与集成测试。批量导入逐行复用同一条预编译语句，
//! 单行违反约束时通过回调报告并继续，不会使事务失效。

use std::time::Instant;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use erp_shared::Provider;
use sqlx::query::Query;
use sqlx::sqlite::{SqliteArguments, SqliteRow};
use sqlx::{Row, Sqlite, Transaction};
use tracing::{debug, warn};

use super::{BulkBuffer, BulkRowError, Session, record_statement};
use crate::entity::{ColumnKind, Record, SelectColumn, SqlValue};
use crate::error::Result;
use crate::query::{SqliteDialect, Statement};

/// 基于 sqlx 事务的 SQLite 会话
pub struct SqliteSession {
    tx: Transaction<'static, Sqlite>,
}

impl SqliteSession {
    pub fn new(tx: Transaction<'static, Sqlite>) -> Self {
        Self { tx }
    }
}

fn bind_values<'q>(sql: &'q str, params: &'q [SqlValue]) -> Query<'q, Sqlite, SqliteArguments<'q>> {
    params
        .iter()
        .fold(sqlx::query(sql), |query, param| match param {
            SqlValue::Bool(v) => query.bind(*v),
            SqlValue::Int(v) => query.bind(*v),
            SqlValue::Float(v) => query.bind(*v),
            SqlValue::Text(v) => query.bind(v.as_deref()),
            SqlValue::Timestamp(v) => query.bind(*v),
        })
}

fn decode_row(row: &SqliteRow, columns: &[SelectColumn]) -> Result<Record> {
    let mut record = Record::with_capacity(columns.len());
    for column in columns {
        let alias = column.alias.as_str();
        let value = match column.kind {
            ColumnKind::Bool => SqlValue::Bool(row.try_get::<Option<bool>, _>(alias)?),
            ColumnKind::Int => SqlValue::Int(row.try_get::<Option<i64>, _>(alias)?),
            ColumnKind::Float => SqlValue::Float(row.try_get::<Option<f64>, _>(alias)?),
            ColumnKind::Text | ColumnKind::Enum => {
                SqlValue::Text(row.try_get::<Option<String>, _>(alias)?)
            }
            ColumnKind::Timestamp => {
                SqlValue::Timestamp(row.try_get::<Option<DateTime<Utc>>, _>(alias)?)
            }
        };
        record.push(alias, value);
    }
    Ok(record)
}

/// 是否为行级约束冲突（唯一、外键、非空、检查）
fn is_row_violation(err: &sqlx::Error) -> bool {
    err.as_database_error().is_some_and(|db| {
        db.is_unique_violation()
            || db.is_foreign_key_violation()
            || db.is_check_violation()
            || db.message().contains("NOT NULL constraint failed")
    })
}

#[async_trait]
impl Session for SqliteSession {
    fn provider(&self) -> Provider {
        Provider::Sqlite
    }

    async fn execute(&mut self, stmt: &Statement) -> Result<u64> {
        debug!(sql = %stmt.sql, params = stmt.params.len(), "execute");
        let started = Instant::now();
        let result = bind_values(&stmt.sql, &stmt.params)
            .execute(&mut *self.tx)
            .await?;
        record_statement(&stmt.sql, started);
        Ok(result.rows_affected())
    }

    async fn fetch_all(
        &mut self,
        stmt: &Statement,
        columns: &[SelectColumn],
    ) -> Result<Vec<Record>> {
        debug!(sql = %stmt.sql, params = stmt.params.len(), "fetch_all");
        let started = Instant::now();
        let rows = bind_values(&stmt.sql, &stmt.params)
            .fetch_all(&mut *self.tx)
            .await?;
        record_statement(&stmt.sql, started);
        rows.iter().map(|row| decode_row(row, columns)).collect()
    }

    async fn fetch_scalar(&mut self, stmt: &Statement) -> Result<Option<i64>> {
        debug!(sql = %stmt.sql, params = stmt.params.len(), "fetch_scalar");
        let started = Instant::now();
        let row = bind_values(&stmt.sql, &stmt.params)
            .fetch_optional(&mut *self.tx)
            .await?;
        record_statement(&stmt.sql, started);
        match row {
            Some(row) => Ok(row.try_get::<Option<i64>, _>(0)?),
            None => Ok(None),
        }
    }

    async fn bulk_load(
        &mut self,
        buffer: &BulkBuffer,
        _chunk_size: usize,
        on_error: &mut (dyn FnMut(BulkRowError) + Send),
    ) -> Result<u64> {
        let sql = buffer.insert_sql::<SqliteDialect>();
        debug!(sql = %sql, rows = buffer.len(), "bulk insert");
        let started = Instant::now();

        let mut loaded = 0;
        for row in buffer.rows() {
            match bind_values(&sql, &row.values).execute(&mut *self.tx).await {
                Ok(result) => loaded += result.rows_affected(),
                Err(err) if is_row_violation(&err) => {
                    warn!(table = buffer.table(), row = row.index, error = %err, "批量导入行被拒绝");
                    on_error(BulkRowError {
                        row: row.index,
                        reason: err.to_string(),
                    });
                }
                Err(err) => return Err(err.into()),
            }
        }

        record_statement(&sql, started);
        Ok(loaded)
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        self.tx.rollback().await?;
        Ok(())
    }
}
