//! PostgreSQL 会话
//!
//! 批量导入优先走 `COPY ... FROM STDIN`。COPY 在保存点内执行，遇到行级约束冲突时
//! 回滚到保存点，再逐行插入（每行一个保存点），把失败的行报告给调用方。

use std::time::Instant;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use erp_shared::Provider;
use sqlx::postgres::{PgArguments, PgRow};
use sqlx::query::Query;
use sqlx::{Executor, Postgres, Row, Transaction};
use tracing::{debug, warn};

use super::{BulkBuffer, BulkRowError, Session, record_statement};
use crate::entity::{ColumnKind, Record, SelectColumn, SqlValue};
use crate::error::Result;
use crate::query::{PgDialect, Statement};

const COPY_SAVEPOINT: &str = "bulk_copy";
const ROW_SAVEPOINT: &str = "bulk_row";

/// 基于 sqlx 事务的 Postgres 会话
pub struct PgSession {
    tx: Transaction<'static, Postgres>,
}

impl PgSession {
    pub fn new(tx: Transaction<'static, Postgres>) -> Self {
        Self { tx }
    }

    async fn savepoint(&mut self, command: &str, name: &str) -> sqlx::Result<()> {
        (&mut *self.tx)
            .execute(sqlx::raw_sql(&format!("{command} {name}")))
            .await?;
        Ok(())
    }

    async fn copy_in(&mut self, buffer: &BulkBuffer, chunk_size: usize) -> sqlx::Result<u64> {
        let mut copy = self.tx.copy_in_raw(&buffer.copy_sql()).await?;
        for chunk in buffer.csv_chunks(chunk_size) {
            if let Err(err) = copy.send(chunk.into_bytes()).await {
                copy.abort(err.to_string()).await?;
                return Err(err);
            }
        }
        copy.finish().await
    }

    /// 逐行插入，单行冲突回滚到该行的保存点并报告
    async fn insert_rows(
        &mut self,
        buffer: &BulkBuffer,
        on_error: &mut (dyn FnMut(BulkRowError) + Send),
    ) -> Result<u64> {
        let sql = buffer.insert_sql::<PgDialect>();
        let mut loaded = 0;
        for row in buffer.rows() {
            self.savepoint("SAVEPOINT", ROW_SAVEPOINT).await?;
            match bind_values(&sql, &row.values).execute(&mut *self.tx).await {
                Ok(result) => {
                    loaded += result.rows_affected();
                    self.savepoint("RELEASE SAVEPOINT", ROW_SAVEPOINT).await?;
                }
                Err(err) if is_row_violation(&err) => {
                    warn!(table = buffer.table(), row = row.index, error = %err, "批量导入行被拒绝");
                    self.savepoint("ROLLBACK TO SAVEPOINT", ROW_SAVEPOINT).await?;
                    self.savepoint("RELEASE SAVEPOINT", ROW_SAVEPOINT).await?;
                    on_error(BulkRowError {
                        row: row.index,
                        reason: err.to_string(),
                    });
                }
                Err(err) => return Err(err.into()),
            }
        }
        Ok(loaded)
    }
}

/// 是否为行级错误（SQLSTATE 22 数据异常、23 完整性约束冲突）
fn is_row_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .and_then(|db| db.code())
        .is_some_and(|code| code.starts_with("22") || code.starts_with("23"))
}

fn bind_all(stmt: &Statement) -> Query<'_, Postgres, PgArguments> {
    bind_values(&stmt.sql, &stmt.params)
}

fn bind_values<'q>(sql: &'q str, params: &'q [SqlValue]) -> Query<'q, Postgres, PgArguments> {
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

fn decode_row(row: &PgRow, columns: &[SelectColumn]) -> Result<Record> {
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

#[async_trait]
impl Session for PgSession {
    fn provider(&self) -> Provider {
        Provider::Postgres
    }

    async fn execute(&mut self, stmt: &Statement) -> Result<u64> {
        debug!(sql = %stmt.sql, params = stmt.params.len(), "execute");
        let started = Instant::now();
        let result = bind_all(stmt).execute(&mut *self.tx).await?;
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
        let rows = bind_all(stmt).fetch_all(&mut *self.tx).await?;
        record_statement(&stmt.sql, started);
        rows.iter().map(|row| decode_row(row, columns)).collect()
    }

    async fn fetch_scalar(&mut self, stmt: &Statement) -> Result<Option<i64>> {
        debug!(sql = %stmt.sql, params = stmt.params.len(), "fetch_scalar");
        let started = Instant::now();
        let row = bind_all(stmt).fetch_optional(&mut *self.tx).await?;
        record_statement(&stmt.sql, started);
        match row {
            Some(row) => Ok(row.try_get::<Option<i64>, _>(0)?),
            None => Ok(None),
        }
    }

    /// 通过 `COPY ... FROM STDIN` 导入，行级冲突时退回逐行插入
    async fn bulk_load(
        &mut self,
        buffer: &BulkBuffer,
        chunk_size: usize,
        on_error: &mut (dyn FnMut(BulkRowError) + Send),
    ) -> Result<u64> {
        if buffer.is_empty() {
            return Ok(0);
        }
        let sql = buffer.copy_sql();
        debug!(sql = %sql, rows = buffer.len(), "copy in");
        let started = Instant::now();

        self.savepoint("SAVEPOINT", COPY_SAVEPOINT).await?;
        let loaded = match self.copy_in(buffer, chunk_size).await {
            Ok(loaded) => {
                self.savepoint("RELEASE SAVEPOINT", COPY_SAVEPOINT).await?;
                loaded
            }
            Err(err) if is_row_violation(&err) => {
                warn!(table = buffer.table(), error = %err, "COPY 遇到行级冲突，改为逐行插入");
                self.savepoint("ROLLBACK TO SAVEPOINT", COPY_SAVEPOINT).await?;
                self.savepoint("RELEASE SAVEPOINT", COPY_SAVEPOINT).await?;
                self.insert_rows(buffer, on_error).await?
            }
            Err(err) => return Err(err.into()),
        };
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
