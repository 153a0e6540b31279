//! 存储后端驱动
//!
//! `Session` 封装一个连接上的一个事务，仓储通过工作单元间接使用它。
//! 后端只负责绑定参数、按列类型解码以及批量导入的快速通道。

pub mod bulk;
pub mod postgres;
pub mod sqlite;

use std::time::Instant;

use async_trait::async_trait;
use erp_shared::Provider;

pub use bulk::{BulkBuffer, BulkLoadSummary, BulkRowError};

use crate::entity::{Record, SelectColumn};
use crate::error::Result;
use crate::query::Statement;

/// 事务会话
#[async_trait]
pub trait Session: Send {
    fn provider(&self) -> Provider;

    /// 执行语句，返回受影响行数
    async fn execute(&mut self, stmt: &Statement) -> Result<u64>;

    /// 查询并按列定义解码所有行
    async fn fetch_all(&mut self, stmt: &Statement, columns: &[SelectColumn])
    -> Result<Vec<Record>>;

    /// 读取首行首列的整数（计数、RETURNING id 等），无行时返回 None
    async fn fetch_scalar(&mut self, stmt: &Statement) -> Result<Option<i64>>;

    /// 批量导入已暂存的行
    ///
    /// 单行失败通过 `on_error` 报告且不中断批次（后端允许时），返回成功导入的行数。
    async fn bulk_load(
        &mut self,
        buffer: &BulkBuffer,
        chunk_size: usize,
        on_error: &mut (dyn FnMut(BulkRowError) + Send),
    ) -> Result<u64>;

    async fn commit(self: Box<Self>) -> Result<()>;

    async fn rollback(self: Box<Self>) -> Result<()>;
}

/// 语句类型标签（取 SQL 首个关键字）
pub(crate) fn statement_op(sql: &str) -> &'static str {
    let keyword = sql
        .split_whitespace()
        .next()
        .unwrap_or_default()
        .to_ascii_uppercase();
    match keyword.as_str() {
        "SELECT" | "WITH" => "select",
        "INSERT" => "insert",
        "UPDATE" => "update",
        "DELETE" => "delete",
        "COPY" => "copy",
        _ => "other",
    }
}

/// 记录语句执行指标
pub(crate) fn record_statement(sql: &str, started: Instant) {
    let op = statement_op(sql);
    metrics::counter!("persistence_statements_total", "op" => op).increment(1);
    metrics::histogram!("persistence_statement_duration_seconds", "op" => op)
        .record(started.elapsed().as_secs_f64());
}
