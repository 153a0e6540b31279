//! SQL 方言
//!
//! 不同后端只在占位符、模糊匹配和行锁子句上有差异，其余 SQL 文本共用。

use erp_shared::Provider;

use super::ReadMode;

/// 后端 SQL 方言
pub trait Dialect: Send + Sync + 'static {
    /// 方言对应的存储提供方
    const PROVIDER: Provider;

    /// 第 `index` 个参数的占位符（从 1 开始）
    fn placeholder(index: usize) -> String;

    /// 包含匹配表达式，参数中的 `\`、`%`、`_` 已用反斜杠转义
    fn contains(column: &str, placeholder: &str) -> String;

    /// 读取模式对应的锁子句（带前导空格，无锁时为空串）
    fn lock_clause(mode: ReadMode) -> &'static str;
}

/// PostgreSQL 方言
#[derive(Debug, Clone, Copy, Default)]
pub struct PgDialect;

impl Dialect for PgDialect {
    const PROVIDER: Provider = Provider::Postgres;

    fn placeholder(index: usize) -> String {
        format!("${index}")
    }

    fn contains(column: &str, placeholder: &str) -> String {
        format!("{column} ILIKE {placeholder} ESCAPE '\\'")
    }

    fn lock_clause(mode: ReadMode) -> &'static str {
        match mode {
            ReadMode::Shared => "",
            ReadMode::ForUpdate => " FOR UPDATE",
        }
    }
}

/// SQLite 方言
///
/// SQLite 在库级别串行化写事务，不支持 `FOR UPDATE`，锁子句始终为空。
#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteDialect;

impl Dialect for SqliteDialect {
    const PROVIDER: Provider = Provider::Sqlite;

    fn placeholder(index: usize) -> String {
        format!("?{index}")
    }

    fn contains(column: &str, placeholder: &str) -> String {
        format!("{column} LIKE {placeholder} ESCAPE '\\'")
    }

    fn lock_clause(_mode: ReadMode) -> &'static str {
        ""
    }
}
