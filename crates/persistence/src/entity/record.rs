//! 结果行
//!
//! 后端驱动按列定义把数据库行解码为 `Record`，实体再从 `RecordView` 读取字段。
//! 联表查询时列名带有前缀（如 `h__id`、`l__id`），通过 `scoped` 取对应视图。

use std::str::FromStr;

use chrono::{DateTime, Utc};

use super::value::{ColumnKind, SqlValue};
use crate::error::{PersistenceError, Result};

/// 查询结果中一列的别名和类型
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectColumn {
    pub alias: String,
    pub kind: ColumnKind,
}

impl SelectColumn {
    pub fn new(alias: impl Into<String>, kind: ColumnKind) -> Self {
        Self {
            alias: alias.into(),
            kind,
        }
    }
}

/// 一行查询结果（列别名 -> 值）
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    fields: Vec<(String, SqlValue)>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            fields: Vec::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, alias: impl Into<String>, value: SqlValue) {
        self.fields.push((alias.into(), value));
    }

    pub fn get(&self, alias: &str) -> Option<&SqlValue> {
        self.fields
            .iter()
            .find(|(name, _)| name == alias)
            .map(|(_, value)| value)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// 不带前缀的视图
    pub fn view(&self) -> RecordView<'_> {
        RecordView {
            record: self,
            prefix: "",
        }
    }

    /// 带列前缀的视图
    pub fn scoped<'a>(&'a self, prefix: &'a str) -> RecordView<'a> {
        RecordView {
            record: self,
            prefix,
        }
    }
}

/// 按前缀读取字段的只读视图
///
/// NULL 按缺省值解码：文本为空串，数值为 0。
#[derive(Debug, Clone, Copy)]
pub struct RecordView<'a> {
    record: &'a Record,
    prefix: &'a str,
}

impl<'a> RecordView<'a> {
    fn lookup(&self, column: &str) -> Result<&'a SqlValue> {
        self.record
            .fields
            .iter()
            .find(|(name, _)| {
                name.len() == self.prefix.len() + column.len()
                    && name.starts_with(self.prefix)
                    && name.ends_with(column)
            })
            .map(|(_, value)| value)
            .ok_or_else(|| {
                PersistenceError::decode(format!("{}{}", self.prefix, column), "列不存在")
            })
    }

    fn mismatch(&self, column: &str, expected: &str) -> PersistenceError {
        PersistenceError::decode(
            format!("{}{}", self.prefix, column),
            format!("类型不匹配，期望 {expected}"),
        )
    }

    pub fn is_null(&self, column: &str) -> bool {
        self.lookup(column).map(SqlValue::is_null).unwrap_or(true)
    }

    pub fn opt_text(&self, column: &str) -> Result<Option<String>> {
        match self.lookup(column)? {
            SqlValue::Text(v) => Ok(v.clone()),
            _ => Err(self.mismatch(column, "text")),
        }
    }

    pub fn text(&self, column: &str) -> Result<String> {
        Ok(self.opt_text(column)?.unwrap_or_default())
    }

    pub fn opt_int(&self, column: &str) -> Result<Option<i64>> {
        match self.lookup(column)? {
            SqlValue::Int(v) => Ok(*v),
            _ => Err(self.mismatch(column, "int")),
        }
    }

    pub fn int(&self, column: &str) -> Result<i64> {
        Ok(self.opt_int(column)?.unwrap_or_default())
    }

    pub fn float(&self, column: &str) -> Result<f64> {
        match self.lookup(column)? {
            SqlValue::Float(v) => Ok(v.unwrap_or_default()),
            SqlValue::Int(v) => Ok(v.unwrap_or_default() as f64),
            _ => Err(self.mismatch(column, "float")),
        }
    }

    pub fn opt_bool(&self, column: &str) -> Result<Option<bool>> {
        match self.lookup(column)? {
            SqlValue::Bool(v) => Ok(*v),
            SqlValue::Int(v) => Ok(v.map(|n| n != 0)),
            _ => Err(self.mismatch(column, "bool")),
        }
    }

    pub fn timestamp(&self, column: &str) -> Result<Option<DateTime<Utc>>> {
        match self.lookup(column)? {
            SqlValue::Timestamp(v) => Ok(*v),
            _ => Err(self.mismatch(column, "timestamp")),
        }
    }

    /// 解析以文本存储的枚举
    pub fn enumeration<T>(&self, column: &str) -> Result<Option<T>>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        self.opt_text(column)?
            .filter(|s| !s.is_empty())
            .map(|s| {
                s.parse::<T>().map_err(|e| {
                    PersistenceError::decode(format!("{}{}", self.prefix, column), e.to_string())
                })
            })
            .transpose()
    }
}
