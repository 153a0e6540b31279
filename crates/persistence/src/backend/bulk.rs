//! 批量导入缓冲
//!
//! 行先暂存到 `BulkBuffer`：列数不符、类型不符或必填列为空的行在暂存阶段即被拒绝，
//! 只有通过校验的行才会交给后端的快速通道（Postgres 为 `COPY ... FROM STDIN`）。

use serde::Serialize;

use crate::entity::{AUDIT_COLUMNS, Column, ColumnKind, Entity, SqlValue};
use crate::error::PersistenceError;
use crate::query::Dialect;

/// 单行导入失败
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BulkRowError {
    /// 行在调用方输入中的下标（从 0 开始）
    pub row: usize,
    pub reason: String,
}

impl From<BulkRowError> for PersistenceError {
    fn from(err: BulkRowError) -> Self {
        PersistenceError::BulkLoad {
            row: err.row,
            reason: err.reason,
        }
    }
}

/// 批量导入结果
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkLoadSummary {
    /// 通过暂存校验的行数
    pub staged: usize,
    /// 实际写入的行数
    pub loaded: u64,
    /// 被拒绝的行数（暂存阶段与后端阶段合计）
    pub rejected: usize,
}

/// 暂存的一行
#[derive(Debug, Clone, PartialEq)]
pub struct StagedRow {
    pub index: usize,
    pub values: Vec<SqlValue>,
}

/// 批量导入缓冲
#[derive(Debug, Clone)]
pub struct BulkBuffer {
    table: &'static str,
    columns: Vec<Column>,
    rows: Vec<StagedRow>,
}

impl BulkBuffer {
    pub fn new(table: &'static str, columns: Vec<Column>) -> Self {
        Self {
            table,
            columns,
            rows: Vec::new(),
        }
    }

    /// 以实体的业务列加审计列建立缓冲
    pub fn for_entity<E: Entity>() -> Self {
        let columns = E::COLUMNS.iter().copied().chain(AUDIT_COLUMNS).collect();
        Self::new(E::TABLE, columns)
    }

    pub fn table(&self) -> &'static str {
        self.table
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn rows(&self) -> &[StagedRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// 校验并暂存一行
    pub fn stage(&mut self, index: usize, values: Vec<SqlValue>) -> Result<(), BulkRowError> {
        let reject = |reason: String| BulkRowError { row: index, reason };

        if values.len() != self.columns.len() {
            return Err(reject(format!(
                "列数不匹配: 期望 {}, 实际 {}",
                self.columns.len(),
                values.len()
            )));
        }
        for (column, value) in self.columns.iter().zip(&values) {
            if !value.fits(column.kind) {
                return Err(reject(format!("列 {} 类型不匹配", column.name)));
            }
            if value.is_null() && !column.nullable {
                return Err(reject(format!("列 {} 不能为空", column.name)));
            }
        }

        self.rows.push(StagedRow { index, values });
        Ok(())
    }

    /// 实体自检后暂存
    pub fn stage_entity<E: Entity>(&mut self, index: usize, entity: &E) -> Result<(), BulkRowError> {
        entity
            .validate()
            .map_err(|reason| BulkRowError { row: index, reason })?;
        let mut values = entity.values();
        values.extend(entity.audit().values());
        self.stage(index, values)
    }

    fn column_list(&self) -> String {
        self.columns
            .iter()
            .map(|c| c.name)
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// 逐行插入语句（不支持 COPY 的后端使用）
    pub fn insert_sql<D: Dialect>(&self) -> String {
        let placeholders = (1..=self.columns.len())
            .map(D::placeholder)
            .collect::<Vec<_>>()
            .join(", ");
        format!(
            "INSERT INTO {} ({}) VALUES ({})",
            self.table,
            self.column_list(),
            placeholders
        )
    }

    /// `COPY ... FROM STDIN` 语句，CSV 格式，`\N` 表示 NULL
    pub fn copy_sql(&self) -> String {
        format!(
            "COPY {} ({}) FROM STDIN WITH (FORMAT csv, NULL '\\N')",
            self.table,
            self.column_list()
        )
    }

    /// 按块编码为 CSV
    pub fn csv_chunks(&self, chunk_size: usize) -> Vec<String> {
        self.rows
            .chunks(chunk_size.max(1))
            .map(|chunk| {
                let mut out = String::new();
                for row in chunk {
                    let fields = row
                        .values
                        .iter()
                        .zip(&self.columns)
                        .map(|(value, column)| csv_field(value, column.kind))
                        .collect::<Vec<_>>();
                    out.push_str(&fields.join(","));
                    out.push('\n');
                }
                out
            })
            .collect()
    }
}

fn csv_field(value: &SqlValue, kind: ColumnKind) -> String {
    match value {
        SqlValue::Bool(Some(v)) => if *v { "t" } else { "f" }.to_string(),
        SqlValue::Int(Some(v)) if kind == ColumnKind::Float => format!("{}", *v as f64),
        SqlValue::Int(Some(v)) => v.to_string(),
        SqlValue::Float(Some(v)) => v.to_string(),
        SqlValue::Text(Some(v)) => {
            let mut out = String::with_capacity(v.len() + 2);
            out.push('"');
            for ch in v.chars() {
                if ch == '"' {
                    out.push('"');
                }
                out.push(ch);
            }
            out.push('"');
            out
        }
        SqlValue::Timestamp(Some(v)) => v.to_rfc3339(),
        _ => "\\N".to_string(),
    }
}
