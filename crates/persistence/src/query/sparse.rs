//! 稀疏片段生成
//!
//! - 过滤：只为调用方"提供"了值的业务列生成谓词（文本按包含匹配，其余精确匹配）
//! - 更新：只为与快照不同的业务列生成赋值，再追加修改审计列
//!
//! 列清单、插入、更新和删除语句也集中在这里生成，仓储只负责组织流程。

use super::{Dialect, SqlBuilder, Statement};
use crate::entity::{
    AUDIT_COLUMNS, Audit, Column, ColumnKind, Entity, KEY_COLUMN, SelectColumn, Tracked,
};

/// 给列名加表别名
pub fn qualify(alias: Option<&str>, column: &str) -> String {
    match alias {
        Some(alias) => format!("{alias}.{column}"),
        None => column.to_string(),
    }
}

/// 实体的全部列：主键、业务列、审计列
pub fn all_columns<E: Entity>() -> impl Iterator<Item = Column> {
    std::iter::once(Column::int(KEY_COLUMN))
        .chain(E::COLUMNS.iter().copied())
        .chain(AUDIT_COLUMNS)
}

/// 生成选择列表与对应的解码列定义
///
/// 带别名时输出 `h.col AS h__col`，联表查询通过 `Record::scoped("h__")` 读取。
pub fn select_columns<E: Entity>(alias: Option<&str>) -> (String, Vec<SelectColumn>) {
    let mut sql = Vec::new();
    let mut columns = Vec::new();
    for column in all_columns::<E>() {
        match alias {
            Some(alias) => {
                let name = format!("{alias}__{}", column.name);
                sql.push(format!("{alias}.{} AS {name}", column.name));
                columns.push(SelectColumn::new(name, column.kind));
            }
            None => {
                sql.push(column.name.to_string());
                columns.push(SelectColumn::new(column.name, column.kind));
            }
        }
    }
    (sql.join(", "), columns)
}

/// 为过滤对象中已提供的业务列添加谓词，返回添加的谓词数
pub fn sparse_filter<E: Entity>(builder: &mut SqlBuilder, alias: Option<&str>, filter: &E) -> usize {
    let mut added = 0;
    for (column, value) in E::COLUMNS.iter().zip(filter.values()) {
        if !value.is_present() {
            continue;
        }
        let name = qualify(alias, column.name);
        match value.as_text().filter(|_| column.kind == ColumnKind::Text) {
            Some(text) => builder.where_contains(name, text),
            None => builder.where_eq(name, value.clone()),
        };
        added += 1;
    }
    added
}

/// 为与快照不同的业务列添加赋值，返回添加的赋值数
pub fn sparse_update<E: Entity>(builder: &mut SqlBuilder, tracked: &Tracked<E>) -> usize {
    let changes = tracked.changes();
    for change in &changes {
        builder.set(change.column, change.new.clone());
    }
    changes.len()
}

/// 插入语句（所有业务列和审计列），返回新主键
pub fn insert_statement<D: Dialect, E: Entity>(entity: &E) -> Statement {
    let columns = E::COLUMNS
        .iter()
        .chain(AUDIT_COLUMNS.iter())
        .map(|c| c.name)
        .collect::<Vec<_>>();
    let mut params = entity.values();
    params.extend(entity.audit().values());

    let placeholders = (1..=params.len())
        .map(D::placeholder)
        .collect::<Vec<_>>()
        .join(", ");
    let sql = format!(
        "INSERT INTO {} ({}) VALUES ({}) RETURNING {}",
        E::TABLE,
        columns.join(", "),
        placeholders,
        KEY_COLUMN
    );
    Statement::new(sql, params)
}

/// 稀疏更新语句
///
/// 只包含变更的业务列和 `modified_by`/`modified_date_time`；没有业务列变更时返回 `None`。
pub fn update_statement<D: Dialect, E: Entity>(
    tracked: &Tracked<E>,
    audit: &Audit,
) -> Option<Statement> {
    let mut builder = SqlBuilder::new();
    if sparse_update(&mut builder, tracked) == 0 {
        return None;
    }
    builder
        .set("modified_by", &audit.modified_by)
        .set("modified_date_time", audit.modified_date_time)
        .where_eq(KEY_COLUMN, tracked.id());
    Some(builder.render::<D>(&format!("UPDATE {} /**set**/ /**where**/", E::TABLE)))
}

/// 按主键删除
pub fn delete_statement<D: Dialect, E: Entity>(id: i64) -> Statement {
    let mut builder = SqlBuilder::new();
    builder.where_eq(KEY_COLUMN, id);
    builder.render::<D>(&format!("DELETE FROM {} /**where**/", E::TABLE))
}

/// 单表查询模板
pub fn select_template<E: Entity>(tail: &str) -> String {
    let (columns, _) = select_columns::<E>(None);
    format!("SELECT {columns} FROM {} /**where**/{tail}", E::TABLE)
}

/// 与 `select_template` 共用谓词的计数模板
pub fn count_template<E: Entity>() -> String {
    format!("SELECT COUNT(*) FROM {} /**where**/", E::TABLE)
}
