//! 头-行联表查询
//!
//! 一条 `LEFT JOIN` 语句取回单据头和它的行，再按头主键折叠成 `HeaderWithLines`。
//! 头的顺序与单表查询一致（主键倒序），行按行号排列。

use std::collections::HashMap;

use super::HeaderWithLines;
use super::sql::SqlRepository;
use crate::entity::{Entity, KEY_COLUMN, Record};
use crate::error::Result;
use crate::query::sparse::{qualify, select_columns};
use crate::query::{Dialect, Direction, SqlBuilder};
use crate::uow::UnitOfWork;

pub(crate) const HEADER_ALIAS: &str = "h";
pub(crate) const LINE_ALIAS: &str = "l";

/// 头-行关系描述
pub(crate) struct LineJoin {
    /// 行表中指向头主键的外键列
    pub foreign_key: &'static str,
    /// 行排序列
    pub line_order: &'static str,
}

impl LineJoin {
    fn template<H: Entity, L: Entity>(&self) -> (String, Vec<crate::entity::SelectColumn>) {
        let (header_sql, mut columns) = select_columns::<H>(Some(HEADER_ALIAS));
        let (line_sql, line_columns) = select_columns::<L>(Some(LINE_ALIAS));
        columns.extend(line_columns);
        let sql = format!(
            "SELECT {header_sql}, {line_sql} FROM {} {HEADER_ALIAS} \
             LEFT JOIN {} {LINE_ALIAS} ON {LINE_ALIAS}.{} = {HEADER_ALIAS}.{KEY_COLUMN} \
             /**where**/ /**orderby**/",
            H::TABLE,
            L::TABLE,
            self.foreign_key,
        );
        (sql, columns)
    }

    /// 按谓词取回头及其行
    ///
    /// `builder` 中的列应以 `h.` 限定。
    pub(crate) async fn fetch<H: Entity, L: Entity, D: Dialect>(
        &self,
        uow: &mut UnitOfWork,
        mut builder: SqlBuilder,
    ) -> Result<Vec<HeaderWithLines<H, L>>> {
        let (template, columns) = self.template::<H, L>();
        builder
            .order_by(qualify(Some(HEADER_ALIAS), KEY_COLUMN), Direction::Desc)
            .order_by(qualify(Some(LINE_ALIAS), self.line_order), Direction::Asc)
            .order_by(qualify(Some(LINE_ALIAS), KEY_COLUMN), Direction::Asc);
        let stmt = builder.render::<D>(&template);

        let records = SqlRepository::<H, D>::session(uow)?
            .fetch_all(&stmt, &columns)
            .await?;
        fold::<H, L, D>(&records)
    }
}

fn fold<H: Entity, L: Entity, D: Dialect>(records: &[Record]) -> Result<Vec<HeaderWithLines<H, L>>> {
    let header_prefix = format!("{HEADER_ALIAS}__");
    let line_prefix = format!("{LINE_ALIAS}__");

    let mut orders: Vec<HeaderWithLines<H, L>> = Vec::new();
    let mut positions: HashMap<i64, usize> = HashMap::new();
    for record in records {
        let header_id = record.scoped(&header_prefix).int(KEY_COLUMN)?;
        let position = match positions.get(&header_id) {
            Some(&position) => position,
            None => {
                let header = SqlRepository::<H, D>::decode(record, &header_prefix)?;
                orders.push(HeaderWithLines::new(header));
                positions.insert(header_id, orders.len() - 1);
                orders.len() - 1
            }
        };

        // 没有行的头在 LEFT JOIN 下行列全为 NULL
        if record.scoped(&line_prefix).is_null(KEY_COLUMN) {
            continue;
        }
        let line = SqlRepository::<L, D>::decode(record, &line_prefix)?;
        orders[position].lines.push(line);
    }
    Ok(orders)
}
