//! 条件 SQL 片段构建器
//!
//! `SqlBuilder` 先累积中间表示（谓词、赋值、排序、分页），再按方言渲染到模板：
//!
//! | 标记 | 渲染结果 |
//! |------|----------|
//! | `/**where**/` | `WHERE a AND b`，无谓词时为空 |
//! | `/**set**/` | `SET a = $1, b = $2`，无赋值时为空 |
//! | `/**orderby**/` | `ORDER BY col DESC` |
//! | `/**paging**/` | `LIMIT $n OFFSET $m` |
//!
//! 参数按标记在模板中出现的顺序编号，因此同一个构建器渲染到取数模板和计数模板时，
//! 谓词与谓词参数完全一致。

pub mod dialect;
pub mod sparse;

use std::fmt::Write as _;

pub use dialect::{Dialect, PgDialect, SqliteDialect};

use crate::entity::SqlValue;

const WHERE_MARKER: &str = "/**where**/";
const SET_MARKER: &str = "/**set**/";
const ORDER_MARKER: &str = "/**orderby**/";
const PAGING_MARKER: &str = "/**paging**/";

/// 排序方向
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Asc,
    Desc,
}

impl Direction {
    fn as_sql(self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

/// 按主键读取时的加锁模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReadMode {
    #[default]
    Shared,
    /// 读取并锁定该行直到事务结束
    ForUpdate,
}

/// 渲染完成的语句
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<SqlValue>,
}

impl Statement {
    pub fn new(sql: impl Into<String>, params: Vec<SqlValue>) -> Self {
        Self {
            sql: sql.into(),
            params,
        }
    }
}

/// 谓词
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// 精确匹配，值为 NULL 时渲染为 `IS NULL`
    Eq { column: String, value: SqlValue },
    /// 包含匹配（`%value%`）
    Contains { column: String, value: String },
    /// 集合匹配，空集合恒为假
    In {
        column: String,
        values: Vec<SqlValue>,
    },
    /// 原始片段，`{}` 依次替换为参数占位符
    Raw { sql: String, params: Vec<SqlValue> },
}

#[derive(Debug, Clone, PartialEq)]
enum Assignment {
    Value { column: String, value: SqlValue },
    /// 基于列自身的表达式（如 `current_value + increment_by`），不带参数
    Expr { column: String, sql: String },
}

impl Assignment {
    fn column(&self) -> &str {
        match self {
            Self::Value { column, .. } | Self::Expr { column, .. } => column,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Page {
    limit: i64,
    offset: i64,
}

/// 条件 SQL 片段构建器
#[derive(Debug, Clone, Default)]
pub struct SqlBuilder {
    predicates: Vec<Predicate>,
    assignments: Vec<Assignment>,
    order: Vec<(String, Direction)>,
    page: Option<Page>,
}

impl SqlBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn where_eq(&mut self, column: impl Into<String>, value: impl Into<SqlValue>) -> &mut Self {
        self.predicates.push(Predicate::Eq {
            column: column.into(),
            value: value.into(),
        });
        self
    }

    pub fn where_contains(
        &mut self,
        column: impl Into<String>,
        value: impl Into<String>,
    ) -> &mut Self {
        self.predicates.push(Predicate::Contains {
            column: column.into(),
            value: value.into(),
        });
        self
    }

    pub fn where_in<V>(&mut self, column: impl Into<String>, values: V) -> &mut Self
    where
        V: IntoIterator,
        V::Item: Into<SqlValue>,
    {
        self.predicates.push(Predicate::In {
            column: column.into(),
            values: values.into_iter().map(Into::into).collect(),
        });
        self
    }

    pub fn where_raw(&mut self, sql: impl Into<String>, params: Vec<SqlValue>) -> &mut Self {
        self.predicates.push(Predicate::Raw {
            sql: sql.into(),
            params,
        });
        self
    }

    pub fn set(&mut self, column: impl Into<String>, value: impl Into<SqlValue>) -> &mut Self {
        self.assignments.push(Assignment::Value {
            column: column.into(),
            value: value.into(),
        });
        self
    }

    pub fn set_expr(&mut self, column: impl Into<String>, sql: impl Into<String>) -> &mut Self {
        self.assignments.push(Assignment::Expr {
            column: column.into(),
            sql: sql.into(),
        });
        self
    }

    /// 追加排序列，多次调用按调用顺序组合
    pub fn order_by(&mut self, column: impl Into<String>, direction: Direction) -> &mut Self {
        self.order.push((column.into(), direction));
        self
    }

    pub fn paginate(&mut self, limit: i64, offset: i64) -> &mut Self {
        self.page = Some(Page { limit, offset });
        self
    }

    pub fn has_set(&self) -> bool {
        !self.assignments.is_empty()
    }

    pub fn has_where(&self) -> bool {
        !self.predicates.is_empty()
    }

    pub fn predicates(&self) -> &[Predicate] {
        &self.predicates
    }

    /// 已累积赋值的列名（按添加顺序）
    pub fn set_columns(&self) -> Vec<&str> {
        self.assignments.iter().map(Assignment::column).collect()
    }

    /// 将累积的片段渲染到模板
    pub fn render<D: Dialect>(&self, template: &str) -> Statement {
        let mut renderer = Renderer::<D>::new();
        let mut rest = template;

        while let Some((at, marker)) = next_marker(rest) {
            renderer.sql.push_str(&rest[..at]);
            match marker {
                WHERE_MARKER => renderer.where_clause(&self.predicates),
                SET_MARKER => renderer.set_clause(&self.assignments),
                ORDER_MARKER => renderer.order_clause(&self.order),
                _ => renderer.paging_clause(self.page),
            }
            rest = &rest[at + marker.len()..];
        }
        renderer.sql.push_str(rest);

        Statement {
            sql: renderer.sql,
            params: renderer.params,
        }
    }
}

/// 转义 LIKE 通配符，配合方言输出的 `ESCAPE '\\'` 使用
fn escape_like(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        if matches!(ch, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

fn next_marker(text: &str) -> Option<(usize, &'static str)> {
    [WHERE_MARKER, SET_MARKER, ORDER_MARKER, PAGING_MARKER]
        .into_iter()
        .filter_map(|marker| text.find(marker).map(|at| (at, marker)))
        .min_by_key(|(at, _)| *at)
}

struct Renderer<D: Dialect> {
    sql: String,
    params: Vec<SqlValue>,
    _dialect: std::marker::PhantomData<D>,
}

impl<D: Dialect> Renderer<D> {
    fn new() -> Self {
        Self {
            sql: String::new(),
            params: Vec::new(),
            _dialect: std::marker::PhantomData,
        }
    }

    fn bind(&mut self, value: SqlValue) -> String {
        self.params.push(value);
        D::placeholder(self.params.len())
    }

    fn predicate(&mut self, predicate: &Predicate) -> String {
        match predicate {
            Predicate::Eq { column, value } if value.is_null() => format!("{column} IS NULL"),
            Predicate::Eq { column, value } => {
                let ph = self.bind(value.clone());
                format!("{column} = {ph}")
            }
            Predicate::Contains { column, value } => {
                let ph = self.bind(SqlValue::from(format!("%{}%", escape_like(value))));
                D::contains(column, &ph)
            }
            Predicate::In { values, .. } if values.is_empty() => "1 = 0".to_string(),
            Predicate::In { column, values } => {
                let list = values
                    .iter()
                    .map(|v| self.bind(v.clone()))
                    .collect::<Vec<_>>()
                    .join(", ");
                format!("{column} IN ({list})")
            }
            Predicate::Raw { sql, params } => {
                let mut out = String::with_capacity(sql.len());
                let mut parts = sql.split("{}");
                if let Some(first) = parts.next() {
                    out.push_str(first);
                }
                let mut values = params.iter();
                for part in parts {
                    let value = values.next().cloned().unwrap_or(SqlValue::Text(None));
                    let ph = self.bind(value);
                    out.push_str(&ph);
                    out.push_str(part);
                }
                format!("({out})")
            }
        }
    }

    fn where_clause(&mut self, predicates: &[Predicate]) {
        if predicates.is_empty() {
            return;
        }
        let parts = predicates
            .iter()
            .map(|p| self.predicate(p))
            .collect::<Vec<_>>();
        let _ = write!(self.sql, "WHERE {}", parts.join(" AND "));
    }

    fn set_clause(&mut self, assignments: &[Assignment]) {
        if assignments.is_empty() {
            return;
        }
        let parts = assignments
            .iter()
            .map(|a| match a {
                Assignment::Value { column, value } => {
                    let ph = self.bind(value.clone());
                    format!("{column} = {ph}")
                }
                Assignment::Expr { column, sql } => format!("{column} = {sql}"),
            })
            .collect::<Vec<_>>();
        let _ = write!(self.sql, "SET {}", parts.join(", "));
    }

    fn order_clause(&mut self, order: &[(String, Direction)]) {
        if order.is_empty() {
            return;
        }
        let parts = order
            .iter()
            .map(|(column, direction)| format!("{column} {}", direction.as_sql()))
            .collect::<Vec<_>>();
        let _ = write!(self.sql, "ORDER BY {}", parts.join(", "));
    }

    fn paging_clause(&mut self, page: Option<Page>) {
        if let Some(page) = page {
            let limit = self.bind(SqlValue::from(page.limit));
            let offset = self.bind(SqlValue::from(page.offset));
            let _ = write!(self.sql, "LIMIT {limit} OFFSET {offset}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SELECT: &str = "SELECT * FROM purch_table /**where**/ /**orderby**/ /**paging**/";
    const COUNT: &str = "SELECT COUNT(*) FROM purch_table /**where**/";

    #[test]
    fn test_empty_builder_renders_absent_clauses() {
        let stmt = SqlBuilder::new().render::<PgDialect>(COUNT);
        assert_eq!(stmt.sql.trim_end(), "SELECT COUNT(*) FROM purch_table");
        assert!(stmt.params.is_empty());
    }

    #[test]
    fn test_where_and_paging_numbering() {
        let mut builder = SqlBuilder::new();
        builder
            .where_eq("purch_status", "Open")
            .where_contains("packing_slip_id", "PS")
            .order_by("id", Direction::Desc)
            .paginate(10, 20);

        let stmt = builder.render::<PgDialect>(SELECT);
        assert_eq!(
            stmt.sql,
            "SELECT * FROM purch_table WHERE purch_status = $1 AND packing_slip_id ILIKE $2 ESCAPE '\\' \
             ORDER BY id DESC LIMIT $3 OFFSET $4"
        );
        assert_eq!(stmt.params[1], SqlValue::from("%PS%"));
        assert_eq!(stmt.params[2], SqlValue::from(10i64));
    }

    #[test]
    fn test_contains_escapes_wildcards() {
        assert_eq!(escape_like("S_1"), r"S\_1");
        assert_eq!(escape_like(r"50%\off"), r"50\%\\off");

        let mut builder = SqlBuilder::new();
        builder.where_contains("packing_slip_id", "S_1");
        let stmt = builder.render::<SqliteDialect>(COUNT);
        assert_eq!(
            stmt.sql,
            r"SELECT COUNT(*) FROM purch_table WHERE packing_slip_id LIKE ?1 ESCAPE '\'"
        );
        assert_eq!(stmt.params[0], SqlValue::from(r"%S\_1%"));
    }

    #[test]
    fn test_count_shares_predicates() {
        let mut builder = SqlBuilder::new();
        builder.where_eq("vendor_account", "V1").order_by("id", Direction::Desc);
        let count = builder.render::<SqliteDialect>(COUNT);
        builder.paginate(5, 0);
        let select = builder.render::<SqliteDialect>(SELECT);

        assert_eq!(count.sql, "SELECT COUNT(*) FROM purch_table WHERE vendor_account = ?1");
        assert_eq!(count.params[..], select.params[..1]);
    }

    #[test]
    fn test_multiple_order_columns() {
        let mut builder = SqlBuilder::new();
        builder
            .order_by("h.id", Direction::Desc)
            .order_by("l.line_num", Direction::Asc);
        let stmt = builder.render::<PgDialect>("SELECT 1 /**orderby**/");
        assert_eq!(stmt.sql, "SELECT 1 ORDER BY h.id DESC, l.line_num ASC");
    }

    #[test]
    fn test_set_then_where_numbering() {
        let mut builder = SqlBuilder::new();
        builder.set("purch_status", "Closed").where_eq("id", 7i64);
        assert!(builder.has_set());

        let stmt = builder.render::<PgDialect>("UPDATE purch_table /**set**/ /**where**/");
        assert_eq!(
            stmt.sql,
            "UPDATE purch_table SET purch_status = $1 WHERE id = $2"
        );
    }

    #[test]
    fn test_expression_assignment() {
        let mut builder = SqlBuilder::new();
        builder
            .set_expr("current_value", "current_value + increment_by")
            .set("modified_by", "alice")
            .where_eq("code", "PO");
        assert_eq!(builder.set_columns(), vec!["current_value", "modified_by"]);

        let stmt = builder.render::<SqliteDialect>("UPDATE number_sequence /**set**/ /**where**/");
        assert_eq!(
            stmt.sql,
            "UPDATE number_sequence SET current_value = current_value + increment_by, \
             modified_by = ?1 WHERE code = ?2"
        );
    }

    #[test]
    fn test_null_eq_and_empty_in() {
        let mut builder = SqlBuilder::new();
        builder
            .where_eq("revoked_at", SqlValue::Timestamp(None))
            .where_in("id", Vec::<i64>::new());
        let stmt = builder.render::<PgDialect>(COUNT);
        assert!(stmt.sql.ends_with("WHERE revoked_at IS NULL AND 1 = 0"));
        assert!(stmt.params.is_empty());
    }

    #[test]
    fn test_raw_predicate_binds_in_order() {
        let mut builder = SqlBuilder::new();
        builder
            .where_eq("a", 1i64)
            .where_raw("b > {} OR c < {}", vec![SqlValue::from(2i64), SqlValue::from(3i64)])
            .where_in("d", [4i64, 5]);
        let stmt = builder.render::<SqliteDialect>(COUNT);
        assert!(stmt.sql.ends_with("WHERE a = ?1 AND (b > ?2 OR c < ?3) AND d IN (?4, ?5)"));
        assert_eq!(stmt.params.len(), 5);
    }
}
