//! 变更追踪实体
//!
//! 每个聚合都是一个普通值类型 `E: Entity`，由 `Tracked<E>` 包装：
//!
//! - `Tracked` 持有存储分配的标识、当前值，以及最近一次 `accept_changes` 时的快照
//! - 是否变更通过逐列比较当前值与快照得出，而不是依赖一个粘滞标志
//! - 标识只能由仓储在插入后写入，实体自身没有公开的修改入口
//!
//! 新构造的实体以 `E::default()` 作为快照，即缺省的 0、空串与 `None`。

mod record;
mod value;

use std::ops::{Deref, DerefMut};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use record::{Record, RecordView, SelectColumn};
pub use value::{Column, ColumnKind, SqlValue, min_timestamp};

use crate::error::Result;

/// 主键列名
pub const KEY_COLUMN: &str = "id";

/// 审计列（所有实体共有，不属于业务列）
pub const AUDIT_COLUMNS: [Column; 4] = [
    Column::text("created_by"),
    Column::timestamp("created_date_time"),
    Column::text("modified_by"),
    Column::timestamp("modified_date_time"),
];

/// 审计字段
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Audit {
    pub created_by: String,
    pub created_date_time: Option<DateTime<Utc>>,
    pub modified_by: String,
    pub modified_date_time: Option<DateTime<Utc>>,
}

impl Audit {
    /// 按 `AUDIT_COLUMNS` 顺序输出列值
    pub fn values(&self) -> Vec<SqlValue> {
        vec![
            SqlValue::from(&self.created_by),
            SqlValue::from(self.created_date_time),
            SqlValue::from(&self.modified_by),
            SqlValue::from(self.modified_date_time),
        ]
    }

    pub fn from_record(row: &RecordView<'_>) -> Result<Self> {
        Ok(Self {
            created_by: row.text("created_by")?,
            created_date_time: row.timestamp("created_date_time")?,
            modified_by: row.text("modified_by")?,
            modified_date_time: row.timestamp("modified_date_time")?,
        })
    }
}

/// 可持久化实体
///
/// 业务列不包含主键和审计列；`values()` 必须与 `COLUMNS` 一一对应。
pub trait Entity: Clone + Default + PartialEq + Send + Sync + 'static {
    /// 表名
    const TABLE: &'static str;
    /// 实体名（用于错误信息和日志）
    const NAME: &'static str;
    /// 业务列定义
    const COLUMNS: &'static [Column];

    /// 按 `COLUMNS` 顺序输出业务列值
    fn values(&self) -> Vec<SqlValue>;

    /// 从结果行解码（含审计字段）
    fn from_record(row: &RecordView<'_>) -> Result<Self>;

    fn audit(&self) -> &Audit;

    fn audit_mut(&mut self) -> &mut Audit;

    /// 写入前的实体自检，失败原因会作为校验错误或批量导入的行错误返回
    fn validate(&self) -> std::result::Result<(), String> {
        Ok(())
    }
}

/// 单个字段的变更
#[derive(Debug, Clone, PartialEq)]
pub struct FieldChange {
    pub column: &'static str,
    pub old: SqlValue,
    pub new: SqlValue,
}

/// 带变更追踪的实体包装
#[derive(Debug, Clone, PartialEq)]
pub struct Tracked<E: Entity> {
    id: i64,
    current: E,
    original: E,
}

impl<E: Entity> Tracked<E> {
    /// 包装一个尚未持久化的实体
    pub fn new(value: E) -> Self {
        Self {
            id: 0,
            current: value,
            original: E::default(),
        }
    }

    /// 从存储读出的实体，快照即当前值
    pub(crate) fn loaded(id: i64, value: E) -> Self {
        Self {
            id,
            original: value.clone(),
            current: value,
        }
    }

    pub fn id(&self) -> i64 {
        self.id
    }

    pub fn is_new(&self) -> bool {
        self.id == 0
    }

    pub(crate) fn assign_id(&mut self, id: i64) {
        self.id = id;
    }

    /// 最近一次接受变更时的快照
    pub fn original(&self) -> &E {
        &self.original
    }

    pub fn is_changed(&self) -> bool {
        self.current != self.original
    }

    /// 业务列的变更集（旧值/新值）
    pub fn changes(&self) -> Vec<FieldChange> {
        E::COLUMNS
            .iter()
            .zip(self.original.values().into_iter().zip(self.current.values()))
            .filter(|(_, (old, new))| old != new)
            .map(|(column, (old, new))| FieldChange {
                column: column.name,
                old,
                new,
            })
            .collect()
    }

    /// 接受当前值作为新的快照；未变更时为空操作
    pub fn accept_changes(&mut self) {
        if !self.is_changed() {
            return;
        }
        self.original = self.current.clone();
    }

    /// 丢弃未接受的修改，恢复到快照；未变更时为空操作
    pub fn reject_changes(&mut self) {
        if !self.is_changed() {
            return;
        }
        self.current = self.original.clone();
    }

    /// 从 `source` 复制全部业务字段，保留标识与审计字段
    pub fn update_properties(&mut self, source: &E) {
        let audit = self.current.audit().clone();
        self.current = source.clone();
        *self.current.audit_mut() = audit;
    }

    pub fn into_inner(self) -> E {
        self.current
    }
}

impl<E: Entity> Deref for Tracked<E> {
    type Target = E;

    fn deref(&self) -> &Self::Target {
        &self.current
    }
}

impl<E: Entity> DerefMut for Tracked<E> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.current
    }
}

impl<E: Entity> From<E> for Tracked<E> {
    fn from(value: E) -> Self {
        Self::new(value)
    }
}
