//! 工单（头/行）

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::WorkOrderStatus;
use crate::entity::{Audit, Column, Entity, RecordView, SqlValue};
use crate::error::Result;

/// 工单头，外部系统工单号 `external_work_order_id` 唯一
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkOrder {
    pub external_work_order_id: String,
    pub title: String,
    pub warehouse: String,
    pub assigned_to: String,
    pub status: Option<WorkOrderStatus>,
    pub scheduled_date: Option<DateTime<Utc>>,
    pub completed_date: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub audit: Audit,
}

impl Entity for WorkOrder {
    const TABLE: &'static str = "work_order";
    const NAME: &'static str = "WorkOrder";
    const COLUMNS: &'static [Column] = &[
        Column::text("external_work_order_id"),
        Column::text("title"),
        Column::text("warehouse"),
        Column::text("assigned_to"),
        Column::enumeration("status"),
        Column::timestamp("scheduled_date"),
        Column::timestamp("completed_date"),
    ];

    fn values(&self) -> Vec<SqlValue> {
        vec![
            SqlValue::from(&self.external_work_order_id),
            SqlValue::from(&self.title),
            SqlValue::from(&self.warehouse),
            SqlValue::from(&self.assigned_to),
            SqlValue::from(self.status),
            SqlValue::from(self.scheduled_date),
            SqlValue::from(self.completed_date),
        ]
    }

    fn from_record(row: &RecordView<'_>) -> Result<Self> {
        Ok(Self {
            external_work_order_id: row.text("external_work_order_id")?,
            title: row.text("title")?,
            warehouse: row.text("warehouse")?,
            assigned_to: row.text("assigned_to")?,
            status: row.enumeration("status")?,
            scheduled_date: row.timestamp("scheduled_date")?,
            completed_date: row.timestamp("completed_date")?,
            audit: Audit::from_record(row)?,
        })
    }

    fn audit(&self) -> &Audit {
        &self.audit
    }

    fn audit_mut(&mut self) -> &mut Audit {
        &mut self.audit
    }

    fn validate(&self) -> std::result::Result<(), String> {
        if self.external_work_order_id.trim().is_empty() {
            return Err("external_work_order_id 不能为空".to_string());
        }
        Ok(())
    }
}

/// 工单行
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkOrderLine {
    pub work_order_id: i64,
    pub line_num: i64,
    pub item_id: String,
    pub description: String,
    pub quantity: f64,
    pub completed: Option<bool>,
    #[serde(flatten)]
    pub audit: Audit,
}

impl Entity for WorkOrderLine {
    const TABLE: &'static str = "work_order_line";
    const NAME: &'static str = "WorkOrderLine";
    const COLUMNS: &'static [Column] = &[
        Column::int("work_order_id"),
        Column::int("line_num"),
        Column::text("item_id"),
        Column::text("description"),
        Column::float("quantity"),
        Column::bool("completed"),
    ];

    fn values(&self) -> Vec<SqlValue> {
        vec![
            SqlValue::from(self.work_order_id),
            SqlValue::from(self.line_num),
            SqlValue::from(&self.item_id),
            SqlValue::from(&self.description),
            SqlValue::from(self.quantity),
            SqlValue::from(self.completed),
        ]
    }

    fn from_record(row: &RecordView<'_>) -> Result<Self> {
        Ok(Self {
            work_order_id: row.int("work_order_id")?,
            line_num: row.int("line_num")?,
            item_id: row.text("item_id")?,
            description: row.text("description")?,
            quantity: row.float("quantity")?,
            completed: row.opt_bool("completed")?,
            audit: Audit::from_record(row)?,
        })
    }

    fn audit(&self) -> &Audit {
        &self.audit
    }

    fn audit_mut(&mut self) -> &mut Audit {
        &mut self.audit
    }

    fn validate(&self) -> std::result::Result<(), String> {
        if self.work_order_id == 0 {
            return Err("work_order_id 未设置".to_string());
        }
        if self.item_id.trim().is_empty() {
            return Err("item_id 不能为空".to_string());
        }
        if self.quantity < 0.0 {
            return Err(format!("quantity 不能为负数: {}", self.quantity));
        }
        Ok(())
    }
}
