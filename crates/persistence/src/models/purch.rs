//! 收货单（头/行）

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::PurchStatus;
use crate::entity::{Audit, Column, Entity, RecordView, SqlValue};
use crate::error::Result;

/// 收货单头
///
/// 以装箱单号 `packing_slip_id` 为业务唯一键，拥有若干 `PurchLine`。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PurchTable {
    pub packing_slip_id: String,
    pub purch_id: String,
    pub vendor_account: String,
    pub vendor_name: String,
    pub warehouse: String,
    pub purch_status: Option<PurchStatus>,
    pub delivery_date: Option<DateTime<Utc>>,
    pub is_posted: Option<bool>,
    #[serde(flatten)]
    pub audit: Audit,
}

impl Entity for PurchTable {
    const TABLE: &'static str = "purch_table";
    const NAME: &'static str = "PurchTable";
    const COLUMNS: &'static [Column] = &[
        Column::text("packing_slip_id"),
        Column::text("purch_id"),
        Column::text("vendor_account"),
        Column::text("vendor_name"),
        Column::text("warehouse"),
        Column::enumeration("purch_status"),
        Column::timestamp("delivery_date"),
        Column::bool("is_posted"),
    ];

    fn values(&self) -> Vec<SqlValue> {
        vec![
            SqlValue::from(&self.packing_slip_id),
            SqlValue::from(&self.purch_id),
            SqlValue::from(&self.vendor_account),
            SqlValue::from(&self.vendor_name),
            SqlValue::from(&self.warehouse),
            SqlValue::from(self.purch_status),
            SqlValue::from(self.delivery_date),
            SqlValue::from(self.is_posted),
        ]
    }

    fn from_record(row: &RecordView<'_>) -> Result<Self> {
        Ok(Self {
            packing_slip_id: row.text("packing_slip_id")?,
            purch_id: row.text("purch_id")?,
            vendor_account: row.text("vendor_account")?,
            vendor_name: row.text("vendor_name")?,
            warehouse: row.text("warehouse")?,
            purch_status: row.enumeration("purch_status")?,
            delivery_date: row.timestamp("delivery_date")?,
            is_posted: row.opt_bool("is_posted")?,
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
        if self.packing_slip_id.trim().is_empty() {
            return Err("packing_slip_id 不能为空".to_string());
        }
        Ok(())
    }
}

/// 收货单行
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PurchLine {
    pub purch_table_id: i64,
    pub line_num: i64,
    pub item_id: String,
    pub item_name: String,
    pub qty_ordered: f64,
    pub qty_received: f64,
    pub unit: String,
    pub batch_number: String,
    #[serde(flatten)]
    pub audit: Audit,
}

impl Entity for PurchLine {
    const TABLE: &'static str = "purch_line";
    const NAME: &'static str = "PurchLine";
    const COLUMNS: &'static [Column] = &[
        Column::int("purch_table_id"),
        Column::int("line_num"),
        Column::text("item_id"),
        Column::text("item_name"),
        Column::float("qty_ordered"),
        Column::float("qty_received"),
        Column::text("unit"),
        Column::text("batch_number"),
    ];

    fn values(&self) -> Vec<SqlValue> {
        vec![
            SqlValue::from(self.purch_table_id),
            SqlValue::from(self.line_num),
            SqlValue::from(&self.item_id),
            SqlValue::from(&self.item_name),
            SqlValue::from(self.qty_ordered),
            SqlValue::from(self.qty_received),
            SqlValue::from(&self.unit),
            SqlValue::from(&self.batch_number),
        ]
    }

    fn from_record(row: &RecordView<'_>) -> Result<Self> {
        Ok(Self {
            purch_table_id: row.int("purch_table_id")?,
            line_num: row.int("line_num")?,
            item_id: row.text("item_id")?,
            item_name: row.text("item_name")?,
            qty_ordered: row.float("qty_ordered")?,
            qty_received: row.float("qty_received")?,
            unit: row.text("unit")?,
            batch_number: row.text("batch_number")?,
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
        if self.purch_table_id == 0 {
            return Err("purch_table_id 未设置".to_string());
        }
        if self.item_id.trim().is_empty() {
            return Err("item_id 不能为空".to_string());
        }
        if self.qty_ordered < 0.0 || self.qty_received < 0.0 {
            return Err("数量不能为负".to_string());
        }
        Ok(())
    }
}
