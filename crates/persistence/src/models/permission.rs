//! 权限与访问规则

use serde::{Deserialize, Serialize};

use crate::entity::{Audit, Column, Entity, RecordView, SqlValue};
use crate::error::Result;

/// 权限点，`code` 唯一（如 `purch.receive`）
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Permission {
    pub code: String,
    pub name: String,
    pub module: String,
    pub description: String,
    #[serde(flatten)]
    pub audit: Audit,
}

impl Entity for Permission {
    const TABLE: &'static str = "permission";
    const NAME: &'static str = "Permission";
    const COLUMNS: &'static [Column] = &[
        Column::text("code"),
        Column::text("name"),
        Column::text("module"),
        Column::text("description"),
    ];

    fn values(&self) -> Vec<SqlValue> {
        vec![
            SqlValue::from(&self.code),
            SqlValue::from(&self.name),
            SqlValue::from(&self.module),
            SqlValue::from(&self.description),
        ]
    }

    fn from_record(row: &RecordView<'_>) -> Result<Self> {
        Ok(Self {
            code: row.text("code")?,
            name: row.text("name")?,
            module: row.text("module")?,
            description: row.text("description")?,
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
        if self.code.trim().is_empty() {
            return Err("权限编码不能为空".to_string());
        }
        Ok(())
    }
}

/// 访问规则：角色对权限点的读写授权
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessRule {
    pub role_id: i64,
    pub permission_id: i64,
    pub can_read: Option<bool>,
    pub can_write: Option<bool>,
    #[serde(flatten)]
    pub audit: Audit,
}

impl AccessRule {
    pub fn allows_read(&self) -> bool {
        self.can_read.unwrap_or(false)
    }

    pub fn allows_write(&self) -> bool {
        self.can_write.unwrap_or(false)
    }
}

impl Entity for AccessRule {
    const TABLE: &'static str = "access_rule";
    const NAME: &'static str = "AccessRule";
    const COLUMNS: &'static [Column] = &[
        Column::int("role_id"),
        Column::int("permission_id"),
        Column::bool("can_read"),
        Column::bool("can_write"),
    ];

    fn values(&self) -> Vec<SqlValue> {
        vec![
            SqlValue::from(self.role_id),
            SqlValue::from(self.permission_id),
            SqlValue::from(self.can_read),
            SqlValue::from(self.can_write),
        ]
    }

    fn from_record(row: &RecordView<'_>) -> Result<Self> {
        Ok(Self {
            role_id: row.int("role_id")?,
            permission_id: row.int("permission_id")?,
            can_read: row.opt_bool("can_read")?,
            can_write: row.opt_bool("can_write")?,
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
        if self.role_id == 0 || self.permission_id == 0 {
            return Err("role_id 与 permission_id 均不能为 0".to_string());
        }
        Ok(())
    }
}
