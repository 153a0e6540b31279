//! 编号序列与刷新令牌

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::entity::{Audit, Column, Entity, RecordView, SqlValue};
use crate::error::Result;

/// 单调递增的编号序列
///
/// 只保存计数器本身，编号格式化（前缀、补零等）由业务层完成。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NumberSequence {
    pub code: String,
    pub prefix: String,
    pub current_value: i64,
    pub increment_by: i64,
    #[serde(flatten)]
    pub audit: Audit,
}

impl Entity for NumberSequence {
    const TABLE: &'static str = "number_sequence";
    const NAME: &'static str = "NumberSequence";
    const COLUMNS: &'static [Column] = &[
        Column::text("code"),
        Column::text("prefix"),
        Column::int("current_value"),
        Column::int("increment_by"),
    ];

    fn values(&self) -> Vec<SqlValue> {
        vec![
            SqlValue::from(&self.code),
            SqlValue::from(&self.prefix),
            SqlValue::from(self.current_value),
            SqlValue::from(self.increment_by),
        ]
    }

    fn from_record(row: &RecordView<'_>) -> Result<Self> {
        Ok(Self {
            code: row.text("code")?,
            prefix: row.text("prefix")?,
            current_value: row.int("current_value")?,
            increment_by: row.int("increment_by")?,
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
            return Err("序列编码不能为空".to_string());
        }
        if self.increment_by < 1 {
            return Err("increment_by 必须大于 0".to_string());
        }
        Ok(())
    }
}

/// 刷新令牌
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshToken {
    pub user_id: i64,
    pub token: String,
    pub expires_at: Option<DateTime<Utc>>,
    pub revoked_at: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub audit: Audit,
}

impl RefreshToken {
    /// 未撤销且未过期
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.revoked_at.is_none() && self.expires_at.is_some_and(|t| t > now)
    }
}

impl Entity for RefreshToken {
    const TABLE: &'static str = "refresh_token";
    const NAME: &'static str = "RefreshToken";
    const COLUMNS: &'static [Column] = &[
        Column::int("user_id"),
        Column::text("token"),
        Column::timestamp("expires_at"),
        Column::timestamp("revoked_at"),
    ];

    fn values(&self) -> Vec<SqlValue> {
        vec![
            SqlValue::from(self.user_id),
            SqlValue::from(&self.token),
            SqlValue::from(self.expires_at),
            SqlValue::from(self.revoked_at),
        ]
    }

    fn from_record(row: &RecordView<'_>) -> Result<Self> {
        Ok(Self {
            user_id: row.int("user_id")?,
            token: row.text("token")?,
            expires_at: row.timestamp("expires_at")?,
            revoked_at: row.timestamp("revoked_at")?,
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
        if self.token.is_empty() || self.user_id == 0 {
            return Err("令牌与 user_id 不能为空".to_string());
        }
        if self.expires_at.is_none() {
            return Err("expires_at 未设置".to_string());
        }
        Ok(())
    }
}
