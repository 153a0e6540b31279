//! 用户、角色及其关联

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::entity::{Audit, Column, Entity, RecordView, SqlValue};
use crate::error::Result;

/// 系统用户
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub username: String,
    pub email: String,
    pub display_name: String,
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub is_active: Option<bool>,
    pub last_login_at: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub audit: Audit,
}

impl Entity for User {
    const TABLE: &'static str = "app_user";
    const NAME: &'static str = "User";
    const COLUMNS: &'static [Column] = &[
        Column::text("username"),
        Column::text("email"),
        Column::text("display_name"),
        Column::text("password_hash"),
        Column::bool("is_active"),
        Column::timestamp("last_login_at"),
    ];

    fn values(&self) -> Vec<SqlValue> {
        vec![
            SqlValue::from(&self.username),
            SqlValue::from(&self.email),
            SqlValue::from(&self.display_name),
            SqlValue::from(&self.password_hash),
            SqlValue::from(self.is_active),
            SqlValue::from(self.last_login_at),
        ]
    }

    fn from_record(row: &RecordView<'_>) -> Result<Self> {
        Ok(Self {
            username: row.text("username")?,
            email: row.text("email")?,
            display_name: row.text("display_name")?,
            password_hash: row.text("password_hash")?,
            is_active: row.opt_bool("is_active")?,
            last_login_at: row.timestamp("last_login_at")?,
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
        if self.username.trim().is_empty() {
            return Err("username 不能为空".to_string());
        }
        if !self.email.is_empty() && !self.email.contains('@') {
            return Err(format!("email 格式无效: {}", self.email));
        }
        Ok(())
    }
}

/// 角色
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Role {
    pub name: String,
    pub description: String,
    #[serde(flatten)]
    pub audit: Audit,
}

impl Entity for Role {
    const TABLE: &'static str = "app_role";
    const NAME: &'static str = "Role";
    const COLUMNS: &'static [Column] = &[Column::text("name"), Column::text("description")];

    fn values(&self) -> Vec<SqlValue> {
        vec![SqlValue::from(&self.name), SqlValue::from(&self.description)]
    }

    fn from_record(row: &RecordView<'_>) -> Result<Self> {
        Ok(Self {
            name: row.text("name")?,
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
        if self.name.trim().is_empty() {
            return Err("角色名不能为空".to_string());
        }
        Ok(())
    }
}

/// 用户-角色关联（多对多）
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRole {
    pub user_id: i64,
    pub role_id: i64,
    #[serde(flatten)]
    pub audit: Audit,
}

impl Entity for UserRole {
    const TABLE: &'static str = "user_role";
    const NAME: &'static str = "UserRole";
    const COLUMNS: &'static [Column] = &[Column::int("user_id"), Column::int("role_id")];

    fn values(&self) -> Vec<SqlValue> {
        vec![SqlValue::from(self.user_id), SqlValue::from(self.role_id)]
    }

    fn from_record(row: &RecordView<'_>) -> Result<Self> {
        Ok(Self {
            user_id: row.int("user_id")?,
            role_id: row.int("role_id")?,
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
        if self.user_id == 0 || self.role_id == 0 {
            return Err("user_id 与 role_id 均不能为 0".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_validation() {
        let mut user = User {
            username: "alice".to_string(),
            email: "alice@example.com".to_string(),
            ..Default::default()
        };
        assert!(user.validate().is_ok());

        user.email = "not-an-email".to_string();
        assert!(user.validate().is_err());
    }

    #[test]
    fn test_password_hash_not_serialized() {
        let user = User {
            username: "alice".to_string(),
            password_hash: "secret".to_string(),
            ..Default::default()
        };
        let json = serde_json::to_string(&user).unwrap();
        assert!(!json.contains("secret"));
        assert!(json.contains("createdBy"));
    }
}
