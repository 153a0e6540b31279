//! 权限与访问规则仓储

use async_trait::async_trait;
use tracing::instrument;

use super::sql::{ALIAS, SqlRepository};
use super::traits::{AccessRuleRepository, PermissionRepository};
use crate::entity::{Entity, SqlValue, Tracked};
use crate::error::Result;
use crate::models::{AccessRule, Permission, UserRole};
use crate::query::sparse::qualify;
use crate::query::{Dialect, SqlBuilder};
use crate::uow::UnitOfWork;

#[async_trait]
impl<D: Dialect> PermissionRepository for SqlRepository<Permission, D> {
    async fn get_by_code(
        &self,
        uow: &mut UnitOfWork,
        code: &str,
    ) -> Result<Option<Tracked<Permission>>> {
        self.find_by(uow, "code", code).await
    }

    /// 用户 -> 角色 -> 访问规则 -> 权限，同一权限经多个角色授予时只返回一次
    #[instrument(skip(self, uow))]
    async fn get_permissions_for_user(
        &self,
        uow: &mut UnitOfWork,
        user_id: i64,
    ) -> Result<Vec<Tracked<Permission>>> {
        let joins = format!(
            "INNER JOIN {} ar ON ar.permission_id = {ALIAS}.id \
             INNER JOIN {} ur ON ur.role_id = ar.role_id",
            AccessRule::TABLE,
            UserRole::TABLE,
        );
        let mut builder = SqlBuilder::new();
        builder.where_eq("ur.user_id", user_id).where_raw(
            "ar.can_read = {} OR ar.can_write = {}",
            vec![SqlValue::from(true), SqlValue::from(true)],
        );
        self.select_joined(uow, &joins, true, &mut builder).await
    }
}

#[async_trait]
impl<D: Dialect> AccessRuleRepository for SqlRepository<AccessRule, D> {
    async fn get_by_role_id(
        &self,
        uow: &mut UnitOfWork,
        role_id: i64,
    ) -> Result<Vec<Tracked<AccessRule>>> {
        self.list_by(uow, "role_id", role_id).await
    }

    async fn get_rule(
        &self,
        uow: &mut UnitOfWork,
        role_id: i64,
        permission_id: i64,
    ) -> Result<Option<Tracked<AccessRule>>> {
        let mut builder = SqlBuilder::new();
        builder
            .where_eq(qualify(Some(ALIAS), "role_id"), role_id)
            .where_eq(qualify(Some(ALIAS), "permission_id"), permission_id);
        self.find_one(uow, &mut builder).await
    }
}
