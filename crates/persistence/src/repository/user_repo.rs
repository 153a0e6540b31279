//! 用户与角色仓储

use async_trait::async_trait;
use tracing::{debug, instrument};

use super::sql::{ALIAS, SqlRepository};
use super::traits::{Repository, RoleRepository, UserRepository, UserRoleRepository};
use crate::entity::{Entity, Tracked};
use crate::error::{PersistenceError, Result};
use crate::models::{Role, User, UserRole};
use crate::query::sparse::qualify;
use crate::query::{Dialect, SqlBuilder};
use crate::uow::UnitOfWork;

#[async_trait]
impl<D: Dialect> UserRepository for SqlRepository<User, D> {
    async fn get_by_username(
        &self,
        uow: &mut UnitOfWork,
        username: &str,
    ) -> Result<Option<Tracked<User>>> {
        self.find_by(uow, "username", username).await
    }

    async fn get_by_email(
        &self,
        uow: &mut UnitOfWork,
        email: &str,
    ) -> Result<Option<Tracked<User>>> {
        self.find_by(uow, "email", email).await
    }
}

#[async_trait]
impl<D: Dialect> RoleRepository for SqlRepository<Role, D> {
    async fn get_by_name(&self, uow: &mut UnitOfWork, name: &str) -> Result<Option<Tracked<Role>>> {
        self.find_by(uow, "name", name).await
    }

    #[instrument(skip(self, uow))]
    async fn get_roles_for_user(
        &self,
        uow: &mut UnitOfWork,
        user_id: i64,
    ) -> Result<Vec<Tracked<Role>>> {
        let joins = format!(
            "INNER JOIN {} ur ON ur.role_id = {ALIAS}.id",
            UserRole::TABLE
        );
        let mut builder = SqlBuilder::new();
        builder.where_eq("ur.user_id", user_id);
        self.select_joined(uow, &joins, false, &mut builder).await
    }
}

fn pair_filter(user_id: i64, role_id: i64, alias: Option<&str>) -> SqlBuilder {
    let mut builder = SqlBuilder::new();
    builder
        .where_eq(qualify(alias, "user_id"), user_id)
        .where_eq(qualify(alias, "role_id"), role_id);
    builder
}

#[async_trait]
impl<D: Dialect> UserRoleRepository for SqlRepository<UserRole, D> {
    #[instrument(skip(self, uow))]
    async fn assign(
        &self,
        uow: &mut UnitOfWork,
        user_id: i64,
        role_id: i64,
    ) -> Result<Tracked<UserRole>> {
        let mut builder = pair_filter(user_id, role_id, Some(ALIAS));
        if let Some(existing) = self.find_one(uow, &mut builder).await? {
            debug!("角色已分配，跳过");
            return Ok(existing);
        }

        let mut link = Tracked::new(UserRole {
            user_id,
            role_id,
            ..Default::default()
        });
        self.add(uow, &mut link).await?;
        Ok(link)
    }

    #[instrument(skip(self, uow))]
    async fn revoke(&self, uow: &mut UnitOfWork, user_id: i64, role_id: i64) -> Result<()> {
        let rows = self
            .delete_where(uow, pair_filter(user_id, role_id, None))
            .await?;
        if rows == 0 {
            return uow.track(Err(PersistenceError::not_found(
                UserRole::NAME,
                format!("user_id={user_id}, role_id={role_id}"),
            )));
        }
        Ok(())
    }

    async fn get_by_user_id(
        &self,
        uow: &mut UnitOfWork,
        user_id: i64,
    ) -> Result<Vec<Tracked<UserRole>>> {
        self.list_by(uow, "user_id", user_id).await
    }
}
