//! 编号序列与刷新令牌仓储

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{debug, instrument};

use super::sql::SqlRepository;
use super::traits::{NumberSequenceRepository, RefreshTokenRepository};
use crate::entity::{Entity, SqlValue, Tracked};
use crate::error::{PersistenceError, Result};
use crate::models::{NumberSequence, RefreshToken};
use crate::query::{Dialect, SqlBuilder};
use crate::uow::UnitOfWork;

#[async_trait]
impl<D: Dialect> NumberSequenceRepository for SqlRepository<NumberSequence, D> {
    async fn get_by_code(
        &self,
        uow: &mut UnitOfWork,
        code: &str,
    ) -> Result<Option<Tracked<NumberSequence>>> {
        self.find_by(uow, "code", code).await
    }

    /// `UPDATE ... SET current_value = current_value + increment_by ... RETURNING current_value`
    ///
    /// 读取与递增在同一条语句内完成，并发事务在行锁上排队，不会拿到重复的值。
    #[instrument(skip(self, uow))]
    async fn next_value(&self, uow: &mut UnitOfWork, code: &str) -> Result<i64> {
        let mut builder = SqlBuilder::new();
        builder
            .set_expr("current_value", "current_value + increment_by")
            .where_eq("code", code);
        let value = self.update_returning(uow, builder, "current_value").await?;
        let value = uow.track(
            value.ok_or_else(|| PersistenceError::not_found(NumberSequence::NAME, code)),
        )?;
        debug!(value, "序列已递增");
        Ok(value)
    }
}

fn active_tokens() -> SqlBuilder {
    let mut builder = SqlBuilder::new();
    builder.where_eq("revoked_at", SqlValue::Timestamp(None));
    builder
}

#[async_trait]
impl<D: Dialect> RefreshTokenRepository for SqlRepository<RefreshToken, D> {
    async fn get_by_token(
        &self,
        uow: &mut UnitOfWork,
        token: &str,
    ) -> Result<Option<Tracked<RefreshToken>>> {
        self.find_by(uow, "token", token).await
    }

    #[instrument(skip_all)]
    async fn revoke(&self, uow: &mut UnitOfWork, token: &str, now: DateTime<Utc>) -> Result<()> {
        let mut builder = active_tokens();
        builder.set("revoked_at", now).where_eq("token", token);
        if self.update_where(uow, builder).await? > 0 {
            return Ok(());
        }
        match self.get_by_token(uow, token).await? {
            Some(_) => {
                debug!("令牌已撤销，保持不变");
                Ok(())
            }
            None => uow.track(Err(PersistenceError::not_found(RefreshToken::NAME, "token"))),
        }
    }

    #[instrument(skip(self, uow))]
    async fn revoke_all_for_user(
        &self,
        uow: &mut UnitOfWork,
        user_id: i64,
        now: DateTime<Utc>,
    ) -> Result<u64> {
        let mut builder = active_tokens();
        builder.set("revoked_at", now).where_eq("user_id", user_id);
        self.update_where(uow, builder).await
    }

    #[instrument(skip(self, uow))]
    async fn delete_expired(&self, uow: &mut UnitOfWork, now: DateTime<Utc>) -> Result<u64> {
        let mut builder = SqlBuilder::new();
        builder.where_raw("expires_at < {}", vec![SqlValue::from(now)]);
        self.delete_where(uow, builder).await
    }
}
