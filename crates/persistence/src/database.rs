//! 数据库连接管理模块
//!
//! 按配置的后端创建连接池，并作为工作单元的入口。

use std::str::FromStr;
use std::time::Duration;

use erp_shared::{AppConfig, DatabaseConfig, PersistenceConfig, Provider};
use futures::future::BoxFuture;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use tracing::{info, instrument, warn};

use crate::backend::Session;
use crate::backend::postgres::PgSession;
use crate::backend::sqlite::SqliteSession;
use crate::error::{PersistenceError, Result};
use crate::identity::IdentityContext;
use crate::uow::UnitOfWork;

#[derive(Clone)]
enum Pool {
    Postgres(PgPool),
    Sqlite(SqlitePool),
}

/// 数据库连接池包装
#[derive(Clone)]
pub struct Database {
    pool: Pool,
    settings: PersistenceConfig,
}

impl Database {
    /// 创建数据库连接池（使用默认持久化配置）
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        Self::connect_with(config, PersistenceConfig::default()).await
    }

    /// 从应用配置创建
    pub async fn from_config(config: &AppConfig) -> Result<Self> {
        Self::connect_with(&config.database, config.persistence.clone()).await
    }

    /// 创建数据库连接池
    #[instrument(skip(config, settings), fields(provider = %config.provider))]
    pub async fn connect_with(config: &DatabaseConfig, settings: PersistenceConfig) -> Result<Self> {
        info!("Connecting to database...");

        if let Some(inferred) =
            Provider::from_url(&config.url).filter(|inferred| *inferred != config.provider)
        {
            return Err(PersistenceError::Config(format!(
                "连接串指向 {inferred}，但配置的后端为 {}",
                config.provider
            )));
        }
        if settings.max_page_size < 1 {
            return Err(PersistenceError::Config(
                "persistence.max_page_size 必须大于 0".to_string(),
            ));
        }

        let acquire_timeout = Duration::from_secs(config.connect_timeout_seconds);
        let idle_timeout = Duration::from_secs(config.idle_timeout_seconds);

        let pool = match config.provider {
            Provider::Postgres => Pool::Postgres(
                PgPoolOptions::new()
                    .max_connections(config.max_connections)
                    .min_connections(config.min_connections)
                    .acquire_timeout(acquire_timeout)
                    .idle_timeout(idle_timeout)
                    .connect(&config.url)
                    .await?,
            ),
            Provider::Sqlite => {
                let options = SqliteConnectOptions::from_str(&config.url)?
                    .create_if_missing(true)
                    .foreign_keys(true);
                Pool::Sqlite(
                    SqlitePoolOptions::new()
                        .max_connections(config.max_connections)
                        .min_connections(config.min_connections)
                        .acquire_timeout(acquire_timeout)
                        .idle_timeout(idle_timeout)
                        .connect_with(options)
                        .await?,
                )
            }
        };

        info!("Database connection pool created");

        Ok(Self { pool, settings })
    }

    pub fn provider(&self) -> Provider {
        match self.pool {
            Pool::Postgres(_) => Provider::Postgres,
            Pool::Sqlite(_) => Provider::Sqlite,
        }
    }

    pub fn settings(&self) -> &PersistenceConfig {
        &self.settings
    }

    /// Postgres 连接池（建表、运维脚本等直接访问场景）
    pub fn pg_pool(&self) -> Option<&PgPool> {
        match &self.pool {
            Pool::Postgres(pool) => Some(pool),
            Pool::Sqlite(_) => None,
        }
    }

    pub fn sqlite_pool(&self) -> Option<&SqlitePool> {
        match &self.pool {
            Pool::Sqlite(pool) => Some(pool),
            Pool::Postgres(_) => None,
        }
    }

    /// 开始一个工作单元（获取连接并开启事务）
    pub async fn begin(&self, identity: &dyn IdentityContext) -> Result<UnitOfWork> {
        let session: Box<dyn Session> = match &self.pool {
            Pool::Postgres(pool) => Box::new(PgSession::new(pool.begin().await?)),
            Pool::Sqlite(pool) => Box::new(SqliteSession::new(pool.begin().await?)),
        };
        Ok(UnitOfWork::new(
            session,
            identity.actor(),
            self.settings.clone(),
        ))
    }

    /// 在一个工作单元内执行闭包
    ///
    /// 闭包返回 `Ok` 时提交，返回 `Err` 时回滚并原样返回该错误。
    ///
    /// ```ignore
    /// let id = db
    ///     .transaction(&identity, move |uow| {
    ///         Box::pin(async move {
    ///             repo.add(uow, &mut order).await?;
    ///             Ok(order.id())
    ///         })
    ///     })
    ///     .await?;
    /// ```
    pub async fn transaction<T, F>(&self, identity: &dyn IdentityContext, f: F) -> Result<T>
    where
        T: Send,
        F: for<'u> FnOnce(&'u mut UnitOfWork) -> BoxFuture<'u, Result<T>>,
    {
        let mut uow = self.begin(identity).await?;
        match f(&mut uow).await {
            Ok(value) => {
                uow.commit().await?;
                Ok(value)
            }
            Err(err) => {
                if let Err(rollback_err) = uow.rollback().await {
                    warn!(uow = %uow.id(), error = %rollback_err, "回滚失败");
                }
                Err(err)
            }
        }
    }

    /// 健康检查
    pub async fn health_check(&self) -> Result<()> {
        match &self.pool {
            Pool::Postgres(pool) => sqlx::query("SELECT 1").execute(pool).await.map(|_| ()),
            Pool::Sqlite(pool) => sqlx::query("SELECT 1").execute(pool).await.map(|_| ()),
        }
        .map_err(PersistenceError::from)
    }

    /// 关闭连接池
    pub async fn close(&self) {
        match &self.pool {
            Pool::Postgres(pool) => pool.close().await,
            Pool::Sqlite(pool) => pool.close().await,
        }
        info!("Database connection pool closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::MockIdentityContext;
    use erp_shared::test_utils::test_database_config;

    #[tokio::test]
    async fn test_provider_mismatch_is_config_error() {
        let mut config = test_database_config(Provider::Sqlite);
        config.provider = Provider::Postgres;
        let err = Database::connect(&config).await.err().unwrap();
        assert_eq!(err.code(), "CONFIG_ERROR");
    }

    #[tokio::test]
    async fn test_begin_captures_actor_and_commits_once() {
        let db = Database::connect(&test_database_config(Provider::Sqlite))
            .await
            .unwrap();
        db.health_check().await.unwrap();

        let mut identity = MockIdentityContext::new();
        identity.expect_actor().times(1).returning(|| "alice".to_string());

        let mut uow = db.begin(&identity).await.unwrap();
        assert_eq!(uow.actor(), "alice");
        assert_eq!(uow.provider(), Provider::Sqlite);

        uow.commit().await.unwrap();
        assert!(!uow.is_active());
        assert_eq!(uow.commit().await.unwrap_err().code(), "VALIDATION_ERROR");
        assert!(uow.session().is_err());
    }

    #[tokio::test]
    async fn test_failed_write_turns_commit_into_rollback() {
        let db = Database::connect(&test_database_config(Provider::Sqlite))
            .await
            .unwrap();
        let identity = crate::identity::StaticIdentity::system();

        let mut uow = db.begin(&identity).await.unwrap();
        let tracked: Result<()> = uow.track(Ok(()));
        assert!(tracked.is_ok());
        assert!(!uow.is_failed());

        let failed: Result<()> =
            uow.track(Err(PersistenceError::Validation("数量不能为负".to_string())));
        assert!(failed.is_err());
        assert!(uow.is_failed());

        let err = uow.commit().await.unwrap_err();
        assert_eq!(err.code(), "VALIDATION_ERROR");
        assert!(err.to_string().contains("数量不能为负"));
        assert!(!uow.is_active());
    }

    #[tokio::test]
    async fn test_dropped_uow_returns_connection() {
        let db = Database::connect(&test_database_config(Provider::Sqlite))
            .await
            .unwrap();
        let identity = crate::identity::StaticIdentity::system();

        // 单连接池：若连接未归还，第二次 begin 会超时
        drop(db.begin(&identity).await.unwrap());
        let mut uow = db.begin(&identity).await.unwrap();
        uow.rollback().await.unwrap();
    }
}
