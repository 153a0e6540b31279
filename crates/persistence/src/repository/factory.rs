//! 仓储工厂
//!
//! 以 (存储提供方, 接口类型) 为键登记仓储实例，业务层按接口解析：
//!
//! ```ignore
//! let factory = RepositoryFactory::with_defaults(Arc::new(HookPipeline::with_defaults()));
//! let purch = factory.resolve::<dyn PurchTableRepository>(db.provider())?;
//! ```
//!
//! 同一键重复登记时后者覆盖前者，测试可以借此替换单个接口的实现。

use std::any::{Any, TypeId, type_name};
use std::collections::HashMap;
use std::sync::Arc;

use erp_shared::Provider;
use tracing::{debug, info};

use super::sql::SqlRepository;
use super::traits::{
    AccessRuleRepository, NumberSequenceRepository, PermissionRepository, PurchLineRepository,
    PurchTableRepository, RefreshTokenRepository, RoleRepository, UserRepository,
    UserRoleRepository, WorkOrderLineRepository, WorkOrderRepository,
};
use crate::error::{PersistenceError, Result};
use crate::hooks::HookPipeline;
use crate::models::{
    AccessRule, NumberSequence, Permission, PurchLine, PurchTable, RefreshToken, Role, User,
    UserRole, WorkOrder, WorkOrderLine,
};
use crate::query::{Dialect, PgDialect, SqliteDialect};

/// 仓储工厂
#[derive(Default)]
pub struct RepositoryFactory {
    // 值为 Box<Arc<R>>，R 通常是 `dyn XxxRepository`
    entries: HashMap<(Provider, TypeId), Box<dyn Any + Send + Sync>>,
}

impl RepositoryFactory {
    /// 创建空工厂
    pub fn new() -> Self {
        Self::default()
    }

    /// 为两种后端登记全部内置仓储
    pub fn with_defaults(hooks: Arc<HookPipeline>) -> Self {
        let mut factory = Self::new();
        factory.register_dialect::<PgDialect>(&hooks);
        factory.register_dialect::<SqliteDialect>(&hooks);
        info!(entries = factory.len(), "仓储工厂初始化完成");
        factory
    }

    fn register_dialect<D: Dialect>(&mut self, hooks: &Arc<HookPipeline>) {
        macro_rules! register_sql {
            ($($interface:ident => $entity:ty),+ $(,)?) => {
                $(
                    self.register::<dyn $interface>(
                        D::PROVIDER,
                        Arc::new(SqlRepository::<$entity, D>::new(Arc::clone(hooks))),
                    );
                )+
            };
        }

        register_sql!(
            PurchTableRepository => PurchTable,
            PurchLineRepository => PurchLine,
            WorkOrderRepository => WorkOrder,
            WorkOrderLineRepository => WorkOrderLine,
            UserRepository => User,
            RoleRepository => Role,
            UserRoleRepository => UserRole,
            PermissionRepository => Permission,
            AccessRuleRepository => AccessRule,
            NumberSequenceRepository => NumberSequence,
            RefreshTokenRepository => RefreshToken,
        );
    }

    /// 登记接口 `R` 在 `provider` 下的实现
    pub fn register<R>(&mut self, provider: Provider, repository: Arc<R>) -> &mut Self
    where
        R: ?Sized + Send + Sync + 'static,
    {
        debug!(interface = type_name::<R>(), provider = %provider, "登记仓储");
        self.entries
            .insert((provider, TypeId::of::<R>()), Box::new(repository));
        self
    }

    /// 解析接口 `R` 在 `provider` 下的实现
    pub fn resolve<R>(&self, provider: Provider) -> Result<Arc<R>>
    where
        R: ?Sized + Send + Sync + 'static,
    {
        self.entries
            .get(&(provider, TypeId::of::<R>()))
            .and_then(|entry| entry.downcast_ref::<Arc<R>>())
            .cloned()
            .ok_or(PersistenceError::ProviderResolution {
                interface: type_name::<R>(),
                provider,
            })
    }

    pub fn contains<R>(&self, provider: Provider) -> bool
    where
        R: ?Sized + Send + Sync + 'static,
    {
        self.entries.contains_key(&(provider, TypeId::of::<R>()))
    }

    /// 已登记的 (后端, 接口) 数量
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl std::fmt::Debug for RepositoryFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RepositoryFactory")
            .field("entries", &self.entries.len())
            .finish()
    }
}
