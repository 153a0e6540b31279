//! ERP 持久化核心
//!
//! 为收货单、工单、用户权限等业务聚合提供与后端无关的数据访问能力。
//!
//! ## 核心功能
//!
//! - **变更追踪**：`Tracked<E>` 保存加载时的快照，更新只写入真正变化的列
//! - **条件 SQL**：`SqlBuilder` 按已提供的过滤字段生成 WHERE/SET/排序/分页片段
//! - **聚合仓储**：每个聚合一个仓储接口，包含单据头与行的联表查询和批量导入
//! - **仓储工厂**：按存储提供方（Postgres/SQLite）解析接口实现
//! - **工作单元**：一个工作单元对应一个连接上的一个事务，显式提交或回滚
//! - **变更钩子**：写入前校验与审计盖章，写入后记录日志
//!
//! ## 模块结构
//!
//! - `entity`: 实体 trait、变更追踪与列值类型
//! - `models`: 领域模型
//! - `query`: SQL 片段构建与方言
//! - `backend`: 后端会话与批量导入
//! - `repository`: 仓储接口、通用实现与工厂
//! - `uow` / `database`: 工作单元与连接池
//! - `hooks` / `identity`: 变更钩子与操作者身份

pub mod backend;
pub mod database;
pub mod entity;
pub mod error;
pub mod hooks;
pub mod identity;
pub mod models;
pub mod query;
pub mod repository;
pub mod uow;

pub use backend::{BulkLoadSummary, BulkRowError};
pub use database::Database;
pub use entity::{Audit, Entity, FieldChange, SqlValue, Tracked};
pub use error::{PersistenceError, Result};
pub use hooks::{HookPipeline, MutationHook, MutationKind};
pub use identity::{IdentityContext, StaticIdentity};
pub use models::*;
pub use query::{PgDialect, ReadMode, SqlBuilder, SqliteDialect};
pub use repository::{
    AccessRuleRepository, HeaderWithLines, NumberSequenceRepository, PagedList,
    PermissionRepository, PurchLineRepository, PurchTableRepository, RefreshTokenRepository,
    Repository, RepositoryFactory, RoleRepository, SqlRepository, UserRepository,
    UserRoleRepository, WorkOrderLineRepository, WorkOrderRepository,
};
pub use uow::UnitOfWork;
