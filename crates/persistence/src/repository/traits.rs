//! 仓储 Trait 定义
//!
//! 业务层只依赖这些接口，通过 `RepositoryFactory` 按后端取得实现。
//! 所有操作都显式接收所属的工作单元，参数只包含普通数据，不暴露 SQL。

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::{HeaderWithLines, PagedList};
use crate::backend::{BulkLoadSummary, BulkRowError};
use crate::entity::{Entity, Tracked};
use crate::error::Result;
use crate::models::{
    AccessRule, NumberSequence, Permission, PurchLine, PurchTable, RefreshToken, Role, User,
    UserRole, WorkOrder, WorkOrderLine,
};
use crate::query::ReadMode;
use crate::uow::UnitOfWork;

/// 批量导入的行错误回调
pub type BulkErrorCallback<'a> = &'a mut (dyn FnMut(BulkRowError) + Send);

/// 通用仓储接口
#[async_trait]
pub trait Repository<E: Entity>: Send + Sync {
    /// 插入新实体，成功后写入主键并接受变更
    async fn add(&self, uow: &mut UnitOfWork, entity: &mut Tracked<E>) -> Result<()>;

    /// 只更新与快照不同的列；没有业务列变更时不发出语句
    async fn update(&self, uow: &mut UnitOfWork, entity: &mut Tracked<E>) -> Result<()>;

    async fn delete(&self, uow: &mut UnitOfWork, id: i64) -> Result<()>;

    async fn get_by_id(&self, uow: &mut UnitOfWork, id: i64, mode: ReadMode)
    -> Result<Tracked<E>>;

    /// 稀疏过滤：只按过滤对象中已提供的字段筛选
    async fn get_by_params(&self, uow: &mut UnitOfWork, filter: &E) -> Result<Vec<Tracked<E>>>;

    async fn get_all(&self, uow: &mut UnitOfWork) -> Result<Vec<Tracked<E>>>;

    async fn get_all_paged_list(
        &self,
        uow: &mut UnitOfWork,
        page_number: i64,
        page_size: i64,
    ) -> Result<PagedList<Tracked<E>>>;

    async fn get_by_params_paged_list(
        &self,
        uow: &mut UnitOfWork,
        filter: &E,
        page_number: i64,
        page_size: i64,
    ) -> Result<PagedList<Tracked<E>>>;
}

/// 收货单头仓储
#[async_trait]
pub trait PurchTableRepository: Repository<PurchTable> {
    async fn get_by_packing_slip_id(
        &self,
        uow: &mut UnitOfWork,
        packing_slip_id: &str,
    ) -> Result<Option<Tracked<PurchTable>>>;

    async fn get_with_lines(
        &self,
        uow: &mut UnitOfWork,
        id: i64,
    ) -> Result<HeaderWithLines<PurchTable, PurchLine>>;

    async fn get_all_with_lines(
        &self,
        uow: &mut UnitOfWork,
        filter: &PurchTable,
    ) -> Result<Vec<HeaderWithLines<PurchTable, PurchLine>>>;

    /// 插入头和全部行（行的 `purch_table_id` 由头的新主键填充）
    async fn add_with_lines(
        &self,
        uow: &mut UnitOfWork,
        order: &mut HeaderWithLines<PurchTable, PurchLine>,
    ) -> Result<()>;
}

/// 收货单行仓储
#[async_trait]
pub trait PurchLineRepository: Repository<PurchLine> {
    async fn get_by_purch_table_id(
        &self,
        uow: &mut UnitOfWork,
        purch_table_id: i64,
    ) -> Result<Vec<Tracked<PurchLine>>>;

    async fn bulk_add(
        &self,
        uow: &mut UnitOfWork,
        lines: &[PurchLine],
        on_error: BulkErrorCallback<'_>,
    ) -> Result<BulkLoadSummary>;
}

/// 工单头仓储
#[async_trait]
pub trait WorkOrderRepository: Repository<WorkOrder> {
    async fn get_by_external_id(
        &self,
        uow: &mut UnitOfWork,
        external_work_order_id: &str,
    ) -> Result<Option<Tracked<WorkOrder>>>;

    async fn get_with_lines(
        &self,
        uow: &mut UnitOfWork,
        id: i64,
    ) -> Result<HeaderWithLines<WorkOrder, WorkOrderLine>>;

    async fn get_all_with_lines(
        &self,
        uow: &mut UnitOfWork,
        filter: &WorkOrder,
    ) -> Result<Vec<HeaderWithLines<WorkOrder, WorkOrderLine>>>;

    async fn add_with_lines(
        &self,
        uow: &mut UnitOfWork,
        order: &mut HeaderWithLines<WorkOrder, WorkOrderLine>,
    ) -> Result<()>;
}

/// 工单行仓储
#[async_trait]
pub trait WorkOrderLineRepository: Repository<WorkOrderLine> {
    async fn get_by_work_order_id(
        &self,
        uow: &mut UnitOfWork,
        work_order_id: i64,
    ) -> Result<Vec<Tracked<WorkOrderLine>>>;

    async fn bulk_add(
        &self,
        uow: &mut UnitOfWork,
        lines: &[WorkOrderLine],
        on_error: BulkErrorCallback<'_>,
    ) -> Result<BulkLoadSummary>;
}

/// 用户仓储
#[async_trait]
pub trait UserRepository: Repository<User> {
    async fn get_by_username(
        &self,
        uow: &mut UnitOfWork,
        username: &str,
    ) -> Result<Option<Tracked<User>>>;

    async fn get_by_email(&self, uow: &mut UnitOfWork, email: &str)
    -> Result<Option<Tracked<User>>>;
}

/// 角色仓储
#[async_trait]
pub trait RoleRepository: Repository<Role> {
    async fn get_by_name(&self, uow: &mut UnitOfWork, name: &str) -> Result<Option<Tracked<Role>>>;

    async fn get_roles_for_user(
        &self,
        uow: &mut UnitOfWork,
        user_id: i64,
    ) -> Result<Vec<Tracked<Role>>>;
}

/// 用户-角色关联仓储
#[async_trait]
pub trait UserRoleRepository: Repository<UserRole> {
    /// 分配角色；已分配时直接返回现有关联
    async fn assign(
        &self,
        uow: &mut UnitOfWork,
        user_id: i64,
        role_id: i64,
    ) -> Result<Tracked<UserRole>>;

    /// 撤销角色；关联不存在时返回 `NotFound`
    async fn revoke(&self, uow: &mut UnitOfWork, user_id: i64, role_id: i64) -> Result<()>;

    async fn get_by_user_id(
        &self,
        uow: &mut UnitOfWork,
        user_id: i64,
    ) -> Result<Vec<Tracked<UserRole>>>;
}

/// 权限仓储
#[async_trait]
pub trait PermissionRepository: Repository<Permission> {
    async fn get_by_code(
        &self,
        uow: &mut UnitOfWork,
        code: &str,
    ) -> Result<Option<Tracked<Permission>>>;

    /// 用户经由角色和访问规则获得的权限（读或写任一授权即计入）
    async fn get_permissions_for_user(
        &self,
        uow: &mut UnitOfWork,
        user_id: i64,
    ) -> Result<Vec<Tracked<Permission>>>;
}

/// 访问规则仓储
#[async_trait]
pub trait AccessRuleRepository: Repository<AccessRule> {
    async fn get_by_role_id(
        &self,
        uow: &mut UnitOfWork,
        role_id: i64,
    ) -> Result<Vec<Tracked<AccessRule>>>;

    async fn get_rule(
        &self,
        uow: &mut UnitOfWork,
        role_id: i64,
        permission_id: i64,
    ) -> Result<Option<Tracked<AccessRule>>>;
}

/// 编号序列仓储
#[async_trait]
pub trait NumberSequenceRepository: Repository<NumberSequence> {
    async fn get_by_code(
        &self,
        uow: &mut UnitOfWork,
        code: &str,
    ) -> Result<Option<Tracked<NumberSequence>>>;

    /// 递增并返回新值（单条语句完成，持有行锁直到事务结束）
    async fn next_value(&self, uow: &mut UnitOfWork, code: &str) -> Result<i64>;
}

/// 刷新令牌仓储
#[async_trait]
pub trait RefreshTokenRepository: Repository<RefreshToken> {
    async fn get_by_token(
        &self,
        uow: &mut UnitOfWork,
        token: &str,
    ) -> Result<Option<Tracked<RefreshToken>>>;

    /// 撤销单个令牌；已撤销的令牌保持不变
    async fn revoke(&self, uow: &mut UnitOfWork, token: &str, now: DateTime<Utc>) -> Result<()>;

    /// 撤销用户的全部有效令牌，返回撤销数量
    async fn revoke_all_for_user(
        &self,
        uow: &mut UnitOfWork,
        user_id: i64,
        now: DateTime<Utc>,
    ) -> Result<u64>;

    /// 删除已过期的令牌，返回删除数量
    async fn delete_expired(&self, uow: &mut UnitOfWork, now: DateTime<Utc>) -> Result<u64>;
}
