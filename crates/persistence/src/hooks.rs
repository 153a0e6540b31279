//! 变更钩子
//!
//! 仓储在每次插入、更新、删除前后依注册顺序调用钩子：
//!
//! - `before` 可以修改待写入的审计字段，也可以返回错误否决本次变更
//! - `after` 只在语句成功执行后调用，用于日志等旁路处理
//!
//! 默认管线依次为 `UpdateGuard`、`AuditStamper`、`TracingHook`。

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::entity::Audit;
use crate::error::{PersistenceError, Result};

/// 变更类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MutationKind {
    Insert,
    Update,
    Delete,
}

impl MutationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Insert => "insert",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }
}

/// 变更上下文
#[derive(Debug, Clone, Copy)]
pub struct MutationContext<'a> {
    pub entity: &'static str,
    pub kind: MutationKind,
    /// 目标实体的主键；按谓词批量执行的语句为 `None`
    pub id: Option<i64>,
    pub is_changed: bool,
    pub actor: &'a str,
}

/// 写入前的钩子参数
#[derive(Debug)]
pub struct BeforeMutation<'a> {
    pub context: MutationContext<'a>,
    /// 将随语句写入的审计字段
    pub audit: &'a mut Audit,
}

/// 写入后的钩子参数
#[derive(Debug, Clone, Copy)]
pub struct AfterMutation<'a> {
    pub context: MutationContext<'a>,
    pub rows_affected: u64,
}

/// 变更钩子
pub trait MutationHook: Send + Sync {
    fn name(&self) -> &'static str;

    fn before(&self, _mutation: &mut BeforeMutation<'_>) -> Result<()> {
        Ok(())
    }

    fn after(&self, _mutation: &AfterMutation<'_>) {}
}

/// 更新/删除前置校验
///
/// 更新要求实体已持久化且存在未提交的修改；删除要求实体已持久化。
/// 按谓词批量执行的语句不经过此校验。
#[derive(Debug, Default)]
pub struct UpdateGuard;

impl MutationHook for UpdateGuard {
    fn name(&self) -> &'static str {
        "update_guard"
    }

    fn before(&self, mutation: &mut BeforeMutation<'_>) -> Result<()> {
        let ctx = &mutation.context;
        match (ctx.kind, ctx.id) {
            (MutationKind::Update, Some(0)) => Err(PersistenceError::Validation(format!(
                "{} 尚未持久化，无法更新",
                ctx.entity
            ))),
            (MutationKind::Update, Some(id)) if !ctx.is_changed => Err(
                PersistenceError::Validation(format!("{} id={id} 没有需要保存的修改", ctx.entity)),
            ),
            (MutationKind::Delete, Some(0)) => Err(PersistenceError::Validation(format!(
                "{} 尚未持久化，无法删除",
                ctx.entity
            ))),
            _ => Ok(()),
        }
    }
}

/// 审计字段盖章
///
/// 插入时写入全部四个审计字段，更新时只写 `modified_*`。
pub struct AuditStamper {
    clock: fn() -> DateTime<Utc>,
}

impl AuditStamper {
    pub fn new() -> Self {
        Self { clock: Utc::now }
    }

    /// 使用指定时钟（测试中固定时间）
    pub fn with_clock(clock: fn() -> DateTime<Utc>) -> Self {
        Self { clock }
    }
}

impl Default for AuditStamper {
    fn default() -> Self {
        Self::new()
    }
}

impl MutationHook for AuditStamper {
    fn name(&self) -> &'static str {
        "audit_stamper"
    }

    fn before(&self, mutation: &mut BeforeMutation<'_>) -> Result<()> {
        let now = (self.clock)();
        let actor = mutation.context.actor;
        let audit = &mut *mutation.audit;
        match mutation.context.kind {
            MutationKind::Insert => {
                audit.created_by = actor.to_string();
                audit.created_date_time = Some(now);
                audit.modified_by = actor.to_string();
                audit.modified_date_time = Some(now);
            }
            MutationKind::Update => {
                audit.modified_by = actor.to_string();
                audit.modified_date_time = Some(now);
            }
            MutationKind::Delete => {}
        }
        Ok(())
    }
}

/// 变更日志
#[derive(Debug, Default)]
pub struct TracingHook;

impl MutationHook for TracingHook {
    fn name(&self) -> &'static str {
        "tracing"
    }

    fn after(&self, mutation: &AfterMutation<'_>) {
        let ctx = &mutation.context;
        info!(
            entity = ctx.entity,
            kind = ctx.kind.as_str(),
            id = ?ctx.id,
            actor = ctx.actor,
            rows = mutation.rows_affected,
            "实体变更已写入"
        );
    }
}

/// 钩子管线
#[derive(Clone, Default)]
pub struct HookPipeline {
    hooks: Vec<Arc<dyn MutationHook>>,
}

impl HookPipeline {
    /// 创建空管线
    pub fn new() -> Self {
        Self::default()
    }

    /// 默认管线：校验、审计盖章、日志
    pub fn with_defaults() -> Self {
        let mut pipeline = Self::new();
        pipeline
            .register(Arc::new(UpdateGuard))
            .register(Arc::new(AuditStamper::new()))
            .register(Arc::new(TracingHook));
        pipeline
    }

    pub fn register(&mut self, hook: Arc<dyn MutationHook>) -> &mut Self {
        debug!(hook = hook.name(), "注册变更钩子");
        self.hooks.push(hook);
        self
    }

    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }

    /// 依次执行 `before`，任一钩子否决即停止
    pub fn run_before(&self, mutation: &mut BeforeMutation<'_>) -> Result<()> {
        for hook in &self.hooks {
            hook.before(mutation)?;
        }
        Ok(())
    }

    pub fn run_after(&self, mutation: &AfterMutation<'_>) {
        for hook in &self.hooks {
            hook.after(mutation);
        }
    }
}

impl std::fmt::Debug for HookPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.hooks.iter().map(|h| h.name()))
            .finish()
    }
}
