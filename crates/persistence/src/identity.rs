//! 操作者身份
//!
//! 审计字段中的操作者由外部提供（通常来自认证后的请求上下文），
//! 工作单元开始时读取一次并在整个事务内保持不变。

/// 当前操作者
#[cfg_attr(test, mockall::automock)]
pub trait IdentityContext: Send + Sync {
    /// 写入 `created_by` / `modified_by` 的操作者标识
    fn actor(&self) -> String;
}

/// 固定身份（后台任务、批量导入等无请求上下文的场景）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaticIdentity(pub String);

impl StaticIdentity {
    pub fn new(actor: impl Into<String>) -> Self {
        Self(actor.into())
    }

    /// 系统身份
    pub fn system() -> Self {
        Self::new("system")
    }
}

impl IdentityContext for StaticIdentity {
    fn actor(&self) -> String {
        self.0.clone()
    }
}
