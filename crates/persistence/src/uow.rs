//! 工作单元
//!
//! 一个工作单元独占一个连接和其上的一个事务。仓储以 `&mut UnitOfWork` 显式接收它，
//! 因此同一时刻只有一个逻辑操作在使用该连接；多个工作单元之间可以并行。
//!
//! 生命周期：
//! - `commit` 只能成功提交一次，之后再使用会得到校验错误
//! - 任一写操作失败后工作单元被标记为失败，`commit` 改为回滚并返回错误
//! - `rollback` 回滚并结束
//! - 未结束就被丢弃时，sqlx 事务在析构时回滚，连接归还连接池

use std::time::Instant;

use erp_shared::{PersistenceConfig, Provider};
use tracing::{info, warn};
use uuid::Uuid;

use crate::backend::Session;
use crate::error::{PersistenceError, Result};

/// 工作单元
pub struct UnitOfWork {
    id: Uuid,
    session: Option<Box<dyn Session>>,
    provider: Provider,
    actor: String,
    settings: PersistenceConfig,
    started: Instant,
    // 第一个失败写操作的错误描述
    failure: Option<String>,
}

impl UnitOfWork {
    pub(crate) fn new(session: Box<dyn Session>, actor: String, settings: PersistenceConfig) -> Self {
        let id = Uuid::now_v7();
        let provider = session.provider();
        info!(uow = %id, provider = %provider, actor = %actor, "工作单元开始");
        Self {
            id,
            session: Some(session),
            provider,
            actor,
            settings,
            started: Instant::now(),
            failure: None,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn provider(&self) -> Provider {
        self.provider
    }

    /// 本事务内的操作者
    pub fn actor(&self) -> &str {
        &self.actor
    }

    pub fn settings(&self) -> &PersistenceConfig {
        &self.settings
    }

    /// 事务是否仍可使用
    pub fn is_active(&self) -> bool {
        self.session.is_some()
    }

    /// 是否有写操作失败过
    pub fn is_failed(&self) -> bool {
        self.failure.is_some()
    }

    /// 当前事务会话
    pub fn session(&mut self) -> Result<&mut dyn Session> {
        let err = self.finished_error();
        match self.session.as_deref_mut() {
            Some(session) => Ok(session),
            None => Err(err),
        }
    }

    /// 记录写操作的结果，失败时标记本工作单元
    pub(crate) fn track<T>(&mut self, result: Result<T>) -> Result<T> {
        if let Err(err) = &result {
            if self.failure.is_none() {
                warn!(uow = %self.id, error = %err, "写操作失败，工作单元只能回滚");
                self.failure = Some(err.to_string());
            }
        }
        result
    }

    fn finished_error(&self) -> PersistenceError {
        PersistenceError::Validation(format!("工作单元 {} 已结束", self.id))
    }

    /// 提交事务
    ///
    /// 存在失败的写操作时不提交，而是回滚并返回 `Validation`。
    pub async fn commit(&mut self) -> Result<()> {
        let session = self.session.take().ok_or_else(|| self.finished_error())?;
        if let Some(reason) = self.failure.clone() {
            let rolled_back = session.rollback().await;
            self.finish("rollback");
            rolled_back?;
            return Err(PersistenceError::Validation(format!(
                "工作单元 {} 中有写操作失败，已回滚: {reason}",
                self.id
            )));
        }
        session.commit().await?;
        self.finish("commit");
        Ok(())
    }

    /// 回滚事务
    pub async fn rollback(&mut self) -> Result<()> {
        let session = self.session.take().ok_or_else(|| self.finished_error())?;
        let result = session.rollback().await;
        self.finish("rollback");
        result
    }

    fn finish(&self, outcome: &'static str) {
        metrics::counter!("persistence_unit_of_work_total", "outcome" => outcome).increment(1);
        info!(
            uow = %self.id,
            outcome,
            elapsed_ms = self.started.elapsed().as_millis() as u64,
            "工作单元结束"
        );
    }
}

impl Drop for UnitOfWork {
    fn drop(&mut self) {
        if self.session.is_some() {
            warn!(uow = %self.id, "工作单元未提交即被丢弃，事务将回滚");
            metrics::counter!("persistence_unit_of_work_total", "outcome" => "dropped")
                .increment(1);
        }
    }
}

impl std::fmt::Debug for UnitOfWork {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UnitOfWork")
            .field("id", &self.id)
            .field("provider", &self.provider)
            .field("actor", &self.actor)
            .field("active", &self.is_active())
            .field("failed", &self.is_failed())
            .finish()
    }
}
