//! 通用 SQL 仓储
//!
//! `SqlRepository<E, D>` 为任意实体实现 `Repository<E>`，方言 `D` 决定它服务的后端。
//! 各聚合的专用接口也实现在同一类型上（见各 `*_repo` 模块）。

use std::any::type_name;
use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, instrument, warn};

use super::{PagedList, Repository};
use crate::backend::{BulkBuffer, BulkLoadSummary, BulkRowError, Session};
use crate::entity::{Audit, Entity, KEY_COLUMN, Record, SelectColumn, Tracked};
use crate::error::{PersistenceError, Result};
use crate::hooks::{AfterMutation, BeforeMutation, HookPipeline, MutationContext, MutationKind};
use crate::query::sparse::{self, qualify};
use crate::query::{Dialect, Direction, ReadMode, SqlBuilder};
use crate::uow::UnitOfWork;

/// 单表查询中的表别名
pub(crate) const ALIAS: &str = "t";

/// 通用 SQL 仓储
pub struct SqlRepository<E, D> {
    hooks: Arc<HookPipeline>,
    _marker: PhantomData<fn() -> (E, D)>,
}

impl<E, D> Clone for SqlRepository<E, D> {
    fn clone(&self) -> Self {
        Self {
            hooks: Arc::clone(&self.hooks),
            _marker: PhantomData,
        }
    }
}

impl<E: Entity, D: Dialect> SqlRepository<E, D> {
    pub fn new(hooks: Arc<HookPipeline>) -> Self {
        Self {
            hooks,
            _marker: PhantomData,
        }
    }

    /// 同一方言、共用钩子管线的其他实体仓储
    pub(crate) fn sibling<F: Entity>(&self) -> SqlRepository<F, D> {
        SqlRepository::new(Arc::clone(&self.hooks))
    }

    /// 取得工作单元的会话，并确认它属于本仓储的后端
    pub(crate) fn session(uow: &mut UnitOfWork) -> Result<&mut dyn Session> {
        if uow.provider() != D::PROVIDER {
            return Err(PersistenceError::ProviderResolution {
                interface: type_name::<Self>(),
                provider: uow.provider(),
            });
        }
        uow.session()
    }

    /// `SELECT t.col AS t__col, ... FROM {from}`，`from` 中须以 `t` 作为本实体的别名
    pub(crate) fn select_from(from: &str, distinct: bool) -> (String, Vec<SelectColumn>) {
        let (list, columns) = sparse::select_columns::<E>(Some(ALIAS));
        let distinct = if distinct { "DISTINCT " } else { "" };
        (format!("SELECT {distinct}{list} FROM {from}"), columns)
    }

    fn own_table() -> String {
        format!("{} {ALIAS}", E::TABLE)
    }

    pub(crate) fn decode(record: &Record, prefix: &str) -> Result<Tracked<E>> {
        let view = record.scoped(prefix);
        let id = view.int(KEY_COLUMN)?;
        Ok(Tracked::loaded(id, E::from_record(&view)?))
    }

    /// 按模板查询并解码为实体
    pub(crate) async fn fetch(
        &self,
        uow: &mut UnitOfWork,
        template: &str,
        columns: &[SelectColumn],
        builder: &SqlBuilder,
    ) -> Result<Vec<Tracked<E>>> {
        let stmt = builder.render::<D>(template);
        let records = Self::session(uow)?.fetch_all(&stmt, columns).await?;
        let prefix = format!("{ALIAS}__");
        records
            .iter()
            .map(|record| Self::decode(record, &prefix))
            .collect()
    }

    /// 单表查询，按主键倒序
    pub(crate) async fn select(
        &self,
        uow: &mut UnitOfWork,
        builder: &mut SqlBuilder,
    ) -> Result<Vec<Tracked<E>>> {
        self.select_joined(uow, "", false, builder).await
    }

    /// 经由关联表筛选本实体
    ///
    /// `joins` 追加在 `FROM table t` 之后，只返回本实体的列。
    pub(crate) async fn select_joined(
        &self,
        uow: &mut UnitOfWork,
        joins: &str,
        distinct: bool,
        builder: &mut SqlBuilder,
    ) -> Result<Vec<Tracked<E>>> {
        let from = format!("{} {joins}", Self::own_table());
        let (select, columns) = Self::select_from(from.trim_end(), distinct);
        builder.order_by(qualify(Some(ALIAS), KEY_COLUMN), Direction::Desc);
        let template = format!("{select} /**where**/ /**orderby**/");
        self.fetch(uow, &template, &columns, builder).await
    }

    /// 按唯一键查询单个实体
    pub(crate) async fn find_one(
        &self,
        uow: &mut UnitOfWork,
        builder: &mut SqlBuilder,
    ) -> Result<Option<Tracked<E>>> {
        Ok(self.select(uow, builder).await?.into_iter().next())
    }

    /// 按单列精确匹配查询单个实体
    pub(crate) async fn find_by(
        &self,
        uow: &mut UnitOfWork,
        column: &str,
        value: impl Into<crate::entity::SqlValue>,
    ) -> Result<Option<Tracked<E>>> {
        let mut builder = SqlBuilder::new();
        builder.where_eq(qualify(Some(ALIAS), column), value);
        self.find_one(uow, &mut builder).await
    }

    /// 按单列精确匹配查询全部实体
    pub(crate) async fn list_by(
        &self,
        uow: &mut UnitOfWork,
        column: &str,
        value: impl Into<crate::entity::SqlValue>,
    ) -> Result<Vec<Tracked<E>>> {
        let mut builder = SqlBuilder::new();
        builder.where_eq(qualify(Some(ALIAS), column), value);
        self.select(uow, &mut builder).await
    }

    /// 分页查询：计数与取数共用同一组谓词
    async fn paged(
        &self,
        uow: &mut UnitOfWork,
        mut builder: SqlBuilder,
        page_number: i64,
        page_size: i64,
    ) -> Result<PagedList<Tracked<E>>> {
        let (page_number, page_size) =
            clamp_page(page_number, page_size, uow.settings().max_page_size);

        let count = builder.render::<D>(&format!(
            "SELECT COUNT(*) FROM {} /**where**/",
            Self::own_table()
        ));
        let total_count = Self::session(uow)?
            .fetch_scalar(&count)
            .await?
            .unwrap_or_default();

        let (select, columns) = Self::select_from(&Self::own_table(), false);
        builder
            .order_by(qualify(Some(ALIAS), KEY_COLUMN), Direction::Desc)
            .paginate(page_size, (page_number - 1).saturating_mul(page_size));
        let template = format!("{select} /**where**/ /**orderby**/ /**paging**/");
        let items = self.fetch(uow, &template, &columns, &builder).await?;

        Ok(PagedList {
            items,
            total_count,
            page_number,
            page_size,
        })
    }

    fn filter_builder(filter: &E) -> SqlBuilder {
        let mut builder = SqlBuilder::new();
        sparse::sparse_filter(&mut builder, Some(ALIAS), filter);
        builder
    }

    /// 运行写入前钩子，返回盖章后的审计字段
    fn before_mutation(&self, context: MutationContext<'_>, audit: &Audit) -> Result<Audit> {
        let mut audit = audit.clone();
        self.hooks.run_before(&mut BeforeMutation {
            context,
            audit: &mut audit,
        })?;
        Ok(audit)
    }

    fn after_mutation(&self, context: MutationContext<'_>, rows_affected: u64) {
        self.hooks.run_after(&AfterMutation {
            context,
            rows_affected,
        });
    }

    /// 按谓词批量更新（附带修改审计列），返回受影响行数
    pub(crate) async fn update_where(
        &self,
        uow: &mut UnitOfWork,
        mut builder: SqlBuilder,
    ) -> Result<u64> {
        let actor = uow.actor().to_string();
        let context = set_based(E::NAME, MutationKind::Update, &actor);
        let result = async {
            let audit = self.before_mutation(context, &Audit::default())?;
            builder
                .set("modified_by", &audit.modified_by)
                .set("modified_date_time", audit.modified_date_time);

            let stmt = builder.render::<D>(&format!("UPDATE {} /**set**/ /**where**/", E::TABLE));
            let rows = Self::session(uow)?.execute(&stmt).await?;
            self.after_mutation(context, rows);
            Ok::<_, PersistenceError>(rows)
        }
        .await;
        uow.track(result)
    }

    /// 按谓词更新单行并返回指定列的新值，没有命中行时返回 `None`
    pub(crate) async fn update_returning(
        &self,
        uow: &mut UnitOfWork,
        mut builder: SqlBuilder,
        returning: &str,
    ) -> Result<Option<i64>> {
        let actor = uow.actor().to_string();
        let context = set_based(E::NAME, MutationKind::Update, &actor);
        let result = async {
            let audit = self.before_mutation(context, &Audit::default())?;
            builder
                .set("modified_by", &audit.modified_by)
                .set("modified_date_time", audit.modified_date_time);

            let stmt = builder.render::<D>(&format!(
                "UPDATE {} /**set**/ /**where**/ RETURNING {returning}",
                E::TABLE
            ));
            let value = Self::session(uow)?.fetch_scalar(&stmt).await?;
            self.after_mutation(context, u64::from(value.is_some()));
            Ok::<_, PersistenceError>(value)
        }
        .await;
        uow.track(result)
    }

    /// 按谓词批量删除，返回受影响行数
    pub(crate) async fn delete_where(&self, uow: &mut UnitOfWork, builder: SqlBuilder) -> Result<u64> {
        let actor = uow.actor().to_string();
        let context = set_based(E::NAME, MutationKind::Delete, &actor);
        let result = async {
            self.before_mutation(context, &Audit::default())?;

            let stmt = builder.render::<D>(&format!("DELETE FROM {} /**where**/", E::TABLE));
            let rows = Self::session(uow)?.execute(&stmt).await?;
            self.after_mutation(context, rows);
            Ok::<_, PersistenceError>(rows)
        }
        .await;
        uow.track(result)
    }

    /// 批量导入
    ///
    /// 逐行盖章与自检后暂存，不合格的行通过 `on_error` 报告并跳过，其余交给后端快速通道。
    pub(crate) async fn bulk_insert(
        &self,
        uow: &mut UnitOfWork,
        rows: &[E],
        on_error: &mut (dyn FnMut(BulkRowError) + Send),
    ) -> Result<BulkLoadSummary> {
        let actor = uow.actor().to_string();
        let context = MutationContext {
            entity: E::NAME,
            kind: MutationKind::Insert,
            id: None,
            is_changed: true,
            actor: &actor,
        };

        let mut buffer = BulkBuffer::for_entity::<E>();
        let mut rejected = 0;
        for (index, row) in rows.iter().enumerate() {
            let staged = self
                .before_mutation(context, row.audit())
                .map_err(|err| BulkRowError {
                    row: index,
                    reason: err.to_string(),
                })
                .and_then(|audit| {
                    let mut value = row.clone();
                    *value.audit_mut() = audit;
                    buffer.stage_entity(index, &value)
                });
            if let Err(err) = staged {
                warn!(entity = E::NAME, row = err.row, reason = %err.reason, "批量导入行被拒绝");
                rejected += 1;
                on_error(err);
            }
        }

        let staged = buffer.len();
        let chunk_size = uow.settings().bulk_chunk_size;
        let mut backend_rejected = 0;
        let loaded = {
            let mut count_rejections = |err: BulkRowError| {
                backend_rejected += 1;
                on_error(err);
            };
            let result = match Self::session(uow) {
                Ok(session) => {
                    session
                        .bulk_load(&buffer, chunk_size, &mut count_rejections)
                        .await
                }
                Err(err) => Err(err),
            };
            uow.track(result)?
        };
        let rejected = rejected + backend_rejected;

        metrics::counter!("persistence_bulk_rows_total", "result" => "loaded").increment(loaded);
        metrics::counter!("persistence_bulk_rows_total", "result" => "rejected")
            .increment(rejected as u64);
        self.after_mutation(context, loaded);

        Ok(BulkLoadSummary {
            staged,
            loaded,
            rejected,
        })
    }
}

fn set_based<'a>(entity: &'static str, kind: MutationKind, actor: &'a str) -> MutationContext<'a> {
    MutationContext {
        entity,
        kind,
        id: None,
        is_changed: true,
        actor,
    }
}

/// 规范化分页参数：页码与页大小至少为 1，页大小不超过上限
pub(crate) fn clamp_page(page_number: i64, page_size: i64, max_page_size: i64) -> (i64, i64) {
    (page_number.max(1), page_size.clamp(1, max_page_size.max(1)))
}

#[async_trait]
impl<E: Entity, D: Dialect> Repository<E> for SqlRepository<E, D> {
    #[instrument(skip_all, fields(entity = E::NAME))]
    async fn add(&self, uow: &mut UnitOfWork, entity: &mut Tracked<E>) -> Result<()> {
        if !entity.is_new() {
            return uow.track(Err(PersistenceError::Validation(format!(
                "{} id={} 已持久化，不能重复插入",
                E::NAME,
                entity.id()
            ))));
        }
        let actor = uow.actor().to_string();
        let context = MutationContext {
            entity: E::NAME,
            kind: MutationKind::Insert,
            id: Some(0),
            is_changed: entity.is_changed(),
            actor: &actor,
        };
        let result = async {
            let audit = self.before_mutation(context, entity.audit())?;
            entity.validate().map_err(PersistenceError::Validation)?;

            let mut value = (**entity).clone();
            *value.audit_mut() = audit;
            let stmt = sparse::insert_statement::<D, E>(&value);
            let id = Self::session(uow)?
                .fetch_scalar(&stmt)
                .await?
                .ok_or_else(|| PersistenceError::decode(KEY_COLUMN, "插入未返回主键"))?;

            *entity.audit_mut() = value.audit().clone();
            entity.assign_id(id);
            entity.accept_changes();
            self.after_mutation(MutationContext { id: Some(id), ..context }, 1);
            Ok::<_, PersistenceError>(())
        }
        .await;
        uow.track(result)
    }

    #[instrument(skip_all, fields(entity = E::NAME, id = entity.id()))]
    async fn update(&self, uow: &mut UnitOfWork, entity: &mut Tracked<E>) -> Result<()> {
        let actor = uow.actor().to_string();
        let context = MutationContext {
            entity: E::NAME,
            kind: MutationKind::Update,
            id: Some(entity.id()),
            is_changed: entity.is_changed(),
            actor: &actor,
        };
        let result = async {
            let audit = self.before_mutation(context, entity.audit())?;
            entity.validate().map_err(PersistenceError::Validation)?;

            let Some(stmt) = sparse::update_statement::<D, E>(entity, &audit) else {
                // 审计列由钩子维护，调用方对它们的改动不落库
                debug!("没有业务列变更，跳过 UPDATE");
                entity.reject_changes();
                return Ok(());
            };
            let rows = Self::session(uow)?.execute(&stmt).await?;
            if rows == 0 {
                return Err(PersistenceError::conflict(E::NAME, entity.id()));
            }

            *entity.audit_mut() = audit;
            entity.accept_changes();
            self.after_mutation(context, rows);
            Ok::<_, PersistenceError>(())
        }
        .await;
        uow.track(result)
    }

    #[instrument(skip(self, uow), fields(entity = E::NAME))]
    async fn delete(&self, uow: &mut UnitOfWork, id: i64) -> Result<()> {
        let actor = uow.actor().to_string();
        let context = MutationContext {
            entity: E::NAME,
            kind: MutationKind::Delete,
            id: Some(id),
            is_changed: false,
            actor: &actor,
        };
        let result = async {
            self.before_mutation(context, &Audit::default())?;

            let stmt = sparse::delete_statement::<D, E>(id);
            let rows = Self::session(uow)?.execute(&stmt).await?;
            if rows == 0 {
                return Err(PersistenceError::conflict(E::NAME, id));
            }
            self.after_mutation(context, rows);
            Ok::<_, PersistenceError>(())
        }
        .await;
        uow.track(result)
    }

    #[instrument(skip(self, uow), fields(entity = E::NAME))]
    async fn get_by_id(
        &self,
        uow: &mut UnitOfWork,
        id: i64,
        mode: ReadMode,
    ) -> Result<Tracked<E>> {
        let (select, columns) = Self::select_from(&Self::own_table(), false);
        let template = format!("{select} /**where**/{}", D::lock_clause(mode));
        let mut builder = SqlBuilder::new();
        builder.where_eq(qualify(Some(ALIAS), KEY_COLUMN), id);

        self.fetch(uow, &template, &columns, &builder)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| PersistenceError::not_found(E::NAME, id))
    }

    #[instrument(skip_all, fields(entity = E::NAME))]
    async fn get_by_params(&self, uow: &mut UnitOfWork, filter: &E) -> Result<Vec<Tracked<E>>> {
        let mut builder = Self::filter_builder(filter);
        self.select(uow, &mut builder).await
    }

    #[instrument(skip_all, fields(entity = E::NAME))]
    async fn get_all(&self, uow: &mut UnitOfWork) -> Result<Vec<Tracked<E>>> {
        self.select(uow, &mut SqlBuilder::new()).await
    }

    #[instrument(skip(self, uow), fields(entity = E::NAME))]
    async fn get_all_paged_list(
        &self,
        uow: &mut UnitOfWork,
        page_number: i64,
        page_size: i64,
    ) -> Result<PagedList<Tracked<E>>> {
        self.paged(uow, SqlBuilder::new(), page_number, page_size)
            .await
    }

    #[instrument(skip(self, uow, filter), fields(entity = E::NAME))]
    async fn get_by_params_paged_list(
        &self,
        uow: &mut UnitOfWork,
        filter: &E,
        page_number: i64,
        page_size: i64,
    ) -> Result<PagedList<Tracked<E>>> {
        self.paged(uow, Self::filter_builder(filter), page_number, page_size)
            .await
    }
}
