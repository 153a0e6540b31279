//! 工单仓储
//!
//! 工单以外部系统下发的 `external_work_order_id` 作为业务唯一键。

use async_trait::async_trait;
use tracing::instrument;

use super::fold::{HEADER_ALIAS, LineJoin};
use super::sql::{ALIAS, SqlRepository};
use super::traits::{BulkErrorCallback, Repository, WorkOrderLineRepository, WorkOrderRepository};
use super::HeaderWithLines;
use crate::backend::BulkLoadSummary;
use crate::entity::{Entity, KEY_COLUMN, Tracked};
use crate::error::{PersistenceError, Result};
use crate::models::{WorkOrder, WorkOrderLine};
use crate::query::sparse::{qualify, sparse_filter};
use crate::query::{Dialect, Direction, SqlBuilder};
use crate::uow::UnitOfWork;

const WORK_ORDER_LINES: LineJoin = LineJoin {
    foreign_key: "work_order_id",
    line_order: "line_num",
};

#[async_trait]
impl<D: Dialect> WorkOrderRepository for SqlRepository<WorkOrder, D> {
    async fn get_by_external_id(
        &self,
        uow: &mut UnitOfWork,
        external_work_order_id: &str,
    ) -> Result<Option<Tracked<WorkOrder>>> {
        self.find_by(uow, "external_work_order_id", external_work_order_id)
            .await
    }

    #[instrument(skip(self, uow))]
    async fn get_with_lines(
        &self,
        uow: &mut UnitOfWork,
        id: i64,
    ) -> Result<HeaderWithLines<WorkOrder, WorkOrderLine>> {
        let mut builder = SqlBuilder::new();
        builder.where_eq(qualify(Some(HEADER_ALIAS), KEY_COLUMN), id);
        WORK_ORDER_LINES
            .fetch::<WorkOrder, WorkOrderLine, D>(uow, builder)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| PersistenceError::not_found(WorkOrder::NAME, id))
    }

    #[instrument(skip_all)]
    async fn get_all_with_lines(
        &self,
        uow: &mut UnitOfWork,
        filter: &WorkOrder,
    ) -> Result<Vec<HeaderWithLines<WorkOrder, WorkOrderLine>>> {
        let mut builder = SqlBuilder::new();
        sparse_filter(&mut builder, Some(HEADER_ALIAS), filter);
        WORK_ORDER_LINES
            .fetch::<WorkOrder, WorkOrderLine, D>(uow, builder)
            .await
    }

    #[instrument(skip_all, fields(lines = order.lines.len()))]
    async fn add_with_lines(
        &self,
        uow: &mut UnitOfWork,
        order: &mut HeaderWithLines<WorkOrder, WorkOrderLine>,
    ) -> Result<()> {
        self.add(uow, &mut order.header).await?;
        let lines = self.sibling::<WorkOrderLine>();
        let header_id = order.header.id();
        for line in &mut order.lines {
            line.work_order_id = header_id;
            lines.add(uow, line).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl<D: Dialect> WorkOrderLineRepository for SqlRepository<WorkOrderLine, D> {
    async fn get_by_work_order_id(
        &self,
        uow: &mut UnitOfWork,
        work_order_id: i64,
    ) -> Result<Vec<Tracked<WorkOrderLine>>> {
        let mut builder = SqlBuilder::new();
        builder
            .where_eq(qualify(Some(ALIAS), "work_order_id"), work_order_id)
            .order_by(qualify(Some(ALIAS), "line_num"), Direction::Asc);
        self.select(uow, &mut builder).await
    }

    #[instrument(skip_all, fields(rows = lines.len()))]
    async fn bulk_add(
        &self,
        uow: &mut UnitOfWork,
        lines: &[WorkOrderLine],
        on_error: BulkErrorCallback<'_>,
    ) -> Result<BulkLoadSummary> {
        self.bulk_insert(uow, lines, on_error).await
    }
}
