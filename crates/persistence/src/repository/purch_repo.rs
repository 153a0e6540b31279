//! 收货单仓储

use async_trait::async_trait;
use tracing::instrument;

use super::fold::{HEADER_ALIAS, LineJoin};
use super::sql::{ALIAS, SqlRepository};
use super::traits::{BulkErrorCallback, PurchLineRepository, PurchTableRepository, Repository};
use super::HeaderWithLines;
use crate::backend::BulkLoadSummary;
use crate::entity::{Entity, KEY_COLUMN, Tracked};
use crate::error::{PersistenceError, Result};
use crate::models::{PurchLine, PurchTable};
use crate::query::sparse::{qualify, sparse_filter};
use crate::query::{Dialect, Direction, SqlBuilder};
use crate::uow::UnitOfWork;

const PURCH_LINES: LineJoin = LineJoin {
    foreign_key: "purch_table_id",
    line_order: "line_num",
};

#[async_trait]
impl<D: Dialect> PurchTableRepository for SqlRepository<PurchTable, D> {
    async fn get_by_packing_slip_id(
        &self,
        uow: &mut UnitOfWork,
        packing_slip_id: &str,
    ) -> Result<Option<Tracked<PurchTable>>> {
        self.find_by(uow, "packing_slip_id", packing_slip_id).await
    }

    #[instrument(skip(self, uow))]
    async fn get_with_lines(
        &self,
        uow: &mut UnitOfWork,
        id: i64,
    ) -> Result<HeaderWithLines<PurchTable, PurchLine>> {
        let mut builder = SqlBuilder::new();
        builder.where_eq(qualify(Some(HEADER_ALIAS), KEY_COLUMN), id);
        PURCH_LINES
            .fetch::<PurchTable, PurchLine, D>(uow, builder)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| PersistenceError::not_found(PurchTable::NAME, id))
    }

    #[instrument(skip_all)]
    async fn get_all_with_lines(
        &self,
        uow: &mut UnitOfWork,
        filter: &PurchTable,
    ) -> Result<Vec<HeaderWithLines<PurchTable, PurchLine>>> {
        let mut builder = SqlBuilder::new();
        sparse_filter(&mut builder, Some(HEADER_ALIAS), filter);
        PURCH_LINES
            .fetch::<PurchTable, PurchLine, D>(uow, builder)
            .await
    }

    #[instrument(skip_all, fields(lines = order.lines.len()))]
    async fn add_with_lines(
        &self,
        uow: &mut UnitOfWork,
        order: &mut HeaderWithLines<PurchTable, PurchLine>,
    ) -> Result<()> {
        self.add(uow, &mut order.header).await?;
        let lines = self.sibling::<PurchLine>();
        let header_id = order.header.id();
        for line in &mut order.lines {
            line.purch_table_id = header_id;
            lines.add(uow, line).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl<D: Dialect> PurchLineRepository for SqlRepository<PurchLine, D> {
    async fn get_by_purch_table_id(
        &self,
        uow: &mut UnitOfWork,
        purch_table_id: i64,
    ) -> Result<Vec<Tracked<PurchLine>>> {
        let mut builder = SqlBuilder::new();
        builder
            .where_eq(qualify(Some(ALIAS), "purch_table_id"), purch_table_id)
            .order_by(qualify(Some(ALIAS), "line_num"), Direction::Asc);
        self.select(uow, &mut builder).await
    }

    #[instrument(skip_all, fields(rows = lines.len()))]
    async fn bulk_add(
        &self,
        uow: &mut UnitOfWork,
        lines: &[PurchLine],
        on_error: BulkErrorCallback<'_>,
    ) -> Result<BulkLoadSummary> {
        self.bulk_insert(uow, lines, on_error).await
    }
}
