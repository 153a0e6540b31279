//! 仓储层
//!
//! - `traits`：业务层依赖的仓储接口
//! - `sql`：基于方言的通用实现，各聚合的专用查询在 `*_repo` 中补充
//! - `factory`：按存储提供方解析接口实现

mod factory;
mod fold;
mod permission_repo;
mod purch_repo;
mod sequence_repo;
mod sql;
mod traits;
mod user_repo;
mod work_order_repo;

use serde::Serialize;

use crate::entity::{Entity, Tracked};

pub use factory::RepositoryFactory;
pub use sql::SqlRepository;
pub use traits::{
    AccessRuleRepository, BulkErrorCallback, NumberSequenceRepository, PermissionRepository,
    PurchLineRepository, PurchTableRepository, RefreshTokenRepository, Repository,
    RoleRepository, UserRepository, UserRoleRepository, WorkOrderLineRepository,
    WorkOrderRepository,
};

/// 分页结果
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PagedList<T> {
    pub items: Vec<T>,
    /// 满足条件的总行数（与分页无关）
    pub total_count: i64,
    pub page_number: i64,
    pub page_size: i64,
}

impl<T> PagedList<T> {
    pub fn total_pages(&self) -> i64 {
        if self.page_size > 0 {
            (self.total_count + self.page_size - 1) / self.page_size
        } else {
            0
        }
    }

    pub fn has_next(&self) -> bool {
        self.page_number < self.total_pages()
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> PagedList<U> {
        PagedList {
            items: self.items.into_iter().map(f).collect(),
            total_count: self.total_count,
            page_number: self.page_number,
            page_size: self.page_size,
        }
    }
}

/// 单据头及其行
#[derive(Debug, Clone, PartialEq)]
pub struct HeaderWithLines<H: Entity, L: Entity> {
    pub header: Tracked<H>,
    pub lines: Vec<Tracked<L>>,
}

impl<H: Entity, L: Entity> HeaderWithLines<H, L> {
    pub fn new(header: Tracked<H>) -> Self {
        Self {
            header,
            lines: Vec::new(),
        }
    }

    pub fn with_lines(header: H, lines: impl IntoIterator<Item = L>) -> Self {
        Self {
            header: Tracked::new(header),
            lines: lines.into_iter().map(Tracked::new).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paged_list_pages() {
        let page = PagedList {
            items: vec![1, 2, 3],
            total_count: 7,
            page_number: 2,
            page_size: 3,
        };
        assert_eq!(page.total_pages(), 3);
        assert!(page.has_next());

        let page = page.map(|n| n * 10);
        assert_eq!(page.items, vec![10, 20, 30]);

        let empty: PagedList<i32> = PagedList {
            items: vec![],
            total_count: 0,
            page_number: 1,
            page_size: 10,
        };
        assert_eq!(empty.total_pages(), 0);
        assert!(!empty.has_next());
    }

    #[test]
    fn test_paged_list_serializes_camel_case() {
        let page = PagedList {
            items: vec!["a"],
            total_count: 1,
            page_number: 1,
            page_size: 20,
        };
        let json = serde_json::to_value(&page).unwrap();
        assert_eq!(json["totalCount"], 1);
        assert_eq!(json["pageNumber"], 1);
    }
}
