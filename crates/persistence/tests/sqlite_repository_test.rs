//! 仓储集成测试（SQLite 内存库）
//!
//! 覆盖稀疏更新、稀疏过滤、分页、头-行聚合、批量导入、多对多关联、
//! 序列递增、令牌撤销以及工作单元的提交与回滚。
//!
//! ## 运行方式
//!
//! ```bash
//! cargo test -p erp-persistence --test sqlite_repository_test
//! ```

mod common;

use chrono::{Duration, TimeZone, Utc};
use common::{ACTOR, setup_sqlite};
use erp_persistence::query::sparse;
use erp_persistence::{
    AccessRule, AccessRuleRepository, BulkRowError, HeaderWithLines, NumberSequence,
    NumberSequenceRepository, Permission, PermissionRepository, PersistenceError, PgDialect, PurchLine,
    PurchLineRepository, PurchStatus, PurchTable, PurchTableRepository, ReadMode, RefreshToken,
    RefreshTokenRepository, Repository, Role, RoleRepository, Tracked, User, UserRepository,
    UserRoleRepository, WorkOrder, WorkOrderLine, WorkOrderLineRepository, WorkOrderRepository,
    WorkOrderStatus,
};
use erp_shared::Provider;

// ==================== 辅助函数 ====================

fn purch_table(slip: &str, vendor: &str) -> PurchTable {
    PurchTable {
        packing_slip_id: slip.to_string(),
        purch_id: format!("PO-{slip}"),
        vendor_account: "V-100".to_string(),
        vendor_name: vendor.to_string(),
        warehouse: "WH1".to_string(),
        purch_status: Some(PurchStatus::Open),
        ..Default::default()
    }
}

fn purch_line(line_num: i64, item_id: &str, qty: f64) -> PurchLine {
    PurchLine {
        line_num,
        item_id: item_id.to_string(),
        item_name: format!("Item {item_id}"),
        qty_ordered: qty,
        unit: "EA".to_string(),
        ..Default::default()
    }
}

// ==================== 稀疏更新 ====================

#[tokio::test]
async fn test_sparse_update_writes_only_changed_columns() {
    let env = setup_sqlite().await;
    let repo = env
        .factory
        .resolve::<dyn PurchTableRepository>(Provider::Sqlite)
        .unwrap();

    let mut uow = env.db.begin(&env.identity).await.unwrap();
    let mut header = Tracked::new(purch_table("PS001", "Acme Supplies"));
    repo.add(&mut uow, &mut header).await.unwrap();
    assert!(!header.is_new());
    assert!(!header.is_changed());
    assert_eq!(header.audit.created_by, ACTOR);
    uow.commit().await.unwrap();

    let mut uow = env.db.begin(&env.identity).await.unwrap();
    let mut loaded = repo
        .get_by_id(&mut uow, header.id(), ReadMode::ForUpdate)
        .await
        .unwrap();
    assert!(!loaded.is_changed());
    let created_at = loaded.audit.created_date_time;

    loaded.purch_status = Some(PurchStatus::Closed);
    assert!(loaded.is_changed());
    let changes = loaded.changes();
    assert_eq!(changes.len(), 1);
    assert_eq!(changes[0].column, "purch_status");

    let stmt = sparse::update_statement::<PgDialect, _>(&loaded, &loaded.audit).unwrap();
    assert_eq!(
        stmt.sql,
        "UPDATE purch_table SET purch_status = $1, modified_by = $2, modified_date_time = $3 \
         WHERE id = $4"
    );

    repo.update(&mut uow, &mut loaded).await.unwrap();
    assert!(!loaded.is_changed());
    uow.commit().await.unwrap();

    let mut uow = env.db.begin(&env.identity).await.unwrap();
    let reloaded = repo
        .get_by_id(&mut uow, header.id(), ReadMode::Shared)
        .await
        .unwrap();
    assert_eq!(reloaded.purch_status, Some(PurchStatus::Closed));
    assert_eq!(reloaded.packing_slip_id, "PS001");
    assert_eq!(reloaded.vendor_name, "Acme Supplies");
    assert_eq!(reloaded.audit.created_by, ACTOR);
    assert_eq!(reloaded.audit.created_date_time, created_at);
    assert_eq!(reloaded.audit.modified_by, ACTOR);
    assert!(reloaded.audit.modified_date_time >= created_at);
    uow.commit().await.unwrap();
}

#[tokio::test]
async fn test_update_rejects_clean_and_unsaved_entities() {
    let env = setup_sqlite().await;
    let repo = env
        .factory
        .resolve::<dyn PurchTableRepository>(Provider::Sqlite)
        .unwrap();
    let mut uow = env.db.begin(&env.identity).await.unwrap();

    let mut unsaved = Tracked::new(purch_table("PS-NEW", "Acme"));
    let err = repo.update(&mut uow, &mut unsaved).await.unwrap_err();
    assert_eq!(err.code(), "VALIDATION_ERROR");

    repo.add(&mut uow, &mut unsaved).await.unwrap();
    let err = repo.update(&mut uow, &mut unsaved).await.unwrap_err();
    assert_eq!(err.code(), "VALIDATION_ERROR");

    let err = repo.add(&mut uow, &mut unsaved).await.unwrap_err();
    assert_eq!(err.code(), "VALIDATION_ERROR");

    let mut invalid = Tracked::new(purch_table("", "Acme"));
    let err = repo.add(&mut uow, &mut invalid).await.unwrap_err();
    assert_eq!(err.code(), "VALIDATION_ERROR");
    assert!(invalid.is_new());
}

#[tokio::test]
async fn test_audit_only_change_is_discarded() {
    let env = setup_sqlite().await;
    let repo = env
        .factory
        .resolve::<dyn PurchTableRepository>(Provider::Sqlite)
        .unwrap();
    let mut uow = env.db.begin(&env.identity).await.unwrap();

    let mut header = Tracked::new(purch_table("PS-AUD", "Acme"));
    repo.add(&mut uow, &mut header).await.unwrap();
    let mut loaded = repo
        .get_by_id(&mut uow, header.id(), ReadMode::Shared)
        .await
        .unwrap();

    loaded.audit.created_by = "mallory".to_string();
    assert!(loaded.is_changed());
    repo.update(&mut uow, &mut loaded).await.unwrap();
    assert!(!loaded.is_changed());
    assert_eq!(loaded.audit.created_by, ACTOR);
    assert!(!uow.is_failed());

    let stored = repo
        .get_by_id(&mut uow, header.id(), ReadMode::Shared)
        .await
        .unwrap();
    assert_eq!(stored.audit.created_by, ACTOR);
    uow.commit().await.unwrap();
}

#[tokio::test]
async fn test_delete_and_conflict() {
    let env = setup_sqlite().await;
    let repo = env
        .factory
        .resolve::<dyn PurchTableRepository>(Provider::Sqlite)
        .unwrap();
    let mut uow = env.db.begin(&env.identity).await.unwrap();

    let mut header = Tracked::new(purch_table("PS-DEL", "Acme"));
    repo.add(&mut uow, &mut header).await.unwrap();
    let mut stale = repo
        .get_by_id(&mut uow, header.id(), ReadMode::Shared)
        .await
        .unwrap();

    repo.delete(&mut uow, header.id()).await.unwrap();
    let err = repo
        .get_by_id(&mut uow, header.id(), ReadMode::Shared)
        .await
        .unwrap_err();
    assert_eq!(err.code(), "NOT_FOUND");

    let err = repo.delete(&mut uow, header.id()).await.unwrap_err();
    assert_eq!(err.code(), "CONFLICT");

    stale.warehouse = "WH2".to_string();
    let err = repo.update(&mut uow, &mut stale).await.unwrap_err();
    assert_eq!(err.code(), "CONFLICT");
    assert!(stale.is_changed());
}

// ==================== 过滤与分页 ====================

#[tokio::test]
async fn test_sparse_filter_and_paging() {
    let env = setup_sqlite().await;
    let repo = env
        .factory
        .resolve::<dyn PurchTableRepository>(Provider::Sqlite)
        .unwrap();
    let mut uow = env.db.begin(&env.identity).await.unwrap();

    for n in 1..=7 {
        let vendor = if n % 2 == 0 { "Acme Supplies" } else { "Globex" };
        let mut header = purch_table(&format!("PS-P{n}"), vendor);
        if n == 7 {
            header.purch_status = Some(PurchStatus::Received);
        }
        repo.add(&mut uow, &mut Tracked::new(header)).await.unwrap();
    }

    let all = repo.get_all(&mut uow).await.unwrap();
    assert_eq!(all.len(), 7);
    assert!(all.windows(2).all(|w| w[0].id() > w[1].id()));

    let unfiltered = repo
        .get_by_params(&mut uow, &PurchTable::default())
        .await
        .unwrap();
    assert_eq!(unfiltered, all);

    let filter = PurchTable {
        vendor_name: "acme".to_string(),
        ..Default::default()
    };
    let acme = repo.get_by_params(&mut uow, &filter).await.unwrap();
    assert_eq!(acme.len(), 3);
    assert!(acme.iter().all(|h| h.vendor_name == "Acme Supplies"));

    let filter = PurchTable {
        purch_status: Some(PurchStatus::Received),
        ..Default::default()
    };
    let received = repo.get_by_params(&mut uow, &filter).await.unwrap();
    assert_eq!(received.len(), 1);
    assert_eq!(received[0].packing_slip_id, "PS-P7");

    let page = repo.get_all_paged_list(&mut uow, 2, 3).await.unwrap();
    assert_eq!(page.total_count, 7);
    assert_eq!(page.total_pages(), 3);
    let ids: Vec<i64> = page.items.iter().map(Tracked::id).collect();
    let expected: Vec<i64> = all[3..6].iter().map(Tracked::id).collect();
    assert_eq!(ids, expected);

    let last = repo.get_all_paged_list(&mut uow, 3, 3).await.unwrap();
    assert_eq!(last.items.len(), 1);
    assert!(!last.has_next());

    let clamped = repo.get_all_paged_list(&mut uow, 0, 0).await.unwrap();
    assert_eq!((clamped.page_number, clamped.page_size), (1, 1));
    assert_eq!(clamped.items.len(), 1);

    let capped = repo.get_all_paged_list(&mut uow, 1, 5000).await.unwrap();
    assert_eq!(capped.page_size, 100);
    assert_eq!(capped.items.len(), 7);

    let filter = PurchTable {
        vendor_name: "Globex".to_string(),
        ..Default::default()
    };
    let globex = repo
        .get_by_params_paged_list(&mut uow, &filter, 1, 2)
        .await
        .unwrap();
    assert_eq!(globex.total_count, 4);
    assert_eq!(globex.items.len(), 2);
}

#[tokio::test]
async fn test_text_filter_matches_wildcards_literally() {
    let env = setup_sqlite().await;
    let repo = env
        .factory
        .resolve::<dyn PurchTableRepository>(Provider::Sqlite)
        .unwrap();
    let mut uow = env.db.begin(&env.identity).await.unwrap();

    for slip in ["PSX1", "PS_1", "PS%1"] {
        repo.add(&mut uow, &mut Tracked::new(purch_table(slip, "Acme")))
            .await
            .unwrap();
    }

    let slips = |rows: Vec<Tracked<PurchTable>>| -> Vec<String> {
        rows.into_iter().map(|h| h.packing_slip_id.clone()).collect()
    };
    let filter = PurchTable {
        packing_slip_id: "S_1".to_string(),
        ..Default::default()
    };
    let found = repo.get_by_params(&mut uow, &filter).await.unwrap();
    assert_eq!(slips(found), vec!["PS_1"]);

    let filter = PurchTable {
        packing_slip_id: "%".to_string(),
        ..Default::default()
    };
    let found = repo.get_by_params(&mut uow, &filter).await.unwrap();
    assert_eq!(slips(found), vec!["PS%1"]);
    uow.commit().await.unwrap();
}

// ==================== 头-行聚合 ====================

#[tokio::test]
async fn test_purch_order_with_lines() {
    let env = setup_sqlite().await;
    let headers = env
        .factory
        .resolve::<dyn PurchTableRepository>(Provider::Sqlite)
        .unwrap();
    let lines = env
        .factory
        .resolve::<dyn PurchLineRepository>(Provider::Sqlite)
        .unwrap();
    let mut uow = env.db.begin(&env.identity).await.unwrap();

    let mut order = HeaderWithLines::with_lines(
        purch_table("PS-L1", "Acme"),
        [
            purch_line(2, "B-200", 5.0),
            purch_line(1, "A-100", 10.0),
            purch_line(3, "C-300", 1.5),
        ],
    );
    headers.add_with_lines(&mut uow, &mut order).await.unwrap();
    let header_id = order.header.id();
    assert!(order.lines.iter().all(|l| l.purch_table_id == header_id && !l.is_new()));

    let mut empty = Tracked::new(purch_table("PS-L2", "Acme"));
    headers.add(&mut uow, &mut empty).await.unwrap();

    let loaded = headers.get_with_lines(&mut uow, header_id).await.unwrap();
    assert_eq!(loaded.header.packing_slip_id, "PS-L1");
    let line_nums: Vec<i64> = loaded.lines.iter().map(|l| l.line_num).collect();
    assert_eq!(line_nums, vec![1, 2, 3]);
    assert_eq!(loaded.lines[0].item_id, "A-100");
    assert_eq!(loaded.lines[2].qty_ordered, 1.5);

    let all = headers
        .get_all_with_lines(&mut uow, &PurchTable::default())
        .await
        .unwrap();
    assert_eq!(all.len(), 2);
    assert_eq!(all[0].header.id(), empty.id());
    assert!(all[0].lines.is_empty());
    assert_eq!(all[1].lines.len(), 3);

    let by_header = lines
        .get_by_purch_table_id(&mut uow, header_id)
        .await
        .unwrap();
    assert_eq!(by_header.len(), 3);
    assert_eq!(by_header[0].line_num, 1);

    let found = headers
        .get_by_packing_slip_id(&mut uow, "PS-L1")
        .await
        .unwrap();
    assert_eq!(found.map(|h| h.id()), Some(header_id));
    assert!(
        headers
            .get_by_packing_slip_id(&mut uow, "PS-L")
            .await
            .unwrap()
            .is_none()
    );

    let err = headers.get_with_lines(&mut uow, 9999).await.unwrap_err();
    assert_eq!(err.code(), "NOT_FOUND");
}

#[tokio::test]
async fn test_bulk_add_reports_rejected_rows() {
    let env = setup_sqlite().await;
    let headers = env
        .factory
        .resolve::<dyn PurchTableRepository>(Provider::Sqlite)
        .unwrap();
    let lines = env
        .factory
        .resolve::<dyn PurchLineRepository>(Provider::Sqlite)
        .unwrap();
    let mut uow = env.db.begin(&env.identity).await.unwrap();

    let mut header = Tracked::new(purch_table("PS-BULK", "Acme"));
    headers.add(&mut uow, &mut header).await.unwrap();
    let with_header = |mut line: PurchLine| {
        line.purch_table_id = header.id();
        line
    };

    let rows = vec![
        with_header(purch_line(1, "A-100", 1.0)),
        purch_line(2, "ORPHAN", 1.0),
        with_header(purch_line(2, "B-200", 2.0)),
        with_header(purch_line(2, "DUP", 3.0)),
        with_header(purch_line(3, "C-300", 4.0)),
    ];

    let mut errors: Vec<BulkRowError> = Vec::new();
    let summary = lines
        .bulk_add(&mut uow, &rows, &mut |err: BulkRowError| errors.push(err))
        .await
        .unwrap();

    assert_eq!(summary.staged, 4);
    assert_eq!(summary.loaded, 3);
    assert_eq!(summary.rejected, 2);
    let mut rejected_rows: Vec<usize> = errors.iter().map(|e| e.row).collect();
    rejected_rows.sort_unstable();
    assert_eq!(rejected_rows, vec![1, 3]);

    let stored = lines
        .get_by_purch_table_id(&mut uow, header.id())
        .await
        .unwrap();
    assert_eq!(stored.len(), 3);
    assert!(stored.iter().all(|l| l.audit.created_by == ACTOR));
    uow.commit().await.unwrap();
}

#[tokio::test]
async fn test_work_order_with_lines() {
    let env = setup_sqlite().await;
    let orders = env
        .factory
        .resolve::<dyn WorkOrderRepository>(Provider::Sqlite)
        .unwrap();
    let lines = env
        .factory
        .resolve::<dyn WorkOrderLineRepository>(Provider::Sqlite)
        .unwrap();
    let mut uow = env.db.begin(&env.identity).await.unwrap();

    let scheduled = Utc.with_ymd_and_hms(2024, 6, 3, 8, 0, 0).unwrap();
    let mut order = HeaderWithLines::with_lines(
        WorkOrder {
            external_work_order_id: "WO-EXT-1".to_string(),
            title: "Cycle count".to_string(),
            warehouse: "WH1".to_string(),
            status: Some(WorkOrderStatus::Open),
            scheduled_date: Some(scheduled),
            ..Default::default()
        },
        [WorkOrderLine {
            line_num: 1,
            item_id: "A-100".to_string(),
            quantity: 4.0,
            ..Default::default()
        }],
    );
    orders.add_with_lines(&mut uow, &mut order).await.unwrap();
    let order_id = order.header.id();

    let extra = vec![
        WorkOrderLine {
            work_order_id: order_id,
            line_num: 2,
            item_id: "B-200".to_string(),
            quantity: 1.0,
            completed: Some(false),
            ..Default::default()
        },
        WorkOrderLine {
            work_order_id: order_id,
            line_num: 3,
            item_id: "C-300".to_string(),
            quantity: -1.0,
            ..Default::default()
        },
    ];
    let mut rejected = 0;
    let summary = lines
        .bulk_add(&mut uow, &extra, &mut |_: BulkRowError| rejected += 1)
        .await
        .unwrap();
    assert_eq!(summary.loaded, 1);
    assert_eq!(rejected, 1);

    let found = orders
        .get_by_external_id(&mut uow, "WO-EXT-1")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(found.scheduled_date, Some(scheduled));
    assert_eq!(found.status, Some(WorkOrderStatus::Open));

    let loaded = orders.get_with_lines(&mut uow, order_id).await.unwrap();
    assert_eq!(loaded.lines.len(), 2);
    assert_eq!(loaded.lines[1].completed, Some(false));

    let by_order = lines.get_by_work_order_id(&mut uow, order_id).await.unwrap();
    assert_eq!(by_order.len(), 2);
}

// ==================== 工作单元 ====================

#[tokio::test]
async fn test_failed_transaction_rolls_back_header() {
    let env = setup_sqlite().await;
    let headers = env
        .factory
        .resolve::<dyn PurchTableRepository>(Provider::Sqlite)
        .unwrap();

    let repo = headers.clone();
    let result = env
        .db
        .transaction(&env.identity, move |uow| {
            Box::pin(async move {
                let mut order = HeaderWithLines::with_lines(
                    purch_table("PS-RB", "Acme"),
                    [purch_line(1, "A-100", 1.0), purch_line(2, "", 1.0)],
                );
                repo.add_with_lines(uow, &mut order).await?;
                Ok::<_, PersistenceError>(order.header.id())
            })
        })
        .await;
    assert_eq!(result.unwrap_err().code(), "VALIDATION_ERROR");

    let mut uow = env.db.begin(&env.identity).await.unwrap();
    assert!(headers.get_all(&mut uow).await.unwrap().is_empty());
    uow.rollback().await.unwrap();
    assert!(uow.rollback().await.is_err());
}

#[tokio::test]
async fn test_commit_after_failed_write_rolls_back() {
    let env = setup_sqlite().await;
    let headers = env
        .factory
        .resolve::<dyn PurchTableRepository>(Provider::Sqlite)
        .unwrap();

    let mut uow = env.db.begin(&env.identity).await.unwrap();
    let mut order = HeaderWithLines::with_lines(
        purch_table("PS-FAIL", "Acme"),
        [purch_line(1, "A-100", 1.0), purch_line(2, "", 1.0)],
    );
    let err = headers.add_with_lines(&mut uow, &mut order).await.unwrap_err();
    assert_eq!(err.code(), "VALIDATION_ERROR");
    assert!(!order.header.is_new());
    assert!(uow.is_failed());

    let err = uow.commit().await.unwrap_err();
    assert_eq!(err.code(), "VALIDATION_ERROR");
    assert!(!uow.is_active());

    let mut uow = env.db.begin(&env.identity).await.unwrap();
    assert!(headers.get_all(&mut uow).await.unwrap().is_empty());
    assert!(!uow.is_failed());
    uow.commit().await.unwrap();
}

#[tokio::test]
async fn test_transaction_commits_on_success() {
    let env = setup_sqlite().await;
    let headers = env
        .factory
        .resolve::<dyn PurchTableRepository>(Provider::Sqlite)
        .unwrap();

    let repo = headers.clone();
    let id = env
        .db
        .transaction(&env.identity, move |uow| {
            Box::pin(async move {
                let mut header = Tracked::new(purch_table("PS-TX", "Acme"));
                repo.add(uow, &mut header).await?;
                Ok::<_, PersistenceError>(header.id())
            })
        })
        .await
        .unwrap();

    let mut uow = env.db.begin(&env.identity).await.unwrap();
    let header = headers
        .get_by_id(&mut uow, id, ReadMode::Shared)
        .await
        .unwrap();
    assert_eq!(header.packing_slip_id, "PS-TX");
}

#[tokio::test]
async fn test_repository_for_other_provider_is_rejected() {
    let env = setup_sqlite().await;
    let pg_repo = env
        .factory
        .resolve::<dyn UserRepository>(Provider::Postgres)
        .unwrap();

    let mut uow = env.db.begin(&env.identity).await.unwrap();
    let err = pg_repo.get_all(&mut uow).await.unwrap_err();
    assert_eq!(err.code(), "PROVIDER_RESOLUTION");
}

// ==================== 用户、角色、权限 ====================

#[tokio::test]
async fn test_user_roles_and_permissions() {
    let env = setup_sqlite().await;
    let f = &env.factory;
    let users = f.resolve::<dyn UserRepository>(Provider::Sqlite).unwrap();
    let roles = f.resolve::<dyn RoleRepository>(Provider::Sqlite).unwrap();
    let user_roles = f.resolve::<dyn UserRoleRepository>(Provider::Sqlite).unwrap();
    let permissions = f.resolve::<dyn PermissionRepository>(Provider::Sqlite).unwrap();
    let rules = f.resolve::<dyn AccessRuleRepository>(Provider::Sqlite).unwrap();
    let mut uow = env.db.begin(&env.identity).await.unwrap();

    let mut user = Tracked::new(User {
        username: "bob".to_string(),
        email: "bob@example.com".to_string(),
        is_active: Some(true),
        ..Default::default()
    });
    users.add(&mut uow, &mut user).await.unwrap();

    let mut admin = Tracked::new(Role {
        name: "admin".to_string(),
        ..Default::default()
    });
    let mut clerk = Tracked::new(Role {
        name: "clerk".to_string(),
        ..Default::default()
    });
    roles.add(&mut uow, &mut admin).await.unwrap();
    roles.add(&mut uow, &mut clerk).await.unwrap();

    let mut perm_ids = Vec::new();
    for code in ["purch.read", "purch.write", "wo.read"] {
        let mut permission = Tracked::new(Permission {
            code: code.to_string(),
            name: code.to_string(),
            module: "erp".to_string(),
            ..Default::default()
        });
        permissions.add(&mut uow, &mut permission).await.unwrap();
        perm_ids.push(permission.id());
    }

    let grants = [
        (admin.id(), perm_ids[0], true, false),
        (admin.id(), perm_ids[1], false, true),
        (clerk.id(), perm_ids[0], true, false),
        (clerk.id(), perm_ids[2], false, false),
    ];
    for (role_id, permission_id, can_read, can_write) in grants {
        let mut rule = Tracked::new(AccessRule {
            role_id,
            permission_id,
            can_read: Some(can_read),
            can_write: Some(can_write),
            ..Default::default()
        });
        rules.add(&mut uow, &mut rule).await.unwrap();
    }

    let first = user_roles.assign(&mut uow, user.id(), admin.id()).await.unwrap();
    let again = user_roles.assign(&mut uow, user.id(), admin.id()).await.unwrap();
    assert_eq!(first.id(), again.id());
    user_roles.assign(&mut uow, user.id(), clerk.id()).await.unwrap();
    assert_eq!(user_roles.get_by_user_id(&mut uow, user.id()).await.unwrap().len(), 2);

    let user_role_names: Vec<String> = roles
        .get_roles_for_user(&mut uow, user.id())
        .await
        .unwrap()
        .into_iter()
        .map(|r| r.name.clone())
        .collect();
    assert_eq!(user_role_names, vec!["clerk", "admin"]);

    let mut codes: Vec<String> = permissions
        .get_permissions_for_user(&mut uow, user.id())
        .await
        .unwrap()
        .into_iter()
        .map(|p| p.code.clone())
        .collect();
    codes.sort();
    assert_eq!(codes, vec!["purch.read", "purch.write"]);

    let rule = rules
        .get_rule(&mut uow, admin.id(), perm_ids[1])
        .await
        .unwrap()
        .unwrap();
    assert!(rule.allows_write());
    assert!(!rule.allows_read());
    assert_eq!(rules.get_by_role_id(&mut uow, clerk.id()).await.unwrap().len(), 2);

    user_roles.revoke(&mut uow, user.id(), admin.id()).await.unwrap();
    let codes: Vec<String> = permissions
        .get_permissions_for_user(&mut uow, user.id())
        .await
        .unwrap()
        .into_iter()
        .map(|p| p.code.clone())
        .collect();
    assert_eq!(codes, vec!["purch.read"]);

    assert!(users.get_by_username(&mut uow, "bob").await.unwrap().is_some());
    assert!(users.get_by_email(&mut uow, "bob@example.com").await.unwrap().is_some());
    assert!(roles.get_by_name(&mut uow, "auditor").await.unwrap().is_none());
    assert!(permissions.get_by_code(&mut uow, "wo.read").await.unwrap().is_some());
    uow.commit().await.unwrap();

    // 撤销不存在的关联属于失败的写操作
    let mut uow = env.db.begin(&env.identity).await.unwrap();
    let err = user_roles
        .revoke(&mut uow, user.id(), admin.id())
        .await
        .unwrap_err();
    assert_eq!(err.code(), "NOT_FOUND");
    assert!(uow.is_failed());
    uow.rollback().await.unwrap();
}

// ==================== 序列与令牌 ====================

#[tokio::test]
async fn test_number_sequence_next_value() {
    let env = setup_sqlite().await;
    let sequences = env
        .factory
        .resolve::<dyn NumberSequenceRepository>(Provider::Sqlite)
        .unwrap();
    let mut uow = env.db.begin(&env.identity).await.unwrap();

    let mut sequence = Tracked::new(NumberSequence {
        code: "PO".to_string(),
        prefix: "PO-".to_string(),
        current_value: 100,
        increment_by: 5,
        ..Default::default()
    });
    sequences.add(&mut uow, &mut sequence).await.unwrap();

    assert_eq!(sequences.next_value(&mut uow, "PO").await.unwrap(), 105);
    assert_eq!(sequences.next_value(&mut uow, "PO").await.unwrap(), 110);

    let stored = sequences.get_by_code(&mut uow, "PO").await.unwrap().unwrap();
    assert_eq!(stored.current_value, 110);
    assert_eq!(stored.audit.modified_by, ACTOR);

    let err = sequences.next_value(&mut uow, "SO").await.unwrap_err();
    assert_eq!(err.code(), "NOT_FOUND");
}

#[tokio::test]
async fn test_refresh_token_lifecycle() {
    let env = setup_sqlite().await;
    let users = env
        .factory
        .resolve::<dyn UserRepository>(Provider::Sqlite)
        .unwrap();
    let tokens = env
        .factory
        .resolve::<dyn RefreshTokenRepository>(Provider::Sqlite)
        .unwrap();
    let mut uow = env.db.begin(&env.identity).await.unwrap();

    let mut user = Tracked::new(User {
        username: "carol".to_string(),
        ..Default::default()
    });
    users.add(&mut uow, &mut user).await.unwrap();

    let now = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
    for (token, expires_at) in [
        ("t1", now + Duration::days(1)),
        ("t2", now - Duration::days(1)),
        ("t3", now + Duration::days(2)),
    ] {
        let mut refresh = Tracked::new(RefreshToken {
            user_id: user.id(),
            token: token.to_string(),
            expires_at: Some(expires_at),
            ..Default::default()
        });
        tokens.add(&mut uow, &mut refresh).await.unwrap();
    }

    tokens.revoke(&mut uow, "t1", now).await.unwrap();
    let t1 = tokens.get_by_token(&mut uow, "t1").await.unwrap().unwrap();
    assert_eq!(t1.revoked_at, Some(now));
    assert!(!t1.is_active(now));

    let later = now + Duration::hours(1);
    tokens.revoke(&mut uow, "t1", later).await.unwrap();
    let t1 = tokens.get_by_token(&mut uow, "t1").await.unwrap().unwrap();
    assert_eq!(t1.revoked_at, Some(now));

    let err = tokens.revoke(&mut uow, "missing", now).await.unwrap_err();
    assert_eq!(err.code(), "NOT_FOUND");

    assert_eq!(
        tokens
            .revoke_all_for_user(&mut uow, user.id(), now)
            .await
            .unwrap(),
        2
    );
    assert_eq!(
        tokens
            .revoke_all_for_user(&mut uow, user.id(), now)
            .await
            .unwrap(),
        0
    );

    assert_eq!(tokens.delete_expired(&mut uow, now).await.unwrap(), 1);
    assert!(tokens.get_by_token(&mut uow, "t2").await.unwrap().is_none());
    assert_eq!(tokens.get_all(&mut uow).await.unwrap().len(), 2);
}
