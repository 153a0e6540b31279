//! 集成测试公共设施
//!
//! SQLite 内存库（单连接）上建表，返回数据库、仓储工厂和固定操作者。

#![allow(dead_code)]

use std::sync::Arc;

use erp_persistence::{Database, HookPipeline, RepositoryFactory, StaticIdentity};
use erp_shared::Provider;
use erp_shared::test_utils::{test_database_config, test_persistence_config};

pub const ACTOR: &str = "alice";

const AUDIT_DDL: &str = "created_by TEXT NOT NULL DEFAULT '',
    created_date_time DATETIME,
    modified_by TEXT NOT NULL DEFAULT '',
    modified_date_time DATETIME";

fn sqlite_schema() -> String {
    format!(
        r#"
        CREATE TABLE purch_table (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            packing_slip_id TEXT NOT NULL UNIQUE,
            purch_id TEXT NOT NULL DEFAULT '',
            vendor_account TEXT NOT NULL DEFAULT '',
            vendor_name TEXT NOT NULL DEFAULT '',
            warehouse TEXT NOT NULL DEFAULT '',
            purch_status TEXT,
            delivery_date DATETIME,
            is_posted BOOLEAN,
            {AUDIT_DDL}
        );
        CREATE TABLE purch_line (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            purch_table_id INTEGER NOT NULL REFERENCES purch_table(id) ON DELETE CASCADE,
            line_num INTEGER NOT NULL,
            item_id TEXT NOT NULL,
            item_name TEXT NOT NULL DEFAULT '',
            qty_ordered REAL NOT NULL DEFAULT 0,
            qty_received REAL NOT NULL DEFAULT 0,
            unit TEXT NOT NULL DEFAULT '',
            batch_number TEXT NOT NULL DEFAULT '',
            {AUDIT_DDL},
            UNIQUE (purch_table_id, line_num)
        );
        CREATE TABLE work_order (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            external_work_order_id TEXT NOT NULL UNIQUE,
            title TEXT NOT NULL DEFAULT '',
            warehouse TEXT NOT NULL DEFAULT '',
            assigned_to TEXT NOT NULL DEFAULT '',
            status TEXT,
            scheduled_date DATETIME,
            completed_date DATETIME,
            {AUDIT_DDL}
        );
        CREATE TABLE work_order_line (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            work_order_id INTEGER NOT NULL REFERENCES work_order(id) ON DELETE CASCADE,
            line_num INTEGER NOT NULL,
            item_id TEXT NOT NULL DEFAULT '',
            description TEXT NOT NULL DEFAULT '',
            quantity REAL NOT NULL DEFAULT 0,
            completed BOOLEAN,
            {AUDIT_DDL}
        );
        CREATE TABLE app_user (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            username TEXT NOT NULL UNIQUE,
            email TEXT NOT NULL DEFAULT '',
            display_name TEXT NOT NULL DEFAULT '',
            password_hash TEXT NOT NULL DEFAULT '',
            is_active BOOLEAN,
            last_login_at DATETIME,
            {AUDIT_DDL}
        );
        CREATE TABLE app_role (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL UNIQUE,
            description TEXT NOT NULL DEFAULT '',
            {AUDIT_DDL}
        );
        CREATE TABLE user_role (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id INTEGER NOT NULL REFERENCES app_user(id) ON DELETE CASCADE,
            role_id INTEGER NOT NULL REFERENCES app_role(id) ON DELETE CASCADE,
            {AUDIT_DDL},
            UNIQUE (user_id, role_id)
        );
        CREATE TABLE permission (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            code TEXT NOT NULL UNIQUE,
            name TEXT NOT NULL DEFAULT '',
            module TEXT NOT NULL DEFAULT '',
            description TEXT NOT NULL DEFAULT '',
            {AUDIT_DDL}
        );
        CREATE TABLE access_rule (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            role_id INTEGER NOT NULL REFERENCES app_role(id) ON DELETE CASCADE,
            permission_id INTEGER NOT NULL REFERENCES permission(id) ON DELETE CASCADE,
            can_read BOOLEAN,
            can_write BOOLEAN,
            {AUDIT_DDL},
            UNIQUE (role_id, permission_id)
        );
        CREATE TABLE number_sequence (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            code TEXT NOT NULL UNIQUE,
            prefix TEXT NOT NULL DEFAULT '',
            current_value INTEGER NOT NULL DEFAULT 0,
            increment_by INTEGER NOT NULL DEFAULT 1,
            {AUDIT_DDL}
        );
        CREATE TABLE refresh_token (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id INTEGER NOT NULL REFERENCES app_user(id) ON DELETE CASCADE,
            token TEXT NOT NULL UNIQUE,
            expires_at DATETIME,
            revoked_at DATETIME,
            {AUDIT_DDL}
        );
        "#
    )
}

/// 测试环境
pub struct TestEnv {
    pub db: Database,
    pub factory: Arc<RepositoryFactory>,
    pub identity: StaticIdentity,
}

/// 建立 SQLite 测试环境
pub async fn setup_sqlite() -> TestEnv {
    let config = test_database_config(Provider::Sqlite);
    let db = Database::connect_with(&config, test_persistence_config())
        .await
        .expect("连接 SQLite 失败");
    let pool = db.sqlite_pool().expect("应为 SQLite 连接池");
    sqlx::raw_sql(&sqlite_schema())
        .execute(pool)
        .await
        .expect("建表失败");

    TestEnv {
        db,
        factory: Arc::new(RepositoryFactory::with_defaults(Arc::new(
            HookPipeline::with_defaults(),
        ))),
        identity: StaticIdentity::new(ACTOR),
    }
}
