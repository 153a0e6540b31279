//! 共享库
//!
//! 包含持久化核心及其调用方共用的配置加载、日志初始化与测试辅助代码。

pub mod config;
pub mod observability;
pub mod test_utils;

pub use config::{AppConfig, DatabaseConfig, ObservabilityConfig, PersistenceConfig, Provider};
