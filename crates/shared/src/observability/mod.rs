//! 统一可观测性模块
//!
//! 提供日志（tracing）的统一初始化入口。持久化层只通过 `tracing` 宏
//! 输出结构化事件，由调用方在进程启动时选择输出格式。

pub mod tracing;

pub use self::tracing::{init_logging, init_test_logging};
