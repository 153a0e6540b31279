//! 业务枚举类型定义
//!
//! 枚举以文本存储（与历史库一致，不使用数据库原生枚举），稀疏过滤时按精确匹配。

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::entity::SqlValue;

macro_rules! text_enum {
    ($name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $text,)+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok(Self::$variant),)+
                    other => Err(format!("无效的 {}: {other}", stringify!($name))),
                }
            }
        }

        impl From<Option<$name>> for SqlValue {
            fn from(value: Option<$name>) -> Self {
                SqlValue::Text(value.map(|v| v.as_str().to_string()))
            }
        }
    };
}

/// 收货单状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PurchStatus {
    /// 待收货
    Open,
    /// 已收货（可能部分）
    Received,
    /// 已关闭
    Closed,
    /// 已取消
    Cancelled,
}

text_enum!(PurchStatus {
    Open => "Open",
    Received => "Received",
    Closed => "Closed",
    Cancelled => "Cancelled",
});

/// 工单状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WorkOrderStatus {
    Open,
    InProgress,
    Completed,
    Cancelled,
}

text_enum!(WorkOrderStatus {
    Open => "Open",
    InProgress => "InProgress",
    Completed => "Completed",
    Cancelled => "Cancelled",
});
