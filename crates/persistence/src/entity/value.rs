//! 列值与列定义
//!
//! `SqlValue` 是带类型的可空列值。空值也携带类型，保证 Postgres 绑定 NULL 时
//! 与目标列类型一致。

use std::fmt;

use chrono::{DateTime, Utc};

/// 列的存储类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnKind {
    Bool,
    Int,
    Float,
    /// 自由文本，稀疏过滤时按包含匹配
    Text,
    /// 以文本存储的枚举，稀疏过滤时按精确匹配
    Enum,
    Timestamp,
}

/// 列定义
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Column {
    pub name: &'static str,
    pub kind: ColumnKind,
    pub nullable: bool,
}

impl Column {
    pub const fn new(name: &'static str, kind: ColumnKind) -> Self {
        Self {
            name,
            kind,
            nullable: false,
        }
    }

    pub const fn bool(name: &'static str) -> Self {
        Self::new(name, ColumnKind::Bool).nullable()
    }

    pub const fn int(name: &'static str) -> Self {
        Self::new(name, ColumnKind::Int)
    }

    pub const fn float(name: &'static str) -> Self {
        Self::new(name, ColumnKind::Float)
    }

    pub const fn text(name: &'static str) -> Self {
        Self::new(name, ColumnKind::Text)
    }

    pub const fn enumeration(name: &'static str) -> Self {
        Self::new(name, ColumnKind::Enum).nullable()
    }

    pub const fn timestamp(name: &'static str) -> Self {
        Self::new(name, ColumnKind::Timestamp).nullable()
    }

    pub const fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }
}

/// 表示"未设置"的最小时间哨兵值（0001-01-01T00:00:00Z）
///
/// 历史数据中以该值代替 NULL 的时间列，在稀疏过滤中视为缺省。
pub fn min_timestamp() -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp(-62_135_596_800, 0).unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// 带类型的可空列值
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Bool(Option<bool>),
    Int(Option<i64>),
    Float(Option<f64>),
    Text(Option<String>),
    Timestamp(Option<DateTime<Utc>>),
}

impl SqlValue {
    /// 指定类型的 NULL
    pub fn null(kind: ColumnKind) -> Self {
        match kind {
            ColumnKind::Bool => Self::Bool(None),
            ColumnKind::Int => Self::Int(None),
            ColumnKind::Float => Self::Float(None),
            ColumnKind::Text | ColumnKind::Enum => Self::Text(None),
            ColumnKind::Timestamp => Self::Timestamp(None),
        }
    }

    pub fn is_null(&self) -> bool {
        match self {
            Self::Bool(v) => v.is_none(),
            Self::Int(v) => v.is_none(),
            Self::Float(v) => v.is_none(),
            Self::Text(v) => v.is_none(),
            Self::Timestamp(v) => v.is_none(),
        }
    }

    /// 调用方是否"提供"了该值
    ///
    /// 文本非空、数值非零、时间晚于哨兵值、布尔/枚举非空时视为已提供。
    pub fn is_present(&self) -> bool {
        match self {
            Self::Bool(v) => v.is_some(),
            Self::Int(v) => v.is_some_and(|n| n != 0),
            Self::Float(v) => v.is_some_and(|n| n != 0.0),
            Self::Text(v) => v.as_deref().is_some_and(|s| !s.is_empty()),
            Self::Timestamp(v) => v.is_some_and(|t| t > min_timestamp()),
        }
    }

    /// 值能否写入指定类型的列
    pub fn fits(&self, kind: ColumnKind) -> bool {
        matches!(
            (self, kind),
            (Self::Bool(_), ColumnKind::Bool)
                | (Self::Int(_), ColumnKind::Int)
                | (Self::Float(_), ColumnKind::Float)
                | (Self::Int(_), ColumnKind::Float)
                | (Self::Text(_), ColumnKind::Text | ColumnKind::Enum)
                | (Self::Timestamp(_), ColumnKind::Timestamp)
        )
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(v) => v.as_deref(),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(v) => *v,
            _ => None,
        }
    }
}

impl fmt::Display for SqlValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(Some(v)) => write!(f, "{v}"),
            Self::Int(Some(v)) => write!(f, "{v}"),
            Self::Float(Some(v)) => write!(f, "{v}"),
            Self::Text(Some(v)) => write!(f, "'{v}'"),
            Self::Timestamp(Some(v)) => write!(f, "{}", v.to_rfc3339()),
            _ => f.write_str("NULL"),
        }
    }
}

macro_rules! impl_from_value {
    ($variant:ident, $ty:ty) => {
        impl From<$ty> for SqlValue {
            fn from(value: $ty) -> Self {
                Self::$variant(Some(value))
            }
        }

        impl From<Option<$ty>> for SqlValue {
            fn from(value: Option<$ty>) -> Self {
                Self::$variant(value)
            }
        }
    };
}

impl_from_value!(Bool, bool);
impl_from_value!(Int, i64);
impl_from_value!(Float, f64);
impl_from_value!(Text, String);
impl_from_value!(Timestamp, DateTime<Utc>);

impl From<&str> for SqlValue {
    fn from(value: &str) -> Self {
        Self::Text(Some(value.to_string()))
    }
}

impl From<&String> for SqlValue {
    fn from(value: &String) -> Self {
        Self::Text(Some(value.clone()))
    }
}

impl From<i32> for SqlValue {
    fn from(value: i32) -> Self {
        Self::Int(Some(i64::from(value)))
    }
}
