//! 领域模型
//!
//! 每个模型对应一张表，字段与列一一对应；主键由 `Tracked` 持有，不在模型中。

mod enums;
mod permission;
mod purch;
mod sequence;
mod user;
mod work_order;

pub use enums::{PurchStatus, WorkOrderStatus};
pub use permission::{AccessRule, Permission};
pub use purch::{PurchLine, PurchTable};
pub use sequence::{NumberSequence, RefreshToken};
pub use user::{Role, User, UserRole};
pub use work_order::{WorkOrder, WorkOrderLine};
