// ==========================================
// 多级库存优化引擎 - 领域层
// ==========================================
// 职责: 品目/BOM 边/网络模型的定义与结构校验
// 红线: 领域层只做结构与数据校验, 不含求解逻辑
// ==========================================

pub mod error;
pub mod item;
pub mod network;
pub mod types;

// 重导出核心类型
pub use error::ModelError;
pub use item::{BomEdge, Item};
pub use network::{NetworkModel, NetworkSummary};
pub use types::{DemandSpec, OptimAlgorithm, ReplenishmentPolicy};
