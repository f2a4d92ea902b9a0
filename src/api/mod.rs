// ==========================================
// 多级库存优化引擎 - API 层
// ==========================================
// 职责: JSON 可序列化的调用/返回契约, 供外部请求层消费
// 红线: 所有错误以结构化结果上报, 绝不以错误答案静默返回
// ==========================================

pub mod error;
pub mod inventory_api;
pub mod types;

// 重导出核心类型
pub use error::{ApiError, ApiResult};
pub use inventory_api::InventoryApi;
pub use types::*;
