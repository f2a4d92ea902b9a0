// ==========================================
// 多级库存优化引擎 - 引擎层错误类型
// ==========================================
// 职责: 求解/仿真阶段的错误定义
// 传播策略: 结构性错误立即中止; 仿真期错误按迭代兜底重试
// ==========================================

use thiserror::Error;

use crate::domain::error::ModelError;

/// 引擎层错误类型
#[derive(Error, Debug)]
pub enum EngineError {
    /// 领域层结构性错误（数据校验/循环依赖）
    #[error(transparent)]
    Model(#[from] ModelError),

    /// 树形专用求解器被施加于非树网络
    #[error("网络不是树形结构: {0}")]
    NotATree(String),

    /// 交付时间边界倒置或在边界内无可行解
    #[error("交付时间边界不可行: {0}")]
    InfeasibleBounds(String),

    /// 能力/分摊配置导致仿真状态退化（非有限值等）
    #[error("仿真失败: {0}")]
    SimulationFailure(String),
}

pub type EngineResult<T> = Result<T, EngineError>;
