// ==========================================
// 多级库存优化引擎 - API 层错误类型
// ==========================================
// 职责: 引擎错误到契约错误种别的映射
// 红线: 所有错误信息必须包含显式原因（可解释性）
// ==========================================

use thiserror::Error;

use crate::domain::error::ModelError;
use crate::engine::error::EngineError;

/// API 层错误类型
#[derive(Error, Debug)]
pub enum ApiError {
    /// 请求级输入错误（引擎未被调用即检出）
    #[error("无效输入: {0}")]
    InvalidInput(String),

    /// 引擎层错误透传
    #[error(transparent)]
    Engine(#[from] EngineError),
}

impl From<ModelError> for ApiError {
    fn from(e: ModelError) -> Self {
        ApiError::Engine(EngineError::Model(e))
    }
}

impl ApiError {
    /// 契约错误种别判别符
    pub fn kind(&self) -> &'static str {
        match self {
            ApiError::InvalidInput(_) => "InvalidInput",
            ApiError::Engine(EngineError::Model(ModelError::Validation(_))) => "ValidationError",
            ApiError::Engine(EngineError::Model(ModelError::Cycle(_))) => "CycleError",
            ApiError::Engine(EngineError::NotATree(_)) => "NotATreeError",
            ApiError::Engine(EngineError::InfeasibleBounds(_)) => "InfeasibleBoundsError",
            ApiError::Engine(EngineError::SimulationFailure(_)) => "SimulationFailureError",
        }
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
