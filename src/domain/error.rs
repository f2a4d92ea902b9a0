// ==========================================
// 多级库存优化引擎 - 领域层错误类型
// ==========================================
// 职责: 网络模型构建与结构查询的错误定义
// 红线: 所有错误信息必须包含显式原因（可解释性）
// ==========================================

use thiserror::Error;

/// 领域层错误类型
///
/// 结构性错误在任何算法运行之前检出，检出即中止，不产生部分结果。
#[derive(Error, Debug)]
pub enum ModelError {
    /// 品目/BOM 数据校验失败（未知引用、非法数值、分摊比例溢出等）
    #[error("数据校验失败: {0}")]
    Validation(String),

    /// 网络存在循环依赖，不存在合法的拓扑序
    #[error("网络存在循环依赖: {0}")]
    Cycle(String),
}

pub type ModelResult<T> = Result<T, ModelError>;
