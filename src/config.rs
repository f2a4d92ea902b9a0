// ==========================================
// 多级库存优化引擎 - 配置层
// ==========================================
// 职责: 算法参数默认值的唯一定义点
// 红线: 引擎层不得内嵌魔法数字, 默认值一律引用本模块
// ==========================================

/// 算法参数默认值全集
///
/// 各引擎的参数结构体（`TabuParams` / `SimulationParams` /
/// `OptimizerParams` / `LrFinderParams`）的 `Default` 实现均从此处取值，
/// 上层请求层可按调用覆写任意一项。
pub mod defaults {
    /// 服务水平安全系数 z（≈95% 服务水平）
    pub const SERVICE_LEVEL_Z: f64 = 1.65;

    /// 禁忌搜索最大迭代次数
    pub const TABU_MAX_ITER: usize = 100;
    /// 禁忌期（以迭代计）
    pub const TABU_TENURE: usize = 7;
    /// 无改进提前终止窗口（占 max_iter 的比例）
    pub const TABU_STALL_FRACTION: f64 = 0.2;

    /// 仿真副本数
    pub const N_SAMPLES: usize = 10;
    /// 仿真期间数
    pub const N_PERIODS: usize = 100;
    /// 随机数种子
    pub const RANDOM_SEED: u64 = 1;

    /// 梯度优化学习率
    pub const LEARNING_RATE: f64 = 1.0;
    /// 梯度优化最大迭代次数
    pub const MAX_ITERATIONS: usize = 100;
    /// Adam 一阶矩衰减率
    pub const ADAM_BETA1: f64 = 0.9;
    /// Adam 二阶矩衰减率
    pub const ADAM_BETA2: f64 = 0.999;
    /// Momentum 衰减率
    pub const MOMENTUM: f64 = 0.9;
    /// Adam 数值稳定项
    pub const ADAM_EPSILON: f64 = 1e-8;
    /// 收敛判定阈值（滑动窗口内相对成本变化）
    pub const CONVERGENCE_TOLERANCE: f64 = 1e-5;
    /// 收敛判定滑动窗口长度
    pub const CONVERGENCE_WINDOW: usize = 5;
    /// 连续仿真失败上限（超过即中止整个优化调用）
    pub const MAX_CONSECUTIVE_FAILURES: usize = 3;

    /// 学习率探索下界
    pub const LR_FINDER_MIN: f64 = 1e-7;
    /// 学习率探索上界
    pub const LR_FINDER_MAX: f64 = 10.0;
    /// 学习率探索迭代次数
    pub const LR_FINDER_ITERATIONS: usize = 100;
    /// 学习率探索成本平滑系数（指数移动平均）
    pub const LR_FINDER_SMOOTHING: f64 = 0.98;
    /// 学习率探索发散中止倍率（相对初始平滑成本）
    pub const LR_FINDER_DIVERGENCE_FACTOR: f64 = 4.0;

    /// One-Cycle 调度动量下界
    pub const CYCLE_MOMENTUM_MIN: f64 = 0.85;
    /// One-Cycle 调度动量上界
    pub const CYCLE_MOMENTUM_MAX: f64 = 0.95;
    /// One-Cycle 学习率下界与峰值之比（lr_min = lr_max / 25）
    pub const CYCLE_LR_DIV_FACTOR: f64 = 25.0;

    /// 分摊比例之和的容差（Σallocation ≤ 1 + ε）
    pub const ALLOCATION_EPSILON: f64 = 1e-6;
    /// 成本比较容差（平局判定）
    pub const COST_EPSILON: f64 = 1e-9;
}

#[cfg(test)]
mod tests {
    use super::defaults;

    #[test]
    fn test_defaults_sane() {
        // 默认值必须落在各自的合法区间内
        assert!(defaults::SERVICE_LEVEL_Z > 0.0);
        assert!(defaults::TABU_STALL_FRACTION > 0.0 && defaults::TABU_STALL_FRACTION < 1.0);
        assert!(defaults::ADAM_BETA1 < 1.0 && defaults::ADAM_BETA2 < 1.0);
        assert!(defaults::LR_FINDER_MIN < defaults::LR_FINDER_MAX);
        assert!(defaults::CYCLE_MOMENTUM_MIN < defaults::CYCLE_MOMENTUM_MAX);
    }
}
