// ==========================================
// 多级库存优化引擎 - 学习率探索与 One-Cycle 调度
// ==========================================
// 职责: 预优化学习率区间扫描（LR Range Test）+ One-Cycle 调度表
// 红线: 推荐学习率取平滑成本曲线最陡下降点,
//       而非成本最小点（两者极易混淆, 契约如此）
// ==========================================

use serde::Serialize;
use tracing::{debug, instrument};

use crate::config::defaults;
use crate::domain::error::ModelError;
use crate::domain::network::NetworkModel;
use crate::domain::types::ReplenishmentPolicy;
use crate::engine::error::{EngineError, EngineResult};
use crate::engine::optimizer::initial_base_stock_levels;
use crate::engine::simulator::{EchelonSimulator, SimulationParams};

// ==========================================
// One-Cycle 调度表
// ==========================================
// 学习率: 低 → 高（线性）→ 低（余弦）
// 动量:   高 → 低（线性）→ 高（余弦, 与学习率反相）
#[derive(Debug, Clone, Serialize)]
pub struct OneCycleSchedule {
    lr: Vec<f64>,
    momentum: Vec<f64>,
}

impl OneCycleSchedule {
    /// 构建 max_iter 步的 One-Cycle 调度表
    ///
    /// lr_min 取 lr_max / 25, 动量在 [momentum_min, momentum_max]
    /// 区间内与学习率反相变化。
    pub fn build(
        max_iter: usize,
        lr_max: f64,
        momentum_min: f64,
        momentum_max: f64,
    ) -> EngineResult<Self> {
        if max_iter < 2 || lr_max <= 0.0 {
            return Err(ModelError::Validation(
                "One-Cycle 调度要求 max_iter ≥ 2 且 lr_max > 0".to_string(),
            )
            .into());
        }
        if !(0.0..1.0).contains(&momentum_min)
            || !(0.0..1.0).contains(&momentum_max)
            || momentum_min > momentum_max
        {
            return Err(ModelError::Validation(
                "One-Cycle 动量区间要求 0 ≤ min ≤ max < 1".to_string(),
            )
            .into());
        }

        let lr_min = lr_max / defaults::CYCLE_LR_DIV_FACTOR;
        let half = max_iter / 2;
        let rest = max_iter - half;

        let mut lr = Vec::with_capacity(max_iter);
        let mut momentum = Vec::with_capacity(max_iter);

        // 前半程: 线性爬升 / 动量线性下降
        for k in 0..half {
            let frac = k as f64 / (half.max(1)) as f64;
            lr.push(lr_min + (lr_max - lr_min) * frac);
            momentum.push(momentum_max - (momentum_max - momentum_min) * frac);
        }
        // 后半程: 余弦退火回落 / 动量余弦回升
        for k in 0..rest {
            let theta = std::f64::consts::PI * k as f64 / rest.max(1) as f64;
            let cos_half = (1.0 + theta.cos()) / 2.0;
            lr.push(lr_min + (lr_max - lr_min) * cos_half);
            momentum.push(momentum_max - (momentum_max - momentum_min) * cos_half);
        }

        Ok(Self { lr, momentum })
    }

    /// 第 t 步的 (学习率, 动量)
    pub fn at(&self, t: usize) -> (f64, f64) {
        let k = t.min(self.lr.len() - 1);
        (self.lr[k], self.momentum[k])
    }

    pub fn len(&self) -> usize {
        self.lr.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lr.is_empty()
    }

    pub fn lr_schedule(&self) -> &[f64] {
        &self.lr
    }

    pub fn momentum_schedule(&self) -> &[f64] {
        &self.momentum
    }
}

// ==========================================
// LrFinderParams - 扫描参数
// ==========================================
#[derive(Debug, Clone)]
pub struct LrFinderParams {
    pub lr_min: f64,
    pub lr_max: f64,
    pub num_iterations: usize,
    /// 指数移动平均平滑系数
    pub smoothing: f64,
    /// 发散中止倍率（相对初始平滑成本）
    pub divergence_factor: f64,
    pub simulation: SimulationParams,
}

impl Default for LrFinderParams {
    fn default() -> Self {
        Self {
            lr_min: defaults::LR_FINDER_MIN,
            lr_max: defaults::LR_FINDER_MAX,
            num_iterations: defaults::LR_FINDER_ITERATIONS,
            smoothing: defaults::LR_FINDER_SMOOTHING,
            divergence_factor: defaults::LR_FINDER_DIVERGENCE_FACTOR,
            simulation: SimulationParams::default(),
        }
    }
}

// ==========================================
// LrFinderOutcome - 扫描结果
// ==========================================
#[derive(Debug, Clone, Serialize)]
pub struct LrFinderOutcome {
    /// 逐步学习率（指数递增）
    pub lr_history: Vec<f64>,
    /// 逐步原始成本
    pub cost_history: Vec<f64>,
    /// 逐步平滑成本（EMA）
    pub smoothed_history: Vec<f64>,
    /// 推荐学习率: 平滑成本最陡下降处的学习率
    pub suggested_lr: f64,
    /// 扫描期间见到的最优成本
    pub best_cost: f64,
    /// 是否因成本发散提前中止
    pub aborted_early: bool,
}

// ==========================================
// 学习率区间扫描
// ==========================================

/// 学习率区间扫描（LR Range Test）
///
/// 学习率自 lr_min 指数递增至 lr_max, 每步执行一次 Adam 更新并记录
/// EMA 平滑成本; 平滑成本超过发散倍率 × 初始平滑成本即提前中止。
/// 推荐值取相邻平滑成本差分最小（最陡下降）处的学习率。
#[instrument(skip(net, initial_levels, params), fields(num_iterations = params.num_iterations))]
pub fn find_learning_rate(
    net: &NetworkModel,
    initial_levels: Option<Vec<f64>>,
    params: &LrFinderParams,
) -> EngineResult<LrFinderOutcome> {
    let n = net.len();
    if params.lr_min <= 0.0 || params.lr_min >= params.lr_max {
        return Err(ModelError::Validation(
            "学习率扫描区间要求 0 < lr_min < lr_max".to_string(),
        )
        .into());
    }
    if params.num_iterations < 2 {
        return Err(ModelError::Validation(
            "学习率扫描至少需要 2 个迭代".to_string(),
        )
        .into());
    }
    if !(0.0..1.0).contains(&params.smoothing) {
        return Err(ModelError::Validation(
            "平滑系数必须落在 [0, 1)".to_string(),
        )
        .into());
    }

    let mut levels = match initial_levels {
        Some(v) if v.len() == n => v.iter().map(|x| x.max(0.0)).collect(),
        Some(v) => {
            return Err(ModelError::Validation(format!(
                "初始水平长度 {} 与品目数 {} 不一致",
                v.len(),
                n
            ))
            .into())
        }
        None => initial_base_stock_levels(net)?,
    };

    let simulator = EchelonSimulator::new();
    // Adam 矩缓冲（动量取 One-Cycle 动量上界, 与扫描惯例一致）
    let beta1 = defaults::CYCLE_MOMENTUM_MAX;
    let beta2 = defaults::ADAM_BETA2;
    let mut m = vec![0.0f64; n];
    let mut v = vec![0.0f64; n];

    let ratio = params.lr_max / params.lr_min;
    let mut lr_history = Vec::new();
    let mut cost_history = Vec::new();
    let mut smoothed_history: Vec<f64> = Vec::new();
    let mut best_cost = f64::INFINITY;
    let mut aborted_early = false;

    for t in 0..params.num_iterations {
        let lr = params.lr_min
            * ratio.powf(t as f64 / (params.num_iterations - 1) as f64);

        let policy = ReplenishmentPolicy::BaseStock {
            levels: levels.clone(),
        };
        let report = simulator.simulate(net, &policy, None, &params.simulation)?;
        let cost = report.average_cost;
        if !cost.is_finite() {
            return Err(EngineError::SimulationFailure(
                "学习率扫描中成本非有限".to_string(),
            ));
        }
        best_cost = best_cost.min(cost);

        let smoothed = match smoothed_history.last() {
            None => cost,
            Some(prev) => params.smoothing * prev + (1.0 - params.smoothing) * cost,
        };
        lr_history.push(lr);
        cost_history.push(cost);
        smoothed_history.push(smoothed);

        // 发散中止: 平滑成本超出初始平滑成本的固定倍率
        if smoothed > params.divergence_factor * smoothed_history[0] {
            aborted_early = true;
            debug!(t, lr, smoothed, "成本发散, 扫描提前中止");
            break;
        }

        // Adam 更新
        let g = &report.gradient;
        for i in 0..n {
            m[i] = beta1 * m[i] + (1.0 - beta1) * g[i];
            v[i] = beta2 * v[i] + (1.0 - beta2) * g[i] * g[i];
            let m_hat = m[i] / (1.0 - beta1.powi(t as i32 + 1));
            let v_hat = v[i] / (1.0 - beta2.powi(t as i32 + 1));
            levels[i] = (levels[i] - lr * m_hat / (v_hat.sqrt() + defaults::ADAM_EPSILON))
                .max(0.0);
        }
    }

    // 推荐学习率: 平滑成本最陡下降点（非最小成本点）
    let mut suggested_lr = lr_history[0];
    let mut steepest = f64::INFINITY;
    for s in 1..smoothed_history.len() {
        let slope = smoothed_history[s] - smoothed_history[s - 1];
        if slope < steepest {
            steepest = slope;
            suggested_lr = lr_history[s];
        }
    }

    debug!(suggested_lr, best_cost, aborted_early, "学习率扫描完成");
    Ok(LrFinderOutcome {
        lr_history,
        cost_history,
        smoothed_history,
        suggested_lr,
        best_cost,
        aborted_early,
    })
}
