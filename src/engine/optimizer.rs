// ==========================================
// 多级库存优化引擎 - 基在库水平梯度优化器
// ==========================================
// 职责: 以仿真估计的边际成本为梯度, 迭代调优各品目基在库水平
// 算法: SGD / Momentum / Adam（带偏差修正）, 可选 One-Cycle 调度
// 红线: 优化器状态（矩缓冲/最优解）显式作为上下文传递,
//       并发调用之间零共享
// ==========================================

use serde::Serialize;
use tracing::{debug, instrument, warn};

use crate::config::defaults;
use crate::domain::error::ModelError;
use crate::domain::network::NetworkModel;
use crate::domain::types::{OptimAlgorithm, ReplenishmentPolicy};
use crate::engine::error::{EngineError, EngineResult};
use crate::engine::lr_finder::OneCycleSchedule;
use crate::engine::newsvendor;
use crate::engine::simulator::{EchelonSimulator, SimulationParams};

// ==========================================
// OptimizerParams - 优化参数
// ==========================================
#[derive(Debug, Clone)]
pub struct OptimizerParams {
    pub algorithm: OptimAlgorithm,
    pub learning_rate: f64,
    pub max_iterations: usize,
    /// Adam 一阶矩衰减率
    pub beta1: f64,
    /// Adam 二阶矩衰减率
    pub beta2: f64,
    /// Momentum 衰减率
    pub momentum: f64,
    pub epsilon: f64,
    /// 收敛判定: 滑动窗口内相对成本变化阈值
    pub tolerance: f64,
    /// 可选 One-Cycle 学习率/动量调度（仅 Momentum/Adam）
    pub one_cycle: Option<OneCycleSchedule>,
    pub simulation: SimulationParams,
}

impl Default for OptimizerParams {
    fn default() -> Self {
        Self {
            algorithm: OptimAlgorithm::Adam,
            learning_rate: defaults::LEARNING_RATE,
            max_iterations: defaults::MAX_ITERATIONS,
            beta1: defaults::ADAM_BETA1,
            beta2: defaults::ADAM_BETA2,
            momentum: defaults::MOMENTUM,
            epsilon: defaults::ADAM_EPSILON,
            tolerance: defaults::CONVERGENCE_TOLERANCE,
            one_cycle: None,
            simulation: SimulationParams::default(),
        }
    }
}

// ==========================================
// 结果结构
// ==========================================

#[derive(Debug, Clone, Serialize)]
pub struct ConvergenceInfo {
    /// 是否在 max_iterations 内达到收敛阈值
    /// （false 即收敛警告, 以数据形式上报, 不作为错误抛出）
    pub converged: bool,
    pub iterations_run: usize,
    pub final_gradient_norm: f64,
    pub tolerance: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct OptimizationHistory {
    pub iteration: Vec<usize>,
    pub cost: Vec<f64>,
    pub gradient_norm: Vec<f64>,
    pub base_stock_levels: Vec<Vec<f64>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct OptimizationOutcome {
    /// 最优基在库水平（与品目序一致, 非负）
    pub optimal_base_stock_levels: Vec<f64>,
    pub best_cost: f64,
    pub convergence: ConvergenceInfo,
    pub history: OptimizationHistory,
}

/// 优化器可变上下文: 矩缓冲显式携带, 不落全局
struct UpdateState {
    /// 一阶矩（Adam）/ 速度向量（Momentum）
    m: Vec<f64>,
    /// 二阶矩（Adam）
    v: Vec<f64>,
}

// ==========================================
// PolicyGradientOptimizer - 梯度优化引擎
// ==========================================
pub struct PolicyGradientOptimizer {
    // 无状态引擎，不需要注入依赖
}

impl Default for PolicyGradientOptimizer {
    fn default() -> Self {
        Self::new()
    }
}

impl PolicyGradientOptimizer {
    pub fn new() -> Self {
        Self {}
    }

    // ==========================================
    // 核心方法
    // ==========================================

    /// 优化基在库水平
    ///
    /// 每迭代以固定种子重跑仿真（公共随机数降方差), 取边际成本信号
    /// 为梯度并按所选算法更新; 更新后水平在 0 处截断。
    ///
    /// 失败兜底: 仿真失败时把当前水平向最优解回拉一半后重试,
    /// 连续失败超过上限则中止整个调用。
    #[instrument(skip(self, net, initial_levels, params), fields(algorithm = %params.algorithm, max_iterations = params.max_iterations))]
    pub fn optimize(
        &self,
        net: &NetworkModel,
        initial_levels: Option<Vec<f64>>,
        params: &OptimizerParams,
    ) -> EngineResult<OptimizationOutcome> {
        let n = net.len();
        if params.learning_rate <= 0.0 || params.max_iterations == 0 {
            return Err(ModelError::Validation(
                "学习率必须为正且最大迭代次数必须 ≥ 1".to_string(),
            )
            .into());
        }
        if params.one_cycle.is_some() && params.algorithm == OptimAlgorithm::Sgd {
            return Err(ModelError::Validation(
                "One-Cycle 调度仅适用于 Momentum/Adam 更新".to_string(),
            )
            .into());
        }

        let mut levels = match initial_levels {
            Some(v) => {
                if v.len() != n {
                    return Err(ModelError::Validation(format!(
                        "初始水平长度 {} 与品目数 {} 不一致",
                        v.len(),
                        n
                    ))
                    .into());
                }
                v.iter().map(|x| x.max(0.0)).collect()
            }
            None => initial_base_stock_levels(net)?,
        };

        let simulator = EchelonSimulator::new();
        let mut state = UpdateState {
            m: vec![0.0; n],
            v: vec![0.0; n],
        };

        let mut best_cost = f64::INFINITY;
        let mut best_levels = levels.clone();
        let mut history = OptimizationHistory {
            iteration: Vec::new(),
            cost: Vec::new(),
            gradient_norm: Vec::new(),
            base_stock_levels: Vec::new(),
        };

        let mut consecutive_failures = 0usize;
        let mut final_gradient_norm = f64::INFINITY;
        let mut converged = false;
        let mut iterations_run = 0usize;

        let mut t = 0usize;
        while t < params.max_iterations {
            let policy = ReplenishmentPolicy::BaseStock {
                levels: levels.clone(),
            };
            let report =
                match simulator.simulate(net, &policy, None, &params.simulation) {
                    Ok(r) => {
                        consecutive_failures = 0;
                        r
                    }
                    Err(EngineError::SimulationFailure(msg)) => {
                        consecutive_failures += 1;
                        warn!(
                            consecutive_failures,
                            error = %msg,
                            "仿真失败, 向最优解回拉后重试"
                        );
                        if consecutive_failures >= defaults::MAX_CONSECUTIVE_FAILURES {
                            return Err(EngineError::SimulationFailure(format!(
                                "连续 {} 次仿真失败: {}",
                                consecutive_failures, msg
                            )));
                        }
                        // 缩小扰动: 当前水平向最优解折半回拉
                        for i in 0..n {
                            levels[i] = (0.5 * (levels[i] + best_levels[i])).max(0.0);
                        }
                        continue;
                    }
                    Err(e) => return Err(e),
                };
            iterations_run = t + 1;

            let cost = report.average_cost;
            let g = &report.gradient;
            if cost < best_cost {
                best_cost = cost;
                best_levels = levels.clone();
            }

            // 调度: One-Cycle 下学习率与动量随迭代变化
            let (lr, beta1) = match &params.one_cycle {
                Some(sched) => sched.at(t),
                None => (
                    params.learning_rate,
                    match params.algorithm {
                        OptimAlgorithm::Adam => params.beta1,
                        _ => params.momentum,
                    },
                ),
            };

            // 参数更新
            match params.algorithm {
                OptimAlgorithm::Adam => {
                    for i in 0..n {
                        state.m[i] = beta1 * state.m[i] + (1.0 - beta1) * g[i];
                        state.v[i] =
                            params.beta2 * state.v[i] + (1.0 - params.beta2) * g[i] * g[i];
                        // 偏差修正
                        let m_hat = state.m[i] / (1.0 - beta1.powi(t as i32 + 1));
                        let v_hat = state.v[i] / (1.0 - params.beta2.powi(t as i32 + 1));
                        levels[i] -= lr * m_hat / (v_hat.sqrt() + params.epsilon);
                    }
                }
                OptimAlgorithm::Momentum => {
                    for i in 0..n {
                        state.m[i] = beta1 * state.m[i] + lr * g[i];
                        levels[i] -= state.m[i];
                    }
                }
                OptimAlgorithm::Sgd => {
                    for i in 0..n {
                        levels[i] -= lr * g[i];
                    }
                }
            }
            // 不可行的负水平截断, 不作拒绝
            for l in levels.iter_mut() {
                *l = l.max(0.0);
            }

            let gradient_norm = g.iter().map(|x| x * x).sum::<f64>().sqrt();
            final_gradient_norm = gradient_norm;

            history.iteration.push(t);
            history.cost.push(cost);
            history.gradient_norm.push(gradient_norm);
            history.base_stock_levels.push(levels.clone());

            // 收敛判定: 滑动窗口内相对成本变化
            let w = defaults::CONVERGENCE_WINDOW;
            if history.cost.len() >= w {
                let window = &history.cost[history.cost.len() - w..];
                let hi = window.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
                let lo = window.iter().cloned().fold(f64::INFINITY, f64::min);
                let scale = window[w - 1].abs().max(1e-12);
                if (hi - lo) / scale < params.tolerance {
                    converged = true;
                    debug!(t, cost, "滑动窗口内成本变化低于阈值, 判定收敛");
                    t += 1;
                    break;
                }
            }

            t += 1;
        }

        if !converged {
            debug!(
                iterations_run,
                final_gradient_norm, "达到最大迭代次数仍未收敛（收敛警告）"
            );
        }

        Ok(OptimizationOutcome {
            optimal_base_stock_levels: best_levels,
            best_cost,
            convergence: ConvergenceInfo {
                converged,
                iterations_run,
                final_gradient_norm,
                tolerance: params.tolerance,
            },
            history,
        })
    }
}

// ==========================================
// 初始水平播种
// ==========================================

/// 基在库水平初始值
///
/// S_i = μ_eff·RLT_i + z_i·σ_eff·√RLT_i, 其中 RLT 为定期盘点补货
/// 提前期, z_i 取品目临界率 b/(b+h) 的正态分位数（成本未定义时
/// 退回默认服务水平系数）。
pub fn initial_base_stock_levels(net: &NetworkModel) -> EngineResult<Vec<f64>> {
    let (mu_eff, sigma_eff) = net.effective_demand()?;
    let rlt = net.review_lead_times()?;
    Ok((0..net.len())
        .map(|i| {
            let it = net.item(i);
            let z = if it.stockout_cost > 0.0 && it.holding_cost > 0.0 {
                newsvendor::normal_quantile(newsvendor::critical_ratio(
                    it.stockout_cost,
                    it.holding_cost,
                ))
            } else {
                defaults::SERVICE_LEVEL_Z
            };
            let p = rlt[i] as f64;
            (mu_eff[i] * p + z * sigma_eff[i] * p.sqrt()).max(0.0)
        })
        .collect())
}
