// ==========================================
// 多级库存优化引擎 - 库存优化 API
// ==========================================
// 职责: 每个契约操作一个方法; 输入防卫 → 构网 → 调引擎 → 组装载荷
// 架构: API 层 → 引擎层, 每次调用独立构建网络模型, 无跨调用状态
// ==========================================

use tracing::info;

use crate::api::error::{ApiError, ApiResult};
use crate::api::types::*;
use crate::domain::network::NetworkModel;
use crate::engine::lr_finder::{self, LrFinderParams, OneCycleSchedule};
use crate::engine::newsvendor;
use crate::engine::optimizer::{OptimizerParams, PolicyGradientOptimizer};
use crate::engine::simulator::{EchelonSimulator, SimulationParams};
use crate::engine::tabu_allocator::{TabuAllocator, TabuParams};
use crate::engine::GstSolver;

// ==========================================
// InventoryApi - 库存优化 API
// ==========================================
pub struct InventoryApi {
    // 无状态接口, 每次调用独立求解
}

impl Default for InventoryApi {
    fn default() -> Self {
        Self::new()
    }
}

impl InventoryApi {
    pub fn new() -> Self {
        Self {}
    }

    // ==========================================
    // 网络分析
    // ==========================================

    /// 分析网络结构, 返回节点/边/度数摘要
    pub fn analyze_network(&self, req: NetworkRequest) -> ApiResult<AnalyzePayload> {
        let net = NetworkModel::build(req.items, req.edges)?;
        // 结构摘要不要求无环, 但循环网络对所有求解器均不可用, 先行检出
        net.topological_order()?;
        Ok(AnalyzePayload {
            network_summary: net.summary(),
        })
    }

    // ==========================================
    // 安全库存配置
    // ==========================================

    /// 树形网络的保证服务时间精确求解
    pub fn optimize_guaranteed_service(&self, req: GstRequest) -> ApiResult<GstPayload> {
        if req.z <= 0.0 {
            return Err(ApiError::InvalidInput(format!(
                "服务水平系数必须为正: {}",
                req.z
            )));
        }
        let net = NetworkModel::build(req.network.items, req.network.edges)?;
        let solution = GstSolver::new().solve(&net, req.z)?;
        info!(total_cost = solution.total_cost, "保证服务时间求解成功");

        let rows = (0..net.len())
            .map(|i| GstItemRow {
                name: net.name(i).to_string(),
                guaranteed_lead_time: solution.guaranteed_lead_times[i],
                net_replenishment_time: solution.net_replenishment_times[i],
                safety_stock: solution.safety_stocks[i],
                holding_cost: solution.item_costs[i],
            })
            .collect();
        Ok(GstPayload {
            guaranteed_lead_times: rows,
            total_cost: solution.total_cost,
        })
    }

    /// 一般网络的禁忌搜索安全库存分配
    pub fn allocate_safety_stock(&self, req: TabuRequest) -> ApiResult<TabuPayload> {
        if req.z <= 0.0 || req.max_iter == 0 {
            return Err(ApiError::InvalidInput(
                "服务水平系数必须为正且最大迭代次数必须 ≥ 1".to_string(),
            ));
        }
        let net = NetworkModel::build(req.network.items, req.network.edges)?;
        let params = TabuParams {
            max_iter: req.max_iter,
            tabu_tenure: req.tabu_tenure,
            z: req.z,
        };
        let solution = TabuAllocator::new().allocate(&net, &params)?;
        info!(best_cost = solution.best_cost, "禁忌搜索分配成功");

        let rows = (0..net.len())
            .map(|i| TabuItemRow {
                name: net.name(i).to_string(),
                coverage: solution.best_solution[i],
                net_replenishment_time: solution.net_replenishment_times[i],
                safety_stock: solution.safety_stocks[i],
            })
            .collect();
        Ok(TabuPayload {
            best_solution: rows,
            best_cost: solution.best_cost,
            cost_history: solution.cost_history,
            iterations_run: solution.iterations_run,
        })
    }

    // ==========================================
    // 仿真与方策对比
    // ==========================================

    /// 给定方策的网络补货仿真
    pub fn simulate_policy(&self, req: SimulateRequest) -> ApiResult<SimulatePayload> {
        let net = NetworkModel::build(req.network.items, req.network.edges)?;
        let params = SimulationParams {
            n_samples: req.n_samples,
            n_periods: req.n_periods,
            seed: req.seed,
        };
        let report = EchelonSimulator::new().simulate(
            &net,
            &req.policy,
            req.demand.as_deref(),
            &params,
        )?;
        Ok(SimulatePayload {
            item_names: net.items().iter().map(|it| it.name.clone()).collect(),
            report,
        })
    }

    /// 多方策同网同种子对比
    pub fn compare_policies(
        &self,
        req: ComparePoliciesRequest,
    ) -> ApiResult<ComparePoliciesPayload> {
        if req.policies.is_empty() {
            return Err(ApiError::InvalidInput(
                "方策对比至少需要一个方策".to_string(),
            ));
        }
        let net = NetworkModel::build(req.network.items, req.network.edges)?;
        let params = SimulationParams {
            n_samples: req.n_samples,
            n_periods: req.n_periods,
            seed: req.seed,
        };
        let simulator = EchelonSimulator::new();

        let mut rows = Vec::with_capacity(req.policies.len());
        for policy in &req.policies {
            let report =
                simulator.simulate(&net, policy, req.demand.as_deref(), &params)?;
            rows.push(PolicyComparisonRow {
                policy_kind: policy.kind_name().to_string(),
                average_cost: report.average_cost,
                fill_rate: report.fill_rate,
                stockout_rate: report.stockout_rate,
            });
        }
        let best_policy = rows
            .iter()
            .min_by(|a, b| a.average_cost.total_cmp(&b.average_cost))
            .map(|r| r.policy_kind.clone())
            .unwrap_or_default();
        Ok(ComparePoliciesPayload {
            policies: rows,
            best_policy,
        })
    }

    // ==========================================
    // 基在库水平优化
    // ==========================================

    /// 梯度法基在库水平优化（SGD / Momentum / Adam, 可选 One-Cycle）
    pub fn optimize_base_stock(&self, req: OptimizeRequest) -> ApiResult<OptimizePayload> {
        let net = NetworkModel::build(req.network.items, req.network.edges)?;
        let one_cycle = match req.one_cycle_max_lr {
            Some(max_lr) => Some(OneCycleSchedule::build(
                req.max_iterations,
                max_lr,
                crate::config::defaults::CYCLE_MOMENTUM_MIN,
                crate::config::defaults::CYCLE_MOMENTUM_MAX,
            )?),
            None => None,
        };
        let params = OptimizerParams {
            algorithm: req.algorithm,
            learning_rate: req.learning_rate,
            max_iterations: req.max_iterations,
            beta1: req.beta1,
            beta2: req.beta2,
            momentum: req.momentum,
            tolerance: req.tolerance,
            one_cycle,
            simulation: SimulationParams {
                n_samples: req.n_samples,
                n_periods: req.n_periods,
                seed: req.seed,
            },
            ..OptimizerParams::default()
        };
        let outcome =
            PolicyGradientOptimizer::new().optimize(&net, req.initial_levels, &params)?;
        info!(
            best_cost = outcome.best_cost,
            converged = outcome.convergence.converged,
            "基在库水平优化完成"
        );

        let rows = outcome
            .optimal_base_stock_levels
            .iter()
            .enumerate()
            .map(|(i, &level)| BaseStockRow {
                name: net.name(i).to_string(),
                base_stock_level: level,
            })
            .collect();
        Ok(OptimizePayload {
            optimal_base_stock_levels: rows,
            best_cost: outcome.best_cost,
            convergence_info: outcome.convergence,
            optimization_history: outcome.history,
        })
    }

    /// One-Cycle 调度下的基在库水平优化
    ///
    /// 峰值学习率取 one_cycle_max_lr（缺省回退到 learning_rate）,
    /// 学习率与动量按 One-Cycle 曲线反相调度。
    pub fn optimize_one_cycle(&self, mut req: OptimizeRequest) -> ApiResult<OptimizePayload> {
        req.one_cycle_max_lr = Some(req.one_cycle_max_lr.unwrap_or(req.learning_rate));
        self.optimize_base_stock(req)
    }

    /// 学习率区间扫描
    pub fn find_learning_rate(&self, req: LrFinderRequest) -> ApiResult<LrFinderPayload> {
        let net = NetworkModel::build(req.network.items, req.network.edges)?;
        let params = LrFinderParams {
            lr_min: req.lr_min,
            lr_max: req.lr_max,
            num_iterations: req.num_iterations,
            smoothing: req.smoothing,
            simulation: SimulationParams {
                n_samples: req.n_samples,
                n_periods: req.n_periods,
                seed: req.seed,
            },
            ..LrFinderParams::default()
        };
        let outcome = lr_finder::find_learning_rate(&net, req.initial_levels, &params)?;
        Ok(LrFinderPayload {
            lr_history: outcome.lr_history,
            cost_history: outcome.cost_history,
            smoothed_history: outcome.smoothed_history,
            suggested_lr: outcome.suggested_lr,
            best_cost: outcome.best_cost,
            aborted_early: outcome.aborted_early,
        })
    }

    // ==========================================
    // 单品目解析计算
    // ==========================================

    /// 经济发注量计算（含数量折扣）
    pub fn calculate_eoq(&self, req: EoqRequest) -> ApiResult<EoqPayload> {
        let result = match req.discount {
            Some(kind) => newsvendor::eoq_with_discount(
                req.k,
                req.d,
                req.h,
                req.b,
                req.r,
                &req.unit_costs,
                &req.quantity_breaks,
                kind,
            )?,
            None => newsvendor::eoq(req.k, req.d, req.h, req.b)?,
        };
        Ok(EoqPayload { result })
    }

    /// 单品目近似安全库存计算
    pub fn calculate_safety_stock(
        &self,
        req: SafetyStockRequest,
    ) -> ApiResult<SafetyStockPayload> {
        let result = newsvendor::approximate_safety_stock(
            req.mu,
            req.sigma,
            req.lead_time,
            req.b,
            req.h,
            req.fixed_cost,
        )?;
        Ok(SafetyStockPayload { result })
    }
}
