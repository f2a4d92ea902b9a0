// ==========================================
// 多级库存优化引擎 - 禁忌搜索安全库存分配器
// ==========================================
// 职责: 一般（非树形）网络上的安全库存近似配置
// 状态机: 当前解 + 全局最优解 + (品目, 方向) 禁忌表
// 输出: 最优覆盖配置 + 单调不增的最优成本轨迹
// ==========================================

use serde::Serialize;
use tracing::{debug, instrument};

use crate::config::defaults;
use crate::domain::network::NetworkModel;
use crate::engine::error::EngineResult;

// ==========================================
// TabuParams - 搜索参数
// ==========================================
#[derive(Debug, Clone)]
pub struct TabuParams {
    /// 最大迭代次数
    pub max_iter: usize,
    /// 禁忌期（迭代数）
    pub tabu_tenure: usize,
    /// 服务水平安全系数
    pub z: f64,
}

impl Default for TabuParams {
    fn default() -> Self {
        Self {
            max_iter: defaults::TABU_MAX_ITER,
            tabu_tenure: defaults::TABU_TENURE,
            z: defaults::SERVICE_LEVEL_Z,
        }
    }
}

// ==========================================
// TabuSolution - 搜索结果
// ==========================================
#[derive(Debug, Clone, Serialize)]
pub struct TabuSolution {
    /// 各品目覆盖值（保证服务时间, 与品目序一致）
    pub best_solution: Vec<u32>,
    /// 各品目净补货时间（≥ 0）
    pub net_replenishment_times: Vec<u32>,
    /// 各品目安全库存
    pub safety_stocks: Vec<f64>,
    /// 最优总成本
    pub best_cost: f64,
    /// 每迭代的全局最优成本轨迹（单调不增）
    pub cost_history: Vec<f64>,
    /// 实际执行的迭代数
    pub iterations_run: usize,
}

/// 候选移动: 品目下标 + 方向（+1 / -1）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Move {
    item: usize,
    dir: i8,
}

// ==========================================
// TabuAllocator - 禁忌搜索分配引擎
// ==========================================
pub struct TabuAllocator {
    // 无状态引擎，不需要注入依赖
}

impl Default for TabuAllocator {
    fn default() -> Self {
        Self::new()
    }
}

impl TabuAllocator {
    pub fn new() -> Self {
        Self {}
    }

    // ==========================================
    // 核心方法
    // ==========================================

    /// 在一般网络上搜索安全库存覆盖配置
    ///
    /// 规则:
    /// 1) 邻域 = 单品目覆盖值 ±1（区间 [0, lead_time_ub] 内）
    /// 2) 禁忌表封禁最近提交移动的逆操作 tabu_tenure 个迭代
    /// 3) 渴望准则: 产生新全局最优的移动无视禁忌
    /// 4) 候选平局按最小品目下标、先增后减的顺序裁定
    /// 5) 无改进持续 max_iter × 20% 个迭代即提前终止
    ///
    /// 初始解为全零覆盖, 故 best_cost 不会劣于全零基线。
    #[instrument(skip(self, net), fields(n_items = net.len(), max_iter = params.max_iter))]
    pub fn allocate(&self, net: &NetworkModel, params: &TabuParams) -> EngineResult<TabuSolution> {
        // 结构性校验先行（循环依赖在此检出）
        net.topological_order()?;
        let (_, sigma_eff) = net.effective_demand()?;
        let n = net.len();

        let stall_window =
            ((params.max_iter as f64 * defaults::TABU_STALL_FRACTION).ceil() as usize).max(1);

        let mut current = vec![0u32; n];
        let mut current_cost = Self::evaluate(net, &current, params.z, &sigma_eff);
        let mut best = current.clone();
        let mut best_cost = current_cost;
        let mut cost_history = vec![best_cost];

        // 禁忌表: (品目, 方向) → 封禁截止迭代
        let mut tabu_until = vec![[0usize; 2]; n];
        let dir_slot = |dir: i8| if dir > 0 { 0 } else { 1 };

        let mut last_improve = 0usize;
        let mut iterations_run = 0usize;

        for iter in 0..params.max_iter {
            iterations_run = iter + 1;

            // 枚举邻域候选, 取最优可行移动
            let mut chosen: Option<(Move, f64)> = None;
            for item in 0..n {
                for &dir in &[1i8, -1i8] {
                    let ub = net.item(item).lead_time_ub;
                    let cur = current[item];
                    let next = match dir {
                        1 if cur < ub => cur + 1,
                        -1 if cur > 0 => cur - 1,
                        _ => continue,
                    };

                    current[item] = next;
                    let cand_cost = Self::evaluate(net, &current, params.z, &sigma_eff);
                    current[item] = cur;

                    let is_tabu = tabu_until[item][dir_slot(dir)] > iter;
                    let aspiration = cand_cost < best_cost - defaults::COST_EPSILON;
                    if is_tabu && !aspiration {
                        continue;
                    }

                    // 严格更优才替换, 平局自然落在更小下标/先增方向
                    let better = match &chosen {
                        None => true,
                        Some((_, c)) => cand_cost < c - defaults::COST_EPSILON,
                    };
                    if better {
                        chosen = Some((Move { item, dir }, cand_cost));
                    }
                }
            }

            let Some((mv, cand_cost)) = chosen else {
                // 所有移动均被禁忌且无渴望触发, 搜索停滞
                cost_history.push(best_cost);
                break;
            };

            // 提交移动并封禁其逆操作
            match mv.dir {
                1 => current[mv.item] += 1,
                _ => current[mv.item] -= 1,
            }
            current_cost = cand_cost;
            tabu_until[mv.item][dir_slot(-mv.dir)] = iter + params.tabu_tenure + 1;

            if current_cost < best_cost - defaults::COST_EPSILON {
                best_cost = current_cost;
                best = current.clone();
                last_improve = iter;
            }
            cost_history.push(best_cost);

            if iter - last_improve >= stall_window {
                debug!(iter, stall_window, "无改进窗口耗尽, 提前终止");
                break;
            }
        }

        let nrt = Self::coverage_nrt(net, &best);
        let safety_stocks: Vec<f64> = (0..n)
            .map(|i| params.z * sigma_eff[i] * (nrt[i] as f64).sqrt())
            .collect();

        debug!(best_cost, iterations_run, "禁忌搜索完成");
        Ok(TabuSolution {
            best_solution: best,
            net_replenishment_times: nrt,
            safety_stocks,
            best_cost,
            cost_history,
            iterations_run,
        })
    }

    // ==========================================
    // 内部辅助
    // ==========================================

    /// 各品目所需覆盖时间（净补货时间, 0 下限截断）
    ///
    /// 子件同时供给多个父件时, 承诺值须满足最紧的父件约束,
    /// 故入境等待取全部子件承诺值的最大值。
    fn coverage_nrt(net: &NetworkModel, coverage: &[u32]) -> Vec<u32> {
        (0..net.len())
            .map(|i| {
                let inbound = net
                    .child_edges(i)
                    .map(|e| coverage[e.child])
                    .max()
                    .unwrap_or(0);
                let nrt =
                    net.item(i).proc_time as i64 + inbound as i64 - coverage[i] as i64;
                nrt.max(0) as u32
            })
            .collect()
    }

    /// 总安全库存保管成本（与精确求解器同一成本式, 逐品目局部求值）
    fn evaluate(net: &NetworkModel, coverage: &[u32], z: f64, sigma_eff: &[f64]) -> f64 {
        Self::coverage_nrt(net, coverage)
            .iter()
            .enumerate()
            .map(|(i, &nrt)| net.item(i).holding_cost * z * sigma_eff[i] * (nrt as f64).sqrt())
            .sum()
    }
}
