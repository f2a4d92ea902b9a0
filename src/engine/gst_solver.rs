// ==========================================
// 多级库存优化引擎 - 保证服务时间精确求解器
// ==========================================
// 依据: Graves & Willems (2003) 保证服务时间模型
// ==========================================
// 职责: 树形网络上的安全库存配置精确动态规划
// 输入: 树形 NetworkModel + 服务水平系数 z
// 输出: 各品目的保证交付时间 L* / 净补货时间 NRT / 安全库存
// 复杂度: O(N × R²), N 品目数, R 边界区间宽度
// ==========================================

use serde::Serialize;
use tracing::{debug, instrument};

use crate::config::defaults;
use crate::domain::network::NetworkModel;
use crate::engine::error::{EngineError, EngineResult};

// ==========================================
// GstSolution - 求解结果
// ==========================================
#[derive(Debug, Clone, Serialize)]
pub struct GstSolution {
    /// 各品目保证交付时间 L*（与品目序一致）
    pub guaranteed_lead_times: Vec<u32>,
    /// 各品目净补货时间 NRT
    pub net_replenishment_times: Vec<u32>,
    /// 各品目安全库存 z·σ·√NRT
    pub safety_stocks: Vec<f64>,
    /// 各品目安全库存保管成本
    pub item_costs: Vec<f64>,
    /// 总安全库存保管成本
    pub total_cost: f64,
}

/// 单品目单候选的 DP 状态
#[derive(Debug, Clone, Copy)]
struct Candidate {
    /// 子树最小成本（含本品目）
    cost: f64,
    /// 本品目在该候选下的净补货时间
    nrt: u32,
    /// 计划的子件入境等待时间（对子件施加的约束上限）
    inbound: u32,
    /// 本候选对应的 L*
    lead_time: u32,
}

impl Candidate {
    /// 平局规则: 低成本优先, 再取小 NRT, 再取小 L*
    fn better_than(&self, other: &Candidate) -> bool {
        if self.cost < other.cost - defaults::COST_EPSILON {
            return true;
        }
        if self.cost > other.cost + defaults::COST_EPSILON {
            return false;
        }
        self.nrt < other.nrt || (self.nrt == other.nrt && self.lead_time < other.lead_time)
    }
}

// ==========================================
// GstSolver - 保证服务时间求解引擎
// ==========================================
pub struct GstSolver {
    // 无状态引擎，不需要注入依赖
}

impl Default for GstSolver {
    fn default() -> Self {
        Self::new()
    }
}

impl GstSolver {
    pub fn new() -> Self {
        Self {}
    }

    // ==========================================
    // 核心方法
    // ==========================================

    /// 求解树形网络的保证服务时间配置
    ///
    /// 约束:
    /// - lead_time_lb(i) ≤ L*(i) ≤ lead_time_ub(i)
    /// - NRT(i) = proc_time(i) + 计划入境等待 − L*(i) ≥ 0,
    ///   其中计划入境等待 ≥ max(L*(children))
    ///
    /// 平局规则: 成本相等时取最小 NRT（覆盖最紧), 再相等取最小 L*,
    /// 保证重复求解结果逐位一致。
    #[instrument(skip(self, net), fields(n_items = net.len()))]
    pub fn solve(&self, net: &NetworkModel, z: f64) -> EngineResult<GstSolution> {
        // 前置校验: 树形结构与边界合法性
        let order = net.topological_order()?;
        if !net.is_tree() {
            let offender = (0..net.len())
                .find(|&i| net.parent_edges(i).count() > 1)
                .map(|i| net.name(i).to_string())
                .unwrap_or_else(|| "存在循环依赖".to_string());
            return Err(EngineError::NotATree(format!(
                "品目 {} 存在多个父件, 请改用禁忌搜索分配器",
                offender
            )));
        }
        for i in 0..net.len() {
            let it = net.item(i);
            if it.lead_time_lb > it.lead_time_ub {
                return Err(EngineError::InfeasibleBounds(format!(
                    "品目 {} 的交付时间边界倒置: [{}, {}]",
                    it.name, it.lead_time_lb, it.lead_time_ub
                )));
            }
        }

        let n = net.len();
        let (_, sigma_eff) = net.effective_demand()?;

        // dp[i][l - lb_i]: 品目 i 承诺 L*=l 时的子树最优候选
        let mut dp: Vec<Vec<Option<Candidate>>> = vec![Vec::new(); n];
        // prefix[i][k]: 约束 L* ≤ lb_i + k 下的子树最优候选（前缀最优）
        let mut prefix: Vec<Vec<Option<Candidate>>> = vec![Vec::new(); n];

        for &i in &order {
            let it = net.item(i);
            let (lb, ub) = (it.lead_time_lb, it.lead_time_ub);
            let children: Vec<usize> = net.child_edges(i).map(|e| e.child).collect();

            // 子件入境等待时间 m 的候选区间
            let (m_lo, m_hi) = if children.is_empty() {
                (0u32, 0u32)
            } else {
                (
                    children
                        .iter()
                        .map(|&c| net.item(c).lead_time_lb)
                        .max()
                        .unwrap_or(0),
                    children
                        .iter()
                        .map(|&c| net.item(c).lead_time_ub)
                        .max()
                        .unwrap_or(0),
                )
            };

            let mut table = vec![None; (ub - lb + 1) as usize];
            for l in lb..=ub {
                let mut best: Option<Candidate> = None;
                for m in m_lo..=m_hi {
                    // 下游可行性: NRT ≥ 0
                    let nrt_i64 = it.proc_time as i64 + m as i64 - l as i64;
                    if nrt_i64 < 0 {
                        continue;
                    }
                    let nrt = nrt_i64 as u32;

                    // 子件在入境约束 L*(c) ≤ m 下的最优成本之和
                    let mut children_cost = 0.0;
                    let mut feasible = true;
                    for &c in &children {
                        match Self::prefix_at(net, &prefix[c], c, m) {
                            Some(cand) => children_cost += cand.cost,
                            None => {
                                feasible = false;
                                break;
                            }
                        }
                    }
                    if !feasible {
                        continue;
                    }

                    let own = it.holding_cost * z * sigma_eff[i] * (nrt as f64).sqrt();
                    let cand = Candidate {
                        cost: own + children_cost,
                        nrt,
                        inbound: m,
                        lead_time: l,
                    };
                    best = match best {
                        None => Some(cand),
                        Some(cur) => Some(if cand.better_than(&cur) { cand } else { cur }),
                    };
                }
                table[(l - lb) as usize] = best;
            }

            if table.iter().all(Option::is_none) {
                return Err(EngineError::InfeasibleBounds(format!(
                    "品目 {} 在边界 [{}, {}] 内无可行的保证交付时间",
                    it.name, lb, ub
                )));
            }

            // 前缀最优（按与候选选取相同的平局规则）
            let mut run: Option<Candidate> = None;
            let pref: Vec<Option<Candidate>> = table
                .iter()
                .map(|cand| {
                    if let Some(c) = cand {
                        run = match run {
                            None => Some(*c),
                            Some(cur) => Some(if c.better_than(&cur) { *c } else { cur }),
                        };
                    }
                    run
                })
                .collect();

            dp[i] = table;
            prefix[i] = pref;
        }

        // 根节点选型后自顶向下回溯
        let mut chosen: Vec<Option<Candidate>> = vec![None; n];
        for &i in order.iter().rev() {
            let it = net.item(i);
            let cand = if net.is_end_item(i) {
                // 根: 全区间最优即前缀表末项
                prefix[i].last().copied().flatten()
            } else {
                // 非根: 受父件计划入境等待约束
                let parent_cand = net
                    .parent_edges(i)
                    .next()
                    .and_then(|e| chosen[e.parent]);
                match parent_cand {
                    Some(p) => Self::prefix_at(net, &prefix[i], i, p.inbound),
                    None => None,
                }
            };
            chosen[i] = Some(cand.ok_or_else(|| {
                EngineError::InfeasibleBounds(format!("品目 {} 无可行解", it.name))
            })?);
        }

        let chosen: Vec<Candidate> = chosen.into_iter().map(|c| c.unwrap_or(Candidate {
            cost: 0.0,
            nrt: 0,
            inbound: 0,
            lead_time: 0,
        })).collect();
        let guaranteed_lead_times: Vec<u32> = chosen.iter().map(|c| c.lead_time).collect();
        let nrt: Vec<u32> = chosen.iter().map(|c| c.nrt).collect();
        let safety_stocks: Vec<f64> = (0..n)
            .map(|i| z * sigma_eff[i] * (nrt[i] as f64).sqrt())
            .collect();
        let item_costs: Vec<f64> = (0..n)
            .map(|i| net.item(i).holding_cost * safety_stocks[i])
            .collect();
        let total_cost = item_costs.iter().sum();

        debug!(total_cost, "保证服务时间求解完成");
        Ok(GstSolution {
            guaranteed_lead_times,
            net_replenishment_times: nrt,
            safety_stocks,
            item_costs,
            total_cost,
        })
    }

    // ==========================================
    // 内部辅助
    // ==========================================

    /// 品目 i 在约束 L* ≤ cap 下的前缀最优候选
    fn prefix_at(
        net: &NetworkModel,
        prefix: &[Option<Candidate>],
        i: usize,
        cap: u32,
    ) -> Option<Candidate> {
        let lb = net.item(i).lead_time_lb;
        if cap < lb {
            return None;
        }
        let k = ((cap - lb) as usize).min(prefix.len().saturating_sub(1));
        prefix.get(k).copied().flatten()
    }
}
