// ==========================================
// 多级库存优化引擎 - 多级网络补货仿真器
// ==========================================
// 职责: 按期推进补货方策下的实物库存动态, 产出成本与服务统计
// 并行: 副本级 rayon 扇出; 单副本内期序因果有序, 严格串行
// 红线: 分摊一次成行 - 同期内任何父件不得观测到兄弟父件
//       已耗用的子件余量（守恒: 子件出货 ≤ 期初在库）
// ==========================================

use rand::rngs::StdRng;
use rand::SeedableRng;
use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, instrument};

use crate::config::defaults;
use crate::domain::error::ModelError;
use crate::domain::network::NetworkModel;
use crate::domain::types::{DemandSpec, ReplenishmentPolicy};
use crate::engine::error::{EngineError, EngineResult};

// ==========================================
// SimulationParams - 仿真参数
// ==========================================
#[derive(Debug, Clone)]
pub struct SimulationParams {
    /// 独立副本数
    pub n_samples: usize,
    /// 仿真期间数
    pub n_periods: usize,
    /// 随机数种子（第 k 个副本使用 seed + k）
    pub seed: u64,
}

impl Default for SimulationParams {
    fn default() -> Self {
        Self {
            n_samples: defaults::N_SAMPLES,
            n_periods: defaults::N_PERIODS,
            seed: defaults::RANDOM_SEED,
        }
    }
}

// ==========================================
// SimulationReport - 仿真结果
// ==========================================
#[derive(Debug, Clone, Serialize)]
pub struct SimulationReport {
    /// 期均总成本（副本均值）
    pub average_cost: f64,
    /// 期均保管成本
    pub average_holding_cost: f64,
    /// 期均品切成本
    pub average_backorder_cost: f64,
    /// 单位满足率（立即从在库满足的需求量占比）
    pub fill_rate: f64,
    /// 品切期占比（末端品目期末欠货的期数占比）
    pub stockout_rate: f64,
    /// 各品目的边际成本信号（梯度估计, 与品目序一致）
    pub gradient: Vec<f64>,
    /// 各品目的在库量轨迹（副本均值, 品目 × 期）
    pub mean_on_hand: Vec<Vec<f64>>,
    pub n_samples: usize,
    pub n_periods: usize,
}

/// 单副本的统计汇总
struct ReplicationOutcome {
    holding_cost: f64,
    backorder_cost: f64,
    demand_units: f64,
    filled_units: f64,
    end_item_periods: usize,
    stockout_periods: usize,
    /// 每品目的边际成本累计（各期 −b / +h 之和）
    grad_sum: Vec<f64>,
    /// 每品目每期的期末在库量
    on_hand_path: Vec<Vec<f64>>,
}

// ==========================================
// EchelonSimulator - 多级补货仿真引擎
// ==========================================
pub struct EchelonSimulator {
    // 无状态引擎，不需要注入依赖
}

impl Default for EchelonSimulator {
    fn default() -> Self {
        Self::new()
    }
}

impl EchelonSimulator {
    pub fn new() -> Self {
        Self {}
    }

    // ==========================================
    // 核心方法
    // ==========================================

    /// 仿真给定补货方策下的网络动态
    ///
    /// 需求口径: `demand` 给出各末端品目的需求规格; 为 None 时按品目
    /// 主数据的 (avg_demand, demand_std) 生成截断正态需求。
    ///
    /// 确定性: 相同 (网络, 方策, seed, n_samples, n_periods) 的重复调用
    /// 产生逐位一致的轨迹与统计。
    #[instrument(skip(self, net, policy, demand), fields(n_items = net.len(), n_samples = params.n_samples, n_periods = params.n_periods))]
    pub fn simulate(
        &self,
        net: &NetworkModel,
        policy: &ReplenishmentPolicy,
        demand: Option<&[(String, DemandSpec)]>,
        params: &SimulationParams,
    ) -> EngineResult<SimulationReport> {
        // ===== 输入校验（结构性错误先于仿真检出）=====
        let order = net.topological_order()?;
        let n = net.len();
        if params.n_periods == 0 || params.n_samples == 0 {
            return Err(ModelError::Validation(
                "仿真期间数与副本数必须为正".to_string(),
            )
            .into());
        }
        if policy.len() != n {
            return Err(ModelError::Validation(format!(
                "方策参数长度 {} 与品目数 {} 不一致",
                policy.len(),
                n
            ))
            .into());
        }
        if !policy.is_finite() {
            return Err(EngineError::SimulationFailure(
                "方策参数包含非有限值".to_string(),
            ));
        }
        for i in 0..n {
            if net.item(i).lead_time == 0 {
                return Err(ModelError::Validation(format!(
                    "品目 {} 的提前期必须 ≥ 1（本期下单最早次期到货）",
                    net.name(i)
                ))
                .into());
            }
        }

        // ===== 需求规格解析: 每个末端品目一份 =====
        let mut specs: Vec<Option<DemandSpec>> = vec![None; n];
        for &i in &net.end_items() {
            let it = net.item(i);
            specs[i] = Some(DemandSpec::Normal {
                mean: it.avg_demand,
                std_dev: it.demand_std,
            });
        }
        if let Some(overrides) = demand {
            for (name, spec) in overrides {
                let i = net.index_of(name).ok_or_else(|| {
                    ModelError::Validation(format!("需求规格引用了未知品目: {}", name))
                })?;
                if !net.is_end_item(i) {
                    return Err(ModelError::Validation(format!(
                        "品目 {} 不是末端品目, 不能指定外部需求",
                        name
                    ))
                    .into());
                }
                spec.validate(params.n_periods)?;
                specs[i] = Some(spec.clone());
            }
        }

        // 仿真访问序: 需求端（末端品目）先行, 向上游传播
        let visit: Vec<usize> = order.iter().rev().copied().collect();

        // ===== 副本级并行扇出 =====
        let outcomes: Vec<EngineResult<ReplicationOutcome>> = (0..params.n_samples)
            .into_par_iter()
            .map(|k| {
                let mut rng = StdRng::seed_from_u64(params.seed.wrapping_add(k as u64));
                Self::run_replication(net, policy, &specs, &visit, params.n_periods, &mut rng)
            })
            .collect();

        // ===== 汇总 =====
        let mut reps = Vec::with_capacity(outcomes.len());
        for o in outcomes {
            reps.push(o?);
        }
        let ns = reps.len() as f64;
        let np = params.n_periods as f64;

        let holding: f64 = reps.iter().map(|r| r.holding_cost).sum::<f64>() / ns / np;
        let backorder: f64 = reps.iter().map(|r| r.backorder_cost).sum::<f64>() / ns / np;
        let demand_units: f64 = reps.iter().map(|r| r.demand_units).sum();
        let filled_units: f64 = reps.iter().map(|r| r.filled_units).sum();
        let end_periods: usize = reps.iter().map(|r| r.end_item_periods).sum();
        let stockouts: usize = reps.iter().map(|r| r.stockout_periods).sum();

        let gradient: Vec<f64> = (0..n)
            .map(|i| reps.iter().map(|r| r.grad_sum[i]).sum::<f64>() / ns / np)
            .collect();
        let mean_on_hand: Vec<Vec<f64>> = (0..n)
            .map(|i| {
                (0..params.n_periods)
                    .map(|t| reps.iter().map(|r| r.on_hand_path[i][t]).sum::<f64>() / ns)
                    .collect()
            })
            .collect();

        let average_cost = holding + backorder;
        if !average_cost.is_finite() {
            return Err(EngineError::SimulationFailure(
                "平均成本非有限, 能力/分摊配置退化".to_string(),
            ));
        }

        debug!(average_cost, fill_rate = filled_units / demand_units.max(1.0), "仿真完成");
        Ok(SimulationReport {
            average_cost,
            average_holding_cost: holding,
            average_backorder_cost: backorder,
            fill_rate: if demand_units > 0.0 {
                filled_units / demand_units
            } else {
                1.0
            },
            stockout_rate: if end_periods > 0 {
                stockouts as f64 / end_periods as f64
            } else {
                0.0
            },
            gradient,
            mean_on_hand,
            n_samples: params.n_samples,
            n_periods: params.n_periods,
        })
    }

    // ==========================================
    // 单副本仿真
    // ==========================================

    /// 单副本的期循环
    ///
    /// 每期流程:
    /// 1) 全品目接收本期到货
    /// 2) 末端品目实现并满足外部需求（先清欠货）
    /// 3) 全品目按方策计算期望订货量（0 下限, 能力上限）
    /// 4) 每个子件一次成行地把在库量分摊给各父件的部材需求,
    ///    父件的实际投产量取其全部子件分摊额的最小折算值
    /// 5) 投产量进入父件管道, 提前期后到货
    /// 6) 成本与边际成本信号结算
    fn run_replication(
        net: &NetworkModel,
        policy: &ReplenishmentPolicy,
        specs: &[Option<DemandSpec>],
        visit: &[usize],
        n_periods: usize,
        rng: &mut StdRng,
    ) -> EngineResult<ReplicationOutcome> {
        let n = net.len();
        let lt: Vec<usize> = (0..n).map(|i| net.item(i).lead_time as usize).collect();

        // 期初状态: 在库量 = 方策目标水平, 管道为空
        let mut on_hand: Vec<f64> = (0..n).map(|i| policy.initial_level(i).max(0.0)).collect();
        let mut backlog = vec![0.0f64; n];
        // 管道环形缓冲: pipeline[i][t % lt_i] 为 t 期到货量
        let mut pipeline: Vec<Vec<f64>> = (0..n).map(|i| vec![0.0; lt[i]]).collect();
        let mut in_transit = vec![0.0f64; n];

        let mut desired = vec![0.0f64; n];
        let mut started = vec![0.0f64; n];
        // 本期各品目承接的部材需求合计（子件视角）
        let mut component_req = vec![0.0f64; n];

        let mut out = ReplicationOutcome {
            holding_cost: 0.0,
            backorder_cost: 0.0,
            demand_units: 0.0,
            filled_units: 0.0,
            end_item_periods: 0,
            stockout_periods: 0,
            grad_sum: vec![0.0; n],
            on_hand_path: vec![vec![0.0; n_periods]; n],
        };

        for t in 0..n_periods {
            // ===== 1) 到货 =====
            for i in 0..n {
                let slot = t % lt[i];
                let arriving = pipeline[i][slot];
                pipeline[i][slot] = 0.0;
                on_hand[i] += arriving;
                in_transit[i] -= arriving;
            }

            // ===== 2) 外部需求 + 3) 期望订货量（需求端先行）=====
            for &i in visit {
                if let Some(spec) = &specs[i] {
                    let d = spec.sample(t, rng)?;
                    out.demand_units += d;
                    out.end_item_periods += 1;

                    // 先清欠货, 再满足本期需求
                    let served_backlog = on_hand[i].min(backlog[i]);
                    on_hand[i] -= served_backlog;
                    backlog[i] -= served_backlog;

                    let filled = on_hand[i].min(d);
                    on_hand[i] -= filled;
                    backlog[i] += d - filled;
                    out.filled_units += filled;
                    if backlog[i] > defaults::COST_EPSILON {
                        out.stockout_periods += 1;
                    }
                }

                let ip = on_hand[i] + in_transit[i] - backlog[i];
                desired[i] = policy
                    .desired_order(i, ip)
                    .max(0.0)
                    .min(net.item(i).capacity_or_inf());
            }

            // ===== 4) 分摊（每子件一次成行）=====
            // 子件视角: 本期部材需求合计
            for i in 0..n {
                component_req[i] = 0.0;
            }
            for e in net.edges() {
                component_req[e.child] += desired[e.parent] * e.units;
            }
            // 期初在库快照: 分摊守恒的基准
            let avail_at_alloc = on_hand.clone();

            // 父件投产量 = min over 子件( 分摊额 / units ), 上限为期望订货量
            for &i in visit {
                let mut start_qty = desired[i];
                for e in net.child_edges(i) {
                    let c = e.child;
                    let req = desired[i] * e.units;
                    let share = if component_req[c] <= avail_at_alloc[c] + defaults::COST_EPSILON
                    {
                        req
                    } else if let Some(a) = e.allocation {
                        // 显式分摊: 子件在库 × 比例, 不超过本父件需求,
                        // 兄弟父件未用完的份额不在本期内二次分配
                        req.min(avail_at_alloc[c] * a)
                    } else {
                        // 比例回退: 按未决部材需求占比分摊
                        avail_at_alloc[c] * req / component_req[c]
                    };
                    start_qty = start_qty.min(share / e.units);
                }
                started[i] = start_qty.max(0.0);
            }

            // ===== 5) 耗用子件在库 + 投产入管道 =====
            for &i in visit {
                for e in net.child_edges(i) {
                    on_hand[e.child] -= started[i] * e.units;
                    // 浮点残差截断: 分摊规则保证不超耗
                    if on_hand[e.child] < 0.0 {
                        on_hand[e.child] = 0.0;
                    }
                }
                if started[i] > 0.0 {
                    let arrive_slot = t % lt[i];
                    pipeline[i][arrive_slot] += started[i];
                    in_transit[i] += started[i];
                }
            }

            // ===== 6) 成本与梯度信号结算 =====
            for i in 0..n {
                let it = net.item(i);
                out.holding_cost += it.holding_cost * on_hand[i].max(0.0);
                out.backorder_cost += it.stockout_cost * backlog[i];

                // 边际成本信号: 本期为瓶颈取 −b, 否则取 +h
                let binding = if net.is_end_item(i) {
                    backlog[i] > defaults::COST_EPSILON
                } else {
                    component_req[i] > avail_at_alloc[i] + defaults::COST_EPSILON
                };
                out.grad_sum[i] += if binding {
                    -it.stockout_cost
                } else {
                    it.holding_cost
                };

                out.on_hand_path[i][t] = on_hand[i];

                if !on_hand[i].is_finite() || !backlog[i].is_finite() {
                    return Err(EngineError::SimulationFailure(format!(
                        "品目 {} 在第 {} 期出现非有限库存状态",
                        net.name(i),
                        t
                    )));
                }
            }
        }

        Ok(out)
    }
}
