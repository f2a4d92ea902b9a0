// ==========================================
// 多级库存优化引擎 - 领域类型定义
// ==========================================
// 补货方策: 标签化变体 + 每类订货量函数, 由单一仿真循环消费
// ==========================================

use rand::rngs::StdRng;
use rand_distr::{Distribution, Exp, Gamma, LogNormal, Normal, Poisson, Uniform};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::error::{ModelError, ModelResult};

// ==========================================
// 补货方策 (Replenishment Policy)
// ==========================================
// 每品目一组标量参数; 仿真循环按变体计算期望订货量
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum ReplenishmentPolicy {
    /// 基在库方策: 每期补至固定目标水平 S
    #[serde(rename = "base_stock")]
    BaseStock {
        /// 各品目的基在库水平（与品目序一致）
        levels: Vec<f64>,
    },
    /// (s,S) 方策: 库存位置低于 s 时补至 S
    #[serde(rename = "s_s")]
    SS {
        reorder_points: Vec<f64>,
        order_up_to: Vec<f64>,
    },
    /// (Q,R) 方策: 库存位置不高于 R 时订购固定批量 Q
    #[serde(rename = "q_r")]
    QR {
        order_quantities: Vec<f64>,
        reorder_points: Vec<f64>,
    },
}

impl ReplenishmentPolicy {
    /// 方策参数向量长度（必须等于品目数）
    pub fn len(&self) -> usize {
        match self {
            ReplenishmentPolicy::BaseStock { levels } => levels.len(),
            ReplenishmentPolicy::SS { order_up_to, .. } => order_up_to.len(),
            ReplenishmentPolicy::QR { order_quantities, .. } => order_quantities.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 期初目标库存（仿真的初始在库水平）
    pub fn initial_level(&self, i: usize) -> f64 {
        match self {
            ReplenishmentPolicy::BaseStock { levels } => levels[i],
            ReplenishmentPolicy::SS { order_up_to, .. } => order_up_to[i],
            ReplenishmentPolicy::QR {
                order_quantities,
                reorder_points,
            } => reorder_points[i] + order_quantities[i],
        }
    }

    /// 期望订货量: 按方策变体对库存位置 ip 计算（未截断、未计能力）
    pub fn desired_order(&self, i: usize, ip: f64) -> f64 {
        match self {
            ReplenishmentPolicy::BaseStock { levels } => (levels[i] - ip).max(0.0),
            ReplenishmentPolicy::SS {
                reorder_points,
                order_up_to,
            } => {
                if ip < reorder_points[i] {
                    (order_up_to[i] - ip).max(0.0)
                } else {
                    0.0
                }
            }
            ReplenishmentPolicy::QR {
                order_quantities,
                reorder_points,
            } => {
                if ip <= reorder_points[i] {
                    order_quantities[i]
                } else {
                    0.0
                }
            }
        }
    }

    /// 方策参数是否全部有限（NaN/∞ 视为退化配置）
    pub fn is_finite(&self) -> bool {
        let all = |v: &[f64]| v.iter().all(|x| x.is_finite());
        match self {
            ReplenishmentPolicy::BaseStock { levels } => all(levels),
            ReplenishmentPolicy::SS {
                reorder_points,
                order_up_to,
            } => all(reorder_points) && all(order_up_to),
            ReplenishmentPolicy::QR {
                order_quantities,
                reorder_points,
            } => all(order_quantities) && all(reorder_points),
        }
    }

    /// 方策种类名（用于对比报表）
    pub fn kind_name(&self) -> &'static str {
        match self {
            ReplenishmentPolicy::BaseStock { .. } => "base_stock",
            ReplenishmentPolicy::SS { .. } => "s_s",
            ReplenishmentPolicy::QR { .. } => "q_r",
        }
    }
}

// ==========================================
// 需求规格 (Demand Specification)
// ==========================================
// 两种调用口径: 固定需求序列 / 分布规格逐期抽样
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "distribution", rename_all = "snake_case")]
pub enum DemandSpec {
    /// 固定需求序列（长度必须覆盖仿真期间数）
    Fixed { series: Vec<f64> },
    /// 正态分布（0 处截断）
    Normal { mean: f64, std_dev: f64 },
    /// 泊松分布
    Poisson { lambda: f64 },
    /// 均匀分布
    Uniform { low: f64, high: f64 },
    /// 指数分布（按均值参数化）
    Exponential { mean: f64 },
    /// 伽马分布
    Gamma { shape: f64, scale: f64 },
    /// 对数正态分布（底层正态的 mu/sigma）
    LogNormal { mu: f64, sigma: f64 },
}

impl DemandSpec {
    /// 校验参数并检查固定序列长度
    pub fn validate(&self, n_periods: usize) -> ModelResult<()> {
        let bad = |msg: String| Err(ModelError::Validation(msg));
        match self {
            DemandSpec::Fixed { series } => {
                if series.len() < n_periods {
                    return bad(format!(
                        "固定需求序列长度 {} 小于仿真期间数 {}",
                        series.len(),
                        n_periods
                    ));
                }
                if series.iter().any(|d| !d.is_finite() || *d < 0.0) {
                    return bad("固定需求序列包含负值或非有限值".to_string());
                }
            }
            DemandSpec::Normal { std_dev, .. } => {
                if *std_dev < 0.0 {
                    return bad("正态需求的标准差不能为负".to_string());
                }
            }
            DemandSpec::Poisson { lambda } => {
                if *lambda <= 0.0 {
                    return bad("泊松需求的 lambda 必须为正".to_string());
                }
            }
            DemandSpec::Uniform { low, high } => {
                if low > high || *low < 0.0 {
                    return bad("均匀需求要求 0 ≤ low ≤ high".to_string());
                }
            }
            DemandSpec::Exponential { mean } => {
                if *mean <= 0.0 {
                    return bad("指数需求的均值必须为正".to_string());
                }
            }
            DemandSpec::Gamma { shape, scale } => {
                if *shape <= 0.0 || *scale <= 0.0 {
                    return bad("伽马需求的 shape/scale 必须为正".to_string());
                }
            }
            DemandSpec::LogNormal { sigma, .. } => {
                if *sigma < 0.0 {
                    return bad("对数正态需求的 sigma 不能为负".to_string());
                }
            }
        }
        Ok(())
    }

    /// 抽取第 t 期需求（非负）
    ///
    /// 分布参数已在 `validate` 中检查，此处构造失败视为校验遗漏。
    pub fn sample(&self, t: usize, rng: &mut StdRng) -> ModelResult<f64> {
        let draw_err =
            |e: String| ModelError::Validation(format!("需求分布参数非法: {}", e));
        let v = match self {
            DemandSpec::Fixed { series } => series[t],
            DemandSpec::Normal { mean, std_dev } => {
                if *std_dev == 0.0 {
                    *mean
                } else {
                    Normal::new(*mean, *std_dev)
                        .map_err(|e| draw_err(e.to_string()))?
                        .sample(rng)
                }
            }
            DemandSpec::Poisson { lambda } => Poisson::new(*lambda)
                .map_err(|e| draw_err(e.to_string()))?
                .sample(rng),
            DemandSpec::Uniform { low, high } => {
                if low == high {
                    *low
                } else {
                    Uniform::new(*low, *high).sample(rng)
                }
            }
            DemandSpec::Exponential { mean } => Exp::new(1.0 / *mean)
                .map_err(|e| draw_err(e.to_string()))?
                .sample(rng),
            DemandSpec::Gamma { shape, scale } => Gamma::new(*shape, *scale)
                .map_err(|e| draw_err(e.to_string()))?
                .sample(rng),
            DemandSpec::LogNormal { mu, sigma } => LogNormal::new(*mu, *sigma)
                .map_err(|e| draw_err(e.to_string()))?
                .sample(rng),
        };
        // 非负需求分布在 0 处截断
        Ok(v.max(0.0))
    }
}

// ==========================================
// 梯度优化算法 (Optimizer Algorithm)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptimAlgorithm {
    Sgd,
    Momentum,
    Adam,
}

impl Default for OptimAlgorithm {
    fn default() -> Self {
        OptimAlgorithm::Adam
    }
}

impl fmt::Display for OptimAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptimAlgorithm::Sgd => write!(f, "sgd"),
            OptimAlgorithm::Momentum => write!(f, "momentum"),
            OptimAlgorithm::Adam => write!(f, "adam"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn test_desired_order_per_kind() {
        let base = ReplenishmentPolicy::BaseStock { levels: vec![100.0] };
        assert_eq!(base.desired_order(0, 80.0), 20.0);
        assert_eq!(base.desired_order(0, 120.0), 0.0);

        let ss = ReplenishmentPolicy::SS {
            reorder_points: vec![50.0],
            order_up_to: vec![100.0],
        };
        assert_eq!(ss.desired_order(0, 60.0), 0.0);
        assert_eq!(ss.desired_order(0, 40.0), 60.0);

        let qr = ReplenishmentPolicy::QR {
            order_quantities: vec![30.0],
            reorder_points: vec![50.0],
        };
        assert_eq!(qr.desired_order(0, 50.0), 30.0);
        assert_eq!(qr.desired_order(0, 51.0), 0.0);
    }

    #[test]
    fn test_demand_sample_nonnegative() {
        let mut rng = StdRng::seed_from_u64(7);
        // 均值远小于标准差, 截断必然发生
        let spec = DemandSpec::Normal {
            mean: 1.0,
            std_dev: 50.0,
        };
        for t in 0..200 {
            assert!(spec.sample(t, &mut rng).unwrap() >= 0.0);
        }
    }

    #[test]
    fn test_fixed_series_too_short() {
        let spec = DemandSpec::Fixed {
            series: vec![1.0, 2.0],
        };
        assert!(spec.validate(3).is_err());
        assert!(spec.validate(2).is_ok());
    }

    #[test]
    fn test_policy_serde_tag() {
        let p = ReplenishmentPolicy::BaseStock {
            levels: vec![10.0],
        };
        let json = serde_json::to_string(&p).unwrap();
        assert!(json.contains("\"kind\":\"base_stock\""));
    }
}
