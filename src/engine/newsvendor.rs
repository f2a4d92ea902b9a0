// ==========================================
// 多级库存优化引擎 - 单品目解析计算
// ==========================================
// 职责: 经济发注量 (EOQ) / 近似安全库存 / 临界率与正态分位数
// 用途: 独立计算工具 + 梯度优化器的初始水平播种
// ==========================================

use serde::Serialize;

use crate::domain::error::{ModelError, ModelResult};

// ==========================================
// 临界率与正态分布辅助
// ==========================================

/// 临界率 b / (b + h): 报童模型最优服务水平
pub fn critical_ratio(b: f64, h: f64) -> f64 {
    if b + h <= 0.0 {
        return 0.0;
    }
    b / (b + h)
}

/// 标准正态密度 φ(z)
pub fn normal_pdf(z: f64) -> f64 {
    (-0.5 * z * z).exp() / (2.0 * std::f64::consts::PI).sqrt()
}

/// 标准正态分位数 Φ⁻¹(p)
///
/// Acklam 有理逼近, 相对误差约 1.15e-9。p 截断到开区间 (0,1)。
pub fn normal_quantile(p: f64) -> f64 {
    const A: [f64; 6] = [
        -3.969683028665376e+01,
        2.209460984245205e+02,
        -2.759285104469687e+02,
        1.383577518672690e+02,
        -3.066479806614716e+01,
        2.506628277459239e+00,
    ];
    const B: [f64; 5] = [
        -5.447609879822406e+01,
        1.615858368580409e+02,
        -1.556989798598866e+02,
        6.680131188771972e+01,
        -1.328068155288572e+01,
    ];
    const C: [f64; 6] = [
        -7.784894002430293e-03,
        -3.223964580411365e-01,
        -2.400758277161838e+00,
        -2.549732539343734e+00,
        4.374664141464968e+00,
        2.938163982698783e+00,
    ];
    const D: [f64; 4] = [
        7.784695709041462e-03,
        3.224671290700398e-01,
        2.445134137142996e+00,
        3.754408661907416e+00,
    ];
    const P_LOW: f64 = 0.02425;

    let p = p.clamp(1e-12, 1.0 - 1e-12);

    if p < P_LOW {
        let q = (-2.0 * p.ln()).sqrt();
        (((((C[0] * q + C[1]) * q + C[2]) * q + C[3]) * q + C[4]) * q + C[5])
            / ((((D[0] * q + D[1]) * q + D[2]) * q + D[3]) * q + 1.0)
    } else if p <= 1.0 - P_LOW {
        let q = p - 0.5;
        let r = q * q;
        (((((A[0] * r + A[1]) * r + A[2]) * r + A[3]) * r + A[4]) * r + A[5]) * q
            / (((((B[0] * r + B[1]) * r + B[2]) * r + B[3]) * r + B[4]) * r + 1.0)
    } else {
        let q = (-2.0 * (1.0 - p).ln()).sqrt();
        -((((((C[0] * q + C[1]) * q + C[2]) * q + C[3]) * q + C[4]) * q + C[5])
            / ((((D[0] * q + D[1]) * q + D[2]) * q + D[3]) * q + 1.0))
    }
}

// ==========================================
// EOQ - 经济发注量
// ==========================================

/// 数量折扣方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscountKind {
    /// 全单位折扣: 整批按档位单价计价
    AllUnits,
    /// 增分折扣: 超出档位部分按档位单价计价
    Incremental,
}

/// 基本 EOQ 计算结果
#[derive(Debug, Clone, Serialize)]
pub struct EoqResult {
    /// 最优发注量 Q*
    pub optimal_order_quantity: f64,
    /// 期均总成本
    pub total_cost: f64,
    /// 选中的价格档位（无折扣时为 0）
    pub selected_price_tier: usize,
}

/// 基本经济发注量
///
/// 允许欠货时按临界率 ω = b/(b+h) 修正:
/// Q* = √(2Kd/(hω)), 期均成本 √(2Kdhω)。
pub fn eoq(k: f64, d: f64, h: f64, b: Option<f64>) -> ModelResult<EoqResult> {
    validate_eoq_inputs(k, d, h)?;
    let omega = match b {
        Some(b) if b > 0.0 => critical_ratio(b, h),
        Some(_) => {
            return Err(ModelError::Validation(
                "品切费用必须为正".to_string(),
            ))
        }
        None => 1.0,
    };
    let q = (2.0 * k * d / (h * omega)).sqrt();
    let cost = (2.0 * k * d * h * omega).sqrt();
    Ok(EoqResult {
        optimal_order_quantity: q,
        total_cost: cost,
        selected_price_tier: 0,
    })
}

/// 数量折扣 EOQ
///
/// `unit_costs[j]` 为第 j 档单价, `quantity_breaks[j]` 为该档最小发注量
/// （首档为 0), `r` 为在库资金利率（保管费随单价抬升 h + r·c）。
/// 逐档求无约束最优并夹取到档位有效区间, 取可行档位中的最小成本。
pub fn eoq_with_discount(
    k: f64,
    d: f64,
    h: f64,
    b: Option<f64>,
    r: f64,
    unit_costs: &[f64],
    quantity_breaks: &[f64],
    kind: DiscountKind,
) -> ModelResult<EoqResult> {
    validate_eoq_inputs(k, d, h)?;
    if unit_costs.is_empty() || unit_costs.len() != quantity_breaks.len() {
        return Err(ModelError::Validation(
            "价格档位与数量断点必须等长且非空".to_string(),
        ));
    }
    if quantity_breaks.windows(2).any(|w| w[0] >= w[1]) {
        return Err(ModelError::Validation(
            "数量断点必须严格递增".to_string(),
        ));
    }
    let omega = match b {
        Some(b) if b > 0.0 => critical_ratio(b, h),
        _ => 1.0,
    };

    let mut best: Option<EoqResult> = None;
    for (j, (&c, &theta)) in unit_costs.iter().zip(quantity_breaks).enumerate() {
        let hold = h + r * c;
        // 档位固定费: 增分折扣把低档差价折入固定费
        let k_eff = match kind {
            DiscountKind::AllUnits => k,
            DiscountKind::Incremental => k + (unit_costs[0] - c) * theta,
        };
        let q_free = (2.0 * k_eff * d / (hold * omega)).sqrt();
        // 夹取到档位有效区间 [θ_j, θ_{j+1})
        let upper = quantity_breaks.get(j + 1).copied().unwrap_or(f64::INFINITY);
        let q = q_free.clamp(theta.max(f64::MIN_POSITIVE), upper);
        if !q.is_finite() || q <= 0.0 {
            continue;
        }
        let cost = d * c + k_eff * d / q + hold * omega * q / 2.0;
        let cand = EoqResult {
            optimal_order_quantity: q,
            total_cost: cost,
            selected_price_tier: j,
        };
        best = match best {
            None => Some(cand),
            Some(cur) if cand.total_cost < cur.total_cost => Some(cand),
            Some(cur) => Some(cur),
        };
    }
    best.ok_or_else(|| ModelError::Validation("所有价格档位均不可行".to_string()))
}

fn validate_eoq_inputs(k: f64, d: f64, h: f64) -> ModelResult<()> {
    if k <= 0.0 || d <= 0.0 || h <= 0.0 {
        return Err(ModelError::Validation(
            "EOQ 要求 K、d、h 均为正".to_string(),
        ));
    }
    Ok(())
}

// ==========================================
// 近似安全库存（单品目报童式基在库）
// ==========================================

#[derive(Debug, Clone, Serialize)]
pub struct SafetyStockResult {
    /// 基在库水平 S = μ·(LT+1) + z·σ·√(LT+1)
    pub base_stock_level: f64,
    /// 安全库存部分 z·σ·√(LT+1)
    pub safety_stock: f64,
    /// 服务水平安全系数 z = Φ⁻¹(b/(b+h))
    pub service_factor: f64,
    /// 期均期望成本近似
    pub expected_cost: f64,
}

/// 单品目近似安全库存
///
/// 保护期取 LT+1（定期盘点, 本期下单次期起效）。期望成本为
/// (Q,R) 方策的标准近似: 发注费 + 批量保管费 + 安全库存保管费
/// + 品切惩罚项。
pub fn approximate_safety_stock(
    mu: f64,
    sigma: f64,
    lead_time: u32,
    b: f64,
    h: f64,
    fixed_cost: f64,
) -> ModelResult<SafetyStockResult> {
    if mu <= 0.0 || sigma < 0.0 {
        return Err(ModelError::Validation(
            "需求参数要求 mu > 0, sigma ≥ 0".to_string(),
        ));
    }
    if b <= 0.0 || h <= 0.0 {
        return Err(ModelError::Validation(
            "成本参数要求 b > 0, h > 0".to_string(),
        ));
    }
    let omega = critical_ratio(b, h);
    let z = normal_quantile(omega);
    let protection = (lead_time + 1) as f64;
    let sigma_p = sigma * protection.sqrt();
    let safety = z * sigma_p;
    let base = mu * protection + safety;

    // 发注批量按基本 EOQ 取值
    let q = if fixed_cost > 0.0 {
        (2.0 * fixed_cost * mu / h).sqrt()
    } else {
        mu.max(1.0)
    };
    let ordering = if fixed_cost > 0.0 {
        fixed_cost * mu / q
    } else {
        0.0
    };
    let expected_cost = ordering + h * (q / 2.0 + safety) + (b + h) * sigma_p * normal_pdf(z);

    Ok(SafetyStockResult {
        base_stock_level: base,
        safety_stock: safety,
        service_factor: z,
        expected_cost,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normal_quantile_known_values() {
        assert!(normal_quantile(0.5).abs() < 1e-8);
        assert!((normal_quantile(0.95) - 1.6449).abs() < 1e-3);
        assert!((normal_quantile(0.975) - 1.9600).abs() < 1e-3);
        // 对称性
        assert!((normal_quantile(0.05) + normal_quantile(0.95)).abs() < 1e-8);
        // 尾部分支
        assert!((normal_quantile(0.001) + 3.0902).abs() < 1e-3);
    }

    #[test]
    fn test_eoq_basic_with_backorder() {
        // K=100, d=10, h=1, b=10 ⇒ ω=10/11, Q*=√(2200)≈46.90
        let r = eoq(100.0, 10.0, 1.0, Some(10.0)).unwrap();
        assert!((r.optimal_order_quantity - 2200.0_f64.sqrt()).abs() < 1e-9);
        assert!(r.total_cost > 0.0);
    }

    #[test]
    fn test_eoq_all_units_prefers_cheap_tier() {
        let r = eoq_with_discount(
            100.0,
            1000.0,
            2.0,
            Some(100.0),
            0.1,
            &[10.0, 9.0, 8.0],
            &[0.0, 100.0, 200.0],
            DiscountKind::AllUnits,
        )
        .unwrap();
        // 大需求下低价档应胜出
        assert_eq!(r.selected_price_tier, 2);
        assert!(r.optimal_order_quantity >= 200.0);
    }

    #[test]
    fn test_approximate_safety_stock_sane() {
        let r = approximate_safety_stock(100.0, 10.0, 2, 100.0, 1.0, 10000.0).unwrap();
        // ω≈0.990 ⇒ z≈2.33, 保护期 3
        assert!((r.service_factor - 2.3263).abs() < 1e-2);
        assert!(r.base_stock_level > 300.0);
        assert!(r.expected_cost > 0.0);
    }

    #[test]
    fn test_eoq_rejects_bad_inputs() {
        assert!(eoq(0.0, 10.0, 1.0, None).is_err());
        assert!(eoq(100.0, 10.0, -1.0, None).is_err());
    }
}
