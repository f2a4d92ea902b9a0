// ==========================================
// 多级库存优化引擎 - 品目与 BOM 边
// ==========================================
// 职责: 调用方输入的主数据结构
// 用途: 请求层反序列化写入, 网络模型构建时只读
// ==========================================

use serde::{Deserialize, Serialize};

// ==========================================
// Item - 品目主数据
// ==========================================
// 兼容两种调用口径: holding_cost/h, avg_demand/mu/average_demand 等
// 均可作为字段名出现在 JSON 输入中
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Item {
    /// 品目唯一标识（品目名）
    pub name: String,

    // ===== 成本维度 =====
    /// 单位库存保管费用（≥ 0）
    #[serde(alias = "h", default)]
    pub holding_cost: f64,
    /// 单位品切/欠货费用（≥ 0）
    #[serde(alias = "b", default)]
    pub stockout_cost: f64,

    // ===== 需求维度 =====
    /// 平均需求量（仅需求产生点即末端品目非零）
    #[serde(alias = "mu", alias = "average_demand", default)]
    pub avg_demand: f64,
    /// 需求标准差
    #[serde(alias = "sigma", default)]
    pub demand_std: f64,

    // ===== 时间维度 =====
    /// 自工序/补货提前期（期）
    #[serde(default = "default_lead_time")]
    pub lead_time: u32,
    /// 保证服务时间模型的工序时间（期，整数）
    #[serde(alias = "process_time", default)]
    pub proc_time: u32,
    /// 对后继承诺交付时间下界（期，整数）
    #[serde(default)]
    pub lead_time_lb: u32,
    /// 对后继承诺交付时间上界（期，整数）
    #[serde(alias = "max_service_time", default)]
    pub lead_time_ub: u32,

    // ===== 能力维度 =====
    /// 生产能力（每期上限，缺省为无限）
    #[serde(default)]
    pub capacity: Option<f64>,
}

fn default_lead_time() -> u32 {
    1
}

impl Default for Item {
    fn default() -> Self {
        Self {
            name: String::new(),
            holding_cost: 0.0,
            stockout_cost: 0.0,
            avg_demand: 0.0,
            demand_std: 0.0,
            lead_time: default_lead_time(),
            proc_time: 0,
            lead_time_lb: 0,
            lead_time_ub: 0,
            capacity: None,
        }
    }
}

impl Item {
    /// 每期生产能力（缺省视为无限）
    pub fn capacity_or_inf(&self) -> f64 {
        self.capacity.unwrap_or(f64::INFINITY)
    }
}

// ==========================================
// BomEdge - 部品展开表边
// ==========================================
// 方向: child → parent（子件供给父件）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BomEdge {
    /// 子件（供给方）品目名
    pub child: String,
    /// 父件（消耗方）品目名
    pub parent: String,
    /// 消耗系数（父件 1 单位消耗子件 units 单位，> 0）
    #[serde(alias = "quantity", default = "default_units")]
    pub units: f64,
    /// 分摊比例 ∈ (0, 1]，子件供给多个父件时的产出分配
    #[serde(default)]
    pub allocation: Option<f64>,
}

fn default_units() -> f64 {
    1.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_item_deserialize_aliases() {
        // 两种调用口径的字段名都必须可解析
        let long: Item = serde_json::from_str(
            r#"{"name":"A","holding_cost":2.0,"stockout_cost":50.0,"avg_demand":100.0,"demand_std":10.0}"#,
        )
        .unwrap();
        let short: Item =
            serde_json::from_str(r#"{"name":"A","h":2.0,"b":50.0,"mu":100.0,"sigma":10.0}"#)
                .unwrap();
        assert_eq!(long.holding_cost, short.holding_cost);
        assert_eq!(long.avg_demand, short.avg_demand);
        assert_eq!(long.demand_std, short.demand_std);
        assert_eq!(short.lead_time, 1);
    }

    #[test]
    fn test_edge_quantity_alias() {
        let e: BomEdge =
            serde_json::from_str(r#"{"child":"B","parent":"A","quantity":2.0}"#).unwrap();
        assert_eq!(e.units, 2.0);
        assert!(e.allocation.is_none());
    }
}
