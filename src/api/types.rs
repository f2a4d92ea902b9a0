// ==========================================
// 多级库存优化引擎 - API 层请求/响应结构
// ==========================================
// 职责: 调用契约的 DTO 定义与结果信封
// 信封: status 判别符 (success / error) + uuid 结果号 + UTC 时间戳
// ==========================================

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::api::error::ApiResult;
use crate::config::defaults;
use crate::domain::item::{BomEdge, Item};
use crate::domain::network::NetworkSummary;
use crate::domain::types::{DemandSpec, OptimAlgorithm, ReplenishmentPolicy};
use crate::engine::newsvendor::{DiscountKind, EoqResult, SafetyStockResult};
use crate::engine::optimizer::{ConvergenceInfo, OptimizationHistory};
use crate::engine::simulator::SimulationReport;

// ==========================================
// 结果信封
// ==========================================

/// 把引擎结果转换为 JSON 信封
///
/// 成功: 载荷对象之上合入 status / result_id / computed_at;
/// 失败: status=error + 人类可读 message + 错误种别判别符 kind。
pub fn to_envelope<T: Serialize>(result: ApiResult<T>) -> serde_json::Value {
    match result {
        Ok(payload) => match serde_json::to_value(&payload) {
            Ok(serde_json::Value::Object(mut map)) => {
                map.insert("status".to_string(), serde_json::json!("success"));
                map.insert("result_id".to_string(), serde_json::json!(Uuid::new_v4()));
                map.insert(
                    "computed_at".to_string(),
                    serde_json::json!(Utc::now()),
                );
                serde_json::Value::Object(map)
            }
            Ok(other) => serde_json::json!({
                "status": "success",
                "result_id": Uuid::new_v4(),
                "computed_at": Utc::now(),
                "result": other,
            }),
            Err(e) => serde_json::json!({
                "status": "error",
                "message": format!("结果序列化失败: {}", e),
                "kind": "InvalidInput",
            }),
        },
        Err(e) => serde_json::json!({
            "status": "error",
            "message": e.to_string(),
            "kind": e.kind(),
        }),
    }
}

// ==========================================
// 网络输入
// ==========================================

#[derive(Debug, Clone, Deserialize)]
pub struct NetworkRequest {
    pub items: Vec<Item>,
    #[serde(default, alias = "bom")]
    pub edges: Vec<BomEdge>,
}

// ==========================================
// 各操作的请求结构
// ==========================================

/// 保证服务时间求解请求（树形网络）
#[derive(Debug, Clone, Deserialize)]
pub struct GstRequest {
    #[serde(flatten)]
    pub network: NetworkRequest,
    /// 服务水平安全系数
    #[serde(default = "default_z")]
    pub z: f64,
}

/// 禁忌搜索分配请求（一般网络）
#[derive(Debug, Clone, Deserialize)]
pub struct TabuRequest {
    #[serde(flatten)]
    pub network: NetworkRequest,
    #[serde(default = "default_z")]
    pub z: f64,
    #[serde(default = "default_max_iter")]
    pub max_iter: usize,
    #[serde(default = "default_tabu_tenure")]
    pub tabu_tenure: usize,
}

/// 方策仿真请求
#[derive(Debug, Clone, Deserialize)]
pub struct SimulateRequest {
    #[serde(flatten)]
    pub network: NetworkRequest,
    pub policy: ReplenishmentPolicy,
    /// 各末端品目的需求规格覆写（缺省按品目主数据生成截断正态需求）
    #[serde(default)]
    pub demand: Option<Vec<(String, DemandSpec)>>,
    #[serde(default = "default_n_samples")]
    pub n_samples: usize,
    #[serde(default = "default_n_periods")]
    pub n_periods: usize,
    #[serde(default = "default_seed")]
    pub seed: u64,
}

/// 基在库水平梯度优化请求
#[derive(Debug, Clone, Deserialize)]
pub struct OptimizeRequest {
    #[serde(flatten)]
    pub network: NetworkRequest,
    #[serde(default)]
    pub initial_levels: Option<Vec<f64>>,
    #[serde(default)]
    pub algorithm: OptimAlgorithm,
    #[serde(default = "default_learning_rate")]
    pub learning_rate: f64,
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,
    #[serde(default = "default_beta1")]
    pub beta1: f64,
    #[serde(default = "default_beta2")]
    pub beta2: f64,
    #[serde(default = "default_momentum")]
    pub momentum: f64,
    #[serde(default = "default_tolerance")]
    pub tolerance: f64,
    #[serde(default = "default_n_samples")]
    pub n_samples: usize,
    #[serde(default = "default_n_periods")]
    pub n_periods: usize,
    #[serde(default = "default_seed")]
    pub seed: u64,
    /// 启用 One-Cycle 调度时的峰值学习率（仅 Momentum/Adam）
    #[serde(default)]
    pub one_cycle_max_lr: Option<f64>,
}

/// 学习率区间扫描请求
#[derive(Debug, Clone, Deserialize)]
pub struct LrFinderRequest {
    #[serde(flatten)]
    pub network: NetworkRequest,
    #[serde(default)]
    pub initial_levels: Option<Vec<f64>>,
    #[serde(default = "default_lr_min")]
    pub lr_min: f64,
    #[serde(default = "default_lr_max")]
    pub lr_max: f64,
    #[serde(default = "default_lr_iterations")]
    pub num_iterations: usize,
    #[serde(default = "default_smoothing")]
    pub smoothing: f64,
    #[serde(default = "default_n_samples")]
    pub n_samples: usize,
    #[serde(default = "default_n_periods")]
    pub n_periods: usize,
    #[serde(default = "default_seed")]
    pub seed: u64,
}

/// 方策对比请求
#[derive(Debug, Clone, Deserialize)]
pub struct ComparePoliciesRequest {
    #[serde(flatten)]
    pub network: NetworkRequest,
    /// 待对比的方策参数组
    pub policies: Vec<ReplenishmentPolicy>,
    #[serde(default)]
    pub demand: Option<Vec<(String, DemandSpec)>>,
    #[serde(default = "default_n_samples")]
    pub n_samples: usize,
    #[serde(default = "default_n_periods")]
    pub n_periods: usize,
    #[serde(default = "default_seed")]
    pub seed: u64,
}

/// 经济发注量计算请求
#[derive(Debug, Clone, Deserialize)]
pub struct EoqRequest {
    /// 发注固定费用
    #[serde(alias = "K")]
    pub k: f64,
    /// 平均需求量
    pub d: f64,
    /// 在库保管费用
    pub h: f64,
    /// 品切费用（缺省不允许欠货）
    #[serde(default)]
    pub b: Option<f64>,
    /// 在库资金利率（数量折扣模式）
    #[serde(default)]
    pub r: f64,
    #[serde(default)]
    pub unit_costs: Vec<f64>,
    #[serde(default)]
    pub quantity_breaks: Vec<f64>,
    #[serde(default)]
    pub discount: Option<DiscountKind>,
}

/// 单品目近似安全库存计算请求
#[derive(Debug, Clone, Deserialize)]
pub struct SafetyStockRequest {
    #[serde(alias = "avg_demand")]
    pub mu: f64,
    #[serde(alias = "demand_std")]
    pub sigma: f64,
    #[serde(alias = "LT")]
    pub lead_time: u32,
    pub b: f64,
    pub h: f64,
    #[serde(default = "default_fixed_cost", alias = "fc")]
    pub fixed_cost: f64,
}

// ==========================================
// 各操作的响应载荷
// ==========================================

/// 单品目的保证服务时间求解结果行
#[derive(Debug, Clone, Serialize)]
pub struct GstItemRow {
    pub name: String,
    pub guaranteed_lead_time: u32,
    pub net_replenishment_time: u32,
    pub safety_stock: f64,
    pub holding_cost: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct GstPayload {
    pub guaranteed_lead_times: Vec<GstItemRow>,
    pub total_cost: f64,
}

/// 单品目的禁忌搜索结果行
#[derive(Debug, Clone, Serialize)]
pub struct TabuItemRow {
    pub name: String,
    pub coverage: u32,
    pub net_replenishment_time: u32,
    pub safety_stock: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct TabuPayload {
    pub best_solution: Vec<TabuItemRow>,
    pub best_cost: f64,
    pub cost_history: Vec<f64>,
    pub iterations_run: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct SimulatePayload {
    #[serde(flatten)]
    pub report: SimulationReport,
    /// 品目名（与报表中品目维度的下标一致）
    pub item_names: Vec<String>,
}

/// 单品目的基在库优化结果行
#[derive(Debug, Clone, Serialize)]
pub struct BaseStockRow {
    pub name: String,
    pub base_stock_level: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct OptimizePayload {
    pub optimal_base_stock_levels: Vec<BaseStockRow>,
    pub best_cost: f64,
    pub convergence_info: ConvergenceInfo,
    pub optimization_history: OptimizationHistory,
}

#[derive(Debug, Clone, Serialize)]
pub struct LrFinderPayload {
    pub lr_history: Vec<f64>,
    pub cost_history: Vec<f64>,
    pub smoothed_history: Vec<f64>,
    pub suggested_lr: f64,
    pub best_cost: f64,
    pub aborted_early: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct PolicyComparisonRow {
    pub policy_kind: String,
    pub average_cost: f64,
    pub fill_rate: f64,
    pub stockout_rate: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ComparePoliciesPayload {
    pub policies: Vec<PolicyComparisonRow>,
    /// 期均成本最低的方策种类
    pub best_policy: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnalyzePayload {
    pub network_summary: NetworkSummary,
}

#[derive(Debug, Clone, Serialize)]
pub struct EoqPayload {
    #[serde(flatten)]
    pub result: EoqResult,
}

#[derive(Debug, Clone, Serialize)]
pub struct SafetyStockPayload {
    #[serde(flatten)]
    pub result: SafetyStockResult,
}

// ==========================================
// serde 默认值函数
// ==========================================

fn default_z() -> f64 {
    defaults::SERVICE_LEVEL_Z
}
fn default_max_iter() -> usize {
    defaults::TABU_MAX_ITER
}
fn default_tabu_tenure() -> usize {
    defaults::TABU_TENURE
}
fn default_n_samples() -> usize {
    defaults::N_SAMPLES
}
fn default_n_periods() -> usize {
    defaults::N_PERIODS
}
fn default_seed() -> u64 {
    defaults::RANDOM_SEED
}
fn default_learning_rate() -> f64 {
    defaults::LEARNING_RATE
}
fn default_max_iterations() -> usize {
    defaults::MAX_ITERATIONS
}
fn default_beta1() -> f64 {
    defaults::ADAM_BETA1
}
fn default_beta2() -> f64 {
    defaults::ADAM_BETA2
}
fn default_momentum() -> f64 {
    defaults::MOMENTUM
}
fn default_tolerance() -> f64 {
    defaults::CONVERGENCE_TOLERANCE
}
fn default_lr_min() -> f64 {
    defaults::LR_FINDER_MIN
}
fn default_lr_max() -> f64 {
    defaults::LR_FINDER_MAX
}
fn default_lr_iterations() -> usize {
    defaults::LR_FINDER_ITERATIONS
}
fn default_smoothing() -> f64 {
    defaults::LR_FINDER_SMOOTHING
}
fn default_fixed_cost() -> f64 {
    10000.0
}

// 信封构造的便捷别名
pub type Envelope = serde_json::Value;
