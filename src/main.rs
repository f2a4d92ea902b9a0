// ==========================================
// 多级库存优化引擎 - 演示程序
// ==========================================
// 职责: 端到端跑通一个三级链条场景, 打印各引擎的 JSON 结果
// 用法: RUST_LOG=info cargo run --bin scm-inventory-demo
// ==========================================

use anyhow::Result;
use tracing::info;

use scm_inventory_opt::api::types::{
    to_envelope, GstRequest, OptimizeRequest, SimulateRequest, TabuRequest,
};
use scm_inventory_opt::logging;
use scm_inventory_opt::InventoryApi;

fn main() -> Result<()> {
    logging::init();
    info!("多级库存优化引擎演示开始");

    let api = InventoryApi::new();

    // 三级链条: 原料 → 部件 → 成品（末端需求 μ=100, σ=20）
    let network_json = serde_json::json!({
        "items": [
            {"name": "成品", "h": 5.0, "b": 100.0, "mu": 100.0, "sigma": 20.0,
             "lead_time": 1, "proc_time": 1, "lead_time_lb": 0, "lead_time_ub": 2},
            {"name": "部件", "h": 3.0, "b": 80.0,
             "lead_time": 2, "proc_time": 2, "lead_time_lb": 0, "lead_time_ub": 4},
            {"name": "原料", "h": 2.0, "b": 50.0,
             "lead_time": 2, "proc_time": 2, "lead_time_lb": 0, "lead_time_ub": 5}
        ],
        "edges": [
            {"child": "原料", "parent": "部件", "units": 1.0},
            {"child": "部件", "parent": "成品", "units": 1.0}
        ]
    });

    // 1) 保证服务时间精确求解
    let req: GstRequest = serde_json::from_value(network_json.clone())?;
    let envelope = to_envelope(api.optimize_guaranteed_service(req));
    println!("--- 保证服务时间求解 ---");
    println!("{}", serde_json::to_string_pretty(&envelope)?);

    // 2) 禁忌搜索分配
    let req: TabuRequest = serde_json::from_value(network_json.clone())?;
    let envelope = to_envelope(api.allocate_safety_stock(req));
    println!("--- 禁忌搜索分配 ---");
    println!("{}", serde_json::to_string_pretty(&envelope)?);

    // 3) 基在库方策仿真
    let mut sim_json = network_json.clone();
    sim_json["policy"] = serde_json::json!({
        "kind": "base_stock",
        "levels": [350.0, 450.0, 500.0]
    });
    sim_json["n_samples"] = serde_json::json!(10);
    sim_json["n_periods"] = serde_json::json!(100);
    let req: SimulateRequest = serde_json::from_value(sim_json)?;
    let envelope = to_envelope(api.simulate_policy(req));
    println!("--- 方策仿真 ---");
    println!("{}", serde_json::to_string_pretty(&envelope)?);

    // 4) 基在库水平 Adam 优化
    let mut opt_json = network_json;
    opt_json["algorithm"] = serde_json::json!("adam");
    opt_json["learning_rate"] = serde_json::json!(2.0);
    opt_json["max_iterations"] = serde_json::json!(50);
    let req: OptimizeRequest = serde_json::from_value(opt_json)?;
    let envelope = to_envelope(api.optimize_base_stock(req));
    println!("--- 基在库水平优化 ---");
    println!("{}", serde_json::to_string_pretty(&envelope)?);

    info!("演示结束");
    Ok(())
}
