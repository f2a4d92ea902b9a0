// ==========================================
// InventoryApi 调用契约端到端测试
// ==========================================
// 测试目标: 验证 JSON 请求解析、结果信封与错误种别判别符
// 覆盖范围: 全部契约操作的成功/失败路径
// ==========================================

use scm_inventory_opt::api::types::{
    to_envelope, ComparePoliciesRequest, EoqRequest, GstRequest, LrFinderRequest,
    NetworkRequest, OptimizeRequest, SafetyStockRequest, SimulateRequest, TabuRequest,
};
use scm_inventory_opt::InventoryApi;

// ==========================================
// 测试辅助函数
// ==========================================

/// 三级链条网络 JSON（GST 场景: proc=[2,2,1], 边界=[[0,5],[0,4],[0,2]]）
fn chain_json() -> serde_json::Value {
    serde_json::json!({
        "items": [
            {"name": "成品", "h": 5.0, "b": 100.0, "mu": 100.0, "sigma": 20.0,
             "lead_time": 1, "proc_time": 1, "lead_time_lb": 0, "lead_time_ub": 2},
            {"name": "部件", "h": 2.0, "b": 80.0,
             "lead_time": 2, "proc_time": 2, "lead_time_lb": 0, "lead_time_ub": 4},
            {"name": "原料", "h": 1.0, "b": 50.0,
             "lead_time": 2, "proc_time": 2, "lead_time_lb": 0, "lead_time_ub": 5}
        ],
        "edges": [
            {"child": "原料", "parent": "部件", "units": 1.0},
            {"child": "部件", "parent": "成品", "units": 1.0}
        ]
    })
}

/// 菱形网络 JSON（共用子件供给两个父件）
fn diamond_json() -> serde_json::Value {
    serde_json::json!({
        "items": [
            {"name": "成品", "h": 5.0, "b": 100.0, "mu": 100.0, "sigma": 20.0,
             "lead_time": 1, "proc_time": 1, "lead_time_ub": 3},
            {"name": "部件A", "h": 2.0, "lead_time": 1, "proc_time": 1, "lead_time_ub": 3},
            {"name": "部件B", "h": 2.0, "lead_time": 1, "proc_time": 2, "lead_time_ub": 3},
            {"name": "共用子件", "h": 1.0, "lead_time": 2, "proc_time": 2, "lead_time_ub": 4}
        ],
        "edges": [
            {"child": "部件A", "parent": "成品"},
            {"child": "部件B", "parent": "成品"},
            {"child": "共用子件", "parent": "部件A"},
            {"child": "共用子件", "parent": "部件B"}
        ]
    })
}

// ==========================================
// 测试用例 1: 保证服务时间求解（成功/失败信封）
// ==========================================

#[test]
fn test_gst_success_envelope() {
    let api = InventoryApi::new();
    let req: GstRequest = serde_json::from_value(chain_json()).unwrap();
    let envelope = to_envelope(api.optimize_guaranteed_service(req));

    assert_eq!(envelope["status"], "success");
    assert!(envelope["result_id"].is_string());
    assert!(envelope["computed_at"].is_string());
    assert!(envelope["total_cost"].as_f64().unwrap() > 0.0);
    let rows = envelope["guaranteed_lead_times"].as_array().unwrap();
    assert_eq!(rows.len(), 3);
    for row in rows {
        assert!(row["net_replenishment_time"].as_u64().is_some());
        assert!(row["safety_stock"].as_f64().unwrap() >= 0.0);
    }
}

#[test]
fn test_gst_diamond_rejected_with_kind() {
    let api = InventoryApi::new();
    let req: GstRequest = serde_json::from_value(diamond_json()).unwrap();
    let envelope = to_envelope(api.optimize_guaranteed_service(req));

    assert_eq!(envelope["status"], "error");
    assert_eq!(envelope["kind"], "NotATreeError");
    assert!(envelope["message"].as_str().unwrap().contains("父件"));
}

#[test]
fn test_gst_rejects_nonpositive_z() {
    let api = InventoryApi::new();
    let mut json = chain_json();
    json["z"] = serde_json::json!(-1.0);
    let req: GstRequest = serde_json::from_value(json).unwrap();
    let envelope = to_envelope(api.optimize_guaranteed_service(req));
    assert_eq!(envelope["status"], "error");
    assert_eq!(envelope["kind"], "InvalidInput");
}

// ==========================================
// 测试用例 2: 禁忌搜索分配
// ==========================================

#[test]
fn test_tabu_accepts_diamond() {
    let api = InventoryApi::new();
    let req: TabuRequest = serde_json::from_value(diamond_json()).unwrap();
    let payload = api.allocate_safety_stock(req).unwrap();

    // 最优成本不劣于全零基线（轨迹首项）
    assert!(payload.best_cost <= payload.cost_history[0] + 1e-9);
    // 轨迹单调不增
    for w in payload.cost_history.windows(2) {
        assert!(w[1] <= w[0] + 1e-9);
    }
    assert_eq!(payload.best_solution.len(), 4);
}

// ==========================================
// 测试用例 3: 错误种别判别符
// ==========================================

#[test]
fn test_validation_error_kind() {
    let api = InventoryApi::new();
    let json = serde_json::json!({
        "items": [{"name": "成品", "h": 1.0, "b": 10.0, "mu": 100.0, "sigma": 10.0}],
        "edges": [{"child": "不存在", "parent": "成品"}]
    });
    let req: NetworkRequest = serde_json::from_value(json).unwrap();
    let envelope = to_envelope(api.analyze_network(req));
    assert_eq!(envelope["status"], "error");
    assert_eq!(envelope["kind"], "ValidationError");
}

#[test]
fn test_cycle_error_kind() {
    let api = InventoryApi::new();
    let json = serde_json::json!({
        "items": [
            {"name": "A", "h": 1.0, "b": 10.0, "mu": 100.0, "sigma": 10.0},
            {"name": "B", "h": 1.0, "b": 10.0}
        ],
        "edges": [
            {"child": "A", "parent": "B"},
            {"child": "B", "parent": "A"}
        ]
    });
    let req: NetworkRequest = serde_json::from_value(json).unwrap();
    let envelope = to_envelope(api.analyze_network(req));
    assert_eq!(envelope["status"], "error");
    assert_eq!(envelope["kind"], "CycleError");
}

// ==========================================
// 测试用例 4: 网络分析
// ==========================================

#[test]
fn test_analyze_network_summary() {
    let api = InventoryApi::new();
    let req: NetworkRequest = serde_json::from_value(chain_json()).unwrap();
    let payload = api.analyze_network(req).unwrap();
    assert_eq!(payload.network_summary.total_nodes, 3);
    assert_eq!(payload.network_summary.total_edges, 2);
    assert!(payload.network_summary.is_tree);
}

// ==========================================
// 测试用例 5: 方策仿真与对比
// ==========================================

#[test]
fn test_simulate_policy_via_json() {
    let api = InventoryApi::new();
    let mut json = chain_json();
    json["policy"] = serde_json::json!({
        "kind": "base_stock",
        "levels": [350.0, 450.0, 500.0]
    });
    json["n_samples"] = serde_json::json!(5);
    json["n_periods"] = serde_json::json!(50);
    json["seed"] = serde_json::json!(11);
    let req: SimulateRequest = serde_json::from_value(json).unwrap();
    let payload = api.simulate_policy(req).unwrap();

    assert_eq!(payload.item_names.len(), 3);
    assert!(payload.report.average_cost.is_finite());
    assert!((0.0..=1.0).contains(&payload.report.fill_rate));
    assert_eq!(payload.report.mean_on_hand.len(), 3);
    assert_eq!(payload.report.mean_on_hand[0].len(), 50);
}

#[test]
fn test_compare_policies_picks_cheapest() {
    let api = InventoryApi::new();
    let mut json = serde_json::json!({
        "items": [{"name": "成品", "h": 1.0, "b": 100.0, "mu": 100.0, "sigma": 10.0,
                   "lead_time": 2}],
        "edges": []
    });
    json["policies"] = serde_json::json!([
        {"kind": "base_stock", "levels": [233.0]},
        // 明显过低的基在库: 成本应显著更高
        {"kind": "s_s", "reorder_points": [50.0], "order_up_to": [80.0]}
    ]);
    json["n_samples"] = serde_json::json!(10);
    json["n_periods"] = serde_json::json!(100);
    let req: ComparePoliciesRequest = serde_json::from_value(json).unwrap();
    let payload = api.compare_policies(req).unwrap();

    assert_eq!(payload.policies.len(), 2);
    assert_eq!(payload.best_policy, "base_stock");
}

// ==========================================
// 测试用例 6: 基在库优化与学习率扫描
// ==========================================

#[test]
fn test_optimize_base_stock_via_json() {
    let api = InventoryApi::new();
    let mut json = serde_json::json!({
        "items": [{"name": "成品", "h": 1.0, "b": 9.0, "mu": 100.0, "sigma": 10.0,
                   "lead_time": 1}],
        "edges": []
    });
    json["algorithm"] = serde_json::json!("adam");
    json["learning_rate"] = serde_json::json!(2.0);
    json["max_iterations"] = serde_json::json!(30);
    json["n_samples"] = serde_json::json!(4);
    json["n_periods"] = serde_json::json!(50);
    let req: OptimizeRequest = serde_json::from_value(json).unwrap();
    let payload = api.optimize_base_stock(req).unwrap();

    assert_eq!(payload.optimal_base_stock_levels.len(), 1);
    assert!(payload.optimal_base_stock_levels[0].base_stock_level >= 0.0);
    assert!(payload.best_cost.is_finite());
    assert!(payload.convergence_info.iterations_run >= 1);
}

#[test]
fn test_optimize_one_cycle_via_json() {
    let api = InventoryApi::new();
    let mut json = serde_json::json!({
        "items": [{"name": "成品", "h": 1.0, "b": 9.0, "mu": 100.0, "sigma": 10.0,
                   "lead_time": 1}],
        "edges": []
    });
    json["algorithm"] = serde_json::json!("adam");
    json["learning_rate"] = serde_json::json!(1.0);
    json["max_iterations"] = serde_json::json!(20);
    json["n_samples"] = serde_json::json!(3);
    json["n_periods"] = serde_json::json!(40);
    let req: OptimizeRequest = serde_json::from_value(json.clone()).unwrap();
    let payload = api.optimize_one_cycle(req).unwrap();
    assert!(payload.best_cost.is_finite());

    // One-Cycle 对 SGD 不可用
    json["algorithm"] = serde_json::json!("sgd");
    let req: OptimizeRequest = serde_json::from_value(json).unwrap();
    let envelope = to_envelope(api.optimize_one_cycle(req));
    assert_eq!(envelope["status"], "error");
    assert_eq!(envelope["kind"], "ValidationError");
}

#[test]
fn test_lr_finder_via_json() {
    let api = InventoryApi::new();
    let mut json = serde_json::json!({
        "items": [{"name": "成品", "h": 1.0, "b": 9.0, "mu": 100.0, "sigma": 10.0,
                   "lead_time": 1}],
        "edges": []
    });
    json["lr_min"] = serde_json::json!(1e-4);
    json["lr_max"] = serde_json::json!(2.0);
    json["num_iterations"] = serde_json::json!(20);
    json["n_samples"] = serde_json::json!(3);
    json["n_periods"] = serde_json::json!(40);
    let req: LrFinderRequest = serde_json::from_value(json).unwrap();
    let payload = api.find_learning_rate(req).unwrap();

    assert!(payload.suggested_lr >= 1e-4 && payload.suggested_lr <= 2.0);
    assert_eq!(payload.lr_history.len(), payload.smoothed_history.len());
}

// ==========================================
// 测试用例 7: 单品目解析计算
// ==========================================

#[test]
fn test_eoq_known_value() {
    let api = InventoryApi::new();
    let req: EoqRequest = serde_json::from_value(serde_json::json!({
        "K": 100.0, "d": 10.0, "h": 1.0, "b": 10.0
    }))
    .unwrap();
    let payload = api.calculate_eoq(req).unwrap();
    // ω=10/11 ⇒ Q* = √(2·100·10/(1·ω)) = √2200
    assert!((payload.result.optimal_order_quantity - 2200.0_f64.sqrt()).abs() < 1e-9);
}

#[test]
fn test_safety_stock_payload() {
    let api = InventoryApi::new();
    let req: SafetyStockRequest = serde_json::from_value(serde_json::json!({
        "mu": 100.0, "sigma": 10.0, "LT": 2, "b": 100.0, "h": 1.0, "fc": 10000.0
    }))
    .unwrap();
    let payload = api.calculate_safety_stock(req).unwrap();
    assert!(payload.result.base_stock_level > 300.0);
    assert!(payload.result.safety_stock > 0.0);
    assert!(payload.result.expected_cost > 0.0);
}
