// ==========================================
// PolicyGradientOptimizer 梯度优化器集成测试
// ==========================================
// 测试目标: 验证 Adam 收敛到报童解析最优、三种算法可用性、
//           学习率扫描与 One-Cycle 约束
// 覆盖范围: 单品目临界率场景、链条网络、非法输入
// ==========================================

use scm_inventory_opt::domain::error::ModelError;
use scm_inventory_opt::domain::types::OptimAlgorithm;
use scm_inventory_opt::engine::error::EngineError;
use scm_inventory_opt::engine::lr_finder::{self, LrFinderParams};
use scm_inventory_opt::engine::newsvendor::{critical_ratio, normal_quantile};
use scm_inventory_opt::{
    BomEdge, Item, NetworkModel, OneCycleSchedule, OptimizerParams, PolicyGradientOptimizer,
    SimulationParams,
};

// ==========================================
// 测试辅助函数
// ==========================================

fn opt_item(name: &str, h: f64, b: f64, mu: f64, sigma: f64, lt: u32) -> Item {
    Item {
        name: name.to_string(),
        holding_cost: h,
        stockout_cost: b,
        avg_demand: mu,
        demand_std: sigma,
        lead_time: lt,
        ..Item::default()
    }
}

/// 单品目临界率场景: μ=100, σ=10, LT=1, h=1, b=9
fn newsvendor_network() -> NetworkModel {
    NetworkModel::build(vec![opt_item("成品", 1.0, 9.0, 100.0, 10.0, 1)], vec![]).unwrap()
}

/// 报童解析最优: S* = μ·LT + Φ⁻¹(b/(b+h))·σ·√LT
fn newsvendor_optimum() -> f64 {
    let z = normal_quantile(critical_ratio(9.0, 1.0));
    100.0 + z * 10.0
}

fn fast_sim() -> SimulationParams {
    SimulationParams {
        n_samples: 10,
        n_periods: 200,
        seed: 7,
    }
}

// ==========================================
// 测试用例 1: Adam 收敛到解析最优附近
// ==========================================

#[test]
fn test_adam_converges_to_newsvendor_optimum() {
    let net = newsvendor_network();
    let params = OptimizerParams {
        algorithm: OptimAlgorithm::Adam,
        learning_rate: 2.0,
        max_iterations: 200,
        simulation: fast_sim(),
        ..OptimizerParams::default()
    };
    // 有意从远离最优的水平起步
    let outcome = PolicyGradientOptimizer::new()
        .optimize(&net, Some(vec![60.0]), &params)
        .unwrap();

    let s_star = newsvendor_optimum();
    let s_best = outcome.optimal_base_stock_levels[0];
    assert!(
        (s_best - s_star).abs() < 15.0,
        "最优水平 {:.1} 偏离解析最优 {:.1} 过远",
        s_best,
        s_star
    );
    // 最优成本不劣于起点成本
    assert!(outcome.best_cost <= outcome.history.cost[0] + 1e-9);
    // 水平非负
    assert!(outcome.optimal_base_stock_levels.iter().all(|&s| s >= 0.0));
}

// ==========================================
// 测试用例 2: 三种算法可用且历史一致
// ==========================================

#[test]
fn test_all_algorithms_produce_history() {
    let net = newsvendor_network();
    for algorithm in [
        OptimAlgorithm::Sgd,
        OptimAlgorithm::Momentum,
        OptimAlgorithm::Adam,
    ] {
        let params = OptimizerParams {
            algorithm,
            learning_rate: 0.5,
            max_iterations: 30,
            simulation: SimulationParams {
                n_samples: 4,
                n_periods: 50,
                seed: 3,
            },
            ..OptimizerParams::default()
        };
        let outcome = PolicyGradientOptimizer::new()
            .optimize(&net, Some(vec![120.0]), &params)
            .unwrap();

        let k = outcome.convergence.iterations_run;
        assert!(k >= 1 && k <= 30);
        assert_eq!(outcome.history.cost.len(), k);
        assert_eq!(outcome.history.gradient_norm.len(), k);
        assert_eq!(outcome.history.base_stock_levels.len(), k);
        assert!(outcome.convergence.final_gradient_norm.is_finite());
        assert!(outcome.best_cost.is_finite());
    }
}

// ==========================================
// 测试用例 3: 确定性（公共随机数）
// ==========================================

#[test]
fn test_repeated_optimize_identical() {
    let net = newsvendor_network();
    let params = OptimizerParams {
        max_iterations: 20,
        simulation: SimulationParams {
            n_samples: 4,
            n_periods: 50,
            seed: 13,
        },
        ..OptimizerParams::default()
    };
    let optimizer = PolicyGradientOptimizer::new();
    let a = optimizer.optimize(&net, Some(vec![150.0]), &params).unwrap();
    let b = optimizer.optimize(&net, Some(vec![150.0]), &params).unwrap();
    assert_eq!(a.best_cost.to_bits(), b.best_cost.to_bits());
    assert_eq!(
        a.optimal_base_stock_levels[0].to_bits(),
        b.optimal_base_stock_levels[0].to_bits()
    );
}

// ==========================================
// 测试用例 4: 链条网络平稳运行
// ==========================================

#[test]
fn test_chain_network_optimization_runs() {
    let net = NetworkModel::build(
        vec![
            opt_item("成品", 5.0, 100.0, 100.0, 20.0, 1),
            opt_item("部件", 2.0, 0.0, 0.0, 0.0, 2),
        ],
        vec![BomEdge {
            child: "部件".to_string(),
            parent: "成品".to_string(),
            units: 1.0,
            allocation: None,
        }],
    )
    .unwrap();
    let params = OptimizerParams {
        max_iterations: 40,
        learning_rate: 2.0,
        simulation: SimulationParams {
            n_samples: 5,
            n_periods: 100,
            seed: 21,
        },
        ..OptimizerParams::default()
    };
    // 初始水平缺省播种（临界率 + 补货提前期）
    let outcome = PolicyGradientOptimizer::new()
        .optimize(&net, None, &params)
        .unwrap();
    assert!(outcome.best_cost.is_finite() && outcome.best_cost > 0.0);
    assert_eq!(outcome.optimal_base_stock_levels.len(), 2);
}

// ==========================================
// 测试用例 5: 输入校验
// ==========================================

#[test]
fn test_one_cycle_with_sgd_rejected() {
    let net = newsvendor_network();
    let params = OptimizerParams {
        algorithm: OptimAlgorithm::Sgd,
        one_cycle: Some(OneCycleSchedule::build(50, 1.0, 0.85, 0.95).unwrap()),
        max_iterations: 50,
        ..OptimizerParams::default()
    };
    assert!(matches!(
        PolicyGradientOptimizer::new().optimize(&net, None, &params),
        Err(EngineError::Model(ModelError::Validation(_)))
    ));
}

#[test]
fn test_initial_level_length_mismatch_rejected() {
    let net = newsvendor_network();
    let params = OptimizerParams::default();
    assert!(matches!(
        PolicyGradientOptimizer::new().optimize(&net, Some(vec![1.0, 2.0]), &params),
        Err(EngineError::Model(ModelError::Validation(_)))
    ));
}

// ==========================================
// 测试用例 6: One-Cycle 调度下的优化
// ==========================================

#[test]
fn test_one_cycle_adam_runs() {
    let net = newsvendor_network();
    let params = OptimizerParams {
        algorithm: OptimAlgorithm::Adam,
        one_cycle: Some(OneCycleSchedule::build(40, 2.0, 0.85, 0.95).unwrap()),
        max_iterations: 40,
        simulation: SimulationParams {
            n_samples: 4,
            n_periods: 50,
            seed: 17,
        },
        ..OptimizerParams::default()
    };
    let outcome = PolicyGradientOptimizer::new()
        .optimize(&net, Some(vec![80.0]), &params)
        .unwrap();
    assert!(outcome.best_cost.is_finite());
}

// ==========================================
// 测试用例 7: 学习率区间扫描
// ==========================================

#[test]
fn test_lr_finder_suggests_within_range() {
    let net = newsvendor_network();
    let params = LrFinderParams {
        lr_min: 1e-5,
        lr_max: 5.0,
        num_iterations: 30,
        simulation: SimulationParams {
            n_samples: 4,
            n_periods: 50,
            seed: 19,
        },
        ..LrFinderParams::default()
    };
    let outcome = lr_finder::find_learning_rate(&net, Some(vec![60.0]), &params).unwrap();

    assert_eq!(outcome.lr_history.len(), outcome.cost_history.len());
    assert_eq!(outcome.lr_history.len(), outcome.smoothed_history.len());
    // 学习率严格递增
    for w in outcome.lr_history.windows(2) {
        assert!(w[1] > w[0]);
    }
    assert!(outcome.suggested_lr >= params.lr_min);
    assert!(outcome.suggested_lr <= params.lr_max);
    assert!(outcome.best_cost.is_finite());
}

#[test]
fn test_lr_finder_rejects_bad_range() {
    let net = newsvendor_network();
    let params = LrFinderParams {
        lr_min: 1.0,
        lr_max: 0.1,
        ..LrFinderParams::default()
    };
    assert!(matches!(
        lr_finder::find_learning_rate(&net, None, &params),
        Err(EngineError::Model(ModelError::Validation(_)))
    ));
}
