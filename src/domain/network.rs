// ==========================================
// 多级库存优化引擎 - 网络模型
// ==========================================
// 职责: BOM/梯队网络的结构校验与图查询
// 表示: 整数下标竞技场 (arena), 不使用名字互引
// 红线: 单次求解内不可变; 循环依赖为永久性校验失败
// ==========================================

use serde::Serialize;
use std::collections::HashMap;

use crate::config::defaults;
use crate::domain::error::{ModelError, ModelResult};
use crate::domain::item::{BomEdge, Item};

// ==========================================
// Edge - 内部边表示（下标化后的 BOM 边）
// ==========================================
#[derive(Debug, Clone)]
pub struct Edge {
    /// 子件（供给方）下标
    pub child: usize,
    /// 父件（消耗方）下标
    pub parent: usize,
    /// 消耗系数
    pub units: f64,
    /// 显式分摊比例
    pub allocation: Option<f64>,
}

// ==========================================
// NetworkModel - BOM 网络模型
// ==========================================
// 生命周期: 每次求解/仿真调用构建一次, 调用返回即丢弃
#[derive(Debug, Clone)]
pub struct NetworkModel {
    items: Vec<Item>,
    index: HashMap<String, usize>,
    edges: Vec<Edge>,
    /// 每个子件的出边（指向其各父件）
    out_edges: Vec<Vec<usize>>,
    /// 每个父件的入边（来自其各子件）
    in_edges: Vec<Vec<usize>>,
}

/// 网络结构摘要（供上层展示/诊断）
#[derive(Debug, Clone, Serialize)]
pub struct NetworkSummary {
    pub total_nodes: usize,
    pub total_edges: usize,
    pub is_tree: bool,
    pub nodes: Vec<NodeSummary>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NodeSummary {
    pub name: String,
    pub avg_demand: f64,
    pub demand_std: f64,
    pub holding_cost: f64,
    pub lead_time: u32,
    /// 子件数（供给此节点的边数）
    pub in_degree: usize,
    /// 父件数（此节点供给的边数）
    pub out_degree: usize,
    pub is_end_item: bool,
}

impl NetworkModel {
    // ==========================================
    // 构建与校验
    // ==========================================

    /// 从品目/BOM 边列表构建网络模型
    ///
    /// 校验规则:
    /// 1) 品目名唯一, 边引用的品目必须存在
    /// 2) 成本/需求参数非负, units > 0, allocation ∈ (0,1]
    /// 3) 单一子件的分摊比例之和 ≤ 1 + ε
    /// 4) 至少一个品目 avg_demand > 0（否则网络无需求流动）
    ///
    /// 循环检测延迟到 `topological_order`（CycleError）。
    pub fn build(items: Vec<Item>, bom: Vec<BomEdge>) -> ModelResult<Self> {
        if items.is_empty() {
            return Err(ModelError::Validation("品目列表为空".to_string()));
        }

        let mut index = HashMap::with_capacity(items.len());
        for (i, item) in items.iter().enumerate() {
            if item.name.trim().is_empty() {
                return Err(ModelError::Validation(format!(
                    "第 {} 个品目的名称为空",
                    i + 1
                )));
            }
            if index.insert(item.name.clone(), i).is_some() {
                return Err(ModelError::Validation(format!(
                    "品目名重复: {}",
                    item.name
                )));
            }
            if item.holding_cost < 0.0 || !item.holding_cost.is_finite() {
                return Err(ModelError::Validation(format!(
                    "品目 {} 的保管费用非法: {}",
                    item.name, item.holding_cost
                )));
            }
            if item.stockout_cost < 0.0 || !item.stockout_cost.is_finite() {
                return Err(ModelError::Validation(format!(
                    "品目 {} 的品切费用非法: {}",
                    item.name, item.stockout_cost
                )));
            }
            if item.avg_demand < 0.0 || item.demand_std < 0.0 {
                return Err(ModelError::Validation(format!(
                    "品目 {} 的需求参数不能为负",
                    item.name
                )));
            }
            if let Some(cap) = item.capacity {
                if cap <= 0.0 {
                    return Err(ModelError::Validation(format!(
                        "品目 {} 的生产能力必须为正: {}",
                        item.name, cap
                    )));
                }
            }
        }

        if !items.iter().any(|it| it.avg_demand > 0.0) {
            return Err(ModelError::Validation(
                "没有任何品目的平均需求为正, 网络无需求流动".to_string(),
            ));
        }

        let n = items.len();
        let mut edges = Vec::with_capacity(bom.len());
        let mut out_edges = vec![Vec::new(); n];
        let mut in_edges = vec![Vec::new(); n];

        for e in &bom {
            let child = *index.get(&e.child).ok_or_else(|| {
                ModelError::Validation(format!("BOM 边引用了未知子件: {}", e.child))
            })?;
            let parent = *index.get(&e.parent).ok_or_else(|| {
                ModelError::Validation(format!("BOM 边引用了未知父件: {}", e.parent))
            })?;
            if child == parent {
                return Err(ModelError::Validation(format!(
                    "BOM 边不允许自环: {}",
                    e.child
                )));
            }
            if e.units <= 0.0 || !e.units.is_finite() {
                return Err(ModelError::Validation(format!(
                    "BOM 边 {} → {} 的消耗系数必须为正: {}",
                    e.child, e.parent, e.units
                )));
            }
            if let Some(a) = e.allocation {
                if a <= 0.0 || a > 1.0 {
                    return Err(ModelError::Validation(format!(
                        "BOM 边 {} → {} 的分摊比例必须落在 (0,1]: {}",
                        e.child, e.parent, a
                    )));
                }
            }
            let eid = edges.len();
            edges.push(Edge {
                child,
                parent,
                units: e.units,
                allocation: e.allocation,
            });
            out_edges[child].push(eid);
            in_edges[parent].push(eid);
        }

        // 单一子件对各父件的分摊比例之和不得超过 1 + ε
        for (i, eids) in out_edges.iter().enumerate() {
            let total: f64 = eids
                .iter()
                .filter_map(|&eid| edges[eid].allocation)
                .sum();
            if total > 1.0 + defaults::ALLOCATION_EPSILON {
                return Err(ModelError::Validation(format!(
                    "品目 {} 的分摊比例之和超过 1: {:.6}",
                    items[i].name, total
                )));
            }
        }

        Ok(Self {
            items,
            index,
            edges,
            out_edges,
            in_edges,
        })
    }

    // ==========================================
    // 基础查询
    // ==========================================

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn items(&self) -> &[Item] {
        &self.items
    }

    pub fn item(&self, i: usize) -> &Item {
        &self.items[i]
    }

    pub fn name(&self, i: usize) -> &str {
        &self.items[i].name
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    /// 节点 i 的子件边（供给 i 的边）
    pub fn child_edges(&self, i: usize) -> impl Iterator<Item = &Edge> {
        self.in_edges[i].iter().map(move |&eid| &self.edges[eid])
    }

    /// 节点 i 的父件边（i 供给的边）
    pub fn parent_edges(&self, i: usize) -> impl Iterator<Item = &Edge> {
        self.out_edges[i].iter().map(move |&eid| &self.edges[eid])
    }

    /// 末端品目: 无父件, 承接外部需求
    pub fn is_end_item(&self, i: usize) -> bool {
        self.out_edges[i].is_empty()
    }

    /// 源头品目: 无子件, 原料供给视为无限
    pub fn is_source_item(&self, i: usize) -> bool {
        self.in_edges[i].is_empty()
    }

    pub fn end_items(&self) -> Vec<usize> {
        (0..self.len()).filter(|&i| self.is_end_item(i)).collect()
    }

    // ==========================================
    // 结构查询
    // ==========================================

    /// 拓扑序: 子件先于父件（Kahn 算法）
    ///
    /// 确定性: 就绪队列按节点下标升序弹出。
    /// 不存在合法拓扑序时返回 `CycleError`。
    pub fn topological_order(&self) -> ModelResult<Vec<usize>> {
        let n = self.len();
        let mut indegree: Vec<usize> = (0..n).map(|i| self.in_edges[i].len()).collect();
        let mut order = Vec::with_capacity(n);
        // 就绪集合按下标有序维护, 保证可重现
        let mut ready: Vec<usize> = (0..n).filter(|&i| indegree[i] == 0).collect();
        ready.sort_unstable();

        while let Some(i) = ready.first().copied() {
            ready.remove(0);
            order.push(i);
            for &eid in &self.out_edges[i] {
                let p = self.edges[eid].parent;
                indegree[p] -= 1;
                if indegree[p] == 0 {
                    let pos = ready.partition_point(|&x| x < p);
                    ready.insert(pos, p);
                }
            }
        }

        if order.len() != n {
            let stuck: Vec<&str> = (0..n)
                .filter(|&i| indegree[i] > 0)
                .map(|i| self.name(i))
                .collect();
            return Err(ModelError::Cycle(format!(
                "以下品目无法完成拓扑排序: {}",
                stuck.join(", ")
            )));
        }
        Ok(order)
    }

    /// 是否为树形（森林）: 每节点至多一个父件且无环
    pub fn is_tree(&self) -> bool {
        self.out_edges.iter().all(|es| es.len() <= 1) && self.topological_order().is_ok()
    }

    /// 梯队提前期: 自工序时间 + 子件梯队提前期的最大值（自底向上）
    ///
    /// 用作所需覆盖时间的上界。
    pub fn echelon_lead_times(&self) -> ModelResult<Vec<u32>> {
        let order = self.topological_order()?;
        let mut elt = vec![0u32; self.len()];
        for &i in &order {
            let child_max = self
                .child_edges(i)
                .map(|e| elt[e.child])
                .max()
                .unwrap_or(0);
            elt[i] = self.items[i].proc_time + child_max;
        }
        Ok(elt)
    }

    /// 有效需求统计: 末端品目用自身 mu/sigma, 中间品目按 BOM 展开聚合
    ///
    /// mu 按消耗系数线性相加, sigma 按平方和规则聚合。
    /// 返回 (mu_eff, sigma_eff)。
    pub fn effective_demand(&self) -> ModelResult<(Vec<f64>, Vec<f64>)> {
        let order = self.topological_order()?;
        let n = self.len();
        let mut mu = vec![0.0f64; n];
        let mut var = vec![0.0f64; n];
        // 自父件向子件传播: 逆拓扑序（父件先行）
        for &i in order.iter().rev() {
            if self.is_end_item(i) {
                mu[i] = self.items[i].avg_demand;
                var[i] = self.items[i].demand_std * self.items[i].demand_std;
            } else {
                let mut m = 0.0;
                let mut v = 0.0;
                for e in self.parent_edges(i) {
                    m += e.units * mu[e.parent];
                    let s = e.units * var[e.parent].sqrt();
                    v += s * s;
                }
                mu[i] = m;
                var[i] = v;
            }
        }
        Ok((mu, var.into_iter().map(f64::sqrt).collect()))
    }

    /// 定期盘点补货提前期: 自提前期 + 1 + 下游（父件）补货提前期的最大值
    ///
    /// 用于基在库水平的初始化（末端品目为 lead_time + 1）。
    pub fn review_lead_times(&self) -> ModelResult<Vec<u32>> {
        let order = self.topological_order()?;
        let mut rlt = vec![0u32; self.len()];
        for &i in order.iter().rev() {
            let parent_max = self
                .parent_edges(i)
                .map(|e| rlt[e.parent])
                .max()
                .unwrap_or(0);
            rlt[i] = self.items[i].lead_time + 1 + parent_max;
        }
        Ok(rlt)
    }

    /// 网络结构摘要
    pub fn summary(&self) -> NetworkSummary {
        NetworkSummary {
            total_nodes: self.len(),
            total_edges: self.edges.len(),
            is_tree: self.is_tree(),
            nodes: (0..self.len())
                .map(|i| NodeSummary {
                    name: self.items[i].name.clone(),
                    avg_demand: self.items[i].avg_demand,
                    demand_std: self.items[i].demand_std,
                    holding_cost: self.items[i].holding_cost,
                    lead_time: self.items[i].lead_time,
                    in_degree: self.in_edges[i].len(),
                    out_degree: self.out_edges[i].len(),
                    is_end_item: self.is_end_item(i),
                })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(name: &str, mu: f64) -> Item {
        Item {
            name: name.to_string(),
            avg_demand: mu,
            demand_std: mu * 0.1,
            holding_cost: 1.0,
            stockout_cost: 10.0,
            ..Item::default()
        }
    }

    fn edge(child: &str, parent: &str) -> BomEdge {
        BomEdge {
            child: child.to_string(),
            parent: parent.to_string(),
            units: 1.0,
            allocation: None,
        }
    }

    #[test]
    fn test_topological_order_children_first() {
        let net = NetworkModel::build(
            vec![item("成品", 100.0), item("部件", 0.0), item("原料", 0.0)],
            vec![edge("原料", "部件"), edge("部件", "成品")],
        )
        .unwrap();
        let order = net.topological_order().unwrap();
        let pos = |name: &str| order.iter().position(|&i| net.name(i) == name).unwrap();
        assert!(pos("原料") < pos("部件"));
        assert!(pos("部件") < pos("成品"));
    }

    #[test]
    fn test_cycle_rejected() {
        let net = NetworkModel::build(
            vec![item("A", 100.0), item("B", 0.0)],
            vec![edge("A", "B"), edge("B", "A")],
        )
        .unwrap();
        assert!(matches!(
            net.topological_order(),
            Err(ModelError::Cycle(_))
        ));
        assert!(!net.is_tree());
    }

    #[test]
    fn test_effective_demand_propagation() {
        // 成品消耗 2 单位部件, 部件需求 = 2 × 成品需求
        let net = NetworkModel::build(
            vec![item("成品", 100.0), item("部件", 0.0)],
            vec![BomEdge {
                child: "部件".to_string(),
                parent: "成品".to_string(),
                units: 2.0,
                allocation: None,
            }],
        )
        .unwrap();
        let (mu, sigma) = net.effective_demand().unwrap();
        let p = net.index_of("部件").unwrap();
        assert!((mu[p] - 200.0).abs() < 1e-9);
        assert!((sigma[p] - 20.0).abs() < 1e-9);
    }
}
