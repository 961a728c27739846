// 依存グラフと循環切断
//
// 外部キーが張る依存関係のトポロジカル検査と、循環を検出した際の
// 切断処理を提供します。切断は循環内の決定的な一辺をALTER文扱いに
// 切り替えることで行い、対象の辺は辞書順最小のテーブル名から選ばれます。

use std::collections::{BTreeMap, BTreeSet};

use crate::core::constraint::ConstraintKind;
use crate::core::error::GenerateError;
use crate::core::table::Table;

/// 循環検出の結果
#[derive(Debug)]
pub struct CycleInfo {
    /// 循環に属するノード集合
    pub cycles: BTreeSet<String>,
    /// 検査対象だった全辺（親、子）
    pub edges: Vec<(String, String)>,
}

/// トポロジカルソート
///
/// 辺は（親 = 参照先、子 = 依存元）です。決定性のため、同時に取り出せる
/// ノードは入力順で処理します。循環があれば循環ノード集合と全辺を
/// 返します。
pub fn sorted_tables(
    nodes: &[String],
    edges: &[(String, String)],
) -> Result<Vec<String>, CycleInfo> {
    let mut indegree: BTreeMap<&str, usize> =
        nodes.iter().map(|n| (n.as_str(), 0)).collect();
    for (_, child) in edges {
        if let Some(count) = indegree.get_mut(child.as_str()) {
            *count += 1;
        }
    }

    let mut order = Vec::with_capacity(nodes.len());
    let mut remaining: Vec<&String> = nodes.iter().collect();
    loop {
        let mut progressed = false;
        let mut next = Vec::new();
        for node in remaining {
            if indegree[node.as_str()] == 0 {
                progressed = true;
                order.push(node.clone());
                for (parent, child) in edges {
                    if parent == node {
                        if let Some(count) = indegree.get_mut(child.as_str()) {
                            *count -= 1;
                        }
                    }
                }
            } else {
                next.push(node);
            }
        }
        remaining = next;
        if remaining.is_empty() {
            return Ok(order);
        }
        if !progressed {
            let leftover: BTreeSet<String> =
                remaining.iter().map(|n| (*n).clone()).collect();
            return Err(CycleInfo {
                cycles: cyclic_nodes(&leftover, edges),
                edges: edges.to_vec(),
            });
        }
    }
}

/// 残余ノードから真に循環上にあるものを抽出
///
/// 入次数ゼロの剥ぎ取りで残るノードには循環の下流も含まれるため、
/// 出次数ゼロ側からも剥ぎ取って循環本体に絞り込みます。
fn cyclic_nodes(leftover: &BTreeSet<String>, edges: &[(String, String)]) -> BTreeSet<String> {
    let mut nodes = leftover.clone();
    loop {
        let dead: Vec<String> = nodes
            .iter()
            .filter(|node| {
                !edges.iter().any(|(parent, child)| {
                    parent == *node && nodes.contains(child)
                })
            })
            .cloned()
            .collect();
        if dead.is_empty() {
            return nodes;
        }
        for node in dead {
            nodes.remove(&node);
        }
    }
}

/// 外部キー循環を切断
///
/// 循環がなくなるまで一辺ずつALTER文扱いに切り替えます。既にALTER文
/// 扱いの外部キーは依存辺として数えないため、各切断で辺集合は厳密に
/// 縮小します。残辺数を上限とし、超過は内部エラーです。
pub fn break_cycles(tables: &mut [Table]) -> Result<(), GenerateError> {
    let bound = collect_edges(tables).len();
    for _ in 0..=bound {
        let nodes: Vec<String> = tables.iter().map(Table::key).collect();
        let edges = collect_edges(tables);
        match sorted_tables(&nodes, &edges) {
            Ok(_) => return Ok(()),
            Err(info) => break_one(tables, &info)?,
        }
    }
    Err(GenerateError::AssertionFailure {
        message: "cycle breaking did not terminate".to_string(),
    })
}

/// 依存辺を収集（親 = 参照先、子 = 依存元）
///
/// ALTER文扱いの外部キーと自己参照は辺になりません。同じテーブル対を
/// 結ぶ外部キーが複数あっても辺は一本です。
fn collect_edges(tables: &[Table]) -> Vec<(String, String)> {
    let mut edges = BTreeSet::new();
    for table in tables {
        let child = table.key();
        for constraint in &table.constraints {
            if constraint.kind() != ConstraintKind::ForeignKey || constraint.use_alter() {
                continue;
            }
            if let Some(parent) = constraint.referred_key() {
                if parent != child {
                    edges.insert((parent, child.clone()));
                }
            }
        }
    }
    edges.into_iter().collect()
}

/// 検出された循環から一辺を切断
///
/// 循環内の辺をつなぎ直して一本の閉路を構成し、テーブル名が辞書順で
/// 最小のテーブルから、その参照先へ向かう外部キーを切断対象に選びます。
/// 閉路が一本に構成できない場合（複数循環の連結など）は内部エラーです。
fn break_one(tables: &mut [Table], info: &CycleInfo) -> Result<(), GenerateError> {
    let mut cycle_path: Vec<(String, String)> = info
        .edges
        .iter()
        .filter(|(parent, child)| info.cycles.contains(parent) && info.cycles.contains(child))
        .cloned()
        .collect();

    let Some(first) = cycle_path.pop() else {
        return Err(GenerateError::AssertionFailure {
            message: "could not construct sorted cycle path".to_string(),
        });
    };
    let mut deps = vec![first];
    while !cycle_path.is_empty() {
        let before = cycle_path.len();
        let mut rest = Vec::new();
        for edge in cycle_path {
            if edge.0 == deps[deps.len() - 1].1 {
                deps.push(edge);
            } else {
                rest.push(edge);
            }
        }
        if rest.len() == before {
            return Err(GenerateError::AssertionFailure {
                message: "could not construct sorted cycle path".to_string(),
            });
        }
        cycle_path = rest;
    }
    if deps.len() < 2 || deps[0].0 != deps[deps.len() - 1].1 {
        return Err(GenerateError::AssertionFailure {
            message: "could not construct sorted cycle path".to_string(),
        });
    }

    let mut parents: Vec<String> = deps.into_iter().map(|(parent, _)| parent).collect();

    let table_name = |key: &str| -> String {
        tables
            .iter()
            .find(|table| table.key() == key)
            .map(|table| table.def.name.clone())
            .unwrap_or_else(|| key.to_string())
    };
    let smallest = parents
        .iter()
        .enumerate()
        .min_by(|(_, a), (_, b)| table_name(a).cmp(&table_name(b)))
        .map(|(i, _)| i)
        .unwrap_or(0);
    let len = parents.len();
    parents.rotate_left((smallest + 1) % len);
    parents.reverse();

    let target = parents[1].clone();
    let start = tables
        .iter_mut()
        .find(|table| table.key() == parents[0])
        .ok_or_else(|| GenerateError::AssertionFailure {
            message: format!("cycle start table '{}' not in collection", parents[0]),
        })?;
    start.defer_foreign_keys_to(&target);
    Ok(())
}
