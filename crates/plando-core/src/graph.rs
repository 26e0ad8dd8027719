use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::schema::SettingsSchema;

/// Summary of the disablement graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisableGraphSummary {
    pub nodes: usize,
    pub edges: usize,
}

/// Report for the controlling-to-controlled setting order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisableGraphReport {
    pub summary: DisableGraphSummary,
    pub topo_order: Option<Vec<String>>,
    pub cycle: Option<Vec<String>>,
}

/// Build a deterministic disablement report for a settings schema.
///
/// An edge runs from a setting to every setting it can disable, with
/// sections and tabs expanded to their member settings.
pub fn build_disable_graph_report(schema: &SettingsSchema) -> DisableGraphReport {
    let graph = build_adjacency(schema);
    let nodes = graph.len();
    let edges = graph.values().map(|targets| targets.len()).sum();
    let summary = DisableGraphSummary { nodes, edges };

    match toposort(&graph) {
        Ok(order) => DisableGraphReport {
            summary,
            topo_order: Some(order),
            cycle: None,
        },
        Err(cycle) => DisableGraphReport {
            summary,
            topo_order: None,
            cycle: Some(cycle),
        },
    }
}

fn build_adjacency(schema: &SettingsSchema) -> BTreeMap<String, BTreeSet<String>> {
    let mut by_section: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
    let mut by_tab: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
    for setting in &schema.settings {
        if let Some(section) = &setting.section {
            by_section
                .entry(section.as_str())
                .or_default()
                .push(setting.name.as_str());
        }
        if let Some(tab) = &setting.tab {
            by_tab.entry(tab.as_str()).or_default().push(setting.name.as_str());
        }
    }

    let mut graph: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
    for setting in &schema.settings {
        graph.entry(setting.name.clone()).or_default();

        for disables in setting.disable.values() {
            let sections = disables
                .sections
                .iter()
                .flat_map(|section| by_section.get(section.as_str()).into_iter().flatten());
            let tabs = disables
                .tabs
                .iter()
                .flat_map(|tab| by_tab.get(tab.as_str()).into_iter().flatten());
            let targets = disables
                .settings
                .iter()
                .map(String::as_str)
                .chain(sections.copied())
                .chain(tabs.copied());

            for target in targets {
                // A setting sitting in the section it disables is not a cycle.
                if target == setting.name {
                    continue;
                }
                graph.entry(target.to_string()).or_default();
                graph
                    .entry(setting.name.clone())
                    .or_default()
                    .insert(target.to_string());
            }
        }
    }

    graph
}

fn toposort(graph: &BTreeMap<String, BTreeSet<String>>) -> Result<Vec<String>, Vec<String>> {
    let mut indegree: BTreeMap<String, usize> = BTreeMap::new();

    for node in graph.keys() {
        indegree.entry(node.clone()).or_insert(0);
    }

    for targets in graph.values() {
        for target in targets {
            *indegree.entry(target.clone()).or_insert(0) += 1;
        }
    }

    let mut ready: BTreeSet<String> = indegree
        .iter()
        .filter_map(|(node, count)| (*count == 0).then(|| node.clone()))
        .collect();

    let mut order = Vec::with_capacity(graph.len());

    while let Some(node) = ready.pop_first() {
        order.push(node.clone());

        if let Some(targets) = graph.get(&node) {
            for target in targets {
                if let Some(count) = indegree.get_mut(target) {
                    *count = count.saturating_sub(1);
                    if *count == 0 {
                        ready.insert(target.clone());
                    }
                }
            }
        }
    }

    if order.len() == graph.len() {
        Ok(order)
    } else {
        let cycle_nodes: Vec<String> = indegree
            .into_iter()
            .filter_map(|(node, count)| (count > 0).then_some(node))
            .collect();
        Err(cycle_nodes)
    }
}
