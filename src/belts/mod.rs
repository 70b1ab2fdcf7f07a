//! Data model and validation for the belts flow engine.
//!
//! A [`BeltsInput`] is a directed graph with bounded edge flows
//! (`lo <= flow <= hi`), optional per-node throughput caps, and signed
//! per-node supply (positive = source, negative = sink).

mod flow;

pub use flow::solve_belts;

use crate::error::{PlannerError, Result};
use indexmap::IndexSet;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Node {
    pub id: String,
    #[serde(default)]
    pub cap: Option<f64>,
    #[serde(default)]
    pub supply: f64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Edge {
    pub from: String,
    pub to: String,
    #[serde(default)]
    pub lo: f64,
    pub hi: f64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BeltsInput {
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
}

impl BeltsInput {
    pub fn validate(&self) -> Result<()> {
        let mut seen = IndexSet::new();
        for node in &self.nodes {
            if node.id.is_empty() {
                return Err(PlannerError::invalid("node id must not be empty"));
            }
            if !seen.insert(node.id.clone()) {
                return Err(PlannerError::invalid(format!("duplicate node id: {}", node.id)));
            }
            if let Some(cap) = node.cap {
                if cap < 0.0 {
                    return Err(PlannerError::invalid(format!(
                        "node {}: cap must be non-negative",
                        node.id
                    )));
                }
            }
        }
        for edge in &self.edges {
            if !seen.contains(&edge.from) {
                return Err(PlannerError::invalid(format!(
                    "edge references unknown node: {}",
                    edge.from
                )));
            }
            if !seen.contains(&edge.to) {
                return Err(PlannerError::invalid(format!(
                    "edge references unknown node: {}",
                    edge.to
                )));
            }
            if edge.lo < 0.0 {
                return Err(PlannerError::invalid(format!(
                    "edge {}->{}: lo must be non-negative",
                    edge.from, edge.to
                )));
            }
            if edge.hi < edge.lo {
                return Err(PlannerError::invalid(format!(
                    "edge {}->{}: hi must be >= lo",
                    edge.from, edge.to
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EdgeFlow {
    pub from: String,
    pub to: String,
    pub flow: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EdgeRef {
    pub from: String,
    pub to: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum BeltsOutput {
    Ok {
        flows: Vec<EdgeFlow>,
    },
    Infeasible {
        cut_reachable: Vec<String>,
        tight_nodes: Vec<String>,
        tight_edges: Vec<EdgeRef>,
        deficit: f64,
    },
}
