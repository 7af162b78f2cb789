//! State graph execution engine
//!
//! Nodes are named steps over a [`RouterState`]. Each node returns a
//! [`StateUpdate`] that the engine merges before following the node's
//! outgoing edge: either a fixed successor, [`END`], or a routing function
//! whose [`Intent`] selects one of several branches.
//!
//! ENTRY → NODE → (EDGE | ROUTE) → ... → END

use crate::error::RouterError;
use crate::models::{Intent, RouterState, StateField, StateUpdate};
use crate::Result;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

/// Terminal marker.
pub const END: &str = "__end__";

/// Routing function evaluated over the state after a node runs.
pub type RouteFn = fn(&RouterState) -> Intent;

/// Trait for a single graph node
#[async_trait]
pub trait Node: Send + Sync {
    fn name(&self) -> &'static str;

    /// Fields this node is allowed to write.
    fn writes(&self) -> &'static [StateField];

    async fn run(&self, state: &RouterState) -> Result<StateUpdate>;
}

enum Edge {
    Direct(&'static str),
    Conditional {
        router: RouteFn,
        branches: HashMap<Intent, &'static str>,
    },
}

impl Edge {
    fn targets(&self) -> Vec<&'static str> {
        match self {
            Edge::Direct(to) => vec![*to],
            Edge::Conditional { branches, .. } => branches.values().copied().collect(),
        }
    }
}

/// Graph builder
#[derive(Default)]
pub struct StateGraph {
    nodes: Vec<Arc<dyn Node>>,
    edges: Vec<(&'static str, Edge)>,
    entry: Option<&'static str>,
}

impl StateGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_node(&mut self, node: Arc<dyn Node>) -> &mut Self {
        self.nodes.push(node);
        self
    }

    pub fn set_entry_point(&mut self, name: &'static str) -> &mut Self {
        self.entry = Some(name);
        self
    }

    /// Unconditional edge; `to` may be [`END`].
    pub fn add_edge(&mut self, from: &'static str, to: &'static str) -> &mut Self {
        self.edges.push((from, Edge::Direct(to)));
        self
    }

    /// Branch on `router(state)`; one target per intent.
    pub fn add_conditional_edges(
        &mut self,
        from: &'static str,
        router: RouteFn,
        branches: Vec<(Intent, &'static str)>,
    ) -> &mut Self {
        self.edges.push((
            from,
            Edge::Conditional {
                router,
                branches: branches.into_iter().collect(),
            },
        ));
        self
    }

    /// Validate the graph and freeze it for execution.
    pub fn compile(self) -> Result<CompiledGraph> {
        let mut nodes: HashMap<&'static str, Arc<dyn Node>> =
            HashMap::with_capacity(self.nodes.len());
        for node in self.nodes {
            let name = node.name();
            if name == END {
                return Err(RouterError::InvalidGraph(format!(
                    "{} is reserved for the terminal marker",
                    END
                )));
            }
            if nodes.insert(name, node).is_some() {
                return Err(RouterError::InvalidGraph(format!(
                    "duplicate node '{}'",
                    name
                )));
            }
        }

        let entry = self
            .entry
            .ok_or_else(|| RouterError::InvalidGraph("no entry point set".to_string()))?;
        if !nodes.contains_key(entry) {
            return Err(RouterError::NodeNotFound(entry.to_string()));
        }

        let mut edges: HashMap<&'static str, Edge> = HashMap::with_capacity(self.edges.len());
        for (from, edge) in self.edges {
            if !nodes.contains_key(from) {
                return Err(RouterError::NodeNotFound(from.to_string()));
            }
            for to in edge.targets() {
                if to != END && !nodes.contains_key(to) {
                    return Err(RouterError::NodeNotFound(to.to_string()));
                }
            }
            if let Edge::Conditional { branches, .. } = &edge {
                let missing: Vec<String> = Intent::RECOGNIZED
                    .iter()
                    .filter(|intent| !branches.contains_key(*intent))
                    .map(|intent| intent.to_string())
                    .collect();
                if !missing.is_empty() {
                    return Err(RouterError::InvalidGraph(format!(
                        "conditional edges from '{}' do not cover intent(s): {}",
                        from,
                        missing.join(", ")
                    )));
                }
            }
            if edges.insert(from, edge).is_some() {
                return Err(RouterError::InvalidGraph(format!(
                    "node '{}' has more than one outgoing edge",
                    from
                )));
            }
        }

        let mut dangling: Vec<&str> = nodes
            .keys()
            .filter(|name| !edges.contains_key(*name))
            .copied()
            .collect();
        if !dangling.is_empty() {
            dangling.sort_unstable();
            return Err(RouterError::InvalidGraph(format!(
                "node(s) without outgoing edge: {}",
                dangling.join(", ")
            )));
        }

        let reachable = check_acyclic(entry, &edges)?;
        for name in nodes.keys() {
            if !reachable.contains(name) {
                warn!(node = %name, "Node is unreachable from the entry point");
            }
        }

        Ok(CompiledGraph {
            step_budget: nodes.len(),
            nodes,
            edges,
            entry,
        })
    }
}

/// Depth-first walk from `entry`; returns the reachable node set.
fn check_acyclic(
    entry: &'static str,
    edges: &HashMap<&'static str, Edge>,
) -> Result<HashSet<&'static str>> {
    fn visit(
        node: &'static str,
        edges: &HashMap<&'static str, Edge>,
        on_path: &mut Vec<&'static str>,
        done: &mut HashSet<&'static str>,
    ) -> Result<()> {
        if node == END || done.contains(node) {
            return Ok(());
        }
        if on_path.contains(&node) {
            on_path.push(node);
            return Err(RouterError::InvalidGraph(format!(
                "cycle detected: {}",
                on_path.join(" -> ")
            )));
        }

        on_path.push(node);
        if let Some(edge) = edges.get(node) {
            for next in edge.targets() {
                visit(next, edges, on_path, done)?;
            }
        }
        on_path.pop();
        done.insert(node);
        Ok(())
    }

    let mut done = HashSet::new();
    visit(entry, edges, &mut Vec::new(), &mut done)?;
    Ok(done)
}

/// Executable graph. Holds no per-invocation state, so one instance can
/// serve concurrent invocations.
pub struct CompiledGraph {
    nodes: HashMap<&'static str, Arc<dyn Node>>,
    edges: HashMap<&'static str, Edge>,
    entry: &'static str,
    step_budget: usize,
}

impl CompiledGraph {
    /// Run from the entry point until [`END`] and return the final state.
    pub async fn invoke(&self, mut state: RouterState) -> Result<RouterState> {
        let run_id = Uuid::new_v4();
        let mut current = self.entry;
        let mut steps = 0;

        info!(run_id = %run_id, entry = current, "Graph: starting invocation");
        debug!(run_id = %run_id, query = %state.query(), "Graph input");

        while current != END {
            steps += 1;
            if steps > self.step_budget {
                warn!(run_id = %run_id, node = current, budget = self.step_budget, "Step budget exceeded");
                return Err(RouterError::StepBudgetExceeded(self.step_budget));
            }

            let node = self
                .nodes
                .get(current)
                .ok_or_else(|| RouterError::NodeNotFound(current.to_string()))?;

            // everything a node logs carries the invocation id
            let span = info_span!("node", %run_id, node = current, step = steps);

            debug!(parent: &span, "Running node");

            let update = node.run(&state).instrument(span.clone()).await?;

            let allowed = node.writes();
            if let Some(field) = update.fields().into_iter().find(|f| !allowed.contains(f)) {
                warn!(parent: &span, field = %field, "Undeclared state write");
                return Err(RouterError::StateConflict(format!(
                    "node '{}' may not write '{}'",
                    current, field
                )));
            }
            state.apply(update)?;

            current = span.in_scope(|| self.next_node(current, &state))?;
            debug!(parent: &span, next = current, "Edge resolved");
        }

        info!(
            run_id = %run_id,
            steps,
            intent = state.intent().map(|i| i.label()).unwrap_or(""),
            "Graph: invocation complete"
        );

        Ok(state)
    }

    fn next_node(&self, from: &'static str, state: &RouterState) -> Result<&'static str> {
        match self.edges.get(from) {
            Some(Edge::Direct(to)) => Ok(*to),
            Some(Edge::Conditional { router, branches }) => {
                let intent = router(state);
                branches.get(&intent).copied().ok_or_else(|| {
                    warn!(node = from, intent = %intent, "No branch for intent");
                    RouterError::UnrecognizedIntent(intent.label().to_string())
                })
            }
            None => Err(RouterError::InvalidGraph(format!(
                "node '{}' has no outgoing edge",
                from
            ))),
        }
    }
}
