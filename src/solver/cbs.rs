use super::{Branching, Solver};
use crate::common::{Agent, Conflict, ConstraintTreeNode, NotSolvable};
use crate::graph::{Graph, Heuristic};
use crate::stat::Stats;

use std::collections::BTreeSet;
use std::time::Instant;
use tracing::{debug, info};

/// Conflict-Based Search over immutable constraint-tree nodes.
///
/// Nodes are expanded in increasing cost; equal-cost nodes leave the open list
/// in creation order, so repeated runs return the same solution.
pub struct CBS<'a, G, H> {
    graph: &'a G,
    heuristic: H,
    branching: Branching,
    stats: Stats,
}

impl<'a, G, H> CBS<'a, G, H>
where
    G: Graph,
    H: Heuristic<G::Coordinate>,
{
    pub fn new(graph: &'a G, heuristic: H, branching: Branching) -> Self {
        CBS {
            graph,
            heuristic,
            branching,
            stats: Stats::default(),
        }
    }

    /// Statistics of the last call to `solve`.
    pub fn stats(&self) -> &Stats {
        &self.stats
    }

    fn conflicts_to_resolve(
        &self,
        node: &ConstraintTreeNode<G::Coordinate>,
    ) -> Vec<Conflict<G::Coordinate>> {
        match self.branching {
            Branching::EarliestConflict => node.first_conflict().into_iter().collect(),
            Branching::VertexAndEdge => [node.first_vertex_conflict(), node.first_edge_conflict()]
                .into_iter()
                .flatten()
                .collect(),
        }
    }
}

impl<'a, G, H> Solver<G::Coordinate> for CBS<'a, G, H>
where
    G: Graph,
    H: Heuristic<G::Coordinate>,
{
    fn solve(
        &mut self,
        agents: &[Agent<G::Coordinate>],
    ) -> Result<ConstraintTreeNode<G::Coordinate>, NotSolvable> {
        self.stats = Stats::default();
        let total_solve_start_time = Instant::now();
        let mut open = BTreeSet::new();
        let mut sequence = 0;

        let root = ConstraintTreeNode::new(self.graph, &self.heuristic, agents, &mut self.stats)
            .inspect_err(|err| info!("root node fails: {err}"))?;
        open.insert(root);

        while let Some(current_node) = open.pop_first() {
            self.stats.high_level_expand_nodes += 1;

            let conflicts = self.conflicts_to_resolve(&current_node);
            if conflicts.is_empty() {
                // No conflicts, return solution.
                self.stats.time_us = total_solve_start_time.elapsed().as_micros() as usize;
                self.stats.costs = current_node.cost();
                self.stats.print();
                return Ok(current_node);
            }

            for conflict in &conflicts {
                debug!("conflict: {conflict:?}");
                for resolve_first in [true, false] {
                    sequence += 1;
                    if let Some(child) = current_node.update_constraint(
                        conflict,
                        resolve_first,
                        self.graph,
                        &self.heuristic,
                        agents,
                        sequence,
                        &mut self.stats,
                    ) {
                        open.insert(child);
                        self.stats.high_level_generate_nodes += 1;
                    }
                }
            }
        }

        self.stats.time_us = total_solve_start_time.elapsed().as_micros() as usize;
        info!("open list exhausted without a conflict-free node");
        Err(NotSolvable::Instance)
    }
}
