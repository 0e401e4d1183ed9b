use super::{position_at, Agent, ConstraintSet, EdgeConstraint, NotSolvable, Path, Solution};
use super::VertexConstraint;
use crate::algorithm::a_star_search;
use crate::graph::{Graph, Heuristic};
use crate::stat::Stats;

use std::cmp::Ordering;
use std::fmt::Debug;
use std::hash::Hash;
use tracing::{debug, error};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ConflictType<C> {
    Vertex {
        position: C,
        time_step: usize,
    },
    // Move of `agent_1`; `agent_2` traverses the same edge the other way.
    Edge {
        from_position: C,
        to_position: C,
        time_step: usize,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Conflict<C> {
    pub agent_1: usize,
    pub agent_2: usize,
    pub conflict_type: ConflictType<C>,
}

impl<C> Conflict<C> {
    pub fn time_step(&self) -> usize {
        match self.conflict_type {
            ConflictType::Vertex { time_step, .. } | ConflictType::Edge { time_step, .. } => {
                time_step
            }
        }
    }

    pub fn is_vertex(&self) -> bool {
        matches!(self.conflict_type, ConflictType::Vertex { .. })
    }
}

/// Immutable snapshot in the constraint tree: every constraint accumulated on
/// the way from the root, and one path per agent honoring its own constraints.
///
/// Paths are stored un-padded. Conflict scanning holds a finished agent at its
/// last coordinate, so occupancy at or after an agent's arrival is treated as
/// ordinary occupancy of its target.
#[derive(Debug, Clone)]
pub struct ConstraintTreeNode<C: Eq + Hash> {
    pub(crate) constraints: ConstraintSet<C>,
    pub(crate) solution: Vec<Path<C>>,
    pub(crate) cost: usize,
    // Creation order, breaks ties between equal-cost nodes.
    pub(crate) sequence: usize,
}

impl<C: Eq + Hash> PartialEq for ConstraintTreeNode<C> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl<C: Eq + Hash> Eq for ConstraintTreeNode<C> {}

impl<C: Eq + Hash> PartialOrd for ConstraintTreeNode<C> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<C: Eq + Hash> Ord for ConstraintTreeNode<C> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.cost
            .cmp(&other.cost)
            .then_with(|| self.sequence.cmp(&other.sequence))
    }
}

impl<C: Clone + Eq + Hash + Debug> ConstraintTreeNode<C> {
    /// Root node: every agent planned alone, without constraints.
    pub(crate) fn new<G, H>(
        graph: &G,
        heuristic: &H,
        agents: &[Agent<C>],
        stats: &mut Stats,
    ) -> Result<Self, NotSolvable>
    where
        G: Graph<Coordinate = C>,
        H: Heuristic<C>,
    {
        let constraints = ConstraintSet::new();
        let solution = agents
            .iter()
            .map(|agent| a_star_search(graph, heuristic, agent, 0, &constraints, stats))
            .collect::<Result<Vec<_>, _>>()?;
        let cost = solution.iter().map(Vec::len).sum();

        let root = ConstraintTreeNode {
            constraints,
            solution,
            cost,
            sequence: 0,
        };
        debug!("High level root node {root:?}");
        Ok(root)
    }

    pub fn cost(&self) -> usize {
        self.cost
    }

    pub fn solution(&self) -> &[Path<C>] {
        &self.solution
    }

    pub fn constraints(&self) -> &ConstraintSet<C> {
        &self.constraints
    }

    /// Length of the longest path, i.e. the common time horizon.
    pub fn makespan(&self) -> usize {
        self.solution.iter().map(Vec::len).max().unwrap_or(0)
    }

    /// Every path extended to the makespan by holding its last coordinate.
    pub fn padded_solution(&self) -> Vec<Path<C>> {
        let makespan = self.makespan();
        self.solution
            .iter()
            .map(|path| (0..makespan).map(|t| position_at(path, t).clone()).collect())
            .collect()
    }

    pub fn to_solution(&self) -> Solution<C> {
        Solution {
            cost: self.cost,
            makespan: self.makespan(),
            paths: self.solution.clone(),
        }
    }

    pub fn into_solution(self) -> Solution<C> {
        let makespan = self.makespan();
        Solution {
            cost: self.cost,
            makespan,
            paths: self.solution,
        }
    }

    /// Earliest conflict, scanning time steps in increasing order, then agent
    /// pairs `(i, j)`, `i < j`, in index order, vertex before edge.
    pub fn first_conflict(&self) -> Option<Conflict<C>> {
        self.scan_conflicts().next()
    }

    pub fn first_vertex_conflict(&self) -> Option<Conflict<C>> {
        self.scan_conflicts().find(Conflict::is_vertex)
    }

    pub fn first_edge_conflict(&self) -> Option<Conflict<C>> {
        self.scan_conflicts().find(|conflict| !conflict.is_vertex())
    }

    pub fn conflicts(&self) -> Vec<Conflict<C>> {
        self.scan_conflicts().collect()
    }

    fn scan_conflicts(&self) -> impl Iterator<Item = Conflict<C>> + '_ {
        let horizon = self.makespan();
        let num_agents = self.solution.len();
        (0..horizon).flat_map(move |time_step| {
            (0..num_agents).flat_map(move |agent_1| {
                ((agent_1 + 1)..num_agents).flat_map(move |agent_2| {
                    self.conflicts_between(agent_1, agent_2, time_step, horizon)
                })
            })
        })
    }

    fn conflicts_between(
        &self,
        agent_1: usize,
        agent_2: usize,
        time_step: usize,
        horizon: usize,
    ) -> impl Iterator<Item = Conflict<C>> {
        let path_1 = &self.solution[agent_1];
        let path_2 = &self.solution[agent_2];
        let position_1 = position_at(path_1, time_step);
        let position_2 = position_at(path_2, time_step);

        let vertex = (position_1 == position_2).then(|| Conflict {
            agent_1,
            agent_2,
            conflict_type: ConflictType::Vertex {
                position: position_1.clone(),
                time_step,
            },
        });

        let edge = if time_step + 1 < horizon && position_1 != position_2 {
            let next_1 = position_at(path_1, time_step + 1);
            let next_2 = position_at(path_2, time_step + 1);
            (position_1 == next_2 && position_2 == next_1).then(|| Conflict {
                agent_1,
                agent_2,
                conflict_type: ConflictType::Edge {
                    from_position: position_1.clone(),
                    to_position: next_1.clone(),
                    time_step,
                },
            })
        } else {
            None
        };

        [vertex, edge].into_iter().flatten()
    }

    /// Child node that forbids one side of `conflict` and replans only that
    /// agent. `None` when the branch is pruned: the agent had already finished
    /// before the conflict, or no constrained path exists.
    pub(crate) fn update_constraint<G, H>(
        &self,
        conflict: &Conflict<C>,
        resolve_first: bool,
        graph: &G,
        heuristic: &H,
        agents: &[Agent<C>],
        sequence: usize,
        stats: &mut Stats,
    ) -> Option<Self>
    where
        G: Graph<Coordinate = C>,
        H: Heuristic<C>,
    {
        let agent_to_update = if resolve_first {
            conflict.agent_1
        } else {
            conflict.agent_2
        };
        let agent = &agents[agent_to_update];
        let old_path = &self.solution[agent_to_update];

        if conflict.time_step() >= old_path.len() {
            debug!(
                "skip agent {agent_to_update:?}: already at target before {:?}",
                conflict.time_step()
            );
            return None;
        }

        let new_constraints = match &conflict.conflict_type {
            ConflictType::Vertex {
                position,
                time_step,
            } => self.constraints.with_vertex(VertexConstraint {
                position: position.clone(),
                time_step: *time_step,
                agent: agent.id,
            }),
            ConflictType::Edge {
                from_position,
                to_position,
                time_step,
            } => {
                let (from_position, to_position) = if resolve_first {
                    (from_position, to_position)
                } else {
                    (to_position, from_position)
                };
                self.constraints.with_edge(EdgeConstraint {
                    from_position: from_position.clone(),
                    to_position: to_position.clone(),
                    time_step: *time_step,
                    agent: agent.id,
                })
            }
        };

        match a_star_search(graph, heuristic, agent, 0, &new_constraints, stats) {
            Ok(new_path) => {
                debug!(
                    "Update agent {agent_to_update:?} with path {new_path:?} for conflict {conflict:?}"
                );
                let new_cost = self.cost - old_path.len() + new_path.len();
                let mut new_solution = self.solution.clone();
                new_solution[agent_to_update] = new_path;

                Some(ConstraintTreeNode {
                    constraints: new_constraints,
                    solution: new_solution,
                    cost: new_cost,
                    sequence,
                })
            }
            Err(err) => {
                debug!("drop branch for conflict {conflict:?}: {err}");
                None
            }
        }
    }

    /// Checks that every path is a valid walk from start to target, that the
    /// cost matches the paths and that no two agents conflict.
    pub fn verify<G>(&self, graph: &G, agents: &[Agent<C>]) -> bool
    where
        G: Graph<Coordinate = C>,
    {
        if self.solution.len() != agents.len() {
            error!(
                "solution has {} paths for {} agents",
                self.solution.len(),
                agents.len()
            );
            return false;
        }

        for (agent, path) in agents.iter().zip(&self.solution) {
            if path.first() != Some(&agent.start) || path.last() != Some(&agent.target) {
                error!("path of agent {:?} does not connect start and target", agent.id);
                return false;
            }
            for step in path.windows(2) {
                if step[0] != step[1] && !graph.neighbours(&step[0]).contains(&step[1]) {
                    error!(
                        "agent {:?} jumps from {:?} to {:?}",
                        agent.id, step[0], step[1]
                    );
                    return false;
                }
            }
        }

        if self.cost != self.solution.iter().map(Vec::len).sum::<usize>() {
            error!("cost {:?} does not match the paths", self.cost);
            return false;
        }

        if let Some(conflict) = self.first_conflict() {
            error!("solution still has conflict {conflict:?}");
            return false;
        }

        true
    }
}
