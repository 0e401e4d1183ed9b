use std::collections::HashSet;
use std::hash::Hash;

/// Forbids `agent` from occupying `position` at `time_step`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VertexConstraint<C> {
    pub position: C,
    pub time_step: usize,
    pub agent: usize,
}

/// Forbids `agent` from moving `from_position -> to_position` when departing at
/// `time_step` (arriving at `time_step + 1`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EdgeConstraint<C> {
    pub from_position: C,
    pub to_position: C,
    pub time_step: usize,
    pub agent: usize,
}

/// Accumulated reservations of one constraint-tree node.
///
/// Sets are never mutated once a node holds them; branching goes through
/// [`ConstraintSet::with_vertex`] and [`ConstraintSet::with_edge`], which return
/// an extended copy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConstraintSet<C: Eq + Hash> {
    vertex: HashSet<VertexConstraint<C>>,
    edge: HashSet<EdgeConstraint<C>>,
}

impl<C: Eq + Hash> Default for ConstraintSet<C> {
    fn default() -> Self {
        ConstraintSet {
            vertex: HashSet::new(),
            edge: HashSet::new(),
        }
    }
}

impl<C: Clone + Eq + Hash> ConstraintSet<C> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_vertex(&self, constraint: VertexConstraint<C>) -> Self {
        let mut extended = self.clone();
        extended.vertex.insert(constraint);
        extended
    }

    pub fn with_edge(&self, constraint: EdgeConstraint<C>) -> Self {
        let mut extended = self.clone();
        extended.edge.insert(constraint);
        extended
    }

    pub fn allows_vertex(&self, position: &C, time_step: usize, agent: usize) -> bool {
        self.vertex.is_empty()
            || !self.vertex.contains(&VertexConstraint {
                position: position.clone(),
                time_step,
                agent,
            })
    }

    pub fn allows_edge(&self, from: &C, to: &C, time_step: usize, agent: usize) -> bool {
        self.edge.is_empty()
            || !self.edge.contains(&EdgeConstraint {
                from_position: from.clone(),
                to_position: to.clone(),
                time_step,
                agent,
            })
    }

    pub fn vertex_constraints(&self) -> impl Iterator<Item = &VertexConstraint<C>> {
        self.vertex.iter()
    }

    pub fn edge_constraints(&self) -> impl Iterator<Item = &EdgeConstraint<C>> {
        self.edge.iter()
    }

    /// Number of constraints tagged for `agent`.
    pub fn count_for(&self, agent: usize) -> usize {
        self.vertex.iter().filter(|c| c.agent == agent).count()
            + self.edge.iter().filter(|c| c.agent == agent).count()
    }

    pub fn len(&self) -> usize {
        self.vertex.len() + self.edge.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vertex.is_empty() && self.edge.is_empty()
    }
}
