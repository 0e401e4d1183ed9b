use std::fmt::Debug;
use std::hash::Hash;

/// Read-only view of the shared environment the agents move on.
///
/// The solver never inspects coordinates; it only asks for neighbours and for
/// an upper bound on the number of distinct vertices.
pub trait Graph {
    type Coordinate: Clone + Eq + Hash + Debug;
    type Vertex;

    fn at(&self, coordinate: &Self::Coordinate) -> &Self::Vertex;

    /// Reachable coordinates in one time step, including `coordinate` itself.
    /// Non-traversable positions have no neighbours.
    fn neighbours(&self, coordinate: &Self::Coordinate) -> Vec<Self::Coordinate>;

    /// Upper bound on distinct vertices, used as the low-level time horizon.
    fn size(&self) -> usize;
}

/// Admissible and consistent estimate of the remaining steps between two
/// coordinates. `usize::MAX` marks an unreachable target.
pub trait Heuristic<C> {
    fn estimate(&self, from: &C, to: &C) -> usize;
}

impl<C, F> Heuristic<C> for F
where
    F: Fn(&C, &C) -> usize,
{
    fn estimate(&self, from: &C, to: &C) -> usize {
        self(from, to)
    }
}
