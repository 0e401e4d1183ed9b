mod constraint;
mod highlevel;
mod lowlevel;

pub use constraint::{ConstraintSet, EdgeConstraint, VertexConstraint};
pub use highlevel::{Conflict, ConflictType, ConstraintTreeNode};
pub(crate) use lowlevel::LowLevelOpenNode;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Agent<C> {
    pub id: usize,
    pub start: C,
    pub target: C,
}

/// One coordinate per time step, from the agent's start to its target.
pub type Path<C> = Vec<C>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NotSolvable {
    #[error("agent {agent} cannot reach its target under the active constraints")]
    Agent { agent: usize },
    #[error("instance has no conflict-free joint solution")]
    Instance,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Solution<C> {
    pub cost: usize,
    pub makespan: usize,
    pub paths: Vec<Path<C>>,
}

/// Position of an agent at `time_step`, holding it at its last coordinate once
/// the path has ended.
pub(crate) fn position_at<C>(path: &[C], time_step: usize) -> &C {
    path.get(time_step)
        .or_else(|| path.last())
        .expect("paths always contain the start coordinate")
}
