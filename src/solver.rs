mod cbs;

pub use cbs::CBS;

use crate::common::{Agent, ConstraintTreeNode, NotSolvable};

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::hash::Hash;

pub trait Solver<C: Eq + Hash> {
    fn solve(&mut self, agents: &[Agent<C>]) -> Result<ConstraintTreeNode<C>, NotSolvable>;
}

/// Which conflicts of an expanded node are branched on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum Branching {
    /// Canonical CBS: two children for the single earliest conflict.
    #[default]
    EarliestConflict,
    /// Branch on the first vertex conflict and, independently, on the first
    /// edge conflict; up to four children per expansion.
    VertexAndEdge,
}
