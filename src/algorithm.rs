mod astar;

pub(crate) use astar::a_star_search;

use std::collections::HashMap;
use std::hash::Hash;

use crate::common::Path;

/// Maps a time-expanded state to the state it was reached from.
type Trace<C> = HashMap<(C, usize), (C, usize)>;

fn construct_path<C: Clone + Eq + Hash>(trace: &Trace<C>, mut current: (C, usize)) -> Path<C> {
    let mut path = vec![current.0.clone()];
    while let Some(previous) = trace.get(&current) {
        path.push(previous.0.clone());
        current = previous.clone();
    }
    path.reverse();
    path
}
