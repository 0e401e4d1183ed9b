use std::cmp::Ordering;

#[derive(Clone, Debug)]
pub(crate) struct LowLevelOpenNode<C> {
    pub(crate) position: C,
    pub(crate) f_open_cost: usize,
    pub(crate) g_cost: usize,
    pub(crate) time_step: usize,
    // Insertion order, keeps the open list total and deterministic.
    pub(crate) sequence: usize,
}

impl<C> PartialEq for LowLevelOpenNode<C> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl<C> Eq for LowLevelOpenNode<C> {}

impl<C> PartialOrd for LowLevelOpenNode<C> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<C> Ord for LowLevelOpenNode<C> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.f_open_cost
            .cmp(&other.f_open_cost)
            // Earlier time step wins ties on f.
            .then_with(|| self.time_step.cmp(&other.time_step))
            .then_with(|| self.sequence.cmp(&other.sequence))
    }
}
