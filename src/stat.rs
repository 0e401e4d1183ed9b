use serde::Serialize;
use tracing::info;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Stats {
    pub costs: usize,
    pub time_us: usize,
    pub high_level_expand_nodes: usize,
    pub high_level_generate_nodes: usize,
    pub low_level_expand_nodes: usize,
}

impl Stats {
    pub fn print(&self) {
        info!(
            "Cost {:?} Time(microseconds) {:?} High level expand nodes number: {:?} High level generate nodes number: {:?} Low level expand nodes number {:?}",
            self.costs,
            self.time_us,
            self.high_level_expand_nodes,
            self.high_level_generate_nodes,
            self.low_level_expand_nodes
        );
    }
}
