use super::{construct_path, Trace};
use crate::common::{Agent, ConstraintSet, LowLevelOpenNode, NotSolvable, Path};
use crate::graph::{Graph, Heuristic};
use crate::stat::Stats;

use std::collections::{BTreeSet, HashMap, HashSet};
use tracing::{debug, instrument, trace};

/// Shortest path for `agent` over (coordinate, time step) states, honoring the
/// constraints tagged with `agent.id`.
///
/// States at a time step at or beyond `graph.size()` are never generated, which
/// bounds waiting loops on finite graphs.
#[instrument(skip_all, name = "a_star", fields(agent = agent.id, start = ?agent.start, target = ?agent.target), level = "debug")]
pub(crate) fn a_star_search<G, H>(
    graph: &G,
    heuristic: &H,
    agent: &Agent<G::Coordinate>,
    initial_time_step: usize,
    constraints: &ConstraintSet<G::Coordinate>,
    stats: &mut Stats,
) -> Result<Path<G::Coordinate>, NotSolvable>
where
    G: Graph,
    H: Heuristic<G::Coordinate>,
{
    debug!("constraints: {constraints:?}");
    let max_time_step = graph.size();

    if !constraints.allows_vertex(&agent.start, initial_time_step, agent.id) {
        debug!("start position is forbidden at the initial time step");
        return Err(NotSolvable::Agent { agent: agent.id });
    }

    let mut open_list = BTreeSet::new();
    let mut closed_list = HashSet::new();
    let mut g_cost_map = HashMap::new();
    let mut trace: Trace<G::Coordinate> = HashMap::new();
    let mut sequence = 0;

    let start_h_open_cost = heuristic.estimate(&agent.start, &agent.target);
    if start_h_open_cost == usize::MAX {
        debug!("target unreachable from start");
        return Err(NotSolvable::Agent { agent: agent.id });
    }
    open_list.insert(LowLevelOpenNode {
        position: agent.start.clone(),
        f_open_cost: start_h_open_cost,
        g_cost: 0,
        time_step: initial_time_step,
        sequence,
    });
    g_cost_map.insert((agent.start.clone(), initial_time_step), 0);

    while let Some(current) = open_list.pop_first() {
        // A state may sit in the open list more than once; only the first pop counts.
        if !closed_list.insert((current.position.clone(), current.time_step)) {
            continue;
        }
        trace!("expand node: {current:?}");
        stats.low_level_expand_nodes += 1;

        if current.position == agent.target {
            return Ok(construct_path(
                &trace,
                (current.position, current.time_step),
            ));
        }

        let next_time_step = current.time_step + 1;
        if next_time_step >= max_time_step {
            continue;
        }

        // Uniform cost, waiting included.
        let tentative_g_cost = current.g_cost + 1;

        for neighbor in graph.neighbours(&current.position) {
            let state = (neighbor.clone(), next_time_step);
            if closed_list.contains(&state) {
                continue;
            }

            if !constraints.allows_vertex(&neighbor, next_time_step, agent.id)
                || !constraints.allows_edge(
                    &current.position,
                    &neighbor,
                    current.time_step,
                    agent.id,
                )
            {
                continue;
            }

            let old_g_cost = g_cost_map.get(&state).copied().unwrap_or(usize::MAX);
            if tentative_g_cost > old_g_cost {
                continue;
            }

            let h_open_cost = heuristic.estimate(&neighbor, &agent.target);
            if h_open_cost == usize::MAX {
                continue;
            }

            g_cost_map.insert(state.clone(), tentative_g_cost);
            trace.insert(state, (current.position.clone(), current.time_step));

            sequence += 1;
            open_list.insert(LowLevelOpenNode {
                position: neighbor,
                f_open_cost: tentative_g_cost + h_open_cost,
                g_cost: tentative_g_cost,
                time_step: next_time_step,
                sequence,
            });
        }
    }

    debug!("cannot find solution");
    Err(NotSolvable::Agent { agent: agent.id })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::{EdgeConstraint, VertexConstraint};
    use crate::map::{manhattan_distance, Map};

    use std::collections::HashMap;

    fn init_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter("debug")
            .with_test_writer()
            .try_init();
    }

    //  @@@@@@
    //  @....@
    //  @@.@.@
    //  @....@
    //  @@@@@@
    fn loop_map() -> Map {
        Map::from_rows(&["@@@@@@", "@....@", "@@.@.@", "@....@", "@@@@@@"]).unwrap()
    }

    fn loop_agent() -> Agent<(usize, usize)> {
        Agent {
            id: 0,
            start: (1, 1),
            target: (3, 3),
        }
    }

    #[test]
    fn test_a_star_basic_path() {
        init_tracing();
        let map = Map::from_rows(&["@@@@@", "@...@", "@@@@@"]).unwrap();
        let agent = Agent {
            id: 0,
            start: (1, 1),
            target: (1, 3),
        };
        let stats = &mut Stats::default();
        let path = a_star_search(
            &map,
            &manhattan_distance,
            &agent,
            0,
            &ConstraintSet::new(),
            stats,
        )
        .unwrap();
        assert_eq!(path, vec![(1, 1), (1, 2), (1, 3)]);
        assert!(stats.low_level_expand_nodes >= 3);
    }

    #[test]
    fn test_a_star_start_is_target() {
        init_tracing();
        let map = Map::from_rows(&["..", ".."]).unwrap();
        let agent = Agent {
            id: 0,
            start: (1, 0),
            target: (1, 0),
        };
        let path = a_star_search(
            &map,
            &manhattan_distance,
            &agent,
            0,
            &ConstraintSet::new(),
            &mut Stats::default(),
        )
        .unwrap();
        assert_eq!(path, vec![(1, 0)]);
    }

    #[test]
    fn test_a_star_unreachable_target() {
        init_tracing();
        let map = Map::from_rows(&["@@@@@", "@.@.@", "@@@@@"]).unwrap();
        let agent = Agent {
            id: 4,
            start: (1, 1),
            target: (1, 3),
        };
        let result = a_star_search(
            &map,
            &manhattan_distance,
            &agent,
            0,
            &ConstraintSet::new(),
            &mut Stats::default(),
        );
        assert_eq!(result, Err(NotSolvable::Agent { agent: 4 }));
    }

    #[test]
    fn test_a_star_optimal_path() {
        init_tracing();
        let map = loop_map();
        let path = a_star_search(
            &map,
            &manhattan_distance,
            &loop_agent(),
            0,
            &ConstraintSet::new(),
            &mut Stats::default(),
        )
        .unwrap();
        assert_eq!(path, vec![(1, 1), (1, 2), (2, 2), (3, 2), (3, 3)]);
    }

    #[test]
    fn test_a_star_vertex_constraint_forces_wait() {
        init_tracing();
        let map = loop_map();
        let constraints = ConstraintSet::new().with_vertex(VertexConstraint {
            position: (2, 2),
            time_step: 2,
            agent: 0,
        });
        let path = a_star_search(
            &map,
            &manhattan_distance,
            &loop_agent(),
            0,
            &constraints,
            &mut Stats::default(),
        )
        .unwrap();
        assert_eq!(path.len(), 6);
        assert_ne!(path[2], (2, 2));
        assert_eq!(path.first(), Some(&(1, 1)));
        assert_eq!(path.last(), Some(&(3, 3)));
    }

    #[test]
    fn test_a_star_edge_constraint_forces_wait() {
        init_tracing();
        let map = loop_map();
        let constraints = ConstraintSet::new().with_edge(EdgeConstraint {
            from_position: (1, 2),
            to_position: (2, 2),
            time_step: 1,
            agent: 0,
        });
        let path = a_star_search(
            &map,
            &manhattan_distance,
            &loop_agent(),
            0,
            &constraints,
            &mut Stats::default(),
        )
        .unwrap();
        assert_eq!(path.len(), 6);
        assert!(!(path[1] == (1, 2) && path[2] == (2, 2)));
    }

    #[test]
    fn test_a_star_ignores_other_agents_constraints() {
        init_tracing();
        let map = loop_map();
        let constraints = ConstraintSet::new()
            .with_vertex(VertexConstraint {
                position: (2, 2),
                time_step: 2,
                agent: 1,
            })
            .with_edge(EdgeConstraint {
                from_position: (1, 1),
                to_position: (1, 2),
                time_step: 0,
                agent: 1,
            });
        let path = a_star_search(
            &map,
            &manhattan_distance,
            &loop_agent(),
            0,
            &constraints,
            &mut Stats::default(),
        )
        .unwrap();
        assert_eq!(path.len(), 5);
    }

    #[test]
    fn test_a_star_target_constraint_delays_arrival() {
        init_tracing();
        let map = loop_map();
        let constraints = ConstraintSet::new().with_vertex(VertexConstraint {
            position: (3, 3),
            time_step: 4,
            agent: 0,
        });
        let path = a_star_search(
            &map,
            &manhattan_distance,
            &loop_agent(),
            0,
            &constraints,
            &mut Stats::default(),
        )
        .unwrap();
        assert_eq!(path.len(), 6);
        assert_eq!(path[5], (3, 3));
        assert_ne!(path[4], (3, 3));
    }

    #[test]
    fn test_a_star_depth_bound() {
        init_tracing();
        // Three vertices: time steps 0, 1 and 2 are the only ones generated.
        let map = Map::from_rows(&["..."]).unwrap();
        let agent = Agent {
            id: 0,
            start: (0, 0),
            target: (0, 2),
        };
        let free = a_star_search(
            &map,
            &manhattan_distance,
            &agent,
            0,
            &ConstraintSet::new(),
            &mut Stats::default(),
        );
        assert_eq!(free, Ok(vec![(0, 0), (0, 1), (0, 2)]));

        let constraints = ConstraintSet::new().with_vertex(VertexConstraint {
            position: (0, 1),
            time_step: 1,
            agent: 0,
        });
        let delayed = a_star_search(
            &map,
            &manhattan_distance,
            &agent,
            0,
            &constraints,
            &mut Stats::default(),
        );
        assert_eq!(delayed, Err(NotSolvable::Agent { agent: 0 }));
    }

    #[test]
    fn test_a_star_forbidden_start() {
        init_tracing();
        let map = loop_map();
        let constraints = ConstraintSet::new().with_vertex(VertexConstraint {
            position: (1, 1),
            time_step: 0,
            agent: 0,
        });
        let result = a_star_search(
            &map,
            &manhattan_distance,
            &loop_agent(),
            0,
            &constraints,
            &mut Stats::default(),
        );
        assert_eq!(result, Err(NotSolvable::Agent { agent: 0 }));
    }

    #[test]
    fn test_a_star_initial_time_step_offsets_constraints() {
        init_tracing();
        let map = loop_map();
        // Relative step 2 is absolute step 5 when starting at 3.
        let constraints = ConstraintSet::new().with_vertex(VertexConstraint {
            position: (2, 2),
            time_step: 5,
            agent: 0,
        });
        let path = a_star_search(
            &map,
            &manhattan_distance,
            &loop_agent(),
            3,
            &constraints,
            &mut Stats::default(),
        )
        .unwrap();
        assert_eq!(path.len(), 6);
    }

    // Non-grid graph: a ring of four named vertices.
    struct Ring {
        edges: HashMap<char, Vec<char>>,
    }

    impl Graph for Ring {
        type Coordinate = char;
        type Vertex = char;

        fn at(&self, coordinate: &char) -> &char {
            self.edges
                .get_key_value(coordinate)
                .map(|(key, _)| key)
                .unwrap()
        }

        fn neighbours(&self, coordinate: &char) -> Vec<char> {
            let mut neighbours = self.edges.get(coordinate).cloned().unwrap_or_default();
            neighbours.push(*coordinate);
            neighbours
        }

        fn size(&self) -> usize {
            self.edges.len()
        }
    }

    #[test]
    fn test_a_star_on_generic_graph() {
        init_tracing();
        let ring = Ring {
            edges: HashMap::from([
                ('a', vec!['b', 'd']),
                ('b', vec!['a', 'c']),
                ('c', vec!['b', 'd']),
                ('d', vec!['c', 'a']),
            ]),
        };
        let agent = Agent {
            id: 0,
            start: 'a',
            target: 'c',
        };
        let constraints = ConstraintSet::new().with_vertex(VertexConstraint {
            position: 'b',
            time_step: 1,
            agent: 0,
        });
        let zero = |_: &char, _: &char| 0usize;
        let path = a_star_search(
            &ring,
            &zero,
            &agent,
            0,
            &constraints,
            &mut Stats::default(),
        )
        .unwrap();
        assert_eq!(path, vec!['a', 'd', 'c']);
        assert_eq!(*ring.at(&'a'), 'a');
    }
}
