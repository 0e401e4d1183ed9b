use anyhow::{anyhow, bail, Context, Result};
use rand::prelude::*;
use serde::Deserialize;
use std::collections::{BTreeMap, HashSet};
use std::fs::{self, File};
use std::io::{self, BufReader, Write};
use tracing::info;

use crate::common::Agent;

/// One scenario line; `x` is the column and `y` the row, as in MovingAI files.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Route {
    pub start_x: usize,
    pub start_y: usize,
    pub goal_x: usize,
    pub goal_y: usize,
}

impl Route {
    fn into_agent(self, id: usize) -> Agent<(usize, usize)> {
        Agent {
            id,
            start: (self.start_y, self.start_x),
            target: (self.goal_y, self.goal_x),
        }
    }
}

type Bucket = Vec<Route>;

#[derive(Debug, Clone, Default)]
pub struct Scenario {
    pub map: String,
    pub map_width: usize,
    pub map_height: usize,
    pub buckets: BTreeMap<usize, Bucket>,
    routes: Vec<Route>,
}

impl Scenario {
    pub fn load_from_scen(path: &str) -> Result<Scenario> {
        let content =
            fs::read_to_string(path).with_context(|| format!("cannot read scenario {path}"))?;
        Self::parse(&content).with_context(|| format!("invalid scenario {path}"))
    }

    pub fn parse(content: &str) -> Result<Scenario> {
        let mut lines = content.lines();

        let version = lines
            .next()
            .ok_or_else(|| anyhow!("empty scenario, missing version line"))?;
        if !version.trim_start().starts_with("version") {
            bail!("first line must be the version line, got {version:?}");
        }

        let mut scenario = Scenario::default();

        for (number, line) in lines.enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let parts: Vec<&str> = line.split_whitespace().collect();
            if parts.len() != 9 {
                bail!(
                    "line {} has {} fields, expected 9",
                    number + 2,
                    parts.len()
                );
            }
            let field = |index: usize| -> Result<usize> {
                parts[index]
                    .parse()
                    .with_context(|| format!("line {}: bad field {:?}", number + 2, parts[index]))
            };

            let bucket_index = field(0)?;
            let route = Route {
                start_x: field(4)?,
                start_y: field(5)?,
                goal_x: field(6)?,
                goal_y: field(7)?,
            };

            if scenario.map.is_empty() {
                // Map details come from the first route entry
                scenario.map = parts[1].to_string();
                scenario.map_width = field(2)?;
                scenario.map_height = field(3)?;
            }

            scenario
                .buckets
                .entry(bucket_index)
                .or_default()
                .push(route.clone());
            scenario.routes.push(route);
        }

        Ok(scenario)
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// The first `num_agents` routes in file order, or all of them.
    pub fn generate_agents_in_order(
        &self,
        num_agents: Option<usize>,
    ) -> Result<Vec<Agent<(usize, usize)>>> {
        let count = num_agents.unwrap_or(self.routes.len());
        if count > self.routes.len() {
            bail!(
                "scenario has {} routes, {count} agents requested",
                self.routes.len()
            );
        }
        let agents: Vec<_> = self.routes[..count]
            .iter()
            .cloned()
            .enumerate()
            .map(|(id, route)| route.into_agent(id))
            .collect();
        info!("Generate scen: {agents:?}");
        Ok(agents)
    }

    pub fn generate_agents_by_buckets<R: Rng + ?Sized>(
        &self,
        num_agents: usize,
        agent_buckets: &[usize],
        rng: &mut R,
    ) -> Result<Vec<Agent<(usize, usize)>>> {
        if agent_buckets.len() != num_agents {
            bail!("Number of agents does not match the length of agent_buckets");
        }

        let mut agents = Vec::new();
        let mut used_routes: BTreeMap<usize, HashSet<usize>> = BTreeMap::new();

        for (agent_id, &bucket_index) in agent_buckets.iter().enumerate() {
            let bucket = self
                .buckets
                .get(&bucket_index)
                .ok_or_else(|| anyhow!("Bucket {bucket_index} not found"))?;

            let available_routes: Vec<usize> = (0..bucket.len())
                .filter(|idx| {
                    used_routes
                        .get(&bucket_index)
                        .map_or(true, |used| !used.contains(idx))
                })
                .collect();

            let route_index = *available_routes
                .choose(rng)
                .ok_or_else(|| anyhow!("No available routes left in bucket {bucket_index}"))?;

            agents.push(bucket[route_index].clone().into_agent(agent_id));

            used_routes
                .entry(bucket_index)
                .or_default()
                .insert(route_index);
        }

        info!("Generate scen: {agents:?}");
        Ok(agents)
    }

    pub fn generate_agents_randomly<R: Rng + ?Sized>(
        &self,
        num_agents: usize,
        rng: &mut R,
    ) -> Result<Vec<Agent<(usize, usize)>>> {
        let mut available_routes = self.routes.clone();
        available_routes.sort();
        available_routes.dedup();

        if available_routes.len() < num_agents {
            bail!("Not enough unique routes available to match the number of agents");
        }

        available_routes.shuffle(rng);

        let agents: Vec<_> = available_routes
            .into_iter()
            .take(num_agents)
            .enumerate()
            .map(|(id, route)| route.into_agent(id))
            .collect();

        info!("Generate scen: {agents:?}");
        Ok(agents)
    }
}

pub fn load_agents_from_yaml(path: &str) -> Result<Vec<Agent<(usize, usize)>>> {
    let file = File::open(path).with_context(|| format!("cannot open agents file {path}"))?;
    let reader = BufReader::new(file);
    let agents = serde_yaml::from_reader(reader)
        .with_context(|| format!("invalid agents file {path}"))?;
    Ok(agents)
}

pub fn write_agents_to_yaml(path: &str, agents: &[Agent<(usize, usize)>]) -> Result<()> {
    let file = File::create(path).with_context(|| format!("cannot create {path}"))?;
    let mut writer = io::BufWriter::new(file);
    let yaml_data = serde_yaml::to_string(&agents)?;
    writer.write_all(yaml_data.as_bytes())?;
    writer.flush()?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn test_scenario() -> Scenario {
        Scenario::load_from_scen("map_file/test/test.scen").expect("Error loading scenario")
    }

    #[test]
    fn test_read_scenario() {
        let scen = test_scenario();

        assert_eq!(scen.map, "test.map");
        assert_eq!(scen.map_width, 5);
        assert_eq!(scen.map_height, 4);
        assert_eq!(scen.len(), 4);
        assert_eq!(scen.buckets.len(), 2);
        assert_eq!(scen.buckets[&1].len(), 2);

        let agents = scen.generate_agents_in_order(Some(2)).unwrap();
        let answer = [
            Agent {
                id: 0,
                start: (0, 0),
                target: (3, 4),
            },
            Agent {
                id: 1,
                start: (0, 4),
                target: (3, 0),
            },
        ];
        assert_eq!(agents, answer);
        assert_eq!(scen.generate_agents_in_order(None).unwrap().len(), 4);
        assert!(scen.generate_agents_in_order(Some(5)).is_err());
    }

    #[test]
    fn test_parse_rejects_bad_scenarios() {
        assert!(Scenario::parse("").is_err());
        assert!(Scenario::parse("0 a.map 5 4 0 0 4 3 7\n").is_err());
        assert!(Scenario::parse("version 1\n0 a.map 5 4 0 0 4 3\n").is_err());
        assert!(Scenario::parse("version 1\n0 a.map 5 4 x 0 4 3 7\n").is_err());

        let empty = Scenario::parse("version 1\n").unwrap();
        assert!(empty.is_empty());
    }

    #[test]
    fn test_generate_agents_by_buckets() {
        let scen = test_scenario();
        let mut rng = StdRng::seed_from_u64(0);

        let agents = scen
            .generate_agents_by_buckets(3, &[1, 1, 0], &mut rng)
            .unwrap();
        assert_eq!(agents.len(), 3);
        assert_eq!(
            agents.iter().map(|agent| agent.id).collect::<Vec<_>>(),
            vec![0, 1, 2]
        );
        // Both routes of bucket 1 are used exactly once.
        let mut bucket_one: Vec<_> = agents[..2].iter().map(|agent| agent.start).collect();
        bucket_one.sort();
        assert_eq!(bucket_one, vec![(0, 2), (3, 0)]);
        assert!([(0, 0), (0, 4)].contains(&agents[2].start));

        assert!(scen
            .generate_agents_by_buckets(3, &[1, 1, 1], &mut rng)
            .is_err());
        assert!(scen.generate_agents_by_buckets(1, &[7], &mut rng).is_err());
        assert!(scen.generate_agents_by_buckets(2, &[0], &mut rng).is_err());
    }

    #[test]
    fn test_generate_agents_randomly_is_seeded() {
        let scen = test_scenario();

        let first = scen
            .generate_agents_randomly(3, &mut StdRng::seed_from_u64(7))
            .unwrap();
        let second = scen
            .generate_agents_randomly(3, &mut StdRng::seed_from_u64(7))
            .unwrap();
        assert_eq!(first, second);

        let starts: HashSet<_> = first.iter().map(|agent| agent.start).collect();
        assert_eq!(starts.len(), 3);

        assert!(scen
            .generate_agents_randomly(5, &mut StdRng::seed_from_u64(7))
            .is_err());
    }

    #[test]
    fn test_agents_yaml_file() {
        let agents = test_scenario().generate_agents_in_order(None).unwrap();
        let path = std::env::temp_dir().join(format!("mapf_cbs_agents_{}.yaml", std::process::id()));
        let path = path.to_str().unwrap();

        write_agents_to_yaml(path, &agents).unwrap();
        assert_eq!(load_agents_from_yaml(path).unwrap(), agents);
        std::fs::remove_file(path).unwrap();

        assert!(load_agents_from_yaml("map_file/test/missing.yaml").is_err());
    }
}
