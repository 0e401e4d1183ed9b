use mapf_cbs::common::{Agent, ConstraintTreeNode, NotSolvable, Solution};
use mapf_cbs::config::{Cli, Config, HeuristicKind};
use mapf_cbs::graph::Heuristic;
use mapf_cbs::map::{manhattan_distance, DistanceTable, Map};
use mapf_cbs::scenario::{load_agents_from_yaml, write_agents_to_yaml, Scenario};
use mapf_cbs::solver::{Branching, Solver, CBS};
use mapf_cbs::stat::Stats;

use anyhow::{bail, Context};
use clap::Parser;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use std::fs::File;
use std::io::BufWriter;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

type Coordinate = (usize, usize);

#[derive(Serialize)]
struct Report {
    solution: Solution<Coordinate>,
    stats: Stats,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
    let cli = Cli::parse();

    let config = if let Some(config_file) = cli.config.as_ref() {
        let config_str = std::fs::read_to_string(config_file)
            .with_context(|| format!("cannot read config file: {config_file}"))?;
        Config::from_yaml_str(&config_str)
            .with_context(|| format!("error with config file: {config_file}"))?
    } else {
        info!("No config file specified, using default config");
        Config::default()
    }
    .override_from_command_line(&cli)?;

    let map = Map::from_file(&config.map_path)?;
    let agents = load_agents(&config)?;
    map.validate_agents(&agents)?;
    if let Some(path) = &config.save_agents_path {
        write_agents_to_yaml(path, &agents)?;
        info!("Saved agents to {path}");
    }

    let result = match config.heuristic {
        HeuristicKind::Manhattan => {
            solve_instance(&map, manhattan_distance, &agents, config.branching)
        }
        HeuristicKind::Exact => {
            let table = DistanceTable::new(&map, agents.iter().map(|agent| agent.target));
            solve_instance(&map, table, &agents, config.branching)
        }
    };

    let (node, stats) = match result {
        (Ok(node), stats) => (node, stats),
        (Err(err), stats) => {
            error!("cbs solve fails: {err}");
            stats.print();
            return Err(err.into());
        }
    };

    if !node.verify(&map, &agents) {
        bail!("cbs returned an invalid solution");
    }
    info!("cbs solution cost {} makespan {}", node.cost(), node.makespan());

    if config.print_paths {
        print_paths(&node);
    }

    if let Some(path) = &config.output_path {
        let file = File::create(path).with_context(|| format!("cannot create {path}"))?;
        let report = Report {
            solution: node.into_solution(),
            stats,
        };
        serde_json::to_writer_pretty(BufWriter::new(file), &report)?;
        info!("Wrote report to {path}");
    }

    Ok(())
}

fn load_agents(config: &Config) -> anyhow::Result<Vec<Agent<Coordinate>>> {
    if let Some(path) = &config.agents_path {
        return load_agents_from_yaml(path);
    }

    let scenario = Scenario::load_from_scen(&config.scen_path)?;
    let mut rng = StdRng::seed_from_u64(config.seed);
    if !config.agents_dist.is_empty() {
        let num_agents = config.agents_dist.len();
        scenario.generate_agents_by_buckets(num_agents, &config.agents_dist, &mut rng)
    } else if config.random {
        let num_agents = config.num_agents.unwrap_or(scenario.len());
        scenario.generate_agents_randomly(num_agents, &mut rng)
    } else {
        scenario.generate_agents_in_order(config.num_agents)
    }
}

fn solve_instance<H: Heuristic<Coordinate>>(
    map: &Map,
    heuristic: H,
    agents: &[Agent<Coordinate>],
    branching: Branching,
) -> (Result<ConstraintTreeNode<Coordinate>, NotSolvable>, Stats) {
    let mut cbs_solver = CBS::new(map, heuristic, branching);
    let result = cbs_solver.solve(agents);
    (result, cbs_solver.stats().clone())
}

fn print_paths(node: &ConstraintTreeNode<Coordinate>) {
    let solution = node.solution();
    for time_step in 0..node.makespan() {
        let row: Vec<String> = solution
            .iter()
            .map(|path| match path.get(time_step) {
                Some((x, y)) => format!("{x},{y}"),
                None => "-".to_string(),
            })
            .collect();
        println!("{time_step}: {}", row.join(" "));
    }
}
