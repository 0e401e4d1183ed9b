use anyhow::{anyhow, Context};
use clap::{Parser, ValueEnum};
use serde::Deserialize;

use crate::solver::Branching;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum HeuristicKind {
    #[default]
    Manhattan,
    /// Exact grid distances precomputed per target.
    Exact,
}

#[derive(Parser, Debug)]
#[command(
    name = "mapf_cbs",
    about = "Optimal multi-agent path finding with Conflict-Based Search.",
    version = "0.1.0"
)]
pub struct Cli {
    #[arg(long, help = "Path to a YAML config file")]
    pub config: Option<String>,

    #[arg(long, help = "Path to the map file")]
    pub map_path: Option<String>,

    #[arg(long, help = "Path to the MovingAI scenario file")]
    pub scen_path: Option<String>,

    #[arg(long, help = "Load agents from a YAML file instead of the scenario")]
    pub agents_path: Option<String>,

    #[arg(long, help = "Write the selected agents to a YAML file")]
    pub save_agents_path: Option<String>,

    #[arg(long, help = "Write the solution and stats as JSON")]
    pub output_path: Option<String>,

    #[arg(long, help = "Number of agents")]
    pub num_agents: Option<usize>,

    #[arg(long, help = "Distribution of agents", use_value_delimiter = true)]
    pub agents_dist: Vec<usize>,

    #[arg(long, help = "Pick scenario routes at random")]
    pub random: bool,

    #[arg(long, help = "Seed for the random number generator")]
    pub seed: Option<u64>,

    #[arg(long, value_enum, help = "Conflicts to branch on")]
    pub branching: Option<Branching>,

    #[arg(long, value_enum, help = "Low-level heuristic")]
    pub heuristic: Option<HeuristicKind>,

    #[arg(long, help = "Print the position of every agent at every time step")]
    pub print_paths: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub map_path: String,
    pub scen_path: String,
    pub agents_path: Option<String>,
    pub save_agents_path: Option<String>,
    pub output_path: Option<String>,
    pub num_agents: Option<usize>,
    pub agents_dist: Vec<usize>,
    pub random: bool,
    pub seed: u64,
    pub branching: Branching,
    pub heuristic: HeuristicKind,
    pub print_paths: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            map_path: "map_file/test/test.map".to_string(),
            scen_path: "map_file/test/test.scen".to_string(),
            agents_path: None,
            save_agents_path: None,
            output_path: None,
            num_agents: None,
            agents_dist: Vec::new(),
            random: false,
            seed: 0,
            branching: Branching::default(),
            heuristic: HeuristicKind::default(),
            print_paths: false,
        }
    }
}

impl Config {
    pub fn from_yaml_str(content: &str) -> anyhow::Result<Self> {
        serde_yaml::from_str(content).context("cannot parse config")
    }

    /// Command-line values win over the config file.
    pub fn override_from_command_line(mut self, cli: &Cli) -> anyhow::Result<Self> {
        if let Some(map_path) = &cli.map_path {
            self.map_path = map_path.clone();
        }
        if let Some(scen_path) = &cli.scen_path {
            self.scen_path = scen_path.clone();
        }
        if cli.agents_path.is_some() {
            self.agents_path = cli.agents_path.clone();
        }
        if cli.save_agents_path.is_some() {
            self.save_agents_path = cli.save_agents_path.clone();
        }
        if cli.output_path.is_some() {
            self.output_path = cli.output_path.clone();
        }
        if cli.num_agents.is_some() {
            self.num_agents = cli.num_agents;
        }
        if !cli.agents_dist.is_empty() {
            self.agents_dist = cli.agents_dist.clone();
        }
        self.random |= cli.random;
        if let Some(seed) = cli.seed {
            self.seed = seed;
        }
        if let Some(branching) = cli.branching {
            self.branching = branching;
        }
        if let Some(heuristic) = cli.heuristic {
            self.heuristic = heuristic;
        }
        self.print_paths |= cli.print_paths;

        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if !self.agents_dist.is_empty() {
            if self.random {
                return Err(anyhow!(
                    "agents_dist and random selection cannot be combined"
                ));
            }
            let num_agents = self
                .num_agents
                .ok_or_else(|| anyhow!("agents_dist requires num_agents"))?;
            if self.agents_dist.len() != num_agents {
                return Err(anyhow!(
                    "agents_dist has {} entries, expected {num_agents}",
                    self.agents_dist.len()
                ));
            }
        }
        if self.random && self.num_agents.is_none() {
            return Err(anyhow!("random selection requires num_agents"));
        }
        if self.agents_path.is_some() && (self.random || !self.agents_dist.is_empty()) {
            return Err(anyhow!(
                "agents_path cannot be combined with scenario selection options"
            ));
        }
        Ok(())
    }
}
