use anyhow::{anyhow, bail, Context};
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap, HashSet};
use std::fs;
use std::str::FromStr;

use crate::common::Agent;
use crate::graph::{Graph, Heuristic};

#[derive(Debug, Clone)]
pub struct Tile {
    passable: bool,
    pub neighbors: Vec<(usize, usize)>, // Stores coordinates of accessible neighbors
}

impl Tile {
    pub fn is_passable(&self) -> bool {
        self.passable
    }
}

/// 4-connected grid in MovingAI text format; coordinates are (row, column).
#[derive(Debug, Clone)]
pub struct Map {
    pub height: usize,
    pub width: usize,
    pub grid: Vec<Vec<Tile>>,
}

impl Map {
    pub fn from_file(path: &str) -> anyhow::Result<Self> {
        let content =
            fs::read_to_string(path).with_context(|| format!("cannot read map file {path}"))?;
        content
            .parse()
            .with_context(|| format!("invalid map file {path}"))
    }

    /// Builds a map from bare rows, without the MovingAI header.
    pub fn from_rows<S: AsRef<str>>(rows: &[S]) -> anyhow::Result<Self> {
        let height = rows.len();
        let width = rows.first().map_or(0, |row| row.as_ref().chars().count());
        Self::from_lines(height, width, rows.iter().map(|row| row.as_ref()))
    }

    fn from_lines<'a>(
        height: usize,
        width: usize,
        lines: impl Iterator<Item = &'a str>,
    ) -> anyhow::Result<Self> {
        if height == 0 || width == 0 {
            bail!("map must have at least one row and one column");
        }

        let mut grid = Vec::with_capacity(height);
        for (row, line) in lines.enumerate() {
            if row >= height {
                if line.trim().is_empty() {
                    continue;
                }
                bail!("too many map rows, expected {height}");
            }
            let tiles_row = line
                .trim_end()
                .chars()
                .map(|ch| {
                    let passable = match ch {
                        '.' | 'G' | 'S' => true,
                        '@' | 'O' | 'T' | 'W' => false,
                        _ => return Err(anyhow!("invalid tile {ch:?} in row {row}")),
                    };
                    Ok(Tile {
                        passable,
                        neighbors: Vec::new(),
                    })
                })
                .collect::<anyhow::Result<Vec<_>>>()?;
            if tiles_row.len() != width {
                bail!(
                    "row {row} has {} tiles, expected {width}",
                    tiles_row.len()
                );
            }
            grid.push(tiles_row);
        }
        if grid.len() != height {
            bail!("map has {} rows, expected {height}", grid.len());
        }

        let mut map = Map {
            height,
            width,
            grid,
        };
        map.initialize_neighbors();
        Ok(map)
    }

    fn initialize_neighbors(&mut self) {
        for x in 0..self.height {
            for y in 0..self.width {
                if self.grid[x][y].passable {
                    self.grid[x][y].neighbors = self.get_neighbors(x, y);
                }
            }
        }
    }

    pub fn get_neighbors(&self, x: usize, y: usize) -> Vec<(usize, usize)> {
        let directions = [(-1, 0), (1, 0), (0, -1), (0, 1), (0, 0)]; // Up, down, left, right, stay
        let mut neighbors = Vec::new();

        for &(dx, dy) in &directions {
            let new_x = x as i64 + dx;
            let new_y = y as i64 + dy;
            if new_x >= 0
                && new_y >= 0
                && new_x < self.height as i64
                && new_y < self.width as i64
                && self.grid[new_x as usize][new_y as usize].passable
            {
                neighbors.push((new_x as usize, new_y as usize));
            }
        }

        neighbors
    }

    pub fn in_bounds(&self, x: usize, y: usize) -> bool {
        x < self.height && y < self.width
    }

    pub fn is_passable(&self, x: usize, y: usize) -> bool {
        self.in_bounds(x, y) && self.grid[x][y].is_passable()
    }

    /// Rejects agent lists the solver must never see: blocked or out-of-map
    /// endpoints, duplicate ids and shared start cells.
    pub fn validate_agents(&self, agents: &[Agent<(usize, usize)>]) -> anyhow::Result<()> {
        let mut ids = HashSet::new();
        let mut starts = HashSet::new();
        for agent in agents {
            for (name, (x, y)) in [("start", agent.start), ("target", agent.target)] {
                if !self.is_passable(x, y) {
                    bail!("agent {} has blocked {name} {:?}", agent.id, (x, y));
                }
            }
            if !ids.insert(agent.id) {
                bail!("duplicate agent id {}", agent.id);
            }
            if !starts.insert(agent.start) {
                bail!("agent {} shares start {:?}", agent.id, agent.start);
            }
        }
        Ok(())
    }

    /// Exact distance from every cell to `goal`; `usize::MAX` where unreachable.
    pub fn heuristic_dji(&self, goal: (usize, usize)) -> Vec<Vec<usize>> {
        let mut heuristic = vec![vec![usize::MAX; self.width]; self.height];
        let mut heap = BinaryHeap::new();

        heuristic[goal.0][goal.1] = 0;
        heap.push((Reverse(0), goal));

        while let Some((Reverse(cost), (x, y))) = heap.pop() {
            if cost > heuristic[x][y] {
                continue;
            }

            for &(new_x, new_y) in &self.grid[x][y].neighbors {
                let next_cost = cost + 1;
                if next_cost < heuristic[new_x][new_y] {
                    heap.push((Reverse(next_cost), (new_x, new_y)));
                    heuristic[new_x][new_y] = next_cost;
                }
            }
        }

        heuristic
    }
}

impl FromStr for Map {
    type Err = anyhow::Error;

    fn from_str(content: &str) -> anyhow::Result<Self> {
        let mut lines = content.lines();
        let mut header = |name: &str| -> anyhow::Result<String> {
            let line = lines
                .next()
                .ok_or_else(|| anyhow!("unexpected end of file, missing {name} line"))?;
            Ok(line.trim().to_string())
        };

        let _type = header("type")?;
        let height = header("height")?;
        let height = height
            .strip_prefix("height")
            .and_then(|value| value.trim().parse::<usize>().ok())
            .ok_or_else(|| anyhow!("invalid height line {height:?}"))?;
        let width = header("width")?;
        let width = width
            .strip_prefix("width")
            .and_then(|value| value.trim().parse::<usize>().ok())
            .ok_or_else(|| anyhow!("invalid width line {width:?}"))?;
        if header("map")? != "map" {
            bail!("missing map line");
        }

        Self::from_lines(height, width, lines)
    }
}

impl Graph for Map {
    type Coordinate = (usize, usize);
    type Vertex = Tile;

    fn at(&self, coordinate: &(usize, usize)) -> &Tile {
        &self.grid[coordinate.0][coordinate.1]
    }

    fn neighbours(&self, coordinate: &(usize, usize)) -> Vec<(usize, usize)> {
        self.grid
            .get(coordinate.0)
            .and_then(|row| row.get(coordinate.1))
            .map(|tile| tile.neighbors.clone())
            .unwrap_or_default()
    }

    fn size(&self) -> usize {
        self.height * self.width
    }
}

pub fn manhattan_distance(from: &(usize, usize), to: &(usize, usize)) -> usize {
    from.0.abs_diff(to.0) + from.1.abs_diff(to.1)
}

/// Exact shortest-path distances towards a fixed set of targets.
#[derive(Debug, Clone, Default)]
pub struct DistanceTable {
    tables: HashMap<(usize, usize), Vec<Vec<usize>>>,
}

impl DistanceTable {
    pub fn new(map: &Map, targets: impl IntoIterator<Item = (usize, usize)>) -> Self {
        let mut tables = HashMap::new();
        for target in targets {
            tables
                .entry(target)
                .or_insert_with(|| map.heuristic_dji(target));
        }
        DistanceTable { tables }
    }
}

impl Heuristic<(usize, usize)> for DistanceTable {
    fn estimate(&self, from: &(usize, usize), to: &(usize, usize)) -> usize {
        match self.tables.get(to) {
            Some(table) => table[from.0][from.1],
            None => manhattan_distance(from, to),
        }
    }
}
