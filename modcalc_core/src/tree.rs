//! Passive mod tree with point allocation.

use crate::error::CalcError;
use crate::modifier::{compile_mods, Mod, RawMod};
use crate::registry::StatRegistry;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawNode {
    pub name: String,
    #[serde(default)]
    pub level_req: u32,
    #[serde(default)]
    pub cur_points: u32,
    pub max_points: u32,
    #[serde(default)]
    pub mods: Vec<RawMod>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawModTree {
    #[serde(default)]
    pub nodes: Vec<RawNode>,
}

impl RawModTree {
    pub fn compile(&self, registry: &StatRegistry) -> Result<ModTree, CalcError> {
        let nodes = self
            .nodes
            .iter()
            .map(|raw| -> Result<Node, CalcError> {
                Ok(Node {
                    name: raw.name.clone(),
                    level_req: raw.level_req,
                    cur_points: raw.cur_points.min(raw.max_points),
                    max_points: raw.max_points,
                    mods: compile_mods(&raw.mods, registry)?,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ModTree { nodes })
    }
}

/// One node. Its mods apply once per allocated point.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub name: String,
    pub level_req: u32,
    cur_points: u32,
    pub max_points: u32,
    pub mods: Vec<Mod>,
}

impl Node {
    pub fn cur_points(&self) -> u32 {
        self.cur_points
    }

    pub fn is_maxed(&self) -> bool {
        self.cur_points >= self.max_points
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TreeError {
    #[error("unknown tree node '{0}'")]
    UnknownNode(String),
    #[error("node '{node}' requires level {required}, player is level {level}")]
    LevelTooLow { node: String, required: u32, level: u32 },
    #[error("node '{0}' is already at max points")]
    NodeMaxed(String),
    #[error("no unspent points left")]
    NoPointsAvailable,
    #[error("node '{0}' has no points to remove")]
    NoPointsAllocated(String),
}

/// Owned by one build session; the only mutable state is each node's point count
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModTree {
    nodes: Vec<Node>,
}

impl ModTree {
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn node(&self, name: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.name == name)
    }

    fn node_mut(&mut self, name: &str) -> Result<&mut Node, TreeError> {
        self.nodes
            .iter_mut()
            .find(|n| n.name == name)
            .ok_or_else(|| TreeError::UnknownNode(name.to_string()))
    }

    pub fn spent_points(&self) -> u32 {
        self.nodes.iter().map(|n| n.cur_points).sum()
    }

    /// Put one point into `name`. `total_points` is everything the player may spend.
    pub fn allocate(&mut self, name: &str, player_level: u32, total_points: u32) -> Result<u32, TreeError> {
        if self.spent_points() >= total_points {
            return Err(TreeError::NoPointsAvailable);
        }
        let node = self.node_mut(name)?;
        if player_level < node.level_req {
            return Err(TreeError::LevelTooLow {
                node: name.to_string(),
                required: node.level_req,
                level: player_level,
            });
        }
        if node.is_maxed() {
            return Err(TreeError::NodeMaxed(name.to_string()));
        }
        node.cur_points += 1;
        tracing::debug!(node = name, points = node.cur_points, "allocated tree point");
        Ok(node.cur_points)
    }

    pub fn deallocate(&mut self, name: &str) -> Result<u32, TreeError> {
        let node = self.node_mut(name)?;
        if node.cur_points == 0 {
            return Err(TreeError::NoPointsAllocated(name.to_string()));
        }
        node.cur_points -= 1;
        Ok(node.cur_points)
    }

    /// Clear every allocation
    pub fn reset(&mut self) {
        for node in &mut self.nodes {
            node.cur_points = 0;
        }
    }

    /// Mods of allocated nodes, paired with the point count that scales them
    pub fn active_mods(&self) -> impl Iterator<Item = (f64, &Mod)> + '_ {
        self.nodes
            .iter()
            .filter(|n| n.cur_points > 0)
            .flat_map(|n| n.mods.iter().map(move |m| (n.cur_points as f64, m)))
    }
}
