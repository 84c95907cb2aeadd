use crate::crafting::ItemModifier;
use crate::modifier::{Mod, StatMod};
use crate::resolver::roll_value;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// An item instance being crafted. The only mutable entity crafting touches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CraftedItem {
    pub name: String,
    /// Gates which modifiers can roll
    pub item_level: u32,
    /// How many modifier slots the item has
    pub max_mods: usize,
    /// Rolled modifiers, at most one per table index
    pub mods: Vec<ItemMod>,
}

impl CraftedItem {
    pub fn new(name: impl Into<String>, item_level: u32, max_mods: usize) -> Self {
        CraftedItem {
            name: name.into(),
            item_level,
            max_mods,
            mods: Vec::new(),
        }
    }

    pub fn has_open_slot(&self) -> bool {
        self.mods.len() < self.max_mods
    }

    pub fn slot(&self, table_index: u32) -> Option<&ItemMod> {
        self.mods.iter().find(|m| m.table_index == table_index)
    }

    pub fn is_occupied(&self, table_index: u32) -> bool {
        self.slot(table_index).is_some()
    }

    /// Rolled mods, ready for aggregation
    pub fn active_mods(&self) -> impl Iterator<Item = &Mod> + '_ {
        self.mods.iter().map(|m| &m.rolled)
    }

    /// Export item to markdown format
    pub fn to_markdown(&self) -> String {
        let mut md = String::new();

        md.push_str(&format!("## {}\n", self.name));
        md.push_str(&format!(
            "*Item level {}, {}/{} modifiers*\n\n",
            self.item_level,
            self.mods.len(),
            self.max_mods
        ));

        if !self.mods.is_empty() {
            md.push_str("### Modifiers\n");
            for m in &self.mods {
                md.push_str(&format!("- {} (T{})\n", m.display(), m.tier));
            }
            md.push('\n');
        }

        md
    }
}

/// A modifier rolled onto an item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemMod {
    /// Id of the defining [`ItemModifier`]
    pub modifier_id: String,
    pub table_index: u32,
    pub tier: u32,
    /// The defining stats with every range replaced by its rolled value
    pub rolled: Mod,
}

impl ItemMod {
    /// Roll fresh values for every ranged stat of `modifier`
    pub fn roll<R: Rng + ?Sized>(modifier: &ItemModifier, rng: &mut R) -> Self {
        let stats = modifier
            .stats
            .iter()
            .map(|stat_mod| match (stat_mod.min, stat_mod.max) {
                (Some(min), Some(max)) if stat_mod.value.is_none() => StatMod {
                    value: Some(roll_value(rng, min.min(max), max.max(min))),
                    min: None,
                    max: None,
                    ..stat_mod.clone()
                },
                _ => stat_mod.clone(),
            })
            .collect();

        ItemMod {
            modifier_id: modifier.id.clone(),
            table_index: modifier.table_index,
            tier: modifier.tier,
            rolled: Mod {
                id: modifier.id.clone(),
                description: modifier.description.clone(),
                stats,
            },
        }
    }

    /// Display the modifier as a human-readable string
    pub fn display(&self) -> String {
        if !self.rolled.description.is_empty() {
            return self.rolled.describe();
        }

        self.rolled
            .stats
            .iter()
            .map(|s| {
                let stat_name = s.stat.name().chars().fold(String::new(), |mut acc, c| {
                    if c.is_uppercase() {
                        acc.push(' ');
                        acc.extend(c.to_lowercase());
                    } else {
                        acc.push(c);
                    }
                    acc
                });
                let value = s.value.unwrap_or_default();
                if s.stat.is_percent() {
                    format!("+{}% {}", value, stat_name)
                } else {
                    format!("+{} {}", value, stat_name)
                }
            })
            .collect::<Vec<_>>()
            .join(", ")
    }
}
