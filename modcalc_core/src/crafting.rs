//! Weighted random crafting of item modifiers with cost-gated tier targeting.
//!
//! Every action is validated and rolled by [`Crafter::plan`] without touching the item.
//! The returned [`CraftPlan`] is applied with [`CraftPlan::commit`], which is the only
//! place the item and the budget change.

use crate::error::CalcError;
use crate::item::{CraftedItem, ItemMod};
use crate::modifier::{RawStatMod, StatMod};
use crate::registry::StatRegistry;
use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Weight of a modifier that does not set one
pub const DEFAULT_WEIGHT: u32 = 100;

/// Item modifier as written in module content
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawItemModifier {
    pub id: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub stats: Vec<RawStatMod>,
    #[serde(default)]
    pub level_req: Option<u32>,
    #[serde(default)]
    pub weight: Option<u32>,
    pub table_index: u32,
    #[serde(default)]
    pub tier: u32,
}

impl RawItemModifier {
    pub fn compile(&self, registry: &StatRegistry) -> Result<ItemModifier, CalcError> {
        let stats = self
            .stats
            .iter()
            .map(|raw| raw.compile(registry))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(ItemModifier {
            id: self.id.clone(),
            description: self.description.clone(),
            stats,
            level_req: self.level_req,
            weight: self.weight,
            table_index: self.table_index,
            tier: self.tier,
        })
    }
}

/// A modifier that can roll onto an item. Higher tier is better.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemModifier {
    pub id: String,
    pub description: String,
    pub stats: Vec<StatMod>,
    pub level_req: Option<u32>,
    pub weight: Option<u32>,
    /// Modifiers sharing a table index are mutually exclusive on one item
    pub table_index: u32,
    pub tier: u32,
}

impl ItemModifier {
    pub fn weight(&self) -> u32 {
        self.weight.unwrap_or(DEFAULT_WEIGHT)
    }

    pub fn is_eligible(&self, item_level: u32) -> bool {
        self.level_req.map_or(true, |req| req <= item_level)
    }
}

/// All modifiers of a module, in content order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ItemModifierTable {
    modifiers: Vec<ItemModifier>,
}

impl ItemModifierTable {
    pub fn new(modifiers: Vec<ItemModifier>) -> Self {
        ItemModifierTable { modifiers }
    }

    pub fn compile(raw: &[RawItemModifier], registry: &StatRegistry) -> Result<Self, CalcError> {
        let modifiers = raw
            .iter()
            .map(|m| m.compile(registry))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ItemModifierTable { modifiers })
    }

    pub fn modifiers(&self) -> &[ItemModifier] {
        &self.modifiers
    }

    pub fn get(&self, id: &str) -> Option<&ItemModifier> {
        self.modifiers.iter().find(|m| m.id == id)
    }

    /// Modifiers competing for one slot
    pub fn partition(&self, table_index: u32) -> impl Iterator<Item = &ItemModifier> + '_ {
        self.modifiers
            .iter()
            .filter(move |m| m.table_index == table_index)
    }

    /// Distinct table indices, ascending
    pub fn table_indices(&self) -> Vec<u32> {
        let mut indices: Vec<u32> = self.modifiers.iter().map(|m| m.table_index).collect();
        indices.sort_unstable();
        indices.dedup();
        indices
    }
}

/// How the next modifier is chosen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TierStrategy {
    /// One weighted draw
    Random,
    /// Two weighted draws, the higher tier is kept
    Lucky,
    /// Highest eligible tier, no randomness
    MaxTier,
}

impl std::fmt::Display for TierStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TierStrategy::Random => write!(f, "random"),
            TierStrategy::Lucky => write!(f, "lucky"),
            TierStrategy::MaxTier => write!(f, "max_tier"),
        }
    }
}

impl FromStr for TierStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "random" => Ok(TierStrategy::Random),
            "lucky" => Ok(TierStrategy::Lucky),
            "max_tier" | "maxTier" => Ok(TierStrategy::MaxTier),
            other => Err(format!("unknown tier strategy '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CostRule {
    pub cost: u64,
}

/// Which strategies an action offers, and what each costs
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierTargets {
    #[serde(default)]
    pub random: Option<CostRule>,
    #[serde(default)]
    pub lucky: Option<CostRule>,
    #[serde(default, alias = "maxTier")]
    pub max_tier: Option<CostRule>,
}

impl TierTargets {
    pub fn get(&self, strategy: TierStrategy) -> Option<CostRule> {
        match strategy {
            TierStrategy::Random => self.random,
            TierStrategy::Lucky => self.lucky,
            TierStrategy::MaxTier => self.max_tier,
        }
    }
}

/// Weight multiplier for every modifier of one tier
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TierWeight {
    pub tier: u32,
    pub multiplier: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RollModsRules {
    #[serde(default)]
    pub weights: Vec<TierWeight>,
    #[serde(default, alias = "tierTargets")]
    pub tier_targets: TierTargets,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AddModRules {
    #[serde(default, alias = "tierTargets")]
    pub tier_targets: TierTargets,
}

/// Available crafting actions. A missing action cannot be used.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CraftingActions {
    #[serde(default, alias = "rollMods")]
    pub roll_mods: Option<RollModsRules>,
    #[serde(default, alias = "addMod")]
    pub add_mod: Option<AddModRules>,
    #[serde(default, alias = "rollValues")]
    pub roll_values: Option<CostRule>,
    #[serde(default)]
    pub remove: Option<CostRule>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CraftingBasic {
    #[serde(default)]
    pub actions: CraftingActions,
}

impl CraftingBasic {
    /// Multiplier for `tier`. Tiers without an entry keep their weight.
    pub fn tier_multiplier(&self, tier: u32) -> f64 {
        self.actions
            .roll_mods
            .as_ref()
            .and_then(|rules| rules.weights.iter().find(|w| w.tier == tier))
            .map_or(1.0, |w| w.multiplier)
    }
}

/// One crafting operation requested by the player
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum CraftAction {
    /// Reroll which modifier occupies one slot
    RollMods {
        table_index: u32,
        strategy: TierStrategy,
    },
    /// Fill an open slot from any partition not yet on the item
    AddMod { strategy: TierStrategy },
    /// Reroll the values of every modifier on the item
    RollValues,
    /// Remove one slot's modifier, or a random one
    Remove { table_index: Option<u32> },
}

impl CraftAction {
    pub fn name(&self) -> &'static str {
        match self {
            CraftAction::RollMods { .. } => "roll_mods",
            CraftAction::AddMod { .. } => "add_mod",
            CraftAction::RollValues => "roll_values",
            CraftAction::Remove { .. } => "remove",
        }
    }
}

/// Parses `roll_mods:<index>:<strategy>`, `add_mod:<strategy>`, `roll_values`,
/// `remove` and `remove:<index>`
impl FromStr for CraftAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(':').collect();
        let index = |text: &str| {
            text.parse::<u32>()
                .map_err(|_| format!("invalid table index '{}'", text))
        };

        match parts.as_slice() {
            ["roll_mods", table_index, strategy] => Ok(CraftAction::RollMods {
                table_index: index(table_index)?,
                strategy: strategy.parse()?,
            }),
            ["add_mod", strategy] => Ok(CraftAction::AddMod {
                strategy: strategy.parse()?,
            }),
            ["roll_values"] => Ok(CraftAction::RollValues),
            ["remove"] => Ok(CraftAction::Remove { table_index: None }),
            ["remove", table_index] => Ok(CraftAction::Remove {
                table_index: Some(index(table_index)?),
            }),
            _ => Err(format!("unrecognized craft action '{}'", s)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CraftError {
    #[error("action costs {cost} but only {budget} is available")]
    InsufficientBudget { cost: u64, budget: u64 },
    #[error("crafting action '{0}' is not available")]
    ActionUnavailable(&'static str),
    #[error("tier strategy '{0}' is not available for this action")]
    StrategyUnavailable(TierStrategy),
    #[error("no eligible modifiers")]
    NoEligibleModifiers,
    #[error("no open modifier slot")]
    NoOpenSlot,
    #[error("item has no modifiers")]
    NoModifiers,
    #[error("no modifier in slot {0}")]
    SlotEmpty(u32),
    #[error("unknown modifier: {0}")]
    UnknownModifier(String),
}

#[derive(Debug, Clone, PartialEq)]
enum Change {
    /// Replace the modifier in the same slot, or fill an open one
    Put(ItemMod),
    Reroll(Vec<ItemMod>),
    Remove(u32),
}

/// A validated, already rolled action waiting to be committed
#[derive(Debug, Clone, PartialEq)]
pub struct CraftPlan {
    pub action: CraftAction,
    pub cost: u64,
    change: Change,
}

/// What a committed action did to the item
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CraftOutcome {
    pub cost: u64,
    pub added: Vec<String>,
    pub removed: Vec<String>,
}

impl CraftPlan {
    /// The modifier this plan puts on the item, if any
    pub fn incoming(&self) -> Option<&ItemMod> {
        match &self.change {
            Change::Put(m) => Some(m),
            _ => None,
        }
    }

    /// Apply to `item` and deduct the cost from `budget`.
    ///
    /// On error neither the item nor the budget has changed.
    pub fn commit(self, item: &mut CraftedItem, budget: &mut u64) -> Result<CraftOutcome, CraftError> {
        if self.cost > *budget {
            return Err(CraftError::InsufficientBudget {
                cost: self.cost,
                budget: *budget,
            });
        }

        let mut outcome = CraftOutcome {
            cost: self.cost,
            ..CraftOutcome::default()
        };

        match self.change {
            Change::Put(new_mod) => {
                let slot = item
                    .mods
                    .iter()
                    .position(|m| m.table_index == new_mod.table_index);
                outcome.added.push(new_mod.modifier_id.clone());
                match slot {
                    Some(pos) => {
                        let old = std::mem::replace(&mut item.mods[pos], new_mod);
                        outcome.removed.push(old.modifier_id);
                    }
                    None if item.has_open_slot() => item.mods.push(new_mod),
                    None => return Err(CraftError::NoOpenSlot),
                }
            }
            Change::Reroll(mods) => {
                outcome.removed = item.mods.iter().map(|m| m.modifier_id.clone()).collect();
                outcome.added = mods.iter().map(|m| m.modifier_id.clone()).collect();
                item.mods = mods;
            }
            Change::Remove(table_index) => {
                let pos = item
                    .mods
                    .iter()
                    .position(|m| m.table_index == table_index)
                    .ok_or(CraftError::SlotEmpty(table_index))?;
                outcome.removed.push(item.mods.remove(pos).modifier_id);
            }
        }

        *budget -= self.cost;
        tracing::debug!(
            action = self.action.name(),
            cost = self.cost,
            remaining = *budget,
            "craft committed"
        );
        Ok(outcome)
    }
}

/// Plans and applies crafting actions against one module's modifier table
pub struct Crafter<'a> {
    table: &'a ItemModifierTable,
    rules: &'a CraftingBasic,
}

impl<'a> Crafter<'a> {
    pub fn new(table: &'a ItemModifierTable, rules: &'a CraftingBasic) -> Self {
        Crafter { table, rules }
    }

    pub fn table(&self) -> &ItemModifierTable {
        self.table
    }

    /// Create a seeded RNG from a u64 seed
    pub fn make_rng(seed: u64) -> ChaCha8Rng {
        ChaCha8Rng::seed_from_u64(seed)
    }

    /// Price of `action`, or why it cannot be used at all
    pub fn cost(&self, action: &CraftAction) -> Result<u64, CraftError> {
        let actions = &self.rules.actions;
        let unavailable = || CraftError::ActionUnavailable(action.name());

        match *action {
            CraftAction::RollMods { strategy, .. } => actions
                .roll_mods
                .as_ref()
                .ok_or_else(unavailable)?
                .tier_targets
                .get(strategy)
                .map(|rule| rule.cost)
                .ok_or(CraftError::StrategyUnavailable(strategy)),
            CraftAction::AddMod { strategy } => actions
                .add_mod
                .as_ref()
                .ok_or_else(unavailable)?
                .tier_targets
                .get(strategy)
                .map(|rule| rule.cost)
                .ok_or(CraftError::StrategyUnavailable(strategy)),
            CraftAction::RollValues => actions.roll_values.map(|r| r.cost).ok_or_else(unavailable),
            CraftAction::Remove { .. } => actions.remove.map(|r| r.cost).ok_or_else(unavailable),
        }
    }

    /// Validate and roll `action` without changing anything
    pub fn plan<R: Rng + ?Sized>(
        &self,
        item: &CraftedItem,
        action: &CraftAction,
        budget: u64,
        rng: &mut R,
    ) -> Result<CraftPlan, CraftError> {
        let cost = self.check_requirements(item, action, budget)?;

        let change = match *action {
            CraftAction::RollMods {
                table_index,
                strategy,
            } => {
                let candidates = self.slot_candidates(item, table_index);
                let chosen = self.select(&candidates, strategy, rng)?;
                Change::Put(ItemMod::roll(chosen, rng))
            }
            CraftAction::AddMod { strategy } => {
                let candidates = self.open_candidates(item);
                let chosen = self.select(&candidates, strategy, rng)?;
                Change::Put(ItemMod::roll(chosen, rng))
            }
            CraftAction::RollValues => {
                let mods = item
                    .mods
                    .iter()
                    .map(|m| {
                        self.table
                            .get(&m.modifier_id)
                            .map(|def| ItemMod::roll(def, rng))
                            .ok_or_else(|| CraftError::UnknownModifier(m.modifier_id.clone()))
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                Change::Reroll(mods)
            }
            CraftAction::Remove { table_index } => match table_index {
                Some(index) => Change::Remove(index),
                None => {
                    let idx = rng.gen_range(0..item.mods.len());
                    Change::Remove(item.mods[idx].table_index)
                }
            },
        };

        Ok(CraftPlan {
            action: action.clone(),
            cost,
            change,
        })
    }

    /// Plan and commit in one step
    pub fn apply<R: Rng + ?Sized>(
        &self,
        item: &mut CraftedItem,
        action: &CraftAction,
        budget: &mut u64,
        rng: &mut R,
    ) -> Result<CraftOutcome, CraftError> {
        self.plan(item, action, *budget, rng)
            .and_then(|plan| plan.commit(item, budget))
            .inspect_err(|e| tracing::debug!(action = action.name(), "craft rejected: {}", e))
    }

    /// Validate upfront, before any randomness is consumed. Returns the cost.
    fn check_requirements(
        &self,
        item: &CraftedItem,
        action: &CraftAction,
        budget: u64,
    ) -> Result<u64, CraftError> {
        let cost = self.cost(action)?;
        if cost > budget {
            return Err(CraftError::InsufficientBudget { cost, budget });
        }

        match *action {
            CraftAction::RollMods { table_index, .. } => {
                if !item.is_occupied(table_index) && !item.has_open_slot() {
                    return Err(CraftError::NoOpenSlot);
                }
                if self.slot_candidates(item, table_index).is_empty() {
                    return Err(CraftError::NoEligibleModifiers);
                }
            }
            CraftAction::AddMod { .. } => {
                if !item.has_open_slot() {
                    return Err(CraftError::NoOpenSlot);
                }
                if self.open_candidates(item).is_empty() {
                    return Err(CraftError::NoEligibleModifiers);
                }
            }
            CraftAction::RollValues => {
                if item.mods.is_empty() {
                    return Err(CraftError::NoModifiers);
                }
            }
            CraftAction::Remove { table_index } => {
                if item.mods.is_empty() {
                    return Err(CraftError::NoModifiers);
                }
                if let Some(index) = table_index {
                    if !item.is_occupied(index) {
                        return Err(CraftError::SlotEmpty(index));
                    }
                }
            }
        }

        Ok(cost)
    }

    fn slot_candidates(&self, item: &CraftedItem, table_index: u32) -> Vec<&'a ItemModifier> {
        self.table
            .partition(table_index)
            .filter(|m| m.is_eligible(item.item_level))
            .collect()
    }

    fn open_candidates(&self, item: &CraftedItem) -> Vec<&'a ItemModifier> {
        self.table
            .modifiers()
            .iter()
            .filter(|m| !item.is_occupied(m.table_index) && m.is_eligible(item.item_level))
            .collect()
    }

    fn select<R: Rng + ?Sized>(
        &self,
        candidates: &[&'a ItemModifier],
        strategy: TierStrategy,
        rng: &mut R,
    ) -> Result<&'a ItemModifier, CraftError> {
        match strategy {
            TierStrategy::Random => self.weighted_draw(candidates, rng),
            TierStrategy::Lucky => {
                let first = self.weighted_draw(candidates, rng)?;
                let second = self.weighted_draw(candidates, rng)?;
                Ok(if second.tier > first.tier { second } else { first })
            }
            TierStrategy::MaxTier => candidates
                .iter()
                .copied()
                .fold(None, |best: Option<&'a ItemModifier>, m| match best {
                    Some(b) if b.tier >= m.tier => Some(b),
                    _ => Some(m),
                })
                .ok_or(CraftError::NoEligibleModifiers),
        }
    }

    /// Cumulative weighted roll over `candidates`
    fn weighted_draw<R: Rng + ?Sized>(
        &self,
        candidates: &[&'a ItemModifier],
        rng: &mut R,
    ) -> Result<&'a ItemModifier, CraftError> {
        let weights: Vec<f64> = candidates
            .iter()
            .map(|m| (m.weight() as f64 * self.rules.tier_multiplier(m.tier)).max(0.0))
            .collect();

        let total_weight: f64 = weights.iter().sum();
        if total_weight <= 0.0 {
            return Err(CraftError::NoEligibleModifiers);
        }

        let mut roll = rng.gen_range(0.0..total_weight);
        for (modifier, &weight) in candidates.iter().zip(weights.iter()) {
            if roll < weight {
                return Ok(*modifier);
            }
            roll -= weight;
        }

        // Rounding can leave the roll just past the last bucket
        candidates
            .iter()
            .zip(weights.iter())
            .rev()
            .find(|(_, w)| **w > 0.0)
            .map(|(m, _)| *m)
            .ok_or(CraftError::NoEligibleModifiers)
    }
}
