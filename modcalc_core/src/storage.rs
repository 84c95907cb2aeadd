use crate::crafting::{CraftAction, CraftError, CraftOutcome, Crafter};
use crate::item::CraftedItem;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

/// Compact form of a crafted item: seed + the actions that succeeded on it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredItem {
    pub name: String,
    pub item_level: u32,
    pub max_mods: usize,
    /// RNG seed for deterministic recreation
    pub seed: u64,
    /// Committed actions, in order
    #[serde(default)]
    pub operations: Vec<CraftAction>,
}

impl StoredItem {
    pub fn new(name: impl Into<String>, item_level: u32, max_mods: usize, seed: u64) -> Self {
        StoredItem {
            name: name.into(),
            item_level,
            max_mods,
            seed,
            operations: Vec::new(),
        }
    }

    /// Rebuild the item by replaying every recorded action from the seed
    pub fn reconstruct(&self, crafter: &Crafter) -> CraftedItem {
        self.replay(crafter).0
    }

    /// Apply `action` on top of the recorded history, recording it when it succeeds.
    ///
    /// Returns the updated item. The cost is charged against `budget`.
    pub fn craft(
        &mut self,
        crafter: &Crafter,
        action: CraftAction,
        budget: &mut u64,
    ) -> Result<(CraftedItem, CraftOutcome), CraftError> {
        let (mut item, mut rng) = self.replay(crafter);
        let outcome = crafter.apply(&mut item, &action, budget, &mut rng)?;
        self.operations.push(action);
        Ok((item, outcome))
    }

    fn replay(&self, crafter: &Crafter) -> (CraftedItem, ChaCha8Rng) {
        let mut rng = Crafter::make_rng(self.seed);
        let mut item = CraftedItem::new(self.name.clone(), self.item_level, self.max_mods);

        // Recorded actions were already paid for
        let mut unlimited = u64::MAX;
        for op in &self.operations {
            if let Err(e) = crafter.apply(&mut item, op, &mut unlimited, &mut rng) {
                tracing::warn!("replayed {} failed, item stays as-is: {}", op.name(), e);
            }
        }

        (item, rng)
    }

    /// Export to JSON string
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Import from JSON string
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}
