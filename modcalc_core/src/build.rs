//! A build session: one attack skill, its supports, equipped items and a tree.

use crate::aggregator::{aggregate, ActiveMod};
use crate::calculator::{compute, Enemy, HitSimulation, StatsOutput};
use crate::config::GameConfig;
use crate::crafting::{Crafter, CraftingBasic, ItemModifierTable};
use crate::error::{CalcError, Report};
use crate::item::CraftedItem;
use crate::modifier::Mod;
use crate::registry::StatRegistry;
use crate::resolver::ResolverKind;
use crate::skill::{AttackSkill, Skill, SupportSkill};
use crate::tree::{ModTree, TreeError};
use crate::types::ModSource;
use serde::{Deserialize, Serialize};

/// A module with every name resolved. Read-only once built.
#[derive(Debug, Clone)]
pub struct CompiledModule {
    pub registry: StatRegistry,
    pub config: GameConfig,
    pub player_level: u32,
    pub tree_points: u32,
    pub player_mods: Vec<Mod>,
    pub skills: Vec<Skill>,
    pub enemies: Vec<Enemy>,
    pub item_table: ItemModifierTable,
    pub crafting: CraftingBasic,
    /// Tree with the allocations the module ships with
    pub mod_tree: ModTree,
}

impl CompiledModule {
    pub fn skill(&self, id: &str) -> Result<&Skill, CalcError> {
        self.skills
            .iter()
            .find(|s| s.id() == id)
            .ok_or_else(|| CalcError::UnknownSkill(id.to_string()))
    }

    pub fn attack(&self, id: &str) -> Result<&AttackSkill, CalcError> {
        match self.skill(id)? {
            Skill::Attack(attack) => Ok(attack),
            Skill::Support(_) => Err(CalcError::NotAnAttack(id.to_string())),
        }
    }

    pub fn support(&self, id: &str) -> Result<&SupportSkill, CalcError> {
        match self.skill(id)? {
            Skill::Support(support) => Ok(support),
            Skill::Attack(_) => Err(CalcError::NotASupport(id.to_string())),
        }
    }

    pub fn enemy(&self, id: &str) -> Result<&Enemy, CalcError> {
        self.enemies
            .iter()
            .find(|e| e.id == id)
            .ok_or_else(|| CalcError::UnknownEnemy(id.to_string()))
    }

    pub fn crafter(&self) -> Crafter<'_> {
        Crafter::new(&self.item_table, &self.crafting)
    }
}

/// Per-evaluation choices that are not part of the build itself
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BuildConfig {
    /// Flags active on top of the attack skill's own
    #[serde(default)]
    pub flags: Vec<String>,
    #[serde(default)]
    pub conditions: Vec<String>,
    #[serde(default)]
    pub resolver: ResolverKind,
    /// Enemy id to evaluate against
    #[serde(default)]
    pub enemy: Option<String>,
    #[serde(default)]
    pub hit_simulation: Option<HitSimulation>,
}

#[derive(Debug, Clone)]
pub struct Build<'m> {
    module: &'m CompiledModule,
    attack: &'m AttackSkill,
    supports: Vec<&'m SupportSkill>,
    items: Vec<CraftedItem>,
    tree: ModTree,
}

impl<'m> Build<'m> {
    pub fn new(module: &'m CompiledModule, attack_id: &str) -> Result<Self, CalcError> {
        Ok(Build {
            module,
            attack: module.attack(attack_id)?,
            supports: Vec::new(),
            items: Vec::new(),
            tree: module.mod_tree.clone(),
        })
    }

    pub fn attack(&self) -> &AttackSkill {
        self.attack
    }

    pub fn add_support(&mut self, id: &str) -> Result<(), CalcError> {
        let support = self.module.support(id)?;
        self.supports.push(support);
        Ok(())
    }

    pub fn equip(&mut self, item: CraftedItem) {
        self.items.push(item);
    }

    pub fn items(&self) -> &[CraftedItem] {
        &self.items
    }

    pub fn tree(&self) -> &ModTree {
        &self.tree
    }

    /// Spend one tree point on `node`, within the player's level and point total
    pub fn allocate(&mut self, node: &str) -> Result<u32, TreeError> {
        self.tree
            .allocate(node, self.module.player_level, self.module.tree_points)
    }

    pub fn deallocate(&mut self, node: &str) -> Result<u32, TreeError> {
        self.tree.deallocate(node)
    }

    /// Every mod the build carries, tagged with where it came from
    pub fn active_mods(&self) -> Vec<ActiveMod<'_>> {
        let skill_mods = self
            .attack
            .mods
            .iter()
            .chain(self.supports.iter().flat_map(|s| s.mods.iter()))
            .map(|m| ActiveMod::new(ModSource::Skill, m));
        let player_mods = self
            .module
            .player_mods
            .iter()
            .map(|m| ActiveMod::new(ModSource::PlayerDefault, m));
        let tree_mods = self
            .tree
            .active_mods()
            .map(|(points, m)| ActiveMod::scaled(ModSource::Tree, points, m));
        let item_mods = self
            .items
            .iter()
            .flat_map(|item| item.active_mods())
            .map(|m| ActiveMod::new(ModSource::Item, m));

        skill_mods
            .chain(player_mods)
            .chain(tree_mods)
            .chain(item_mods)
            .collect()
    }

    /// Aggregate and calculate. Diagnostics of both stages are returned together.
    pub fn compute(&self, config: &BuildConfig) -> Result<Report<StatsOutput>, CalcError> {
        let registry = &self.module.registry;
        let flags = self.attack.flags | registry.resolve_flags(&config.flags)?;
        let conditions = registry.resolve_conditions(&config.conditions)?;

        let mut calc = self.module.config.calc_config();
        calc.enemy = config
            .enemy
            .as_deref()
            .map(|id| self.module.enemy(id).cloned())
            .transpose()?;
        calc.hit_simulation = config.hit_simulation;

        let mods = self.active_mods();
        let mut resolver = config.resolver.resolver();
        let (cache, mut diagnostics) =
            aggregate(&mods, flags, conditions, resolver.as_mut()).into_parts();
        let (stats, calc_diagnostics) = compute(&cache, &self.attack.conversion, &calc).into_parts();
        diagnostics.extend(calc_diagnostics);

        tracing::debug!(
            skill = %self.attack.id,
            flags = ?registry.flag_names(flags),
            conditions = ?registry.condition_names(conditions),
            mods = mods.len(),
            diagnostics = diagnostics.len(),
            "build computed"
        );
        Ok(Report::new(stats, diagnostics))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ModuleData;
    use crate::crafting::{CraftAction, TierStrategy};
    use crate::error::Diagnostic;

    const MODULE: &str = r#"{
        "player": {
            "level": 10,
            "tree_points": 2,
            "mods": [{"id": "base", "stats": [
                {"name": "attackSpeed", "value": 0.5},
                {"name": "hitChance", "value": 100},
                {"name": "critMultiplier", "value": 150}
            ]}]
        },
        "skills": [
            {"kind": "attack", "id": "strike", "name": "Strike", "flags": ["attack", "melee"],
             "mods": [{"id": "strike", "stats": [
                {"name": "minPhysicalDamage", "value": 10},
                {"name": "maxPhysicalDamage", "value": 20},
                {"name": "attackSpeed", "value": 1}
             ]}]},
            {"kind": "attack", "id": "burn", "name": "Burn", "flags": ["attack"],
             "conversion": {"physical": {"elemental": 0.8, "chaos": 0.8}},
             "mods": [{"id": "burn", "stats": [
                {"name": "minPhysicalDamage", "value": 10},
                {"name": "maxPhysicalDamage", "value": 10},
                {"name": "attackSpeed", "value": 1}
             ]}]},
            {"kind": "support", "id": "brutal", "name": "Brutal",
             "mods": [{"id": "brutal", "stats": [
                {"name": "physicalDamage", "value": 50, "flags": ["melee"]}
             ]}]},
            {"kind": "support", "id": "volley", "name": "Volley",
             "mods": [{"id": "volley", "stats": [
                {"name": "damage", "value": 100, "flags": ["ranged"]}
             ]}]}
        ],
        "enemies": [
            {"id": "dummy", "name": "Dummy", "life": 462, "evasion": 0,
             "resistances": {"physical": 0, "elemental": 0, "chaos": 0}}
        ],
        "items": {
            "modifiers": [
                {"id": "heavy", "table_index": 0, "tier": 1,
                 "stats": [{"name": "maxPhysicalDamage", "value": 10}]}
            ],
            "crafting": {"actions": {"add_mod": {"tier_targets": {"max_tier": {"cost": 0}}}}}
        },
        "mod_tree": {"nodes": [
            {"name": "might", "max_points": 5,
             "mods": [{"id": "might", "stats": [{"name": "strength", "value": 10}]}]}
        ]}
    }"#;

    fn module() -> CompiledModule {
        ModuleData::from_json(MODULE).unwrap().compile().unwrap()
    }

    fn equipped(module: &CompiledModule) -> CraftedItem {
        let crafter = module.crafter();
        let mut rng = Crafter::make_rng(1);
        let mut item = CraftedItem::new("Maul", 10, 1);
        let mut budget = 0;
        crafter
            .apply(
                &mut item,
                &CraftAction::AddMod {
                    strategy: TierStrategy::MaxTier,
                },
                &mut budget,
                &mut rng,
            )
            .unwrap();
        item
    }

    #[test]
    fn test_full_build_dps() {
        let module = module();
        let mut build = Build::new(&module, "strike").unwrap();
        build.add_support("brutal").unwrap();
        build.add_support("volley").unwrap();
        build.equip(equipped(&module));
        build.allocate("might").unwrap();
        build.allocate("might").unwrap();

        let report = build.compute(&BuildConfig::default()).unwrap();
        assert!(report.is_clean());
        let stats = report.value;

        // 10-30 physical, 50% from brutal, 20 strength at 0.2% each
        assert_eq!(stats.strength, 20.0);
        assert!((stats.average_hit - 20.0 * 1.54).abs() < 1e-9);
        assert!((stats.attack_speed - 1.5).abs() < 1e-9);
        assert!((stats.dps - 30.8 * 1.5).abs() < 1e-9);
        assert!(stats.time_to_kill.is_none());
    }

    #[test]
    fn test_extra_flags_unlock_gated_mods() {
        let module = module();
        let mut build = Build::new(&module, "strike").unwrap();
        build.add_support("volley").unwrap();

        let base = build.compute(&BuildConfig::default()).unwrap().value;
        let ranged = build
            .compute(&BuildConfig {
                flags: vec!["ranged".to_string()],
                ..BuildConfig::default()
            })
            .unwrap()
            .value;
        assert!((ranged.average_hit - base.average_hit * 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_enemy_sets_time_to_kill() {
        let module = module();
        let mut build = Build::new(&module, "strike").unwrap();
        build.add_support("brutal").unwrap();
        build.equip(equipped(&module));
        build.allocate("might").unwrap();
        build.allocate("might").unwrap();

        let stats = build
            .compute(&BuildConfig {
                enemy: Some("dummy".to_string()),
                ..BuildConfig::default()
            })
            .unwrap()
            .value;
        let ttk = stats.time_to_kill.unwrap();
        assert!((ttk - 462.0 / 46.2).abs() < 1e-9);
    }

    #[test]
    fn test_tree_points_are_limited() {
        let module = module();
        let mut build = Build::new(&module, "strike").unwrap();
        build.allocate("might").unwrap();
        build.allocate("might").unwrap();
        assert_eq!(build.allocate("might"), Err(TreeError::NoPointsAvailable));
        assert_eq!(build.deallocate("might"), Ok(1));
        assert_eq!(module.mod_tree.spent_points(), 0);
    }

    #[test]
    fn test_conversion_diagnostics_are_returned() {
        let module = module();
        let build = Build::new(&module, "burn").unwrap();
        let report = build.compute(&BuildConfig::default()).unwrap();
        assert!(matches!(
            report.diagnostics.as_slice(),
            [Diagnostic::ConversionOverflow { .. }]
        ));
        assert!((report.value.damage.elemental.min - 5.0).abs() < 1e-9);
        assert!((report.value.damage.chaos.min - 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_lookup_errors() {
        let module = module();
        assert_eq!(
            Build::new(&module, "brutal").unwrap_err(),
            CalcError::NotAnAttack("brutal".to_string())
        );
        assert_eq!(
            Build::new(&module, "nope").unwrap_err(),
            CalcError::UnknownSkill("nope".to_string())
        );

        let mut build = Build::new(&module, "strike").unwrap();
        assert_eq!(
            build.add_support("burn"),
            Err(CalcError::NotASupport("burn".to_string()))
        );
        assert_eq!(
            build
                .compute(&BuildConfig {
                    enemy: Some("dragon".to_string()),
                    ..BuildConfig::default()
                })
                .unwrap_err(),
            CalcError::UnknownEnemy("dragon".to_string())
        );
        assert_eq!(
            build
                .compute(&BuildConfig {
                    conditions: vec!["sleepy".to_string()],
                    ..BuildConfig::default()
                })
                .unwrap_err(),
            CalcError::UnknownCondition("sleepy".to_string())
        );
    }
}
