//! Folds active mods into a [`ModCache`].

use crate::error::{Diagnostic, Report};
use crate::modifier::Mod;
use crate::resolver::MinMaxResolver;
use crate::types::{ModSource, Stat, ValueType};
use serde::{Deserialize, Serialize};

/// A mod borrowed from whichever source granted it, plus how strongly it applies
#[derive(Debug, Clone, Copy)]
pub struct ActiveMod<'a> {
    pub source: ModSource,
    /// Multiplies additive and multiplicative values. Tree nodes use their point count.
    pub scale: f64,
    pub modifier: &'a Mod,
}

impl<'a> ActiveMod<'a> {
    pub fn new(source: ModSource, modifier: &'a Mod) -> Self {
        ActiveMod {
            source,
            scale: 1.0,
            modifier,
        }
    }

    pub fn scaled(source: ModSource, scale: f64, modifier: &'a Mod) -> Self {
        ActiveMod {
            source,
            scale,
            modifier,
        }
    }
}

/// Flat snapshot of every tracked stat after one aggregation pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModCache {
    pub strength: f64,
    pub dexterity: f64,
    pub intelligence: f64,
    pub attack_speed: f64,
    pub attack_cost: f64,
    pub hit_chance: f64,
    pub crit_chance: f64,
    pub crit_multiplier: f64,
    pub min_physical_damage: f64,
    pub max_physical_damage: f64,
    pub min_elemental_damage: f64,
    pub max_elemental_damage: f64,
    pub min_chaos_damage: f64,
    pub max_chaos_damage: f64,
    pub physical_damage: f64,
    pub elemental_damage: f64,
    pub chaos_damage: f64,
    pub damage: f64,
    pub bleed_chance: f64,
    pub bleed_count: f64,
    pub bleed_duration: f64,
    pub bleed_damage: f64,
    pub max_mana: f64,
    pub mana_regen: f64,
}

impl ModCache {
    pub fn get(&self, stat: Stat) -> f64 {
        match stat {
            Stat::Strength => self.strength,
            Stat::Dexterity => self.dexterity,
            Stat::Intelligence => self.intelligence,
            Stat::AttackSpeed => self.attack_speed,
            Stat::AttackCost => self.attack_cost,
            Stat::HitChance => self.hit_chance,
            Stat::CritChance => self.crit_chance,
            Stat::CritMultiplier => self.crit_multiplier,
            Stat::MinPhysicalDamage => self.min_physical_damage,
            Stat::MaxPhysicalDamage => self.max_physical_damage,
            Stat::MinElementalDamage => self.min_elemental_damage,
            Stat::MaxElementalDamage => self.max_elemental_damage,
            Stat::MinChaosDamage => self.min_chaos_damage,
            Stat::MaxChaosDamage => self.max_chaos_damage,
            Stat::PhysicalDamage => self.physical_damage,
            Stat::ElementalDamage => self.elemental_damage,
            Stat::ChaosDamage => self.chaos_damage,
            Stat::Damage => self.damage,
            Stat::BleedChance => self.bleed_chance,
            Stat::BleedCount => self.bleed_count,
            Stat::BleedDuration => self.bleed_duration,
            Stat::BleedDamage => self.bleed_damage,
            Stat::MaxMana => self.max_mana,
            Stat::ManaRegen => self.mana_regen,
        }
    }

    fn slot_mut(&mut self, stat: Stat) -> &mut f64 {
        match stat {
            Stat::Strength => &mut self.strength,
            Stat::Dexterity => &mut self.dexterity,
            Stat::Intelligence => &mut self.intelligence,
            Stat::AttackSpeed => &mut self.attack_speed,
            Stat::AttackCost => &mut self.attack_cost,
            Stat::HitChance => &mut self.hit_chance,
            Stat::CritChance => &mut self.crit_chance,
            Stat::CritMultiplier => &mut self.crit_multiplier,
            Stat::MinPhysicalDamage => &mut self.min_physical_damage,
            Stat::MaxPhysicalDamage => &mut self.max_physical_damage,
            Stat::MinElementalDamage => &mut self.min_elemental_damage,
            Stat::MaxElementalDamage => &mut self.max_elemental_damage,
            Stat::MinChaosDamage => &mut self.min_chaos_damage,
            Stat::MaxChaosDamage => &mut self.max_chaos_damage,
            Stat::PhysicalDamage => &mut self.physical_damage,
            Stat::ElementalDamage => &mut self.elemental_damage,
            Stat::ChaosDamage => &mut self.chaos_damage,
            Stat::Damage => &mut self.damage,
            Stat::BleedChance => &mut self.bleed_chance,
            Stat::BleedCount => &mut self.bleed_count,
            Stat::BleedDuration => &mut self.bleed_duration,
            Stat::BleedDamage => &mut self.bleed_damage,
            Stat::MaxMana => &mut self.max_mana,
            Stat::ManaRegen => &mut self.mana_regen,
        }
    }
}

/// Running totals for one stat slot
#[derive(Debug, Clone, Copy)]
struct SlotTotals {
    sum: f64,
    product: f64,
    replaced: Option<f64>,
}

impl Default for SlotTotals {
    fn default() -> Self {
        SlotTotals {
            sum: 0.0,
            product: 1.0,
            replaced: None,
        }
    }
}

impl SlotTotals {
    fn apply(&mut self, value_type: ValueType, value: f64, scale: f64) {
        match value_type {
            ValueType::Additive => self.sum += value * scale,
            ValueType::Multiplicative => self.product *= 1.0 + value * scale / 100.0,
            ValueType::Override => self.replaced = Some(value),
        }
    }

    fn total(&self) -> f64 {
        self.replaced.unwrap_or(self.sum * self.product)
    }
}

/// Collects stat contributions before they are flattened into a [`ModCache`]
#[derive(Debug, Clone)]
pub struct StatAccumulator {
    slots: [SlotTotals; Stat::ALL.len()],
}

impl Default for StatAccumulator {
    fn default() -> Self {
        StatAccumulator {
            slots: [SlotTotals::default(); Stat::ALL.len()],
        }
    }
}

impl StatAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply(&mut self, stat: Stat, value_type: ValueType, value: f64, scale: f64) {
        self.slots[stat as usize].apply(value_type, value, scale);
    }

    pub fn finish(&self) -> ModCache {
        let mut cache = ModCache::default();
        for stat in Stat::ALL {
            *cache.slot_mut(stat) = self.slots[stat as usize].total();
        }
        cache
    }
}

/// Fold `mods` into a fresh cache.
///
/// Mods are applied in source priority order (see [`ModSource`]); within one
/// source the given order is kept. Stat mods whose flags or conditions are not all
/// active are skipped. Malformed stat mods are skipped and reported.
pub fn aggregate(
    mods: &[ActiveMod<'_>],
    active_flags: u32,
    active_conditions: u32,
    resolver: &mut dyn MinMaxResolver,
) -> Report<ModCache> {
    let mut ordered: Vec<&ActiveMod<'_>> = mods.iter().collect();
    ordered.sort_by_key(|m| m.source);

    let mut acc = StatAccumulator::new();
    let mut diagnostics = Vec::new();
    let mut applied = 0usize;

    for active in ordered {
        if active.scale == 0.0 {
            continue;
        }
        for stat_mod in &active.modifier.stats {
            // malformed content is reported whether or not its gate is active
            if let Err(reason) = stat_mod.validate() {
                let diagnostic = Diagnostic::MalformedMod {
                    mod_id: active.modifier.id.clone(),
                    stat: stat_mod.stat,
                    reason,
                };
                tracing::warn!("{}", diagnostic);
                diagnostics.push(diagnostic);
                continue;
            }
            if !stat_mod.applies(active_flags, active_conditions) {
                continue;
            }
            if let Ok(value) = stat_mod.scalar(resolver) {
                acc.apply(stat_mod.stat, stat_mod.value_type, value, active.scale);
                applied += 1;
            }
        }
    }

    tracing::debug!(
        mods = mods.len(),
        applied,
        skipped = diagnostics.len(),
        "aggregation pass complete"
    );

    Report::new(acc.finish(), diagnostics)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modifier::StatMod;
    use crate::resolver::{Midpoint, Minimum};

    fn additive(stat: Stat, value: f64) -> StatMod {
        StatMod::flat(stat, ValueType::Additive, value)
    }

    fn run(mods: &[ActiveMod<'_>]) -> Report<ModCache> {
        aggregate(mods, u32::MAX, u32::MAX, &mut Midpoint)
    }

    #[test]
    fn test_additive_mods_sum() {
        let a = Mod::new("a", vec![additive(Stat::Strength, 5.0)]);
        let b = Mod::new("b", vec![additive(Stat::Strength, 3.0)]);
        let report = aggregate(
            &[ActiveMod::new(ModSource::Item, &a), ActiveMod::new(ModSource::Item, &b)],
            0,
            0,
            &mut Midpoint,
        );
        assert_eq!(report.value.strength, 8.0);
        assert!(report.is_clean());
    }

    #[test]
    fn test_additive_aggregation_is_commutative() {
        let mods = [
            Mod::new("a", vec![additive(Stat::Strength, 5.0), additive(Stat::MaxMana, 20.0)]),
            Mod::new("b", vec![additive(Stat::Strength, 3.0)]),
            Mod::new("c", vec![additive(Stat::MaxMana, 7.0), additive(Stat::Dexterity, 1.0)]),
            Mod::new("d", vec![additive(Stat::AttackSpeed, 1.25)]),
        ];
        let forward: Vec<_> = mods.iter().map(|m| ActiveMod::new(ModSource::Item, m)).collect();
        let expected = run(&forward).value;

        // every rotation and the reverse
        for shift in 0..forward.len() {
            let mut rotated = forward.clone();
            rotated.rotate_left(shift);
            assert_eq!(run(&rotated).value, expected);
            rotated.reverse();
            assert_eq!(run(&rotated).value, expected);
        }
    }

    #[test]
    fn test_override_later_source_wins() {
        let skill = Mod::new("skill", vec![StatMod::flat(Stat::HitChance, ValueType::Override, 50.0)]);
        let item = Mod::new("item", vec![StatMod::flat(Stat::HitChance, ValueType::Override, 80.0)]);

        // input order does not matter, source priority does
        let a = run(&[ActiveMod::new(ModSource::Item, &item), ActiveMod::new(ModSource::Skill, &skill)]);
        let b = run(&[ActiveMod::new(ModSource::Skill, &skill), ActiveMod::new(ModSource::Item, &item)]);
        assert_eq!(a.value.hit_chance, 80.0);
        assert_eq!(b.value.hit_chance, 80.0);
    }

    #[test]
    fn test_override_same_source_is_order_dependent() {
        let first = Mod::new("first", vec![StatMod::flat(Stat::HitChance, ValueType::Override, 50.0)]);
        let second = Mod::new("second", vec![StatMod::flat(Stat::HitChance, ValueType::Override, 80.0)]);

        let a = run(&[ActiveMod::new(ModSource::Item, &first), ActiveMod::new(ModSource::Item, &second)]);
        let b = run(&[ActiveMod::new(ModSource::Item, &second), ActiveMod::new(ModSource::Item, &first)]);
        assert_eq!(a.value.hit_chance, 80.0);
        assert_eq!(b.value.hit_chance, 50.0);
    }

    #[test]
    fn test_override_beats_additive_and_multiplicative() {
        let m = Mod::new(
            "m",
            vec![
                additive(Stat::MaxMana, 100.0),
                StatMod::flat(Stat::MaxMana, ValueType::Multiplicative, 50.0),
                StatMod::flat(Stat::MaxMana, ValueType::Override, 10.0),
            ],
        );
        assert_eq!(run(&[ActiveMod::new(ModSource::Item, &m)]).value.max_mana, 10.0);
    }

    #[test]
    fn test_multiplicative_composes_by_product() {
        let m = Mod::new(
            "m",
            vec![
                additive(Stat::MaxMana, 100.0),
                StatMod::flat(Stat::MaxMana, ValueType::Multiplicative, 20.0),
                StatMod::flat(Stat::MaxMana, ValueType::Multiplicative, 50.0),
            ],
        );
        let cache = run(&[ActiveMod::new(ModSource::Item, &m)]).value;
        assert!((cache.max_mana - 180.0).abs() < 1e-9);
    }

    #[test]
    fn test_flag_and_condition_gating() {
        let m = Mod::new(
            "m",
            vec![
                additive(Stat::Strength, 1.0),
                additive(Stat::Strength, 10.0).with_flags(0b01),
                additive(Stat::Strength, 100.0).with_flags(0b11),
                additive(Stat::Strength, 1000.0).with_conditions(0b1),
            ],
        );
        let mods = [ActiveMod::new(ModSource::Item, &m)];
        assert_eq!(aggregate(&mods, 0, 0, &mut Midpoint).value.strength, 1.0);
        assert_eq!(aggregate(&mods, 0b01, 0, &mut Midpoint).value.strength, 11.0);
        assert_eq!(aggregate(&mods, 0b11, 0, &mut Midpoint).value.strength, 111.0);
        assert_eq!(aggregate(&mods, 0b11, 0b1, &mut Midpoint).value.strength, 1111.0);
    }

    #[test]
    fn test_range_uses_resolver() {
        let m = Mod::new("m", vec![StatMod::range(Stat::Dexterity, ValueType::Additive, 4.0, 10.0)]);
        let mods = [ActiveMod::new(ModSource::Item, &m)];
        assert_eq!(aggregate(&mods, 0, 0, &mut Midpoint).value.dexterity, 7.0);
        assert_eq!(aggregate(&mods, 0, 0, &mut Minimum).value.dexterity, 4.0);
    }

    #[test]
    fn test_scale_multiplies_values() {
        let node = Mod::new(
            "node",
            vec![
                additive(Stat::Strength, 2.0),
                StatMod::flat(Stat::Damage, ValueType::Override, 9.0),
            ],
        );
        let cache = run(&[ActiveMod::scaled(ModSource::Tree, 3.0, &node)]).value;
        assert_eq!(cache.strength, 6.0);
        assert_eq!(cache.damage, 9.0);

        let cache = run(&[ActiveMod::scaled(ModSource::Tree, 0.0, &node)]).value;
        assert_eq!(cache.strength, 0.0);
        assert_eq!(cache.damage, 0.0);
    }

    #[test]
    fn test_malformed_mod_is_reported_not_fatal() {
        let mut broken = additive(Stat::Strength, 0.0);
        broken.value = None;
        let m = Mod::new("m", vec![broken, additive(Stat::Dexterity, 4.0)]);
        let good = Mod::new("good", vec![additive(Stat::Strength, 2.0)]);

        let report = run(&[ActiveMod::new(ModSource::Item, &m), ActiveMod::new(ModSource::Item, &good)]);
        assert_eq!(report.value.strength, 2.0);
        assert_eq!(report.value.dexterity, 4.0);
        assert_eq!(report.diagnostics.len(), 1);
        assert!(matches!(
            &report.diagnostics[0],
            Diagnostic::MalformedMod { mod_id, stat: Stat::Strength, .. } if mod_id == "m"
        ));
    }

    #[test]
    fn test_malformed_mod_reported_when_gated_off() {
        let mut broken = additive(Stat::Strength, 0.0).with_flags(1);
        broken.value = None;
        broken.min = Some(3.0);
        let m = Mod::new("m", vec![broken]);

        let active = aggregate(&[ActiveMod::new(ModSource::Item, &m)], 1, 0, &mut Midpoint);
        let inactive = aggregate(&[ActiveMod::new(ModSource::Item, &m)], 0, 0, &mut Midpoint);
        assert_eq!(active.diagnostics, inactive.diagnostics);
        assert_eq!(inactive.diagnostics.len(), 1);
        assert_eq!(inactive.value.strength, 0.0);
    }

    #[test]
    fn test_cache_get_matches_fields() {
        let mut acc = StatAccumulator::new();
        for (i, stat) in Stat::ALL.iter().enumerate() {
            acc.apply(*stat, ValueType::Additive, i as f64, 1.0);
        }
        let cache = acc.finish();
        for (i, stat) in Stat::ALL.iter().enumerate() {
            assert_eq!(cache.get(*stat), i as f64);
        }
    }
}
