//! Damage and derived stat calculation over a finished [`ModCache`].

use crate::aggregator::ModCache;
use crate::conversion::{convert, ConversionTable};
use crate::error::Report;
use crate::types::{BaseDamage, DamageRange, DamageType, Resistances};
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

/// Percent bonuses granted per attribute point
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AttributeScaling {
    /// Increased damage % per point of strength
    #[serde(default = "default_scaling")]
    pub strength_damage: f64,
    /// Increased attack speed % per point of dexterity
    #[serde(default = "default_scaling")]
    pub dexterity_attack_speed: f64,
    /// Increased maximum mana % per point of intelligence
    #[serde(default = "default_scaling")]
    pub intelligence_mana: f64,
}

fn default_scaling() -> f64 {
    0.2
}

impl Default for AttributeScaling {
    fn default() -> Self {
        AttributeScaling {
            strength_damage: default_scaling(),
            dexterity_attack_speed: default_scaling(),
            intelligence_mana: default_scaling(),
        }
    }
}

/// A target the build is evaluated against
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Enemy {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub level: u32,
    #[serde(default)]
    pub life: f64,
    /// Subtracted from the attacker's hit chance, in percent
    #[serde(default)]
    pub evasion: f64,
    #[serde(default)]
    pub resistances: Resistances,
}

/// Request for a seeded per-hit simulation instead of expected values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HitSimulation {
    pub hits: u32,
    pub seed: u64,
}

pub const DEFAULT_BLEED_FRACTION: f64 = 0.7;
pub const DEFAULT_CRIT_MULTIPLIER: f64 = 150.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalcConfig {
    /// Share of a hit's physical damage each bleed deals over its duration
    pub bleed_fraction: f64,
    /// Percent crit multiplier used when no mod sets `critMultiplier`
    pub base_crit_multiplier: f64,
    pub attribute_scaling: AttributeScaling,
    pub enemy: Option<Enemy>,
    pub hit_simulation: Option<HitSimulation>,
}

impl Default for CalcConfig {
    fn default() -> Self {
        CalcConfig {
            bleed_fraction: DEFAULT_BLEED_FRACTION,
            base_crit_multiplier: DEFAULT_CRIT_MULTIPLIER,
            attribute_scaling: AttributeScaling::default(),
            enemy: None,
            hit_simulation: None,
        }
    }
}

/// Everything derived for one build
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatsOutput {
    pub strength: f64,
    pub dexterity: f64,
    pub intelligence: f64,

    /// Attacks per second
    pub attack_speed: f64,
    /// Percent, after enemy evasion
    pub hit_chance: f64,
    /// Percent
    pub crit_chance: f64,
    /// Percent, 150 meaning crits deal 1.5x
    pub crit_multiplier: f64,

    /// Per-hit bounds after conversion, increases and resistances
    pub damage: BaseDamage,
    pub average_hit: f64,
    /// Expected damage multiplier from crits
    pub crit_factor: f64,
    /// Hit dps including hit chance and crits
    pub dps: f64,

    pub bleed_chance: f64,
    pub bleed_count: f64,
    pub bleed_duration: f64,
    /// Total damage of one bleed over its duration
    pub bleed_damage: f64,
    /// Expected simultaneous bleeds, capped at `bleed_count`
    pub active_bleeds: f64,
    pub bleed_dps: f64,

    pub total_dps: f64,

    pub max_mana: f64,
    pub mana_regen: f64,
    pub attack_cost: f64,
    pub mana_per_second: f64,
    pub mana_sustainable: bool,

    /// Seconds to kill the configured enemy
    pub time_to_kill: Option<f64>,
}

/// Derive [`StatsOutput`] from a cache.
///
/// Pure: the same cache, table and config always give an identical result, including
/// in simulation mode, whose rng is seeded from the config.
pub fn compute(cache: &ModCache, conversion: &ConversionTable, config: &CalcConfig) -> Report<StatsOutput> {
    let scaling = &config.attribute_scaling;
    let evasion = config.enemy.as_ref().map_or(0.0, |e| e.evasion);

    let base = BaseDamage {
        physical: bounds(cache.min_physical_damage, cache.max_physical_damage),
        elemental: bounds(cache.min_elemental_damage, cache.max_elemental_damage),
        chaos: bounds(cache.min_chaos_damage, cache.max_chaos_damage),
    };
    let (converted, diagnostics) = convert(&base, conversion).into_parts();

    let strength_bonus = cache.strength * scaling.strength_damage;
    let mut damage = BaseDamage::default();
    for dt in DamageType::ALL {
        let increased = match dt {
            DamageType::Physical => cache.physical_damage,
            DamageType::Elemental => cache.elemental_damage,
            DamageType::Chaos => cache.chaos_damage,
        } + cache.damage
            + strength_bonus;
        let mut factor = (1.0 + increased / 100.0).max(0.0);
        if let Some(enemy) = &config.enemy {
            factor *= (1.0 - enemy.resistances.get(dt) / 100.0).max(0.0);
        }
        *damage.get_mut(dt) = converted.get(dt).scaled(factor);
    }

    let attack_speed =
        (cache.attack_speed * (1.0 + cache.dexterity * scaling.dexterity_attack_speed / 100.0)).max(0.0);
    let hit_chance = percent(cache.hit_chance - evasion);
    let crit_chance = percent(cache.crit_chance);
    let crit_multiplier = if cache.crit_multiplier > 0.0 {
        cache.crit_multiplier
    } else {
        config.base_crit_multiplier
    };
    // a crit never hits softer than a normal hit
    let crit_multi = (crit_multiplier / 100.0).max(1.0);
    let crit_factor = 1.0 + crit_chance * (crit_multi - 1.0);
    let average_hit = damage.average_total();

    let dps = if attack_speed <= 0.0 || hit_chance <= 0.0 {
        0.0
    } else {
        match config.hit_simulation {
            Some(sim) if sim.hits > 0 => {
                simulate_per_attack(&damage, hit_chance, crit_chance, crit_multi, sim) * attack_speed
            }
            _ => average_hit * crit_factor * attack_speed * hit_chance,
        }
    };

    let bleed_chance = percent(cache.bleed_chance);
    let bleed_count = cache.bleed_count.max(0.0);
    let bleed_duration = cache.bleed_duration.max(0.0);
    let bleed_damage =
        damage.physical.average() * config.bleed_fraction * (1.0 + cache.bleed_damage / 100.0).max(0.0);
    let (active_bleeds, bleed_dps) = if bleed_duration > 0.0 {
        let active = (attack_speed * hit_chance * bleed_chance * bleed_duration).min(bleed_count);
        (active, bleed_damage / bleed_duration * active)
    } else {
        (0.0, 0.0)
    };

    let total_dps = dps + bleed_dps;
    let time_to_kill = config
        .enemy
        .as_ref()
        .filter(|_| total_dps > 0.0)
        .map(|enemy| enemy.life / total_dps);

    let max_mana = cache.max_mana * (1.0 + cache.intelligence * scaling.intelligence_mana / 100.0);
    let attack_cost = cache.attack_cost.max(0.0);
    let mana_per_second = attack_cost * attack_speed;

    let output = StatsOutput {
        strength: cache.strength,
        dexterity: cache.dexterity,
        intelligence: cache.intelligence,
        attack_speed,
        hit_chance: hit_chance * 100.0,
        crit_chance: crit_chance * 100.0,
        crit_multiplier: crit_multi * 100.0,
        damage,
        average_hit,
        crit_factor,
        dps,
        bleed_chance: bleed_chance * 100.0,
        bleed_count,
        bleed_duration,
        bleed_damage,
        active_bleeds,
        bleed_dps,
        total_dps,
        max_mana,
        mana_regen: cache.mana_regen,
        attack_cost,
        mana_per_second,
        mana_sustainable: mana_per_second <= cache.mana_regen,
        time_to_kill,
    };

    tracing::debug!(dps = output.dps, bleed_dps = output.bleed_dps, "computed stats");

    Report::new(output, diagnostics)
}

fn bounds(min: f64, max: f64) -> DamageRange {
    let min = min.max(0.0);
    DamageRange::new(min, max.max(min))
}

/// Clamp a percentage to `0..=100` and return it as a fraction
fn percent(value: f64) -> f64 {
    value.clamp(0.0, 100.0) / 100.0
}

/// Average damage per attempted attack over a seeded run of attacks
fn simulate_per_attack(
    damage: &BaseDamage,
    hit_chance: f64,
    crit_chance: f64,
    crit_multi: f64,
    sim: HitSimulation,
) -> f64 {
    let mut rng = ChaCha8Rng::seed_from_u64(sim.seed);
    let mut total = 0.0;

    for _ in 0..sim.hits {
        if !rng.gen_bool(hit_chance) {
            continue;
        }
        let mut hit = 0.0;
        for dt in DamageType::ALL {
            let range = damage.get(dt);
            hit += if range.max > range.min {
                rng.gen_range(range.min..=range.max)
            } else {
                range.min
            };
        }
        if rng.gen_bool(crit_chance) {
            hit *= crit_multi;
        }
        total += hit;
    }

    total / sim.hits as f64
}
