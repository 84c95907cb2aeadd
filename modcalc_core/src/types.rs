use serde::{Deserialize, Serialize};

/// Damage pools that conversion redistributes between
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DamageType {
    Physical,
    Elemental,
    Chaos,
}

impl DamageType {
    pub const ALL: [DamageType; 3] = [DamageType::Physical, DamageType::Elemental, DamageType::Chaos];
}

/// How a stat mod combines with other mods targeting the same stat
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueType {
    /// Summed with every other additive contribution
    #[default]
    #[serde(alias = "base", alias = "flat")]
    Additive,
    /// Percentage "more" multiplier: each one multiplies by `1 + value / 100`
    #[serde(alias = "more")]
    Multiplicative,
    /// Replaces the computed value outright. The last applied override wins.
    Override,
}

/// Where an active mod came from.
///
/// Variants are declared in application order, so a later source wins any
/// override conflict with an earlier one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModSource {
    Skill,
    PlayerDefault,
    Tree,
    Item,
}

/// Every stat slot tracked by the mod cache
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Stat {
    // Attributes
    Strength,
    Dexterity,
    Intelligence,
    // Attack
    AttackSpeed,
    AttackCost,
    HitChance,
    CritChance,
    CritMultiplier,
    // Flat damage bounds
    MinPhysicalDamage,
    MaxPhysicalDamage,
    MinElementalDamage,
    MaxElementalDamage,
    MinChaosDamage,
    MaxChaosDamage,
    // Increased damage (percent)
    PhysicalDamage,
    ElementalDamage,
    ChaosDamage,
    Damage,
    // Bleed
    BleedChance,
    BleedCount,
    BleedDuration,
    BleedDamage,
    // Mana
    MaxMana,
    ManaRegen,
}

impl Stat {
    pub const ALL: [Stat; 24] = [
        Stat::Strength,
        Stat::Dexterity,
        Stat::Intelligence,
        Stat::AttackSpeed,
        Stat::AttackCost,
        Stat::HitChance,
        Stat::CritChance,
        Stat::CritMultiplier,
        Stat::MinPhysicalDamage,
        Stat::MaxPhysicalDamage,
        Stat::MinElementalDamage,
        Stat::MaxElementalDamage,
        Stat::MinChaosDamage,
        Stat::MaxChaosDamage,
        Stat::PhysicalDamage,
        Stat::ElementalDamage,
        Stat::ChaosDamage,
        Stat::Damage,
        Stat::BleedChance,
        Stat::BleedCount,
        Stat::BleedDuration,
        Stat::BleedDamage,
        Stat::MaxMana,
        Stat::ManaRegen,
    ];

    /// Name used by module content
    pub fn name(&self) -> &'static str {
        match self {
            Stat::Strength => "strength",
            Stat::Dexterity => "dexterity",
            Stat::Intelligence => "intelligence",
            Stat::AttackSpeed => "attackSpeed",
            Stat::AttackCost => "attackCost",
            Stat::HitChance => "hitChance",
            Stat::CritChance => "critChance",
            Stat::CritMultiplier => "critMultiplier",
            Stat::MinPhysicalDamage => "minPhysicalDamage",
            Stat::MaxPhysicalDamage => "maxPhysicalDamage",
            Stat::MinElementalDamage => "minElementalDamage",
            Stat::MaxElementalDamage => "maxElementalDamage",
            Stat::MinChaosDamage => "minChaosDamage",
            Stat::MaxChaosDamage => "maxChaosDamage",
            Stat::PhysicalDamage => "physicalDamage",
            Stat::ElementalDamage => "elementalDamage",
            Stat::ChaosDamage => "chaosDamage",
            Stat::Damage => "damage",
            Stat::BleedChance => "bleedChance",
            Stat::BleedCount => "bleedCount",
            Stat::BleedDuration => "bleedDuration",
            Stat::BleedDamage => "bleedDamage",
            Stat::MaxMana => "maxMana",
            Stat::ManaRegen => "manaRegen",
        }
    }

    /// Whether the stat reads as a percentage when displayed
    pub fn is_percent(&self) -> bool {
        matches!(
            self,
            Stat::HitChance
                | Stat::CritChance
                | Stat::CritMultiplier
                | Stat::PhysicalDamage
                | Stat::ElementalDamage
                | Stat::ChaosDamage
                | Stat::Damage
                | Stat::BleedChance
                | Stat::BleedDamage
        )
    }
}

/// Inclusive min/max damage bounds for one damage type
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct DamageRange {
    pub min: f64,
    pub max: f64,
}

impl DamageRange {
    pub fn new(min: f64, max: f64) -> Self {
        DamageRange { min, max }
    }

    pub fn average(&self) -> f64 {
        (self.min + self.max) / 2.0
    }

    pub fn scaled(&self, factor: f64) -> Self {
        DamageRange {
            min: self.min * factor,
            max: self.max * factor,
        }
    }
}

/// Damage bounds for every damage type
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BaseDamage {
    pub physical: DamageRange,
    pub elemental: DamageRange,
    pub chaos: DamageRange,
}

impl BaseDamage {
    pub fn get(&self, damage_type: DamageType) -> DamageRange {
        match damage_type {
            DamageType::Physical => self.physical,
            DamageType::Elemental => self.elemental,
            DamageType::Chaos => self.chaos,
        }
    }

    pub fn get_mut(&mut self, damage_type: DamageType) -> &mut DamageRange {
        match damage_type {
            DamageType::Physical => &mut self.physical,
            DamageType::Elemental => &mut self.elemental,
            DamageType::Chaos => &mut self.chaos,
        }
    }

    /// Sum of the average hit across all types
    pub fn average_total(&self) -> f64 {
        DamageType::ALL.iter().map(|&dt| self.get(dt).average()).sum()
    }

    pub fn min_total(&self) -> f64 {
        DamageType::ALL.iter().map(|&dt| self.get(dt).min).sum()
    }

    pub fn max_total(&self) -> f64 {
        DamageType::ALL.iter().map(|&dt| self.get(dt).max).sum()
    }
}

/// Per-damage-type percentages, used for enemy resistances
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Resistances {
    #[serde(default)]
    pub physical: f64,
    #[serde(default)]
    pub elemental: f64,
    #[serde(default)]
    pub chaos: f64,
}

impl Resistances {
    pub fn get(&self, damage_type: DamageType) -> f64 {
        match damage_type {
            DamageType::Physical => self.physical,
            DamageType::Elemental => self.elemental,
            DamageType::Chaos => self.chaos,
        }
    }
}
