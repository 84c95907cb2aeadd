//! Redistribution of damage between damage types.

use crate::error::{Diagnostic, Report};
use crate::types::{BaseDamage, DamageRange, DamageType};
use serde::{Deserialize, Serialize};

fn default_multi() -> f64 {
    1.0
}

/// Outgoing fractions for one source damage type
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConversionValues {
    #[serde(default)]
    pub physical: Option<f64>,
    #[serde(default)]
    pub elemental: Option<f64>,
    #[serde(default)]
    pub chaos: Option<f64>,
    /// Scales the share that stays with the source type
    #[serde(default = "default_multi")]
    pub multi: f64,
}

impl Default for ConversionValues {
    fn default() -> Self {
        ConversionValues {
            physical: None,
            elemental: None,
            chaos: None,
            multi: 1.0,
        }
    }
}

impl ConversionValues {
    pub fn fraction(&self, target: DamageType) -> f64 {
        match target {
            DamageType::Physical => self.physical,
            DamageType::Elemental => self.elemental,
            DamageType::Chaos => self.chaos,
        }
        .unwrap_or(0.0)
    }

    pub fn with_fraction(mut self, target: DamageType, fraction: f64) -> Self {
        match target {
            DamageType::Physical => self.physical = Some(fraction),
            DamageType::Elemental => self.elemental = Some(fraction),
            DamageType::Chaos => self.chaos = Some(fraction),
        }
        self
    }

    pub fn with_multi(mut self, multi: f64) -> Self {
        self.multi = multi;
        self
    }
}

/// Conversion rules keyed by source damage type. Missing sources keep all damage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ConversionTable {
    #[serde(default)]
    pub physical: Option<ConversionValues>,
    #[serde(default)]
    pub elemental: Option<ConversionValues>,
    #[serde(default)]
    pub chaos: Option<ConversionValues>,
}

impl ConversionTable {
    pub fn get(&self, source: DamageType) -> Option<&ConversionValues> {
        match source {
            DamageType::Physical => self.physical.as_ref(),
            DamageType::Elemental => self.elemental.as_ref(),
            DamageType::Chaos => self.chaos.as_ref(),
        }
    }

    pub fn with(mut self, source: DamageType, values: ConversionValues) -> Self {
        match source {
            DamageType::Physical => self.physical = Some(values),
            DamageType::Elemental => self.elemental = Some(values),
            DamageType::Chaos => self.chaos = Some(values),
        }
        self
    }

    /// Largest `multi` in the table, counting the implicit 1.0 of missing sources
    pub fn max_multi(&self) -> f64 {
        DamageType::ALL
            .iter()
            .map(|&dt| self.get(dt).map_or(1.0, |v| v.multi))
            .fold(1.0, f64::max)
    }
}

/// Apply `table` to `base` in a single pass.
///
/// Every source distributes `value * fraction` to each other named type and keeps
/// `value * (1 - sum of fractions) * multi`. Converted damage is not converted again.
/// A source whose fractions sum above 1 is rescaled to sum to exactly 1 and reported.
pub fn convert(base: &BaseDamage, table: &ConversionTable) -> Report<BaseDamage> {
    let mut out = BaseDamage::default();
    let mut diagnostics = Vec::new();

    for source in DamageType::ALL {
        let value = base.get(source);
        let Some(rules) = table.get(source) else {
            add_to(&mut out, source, value, 1.0);
            continue;
        };

        let targets: Vec<(DamageType, f64)> = DamageType::ALL
            .iter()
            .filter(|&&target| target != source)
            .map(|&target| (target, rules.fraction(target).max(0.0)))
            .collect();

        let total: f64 = targets.iter().map(|(_, f)| f).sum();
        let clamp = if total > 1.0 {
            let diagnostic = Diagnostic::ConversionOverflow {
                from: source,
                total,
            };
            tracing::warn!("{}", diagnostic);
            diagnostics.push(diagnostic);
            1.0 / total
        } else {
            1.0
        };

        let mut converted = 0.0;
        for (target, fraction) in targets {
            let fraction = fraction * clamp;
            converted += fraction;
            add_to(&mut out, target, value, fraction);
        }

        let retained = (1.0 - converted).max(0.0);
        add_to(&mut out, source, value, retained * rules.multi);
    }

    Report::new(out, diagnostics)
}

fn add_to(out: &mut BaseDamage, target: DamageType, value: DamageRange, factor: f64) {
    let slot = out.get_mut(target);
    slot.min += value.min * factor;
    slot.max += value.max * factor;
}
