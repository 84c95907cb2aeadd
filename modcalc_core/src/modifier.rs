//! Mods and stat mods, in both their load-time (raw) and compiled form.

use crate::error::CalcError;
use crate::registry::StatRegistry;
use crate::resolver::MinMaxResolver;
use crate::types::{Stat, ValueType};
use serde::{Deserialize, Serialize};

/// How a keyword value is written into a description
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeywordType {
    #[default]
    Flat,
    Percent,
}

/// Binds a value into the `index`-th `#` placeholder of a mod description
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Keyword {
    pub name: String,
    #[serde(default)]
    pub value: Option<f64>,
    #[serde(rename = "type", default)]
    pub kind: KeywordType,
    #[serde(default)]
    pub index: usize,
}

/// One compiled contribution to a single stat
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatMod {
    pub stat: Stat,
    #[serde(default)]
    pub value_type: ValueType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    #[serde(default)]
    pub flags: u32,
    #[serde(default)]
    pub conditions: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keyword: Option<Keyword>,
}

impl StatMod {
    /// Unconditional fixed-value stat mod
    pub fn flat(stat: Stat, value_type: ValueType, value: f64) -> Self {
        StatMod {
            stat,
            value_type,
            value: Some(value),
            min: None,
            max: None,
            flags: 0,
            conditions: 0,
            keyword: None,
        }
    }

    /// Unconditional range stat mod
    pub fn range(stat: Stat, value_type: ValueType, min: f64, max: f64) -> Self {
        StatMod {
            value: None,
            min: Some(min),
            max: Some(max),
            ..StatMod::flat(stat, value_type, 0.0)
        }
    }

    pub fn with_flags(mut self, flags: u32) -> Self {
        self.flags = flags;
        self
    }

    pub fn with_conditions(mut self, conditions: u32) -> Self {
        self.conditions = conditions;
        self
    }

    pub fn is_range(&self) -> bool {
        self.value.is_none() && (self.min.is_some() || self.max.is_some())
    }

    /// Whether the gates of this mod are all satisfied
    pub fn applies(&self, active_flags: u32, active_conditions: u32) -> bool {
        (self.flags & active_flags) == self.flags
            && (self.conditions & active_conditions) == self.conditions
    }

    /// Check the value/range shape without drawing anything
    pub fn validate(&self) -> Result<(), &'static str> {
        match (self.value, self.min, self.max) {
            (Some(_), None, None) => Ok(()),
            (Some(_), _, _) => Err("both value and range are set"),
            (None, Some(min), Some(max)) if min <= max => Ok(()),
            (None, Some(_), Some(_)) => Err("min is greater than max"),
            (None, None, None) => Err("neither value nor min/max is set"),
            (None, _, _) => Err("range is missing a bound"),
        }
    }

    /// Resolve to a single number, either the fixed value or a resolver draw
    pub fn scalar(&self, resolver: &mut dyn MinMaxResolver) -> Result<f64, &'static str> {
        self.validate()?;
        match (self.value, self.min, self.max) {
            (None, Some(min), Some(max)) => Ok(resolver.resolve(min, max)),
            (value, _, _) => Ok(value.unwrap_or_default()),
        }
    }
}

/// A named bundle of stat mods granted by one source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mod {
    pub id: String,
    #[serde(default)]
    pub description: String,
    pub stats: Vec<StatMod>,
}

impl Mod {
    pub fn new(id: impl Into<String>, stats: Vec<StatMod>) -> Self {
        Mod {
            id: id.into(),
            description: String::new(),
            stats,
        }
    }

    /// Render the description, filling `#` placeholders from keyword bindings.
    ///
    /// A keyword without its own value takes the owning stat mod's value (or its
    /// range written as `min-max`). Placeholders with no binding stay as `#`.
    pub fn describe(&self) -> String {
        let mut fills: Vec<(usize, String)> = self
            .stats
            .iter()
            .filter_map(|stat_mod| {
                let keyword = stat_mod.keyword.as_ref()?;
                let text = match (keyword.value.or(stat_mod.value), stat_mod.min, stat_mod.max) {
                    (Some(v), _, _) => format_number(v),
                    (None, Some(min), Some(max)) => {
                        format!("{}-{}", format_number(min), format_number(max))
                    }
                    _ => return None,
                };
                let text = match keyword.kind {
                    KeywordType::Flat => text,
                    KeywordType::Percent => format!("{}%", text),
                };
                Some((keyword.index, text))
            })
            .collect();
        fills.sort_by_key(|(idx, _)| *idx);

        let mut out = String::new();
        let mut placeholder = 0;
        for c in self.description.chars() {
            if c == '#' {
                match fills.iter().find(|(idx, _)| *idx == placeholder) {
                    Some((_, text)) => out.push_str(text),
                    None => out.push('#'),
                }
                placeholder += 1;
            } else {
                out.push(c);
            }
        }
        out
    }
}

fn format_number(v: f64) -> String {
    if v.fract() == 0.0 {
        format!("{}", v as i64)
    } else {
        format!("{:.2}", v)
    }
}

/// Flag or condition set as written in content: a precomputed mask or a list of names
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BitSpec {
    Mask(u32),
    Names(Vec<String>),
}

impl Default for BitSpec {
    fn default() -> Self {
        BitSpec::Mask(0)
    }
}

/// Load-time stat mod, before names are resolved through the registry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawStatMod {
    #[serde(alias = "name")]
    pub stat: String,
    #[serde(default, alias = "valueType")]
    pub value_type: ValueType,
    #[serde(default)]
    pub value: Option<f64>,
    #[serde(default)]
    pub min: Option<f64>,
    #[serde(default)]
    pub max: Option<f64>,
    #[serde(default)]
    pub flags: BitSpec,
    #[serde(default)]
    pub conditions: BitSpec,
    #[serde(default)]
    pub keyword: Option<Keyword>,
}

impl RawStatMod {
    pub fn compile(&self, registry: &StatRegistry) -> Result<StatMod, CalcError> {
        let flags = match &self.flags {
            BitSpec::Mask(mask) => match mask & !registry.flag_mask() {
                0 => *mask,
                stray => return Err(CalcError::UnknownFlag(format!("bits {:#x}", stray))),
            },
            BitSpec::Names(names) => registry.resolve_flags(names)?,
        };
        let conditions = match &self.conditions {
            BitSpec::Mask(mask) => match mask & !registry.condition_mask() {
                0 => *mask,
                stray => return Err(CalcError::UnknownCondition(format!("bits {:#x}", stray))),
            },
            BitSpec::Names(names) => registry.resolve_conditions(names)?,
        };

        Ok(StatMod {
            stat: registry.stat_index(&self.stat)?,
            value_type: self.value_type,
            value: self.value,
            min: self.min,
            max: self.max,
            flags,
            conditions,
            keyword: self.keyword.clone(),
        })
    }
}

/// Load-time mod
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawMod {
    pub id: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub stats: Vec<RawStatMod>,
}

impl RawMod {
    pub fn compile(&self, registry: &StatRegistry) -> Result<Mod, CalcError> {
        let stats = self
            .stats
            .iter()
            .map(|raw| raw.compile(registry))
            .collect::<Result<Vec<_>, _>>()
            .inspect_err(|e| tracing::error!("mod '{}' failed to compile: {}", self.id, e))?;

        Ok(Mod {
            id: self.id.clone(),
            description: self.description.clone(),
            stats,
        })
    }
}

/// Compile a list of raw mods, failing on the first unresolvable name
pub fn compile_mods(raw: &[RawMod], registry: &StatRegistry) -> Result<Vec<Mod>, CalcError> {
    raw.iter().map(|m| m.compile(registry)).collect()
}
