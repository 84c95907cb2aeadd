//! Stat registry: resolves content names to stat slots and flag/condition bits.
//!
//! Built once per loaded module and passed by reference to every stage that
//! needs to resolve names. Nothing here is global.

use crate::error::CalcError;
use crate::types::Stat;
use std::collections::HashMap;

/// Flags every module can use without declaring them
pub const DEFAULT_FLAGS: &[&str] = &[
    "attack",
    "melee",
    "ranged",
    "physical",
    "elemental",
    "chaos",
    "bleed",
];

/// Conditions every module can use without declaring them
pub const DEFAULT_CONDITIONS: &[&str] = &["fullMana", "lowMana", "enemyBleeding", "critRecently"];

const MAX_BITS: usize = u32::BITS as usize;

/// Name to slot and name to bit mappings
#[derive(Debug, Clone)]
pub struct StatRegistry {
    stats: HashMap<String, Stat>,
    flags: Vec<String>,
    conditions: Vec<String>,
}

impl StatRegistry {
    /// Registry with every [`Stat`] plus the default flags and conditions
    pub fn standard() -> Self {
        let stats = Stat::ALL
            .iter()
            .map(|stat| (stat.name().to_string(), *stat))
            .collect();

        StatRegistry {
            stats,
            flags: DEFAULT_FLAGS.iter().map(|s| s.to_string()).collect(),
            conditions: DEFAULT_CONDITIONS.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Standard registry extended with module-declared flag and condition names
    pub fn with_names(flags: &[String], conditions: &[String]) -> Result<Self, CalcError> {
        let mut registry = Self::standard();
        for flag in flags {
            registry.register_flag(flag)?;
        }
        for condition in conditions {
            registry.register_condition(condition)?;
        }
        Ok(registry)
    }

    /// Register a flag name, returning its bit. Registering an existing name is a no-op.
    pub fn register_flag(&mut self, name: &str) -> Result<u32, CalcError> {
        Self::register(&mut self.flags, "flag", name)
    }

    /// Register a condition name, returning its bit
    pub fn register_condition(&mut self, name: &str) -> Result<u32, CalcError> {
        Self::register(&mut self.conditions, "condition", name)
    }

    fn register(names: &mut Vec<String>, kind: &'static str, name: &str) -> Result<u32, CalcError> {
        if let Some(idx) = names.iter().position(|n| n == name) {
            return Ok(1 << idx);
        }
        if names.len() >= MAX_BITS {
            return Err(CalcError::RegistryFull {
                kind,
                name: name.to_string(),
            });
        }
        names.push(name.to_string());
        Ok(1 << (names.len() - 1))
    }

    pub fn resolve_flag(&self, name: &str) -> Result<u32, CalcError> {
        self.flags
            .iter()
            .position(|n| n == name)
            .map(|idx| 1 << idx)
            .ok_or_else(|| CalcError::UnknownFlag(name.to_string()))
    }

    pub fn resolve_condition(&self, name: &str) -> Result<u32, CalcError> {
        self.conditions
            .iter()
            .position(|n| n == name)
            .map(|idx| 1 << idx)
            .ok_or_else(|| CalcError::UnknownCondition(name.to_string()))
    }

    /// OR together the bits of every named flag
    pub fn resolve_flags<S: AsRef<str>>(&self, names: &[S]) -> Result<u32, CalcError> {
        names
            .iter()
            .try_fold(0, |mask, name| -> Result<u32, CalcError> {
                Ok(mask | self.resolve_flag(name.as_ref())?)
            })
    }

    pub fn resolve_conditions<S: AsRef<str>>(&self, names: &[S]) -> Result<u32, CalcError> {
        names
            .iter()
            .try_fold(0, |mask, name| -> Result<u32, CalcError> {
                Ok(mask | self.resolve_condition(name.as_ref())?)
            })
    }

    /// Every bit owned by a registered flag
    pub fn flag_mask(&self) -> u32 {
        Self::mask_of(&self.flags)
    }

    pub fn condition_mask(&self) -> u32 {
        Self::mask_of(&self.conditions)
    }

    fn mask_of(names: &[String]) -> u32 {
        (0..names.len()).fold(0, |mask, idx| mask | (1 << idx))
    }

    /// Slot for a stat name
    pub fn stat_index(&self, name: &str) -> Result<Stat, CalcError> {
        self.stats
            .get(name)
            .copied()
            .ok_or_else(|| CalcError::UnknownStat(name.to_string()))
    }

    /// Names of the flags set in `mask`, in bit order
    pub fn flag_names(&self, mask: u32) -> Vec<&str> {
        Self::names_in(&self.flags, mask)
    }

    pub fn condition_names(&self, mask: u32) -> Vec<&str> {
        Self::names_in(&self.conditions, mask)
    }

    fn names_in(names: &[String], mask: u32) -> Vec<&str> {
        names
            .iter()
            .enumerate()
            .filter(|(idx, _)| mask & (1 << idx) != 0)
            .map(|(_, name)| name.as_str())
            .collect()
    }
}

impl Default for StatRegistry {
    fn default() -> Self {
        Self::standard()
    }
}
