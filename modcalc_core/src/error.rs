//! Error taxonomy shared by aggregation and calculation.
//!
//! [`CalcError`] is fatal and aborts the call that raised it. [`Diagnostic`] is
//! recoverable: the offending input is skipped or clamped and the diagnostic rides
//! along with the computed value inside a [`Report`].

use crate::types::{DamageType, Stat};
use serde::Serialize;

/// Content-integrity failures. A module that triggers one is corrupt or mismatched.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CalcError {
    #[error("unknown stat '{0}'")]
    UnknownStat(String),

    #[error("unknown flag '{0}'")]
    UnknownFlag(String),

    #[error("unknown condition '{0}'")]
    UnknownCondition(String),

    #[error("cannot register {kind} '{name}': all 32 bits are taken")]
    RegistryFull { kind: &'static str, name: String },

    #[error("unknown skill '{0}'")]
    UnknownSkill(String),

    #[error("skill '{0}' is not an attack skill")]
    NotAnAttack(String),

    #[error("skill '{0}' is not a support skill")]
    NotASupport(String),

    #[error("unknown enemy '{0}'")]
    UnknownEnemy(String),
}

/// Recoverable problems collected during a pass
#[derive(Debug, Clone, PartialEq, Serialize, thiserror::Error)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Diagnostic {
    #[error("malformed stat mod on {stat:?} in mod '{mod_id}': {reason}")]
    MalformedMod {
        mod_id: String,
        stat: Stat,
        reason: &'static str,
    },

    #[error("conversion from {from:?} totals {total} and was clamped to 1")]
    ConversionOverflow { from: DamageType, total: f64 },
}

/// A computed value together with the recoverable diagnostics raised computing it
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Report<T> {
    pub value: T,
    pub diagnostics: Vec<Diagnostic>,
}

impl<T> Report<T> {
    pub fn new(value: T, diagnostics: Vec<Diagnostic>) -> Self {
        Report { value, diagnostics }
    }

    pub fn is_clean(&self) -> bool {
        self.diagnostics.is_empty()
    }

    /// Split into the value and its diagnostics
    pub fn into_parts(self) -> (T, Vec<Diagnostic>) {
        (self.value, self.diagnostics)
    }
}
