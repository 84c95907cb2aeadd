//! Skills as a tagged sum type: attacks carry flags and a conversion table, supports only mods.

use crate::conversion::ConversionTable;
use crate::error::CalcError;
use crate::modifier::{compile_mods, Mod, RawMod};
use crate::registry::StatRegistry;
use serde::{Deserialize, Serialize};

/// Skill as written in module content
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RawSkill {
    Attack(RawAttackSkill),
    Support(RawSupportSkill),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawAttackSkill {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub level_req: u32,
    /// Flag names switched on while this attack is in use
    #[serde(default)]
    pub flags: Vec<String>,
    #[serde(default)]
    pub conversion: ConversionTable,
    #[serde(default)]
    pub mods: Vec<RawMod>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawSupportSkill {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub level_req: u32,
    #[serde(default)]
    pub mods: Vec<RawMod>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AttackSkill {
    pub id: String,
    pub name: String,
    pub level_req: u32,
    pub flags: u32,
    pub conversion: ConversionTable,
    pub mods: Vec<Mod>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SupportSkill {
    pub id: String,
    pub name: String,
    pub level_req: u32,
    pub mods: Vec<Mod>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Skill {
    Attack(AttackSkill),
    Support(SupportSkill),
}

impl Skill {
    pub fn id(&self) -> &str {
        match self {
            Skill::Attack(s) => &s.id,
            Skill::Support(s) => &s.id,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Skill::Attack(s) => &s.name,
            Skill::Support(s) => &s.name,
        }
    }

    pub fn level_req(&self) -> u32 {
        match self {
            Skill::Attack(s) => s.level_req,
            Skill::Support(s) => s.level_req,
        }
    }

    pub fn mods(&self) -> &[Mod] {
        match self {
            Skill::Attack(s) => &s.mods,
            Skill::Support(s) => &s.mods,
        }
    }

    pub fn as_attack(&self) -> Option<&AttackSkill> {
        match self {
            Skill::Attack(s) => Some(s),
            Skill::Support(_) => None,
        }
    }
}

impl RawSkill {
    pub fn id(&self) -> &str {
        match self {
            RawSkill::Attack(s) => &s.id,
            RawSkill::Support(s) => &s.id,
        }
    }

    pub fn compile(&self, registry: &StatRegistry) -> Result<Skill, CalcError> {
        Ok(match self {
            RawSkill::Attack(raw) => Skill::Attack(AttackSkill {
                id: raw.id.clone(),
                name: raw.name.clone(),
                level_req: raw.level_req,
                flags: registry.resolve_flags(&raw.flags)?,
                conversion: raw.conversion,
                mods: compile_mods(&raw.mods, registry)?,
            }),
            RawSkill::Support(raw) => Skill::Support(SupportSkill {
                id: raw.id.clone(),
                name: raw.name.clone(),
                level_req: raw.level_req,
                mods: compile_mods(&raw.mods, registry)?,
            }),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DamageType;

    #[test]
    fn test_kind_tag_selects_variant() {
        let raw: Vec<RawSkill> = serde_json::from_str(
            r#"[
                {"kind": "attack", "id": "slash", "name": "Slash", "flags": ["attack", "melee"],
                 "conversion": {"physical": {"chaos": 0.2}},
                 "mods": [{"id": "slash_base", "stats": [{"name": "attackSpeed", "value": 1.2}]}]},
                {"kind": "support", "id": "brutality", "name": "Brutality", "level_req": 4,
                 "mods": [{"id": "brutality", "stats": [{"name": "physicalDamage", "value": 30}]}]}
            ]"#,
        )
        .unwrap();

        let registry = StatRegistry::standard();
        let slash = raw[0].compile(&registry).unwrap();
        let attack = slash.as_attack().unwrap();
        assert_eq!(attack.flags, registry.resolve_flags(&["attack", "melee"]).unwrap());
        assert_eq!(
            attack.conversion.get(DamageType::Physical).unwrap().fraction(DamageType::Chaos),
            0.2
        );
        assert_eq!(slash.mods().len(), 1);

        let support = raw[1].compile(&registry).unwrap();
        assert!(support.as_attack().is_none());
        assert_eq!(support.level_req(), 4);
        assert_eq!(support.name(), "Brutality");
    }

    #[test]
    fn test_unknown_skill_flag_is_fatal() {
        let raw: RawSkill = serde_json::from_str(
            r#"{"kind": "attack", "id": "bolt", "name": "Bolt", "flags": ["spell"]}"#,
        )
        .unwrap();
        assert_eq!(
            raw.compile(&StatRegistry::standard()),
            Err(CalcError::UnknownFlag("spell".to_string()))
        );
    }
}
