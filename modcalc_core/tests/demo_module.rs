use modcalc_core::crafting::TierStrategy;
use modcalc_core::tree::TreeError;
use modcalc_core::{Build, BuildConfig, CompiledModule, CraftAction, CraftError, ModuleData, StoredItem};
use std::path::PathBuf;

fn demo_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../modules/demo")
}

fn demo() -> CompiledModule {
    ModuleData::load_from_dir(&demo_dir())
        .expect("demo module loads")
        .compile()
        .expect("demo module compiles")
}

fn close(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-9
}

#[test]
fn test_demo_module_loads() {
    let data = ModuleData::load_from_dir(&demo_dir()).unwrap();
    assert_eq!(data.player.level, 20);
    assert_eq!(data.skills.len(), 4);
    assert_eq!(data.enemies.len(), 2);
    assert_eq!(data.items.as_ref().unwrap().modifiers.len(), 10);
    assert_eq!(data.mod_tree.as_ref().unwrap().nodes.len(), 4);

    let module = data.compile().unwrap();
    assert!(module.registry.resolve_flag("spell").is_ok());
    assert_eq!(
        module.crafter().cost(&CraftAction::RollMods {
            table_index: 0,
            strategy: TierStrategy::MaxTier
        }),
        Ok(10)
    );
}

#[test]
fn test_heavy_strike_baseline() {
    let module = demo();
    let build = Build::new(&module, "heavy_strike").unwrap();
    let report = build.compute(&BuildConfig::default()).unwrap();
    assert!(report.is_clean());
    let stats = report.value;

    let attack_speed = 1.2 * 1.02;
    assert!(close(stats.average_hit, 15.0 * 1.02));
    assert!(close(stats.attack_speed, attack_speed));
    assert!(close(stats.crit_factor, 1.025));
    assert!(close(stats.dps, 15.3 * 1.025 * attack_speed * 0.95));
    assert!(close(stats.max_mana, 51.0));
    assert!(close(stats.mana_per_second, 4.0 * attack_speed));
    assert!(stats.mana_sustainable);
    assert_eq!(stats.bleed_dps, 0.0);
}

#[test]
fn test_compute_is_idempotent() {
    let module = demo();
    let mut build = Build::new(&module, "heavy_strike").unwrap();
    build.add_support("bloodletting").unwrap();
    let config = BuildConfig {
        conditions: vec!["enemyBleeding".to_string()],
        enemy: Some("armored_brute".to_string()),
        ..BuildConfig::default()
    };
    assert_eq!(build.compute(&config).unwrap(), build.compute(&config).unwrap());
}

#[test]
fn test_onslaught_condition() {
    let module = demo();
    let build = Build::new(&module, "heavy_strike").unwrap();
    let stats = build
        .compute(&BuildConfig {
            conditions: vec!["onslaught".to_string()],
            ..BuildConfig::default()
        })
        .unwrap()
        .value;
    assert!(close(stats.attack_speed, 1.2 * 1.2 * 1.02));
    assert!(!stats.mana_sustainable);
}

#[test]
fn test_bleed_with_bloodletting() {
    let module = demo();
    let mut build = Build::new(&module, "heavy_strike").unwrap();
    build.add_support("bloodletting").unwrap();
    let stats = build
        .compute(&BuildConfig {
            conditions: vec!["enemyBleeding".to_string()],
            ..BuildConfig::default()
        })
        .unwrap()
        .value;

    let physical = 15.0 * 1.22;
    let per_bleed = physical * 0.7 * 1.5;
    let active = 1.2 * 1.02 * 0.95 * 0.3 * 4.0;
    assert!(close(stats.damage.physical.average(), physical));
    assert!(close(stats.bleed_damage, per_bleed));
    assert!(close(stats.active_bleeds, active));
    assert!(close(stats.bleed_dps, per_bleed / 4.0 * active));
    assert!(close(stats.total_dps, stats.dps + stats.bleed_dps));
}

#[test]
fn test_flame_arrow_converts_physical() {
    let module = demo();
    let build = Build::new(&module, "flame_arrow").unwrap();
    let stats = build.compute(&BuildConfig::default()).unwrap().value;
    assert!(close(stats.damage.elemental.min, 8.0 * 0.6 * 1.02));
    assert!(close(stats.damage.elemental.max, 16.0 * 0.6 * 1.02));
    assert!(close(stats.damage.physical.min, 8.0 * 0.4 * 1.02));
}

#[test]
fn test_enemy_resistances_and_evasion() {
    let module = demo();
    let build = Build::new(&module, "heavy_strike").unwrap();
    let stats = build
        .compute(&BuildConfig {
            enemy: Some("armored_brute".to_string()),
            ..BuildConfig::default()
        })
        .unwrap()
        .value;
    assert!(close(stats.average_hit, 15.0 * 1.02 * 0.7));
    assert!(close(stats.hit_chance, 85.0));
    let ttk = stats.time_to_kill.unwrap();
    assert!(close(ttk, 5000.0 / stats.total_dps));
}

#[test]
fn test_tree_allocation_rules() {
    let module = demo();
    let mut build = Build::new(&module, "heavy_strike").unwrap();
    for _ in 0..3 {
        build.allocate("might").unwrap();
    }
    assert_eq!(
        build.allocate("might"),
        Err(TreeError::NodeMaxed("might".to_string()))
    );
    assert!(matches!(
        build.allocate("arcane_mind"),
        Err(TreeError::LevelTooLow { required: 30, level: 20, .. })
    ));

    let stats = build.compute(&BuildConfig::default()).unwrap().value;
    assert_eq!(stats.strength, 25.0);
}

#[test]
fn test_crafted_item_replays_and_equips() {
    let module = demo();
    let crafter = module.crafter();
    let mut stored = StoredItem::new("Rusted Sword", 20, 3, 2024);
    let mut budget = 20;

    let (item, _) = stored
        .craft(
            &crafter,
            CraftAction::RollMods {
                table_index: 0,
                strategy: TierStrategy::MaxTier,
            },
            &mut budget,
        )
        .unwrap();
    // tier 3 needs item level 30
    assert_eq!(item.mods[0].modifier_id, "added_physical_t2");
    assert_eq!(budget, 10);

    stored
        .craft(
            &crafter,
            CraftAction::AddMod {
                strategy: TierStrategy::Lucky,
            },
            &mut budget,
        )
        .unwrap();
    assert_eq!(
        stored
            .craft(
                &crafter,
                CraftAction::RollMods {
                    table_index: 0,
                    strategy: TierStrategy::MaxTier,
                },
                &mut budget,
            )
            .unwrap_err(),
        CraftError::InsufficientBudget { cost: 10, budget: 5 }
    );
    assert_eq!(stored.operations.len(), 2);

    let item = stored.reconstruct(&crafter);
    assert_eq!(item.mods.len(), 2);
    let restored = StoredItem::from_json(&stored.to_json().unwrap()).unwrap();
    assert_eq!(restored.reconstruct(&crafter), item);

    let base = Build::new(&module, "heavy_strike").unwrap();
    let base_dps = base.compute(&BuildConfig::default()).unwrap().value.dps;

    let mut geared = Build::new(&module, "heavy_strike").unwrap();
    geared.equip(item);
    let geared_dps = geared.compute(&BuildConfig::default()).unwrap().value.dps;
    assert!(geared_dps > base_dps);
}
