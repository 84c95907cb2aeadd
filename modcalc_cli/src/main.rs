//! Command line front end: load a module, evaluate a build or run crafts, print JSON.

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use modcalc_core::calculator::HitSimulation;
use modcalc_core::resolver::ResolverKind;
use modcalc_core::{Build, BuildConfig, CompiledModule, CraftAction, ModuleData, StoredItem};
use serde_json::json;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "modcalc")]
#[command(about = "Character build stat engine", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Compute the stats of a build
    Stats(StatsArgs),

    /// Apply crafting actions to a fresh item
    Craft(CraftArgs),
}

#[derive(Args)]
struct StatsArgs {
    /// Module directory
    #[arg(long)]
    module: PathBuf,

    /// Attack skill id
    #[arg(long)]
    skill: String,

    /// Support skill ids
    #[arg(long = "support")]
    supports: Vec<String>,

    /// Extra active flags
    #[arg(long = "flag")]
    flags: Vec<String>,

    /// Active conditions
    #[arg(long = "condition")]
    conditions: Vec<String>,

    /// Enemy id to evaluate against
    #[arg(long)]
    enemy: Option<String>,

    /// Tree allocation as NODE=POINTS
    #[arg(long = "points", value_parser = parse_points)]
    points: Vec<(String, u32)>,

    /// Stored item JSON files to equip
    #[arg(long = "item")]
    items: Vec<PathBuf>,

    /// How ranged stat mods resolve: min, mid or max
    #[arg(long, default_value = "mid", value_parser = parse_resolver)]
    resolver: ResolverKind,

    /// Simulate this many attacks instead of using expected values
    #[arg(long, requires = "seed")]
    simulate: Option<u32>,

    /// Seed for the hit simulation
    #[arg(long)]
    seed: Option<u64>,
}

#[derive(Args)]
struct CraftArgs {
    /// Module directory
    #[arg(long)]
    module: PathBuf,

    #[arg(long)]
    seed: u64,

    #[arg(long)]
    item_level: u32,

    #[arg(long, default_value_t = 4)]
    max_mods: usize,

    #[arg(long, default_value = "Crafted Item")]
    name: String,

    #[arg(long)]
    budget: u64,

    /// Actions: roll_mods:<index>:<strategy>, add_mod:<strategy>, roll_values, remove[:<index>]
    #[arg(required = true)]
    actions: Vec<CraftAction>,
}

fn parse_points(s: &str) -> Result<(String, u32), String> {
    let (node, points) = s
        .split_once('=')
        .ok_or_else(|| format!("expected NODE=POINTS, got '{}'", s))?;
    let points = points
        .parse()
        .map_err(|_| format!("invalid point count '{}'", points))?;
    Ok((node.to_string(), points))
}

fn parse_resolver(s: &str) -> Result<ResolverKind, String> {
    match s {
        "min" => Ok(ResolverKind::Minimum),
        "mid" => Ok(ResolverKind::Midpoint),
        "max" => Ok(ResolverKind::Maximum),
        other => Err(format!("unknown resolver '{}', expected min, mid or max", other)),
    }
}

fn load_module(dir: &Path) -> Result<CompiledModule> {
    let data = ModuleData::load_from_dir(dir).map_err(|e| {
        anyhow::anyhow!("{}\n{}", e.location_description(), e)
    })?;
    data.compile()
        .with_context(|| format!("module '{}' failed to compile", dir.display()))
}

impl StatsArgs {
    fn run(self) -> Result<()> {
        let module = load_module(&self.module)?;
        let mut build = Build::new(&module, &self.skill)?;

        for support in &self.supports {
            build.add_support(support)?;
        }
        for (node, points) in &self.points {
            for _ in 0..*points {
                build
                    .allocate(node)
                    .with_context(|| format!("cannot allocate '{}'", node))?;
            }
        }

        let crafter = module.crafter();
        for path in &self.items {
            let json = std::fs::read_to_string(path)
                .with_context(|| format!("cannot read item '{}'", path.display()))?;
            let stored = StoredItem::from_json(&json)
                .with_context(|| format!("invalid item '{}'", path.display()))?;
            build.equip(stored.reconstruct(&crafter));
        }

        let hit_simulation = match (self.simulate, self.seed) {
            (Some(hits), Some(seed)) => Some(HitSimulation { hits, seed }),
            (None, Some(_)) => bail!("--seed only applies together with --simulate"),
            _ => None,
        };

        let config = BuildConfig {
            flags: self.flags,
            conditions: self.conditions,
            resolver: self.resolver,
            enemy: self.enemy,
            hit_simulation,
        };
        let report = build.compute(&config)?;

        println!("{}", serde_json::to_string_pretty(&report)?);
        Ok(())
    }
}

impl CraftArgs {
    fn run(self) -> Result<()> {
        let module = load_module(&self.module)?;
        let crafter = module.crafter();

        let mut stored = StoredItem::new(self.name, self.item_level, self.max_mods, self.seed);
        let mut item = stored.reconstruct(&crafter);
        let mut budget = self.budget;
        let mut steps = Vec::new();

        for action in self.actions {
            let name = action.name();
            match stored.craft(&crafter, action, &mut budget) {
                Ok((crafted, outcome)) => {
                    item = crafted;
                    steps.push(json!({ "action": name, "ok": outcome }));
                }
                Err(e) => {
                    tracing::warn!("{} rejected: {}", name, e);
                    steps.push(json!({ "action": name, "error": e.to_string() }));
                }
            }
        }

        let output = json!({
            "steps": steps,
            "budget": budget,
            "item": item,
            "markdown": item.to_markdown(),
            "stored": stored,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        Ok(())
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Stats(args) => args.run(),
        Command::Craft(args) => args.run(),
    }
}
