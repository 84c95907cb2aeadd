pub mod aggregator;
pub mod build;
pub mod calculator;
pub mod config;
pub mod conversion;
pub mod crafting;
pub mod error;
pub mod item;
pub mod modifier;
pub mod registry;
pub mod resolver;
pub mod skill;
pub mod storage;
pub mod tree;
pub mod types;

pub use aggregator::{aggregate, ActiveMod, ModCache};
pub use build::{Build, BuildConfig, CompiledModule};
pub use calculator::{compute, CalcConfig, StatsOutput};
pub use config::{ConfigError, ModuleData};
pub use conversion::{convert, ConversionTable};
pub use crafting::{CraftAction, CraftError, Crafter};
pub use error::{CalcError, Diagnostic, Report};
pub use item::CraftedItem;
pub use registry::StatRegistry;
pub use storage::StoredItem;
pub use types::*;
