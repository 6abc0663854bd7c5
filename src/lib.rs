// src/lib.rs

//! Kiln cross-compilation build orchestrator
//!
//! Downloads, configures and builds a graph of third-party libraries
//! ("recipes") for the device and simulator architectures of a mobile
//! platform, collecting static libraries and headers into a shared
//! distribution prefix.
//!
//! # Architecture
//!
//! - Recipes: TOML definitions discovered from built-in and custom search paths
//! - Graph: leveled breadth-first expansion with missing/cycle detection
//! - Toolchain: per-architecture environment derived from the platform SDK,
//!   compiler wrappers with baked-in flags, never the ambient environment
//! - State: a small JSON document under the prefix recording what was built

pub mod context;
pub mod download;
mod error;
pub mod flags;
pub mod kitchen;
pub mod recipe;
pub mod sdk;
pub mod shell;
pub mod state;
pub mod template;
pub mod toolchain;

pub use context::{BuildContext, ContextOptions, KilnConfig};
pub use error::{Error, Result};
pub use flags::{Flag, FlagKind};
pub use kitchen::{CookOptions, CookReport, Kitchen};
pub use recipe::graph::{DependencyNode, DependencyWalker};
pub use recipe::registry::RecipeRegistry;
pub use recipe::Recipe;
pub use sdk::{Prerequisites, SdkInfo, ToolLocator, Xcrun};
pub use shell::{Invocation, ProcessRunner, RawOutput, RunFlags, Shell, SystemRunner};
pub use state::StateStore;
pub use toolchain::{Architecture, Environment, ToolchainBuilder};
