//! Source file inventory, import extraction, and module resolution for
//! TypeScript projects, driven by a tsconfig.json.

pub mod config;
pub mod discovery;
pub mod error;
pub mod fs;
pub mod model;
pub mod parser;
pub mod program;
pub mod provider;
pub mod resolver;

pub use error::{ProviderError, Result};
pub use provider::{ProviderBuilder, SourceFileProvider, TypeScriptProvider};
pub use resolver::{Resolution, ResolutionCaveat, UnresolvedReason};
