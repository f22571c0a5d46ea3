//! Carbonshift Core - Shared types and traits
//!
//! This crate defines the core abstractions used across:
//! - carbonshift-simulation-engine (event scheduler + policies)
//! - the intensity / catalog / workload loaders that feed it
//!
//! Key types:
//! - Job and ModelDefinition (the units being scheduled)
//! - CarbonIntensityProvider / ModelCatalogProvider traits
//! - Error types

pub mod types;
pub mod traits;
pub mod error;

pub use types::*;
pub use traits::*;
pub use error::*;
