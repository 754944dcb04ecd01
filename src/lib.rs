//! Zod schemas for statically typed JSON payloads.
//!
//! Describe the source types with [`types::Type`], configure how individual
//! types map with [`config`], resolve the roots through a
//! [`resolver::Mapper`] and render the collected declarations with
//! [`emit::generate`]. The [`catalog`] module reads type descriptions from
//! JSON for the command line.
pub mod builder;
pub mod catalog;
pub mod cli;
pub mod comments;
pub mod config;
pub mod emit;
pub mod error;
pub mod path_de;
pub mod resolver;
pub mod schema;
pub mod tags;
pub mod template;
pub mod ts;
pub mod types;
pub mod wire;

pub use config::{ConfigOption, for_generic, for_type};
pub use emit::{generate, generate_string, supporting_declarations};
pub use error::{Error, Result};
pub use resolver::{Mapper, Resolve};
pub use schema::{Declaration, Schema};
pub use types::{Field, Kind, Ref, Type};
