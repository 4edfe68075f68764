//! Shipyard Lua Infrastructure
//!
//! Pipeline definitions are plain Lua files evaluated in a restricted
//! sandbox. This crate provides:
//! - The definition sandbox with the `pipeline` helper module
//! - Parsing of the returned table into a [`PipelineDefinition`]

pub mod parser;
pub mod sandbox;

pub use parser::{parse_pipeline_definition, parse_pipeline_file};
pub use sandbox::create_sandbox;

pub use shipyard_core::domain::pipeline::PipelineDefinition;
