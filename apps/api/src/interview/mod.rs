//! Interview engine: phase state machine, prompt assembly, reply parsing,
//! scoring and persistence of the interview record.

pub mod handlers;
pub mod job;
pub mod locks;
pub mod models;
pub mod orchestrator;
pub mod parser;
pub mod prompt_builder;
pub mod prompts;
pub mod result;
pub mod scoring;
pub mod store;
pub mod transitions;
