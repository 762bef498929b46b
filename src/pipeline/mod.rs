// src/pipeline/mod.rs

pub mod readers;
pub mod sinks;
pub mod transforms;
pub mod writers;
