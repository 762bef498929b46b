#![allow(non_snake_case)]

// Declare the modules that form the library's public API.
// The `dispatcher` and `worker` binaries reach them through `FluBlaster::module_name`.
pub mod broker;
pub mod config;
pub mod data_model;
pub mod error;
pub mod pipeline;
pub mod utils;

pub mod dispatcher_logic;
pub mod worker_logic;

pub use error::{PipelineError, Result};
