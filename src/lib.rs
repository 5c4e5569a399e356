pub mod context;
pub mod error;
pub mod execution;
pub mod input;
pub mod llm;
pub mod logging;
pub mod message;
pub mod orchestration;
pub mod parser;
pub mod pipeline;
pub mod planning;
pub mod prompt;
pub mod services;
pub mod shared;
pub mod suggestion;
pub mod tools;
pub mod utils;

pub use error::{CopilotError, Error, Result};
pub use pipeline::{CommandPipeline, PipelineOutcome};
pub use shared::{GlobalConfig, GlobalContext};
