pub mod orchestrator;
pub mod parser;
pub mod planner;
pub mod suggestion;
