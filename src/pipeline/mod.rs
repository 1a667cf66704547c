// Data pipeline: spreadsheet processing, deploy steps and their orchestration

pub mod orchestrator;
pub mod processing;
pub mod steps;
