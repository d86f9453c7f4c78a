pub mod audit;
pub mod config;
pub mod errors;
pub mod extract;
pub mod lint;
pub mod orchestrator;
pub mod process;
pub mod repo;
pub mod ui;
