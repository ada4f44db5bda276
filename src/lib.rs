pub mod cli;
pub mod config;
pub mod engine;
pub mod models;
pub mod packages;
pub mod reporters;
pub mod runner;
