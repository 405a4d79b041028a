pub mod config;
pub mod constants;
pub mod error;
pub mod logging;

// Score records and catalog shapes shared across layers
pub mod domain;

// Cleaning, merging, validation and export stages
pub mod pipeline;

// Layered boundaries for application and infrastructure
pub mod app;
pub mod infra;
