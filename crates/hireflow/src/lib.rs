//! Core library for the placement service: the hiring-pipeline state
//! machine and fee/payment engine, plus the configuration, telemetry, and
//! error scaffolding the API service builds on.

pub mod config;
pub mod error;
pub mod pipeline;
pub mod telemetry;
