// src/monitoring/mod.rs

pub mod logging;
pub mod metrics;
