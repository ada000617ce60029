// src/state/mod.rs

pub mod chain_clock;

pub use chain_clock::ChainClock;
