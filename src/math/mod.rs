// src/math/mod.rs

pub mod fraction;
pub mod swap_math;
