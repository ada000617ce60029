// src/decoders/mod.rs

// Décodage zero-copy des comptes on-chain dont dépendent les caches :
// pools AMM V4, pools CLMM, tick arrays, mints et comptes de token SPL.
pub mod amm_v4;
pub mod clmm_pool;
pub mod spl_token;
pub mod tick_array;
