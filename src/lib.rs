// src/lib.rs

// On déclare tous nos modules principaux pour les rendre publics et
// utilisables par nos programmes binaires (quote_runner).
pub mod api;
pub mod config;
pub mod decoders;
pub mod events;
pub mod math;
pub mod monitoring;
pub mod routing;
pub mod rpc;
pub mod state;
