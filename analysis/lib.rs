#![deny(unused_variables)]
#![deny(dead_code)]
#![deny(unused_imports)]
#![deny(clippy::no_effect_underscore_binding)]
pub mod config;
pub mod correlation;
pub mod data;
pub mod explore;
pub mod features;
pub mod models;
pub mod persist;
pub mod pipeline;
pub mod plots;
pub mod progress;
pub mod risk;
pub mod selection;
pub mod stats;
pub mod temporal;

// The smoothing engine lives beside the pipeline stages.
#[path = "../gam/mod.rs"]
pub mod gam;
