#![deny(unused_variables)]
#![deny(dead_code)]
#![deny(unused_imports)]
#![deny(clippy::no_effect_underscore_binding)]
pub mod config;
pub mod io;
pub mod merge;
pub mod pipeline;
pub mod reassemble;
pub mod resolve;
pub mod types;
pub mod validate;

#[path = "../setup/mod.rs"]
pub mod setup;

#[path = "../metrics/mod.rs"]
pub mod metrics;
