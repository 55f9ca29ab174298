pub mod config;
pub mod error;
pub mod input;
pub mod ledger;
pub mod paths;
pub mod pipeline;
pub mod reconcile;
pub mod recombine;
pub mod segment;
