//! churnwatch-core: insurance contract churn prediction.
//!
//! Training reads every historical contract, fits a category encoder,
//! balances the classes, optionally eliminates features and fits a
//! gradient-boosted classifier. The result is saved as one artifact
//! bundle. Scoring loads that bundle and flags active contracts.

pub mod artifact;
pub mod balancer;
pub mod config;
pub mod encoder;
pub mod engine;
pub mod error;
pub mod evaluation;
pub mod export;
pub mod features;
pub mod gbdt;
pub mod matrix;
pub mod prediction;
pub mod rng;
pub mod schema;
pub mod selector;
pub mod source;
pub mod store;
pub mod synthetic;
pub mod threshold;
pub mod types;
