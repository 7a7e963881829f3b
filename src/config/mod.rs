//! Configuration module for Site-Audit
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//! Provider credentials, cache lifetimes and every scoring constant live here so
//! that they can be tuned without rebuilding.
//!
//! # Example
//!
//! ```no_run
//! use site_audit::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("site-audit.toml")).unwrap();
//! println!("Metadata weight: {}", config.scoring.weights.metadata);
//! ```

mod parser;
mod types;
mod validation;

pub use types::{
    CacheBackend, CacheConfig, Config, ContactPoints, FallbackConfig, FeedPoints, HttpConfig,
    LengthRange, MetadataPoints, PerformancePoints, PointsConfig, ProviderConfig,
    ProvidersConfig, ReputationBlend, ResponseTimeBucket, ScoringConfig, SocialPoints, SslPoints,
    TechnologyPoints,
};

pub use parser::{compute_config_hash, load_config, load_config_with_hash, parse_config};
pub use validation::validate;
