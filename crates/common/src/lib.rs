//! dashcheck Common Library
//!
//! Display oracles for the dashboard under test. Scenarios describe expected
//! values as fixtures (a price and its thresholds, a ratio) and the harness
//! turns them into the exact text or class the page must render.

pub mod oracle;

pub use oracle::{
    format_multiplier, format_risk_level, format_upside, gradient_bucket, multiplier, risk_level,
    GradientBucket, Thresholds,
};

/// dashcheck version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
