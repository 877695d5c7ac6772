pub mod jwt;
pub mod percentile;
