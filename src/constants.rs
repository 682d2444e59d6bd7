//! Crate-wide names. Numeric defaults live in `prtg::constants::API_CONFIG`.

pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1";

/// Prefix for configuration environment variables (`PRTG_URL`, `PRTG_USERNAME`, ...)
pub const ENV_PREFIX: &str = "PRTG";

pub const USER_AGENT: &str = concat!("prtg-datasource/", env!("CARGO_PKG_VERSION"));
