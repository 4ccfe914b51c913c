pub mod fingerprint;
pub mod surf_logging;
