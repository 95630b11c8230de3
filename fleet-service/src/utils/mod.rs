pub mod gzip;
pub mod redact;

pub use redact::{redact_json, truncate_string};
