pub mod metrics;
pub mod panic;
pub mod tracing;

pub use self::metrics::metrics_middleware;
pub use self::panic::{handle_panic, panic_layer};
pub use self::tracing::{request_id_middleware, RequestId, REQUEST_ID_HEADER};
