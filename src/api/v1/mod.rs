mod deadline;
mod error;
mod handler;
mod router;

pub use deadline::{DeadlineConfig, ResponseSink, supervise};
pub use error::recover_error;
pub use router::routes;
