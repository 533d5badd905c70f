pub mod middleware;

pub use middleware::{BearerSecret, require_bearer};
