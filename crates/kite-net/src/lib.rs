pub mod error;
pub mod proxy;
pub mod rate_limit;
pub mod transport;

pub use error::NetError;
pub use proxy::{ProxyRotator, ProxyScheme};
pub use rate_limit::RateLimiter;
pub use transport::{HttpTransport, RetryPolicy, TransportFactory};
