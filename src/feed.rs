pub mod random_walk;

use error_stack::Report;
use futures::future::BoxFuture;

use crate::error::FeedError;

/// Source of truth for the current price of a symbol.
///
/// Called once per scheduler tick. Uses `BoxFuture` instead of `async fn`
/// in trait to keep the trait object-safe (`dyn PriceFeed`).
pub trait PriceFeed: Send + Sync {
    /// Return a fresh positive price sample for `symbol`.
    fn sample(&self, symbol: &str) -> BoxFuture<'_, Result<f64, Report<FeedError>>>;
}
