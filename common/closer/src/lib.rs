//! Dependency-aware resource closer.
//!
//! Services hold resources whose teardown must happen in a particular
//! order: a consumer loop has to stop before its Kafka client is dropped,
//! the client before the TLS context, every pool user before the pool.
//! [`Closer`] captures that order as a dependency graph built at
//! registration time, then releases everything in one shutdown pass:
//! dependents strictly before their dependencies, independent resources
//! concurrently, with an external [`CancellationToken`] able to cut the
//! remaining schedule short.
//!
//! ```no_run
//! use common_closer::Closer;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let closer = Closer::new();
//!
//! // Leaves register first; dependents name them afterwards.
//! let pool = closer.register(|_| async { Ok(()) }, &[])?;
//! let _worker = closer.register(
//!     |_cancel| async move {
//!         // Stop the consumer loop, flush in-flight work, then let the
//!         // pool below be torn down.
//!         Ok(())
//!     },
//!     &[pool],
//! )?;
//!
//! let mut results = closer.close(CancellationToken::new());
//! while let Some(result) = results.recv().await {
//!     if let Err(err) = result {
//!         tracing::warn!("release failed: {err:#}");
//!     }
//! }
//! # Ok(())
//! # }
//! ```
//!
//! [`CancellationToken`]: tokio_util::sync::CancellationToken

mod error;
mod handle;
mod registry;
mod scheduler;

pub use error::RegisterError;
pub use handle::ResourceHandle;
pub use registry::Closer;
