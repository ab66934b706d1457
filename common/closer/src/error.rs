//! Registration error types.

use thiserror::Error;

/// Errors returned by [`Closer::register`](crate::Closer::register) and
/// [`Closer::register_noop`](crate::Closer::register_noop). Registration is
/// atomic: on error no node is created and no handle is returned.
///
/// Errors returned by release actions are a separate category — they travel
/// through the stream returned by [`Closer::close`](crate::Closer::close),
/// untouched.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum RegisterError {
    /// A dependency slot holds the vacant handle
    /// ([`ResourceHandle::default`](crate::ResourceHandle)).
    #[error("dependency slot holds a vacant handle")]
    InvalidDependency,

    /// A dependency handle was minted by a different closer instance.
    #[error("dependency handle belongs to a different closer")]
    UnknownDependency,

    /// The closer has already begun shutdown.
    #[error("closer is already shutting down")]
    Closed,
}
