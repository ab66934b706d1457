//! Opaque resource handles.

use std::sync::atomic::{AtomicU64, Ordering};

// Closer id 0 is reserved for the vacant handle.
static NEXT_CLOSER_ID: AtomicU64 = AtomicU64::new(1);

pub(crate) fn next_closer_id() -> u64 {
    NEXT_CLOSER_ID.fetch_add(1, Ordering::Relaxed)
}

/// Opaque token for a resource registered with a [`Closer`](crate::Closer),
/// and the only value accepted as a dependency of later registrations.
///
/// A handle is only meaningful to the closer that minted it: passing it to
/// another instance fails with
/// [`RegisterError::UnknownDependency`](crate::RegisterError::UnknownDependency).
/// The `Default` value is *vacant* — bound to no resource, comparable to a
/// null map key — and is rejected as a dependency with
/// [`RegisterError::InvalidDependency`](crate::RegisterError::InvalidDependency).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct ResourceHandle {
    pub(crate) closer_id: u64,
    pub(crate) index: u32,
}

impl ResourceHandle {
    /// Whether this handle is bound to no resource.
    pub fn is_vacant(&self) -> bool {
        self.closer_id == 0
    }
}
