//! Resource registration and dependency-graph bookkeeping.

use std::future::Future;
use std::sync::Mutex;

use futures::future::BoxFuture;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::RegisterError;
use crate::handle::{next_closer_id, ResourceHandle};

pub(crate) type ReleaseFn =
    Box<dyn FnOnce(CancellationToken) -> BoxFuture<'static, anyhow::Result<()>> + Send + 'static>;

/// One registered resource: its release action (absent for no-op nodes) and
/// the deduplicated indices of the nodes it directly depends on.
pub(crate) struct Node {
    pub(crate) release: Option<ReleaseFn>,
    pub(crate) deps: Vec<u32>,
}

enum Graph {
    /// Still accepting registrations.
    Open(Vec<Node>),
    /// Shutdown has begun; the nodes moved into the scheduler.
    Closed,
}

/// Coordinator for dependency-ordered resource release.
///
/// Resources are added with [`register`](Closer::register), naming the
/// handles of the already-registered resources they depend on. Because a
/// dependency must exist before it can be referenced, the graph is acyclic
/// by construction. [`close`](Closer::close) then releases every resource
/// exactly once, dependents strictly before their dependencies.
///
/// All methods take `&self`; wrap the closer in an `Arc` to register from
/// several tasks.
pub struct Closer {
    id: u64,
    graph: Mutex<Graph>,
}

impl Closer {
    pub fn new() -> Self {
        Self {
            id: next_closer_id(),
            graph: Mutex::new(Graph::Open(Vec::new())),
        }
    }

    /// Register a resource with a release action.
    ///
    /// The action runs at most once, during [`close`](Closer::close), and
    /// receives a clone of the shutdown's cancellation token. It is not
    /// started until every resource that depends on this one has finished
    /// its own release. Whatever it returns is forwarded on the result
    /// stream untouched.
    ///
    /// `deps` may list the same handle more than once; duplicates collapse
    /// to a single edge.
    pub fn register<F, Fut>(
        &self,
        release: F,
        deps: &[ResourceHandle],
    ) -> Result<ResourceHandle, RegisterError>
    where
        F: FnOnce(CancellationToken) -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.insert(
            Some(Box::new(move |cancel| Box::pin(release(cancel)))),
            deps,
        )
    }

    /// Register a resource with no release action.
    ///
    /// The node completes instantly at shutdown and contributes nothing to
    /// the result stream; it exists purely as an ordering point for other
    /// registrations to depend on.
    pub fn register_noop(&self, deps: &[ResourceHandle]) -> Result<ResourceHandle, RegisterError> {
        self.insert(None, deps)
    }

    fn insert(
        &self,
        release: Option<ReleaseFn>,
        deps: &[ResourceHandle],
    ) -> Result<ResourceHandle, RegisterError> {
        // Vacant slots take precedence over foreign handles, wherever they
        // sit in the slice.
        if deps.iter().any(ResourceHandle::is_vacant) {
            return Err(RegisterError::InvalidDependency);
        }
        if deps.iter().any(|dep| dep.closer_id != self.id) {
            return Err(RegisterError::UnknownDependency);
        }

        let mut graph = self.graph.lock().expect("poisoned closer graph lock");
        let Graph::Open(nodes) = &mut *graph else {
            return Err(RegisterError::Closed);
        };

        // Handles are only minted below, so a same-closer handle always
        // points at an existing node.
        let mut edges: Vec<u32> = deps.iter().map(|dep| dep.index).collect();
        edges.sort_unstable();
        edges.dedup();

        let index = nodes.len() as u32;
        let edge_count = edges.len();
        nodes.push(Node {
            release,
            deps: edges,
        });
        debug!(resource = index, deps = edge_count, "Closer: resource registered");

        Ok(ResourceHandle {
            closer_id: self.id,
            index,
        })
    }

    /// Freeze registration and hand the graph to the scheduler. Returns
    /// `None` if shutdown has already begun.
    pub(crate) fn seal(&self) -> Option<Vec<Node>> {
        let mut graph = self.graph.lock().expect("poisoned closer graph lock");
        match std::mem::replace(&mut *graph, Graph::Closed) {
            Graph::Open(nodes) => Some(nodes),
            Graph::Closed => None,
        }
    }
}

impl Default for Closer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_single_returns_handle() {
        let closer = Closer::new();

        let handle = closer
            .register(|_| async { Ok(()) }, &[])
            .expect("should register");

        assert!(!handle.is_vacant());
    }

    #[test]
    fn register_with_dependency() {
        let closer = Closer::new();
        let first = closer
            .register(|_| async { Ok(()) }, &[])
            .expect("should register");

        let second = closer.register(|_| async { Ok(()) }, &[first]);

        assert!(second.is_ok());
    }

    #[test]
    fn register_with_multiple_dependencies() {
        let closer = Closer::new();
        let r1 = closer
            .register(|_| async { Ok(()) }, &[])
            .expect("should register");
        let r2 = closer
            .register(|_| async { Ok(()) }, &[r1])
            .expect("should register");

        let r3 = closer.register(|_| async { Ok(()) }, &[r1, r2]);

        assert!(r3.is_ok());
    }

    #[test]
    fn repeated_dependency_collapses_to_one_edge() {
        let closer = Closer::new();
        let r1 = closer
            .register(|_| async { Ok(()) }, &[])
            .expect("should register");

        closer
            .register(|_| async { Ok(()) }, &[r1, r1, r1])
            .expect("should register");

        let nodes = closer.seal().expect("graph still open");
        assert_eq!(nodes[1].deps, vec![0]);
    }

    #[test]
    fn vacant_dependency_is_rejected() {
        let closer = Closer::new();

        let result = closer.register(|_| async { Ok(()) }, &[ResourceHandle::default()]);

        assert_eq!(result, Err(RegisterError::InvalidDependency));
        // Rejection is atomic: nothing was committed.
        assert!(closer.seal().expect("graph still open").is_empty());
    }

    #[test]
    fn foreign_dependency_is_rejected() {
        let ours = Closer::new();
        let theirs = Closer::new();
        let foreign = theirs
            .register(|_| async { Ok(()) }, &[])
            .expect("should register");

        let result = ours.register(|_| async { Ok(()) }, &[foreign]);

        assert_eq!(result, Err(RegisterError::UnknownDependency));
        assert!(ours.seal().expect("graph still open").is_empty());
    }

    #[test]
    fn vacant_dependency_outranks_foreign_dependency() {
        let ours = Closer::new();
        let theirs = Closer::new();
        let foreign = theirs
            .register(|_| async { Ok(()) }, &[])
            .expect("should register");

        // Both defects in one call: the vacant slot wins, regardless of
        // its position in the slice.
        let result = ours.register(|_| async { Ok(()) }, &[foreign, ResourceHandle::default()]);

        assert_eq!(result, Err(RegisterError::InvalidDependency));
        assert!(ours.seal().expect("graph still open").is_empty());
    }

    #[tokio::test]
    async fn register_after_close_is_rejected() {
        let closer = Closer::new();
        let r1 = closer
            .register(|_| async { Ok(()) }, &[])
            .expect("should register");
        drop(closer.close(CancellationToken::new()));

        let result = closer.register(|_| async { Ok(()) }, &[r1]);

        assert_eq!(result, Err(RegisterError::Closed));
    }

    #[test]
    fn handles_compare_by_identity() {
        let closer = Closer::new();
        let r1 = closer
            .register(|_| async { Ok(()) }, &[])
            .expect("should register");
        let r2 = closer
            .register(|_| async { Ok(()) }, &[])
            .expect("should register");

        assert_eq!(r1, r1);
        assert_ne!(r1, r2);
        assert_ne!(r1, ResourceHandle::default());
    }
}
