//! Shutdown scheduling: reverse-topological layering with concurrent
//! release of each layer.

use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::registry::{Closer, Node};

impl Closer {
    /// Begin shutdown and return the stream of release results.
    ///
    /// The first call freezes registration and releases every resource
    /// exactly once, in reverse-topological layers: a resource starts its
    /// release only after every resource depending on it has finished.
    /// Resources in the same layer run concurrently. Each executed action
    /// contributes its `Result` to the stream in completion order; the
    /// stream closes once no further release will ever run. Calling `close`
    /// again returns an immediately closed, empty stream.
    ///
    /// `cancel` is consulted at each layer boundary — once cancelled, the
    /// in-flight layer drains but no new layer starts — and a clone of it
    /// is passed to every release action, which may use it to bail out
    /// early. Unreleased resources stay unreleased.
    ///
    /// The scheduler never blocks on the stream consumer: results sent to
    /// an abandoned receiver are discarded and shutdown runs to completion
    /// regardless. Must be called from within a tokio runtime.
    pub fn close(&self, cancel: CancellationToken) -> mpsc::UnboundedReceiver<anyhow::Result<()>> {
        let (results, stream) = mpsc::unbounded_channel();

        match self.seal() {
            Some(nodes) if !nodes.is_empty() => {
                info!(resources = nodes.len(), "Closer: shutdown started");
                tokio::spawn(drive(nodes, cancel, results));
            }
            Some(_) => debug!("Closer: shutdown started with nothing registered"),
            // Repeat close: no work to redo, the stream just closes.
            None => debug!("Closer: already closed"),
        }

        stream
    }
}

/// Release schedule driver. Owns the eligibility counters and the sender
/// side of the result stream; returning drops the sender, which closes the
/// stream.
async fn drive(
    mut nodes: Vec<Node>,
    cancel: CancellationToken,
    results: mpsc::UnboundedSender<anyhow::Result<()>>,
) {
    // dependents[i] counts registered nodes holding an edge to node i; a
    // node is eligible for release once its count reaches zero. Counts are
    // only touched between layers, by this task.
    let mut dependents = vec![0usize; nodes.len()];
    for node in &nodes {
        for &dep in &node.deps {
            dependents[dep as usize] += 1;
        }
    }

    let mut layer: Vec<usize> = (0..nodes.len()).filter(|&i| dependents[i] == 0).collect();
    let mut released = 0usize;

    while !layer.is_empty() {
        if cancel.is_cancelled() {
            debug!(
                released,
                unreleased = nodes.len() - released,
                "Closer: cancelled, remaining layers will not run"
            );
            return;
        }

        let mut inflight = JoinSet::new();
        for &index in &layer {
            // Absent actions complete instantly and emit nothing.
            if let Some(release) = nodes[index].release.take() {
                inflight.spawn(release(cancel.clone()));
            }
        }
        debug!(
            width = layer.len(),
            running = inflight.len(),
            "Closer: layer started"
        );

        // Results surface in completion order; draining the whole set is
        // the barrier before the next layer.
        while let Some(finished) = inflight.join_next().await {
            match finished {
                Ok(result) => drop(results.send(result)),
                // A panicked release still counts as completed for
                // scheduling; its dependencies must be released.
                Err(join_err) => warn!(error = %join_err, "Closer: release task failed"),
            }
        }
        released += layer.len();

        let mut next = Vec::new();
        for &index in &layer {
            for &dep in &nodes[index].deps {
                let dep = dep as usize;
                dependents[dep] -= 1;
                if dependents[dep] == 0 {
                    next.push(dep);
                }
            }
        }
        layer = next;
    }

    info!(released, "Closer: shutdown drained");
}
