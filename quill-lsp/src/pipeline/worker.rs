//! Supervised consumer loops.

use std::fmt::Display;
use std::future::Future;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Drain a receiver forever, invoking `handle` per item.
///
/// A handler error is logged with the task's name and the loop resumes
/// waiting for the next item; a single failure never stops the pipeline
/// and never reaches any other pipeline. The task exits only when the
/// input channel closes.
pub fn spawn_consumer<T, E, F, Fut>(
    name: &'static str,
    mut rx: mpsc::UnboundedReceiver<T>,
    mut handle: F,
) -> JoinHandle<()>
where
    T: Send + 'static,
    E: Display,
    F: FnMut(T) -> Fut + Send + 'static,
    Fut: Future<Output = Result<(), E>> + Send + 'static,
{
    tokio::spawn(async move {
        while let Some(item) = rx.recv().await {
            if let Err(error) = handle(item).await {
                warn!(task = name, %error, "event handler failed; continuing");
            }
        }
        debug!(task = name, "input closed; consumer exiting");
    })
}
