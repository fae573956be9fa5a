//! Inbox watch loop.
//!
//! A `notify` watcher on the inbox (non-recursive) forwards events into a
//! tokio channel. Every new `.pdf` that is not a transient name gets its own
//! task: stability check, then [`Pipeline::process`]. A semaphore bounds how
//! many documents run at once, and a path already in flight is not queued
//! twice.
//!
//! A failing document is logged and forgotten; it never stops the loop.

use crate::error::PaperError;
use crate::pipeline::detect::{check_stability, Stability};
use crate::process::Pipeline;
use notify::event::{CreateKind, ModifyKind, RenameMode};
use notify::{Event, EventKind, RecursiveMode, Watcher};
use std::collections::HashSet;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

/// Watch until Ctrl-C.
pub async fn watch(pipeline: Arc<Pipeline>) -> Result<(), PaperError> {
    watch_until(pipeline, async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("cannot listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    })
    .await
}

/// Watch until `stop` resolves, then trigger shutdown and wait for in-flight
/// documents to reach a stage boundary.
pub async fn watch_until<F>(pipeline: Arc<Pipeline>, stop: F) -> Result<(), PaperError>
where
    F: Future<Output = ()>,
{
    let config = pipeline.config();
    let inbox = config.inbox.clone();
    for dir in [&config.inbox, &config.outbox] {
        std::fs::create_dir_all(dir).map_err(|e| PaperError::WatchFailed {
            path: dir.clone(),
            detail: e.to_string(),
        })?;
    }

    let (tx, mut rx) = mpsc::unbounded_channel::<notify::Result<Event>>();
    let mut watcher = notify::recommended_watcher(move |res| {
        let _ = tx.send(res);
    })
    .map_err(|e| PaperError::WatchFailed {
        path: inbox.clone(),
        detail: e.to_string(),
    })?;
    watcher
        .watch(&inbox, RecursiveMode::NonRecursive)
        .map_err(|e| PaperError::WatchFailed {
            path: inbox.clone(),
            detail: e.to_string(),
        })?;

    info!(inbox = %inbox.display(), outbox = %config.outbox.display(), "watching for PDFs");

    let limiter = Arc::new(Semaphore::new(config.concurrency));
    let in_flight: Arc<Mutex<HashSet<PathBuf>>> = Arc::new(Mutex::new(HashSet::new()));
    let mut tasks = JoinSet::new();
    tokio::pin!(stop);

    loop {
        tokio::select! {
            _ = &mut stop => {
                info!("stopping watcher");
                break;
            }
            Some(res) = rx.recv() => match res {
                Ok(event) => {
                    for path in candidate_paths(&event) {
                        schedule(&pipeline, &limiter, &in_flight, &mut tasks, path);
                    }
                }
                Err(e) => warn!("watch error: {}", e),
            },
            Some(joined) = tasks.join_next(), if !tasks.is_empty() => {
                if let Err(e) = joined {
                    error!("document task panicked: {}", e);
                }
            }
        }
    }

    pipeline.shutdown().trigger();
    drop(watcher);
    while let Some(joined) = tasks.join_next().await {
        if let Err(e) = joined {
            error!("document task panicked: {}", e);
        }
    }
    Ok(())
}

/// Paths from a create or rename-into-place event.
fn candidate_paths(event: &Event) -> Vec<PathBuf> {
    match event.kind {
        EventKind::Create(CreateKind::File) | EventKind::Create(CreateKind::Any) => {
            event.paths.clone()
        }
        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => event.paths.clone(),
        // FSEvents reports each side of a rename separately with no direction.
        // A source path that is already gone shows up as `Vanished` later.
        EventKind::Modify(ModifyKind::Name(RenameMode::Any)) => event.paths.clone(),
        // Both paths of a rename pair: the second one is the destination.
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => {
            event.paths.last().cloned().into_iter().collect()
        }
        _ => Vec::new(),
    }
}

/// True for `.pdf` files whose name is not a transient download/backup name.
pub fn is_candidate(pipeline: &Pipeline, path: &Path) -> bool {
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return false;
    };
    if pipeline.config().is_ignored_name(name) {
        debug!("ignored transient file: {}", name);
        return false;
    }
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("pdf"))
}

fn schedule(
    pipeline: &Arc<Pipeline>,
    limiter: &Arc<Semaphore>,
    in_flight: &Arc<Mutex<HashSet<PathBuf>>>,
    tasks: &mut JoinSet<()>,
    path: PathBuf,
) {
    if !is_candidate(pipeline, &path) {
        return;
    }
    {
        let Ok(mut set) = in_flight.lock() else {
            return;
        };
        if !set.insert(path.clone()) {
            debug!("{} already queued", path.display());
            return;
        }
    }
    info!(path = %path.display(), "new PDF detected");

    let pipeline = Arc::clone(pipeline);
    let limiter = Arc::clone(limiter);
    let in_flight = Arc::clone(in_flight);
    tasks.spawn(async move {
        let config = pipeline.config();
        match check_stability(&path, config.stability_samples, config.stability_interval).await {
            Stability::Stable(bytes) => {
                debug!(path = %path.display(), bytes, "file is stable");
                match limiter.acquire().await {
                    Ok(_permit) => {
                        // Outcome is logged by the pipeline.
                        let _ = pipeline.process(&path).await;
                    }
                    Err(e) => warn!("worker pool closed: {}", e),
                }
            }
            Stability::Unstable => warn!(path = %path.display(), "file not stable, skipping"),
            Stability::Vanished => info!(path = %path.display(), "file vanished before processing"),
        }
        if let Ok(mut set) = in_flight.lock() {
            set.remove(&path);
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{AccessKind, DataChange};

    fn event(kind: EventKind, paths: &[&str]) -> Event {
        let mut e = Event::new(kind);
        for p in paths {
            e = e.add_path(PathBuf::from(p));
        }
        e
    }

    #[test]
    fn create_and_rename_to_are_candidates() {
        let created = event(EventKind::Create(CreateKind::File), &["/in/a.pdf"]);
        assert_eq!(candidate_paths(&created), vec![PathBuf::from("/in/a.pdf")]);

        let renamed = event(
            EventKind::Modify(ModifyKind::Name(RenameMode::Both)),
            &["/in/a.pdf.crdownload", "/in/a.pdf"],
        );
        assert_eq!(candidate_paths(&renamed), vec![PathBuf::from("/in/a.pdf")]);

        let renamed_to = event(
            EventKind::Modify(ModifyKind::Name(RenameMode::To)),
            &["/in/b.pdf"],
        );
        assert_eq!(
            candidate_paths(&renamed_to),
            vec![PathBuf::from("/in/b.pdf")]
        );

        let undirected = event(
            EventKind::Modify(ModifyKind::Name(RenameMode::Any)),
            &["/in/c.pdf"],
        );
        assert_eq!(
            candidate_paths(&undirected),
            vec![PathBuf::from("/in/c.pdf")]
        );
    }

    #[test]
    fn rename_source_is_not_a_candidate() {
        let from = event(
            EventKind::Modify(ModifyKind::Name(RenameMode::From)),
            &["/in/a.pdf"],
        );
        assert!(candidate_paths(&from).is_empty());
    }

    #[test]
    fn other_events_are_ignored() {
        let modified = event(
            EventKind::Modify(ModifyKind::Data(DataChange::Content)),
            &["/in/a.pdf"],
        );
        assert!(candidate_paths(&modified).is_empty());
        let access = event(EventKind::Access(AccessKind::Any), &["/in/a.pdf"]);
        assert!(candidate_paths(&access).is_empty());
    }
}
