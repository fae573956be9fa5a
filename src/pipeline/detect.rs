//! Write-completion detection for newly observed files.
//!
//! A file is stable when `samples` consecutive size readings, `interval`
//! apart, are identical and non-zero. The check never errors: a file that
//! vanishes or cannot be read is reported as [`Stability::Vanished`] and
//! the caller skips it.

use std::path::Path;
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stability {
    /// Size held steady at this many bytes.
    Stable(u64),
    /// Size changed or stayed zero during the sampling window.
    Unstable,
    /// The file disappeared or became unreadable.
    Vanished,
}

/// Sample the size of `path` `samples` times, `interval` apart.
pub async fn check_stability(path: &Path, samples: u32, interval: Duration) -> Stability {
    let mut first: Option<u64> = None;
    let mut stable = true;

    for i in 0..samples.max(1) {
        if i > 0 {
            tokio::time::sleep(interval).await;
        }
        let size = match tokio::fs::metadata(path).await {
            Ok(meta) if meta.is_file() => meta.len(),
            Ok(_) => return Stability::Vanished,
            Err(e) => {
                debug!(
                    "{}: stat failed during stability check: {}",
                    path.display(),
                    e
                );
                return Stability::Vanished;
            }
        };
        match first {
            None => first = Some(size),
            Some(prev) if prev != size => stable = false,
            Some(_) => {}
        }
        if size == 0 {
            stable = false;
        }
    }

    match first {
        Some(size) if stable => Stability::Stable(size),
        _ => Stability::Unstable,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const TICK: Duration = Duration::from_millis(20);

    #[tokio::test]
    async fn steady_file_is_stable() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("a.pdf");
        std::fs::write(&path, b"%PDF-1.4 body").unwrap();
        assert_eq!(check_stability(&path, 3, TICK).await, Stability::Stable(13));
    }

    #[tokio::test]
    async fn empty_file_is_unstable() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("a.pdf");
        std::fs::write(&path, b"").unwrap();
        assert_eq!(check_stability(&path, 3, TICK).await, Stability::Unstable);
    }

    #[tokio::test]
    async fn missing_file_vanished() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("gone.pdf");
        assert_eq!(check_stability(&path, 3, TICK).await, Stability::Vanished);
    }

    #[tokio::test]
    async fn growing_file_is_unstable() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("a.pdf");
        std::fs::write(&path, b"%PDF").unwrap();

        let writer_path = path.clone();
        let writer = tokio::spawn(async move {
            for _ in 0..4 {
                tokio::time::sleep(Duration::from_millis(15)).await;
                let mut f = std::fs::OpenOptions::new()
                    .append(true)
                    .open(&writer_path)
                    .unwrap();
                f.write_all(b"more").unwrap();
            }
        });

        assert_eq!(
            check_stability(&path, 3, Duration::from_millis(40)).await,
            Stability::Unstable
        );
        writer.await.unwrap();
    }

    #[tokio::test]
    async fn deleted_mid_check_vanished() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("a.pdf");
        std::fs::write(&path, b"%PDF").unwrap();

        let p = path.clone();
        let remover = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(30)).await;
            std::fs::remove_file(&p).unwrap();
        });

        assert_eq!(
            check_stability(&path, 3, Duration::from_millis(50)).await,
            Stability::Vanished
        );
        remover.await.unwrap();
    }
}
