//! Background readers for a child's stdout/stderr.
//!
//! Completion is decided by the child's exit, not by its pipes: a grandchild
//! left running in the background may hold them open indefinitely. Readers
//! collect into a shared buffer so whatever arrived before the drain deadline
//! is kept.

use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::task::JoinHandle;

/// How long to keep reading after the child has exited.
pub(crate) const PIPE_DRAIN: Duration = Duration::from_millis(250);

pub(crate) struct PipeReader {
    buf: Arc<Mutex<Vec<u8>>>,
    task: Option<JoinHandle<()>>,
}

impl PipeReader {
    /// Start reading `pipe` on the current runtime. `None` (pipe not captured)
    /// yields an empty reader.
    pub(crate) fn spawn<R>(pipe: Option<R>) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let buf = Arc::new(Mutex::new(Vec::new()));
        let task = pipe.map(|mut pipe| {
            let buf = buf.clone();
            tokio::spawn(async move {
                let mut chunk = [0u8; 4096];
                loop {
                    match pipe.read(&mut chunk).await {
                        Ok(0) | Err(_) => break,
                        Ok(n) => lock(&buf).extend_from_slice(&chunk[..n]),
                    }
                }
            })
        });
        Self { buf, task }
    }

    /// Wait up to `drain` for end of stream, then return what was read.
    pub(crate) async fn finish(mut self, drain: Duration) -> String {
        if let Some(task) = self.task.as_mut() {
            let _ = tokio::time::timeout(drain, task).await;
        }
        self.abort();
        String::from_utf8_lossy(&lock(&self.buf)).into_owned()
    }

    /// Stop reading without collecting.
    pub(crate) fn abort(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

fn lock(buf: &Mutex<Vec<u8>>) -> std::sync::MutexGuard<'_, Vec<u8>> {
    buf.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn reads_until_end_of_stream() {
        let reader = PipeReader::spawn(Some(&b"hello\nworld\n"[..]));
        assert_eq!(reader.finish(Duration::from_secs(5)).await, "hello\nworld\n");
    }

    #[tokio::test]
    async fn missing_pipe_is_empty() {
        let reader = PipeReader::spawn(None::<&'static [u8]>);
        assert_eq!(reader.finish(PIPE_DRAIN).await, "");
    }

    #[tokio::test]
    async fn open_pipe_is_cut_off_at_the_drain_deadline() {
        let (mut writer, read_half) = tokio::io::duplex(64);
        tokio::io::AsyncWriteExt::write_all(&mut writer, b"partial")
            .await
            .unwrap();
        let reader = PipeReader::spawn(Some(read_half));
        tokio::time::sleep(Duration::from_millis(50)).await;
        // writer is still alive, so the stream never ends on its own.
        let started = std::time::Instant::now();
        assert_eq!(reader.finish(Duration::from_millis(100)).await, "partial");
        assert!(started.elapsed() < Duration::from_secs(2));
        drop(writer);
    }
}
