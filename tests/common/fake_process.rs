//! FakeProcess: a producer output stream backed by a channel.
//!
//! Useful for simulating `adb logcat` or an interceptor writing trace text
//! without spawning real processes. Bytes arrive in whatever chunking the
//! test chooses, so line and block reassembly get exercised.

use bytes::Bytes;
use futures::{Stream, StreamExt};
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::mpsc;
use tracer_core::{TracePipeline, Transaction};

/// A handle for pushing output into a [`FakeProcess`] stream.
pub struct FakeProcessWriter {
    tx: mpsc::UnboundedSender<Bytes>,
}

impl FakeProcessWriter {
    /// Send a line. Adds a trailing newline if not already present.
    pub fn send_line(&self, line: impl Into<String>) {
        let mut s = line.into();
        if !s.ends_with('\n') {
            s.push('\n');
        }
        let _ = self.tx.send(Bytes::from(s));
    }

    /// Send raw text split into chunks of `size` bytes, ignoring line
    /// boundaries.
    pub fn send_chunked(&self, text: &str, size: usize) {
        for chunk in text.as_bytes().chunks(size.max(1)) {
            let _ = self.tx.send(Bytes::copy_from_slice(chunk));
        }
    }

    /// Close the stream, causing the consumer to see EOF.
    pub fn close(self) {
        // tx is dropped, causing the channel to close.
    }
}

/// A fake process output stream. Implements [`Stream<Item = Bytes>`] so it can
/// be used wherever an async byte stream is expected.
pub struct FakeProcess {
    rx: mpsc::UnboundedReceiver<Bytes>,
}

impl Stream for FakeProcess {
    type Item = Bytes;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

/// Create a linked writer/stream pair.
///
/// ```rust
/// let (writer, stream) = fake_process();
/// writer.send_chunked(WORKED_EXAMPLE, 5);
/// writer.close();
/// ```
pub fn fake_process() -> (FakeProcessWriter, FakeProcess) {
    let (tx, rx) = mpsc::unbounded_channel();
    (FakeProcessWriter { tx }, FakeProcess { rx })
}

/// Drive `stream` to EOF through `pipeline`, returning every transaction it
/// completed in order.
pub async fn drive(pipeline: &mut TracePipeline, mut stream: FakeProcess) -> Vec<Transaction> {
    let mut out = Vec::new();
    while let Some(chunk) = stream.next().await {
        out.extend(pipeline.feed_chunk(&chunk));
    }
    out
}
