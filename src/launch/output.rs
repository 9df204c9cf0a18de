//! Child output draining
//!
//! Each child stream gets its own drain task. Both feed one channel, and a
//! single sink task writes lines in channel order: lines from the same
//! stream keep their order, while stdout and stderr interleave in whatever
//! order they arrive.

use std::io::Write;
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

/// Which child stream a line came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamKind {
    Stdout,
    Stderr,
}

impl StreamKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Stdout => "stdout",
            Self::Stderr => "stderr",
        }
    }
}

/// One line of child output, without its terminator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputLine {
    pub stream: StreamKind,
    pub text: String,
}

/// Destination for child output
pub trait OutputSink: Send {
    fn write_line(&mut self, line: &OutputLine);
}

/// Writes every line to the invoker's stdout
pub struct ConsoleSink;

impl OutputSink for ConsoleSink {
    fn write_line(&mut self, line: &OutputLine) {
        let mut out = std::io::stdout().lock();
        if let Err(e) = writeln!(out, "{}", line.text).and_then(|_| out.flush()) {
            debug!("Dropping {} line: {}", line.stream.name(), e);
        }
    }
}

/// Collects lines in memory
#[derive(Clone, Default)]
pub struct MemorySink {
    lines: Arc<Mutex<Vec<OutputLine>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything written so far
    pub fn lines(&self) -> Vec<OutputLine> {
        self.lines.lock().map(|l| l.clone()).unwrap_or_default()
    }

    /// Text of the lines from one stream, in order
    pub fn stream(&self, stream: StreamKind) -> Vec<String> {
        self.lines()
            .into_iter()
            .filter(|l| l.stream == stream)
            .map(|l| l.text)
            .collect()
    }
}

impl OutputSink for MemorySink {
    fn write_line(&mut self, line: &OutputLine) {
        if let Ok(mut lines) = self.lines.lock() {
            lines.push(line.clone());
        }
    }
}

/// Read `reader` line by line until end of stream, forwarding each line.
///
/// Read errors end the drain; they are not process failures. Returns the
/// number of lines forwarded.
pub fn spawn_drain<R>(
    reader: R,
    stream: StreamKind,
    tx: mpsc::UnboundedSender<OutputLine>,
) -> JoinHandle<usize>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut reader = BufReader::new(reader);
        let mut buf = Vec::new();
        let mut count = 0;

        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf).await {
                Ok(0) => break,
                Ok(_) => {
                    if buf.last() == Some(&b'\n') {
                        buf.pop();
                        if buf.last() == Some(&b'\r') {
                            buf.pop();
                        }
                    }
                    let text = String::from_utf8_lossy(&buf).into_owned();
                    if tx.send(OutputLine { stream, text }).is_err() {
                        break;
                    }
                    count += 1;
                }
                Err(e) => {
                    debug!("Child {} closed: {}", stream.name(), e);
                    break;
                }
            }
        }

        debug!("Child {} drained ({} lines)", stream.name(), count);
        count
    })
}

/// Write every received line to `sink` until all senders are gone
pub fn spawn_sink(
    mut sink: Box<dyn OutputSink>,
    mut rx: mpsc::UnboundedReceiver<OutputLine>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(line) = rx.recv().await {
            sink.write_line(&line);
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn drain_forwards_lines_in_order() {
        let input: &[u8] = b"one\r\ntwo\n\nthree";
        let (tx, rx) = mpsc::unbounded_channel();
        let sink = MemorySink::new();

        let drain = spawn_drain(input, StreamKind::Stdout, tx);
        let writer = spawn_sink(Box::new(sink.clone()), rx);

        assert_eq!(drain.await.unwrap(), 4);
        writer.await.unwrap();

        assert_eq!(sink.stream(StreamKind::Stdout), ["one", "two", "", "three"]);
    }

    #[tokio::test]
    async fn strips_only_the_line_terminator() {
        let input: &[u8] = b"progress\r\r\nbare\r\n\r\n";
        let (tx, rx) = mpsc::unbounded_channel();
        let sink = MemorySink::new();

        let drain = spawn_drain(input, StreamKind::Stdout, tx);
        let writer = spawn_sink(Box::new(sink.clone()), rx);
        drain.await.unwrap();
        writer.await.unwrap();

        assert_eq!(sink.stream(StreamKind::Stdout), ["progress\r", "bare", ""]);
    }

    #[tokio::test]
    async fn invalid_utf8_is_replaced_not_fatal() {
        let input: &[u8] = b"ok\n\xff\xfe\nafter\n";
        let (tx, rx) = mpsc::unbounded_channel();
        let sink = MemorySink::new();

        let drain = spawn_drain(input, StreamKind::Stderr, tx);
        let writer = spawn_sink(Box::new(sink.clone()), rx);
        drain.await.unwrap();
        writer.await.unwrap();

        let lines = sink.stream(StreamKind::Stderr);
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[2], "after");
    }

    #[tokio::test]
    async fn two_streams_share_one_sink() {
        let (tx, rx) = mpsc::unbounded_channel();
        let sink = MemorySink::new();

        let out = spawn_drain(&b"o1\no2\no3\n"[..], StreamKind::Stdout, tx.clone());
        let err = spawn_drain(&b"e1\ne2\n"[..], StreamKind::Stderr, tx);
        let writer = spawn_sink(Box::new(sink.clone()), rx);

        out.await.unwrap();
        err.await.unwrap();
        writer.await.unwrap();

        assert_eq!(sink.lines().len(), 5);
        assert_eq!(sink.stream(StreamKind::Stdout), ["o1", "o2", "o3"]);
        assert_eq!(sink.stream(StreamKind::Stderr), ["e1", "e2"]);
    }
}
