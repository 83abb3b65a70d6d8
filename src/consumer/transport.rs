//! Transport seams around the aggregation core
//!
//! An [`EventSource`] yields raw payloads one at a time and a [`StatsSink`]
//! accepts statistics records. A [`Transport`] opens a fresh source/sink pair,
//! which is what the supervisor calls again after a failed run.

use crate::aggregation::StatisticsSnapshot;
use crate::consumer::error::{ConsumerError, ConsumerResult};
use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, Lines};
use tokio::sync::{mpsc, Mutex};

/// Inbound side of a transport
#[async_trait]
pub trait EventSource: Send {
    /// Next payload; `None` once the source is exhausted.
    ///
    /// An `Err` is a transport failure and ends the current run.
    async fn next_payload(&mut self) -> Option<ConsumerResult<Vec<u8>>>;
}

/// Outbound side of a transport
#[async_trait]
pub trait StatsSink: Send + Sync {
    /// Deliver one statistics record
    async fn publish(&self, snapshot: &StatisticsSnapshot) -> ConsumerResult<()>;

    /// Called once the run using this sink has ended
    async fn close(&self) -> ConsumerResult<()> {
        Ok(())
    }
}

/// Factory for source/sink pairs
#[async_trait]
pub trait Transport: Send + Sync {
    /// Source type
    type Source: EventSource;
    /// Sink type
    type Sink: StatsSink;

    /// Open a new connection
    async fn connect(&self) -> ConsumerResult<(Self::Source, Self::Sink)>;

    /// Name used in logs
    fn name(&self) -> &str;
}

/// Newline-delimited JSON payloads read from any async reader
pub struct LinesSource<R> {
    lines: Lines<BufReader<R>>,
}

impl<R: AsyncRead + Unpin + Send> LinesSource<R> {
    /// Read payloads from `reader`
    pub fn new(reader: R) -> Self {
        Self {
            lines: BufReader::new(reader).lines(),
        }
    }
}

impl LinesSource<tokio::io::Stdin> {
    /// Read payloads from standard input
    pub fn stdin() -> Self {
        Self::new(tokio::io::stdin())
    }
}

#[async_trait]
impl<R: AsyncRead + Unpin + Send> EventSource for LinesSource<R> {
    async fn next_payload(&mut self) -> Option<ConsumerResult<Vec<u8>>> {
        loop {
            match self.lines.next_line().await {
                Ok(Some(line)) if line.trim().is_empty() => continue,
                Ok(Some(line)) => return Some(Ok(line.into_bytes())),
                Ok(None) => return None,
                Err(e) => return Some(Err(ConsumerError::IoError(e))),
            }
        }
    }
}

/// Writes each statistics record as one JSON line
pub struct WriterSink<W> {
    writer: Mutex<W>,
}

impl<W: AsyncWrite + Unpin + Send> WriterSink<W> {
    /// Write records to `writer`
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    /// Recover the writer
    pub fn into_inner(self) -> W {
        self.writer.into_inner()
    }
}

impl WriterSink<tokio::io::Stdout> {
    /// Write records to standard output
    pub fn stdout() -> Self {
        Self::new(tokio::io::stdout())
    }
}

#[async_trait]
impl<W: AsyncWrite + Unpin + Send> StatsSink for WriterSink<W> {
    async fn publish(&self, snapshot: &StatisticsSnapshot) -> ConsumerResult<()> {
        let mut line = snapshot.to_json_vec()?;
        line.push(b'\n');

        let mut writer = self.writer.lock().await;
        writer.write_all(&line).await?;
        writer.flush().await?;
        Ok(())
    }

    async fn close(&self) -> ConsumerResult<()> {
        self.writer.lock().await.flush().await?;
        Ok(())
    }
}

/// JSON lines on stdin in, JSON lines on stdout out
#[derive(Debug, Default, Clone, Copy)]
pub struct StdioTransport;

#[async_trait]
impl Transport for StdioTransport {
    type Source = LinesSource<tokio::io::Stdin>;
    type Sink = WriterSink<tokio::io::Stdout>;

    async fn connect(&self) -> ConsumerResult<(Self::Source, Self::Sink)> {
        Ok((LinesSource::stdin(), WriterSink::stdout()))
    }

    fn name(&self) -> &str {
        "stdio"
    }
}

/// In-process source fed through a channel
pub struct ChannelSource {
    rx: mpsc::Receiver<Vec<u8>>,
}

impl ChannelSource {
    /// Create a source and the sender that feeds it
    pub fn new(buffer: usize) -> (mpsc::Sender<Vec<u8>>, Self) {
        let (tx, rx) = mpsc::channel(buffer);
        (tx, Self { rx })
    }
}

#[async_trait]
impl EventSource for ChannelSource {
    async fn next_payload(&mut self) -> Option<ConsumerResult<Vec<u8>>> {
        self.rx.recv().await.map(Ok)
    }
}

/// In-process sink forwarding records through a channel
#[derive(Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<StatisticsSnapshot>,
}

impl ChannelSink {
    /// Create a sink and the receiver draining it
    pub fn new() -> (Self, mpsc::UnboundedReceiver<StatisticsSnapshot>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

#[async_trait]
impl StatsSink for ChannelSink {
    async fn publish(&self, snapshot: &StatisticsSnapshot) -> ConsumerResult<()> {
        self.tx
            .send(snapshot.clone())
            .map_err(|_| ConsumerError::ChannelError("statistics receiver dropped".to_string()))
    }
}
