use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::select;
use tokio::sync::Mutex as TokioMutex;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

use crate::commands::AtCommand;
use crate::error::BearerError;
use crate::log::{log_recv_reply, log_send_command};

/// Send side of a modem's serial command port.
#[async_trait]
pub trait CommandChannel: Send + Sync {
    fn name(&self) -> &str;

    /// Runs one command and returns the information text of its reply
    /// (everything before the final `OK`).
    async fn command(
        &self,
        command: &AtCommand,
        cancel: &CancellationToken,
    ) -> Result<String, BearerError>;
}

enum FinalResult {
    Ok,
    NoCarrier,
    Error(String),
}

fn final_result(line: &str) -> Option<FinalResult> {
    match line {
        "OK" => Some(FinalResult::Ok),
        "NO CARRIER" => Some(FinalResult::NoCarrier),
        "ERROR" => Some(FinalResult::Error(line.to_string())),
        _ if line.starts_with("+CME ERROR:") || line.starts_with("+CMS ERROR:") => {
            Some(FinalResult::Error(line.to_string()))
        }
        _ => None,
    }
}

/// How long a port that abandoned a command waits for leftover output
/// before sending the next one.
pub const RESYNC_QUIET: Duration = Duration::from_millis(200);

/// Line-oriented AT port over any async byte stream (a tty, a socket or an
/// in-memory duplex). One command in flight at a time.
pub struct AtPort<S> {
    name: String,
    io: TokioMutex<PortIo<S>>,
}

struct PortIo<S> {
    reader: BufReader<S>,
    /// Bytes of a line not yet terminated; kept across cancelled reads.
    partial: Vec<u8>,
    /// Set when a command was abandoned (timeout or cancel) and its reply may
    /// still arrive.
    stale: bool,
}

fn io_failed(e: std::io::Error) -> BearerError {
    BearerError::Failed(format!("serial I/O error: {e}"))
}

fn port_closed() -> BearerError {
    BearerError::Failed("serial port closed".into())
}

impl<S> PortIo<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    /// Next line, trimmed. `None` at end of stream.
    async fn next_line(&mut self) -> Result<Option<String>, BearerError> {
        let read = self
            .reader
            .read_until(b'\n', &mut self.partial)
            .await
            .map_err(io_failed)?;
        if read == 0 && self.partial.is_empty() {
            return Ok(None);
        }
        let line = String::from_utf8_lossy(&self.partial).trim().to_string();
        self.partial.clear();
        Ok(Some(line))
    }

    /// Discards what an abandoned command left behind, up to its final result
    /// or until the port stays quiet for [`RESYNC_QUIET`].
    async fn resync(&mut self) -> Result<(), BearerError> {
        if !self.stale {
            return Ok(());
        }
        self.stale = false;

        loop {
            let Ok(line) = timeout(RESYNC_QUIET, self.next_line()).await else {
                return Ok(());
            };
            let line = line?.ok_or_else(port_closed)?;
            tracing::debug!("discarding stale line '{}'", line.escape_debug());
            if final_result(&line).is_some() {
                return Ok(());
            }
        }
    }

    async fn exchange(&mut self, body: &str) -> Result<String, BearerError> {
        self.resync().await?;

        let echo = format!("AT{body}");
        let stream = self.reader.get_mut();
        stream
            .write_all(format!("{echo}\r").as_bytes())
            .await
            .map_err(io_failed)?;
        stream.flush().await.map_err(io_failed)?;

        let mut info = Vec::new();
        // Inside the late reply of an earlier command.
        let mut skipping = false;
        loop {
            let text = self.next_line().await?.ok_or_else(port_closed)?;
            if text.is_empty() {
                continue;
            }
            if text == echo {
                skipping = false;
                continue;
            }
            if text.starts_with("AT") {
                tracing::debug!("skipping late reply to '{}'", text.escape_debug());
                skipping = true;
                continue;
            }

            let result = final_result(&text);
            if skipping {
                if result.is_some() {
                    skipping = false;
                }
                continue;
            }

            match result {
                Some(FinalResult::Ok) => return Ok(info.join("\r\n")),
                Some(FinalResult::NoCarrier) => return Err(BearerError::NoCarrier),
                Some(FinalResult::Error(msg)) => return Err(BearerError::Failed(msg)),
                None => info.push(text),
            }
        }
    }
}

impl<S> AtPort<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    pub fn new(name: impl Into<String>, stream: S) -> Self {
        AtPort {
            name: name.into(),
            io: TokioMutex::new(PortIo {
                reader: BufReader::new(stream),
                partial: Vec::new(),
                stale: false,
            }),
        }
    }
}

#[async_trait]
impl<S> CommandChannel for AtPort<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn command(
        &self,
        command: &AtCommand,
        cancel: &CancellationToken,
    ) -> Result<String, BearerError> {
        let mut io = self.io.lock().await;
        if cancel.is_cancelled() {
            return Err(BearerError::Canceled);
        }
        log_send_command(&self.name, command);

        let reply = select! {
            biased;
            _ = cancel.cancelled() => Err(BearerError::Canceled),
            result = timeout(command.timeout, io.exchange(&command.body)) => {
                result.unwrap_or(Err(BearerError::Timeout(command.timeout)))
            }
        };

        match &reply {
            Ok(text) => log_recv_reply(&self.name, text),
            Err(e) => {
                if matches!(e, BearerError::Canceled | BearerError::Timeout(_)) {
                    io.stale = true;
                }
                tracing::debug!(port = %self.name, "command '{}' failed: {e}", command.loggable())
            }
        }
        reply
    }
}
