//! Operator commands read by the scheduler's background listener.

use async_trait::async_trait;
use std::io::BufRead;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, Lines};
use tokio::sync::mpsc;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperatorCommand {
    Status,
    Stop,
}

impl OperatorCommand {
    /// Parse one console line; leading `/` is accepted.
    pub fn parse(line: &str) -> Option<Self> {
        let word = line.trim().trim_start_matches('/');
        match word.to_ascii_lowercase().as_str() {
            "status" => Some(Self::Status),
            "stop" | "quit" => Some(Self::Stop),
            _ => None,
        }
    }
}

/// Long-lived source of operator commands.
#[async_trait]
pub trait CommandSource: Send {
    /// Next command, or `None` once the source is closed.
    async fn next_command(&mut self) -> Option<OperatorCommand>;
}

/// Commands read line by line from any buffered reader.
pub struct LineCommandSource<R> {
    lines: Lines<R>,
}

impl<R: AsyncBufRead + Unpin> LineCommandSource<R> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: reader.lines(),
        }
    }
}

#[async_trait]
impl<R: AsyncBufRead + Unpin + Send> CommandSource for LineCommandSource<R> {
    async fn next_command(&mut self) -> Option<OperatorCommand> {
        loop {
            match self.lines.next_line().await {
                Ok(Some(line)) => {
                    if line.trim().is_empty() {
                        continue;
                    }
                    match OperatorCommand::parse(&line) {
                        Some(cmd) => return Some(cmd),
                        None => debug!(line = %line.trim(), "Ignoring unknown command"),
                    }
                }
                Ok(None) => return None,
                Err(e) => {
                    warn!(error = %e, "Command input failed");
                    return None;
                }
            }
        }
    }
}

/// Commands typed on the console.
///
/// A plain OS thread does the blocking reads and forwards lines over a
/// channel. Nothing in the runtime waits on that thread, so shutting the
/// runtime down never blocks on a pending console read.
pub struct StdinCommandSource {
    lines: mpsc::UnboundedReceiver<String>,
}

impl StdinCommandSource {
    pub fn stdin() -> Self {
        Self::from_reader(std::io::BufReader::new(std::io::stdin()))
    }

    pub fn from_reader<R: BufRead + Send + 'static>(reader: R) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let spawned = std::thread::Builder::new()
            .name("console-commands".to_string())
            .spawn(move || {
                for line in reader.lines() {
                    match line {
                        Ok(line) => {
                            if tx.send(line).is_err() {
                                break;
                            }
                        }
                        Err(e) => {
                            warn!(error = %e, "Command input failed");
                            break;
                        }
                    }
                }
            });
        if let Err(e) = spawned {
            warn!(error = %e, "Console command reader unavailable");
        }
        Self { lines: rx }
    }
}

#[async_trait]
impl CommandSource for StdinCommandSource {
    async fn next_command(&mut self) -> Option<OperatorCommand> {
        while let Some(line) = self.lines.recv().await {
            if line.trim().is_empty() {
                continue;
            }
            match OperatorCommand::parse(&line) {
                Some(cmd) => return Some(cmd),
                None => debug!(line = %line.trim(), "Ignoring unknown command"),
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{self, Read};
    use std::sync::mpsc as std_mpsc;
    use std::time::Duration;

    /// Blocks every read until the paired sender is dropped.
    struct HeldOpen(std_mpsc::Receiver<()>);

    impl Read for HeldOpen {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            let _ = self.0.recv();
            Ok(0)
        }
    }

    #[test]
    fn test_parse() {
        assert_eq!(OperatorCommand::parse(" status "), Some(OperatorCommand::Status));
        assert_eq!(OperatorCommand::parse("/STOP"), Some(OperatorCommand::Stop));
        assert_eq!(OperatorCommand::parse("quit"), Some(OperatorCommand::Stop));
        assert_eq!(OperatorCommand::parse("trade"), None);
    }

    #[tokio::test]
    async fn test_line_source_skips_noise() {
        let mut source = LineCommandSource::new(&b"\nhello\nstatus\n\n/stop\n"[..]);
        assert_eq!(source.next_command().await, Some(OperatorCommand::Status));
        assert_eq!(source.next_command().await, Some(OperatorCommand::Stop));
        assert_eq!(source.next_command().await, None);
    }

    #[tokio::test]
    async fn test_console_source_forwards_lines() {
        let mut source = StdinCommandSource::from_reader(&b"noise\n\nSTATUS\nquit\n"[..]);
        assert_eq!(source.next_command().await, Some(OperatorCommand::Status));
        assert_eq!(source.next_command().await, Some(OperatorCommand::Stop));
        assert_eq!(source.next_command().await, None);
    }

    #[test]
    fn test_runtime_drop_does_not_wait_on_console() {
        let (keep_open, held) = std_mpsc::channel::<()>();
        let (done_tx, done_rx) = std_mpsc::channel();

        std::thread::spawn(move || {
            let rt = tokio::runtime::Runtime::new().unwrap();
            rt.block_on(async {
                let mut source =
                    StdinCommandSource::from_reader(io::BufReader::new(HeldOpen(held)));
                let pending = tokio::spawn(async move { source.next_command().await });
                tokio::time::sleep(Duration::from_millis(50)).await;
                pending.abort();
                let _ = pending.await;
            });
            drop(rt);
            let _ = done_tx.send(());
        });

        assert!(done_rx.recv_timeout(Duration::from_secs(5)).is_ok());
        drop(keep_open);
    }
}
