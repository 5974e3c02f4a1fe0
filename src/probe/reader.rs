//! Report stream reader.
//!
//! Reads fping's diagnostic stream line by line, parses each line and hands
//! every sample to the sink before reading on.

use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::sync::watch;

use crate::probe::error::PipelineError;
use crate::probe::parser::parse_report_line;
use crate::probe::types::AddressFamily;
use crate::sink::Sink;

/// Read errors in a row after which the stream is considered broken.
pub const MAX_CONSECUTIVE_READ_ERRORS: u32 = 8;

/// Why the reader returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReaderExit {
    /// The stream closed (probe exited).
    EndOfStream,
    /// The owner asked the reader to stop.
    Stopped,
}

/// Counters kept while reading.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReaderStats {
    /// Lines read from the stream.
    pub lines: u64,
    /// Samples handed to the sink.
    pub samples: u64,
    /// Lines that produced no sample.
    pub skipped: u64,
    /// Read errors absorbed.
    pub read_errors: u64,
}

/// Turns a report stream into sink writes for one address family.
pub struct ReportReader {
    family: AddressFamily,
    sink: Arc<dyn Sink>,
    stats: ReaderStats,
}

impl std::fmt::Debug for ReportReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReportReader")
            .field("family", &self.family)
            .field("sink", &self.sink.name())
            .field("stats", &self.stats)
            .finish()
    }
}

impl ReportReader {
    /// Create a reader forwarding to `sink`.
    pub fn new(family: AddressFamily, sink: Arc<dyn Sink>) -> Self {
        Self {
            family,
            sink,
            stats: ReaderStats::default(),
        }
    }

    /// Counters so far.
    pub fn stats(&self) -> ReaderStats {
        self.stats
    }

    /// Read until end of stream or until `stop` turns true.
    ///
    /// Samples reach the sink in line order; the next line is only read once
    /// the previous sample's write has completed.
    ///
    /// # Errors
    /// - `PipelineError::Sink` as soon as a write fails
    /// - `PipelineError::Stream` after [`MAX_CONSECUTIVE_READ_ERRORS`] failed reads
    pub async fn run<R>(
        &mut self,
        stream: R,
        stop: &mut watch::Receiver<bool>,
    ) -> Result<ReaderExit, PipelineError>
    where
        R: AsyncRead + Unpin,
    {
        let mut reader = BufReader::new(stream);
        let mut buf = Vec::with_capacity(256);
        let mut consecutive_errors = 0u32;

        loop {
            buf.clear();
            let read = tokio::select! {
                biased;
                _ = stop_requested(stop) => return Ok(ReaderExit::Stopped),
                read = reader.read_until(b'\n', &mut buf) => read,
            };

            match read {
                Ok(0) => return Ok(ReaderExit::EndOfStream),
                Ok(_) => {
                    consecutive_errors = 0;
                    self.stats.lines += 1;
                    let line = String::from_utf8_lossy(&buf);
                    self.handle_line(line.trim_end_matches(['\n', '\r'])).await?;
                }
                Err(e) => {
                    consecutive_errors += 1;
                    self.stats.read_errors += 1;
                    tracing::warn!(family = %self.family, error = %e, "Failed to read report line");
                    if consecutive_errors >= MAX_CONSECUTIVE_READ_ERRORS {
                        return Err(PipelineError::Stream(e));
                    }
                }
            }
        }
    }

    async fn handle_line(&mut self, line: &str) -> Result<(), PipelineError> {
        tracing::trace!(family = %self.family, line = %line, "Report line");

        let Some(sample) = parse_report_line(line) else {
            self.stats.skipped += 1;
            return Ok(());
        };

        self.sink.write(&sample).await.inspect_err(|e| {
            tracing::error!(
                family = %self.family,
                host = %sample.host,
                sink = self.sink.name(),
                error = %e,
                "Sink write failed"
            );
        })?;
        self.stats.samples += 1;
        Ok(())
    }
}

/// Resolves once `stop` holds `true`. Never resolves if the sender is gone.
async fn stop_requested(stop: &mut watch::Receiver<bool>) {
    if stop.wait_for(|requested| *requested).await.is_err() {
        std::future::pending::<()>().await;
    }
}

/// Consume fping's primary output so the child never blocks on a full pipe.
///
/// Lines are logged at trace level only and may hold any bytes. Reading
/// continues until end of stream or [`MAX_CONSECUTIVE_READ_ERRORS`] failed
/// reads in a row. Returns the number of lines read.
pub async fn drain_output<R>(family: AddressFamily, stream: R) -> u64
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(stream);
    let mut buf = Vec::with_capacity(256);
    let mut count = 0u64;
    let mut consecutive_errors = 0u32;

    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {
                consecutive_errors = 0;
                count += 1;
                let line = String::from_utf8_lossy(&buf);
                tracing::trace!(
                    family = %family,
                    line = %line.trim_end_matches(['\n', '\r']),
                    "Probe output"
                );
            }
            Err(e) => {
                consecutive_errors += 1;
                tracing::debug!(family = %family, error = %e, "Failed to read probe output");
                if consecutive_errors >= MAX_CONSECUTIVE_READ_ERRORS {
                    tracing::warn!(family = %family, "Probe output unreadable, stopping drain");
                    break;
                }
            }
        }
    }
    count
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::types::Latency;
    use crate::sink::{MemorySink, SinkError};

    const REPORT: &str = "\
[12:30:10]
host1 : xmt/rcv/%loss = 10/10/0%, min/avg/max = 1.2/2.3/4.5
host2 : xmt/rcv/%loss = 10/0/100%

garbage line here
host3 : xmt/rcv/%loss = 10/9/10%, min/avg/max = 0.5/0.6/0.9
";

    fn reader(sink: &MemorySink) -> ReportReader {
        ReportReader::new(AddressFamily::V4, Arc::new(sink.clone()))
    }

    #[tokio::test]
    async fn test_reader_forwards_in_order() {
        let sink = MemorySink::new();
        let mut reader = reader(&sink);
        let (_tx, mut rx) = watch::channel(false);

        let exit = reader.run(REPORT.as_bytes(), &mut rx).await.unwrap();
        assert_eq!(exit, ReaderExit::EndOfStream);

        let samples = sink.samples();
        let hosts: Vec<&str> = samples.iter().map(|s| s.host.as_str()).collect();
        assert_eq!(hosts, vec!["host1", "host2", "host3"]);
        assert_eq!(
            samples[0].latency,
            Some(Latency {
                min: 1.2,
                avg: 2.3,
                max: 4.5
            })
        );
        assert!(samples[1].latency.is_none());

        let stats = reader.stats();
        assert_eq!(stats.lines, 6);
        assert_eq!(stats.samples, 3);
        assert_eq!(stats.skipped, 3);
    }

    #[tokio::test]
    async fn test_reader_handles_crlf_and_missing_final_newline() {
        let sink = MemorySink::new();
        let mut reader = reader(&sink);
        let (_tx, mut rx) = watch::channel(false);

        let input = "a : xmt/rcv/%loss = 1/1/0%, min/avg/max = 1/1/1\r\nb : xmt/rcv/%loss = 1/0/100%";
        reader.run(input.as_bytes(), &mut rx).await.unwrap();

        let samples = sink.samples();
        assert_eq!(samples.len(), 2);
        assert_eq!(samples[1].host, "b");
    }

    #[tokio::test]
    async fn test_reader_tolerates_invalid_utf8() {
        let sink = MemorySink::new();
        let mut reader = reader(&sink);
        let (_tx, mut rx) = watch::channel(false);

        let mut input = b"\xff\xfe broken \xff line\n".to_vec();
        input.extend_from_slice(b"ok : xmt/rcv/%loss = 2/2/0%, min/avg/max = 1/1/1\n");
        reader.run(input.as_slice(), &mut rx).await.unwrap();

        assert_eq!(sink.len(), 1);
        assert_eq!(reader.stats().skipped, 1);
    }

    #[tokio::test]
    async fn test_reader_stops_on_signal() {
        let sink = MemorySink::new();
        let mut reader = reader(&sink);
        let (tx, mut rx) = watch::channel(false);

        // Writer half kept open so the stream never ends on its own.
        let (mut client, server) = tokio::io::duplex(1024);
        let handle = tokio::spawn(async move {
            let exit = reader.run(server, &mut rx).await;
            (exit, reader.stats())
        });

        use tokio::io::AsyncWriteExt;
        client
            .write_all(b"h : xmt/rcv/%loss = 1/1/0%, min/avg/max = 1/1/1\n")
            .await
            .unwrap();

        for _ in 0..100 {
            if sink.len() == 1 {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        assert_eq!(sink.len(), 1);

        tx.send(true).unwrap();
        let (exit, stats) = handle.await.unwrap();
        assert_eq!(exit.unwrap(), ReaderExit::Stopped);
        assert_eq!(stats.samples, 1);
        drop(client);
    }

    #[tokio::test]
    async fn test_reader_stop_already_requested() {
        let sink = MemorySink::new();
        let mut reader = reader(&sink);
        let (_tx, mut rx) = watch::channel(true);

        let exit = reader.run(REPORT.as_bytes(), &mut rx).await.unwrap();
        assert_eq!(exit, ReaderExit::Stopped);
        assert!(sink.is_empty());
    }

    #[tokio::test]
    async fn test_reader_dropped_stop_sender_keeps_reading() {
        let sink = MemorySink::new();
        let mut reader = reader(&sink);
        let (tx, mut rx) = watch::channel(false);
        drop(tx);

        let exit = reader.run(REPORT.as_bytes(), &mut rx).await.unwrap();
        assert_eq!(exit, ReaderExit::EndOfStream);
        assert_eq!(sink.len(), 3);
    }

    #[tokio::test]
    async fn test_reader_sink_failure_is_fatal() {
        let sink = MemorySink::new();
        sink.close();
        let mut reader = reader(&sink);
        let (_tx, mut rx) = watch::channel(false);

        let err = reader.run(REPORT.as_bytes(), &mut rx).await.unwrap_err();
        assert!(matches!(err, PipelineError::Sink(SinkError::Closed)));
        // Stopped at the first data line.
        assert_eq!(reader.stats().lines, 2);
        assert_eq!(reader.stats().samples, 0);
    }

    #[tokio::test]
    async fn test_drain_output_counts_lines() {
        let count = drain_output(AddressFamily::V6, &b"one\ntwo\nthree"[..]).await;
        assert_eq!(count, 3);
    }

    #[tokio::test]
    async fn test_drain_output_continues_past_invalid_utf8() {
        let count = drain_output(AddressFamily::V4, &b"one\n\xff\xfe bad\nthree\nfour\n"[..]).await;
        assert_eq!(count, 4);
    }

    #[tokio::test]
    async fn test_drain_output_reads_until_writer_closes() {
        let (mut client, server) = tokio::io::duplex(64);
        let drain = tokio::spawn(drain_output(AddressFamily::V6, server));

        use tokio::io::AsyncWriteExt;
        client.write_all(b"\xc3\x28 first\n").await.unwrap();
        client.write_all(b"second\n").await.unwrap();
        drop(client);

        assert_eq!(drain.await.unwrap(), 2);
    }
}
