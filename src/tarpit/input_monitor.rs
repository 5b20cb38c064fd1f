use log::info;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::time::timeout;
use uuid::Uuid;

const READ_CHUNK_SIZE: usize = 1024;
const TRUNCATION_MARKER: &str = "...[truncated]";

/// Why the monitor stopped reading.
#[derive(Debug)]
pub enum MonitorOutcome {
    /// The peer closed its side (zero-length read).
    PeerClosed,
    /// Shutdown began and was observed at a read wake-up.
    Shutdown,
    /// Any other read error, reset included.
    Failed(io::Error),
}

#[derive(Debug)]
pub struct MonitorReport {
    pub outcome: MonitorOutcome,
    pub bytes_received: u64,
}

/// Accumulated client input with a bounded memory footprint.
///
/// Everything received is appended. Rendering for the log shows at most `max_input_length`
/// bytes followed by a truncation marker. Once the buffer grows past twice that limit only
/// its trailing `max_input_length` bytes are kept, so bytes between the logged prefix and
/// the retained suffix of a long unbroken stream are never logged.
#[derive(Debug)]
pub struct InputBuffer {
    data: Vec<u8>,
    max_input_length: usize,
}

impl InputBuffer {
    pub fn new(max_input_length: usize) -> Self {
        Self {
            data: Vec::new(),
            max_input_length,
        }
    }

    /// Appends `chunk`, returns the log rendering of the whole buffer, then applies the
    /// sliding window.
    pub fn push(&mut self, chunk: &[u8]) -> String {
        self.data.extend_from_slice(chunk);
        let rendered = self.render();

        if self.data.len() > self.max_input_length * 2 {
            let keep_from = self.data.len() - self.max_input_length;
            self.data.drain(..keep_from);
        }

        rendered
    }

    pub fn render(&self) -> String {
        if self.data.len() > self.max_input_length {
            let mut out = decode_permissive(&self.data[..self.max_input_length]);
            out.push_str(TRUNCATION_MARKER);
            out
        } else {
            decode_permissive(&self.data)
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Lossy UTF-8 decoding, or an ASCII-escaped dump when nothing printable survives it.
pub fn decode_permissive(bytes: &[u8]) -> String {
    let lossy = String::from_utf8_lossy(bytes);
    let has_text = lossy
        .chars()
        .any(|c| c != char::REPLACEMENT_CHARACTER && (!c.is_control() || c.is_whitespace()));

    if has_text || bytes.is_empty() {
        lossy.into_owned()
    } else {
        bytes.escape_ascii().to_string()
    }
}

/// Reads and logs whatever a client sends after the banner.
///
/// Every read is bounded by `read_timeout`. A timeout never ends the session by itself, it
/// only gives the loop a chance to notice that the server stopped running.
#[derive(Debug, Clone)]
pub struct InputMonitor {
    max_input_length: usize,
    read_timeout: Duration,
}

impl InputMonitor {
    pub fn new(max_input_length: usize, read_timeout: Duration) -> Self {
        Self {
            max_input_length,
            read_timeout,
        }
    }

    pub async fn run<R>(
        &self,
        reader: &mut R,
        session_id: Uuid,
        source: &str,
        running: &AtomicBool,
    ) -> MonitorReport
    where
        R: AsyncRead + Unpin,
    {
        let mut buffer = InputBuffer::new(self.max_input_length);
        let mut chunk = [0u8; READ_CHUNK_SIZE];
        let mut bytes_received = 0u64;

        let outcome = loop {
            if !running.load(Ordering::SeqCst) {
                break MonitorOutcome::Shutdown;
            }

            match timeout(self.read_timeout, reader.read(&mut chunk)).await {
                Ok(Ok(0)) => break MonitorOutcome::PeerClosed,
                Ok(Ok(n)) => {
                    bytes_received += n as u64;
                    let rendered = buffer.push(&chunk[..n]);
                    info!("[{}] Data from {}: {}", session_id, source, rendered);
                }
                Ok(Err(e)) => break MonitorOutcome::Failed(e),
                Err(_) => continue,
            }
        };

        MonitorReport {
            outcome,
            bytes_received,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tokio::time::{sleep, Instant};
    use tokio_test::io::Builder;

    #[test]
    fn test_short_input_is_logged_whole() {
        let mut buffer = InputBuffer::new(8);

        assert_eq!(buffer.push(b"root\n"), "root\n");
        assert_eq!(buffer.len(), 5);
    }

    #[test]
    fn test_input_over_limit_is_truncated() {
        let mut buffer = InputBuffer::new(8);

        let rendered = buffer.push(b"0123456789ABCDEF");

        assert_eq!(rendered, "01234567...[truncated]");
        // at exactly twice the limit nothing is dropped yet
        assert_eq!(buffer.len(), 16);
    }

    #[test]
    fn test_buffer_keeps_trailing_window_past_twice_limit() {
        let mut buffer = InputBuffer::new(8);

        buffer.push(b"0123456789");
        let rendered = buffer.push(b"ABCDEFGH");

        assert_eq!(rendered, "01234567...[truncated]");
        assert_eq!(buffer.as_bytes(), b"ABCDEFGH".as_slice());

        // the window now starts from the retained suffix
        assert_eq!(buffer.push(b"!"), "ABCDEFGH...[truncated]");
    }

    #[test]
    fn test_invalid_utf8_is_replaced() {
        assert_eq!(decode_permissive(b"abc\xff"), "abc\u{FFFD}");
    }

    #[test]
    fn test_binary_input_is_escaped() {
        assert_eq!(decode_permissive(&[0x00, 0x01, 0xff]), "\\x00\\x01\\xff");
        assert_eq!(decode_permissive(b""), "");
    }

    #[tokio::test]
    async fn test_peer_close_ends_monitoring() {
        let monitor = InputMonitor::new(1024, Duration::from_secs(5));
        let running = AtomicBool::new(true);
        let mut mock = Builder::new().read(b"SSH-2.0-Go\r\n").read(b"\x00\x00").build();

        let report = monitor
            .run(&mut mock, Uuid::new_v4(), "192.0.2.10", &running)
            .await;

        assert!(matches!(report.outcome, MonitorOutcome::PeerClosed));
        assert_eq!(report.bytes_received, 14);
    }

    #[tokio::test]
    async fn test_read_error_ends_monitoring() {
        let monitor = InputMonitor::new(1024, Duration::from_secs(5));
        let running = AtomicBool::new(true);
        let mut mock = Builder::new()
            .read(b"hi")
            .read_error(io::Error::new(io::ErrorKind::ConnectionReset, "reset"))
            .build();

        let report = monitor
            .run(&mut mock, Uuid::new_v4(), "192.0.2.10", &running)
            .await;

        match report.outcome {
            MonitorOutcome::Failed(e) => assert_eq!(e.kind(), io::ErrorKind::ConnectionReset),
            other => panic!("unexpected outcome {:?}", other),
        }
        assert_eq!(report.bytes_received, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_keeps_monitoring_while_running() {
        let monitor = InputMonitor::new(1024, Duration::from_secs(1));
        let running = AtomicBool::new(true);
        let mut mock = Builder::new()
            .wait(Duration::from_secs(3))
            .read(b"late")
            .build();

        let report = monitor
            .run(&mut mock, Uuid::new_v4(), "192.0.2.10", &running)
            .await;

        assert!(matches!(report.outcome, MonitorOutcome::PeerClosed));
        assert_eq!(report.bytes_received, 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_observed_at_next_timeout() {
        let monitor = InputMonitor::new(1024, Duration::from_secs(1));
        let running = Arc::new(AtomicBool::new(true));
        let (_client, mut server) = tokio::io::duplex(64);

        let stopper = {
            let running = Arc::clone(&running);
            async move {
                sleep(Duration::from_millis(1500)).await;
                running.store(false, Ordering::SeqCst);
            }
        };

        let started = Instant::now();
        let (report, _) = tokio::join!(
            monitor.run(&mut server, Uuid::new_v4(), "192.0.2.10", &running),
            stopper
        );

        assert!(matches!(report.outcome, MonitorOutcome::Shutdown));
        assert_eq!(report.bytes_received, 0);
        assert!(started.elapsed() >= Duration::from_millis(1500));
        assert!(started.elapsed() <= Duration::from_secs(3));
    }
}
