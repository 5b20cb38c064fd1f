use log::{debug, trace};
use std::time::Duration;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::time::{sleep, timeout};

/// Sends the SSH greeting one character at a time.
///
/// Each character of `banner + "\r\n"` goes out in its own write followed by a fixed pause.
/// Slow scanners that wait for the full identification line stay connected for roughly
/// `len * interval`.
#[derive(Debug, Clone)]
pub struct BannerTrickler {
    line: String,
    interval: Duration,
    write_timeout: Duration,
}

impl BannerTrickler {
    pub fn new(banner: &str, interval: Duration, write_timeout: Duration) -> Self {
        Self {
            line: format!("{}\r\n", banner),
            interval,
            write_timeout,
        }
    }

    /// Full line as it appears on the wire.
    pub fn line(&self) -> &str {
        &self.line
    }

    /// Trickles the banner into `writer` and returns the number of bytes written.
    ///
    /// A failed or timed out write stops the transmission silently: the peer is most likely
    /// gone and the monitor will notice on its first read.
    pub async fn send<W>(&self, writer: &mut W) -> usize
    where
        W: AsyncWrite + Unpin,
    {
        let mut sent = 0;
        let mut encoded = [0u8; 4];

        for c in self.line.chars() {
            let unit = c.encode_utf8(&mut encoded).as_bytes();
            match timeout(self.write_timeout, writer.write_all(unit)).await {
                Ok(Ok(())) => sent += unit.len(),
                Ok(Err(e)) => {
                    debug!("Banner aborted after {} bytes: {}", sent, e);
                    break;
                }
                Err(_) => {
                    debug!("Banner aborted after {} bytes: write timed out", sent);
                    break;
                }
            }
            trace!("Banner byte {} sent", sent);
            sleep(self.interval).await;
        }

        sent
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use tokio::time::Instant;
    use tokio_test::io::Builder;

    #[tokio::test(start_paused = true)]
    async fn test_banner_is_sent_in_order_with_pacing() {
        let trickler = BannerTrickler::new(
            "SSH-2.0-Test",
            Duration::from_millis(100),
            Duration::from_secs(5),
        );
        let mut mock = Builder::new().write(b"SSH-2.0-Test\r\n").build();

        let started = Instant::now();
        let sent = trickler.send(&mut mock).await;

        assert_eq!(sent, 14);
        // one pause per character, at least len - 1 gaps between the first and the last
        assert!(started.elapsed() >= Duration::from_millis(100 * 13));
    }

    #[tokio::test(start_paused = true)]
    async fn test_write_error_aborts_silently() {
        let trickler = BannerTrickler::new(
            "SSH-2.0-X",
            Duration::from_millis(10),
            Duration::from_secs(5),
        );
        let mut mock = Builder::new()
            .write(b"SSH")
            .write_error(io::Error::new(io::ErrorKind::BrokenPipe, "peer gone"))
            .build();

        let sent = trickler.send(&mut mock).await;

        assert_eq!(sent, 3);
    }

    #[test]
    fn test_line_has_crlf_terminator() {
        let trickler = BannerTrickler::new("SSH-2.0-X", Duration::ZERO, Duration::from_secs(1));

        assert_eq!(trickler.line(), "SSH-2.0-X\r\n");
    }
}
