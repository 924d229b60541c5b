//! Unified blocking-per-worker byte transport over a plain TCP socket or a
//! TLS session, with the small read-ahead buffer the parser's `peek`/`next`
//! primitives read through.

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio_rustls::server::TlsStream;

/// Size of the fixed read-ahead buffer backing `peek`/`next`. Chosen large
/// enough to amortize syscalls across an average request line without
/// holding onto much memory per idle connection.
const BUFFER_SIZE: usize = 4096;

enum Stream {
    Plain(TcpStream),
    Tls(Box<TlsStream<TcpStream>>),
}

/// The result of a single `peek`/`next` primitive: a byte, a clean peer
/// close, or a read error. Only these two primitives may suspend on the
/// socket; the parser's state machine otherwise never blocks.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ByteResult {
    Byte(u8),
    Eof,
    IoErr,
}

pub struct Transport {
    stream: Stream,
    buf: [u8; BUFFER_SIZE],
    head: usize,
    len: usize,
}

impl Transport {
    pub fn plain(stream: TcpStream) -> Self {
        Transport {
            stream: Stream::Plain(stream),
            buf: [0u8; BUFFER_SIZE],
            head: 0,
            len: 0,
        }
    }

    pub fn tls(stream: TlsStream<TcpStream>) -> Self {
        Transport {
            stream: Stream::Tls(Box::new(stream)),
            buf: [0u8; BUFFER_SIZE],
            head: 0,
            len: 0,
        }
    }

    async fn refill(&mut self) -> std::io::Result<bool> {
        debug_assert!(self.head <= self.len && self.len <= BUFFER_SIZE);
        if self.head < self.len {
            return Ok(true);
        }
        self.head = 0;
        self.len = 0;
        let n = match &mut self.stream {
            Stream::Plain(s) => s.read(&mut self.buf).await?,
            Stream::Tls(s) => s.read(&mut self.buf).await?,
        };
        self.len = n;
        Ok(n > 0)
    }

    /// Non-advancing: look at the next byte without consuming it.
    pub async fn peek(&mut self) -> ByteResult {
        match self.refill().await {
            Ok(true) => ByteResult::Byte(self.buf[self.head]),
            Ok(false) => ByteResult::Eof,
            Err(_) => ByteResult::IoErr,
        }
    }

    /// Advancing: consume and return the next byte.
    pub async fn next(&mut self) -> ByteResult {
        let result = self.peek().await;
        if let ByteResult::Byte(_) = result {
            self.head += 1;
        }
        result
    }

    /// Frame and send `data` in a loop that tolerates short writes; any
    /// write returning zero bytes aborts with an error, matching the
    /// assembler's framing contract.
    pub async fn write_all(&mut self, mut data: &[u8]) -> std::io::Result<()> {
        while !data.is_empty() {
            let n = match &mut self.stream {
                Stream::Plain(s) => s.write(data).await?,
                Stream::Tls(s) => s.write(data).await?,
            };
            if n == 0 {
                return Err(std::io::Error::new(
                    std::io::ErrorKind::WriteZero,
                    "transport write returned 0 bytes",
                ));
            }
            data = &data[n..];
        }
        match &mut self.stream {
            Stream::Plain(s) => s.flush().await,
            Stream::Tls(s) => s.flush().await,
        }
    }

    /// Two-phase shutdown for TLS (send close_notify, then close the
    /// socket); a plain shutdown for TCP. The Transport owns the socket, so
    /// this closes it exactly once.
    pub async fn shutdown(&mut self) {
        let _ = match &mut self.stream {
            Stream::Plain(s) => s.shutdown().await,
            Stream::Tls(s) => s.shutdown().await,
        };
    }
}
