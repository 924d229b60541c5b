//! Accept loop, per-connection worker, signal-driven reload/termination,
//! and response dispatch.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use socket2::{Domain, Socket, Type};
use tokio::net::TcpListener;
use tokio::signal::unix::{signal, SignalKind};
use tokio::task::JoinSet;
use tokio_rustls::TlsAcceptor;

use crate::cache::ContentCache;
use crate::config::ServerConfig;
use crate::error::{ParseError, ServerError};
use crate::logging::Logger;
use crate::parser;
use crate::request::Method;
use crate::response;
use crate::transport::Transport;

/// `listen()` backlog passed to the OS at bind time.
const LISTEN_BACKLOG: i32 = 10;

static SHUTDOWN: AtomicBool = AtomicBool::new(false);
static RELOAD: AtomicBool = AtomicBool::new(false);

/// Install a no-op SIGPIPE handler so a peer closing mid-write surfaces as a
/// write error on the next syscall instead of killing the process.
#[cfg(unix)]
pub fn ignore_sigpipe() {
    unsafe {
        libc::signal(libc::SIGPIPE, libc::SIG_IGN);
    }
}

#[cfg(not(unix))]
pub fn ignore_sigpipe() {}

fn bind_listener(addr: SocketAddr) -> Result<TcpListener, ServerError> {
    let socket = Socket::new(Domain::IPV4, Type::STREAM, None).map_err(|source| ServerError::Bind {
        addr: addr.to_string(),
        source,
    })?;
    socket.set_reuse_address(true).ok();
    socket
        .bind(&addr.into())
        .map_err(|source| ServerError::Bind {
            addr: addr.to_string(),
            source,
        })?;
    socket
        .listen(LISTEN_BACKLOG)
        .map_err(ServerError::Listen)?;
    socket.set_nonblocking(true).map_err(ServerError::Listen)?;
    TcpListener::from_std(socket.into()).map_err(ServerError::Listen)
}

pub struct Dispatcher {
    config: Arc<ServerConfig>,
    cache: Arc<ContentCache>,
    logger: Arc<Logger>,
    tls_acceptor: Option<TlsAcceptor>,
}

impl Dispatcher {
    pub fn new(
        config: Arc<ServerConfig>,
        cache: Arc<ContentCache>,
        logger: Arc<Logger>,
        tls_acceptor: Option<TlsAcceptor>,
    ) -> Self {
        Dispatcher {
            config,
            cache,
            logger,
            tls_acceptor,
        }
    }

    /// Run the accept loop until a termination signal is observed. Returns
    /// an error only if a reload fails (a reload failure is treated as fatal
    /// to the loop, to avoid serving stale divergent state) or the bind
    /// itself fails.
    pub async fn run(&self) -> Result<(), ServerError> {
        let addr = SocketAddr::new(self.config.bind_address.to_ipv4().into(), self.config.port);
        let listener = bind_listener(addr)?;
        self.logger.info(format!("listening on {addr}"));
        self.run_with_listener(listener).await
    }

    /// Run the accept loop over an already-bound listener. Split out of
    /// [`Dispatcher::run`] so tests can bind an ephemeral port, read it back
    /// with `local_addr()`, and then hand the listener off here.
    pub async fn run_with_listener(&self, listener: TcpListener) -> Result<(), ServerError> {
        let mut sigusr1 = signal(SignalKind::user_defined1())
            .map_err(|e| ServerError::Bind {
                addr: "SIGUSR1".to_string(),
                source: e,
            })?;
        let mut sigterm = signal(SignalKind::terminate())
            .map_err(|e| ServerError::Bind {
                addr: "SIGTERM".to_string(),
                source: e,
            })?;

        let mut workers: JoinSet<()> = JoinSet::new();

        loop {
            if RELOAD.swap(false, Ordering::AcqRel) {
                self.cache.load(&self.config.html_root, &self.logger)?;
            }

            tokio::select! {
                accepted = listener.accept() => {
                    match accepted {
                        Ok((stream, _peer)) => {
                            let _ = stream.set_nodelay(true);
                            let cache = Arc::clone(&self.cache);
                            let logger = Arc::clone(&self.logger);
                            let extra_headers = self.config.extra_headers.clone();
                            let tls_acceptor = self.tls_acceptor.clone();
                            workers.spawn(async move {
                                let transport = match tls_acceptor {
                                    Some(acceptor) => match acceptor.accept(stream).await {
                                        Ok(tls_stream) => Transport::tls(tls_stream),
                                        Err(e) => {
                                            logger.warn(format!("TLS handshake failed: {e}"));
                                            return;
                                        }
                                    },
                                    None => Transport::plain(stream),
                                };
                                handle_connection(transport, cache, extra_headers, logger).await;
                            });
                        }
                        Err(e) => {
                            self.logger.warn(format!("accept failed: {e}"));
                            continue;
                        }
                    }
                }
                _ = tokio::signal::ctrl_c() => {
                    self.logger.info("SIGINT received, shutting down".to_string());
                    SHUTDOWN.store(true, Ordering::Relaxed);
                    break;
                }
                _ = sigterm.recv() => {
                    self.logger.info("SIGTERM received, shutting down".to_string());
                    SHUTDOWN.store(true, Ordering::Relaxed);
                    break;
                }
                _ = sigusr1.recv() => {
                    RELOAD.store(true, Ordering::Relaxed);
                }
            }

            if SHUTDOWN.load(Ordering::Relaxed) {
                break;
            }
        }

        // In-flight workers run to completion; we only stop spawning new
        // ones and wait for what's already running.
        while workers.join_next().await.is_some() {}
        Ok(())
    }
}

/// Per-connection worker: parse, resolve, assemble, send, close.
async fn handle_connection(
    mut transport: Transport,
    cache: Arc<ContentCache>,
    extra_headers: String,
    logger: Arc<Logger>,
) {
    match parser::parse(&mut transport).await {
        Ok(request) => {
            let is_head = request.is_head();
            if !matches!(request.method, Method::Get | Method::Head) {
                let entry = response::error_entry(&cache, 501);
                let _ = response::write_response(&mut transport, 501, &entry, is_head, &extra_headers).await;
            } else {
                match cache.find(&request.uri) {
                    Some(entry) => {
                        if let Err(e) =
                            response::write_response(&mut transport, 200, &entry, is_head, &extra_headers).await
                        {
                            logger.warn(format!("write failed: {e}"));
                        }
                    }
                    None => {
                        let entry = response::error_entry(&cache, 404);
                        let _ =
                            response::write_response(&mut transport, 404, &entry, is_head, &extra_headers).await;
                    }
                }
            }
        }
        Err(ParseError::Io) => {
            // Peer closed or a read failed: drop the connection without a
            // response.
        }
        Err(ParseError::Bad) => {
            let entry = response::error_entry(&cache, 400);
            let _ = response::write_response(&mut transport, 400, &entry, false, &extra_headers).await;
        }
        Err(ParseError::Internal) => {
            let entry = response::error_entry(&cache, 500);
            let _ = response::write_response(&mut transport, 500, &entry, false, &extra_headers).await;
        }
    }
    transport.shutdown().await;
}

/// Request a graceful shutdown, as if SIGINT had been delivered. Exposed for
/// tests and for any future programmatic control path.
#[cfg(test)]
pub fn request_shutdown() {
    SHUTDOWN.store(true, Ordering::Relaxed);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::ContentCache;
    use crate::config::{BindAddress, TlsConfig};
    use crate::logging::Logger;
    use tempfile::TempDir;
    use tokio::net::TcpStream;
    use tokio::time::{timeout, Duration};

    fn test_config() -> ServerConfig {
        ServerConfig {
            bind_address: BindAddress::Any,
            port: 0,
            html_root: std::path::PathBuf::from("."),
            server_name: "test".to_string(),
            pid_file: std::path::PathBuf::from("/tmp/does-not-matter.pid"),
            extra_headers: String::new(),
            tls: TlsConfig {
                enabled: false,
                certificate: None,
                key: None,
            },
            log_level: crate::logging::LogLevel::Error,
            log_sink: crate::logging::LogSink::Stderr,
        }
    }

    /// `request_shutdown` flips the same flag a delivered SIGINT would, and
    /// the accept loop observes it on the next iteration. The loop only
    /// rechecks `SHUTDOWN` after a `select!` branch completes, so the test
    /// has to wake the accept branch itself by connecting a client.
    #[tokio::test]
    async fn request_shutdown_drains_the_accept_loop() {
        let tmp = TempDir::new().unwrap();
        let logger = Arc::new(Logger::for_test());
        let cache = Arc::new(ContentCache::init());
        cache.load(tmp.path(), &logger).unwrap();

        let dispatcher = Arc::new(Dispatcher::new(
            Arc::new(test_config()),
            cache,
            logger,
            None,
        ));

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let handle = {
            let dispatcher = Arc::clone(&dispatcher);
            tokio::spawn(async move { dispatcher.run_with_listener(listener).await })
        };

        request_shutdown();
        // Wake the accept() branch so the loop rechecks SHUTDOWN and breaks.
        let _ = TcpStream::connect(addr).await;

        let result = timeout(Duration::from_secs(5), handle)
            .await
            .expect("dispatcher did not shut down in time")
            .expect("dispatcher task panicked");
        assert!(result.is_ok());
    }
}
