use std::sync::Arc;

use nvhttpd::cache::ContentCache;
use nvhttpd::config;
use nvhttpd::dispatcher::{self, Dispatcher};
use nvhttpd::logging::Logger;
use nvhttpd::pidfile::PidFile;
use nvhttpd::tls;

#[tokio::main]
async fn main() {
    let cli = nvhttpd::cli::parse();

    if let Err(e) = run(cli).await {
        // Startup/runtime failures: diagnostic on stderr, process exits
        // non-zero. The logger may not have been constructed yet if the
        // failure happened while loading config, so stderr is the only
        // sink guaranteed to exist.
        eprintln!("nvhttpd: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: nvhttpd::cli::Cli) -> Result<(), nvhttpd::error::ServerError> {
    dispatcher::ignore_sigpipe();

    let config = Arc::new(config::load(&cli.config)?);
    let logger = Arc::new(Logger::init(config.log_sink.clone(), config.log_level));

    let _pid_file = PidFile::write(&config.pid_file)?;

    let tls_acceptor = if config.tls.enabled {
        let _ = rustls::crypto::ring::default_provider().install_default();
        let cert = config
            .tls
            .certificate
            .as_deref()
            .expect("validated by config::load");
        let key = config.tls.key.as_deref().expect("validated by config::load");
        Some(tls::build_acceptor(cert, key)?)
    } else {
        None
    };

    let cache = Arc::new(ContentCache::init());
    cache.load(&config.html_root, &logger)?;

    let dispatcher = Dispatcher::new(
        Arc::clone(&config),
        Arc::clone(&cache),
        Arc::clone(&logger),
        tls_acceptor,
    );

    logger.info(format!(
        "{} starting on port {} (tls={})",
        config.server_name, config.port, config.tls.enabled
    ));

    dispatcher.run().await
}
