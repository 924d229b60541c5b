//! Typed server configuration and its INI loader.
//!
//! This module is the thin adapter between an on-disk INI file and the typed
//! `ServerConfig` the core subsystems consume; it holds no server logic of
//! its own.

use std::path::{Path, PathBuf};

use ini::Ini;

use crate::error::ServerError;
use crate::logging::{LogLevel, LogSink};

const DEFAULT_PLAIN_PORT: u16 = 80;
const DEFAULT_TLS_PORT: u16 = 443;
const DEFAULT_PID_FILE: &str = "/var/run/nvhttpd.pid";
const DEFAULT_HTML_PATH: &str = "./content";

/// Bind address as read from `[server].ip`: either a parsed dotted-quad
/// literal, or "any" (the unspecified IPv4 address).
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BindAddress {
    Any,
    Literal(std::net::Ipv4Addr),
}

impl BindAddress {
    pub fn parse(s: &str) -> Result<BindAddress, ServerError> {
        if s.eq_ignore_ascii_case("any") {
            return Ok(BindAddress::Any);
        }
        s.parse::<std::net::Ipv4Addr>()
            .map(BindAddress::Literal)
            .map_err(|_| ServerError::InvalidBindAddress(s.to_string()))
    }

    pub fn to_ipv4(&self) -> std::net::Ipv4Addr {
        match self {
            BindAddress::Any => std::net::Ipv4Addr::UNSPECIFIED,
            BindAddress::Literal(addr) => *addr,
        }
    }
}

#[derive(Clone, Debug)]
pub struct TlsConfig {
    pub enabled: bool,
    pub certificate: Option<PathBuf>,
    pub key: Option<PathBuf>,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: BindAddress,
    pub port: u16,
    pub html_root: PathBuf,
    pub server_name: String,
    pub pid_file: PathBuf,
    /// Extra response headers, pre-joined into a CRLF-terminated block
    /// ready to splice into the response assembler's header section.
    pub extra_headers: String,
    pub tls: TlsConfig,
    pub log_level: LogLevel,
    pub log_sink: LogSink,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            bind_address: BindAddress::Any,
            port: DEFAULT_PLAIN_PORT,
            html_root: PathBuf::from(DEFAULT_HTML_PATH),
            server_name: "nvhttpd".to_string(),
            pid_file: PathBuf::from(DEFAULT_PID_FILE),
            extra_headers: String::new(),
            tls: TlsConfig {
                enabled: false,
                certificate: None,
                key: None,
            },
            log_level: LogLevel::Info,
            log_sink: LogSink::Stderr,
        }
    }
}

/// Load and validate a `ServerConfig` from an INI file at `path`. Missing
/// sections and keys fall back to the documented defaults; an explicit
/// `port` key always wins over the TLS-dependent default.
pub fn load(path: &Path) -> Result<ServerConfig, ServerError> {
    let mut config = ServerConfig::default();

    let ini = Ini::load_from_file(path)
        .map_err(|e| ServerError::Config(format!("failed to read {path:?}: {e}")))?;

    if let Some(section) = ini.section(Some("SSL")) {
        let enabled = section
            .get("enabled")
            .map(|v| truthy(v))
            .unwrap_or(false);
        config.tls = TlsConfig {
            enabled,
            certificate: section.get("certificate").map(PathBuf::from),
            key: section.get("key").map(PathBuf::from),
        };
    }

    // Port default depends on whether TLS ended up enabled, so compute it
    // before reading an explicit override.
    config.port = if config.tls.enabled {
        DEFAULT_TLS_PORT
    } else {
        DEFAULT_PLAIN_PORT
    };

    if let Some(section) = ini.section(Some("server")) {
        if let Some(ip) = section.get("ip") {
            config.bind_address = BindAddress::parse(ip)?;
        }
        if let Some(port) = section.get("port") {
            config.port = port
                .parse()
                .map_err(|_| ServerError::Config(format!("invalid port {port:?}")))?;
        }
        if let Some(html_path) = section.get("html_path") {
            config.html_root = PathBuf::from(html_path);
        }
        if let Some(name) = section.get("name") {
            config.server_name = name.to_string();
        }
    }

    if let Some(section) = ini.section(Some("response-headers")) {
        let mut block = String::new();
        for (key, value) in section.iter() {
            block.push_str(key);
            block.push_str(": ");
            block.push_str(value);
            block.push_str("\r\n");
        }
        config.extra_headers = block;
    }

    if let Some(section) = ini.section(Some("logging")) {
        if let Some(file) = section.get("file") {
            config.log_sink = LogSink::File(PathBuf::from(file));
        }
        if let Some(level) = section.get("level") {
            config.log_level = LogLevel::parse(level)
                .ok_or_else(|| ServerError::Config(format!("invalid log level {level:?}")))?;
        }
        if let Some(pid) = section.get("pid") {
            config.pid_file = PathBuf::from(pid);
        }
    }

    if config.tls.enabled && (config.tls.certificate.is_none() || config.tls.key.is_none()) {
        return Err(ServerError::Config(
            "[SSL] enabled = true requires both certificate and key".to_string(),
        ));
    }

    Ok(config)
}

fn truthy(value: &str) -> bool {
    matches!(
        value.to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_ini(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn defaults_apply_when_sections_absent() {
        let file = write_ini("[server]\nname = test\n");
        let config = load(file.path()).unwrap();
        assert_eq!(config.port, DEFAULT_PLAIN_PORT);
        assert_eq!(config.bind_address, BindAddress::Any);
        assert_eq!(config.pid_file, PathBuf::from(DEFAULT_PID_FILE));
    }

    #[test]
    fn tls_enabled_without_credentials_errors() {
        let file = write_ini("[SSL]\nenabled = true\n");
        assert!(load(file.path()).is_err());
    }

    #[test]
    fn tls_enabled_defaults_port_to_443() {
        let file = write_ini(
            "[SSL]\nenabled = true\ncertificate = cert.pem\nkey = key.pem\n",
        );
        let config = load(file.path()).unwrap();
        assert_eq!(config.port, DEFAULT_TLS_PORT);
    }

    #[test]
    fn explicit_port_overrides_tls_default() {
        let file = write_ini(
            "[SSL]\nenabled = true\ncertificate = cert.pem\nkey = key.pem\n[server]\nport = 8443\n",
        );
        let config = load(file.path()).unwrap();
        assert_eq!(config.port, 8443);
    }

    #[test]
    fn response_headers_joined_with_crlf() {
        let file = write_ini("[response-headers]\nX-Frame-Options = DENY\n");
        let config = load(file.path()).unwrap();
        assert_eq!(config.extra_headers, "X-Frame-Options: DENY\r\n");
    }

    #[test]
    fn bind_address_literal_parses() {
        assert_eq!(
            BindAddress::parse("127.0.0.1").unwrap().to_ipv4(),
            std::net::Ipv4Addr::new(127, 0, 0, 1)
        );
        assert_eq!(
            BindAddress::parse("any").unwrap().to_ipv4(),
            std::net::Ipv4Addr::UNSPECIFIED
        );
        assert!(BindAddress::parse("not-an-ip").is_err());
    }
}
