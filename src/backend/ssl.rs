//! TLS backend (`ssl://host:port`), built with the `tls` feature
//!
//! Same session model as `tcp://`, over an OpenSSL client stream. The peer
//! certificate is verified against the system roots, or against `ca_file`
//! when given; `verify=0` turns verification off.
//!
//! One TLS stream serves both directions, so the reader polls it with a
//! short socket timeout and releases the lock between polls.

use std::io::{Read, Write};
use std::net::TcpStream;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use openssl::error::ErrorStack;
use openssl::ssl::{SslConnector, SslMethod, SslStream, SslVerifyMode};
use tracing::{debug, info};

use crate::config::{ConfigPatch, InterfaceConfig};
use crate::core::interface::{lock, Backend, InterfaceHandle};
use crate::error::{Result, VttyError};
use crate::uri::ParsedUri;

use super::tcp::{close_socket, connect, expand_cr, socket_addr, spawn_reader};
use super::BackendFactory;

const READ_POLL: Duration = Duration::from_millis(50);

type SharedStream = Arc<Mutex<Option<SslStream<TcpStream>>>>;

pub struct SslBackend {
    addr: String,
    domain: String,
    verify: bool,
    ca_file: Option<PathBuf>,
    local_echo: bool,
    stream: SharedStream,
    /// Plain handle on the same socket, for unblocking the reader
    socket: Mutex<Option<TcpStream>>,
    iface: Mutex<Option<InterfaceHandle>>,
    running: Arc<AtomicBool>,
}

impl SslBackend {
    pub fn new(addr: impl Into<String>, domain: impl Into<String>, local_echo: bool) -> Self {
        Self {
            addr: addr.into(),
            domain: domain.into(),
            verify: true,
            ca_file: None,
            local_echo,
            stream: Arc::new(Mutex::new(None)),
            socket: Mutex::new(None),
            iface: Mutex::new(None),
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Trust the PEM certificates in `path` instead of the system roots
    pub fn with_ca_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.ca_file = Some(path.into());
        self
    }

    pub fn with_verify(mut self, verify: bool) -> Self {
        self.verify = verify;
        self
    }

    fn connector(&self) -> Result<SslConnector> {
        let mut builder = SslConnector::builder(SslMethod::tls()).map_err(tls_error)?;
        if let Some(ca_file) = &self.ca_file {
            builder.set_ca_file(ca_file).map_err(tls_error)?;
        }
        if !self.verify {
            builder.set_verify(SslVerifyMode::NONE);
        }
        Ok(builder.build())
    }
}

impl Backend for SslBackend {
    fn start_interface(&self, iface: &InterfaceHandle) -> Result<()> {
        let tcp = connect(&self.addr)?;
        let socket = tcp.try_clone()?;

        let mut config = self.connector()?.configure().map_err(tls_error)?;
        config.set_verify_hostname(self.verify);
        let tls = config.connect(&self.domain, tcp).map_err(|e| {
            VttyError::Backend(format!("TLS handshake with {} failed: {}", self.addr, e))
        })?;
        tls.get_ref().set_read_timeout(Some(READ_POLL))?;
        info!("TLS session with {} established", self.addr);

        *lock(&self.stream) = Some(tls);
        *lock(&self.socket) = Some(socket);
        *lock(&self.iface) = Some(iface.clone());
        Ok(())
    }

    fn after_start(&self, iface: &InterfaceHandle) -> Result<()> {
        self.running.store(true, Ordering::SeqCst);
        let stream = Arc::clone(&self.stream);
        spawn_reader(
            "vtty-ssl-reader",
            self.addr.clone(),
            iface.clone(),
            Arc::clone(&self.running),
            move |buf| match lock(&stream).as_mut() {
                Some(tls) => tls.read(buf),
                None => Ok(0),
            },
        )?;
        Ok(())
    }

    fn shutdown_interface(&self) -> Result<()> {
        self.running.store(false, Ordering::SeqCst);
        lock(&self.iface).take();

        if let Some(mut tls) = lock(&self.stream).take() {
            if let Err(e) = tls.shutdown() {
                debug!("close_notify to {} failed: {}", self.addr, e);
            }
        }
        if let Some(socket) = lock(&self.socket).take() {
            close_socket(&socket)?;
        }
        Ok(())
    }

    fn receive(&self, data: &[u8]) -> Result<()> {
        let out = expand_cr(data);
        {
            let mut guard = lock(&self.stream);
            let tls = guard.as_mut().ok_or(VttyError::NotStarted)?;
            tls.write_all(&out)?;
            tls.flush()?;
        }

        if self.local_echo {
            let iface = lock(&self.iface).clone();
            if let Some(iface) = iface {
                iface.deliver_to_clients(&out)?;
            }
        }
        Ok(())
    }
}

pub struct SslFactory;

impl BackendFactory for SslFactory {
    fn defaults(&self) -> ConfigPatch {
        ConfigPatch::default().with_convert_eol(true)
    }

    fn create(&self, uri: &ParsedUri, config: &InterfaceConfig) -> Result<Box<dyn Backend>> {
        let addr = socket_addr(uri)?;
        let mut backend = SslBackend::new(addr, uri.host.clone(), config.extra_flag("local_echo", true))
            .with_verify(config.extra_flag("verify", true));
        if let Some(ca_file) = config.extra.get("ca_file") {
            backend = backend.with_ca_file(ca_file);
        }
        Ok(Box::new(backend))
    }
}

fn tls_error(e: ErrorStack) -> VttyError {
    VttyError::Backend(format!("TLS setup failed: {}", e))
}
