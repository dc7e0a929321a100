//! Raw TCP backend (`tcp://host:port`)
//!
//! A reader thread forwards socket bytes to the interface until the peer
//! closes. Typed bytes go to the socket with `\r` expanded to `\r\n`, and
//! are shown locally unless `local_echo=0` is given.

use std::io::{self, ErrorKind, Read, Write};
use std::net::{Shutdown, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;

use tracing::{debug, info, warn};

use crate::config::{ConfigPatch, InterfaceConfig};
use crate::core::interface::{lock, Backend, InterfaceHandle};
use crate::error::{Result, VttyError};
use crate::uri::ParsedUri;

use super::BackendFactory;

pub struct TcpBackend {
    addr: String,
    local_echo: bool,
    stream: Mutex<Option<TcpStream>>,
    iface: Mutex<Option<InterfaceHandle>>,
    running: Arc<AtomicBool>,
}

impl TcpBackend {
    pub fn new(addr: impl Into<String>, local_echo: bool) -> Self {
        Self {
            addr: addr.into(),
            local_echo,
            stream: Mutex::new(None),
            iface: Mutex::new(None),
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }
}

impl Backend for TcpBackend {
    fn start_interface(&self, iface: &InterfaceHandle) -> Result<()> {
        let stream = connect(&self.addr)?;
        *lock(&self.stream) = Some(stream);
        *lock(&self.iface) = Some(iface.clone());
        Ok(())
    }

    fn after_start(&self, iface: &InterfaceHandle) -> Result<()> {
        let mut stream = match lock(&self.stream).as_ref() {
            Some(stream) => stream.try_clone()?,
            None => return Err(VttyError::Backend("not connected".into())),
        };
        self.running.store(true, Ordering::SeqCst);
        spawn_reader(
            "vtty-tcp-reader",
            self.addr.clone(),
            iface.clone(),
            Arc::clone(&self.running),
            move |buf| stream.read(buf),
        )?;
        Ok(())
    }

    fn shutdown_interface(&self) -> Result<()> {
        self.running.store(false, Ordering::SeqCst);
        lock(&self.iface).take();

        // Unblocks the reader, which then exits on its own
        if let Some(stream) = lock(&self.stream).take() {
            close_socket(&stream)?;
        }
        Ok(())
    }

    fn receive(&self, data: &[u8]) -> Result<()> {
        let out = expand_cr(data);
        {
            let mut guard = lock(&self.stream);
            let stream = guard.as_mut().ok_or(VttyError::NotStarted)?;
            stream.write_all(&out)?;
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

pub struct TcpFactory;

impl BackendFactory for TcpFactory {
    fn defaults(&self) -> ConfigPatch {
        ConfigPatch::default().with_convert_eol(true)
    }

    fn create(&self, uri: &ParsedUri, config: &InterfaceConfig) -> Result<Box<dyn Backend>> {
        let addr = socket_addr(uri)?;
        Ok(Box::new(TcpBackend::new(addr, config.extra_flag("local_echo", true))))
    }
}

/// `host:port` from the URI; both are required
pub(crate) fn socket_addr(uri: &ParsedUri) -> Result<String> {
    if uri.host.is_empty() {
        return Err(VttyError::malformed(&uri.raw, format!("{} needs a host", uri.scheme)));
    }
    let port = uri
        .port
        .ok_or_else(|| VttyError::malformed(&uri.raw, format!("{} needs a port", uri.scheme)))?;
    Ok(if uri.host.contains(':') {
        format!("[{}]:{}", uri.host, port)
    } else {
        format!("{}:{}", uri.host, port)
    })
}

pub(crate) fn connect(addr: &str) -> Result<TcpStream> {
    let stream = TcpStream::connect(addr)
        .map_err(|e| VttyError::Backend(format!("connect to {} failed: {}", addr, e)))?;
    let _ = stream.set_nodelay(true);
    info!("connected to {}", addr);
    Ok(stream)
}

pub(crate) fn close_socket(stream: &TcpStream) -> Result<()> {
    match stream.shutdown(Shutdown::Both) {
        Err(e) if e.kind() != ErrorKind::NotConnected => Err(e.into()),
        _ => Ok(()),
    }
}

/// `\r` becomes `\r\n` on the way to the peer
pub(crate) fn expand_cr(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len() + 1);
    for &byte in data {
        out.push(byte);
        if byte == b'\r' {
            out.push(b'\n');
        }
    }
    out
}

/// Forward whatever `read` yields to the interface until EOF, an error or
/// `running` is cleared; then shut the interface down. Timeouts are polls.
pub(crate) fn spawn_reader<F>(
    name: &str,
    addr: String,
    iface: InterfaceHandle,
    running: Arc<AtomicBool>,
    mut read: F,
) -> io::Result<()>
where
    F: FnMut(&mut [u8]) -> io::Result<usize> + Send + 'static,
{
    thread::Builder::new().name(name.into()).spawn(move || {
        let mut buffer = vec![0u8; 4096];
        while running.load(Ordering::SeqCst) {
            match read(&mut buffer) {
                Ok(0) => {
                    if running.load(Ordering::SeqCst) {
                        info!("{} closed the connection", addr);
                    }
                    break;
                }
                Ok(n) => {
                    if let Err(e) = iface.deliver_to_clients(&buffer[..n]) {
                        debug!("reader for {} stopping: {}", addr, e);
                        break;
                    }
                }
                Err(e)
                    if matches!(
                        e.kind(),
                        ErrorKind::Interrupted | ErrorKind::WouldBlock | ErrorKind::TimedOut
                    ) =>
                {
                    continue
                }
                Err(e) => {
                    if running.load(Ordering::SeqCst) {
                        warn!("read from {} failed: {}", addr, e);
                    }
                    break;
                }
            }
        }
        running.store(false, Ordering::SeqCst);
        iface.shutdown();
    })?;
    Ok(())
}
