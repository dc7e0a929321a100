//! Closure-driven backend
//!
//! The closure runs on its own thread and talks to the user through a
//! [`FunctionContext`], whose `input`/`getpass` block that thread until a
//! client completes a line.
//!
//! ```no_run
//! use vtty::backend::function;
//! use vtty::{Callbacks, ConfigPatch};
//!
//! let iface = function::spawn(
//!     |ctx| {
//!         let name = ctx.input("Name: ")?;
//!         ctx.print(&format!("Hello, {}!\n", name))
//!     },
//!     &ConfigPatch::default(),
//!     Callbacks::new(),
//! )?;
//! # Ok::<(), vtty::VttyError>(())
//! ```

use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use tracing::{debug, info, warn};

use crate::config::{ConfigPatch, InterfaceConfig};
use crate::core::capture::CaptureMode;
use crate::core::interface::{lock, Backend, Callbacks, Interface, InterfaceHandle};
use crate::error::Result;
use crate::uri::ParsedUri;

use super::BackendFactory;

pub type Function = Arc<dyn Fn(&FunctionContext) -> Result<()> + Send + Sync>;

/// What the closure sees of its interface
pub struct FunctionContext {
    iface: InterfaceHandle,
}

impl FunctionContext {
    /// Show `text`, `\n` becoming `\r\n`
    pub fn print(&self, text: &str) -> Result<()> {
        self.iface.print(text)
    }

    pub fn input(&self, prompt: &str) -> Result<String> {
        self.iface.input(prompt)
    }

    pub fn getpass(&self, prompt: &str) -> Result<String> {
        self.iface.getpass(prompt)
    }

    pub fn set_title(&self, title: &str) -> Result<()> {
        self.iface.upgrade()?.set_title(title);
        Ok(())
    }

    pub fn is_shutdown(&self) -> bool {
        self.iface.is_shutdown()
    }

    pub fn shutdown(&self) {
        self.iface.shutdown();
    }
}

pub struct FunctionBackend {
    function: Function,
    mode: CaptureMode,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl FunctionBackend {
    pub fn new(function: Function) -> Self {
        Self {
            function,
            mode: CaptureMode::Discard,
            worker: Mutex::new(None),
        }
    }

    /// Capture mode used while the closure is not waiting for a line
    pub fn with_idle_mode(mut self, mode: CaptureMode) -> Self {
        self.mode = mode;
        self
    }
}

impl Backend for FunctionBackend {
    fn capture_mode(&self) -> Option<CaptureMode> {
        Some(self.mode)
    }

    fn start_interface(&self, _iface: &InterfaceHandle) -> Result<()> {
        Ok(())
    }

    fn after_start(&self, iface: &InterfaceHandle) -> Result<()> {
        let function = Arc::clone(&self.function);
        let ctx = FunctionContext { iface: iface.clone() };
        let worker = thread::Builder::new()
            .name("vtty-function".into())
            .spawn(move || {
                let outcome = panic::catch_unwind(AssertUnwindSafe(|| function(&ctx)));
                match outcome {
                    Ok(Ok(())) => info!("function finished"),
                    Ok(Err(e)) if e.is_shutdown() => debug!("function stopped: {}", e),
                    Ok(Err(e)) => {
                        warn!("function failed: {}", e);
                        ctx.shutdown();
                    }
                    Err(_) => {
                        warn!("function panicked");
                        ctx.shutdown();
                    }
                }
            })?;
        *lock(&self.worker) = Some(worker);
        Ok(())
    }

    fn shutdown_interface(&self) -> Result<()> {
        // The worker unblocks on its own once pending captures are cancelled
        lock(&self.worker).take();
        Ok(())
    }

    fn receive(&self, _data: &[u8]) -> Result<()> {
        Ok(())
    }
}

/// Registers a closure under a scheme: every interface created from it
/// runs the closure afresh
#[derive(Clone)]
pub struct FunctionFactory {
    function: Function,
}

impl FunctionFactory {
    pub fn new<F>(function: F) -> Self
    where
        F: Fn(&FunctionContext) -> Result<()> + Send + Sync + 'static,
    {
        Self {
            function: Arc::new(function),
        }
    }
}

impl BackendFactory for FunctionFactory {
    fn create(&self, _uri: &ParsedUri, _config: &InterfaceConfig) -> Result<Box<dyn Backend>> {
        Ok(Box::new(FunctionBackend::new(Arc::clone(&self.function))))
    }
}

/// Create and start an interface running `function`
pub fn spawn<F>(function: F, overrides: &ConfigPatch, callbacks: Callbacks) -> Result<Arc<Interface>>
where
    F: Fn(&FunctionContext) -> Result<()> + Send + Sync + 'static,
{
    let uri = ParsedUri::parse("function://")?;
    let config = InterfaceConfig::resolve(&ConfigPatch::default(), &uri, overrides)?;
    let backend = FunctionBackend::new(Arc::new(function));
    let iface = Interface::new(uri, config, Box::new(backend), callbacks)?;
    iface.start()?;
    Ok(iface)
}
