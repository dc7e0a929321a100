//! Built-in backends and the process-wide backend registry.
//!
//! - **echo**: mirrors typed input back to the display
//! - **tcp**: a raw TCP connection
//! - **ssl**: a TLS connection (`tls` feature)
//! - **function**: a Rust closure driving print/input/getpass
//!
//! `function` is not registered under a scheme by default; wrap a closure
//! in [`FunctionFactory`] and register it under a name of your choosing, or
//! use [`function::spawn`] directly.

pub mod echo;
pub mod function;
#[cfg(feature = "tls")]
pub mod ssl;
pub mod tcp;

use std::sync::{Arc, OnceLock};

pub use echo::EchoBackend;
pub use function::{FunctionBackend, FunctionContext, FunctionFactory};
#[cfg(feature = "tls")]
pub use ssl::SslBackend;
pub use tcp::TcpBackend;

use crate::config::{ConfigPatch, InterfaceConfig};
use crate::core::interface::Backend;
use crate::error::Result;
use crate::registry::Registry;
use crate::uri::ParsedUri;

/// Builds the backend for one interface
pub trait BackendFactory: Send + Sync {
    /// Settings layered between the built-in defaults and the URI
    fn defaults(&self) -> ConfigPatch {
        ConfigPatch::default()
    }

    fn create(&self, uri: &ParsedUri, config: &InterfaceConfig) -> Result<Box<dyn Backend>>;
}

impl<F> BackendFactory for F
where
    F: Fn(&ParsedUri, &InterfaceConfig) -> Result<Box<dyn Backend>> + Send + Sync,
{
    fn create(&self, uri: &ParsedUri, config: &InterfaceConfig) -> Result<Box<dyn Backend>> {
        self(uri, config)
    }
}

pub type BackendHandler = Arc<dyn BackendFactory>;

/// Process-wide backend registry, preloaded with `echo`, `tcp` and, with
/// the `tls` feature, `ssl`
pub fn registry() -> &'static Registry<BackendHandler> {
    static BACKENDS: OnceLock<Registry<BackendHandler>> = OnceLock::new();
    BACKENDS.get_or_init(|| {
        let registry = Registry::new("backend");
        registry.register("echo", Arc::new(echo::EchoFactory) as BackendHandler);
        registry.register("tcp", Arc::new(tcp::TcpFactory) as BackendHandler);
        #[cfg(feature = "tls")]
        registry.register("ssl", Arc::new(ssl::SslFactory) as BackendHandler);
        registry
    })
}
