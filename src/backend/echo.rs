use tracing::debug;

use crate::config::{ConfigPatch, InterfaceConfig};
use crate::core::capture::CaptureMode;
use crate::core::interface::{Backend, InterfaceHandle};
use crate::error::Result;
use crate::uri::ParsedUri;

use super::BackendFactory;

/// Shows whatever the user types; the capture controller does the echoing
pub struct EchoBackend;

impl Backend for EchoBackend {
    fn capture_mode(&self) -> Option<CaptureMode> {
        Some(CaptureMode::Echo)
    }

    fn start_interface(&self, _iface: &InterfaceHandle) -> Result<()> {
        debug!("echo backend started");
        Ok(())
    }

    fn shutdown_interface(&self) -> Result<()> {
        Ok(())
    }

    fn receive(&self, _data: &[u8]) -> Result<()> {
        Ok(())
    }
}

pub struct EchoFactory;

impl BackendFactory for EchoFactory {
    fn defaults(&self) -> ConfigPatch {
        ConfigPatch::default().with_convert_eol(true)
    }

    fn create(&self, _uri: &ParsedUri, _config: &InterfaceConfig) -> Result<Box<dyn Backend>> {
        Ok(Box::new(EchoBackend))
    }
}
