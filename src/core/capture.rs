//! Capture-mode state machine
//!
//! Sits between client keystrokes and the backend. A backend that wants a
//! line of input arms the controller with a one-shot sender; the controller
//! collects bytes until a line terminator arrives and then resolves it.
//! The controller performs no I/O itself: every call returns a
//! [`CaptureOutcome`] describing what the interface must echo or do.

use std::sync::mpsc::SyncSender;

use tracing::debug;

use crate::error::{Result, VttyError};

/// Out-of-band interrupt byte (Ctrl-C)
pub const INTERRUPT: u8 = 0x03;

const BACKSPACE: u8 = 0x08;
const DELETE: u8 = 0x7f;

/// How inbound client bytes are interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CaptureMode {
    /// Drop everything
    #[default]
    Discard,
    /// Mirror bytes back to clients, `\r` becoming `\r\n`
    Echo,
    /// Buffer a line, echoing as the user types
    Input,
    /// Buffer a line without echoing what is typed
    Getpass,
}

impl CaptureMode {
    fn collects_line(self) -> bool {
        matches!(self, CaptureMode::Input | CaptureMode::Getpass)
    }
}

/// What a delivery to the controller produced
#[derive(Debug, Default, PartialEq, Eq)]
pub struct CaptureOutcome {
    /// Bytes to display on clients
    pub echo: Vec<u8>,
    /// A completed line, already handed to the waiting caller
    pub line: Option<String>,
    /// The interrupt byte was seen; the interface must shut down
    pub interrupt: bool,
}

pub type PendingLine = SyncSender<Result<String>>;

pub struct CaptureController {
    mode: CaptureMode,
    resting: CaptureMode,
    line_buffer: Vec<u8>,
    /// Second byte of a two-byte line terminator still to be swallowed
    swallow: Option<u8>,
    pending: Option<PendingLine>,
}

impl CaptureController {
    /// A controller idling in `resting` mode
    pub fn new(resting: CaptureMode) -> Self {
        let resting = if resting.collects_line() {
            CaptureMode::Discard
        } else {
            resting
        };
        Self {
            mode: resting,
            resting,
            line_buffer: Vec::new(),
            swallow: None,
            pending: None,
        }
    }

    pub fn mode(&self) -> CaptureMode {
        self.mode
    }

    pub fn line_buffer(&self) -> &[u8] {
        &self.line_buffer
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Switch to `mode` until the next line completes, resolving `pending`
    /// with it. Any request still outstanding is cancelled first.
    pub fn begin(&mut self, mode: CaptureMode, pending: PendingLine) {
        self.cancel();
        debug!("capture armed in {:?} mode", mode);
        self.mode = mode;
        self.pending = Some(pending);
    }

    /// Resolve an outstanding request with `InterruptedCapture`
    pub fn cancel(&mut self) {
        if let Some(pending) = self.pending.take() {
            let _ = pending.try_send(Err(VttyError::InterruptedCapture));
        }
        self.line_buffer.clear();
        self.mode = self.resting;
    }

    /// Interpret bytes arriving from a client
    pub fn feed(&mut self, bytes: &[u8]) -> CaptureOutcome {
        let mut outcome = CaptureOutcome::default();
        for &byte in bytes {
            if byte == INTERRUPT {
                outcome.interrupt = true;
                break;
            }
            if self.swallow.take() == Some(byte) {
                continue;
            }
            match self.mode {
                CaptureMode::Discard => {}
                CaptureMode::Echo => self.echo(byte, &mut outcome),
                CaptureMode::Input => self.collect(byte, true, &mut outcome),
                CaptureMode::Getpass => self.collect(byte, false, &mut outcome),
            }
        }
        outcome
    }

    fn echo(&mut self, byte: u8, outcome: &mut CaptureOutcome) {
        match byte {
            b'\r' => {
                outcome.echo.extend_from_slice(b"\r\n");
                self.swallow = Some(b'\n');
            }
            _ => outcome.echo.push(byte),
        }
    }

    fn collect(&mut self, byte: u8, visible: bool, outcome: &mut CaptureOutcome) {
        match byte {
            b'\r' | b'\n' => {
                self.swallow = Some(if byte == b'\r' { b'\n' } else { b'\r' });
                outcome.echo.extend_from_slice(b"\r\n");
                let line = String::from_utf8_lossy(&self.line_buffer).into_owned();
                self.line_buffer.clear();
                self.mode = self.resting;
                if let Some(pending) = self.pending.take() {
                    let _ = pending.try_send(Ok(line.clone()));
                }
                outcome.line = Some(line);
            }
            BACKSPACE | DELETE => {
                if self.pop_char() && visible {
                    outcome.echo.extend_from_slice(b"\x08 \x08");
                }
            }
            _ => {
                self.line_buffer.push(byte);
                if visible {
                    outcome.echo.push(byte);
                }
            }
        }
    }

    /// Drop the last complete UTF-8 character from the line buffer
    fn pop_char(&mut self) -> bool {
        let Some(mut idx) = self.line_buffer.len().checked_sub(1) else {
            return false;
        };
        while idx > 0 && (self.line_buffer[idx] & 0xC0) == 0x80 {
            idx -= 1;
        }
        self.line_buffer.truncate(idx);
        true
    }
}

impl Drop for CaptureController {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    fn armed(mode: CaptureMode) -> (CaptureController, mpsc::Receiver<Result<String>>) {
        let mut ctl = CaptureController::new(CaptureMode::Discard);
        let (tx, rx) = mpsc::sync_channel(1);
        ctl.begin(mode, tx);
        (ctl, rx)
    }

    #[test]
    fn test_input_resolves_line() {
        let (mut ctl, rx) = armed(CaptureMode::Input);
        let outcome = ctl.feed(b"abc\r");

        assert_eq!(outcome.line.as_deref(), Some("abc"));
        assert_eq!(outcome.echo, b"abc\r\n");
        assert!(ctl.line_buffer().is_empty());
        assert_eq!(ctl.mode(), CaptureMode::Discard);
        assert_eq!(rx.try_recv().ok().and_then(|r| r.ok()).as_deref(), Some("abc"));
    }

    #[test]
    fn test_getpass_does_not_echo() {
        let (mut ctl, rx) = armed(CaptureMode::Getpass);
        let outcome = ctl.feed(b"s3cret\n");
        assert_eq!(outcome.echo, b"\r\n");
        assert_eq!(outcome.line.as_deref(), Some("s3cret"));
        assert!(rx.try_recv().is_ok());
    }

    #[test]
    fn test_split_crlf_completes_one_line() {
        let (mut ctl, rx) = armed(CaptureMode::Input);
        ctl.feed(b"one\r");
        assert!(rx.try_recv().is_ok());

        let (tx, rx) = mpsc::sync_channel(1);
        ctl.begin(CaptureMode::Input, tx);
        let outcome = ctl.feed(b"\ntwo\n");
        assert_eq!(outcome.line.as_deref(), Some("two"));
        assert_eq!(rx.try_recv().ok().and_then(|r| r.ok()).as_deref(), Some("two"));
    }

    #[test]
    fn test_backspace_edits_buffer() {
        let (mut ctl, _rx) = armed(CaptureMode::Input);
        let outcome = ctl.feed("ab\x7fé\x08c".as_bytes());
        assert_eq!(ctl.line_buffer(), b"ac");
        assert_eq!(outcome.echo, "ab\x08 \x08é\x08 \x08c".as_bytes());

        let outcome = ctl.feed(b"\x08\x08\x08");
        assert!(ctl.line_buffer().is_empty());
        assert_eq!(outcome.echo, b"\x08 \x08\x08 \x08");
    }

    #[test]
    fn test_echo_mode_normalises_cr() {
        let mut ctl = CaptureController::new(CaptureMode::Echo);
        assert_eq!(ctl.feed(b"hi\r").echo, b"hi\r\n");
        assert_eq!(ctl.feed(b"\nx").echo, b"x");
        assert_eq!(ctl.feed(b"\n").echo, b"\n");
    }

    #[test]
    fn test_discard_drops_everything() {
        let mut ctl = CaptureController::new(CaptureMode::Discard);
        assert_eq!(ctl.feed(b"whatever\r\n"), CaptureOutcome::default());
    }

    #[test]
    fn test_interrupt_in_any_mode() {
        for mode in [CaptureMode::Discard, CaptureMode::Echo] {
            let mut ctl = CaptureController::new(mode);
            assert!(ctl.feed(b"a\x03b").interrupt);
        }
        let (mut ctl, _rx) = armed(CaptureMode::Getpass);
        assert!(ctl.feed(b"\x03").interrupt);
    }

    #[test]
    fn test_cancel_fails_pending() {
        let (mut ctl, rx) = armed(CaptureMode::Input);
        ctl.feed(b"partial");
        ctl.cancel();
        assert!(matches!(rx.try_recv(), Ok(Err(VttyError::InterruptedCapture))));
        assert!(ctl.line_buffer().is_empty());
        assert!(!ctl.is_pending());
    }
}
