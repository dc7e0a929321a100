//! The local console as a vtty client
//!
//! Output is written straight to stdout; the host terminal does the
//! rendering. Key events are encoded as the VT input sequences a shell on
//! the other side expects.

use std::io::{self, Stdout, Write};
use std::sync::Mutex;

use bitflags::bitflags;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use vtty::{Client, Geometry, Result, TerminalModes};

pub struct ConsoleClient {
    out: Mutex<Stdout>,
}

impl ConsoleClient {
    pub fn new() -> Self {
        Self {
            out: Mutex::new(io::stdout()),
        }
    }
}

impl Client for ConsoleClient {
    fn write(&self, data: &[u8]) -> Result<()> {
        let mut out = self.out.lock().unwrap_or_else(|e| e.into_inner());
        out.write_all(data)?;
        out.flush()?;
        Ok(())
    }

    fn geometry_changed(&self, geometry: Geometry) {
        tracing::debug!("console now shares a {} screen", geometry);
    }
}

bitflags! {
    #[derive(Clone, Copy, Debug, Default, PartialEq)]
    pub struct Modifiers: u8 {
        const SHIFT = 0b0001;
        const ALT   = 0b0010;
        const CTRL  = 0b0100;
    }
}

impl From<KeyModifiers> for Modifiers {
    fn from(mods: KeyModifiers) -> Self {
        let mut result = Modifiers::empty();
        result.set(Modifiers::SHIFT, mods.contains(KeyModifiers::SHIFT));
        result.set(Modifiers::ALT, mods.contains(KeyModifiers::ALT));
        result.set(Modifiers::CTRL, mods.contains(KeyModifiers::CONTROL));
        result
    }
}

impl Modifiers {
    /// xterm modifier parameter: 1 + shift + 2·alt + 4·ctrl
    fn param(self) -> u8 {
        1 + self.bits()
    }
}

/// Bytes a key press sends toward the backend
pub fn encode_key(event: &KeyEvent, modes: &TerminalModes) -> Option<Vec<u8>> {
    let mods = Modifiers::from(event.modifiers);
    let bytes = match event.code {
        KeyCode::Char(ch) => encode_char(ch, mods),
        KeyCode::Enter if modes.linefeed_newline => b"\r\n".to_vec(),
        KeyCode::Enter => b"\r".to_vec(),
        KeyCode::Backspace if mods.contains(Modifiers::ALT) => b"\x1b\x7f".to_vec(),
        KeyCode::Backspace => b"\x7f".to_vec(),
        KeyCode::Tab => b"\t".to_vec(),
        KeyCode::BackTab => b"\x1b[Z".to_vec(),
        KeyCode::Esc => b"\x1b".to_vec(),
        KeyCode::Up => cursor_key(b'A', mods, modes),
        KeyCode::Down => cursor_key(b'B', mods, modes),
        KeyCode::Right => cursor_key(b'C', mods, modes),
        KeyCode::Left => cursor_key(b'D', mods, modes),
        KeyCode::Home => cursor_key(b'H', mods, modes),
        KeyCode::End => cursor_key(b'F', mods, modes),
        KeyCode::Insert => tilde_key(2, mods),
        KeyCode::Delete => tilde_key(3, mods),
        KeyCode::PageUp => tilde_key(5, mods),
        KeyCode::PageDown => tilde_key(6, mods),
        KeyCode::F(n) => function_key(n, mods)?,
        _ => return None,
    };
    Some(bytes)
}

fn encode_char(ch: char, mods: Modifiers) -> Vec<u8> {
    let ctrl = mods.contains(Modifiers::CTRL);
    let alt = mods.contains(Modifiers::ALT);

    let base = if ctrl {
        match ch {
            'a'..='z' | 'A'..='Z' => vec![(ch.to_ascii_lowercase() as u8) - b'a' + 1],
            '@' | '`' | ' ' | '2' => vec![0x00],
            '[' | '3' => vec![0x1b],
            '\\' | '4' => vec![0x1c],
            ']' | '5' => vec![0x1d],
            '^' | '~' | '6' => vec![0x1e],
            '_' | '?' | '7' => vec![0x1f],
            _ => ch.to_string().into_bytes(),
        }
    } else {
        ch.to_string().into_bytes()
    };

    if alt {
        let mut bytes = vec![0x1b];
        bytes.extend(base);
        bytes
    } else {
        base
    }
}

fn cursor_key(key: u8, mods: Modifiers, modes: &TerminalModes) -> Vec<u8> {
    if !mods.is_empty() {
        format!("\x1b[1;{}{}", mods.param(), key as char).into_bytes()
    } else if modes.application_cursor {
        vec![0x1b, b'O', key]
    } else {
        vec![0x1b, b'[', key]
    }
}

fn tilde_key(code: u8, mods: Modifiers) -> Vec<u8> {
    if mods.is_empty() {
        format!("\x1b[{}~", code).into_bytes()
    } else {
        format!("\x1b[{};{}~", code, mods.param()).into_bytes()
    }
}

fn function_key(n: u8, mods: Modifiers) -> Option<Vec<u8>> {
    let (code, ss3) = match n {
        1 => (b'P', true),
        2 => (b'Q', true),
        3 => (b'R', true),
        4 => (b'S', true),
        5 => (15, false),
        6 => (17, false),
        7 => (18, false),
        8 => (19, false),
        9 => (20, false),
        10 => (21, false),
        11 => (23, false),
        12 => (24, false),
        _ => return None,
    };
    let bytes = match (ss3, mods.is_empty()) {
        (true, true) => vec![0x1b, b'O', code],
        (true, false) => format!("\x1b[1;{}{}", mods.param(), code as char).into_bytes(),
        (false, _) => tilde_key(code, mods),
    };
    Some(bytes)
}
