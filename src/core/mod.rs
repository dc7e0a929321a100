//! Core engine components.
//!
//! - **term**: screen model and VT escape interpreter
//! - **capture**: capture-mode state machine behind `input`/`getpass`
//! - **geometry**: client table and size negotiation
//! - **interface**: lifecycle, observers and byte routing
//!
//! # Architecture
//!
//! ```text
//! Interface
//! ├── Terminal
//! │   ├── ScreenState (cell grid, cursor, scroll-back)
//! │   └── VtParser    (ANSI escape sequences)
//! ├── CaptureController
//! └── ClientTable     (geometry per client)
//! ```

pub mod capture;
pub mod geometry;
pub mod interface;
pub mod term;
