//! Helpers shared by the integration tests

#![allow(dead_code)]

use std::sync::Mutex;
use std::thread;
use std::time::{Duration, Instant};

use vtty::{Client, Geometry, Result, VttyError};

/// A client that records everything it is sent
#[derive(Default)]
pub struct Recorder {
    output: Mutex<Vec<u8>>,
    geometries: Mutex<Vec<Geometry>>,
    broken: Mutex<bool>,
}

impl Recorder {
    pub fn bytes(&self) -> Vec<u8> {
        self.output.lock().unwrap().clone()
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.bytes()).into_owned()
    }

    pub fn geometries(&self) -> Vec<Geometry> {
        self.geometries.lock().unwrap().clone()
    }

    pub fn break_pipe(&self) {
        *self.broken.lock().unwrap() = true;
    }
}

impl Client for Recorder {
    fn write(&self, data: &[u8]) -> Result<()> {
        if *self.broken.lock().unwrap() {
            return Err(VttyError::Client("pipe closed".into()));
        }
        self.output.lock().unwrap().extend_from_slice(data);
        Ok(())
    }

    fn geometry_changed(&self, geometry: Geometry) {
        self.geometries.lock().unwrap().push(geometry);
    }
}

/// Poll `cond` until it holds, failing the test after five seconds
pub fn wait_until(what: &str, mut cond: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !cond() {
        assert!(Instant::now() < deadline, "timed out waiting for {}", what);
        thread::sleep(Duration::from_millis(5));
    }
}
