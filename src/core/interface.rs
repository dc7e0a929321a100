//! The Interface: one virtual TTY shared by a backend and its clients.
//!
//! Bytes from the backend go through [`Interface::deliver_to_clients`],
//! which feeds the shared screen, records scroll-back and fans the output
//! out to every attached client. Bytes from clients go through
//! [`Interface::deliver_to_backend`], which either hands them to the
//! capture controller or pushes them straight to the backend.
//!
//! # Locking
//!
//! ```text
//! Interface
//! ├── state     Mutex<InterfaceState>   lifecycle, forward only
//! ├── screen    Mutex<Screen>           terminal, buffer, clients, title
//! ├── capture   Mutex<CaptureController>
//! └── observers RwLock<Callbacks>
//! ```
//!
//! No lock is held while observers run, so an observer may call back into
//! the interface. Client `write` is called with the screen lock held and
//! must not re-enter.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc, Condvar, Mutex, MutexGuard, PoisonError, RwLock, Weak};
use std::thread::{self, ThreadId};

use tracing::{debug, info, warn};

use crate::buffer::{self, ScrollbackBuffer};
use crate::config::InterfaceConfig;
use crate::core::capture::{CaptureController, CaptureMode};
use crate::core::geometry::{ClientId, ClientTable, Geometry};
use crate::core::term::{TermEvent, Terminal, TerminalModes};
use crate::error::{Result, VttyError};
use crate::uri::ParsedUri;

/// Display endpoint attached to an interface
pub trait Client: Send + Sync {
    /// Show `data`; an error marks the client dead and detaches it
    fn write(&self, data: &[u8]) -> Result<()>;

    /// The shared geometry changed
    fn geometry_changed(&self, _geometry: Geometry) {}
}

/// Data source/sink driving an interface
pub trait Backend: Send + Sync {
    /// Capture mode the interface idles in, or `None` to pass client bytes
    /// straight to [`Backend::receive`]
    fn capture_mode(&self) -> Option<CaptureMode> {
        None
    }

    /// Acquire resources; an error leaves the interface `Initialized`
    fn start_interface(&self, iface: &InterfaceHandle) -> Result<()>;

    /// Runs once the interface is `Started`; spawn workers here
    fn after_start(&self, _iface: &InterfaceHandle) -> Result<()> {
        Ok(())
    }

    /// Release resources; errors are logged, never propagated
    fn shutdown_interface(&self) -> Result<()>;

    /// Bytes travelling toward the backend
    fn receive(&self, data: &[u8]) -> Result<()>;

    fn geometry_changed(&self, _geometry: Geometry) {}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterfaceState {
    Initialized,
    Started,
    Shutdown,
}

pub type DataObserver = Arc<dyn Fn(&Interface, &[u8]) -> Result<()> + Send + Sync>;
pub type ShutdownObserver = Arc<dyn Fn(&Interface) -> Result<()> + Send + Sync>;
pub type TitleObserver = Arc<dyn Fn(&Interface, &str) -> Result<()> + Send + Sync>;

/// Observer lists, each invoked in registration order
#[derive(Clone, Default)]
pub struct Callbacks {
    pub on_deliver_to_clients: Vec<DataObserver>,
    pub on_deliver_to_backend: Vec<DataObserver>,
    pub on_shutdown: Vec<ShutdownObserver>,
    pub on_title_change: Vec<TitleObserver>,
}

impl Callbacks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_deliver_to_clients<F>(mut self, f: F) -> Self
    where
        F: Fn(&Interface, &[u8]) -> Result<()> + Send + Sync + 'static,
    {
        self.on_deliver_to_clients.push(Arc::new(f));
        self
    }

    pub fn on_deliver_to_backend<F>(mut self, f: F) -> Self
    where
        F: Fn(&Interface, &[u8]) -> Result<()> + Send + Sync + 'static,
    {
        self.on_deliver_to_backend.push(Arc::new(f));
        self
    }

    pub fn on_shutdown<F>(mut self, f: F) -> Self
    where
        F: Fn(&Interface) -> Result<()> + Send + Sync + 'static,
    {
        self.on_shutdown.push(Arc::new(f));
        self
    }

    pub fn on_title_change<F>(mut self, f: F) -> Self
    where
        F: Fn(&Interface, &str) -> Result<()> + Send + Sync + 'static,
    {
        self.on_title_change.push(Arc::new(f));
        self
    }
}

struct Screen {
    term: Terminal,
    buffer: Box<dyn ScrollbackBuffer>,
    clients: ClientTable,
    geometry: Geometry,
    title: String,
    /// Last byte sent to clients was `\r`
    after_cr: bool,
}

impl Screen {
    /// Recompute the shared geometry; returns it when the screen changed size
    fn renegotiate(&mut self) -> Option<Geometry> {
        if self.clients.live_count() == 0 {
            return None;
        }
        let negotiated = self.clients.negotiate();
        if negotiated == self.geometry {
            return None;
        }
        self.term.resize(negotiated.cols, negotiated.rows);
        self.geometry = negotiated;
        Some(negotiated)
    }
}

pub struct Interface {
    this: Weak<Interface>,
    uri: ParsedUri,
    config: InterfaceConfig,
    backend: Box<dyn Backend>,
    state: Mutex<InterfaceState>,
    shutting_down: AtomicBool,
    /// Thread running the teardown, and whether it has finished
    shutdown_owner: Mutex<Option<ThreadId>>,
    shutdown_done: Mutex<bool>,
    shutdown_cv: Condvar,
    start_lock: Mutex<()>,
    screen: Mutex<Screen>,
    capture: Mutex<CaptureController>,
    capture_gate: Mutex<()>,
    observers: RwLock<Callbacks>,
}

impl Interface {
    /// Build an interface around `backend`, with the scroll-back buffer
    /// selected by `config.buffer_uri`
    pub fn new(
        uri: ParsedUri,
        config: InterfaceConfig,
        backend: Box<dyn Backend>,
        callbacks: Callbacks,
    ) -> Result<Arc<Self>> {
        let buffer = buffer::create(&config)?;
        let geometry = Geometry::new(config.rows, config.cols);
        let term = Terminal::new(geometry.cols, geometry.rows, buffer.screen_history());
        let capture = CaptureController::new(backend.capture_mode().unwrap_or_default());
        let title = config.title.clone();

        Ok(Arc::new_cyclic(|this| Self {
            this: this.clone(),
            uri,
            config,
            backend,
            state: Mutex::new(InterfaceState::Initialized),
            shutting_down: AtomicBool::new(false),
            shutdown_owner: Mutex::new(None),
            shutdown_done: Mutex::new(false),
            shutdown_cv: Condvar::new(),
            start_lock: Mutex::new(()),
            screen: Mutex::new(Screen {
                term,
                buffer,
                clients: ClientTable::default(),
                geometry,
                title,
                after_cr: false,
            }),
            capture: Mutex::new(capture),
            capture_gate: Mutex::new(()),
            observers: RwLock::new(callbacks),
        }))
    }

    pub fn uri(&self) -> &str {
        &self.uri.raw
    }

    pub fn parsed_uri(&self) -> &ParsedUri {
        &self.uri
    }

    pub fn config(&self) -> &InterfaceConfig {
        &self.config
    }

    pub fn handle(&self) -> InterfaceHandle {
        InterfaceHandle(self.this.clone())
    }

    pub fn state(&self) -> InterfaceState {
        *lock(&self.state)
    }

    pub fn is_started(&self) -> bool {
        self.state() == InterfaceState::Started
    }

    pub fn is_shutdown(&self) -> bool {
        self.state() == InterfaceState::Shutdown
    }

    fn ensure_started(&self) -> Result<()> {
        match self.state() {
            InterfaceState::Started => Ok(()),
            InterfaceState::Initialized => Err(VttyError::NotStarted),
            InterfaceState::Shutdown => Err(VttyError::AlreadyShutdown),
        }
    }

    /// Run the backend's startup hook and move to `Started`
    pub fn start(&self) -> Result<()> {
        let _guard = lock(&self.start_lock);
        match self.state() {
            InterfaceState::Initialized => {}
            InterfaceState::Started => return Err(VttyError::AlreadyStarted),
            InterfaceState::Shutdown => return Err(VttyError::AlreadyShutdown),
        }

        let handle = self.handle();
        if let Err(e) = self.backend.start_interface(&handle) {
            warn!("{}: start failed: {}", self.uri.raw, e);
            return Err(e);
        }

        {
            let mut state = lock(&self.state);
            if self.shutting_down.load(Ordering::SeqCst) {
                drop(state);
                // Shut down while starting; release what the hook acquired
                if let Err(e) = self.backend.shutdown_interface() {
                    warn!("{}: teardown failed: {}", self.uri.raw, e);
                }
                return Err(VttyError::AlreadyShutdown);
            }
            *state = InterfaceState::Started;
        }
        info!("{}: started", self.uri.raw);

        if let Err(e) = self.backend.after_start(&handle) {
            warn!("{}: backend failed after start: {}", self.uri.raw, e);
            self.shutdown();
            return Err(e);
        }
        Ok(())
    }

    /// Tear down exactly once; safe from any thread, at any time.
    ///
    /// A caller that loses the race blocks until the winner has finished,
    /// unless it is the winner re-entering from a teardown hook or observer.
    pub fn shutdown(&self) {
        if self.shutting_down.swap(true, Ordering::SeqCst) {
            self.wait_for_shutdown();
            return;
        }
        *lock(&self.shutdown_owner) = Some(thread::current().id());

        if self.state() == InterfaceState::Started {
            if let Err(e) = self.backend.shutdown_interface() {
                warn!("{}: teardown failed: {}", self.uri.raw, e);
            }
        }
        *lock(&self.state) = InterfaceState::Shutdown;
        lock(&self.capture).cancel();
        info!("{}: shut down", self.uri.raw);

        let observers = read(&self.observers).on_shutdown.clone();
        notify("on_shutdown", &observers, |f| f(self));

        *lock(&self.shutdown_done) = true;
        self.shutdown_cv.notify_all();
    }

    fn wait_for_shutdown(&self) {
        let mut done = lock(&self.shutdown_done);
        while !*done {
            if *lock(&self.shutdown_owner) == Some(thread::current().id()) {
                return;
            }
            done = self
                .shutdown_cv
                .wait(done)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Output from the backend: update the screen, then fan out to clients
    pub fn deliver_to_clients(&self, data: &[u8]) -> Result<()> {
        self.ensure_started()?;
        if data.is_empty() {
            return Ok(());
        }

        // Screen update and fan-out share one critical section, so every
        // client sees deliveries in the order the screen applied them
        let (data, events, failed) = {
            let mut screen = lock(&self.screen);
            let data = if self.config.convert_eol {
                convert_eol(data, &mut screen.after_cr)
            } else {
                data.to_vec()
            };
            let events = screen.term.feed(&data);
            let Screen { term, buffer, .. } = &mut *screen;
            buffer.record(&data, term);

            let failed: Vec<(ClientId, VttyError)> = screen
                .clients
                .live()
                .into_iter()
                .filter_map(|(id, client)| client.write(&data).err().map(|e| (id, e)))
                .collect();
            (data, events, failed)
        };

        for (id, error) in failed {
            self.client_failed(id, &error);
        }

        let observers = read(&self.observers).on_deliver_to_clients.clone();
        notify("on_deliver_to_clients", &observers, |f| f(self, &data));

        for event in events {
            self.handle_event(event);
        }
        Ok(())
    }

    /// Input from a client: capture it or pass it to the backend
    pub fn deliver_to_backend(&self, data: &[u8]) -> Result<()> {
        self.ensure_started()?;

        let observers = read(&self.observers).on_deliver_to_backend.clone();
        notify("on_deliver_to_backend", &observers, |f| f(self, data));

        if self.backend.capture_mode().is_none() {
            return self.backend.receive(data);
        }

        let outcome = lock(&self.capture).feed(data);
        if !outcome.echo.is_empty() {
            self.deliver_to_clients(&outcome.echo)?;
        }
        if let Some(line) = &outcome.line {
            debug!("{}: captured line of {} bytes", self.uri.raw, line.len());
        }
        if outcome.interrupt {
            info!("{}: interrupt received", self.uri.raw);
            self.shutdown();
        }
        Ok(())
    }

    fn handle_event(&self, event: TermEvent) {
        match event {
            TermEvent::TitleChanged(title) => self.set_title(&title),
            TermEvent::Reply(reply) => {
                if let Err(e) = self.backend.receive(&reply) {
                    warn!("{}: device reply not delivered: {}", self.uri.raw, e);
                }
            }
            TermEvent::Bell => debug!("{}: bell", self.uri.raw),
            TermEvent::ResizeRequest { rows, cols } => {
                debug!("{}: ignoring resize request to {}x{}", self.uri.raw, rows, cols)
            }
            TermEvent::CorruptSequence(e) => warn!("{}: {}", self.uri.raw, e),
        }
    }

    /// Write `text` to clients, `\n` becoming `\r\n`
    pub fn print(&self, text: &str) -> Result<()> {
        self.deliver_to_clients(text.replace('\n', "\r\n").as_bytes())
    }

    /// Prompt, then block until a client completes a line
    pub fn input(&self, prompt: &str) -> Result<String> {
        self.capture_line(prompt, CaptureMode::Input)
    }

    /// Like [`Interface::input`], without echoing what is typed
    pub fn getpass(&self, prompt: &str) -> Result<String> {
        self.capture_line(prompt, CaptureMode::Getpass)
    }

    fn capture_line(&self, prompt: &str, mode: CaptureMode) -> Result<String> {
        let _gate = lock(&self.capture_gate);
        self.ensure_started()?;

        let (tx, rx) = mpsc::sync_channel(1);
        {
            let mut capture = lock(&self.capture);
            if self.shutting_down.load(Ordering::SeqCst) {
                return Err(VttyError::InterruptedCapture);
            }
            capture.begin(mode, tx);
        }
        if !prompt.is_empty() {
            if let Err(e) = self.print(prompt) {
                lock(&self.capture).cancel();
                return Err(e);
            }
        }
        rx.recv().unwrap_or(Err(VttyError::InterruptedCapture))
    }

    pub fn title(&self) -> String {
        lock(&self.screen).title.clone()
    }

    /// Change the title and notify observers
    pub fn set_title(&self, title: &str) {
        lock(&self.screen).title = title.to_string();
        let observers = read(&self.observers).on_title_change.clone();
        notify("on_title_change", &observers, |f| f(self, title));
    }

    /// Attach a display. The client immediately receives the catch-up
    /// replay of the scroll-back buffer.
    pub fn attach_client(&self, client: Arc<dyn Client>, geometry: Geometry) -> Result<ClientHandle> {
        if self.shutting_down.load(Ordering::SeqCst) {
            return Err(VttyError::AlreadyShutdown);
        }

        let (id, resized, replay_result) = {
            let mut screen = lock(&self.screen);
            let id = screen.clients.attach(Arc::clone(&client), geometry);
            let resized = screen.renegotiate();
            let replay = screen.buffer.replay(&screen.term);
            let replay_result = if replay.is_empty() {
                Ok(())
            } else {
                client.write(&replay)
            };
            (id, resized, replay_result)
        };
        info!("{}: client {} attached at {}", self.uri.raw, id, geometry);

        if let Some(geometry) = resized {
            self.announce_geometry(geometry);
        }
        if let Err(e) = replay_result {
            self.client_failed(id, &e);
            return Err(VttyError::Client(e.to_string()));
        }
        Ok(ClientHandle {
            id,
            iface: self.this.clone(),
            detached: AtomicBool::new(false),
        })
    }

    /// Remove a client; the last one out triggers auto-shutdown
    pub fn detach_client(&self, id: ClientId) {
        let (removed, remaining, resized) = {
            let mut screen = lock(&self.screen);
            let removed = screen.clients.detach(id);
            let resized = if removed { screen.renegotiate() } else { None };
            (removed, screen.clients.live_count(), resized)
        };
        if !removed {
            return;
        }
        info!("{}: client {} detached, {} remaining", self.uri.raw, id, remaining);

        if let Some(geometry) = resized {
            self.announce_geometry(geometry);
        }
        if remaining == 0 && self.config.auto_shutdown {
            self.shutdown();
        }
    }

    /// A client reported a new size
    pub fn resize_client(&self, id: ClientId, geometry: Geometry) -> Result<()> {
        let resized = {
            let mut screen = lock(&self.screen);
            if !screen.clients.resize(id, geometry) {
                return Err(VttyError::Client(format!("no live client {}", id)));
            }
            screen.renegotiate()
        };
        if let Some(geometry) = resized {
            self.announce_geometry(geometry);
        }
        Ok(())
    }

    fn client_failed(&self, id: ClientId, error: &VttyError) {
        if lock(&self.screen).clients.mark_dead(id) {
            warn!("{}: client {} is dead: {}", self.uri.raw, id, error);
        }
        self.detach_client(id);
    }

    fn announce_geometry(&self, geometry: Geometry) {
        debug!("{}: negotiated geometry {}", self.uri.raw, geometry);
        let clients = lock(&self.screen).clients.live();
        for (_, client) in clients {
            client.geometry_changed(geometry);
        }
        self.backend.geometry_changed(geometry);
    }

    /// Size of the shared screen
    pub fn geometry(&self) -> Geometry {
        lock(&self.screen).geometry
    }

    /// Componentwise minimum over live clients; 1×1 with none attached
    pub fn negotiated_geometry(&self) -> Geometry {
        lock(&self.screen).clients.negotiate()
    }

    pub fn client_count(&self) -> usize {
        lock(&self.screen).clients.live_count()
    }

    pub fn client_geometry(&self, id: ClientId) -> Option<Geometry> {
        lock(&self.screen).clients.geometry(id)
    }

    /// `(row, col)`; `None` before any output
    pub fn cursor_position(&self) -> Option<(u16, u16)> {
        lock(&self.screen).term.cursor_position()
    }

    /// Catch-up bytes a fresh client would receive
    pub fn get_buffer(&self) -> Vec<u8> {
        let screen = lock(&self.screen);
        screen.buffer.replay(&screen.term)
    }

    pub fn line_text(&self, row: usize) -> String {
        lock(&self.screen).term.line_text(row)
    }

    /// Input-affecting modes the application has set (cursor keys, LNM)
    pub fn modes(&self) -> TerminalModes {
        lock(&self.screen).term.state().modes.clone()
    }

    pub fn on_deliver_to_clients<F>(&self, f: F)
    where
        F: Fn(&Interface, &[u8]) -> Result<()> + Send + Sync + 'static,
    {
        write(&self.observers).on_deliver_to_clients.push(Arc::new(f));
    }

    pub fn on_deliver_to_backend<F>(&self, f: F)
    where
        F: Fn(&Interface, &[u8]) -> Result<()> + Send + Sync + 'static,
    {
        write(&self.observers).on_deliver_to_backend.push(Arc::new(f));
    }

    pub fn on_shutdown<F>(&self, f: F)
    where
        F: Fn(&Interface) -> Result<()> + Send + Sync + 'static,
    {
        write(&self.observers).on_shutdown.push(Arc::new(f));
    }

    pub fn on_title_change<F>(&self, f: F)
    where
        F: Fn(&Interface, &str) -> Result<()> + Send + Sync + 'static,
    {
        write(&self.observers).on_title_change.push(Arc::new(f));
    }
}

impl Drop for Interface {
    fn drop(&mut self) {
        if !self.shutting_down.load(Ordering::SeqCst) {
            debug!("{}: dropped without shutdown", self.uri.raw);
            self.shutdown();
        }
    }
}

/// Non-owning reference handed to backends and their worker threads
#[derive(Clone)]
pub struct InterfaceHandle(Weak<Interface>);

impl InterfaceHandle {
    pub fn upgrade(&self) -> Result<Arc<Interface>> {
        self.0.upgrade().ok_or(VttyError::AlreadyShutdown)
    }

    pub fn deliver_to_clients(&self, data: &[u8]) -> Result<()> {
        self.upgrade()?.deliver_to_clients(data)
    }

    pub fn print(&self, text: &str) -> Result<()> {
        self.upgrade()?.print(text)
    }

    pub fn input(&self, prompt: &str) -> Result<String> {
        self.upgrade()?.input(prompt)
    }

    pub fn getpass(&self, prompt: &str) -> Result<String> {
        self.upgrade()?.getpass(prompt)
    }

    pub fn shutdown(&self) {
        if let Some(iface) = self.0.upgrade() {
            iface.shutdown();
        }
    }

    pub fn is_shutdown(&self) -> bool {
        self.0.upgrade().map_or(true, |iface| iface.is_shutdown())
    }
}

/// Returned by [`Interface::attach_client`]
pub struct ClientHandle {
    id: ClientId,
    iface: Weak<Interface>,
    detached: AtomicBool,
}

impl ClientHandle {
    pub fn id(&self) -> ClientId {
        self.id
    }

    /// Bytes the user typed
    pub fn send(&self, data: &[u8]) -> Result<()> {
        self.interface()?.deliver_to_backend(data)
    }

    pub fn resize(&self, geometry: Geometry) -> Result<()> {
        self.interface()?.resize_client(self.id, geometry)
    }

    /// Detach; repeated calls are no-ops
    pub fn detach(&self) {
        if self.detached.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Some(iface) = self.iface.upgrade() {
            iface.detach_client(self.id);
        }
    }

    fn interface(&self) -> Result<Arc<Interface>> {
        if self.detached.load(Ordering::SeqCst) {
            return Err(VttyError::Client(format!("client {} is detached", self.id)));
        }
        self.iface.upgrade().ok_or(VttyError::AlreadyShutdown)
    }
}

/// Run each observer, isolating errors and panics
fn notify<T: ?Sized>(event: &str, observers: &[Arc<T>], call: impl Fn(&T) -> Result<()>) {
    for (idx, observer) in observers.iter().enumerate() {
        match panic::catch_unwind(AssertUnwindSafe(|| call(&**observer))) {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!("{} observer #{} failed: {}", event, idx, e),
            Err(_) => warn!("{} observer #{} panicked", event, idx),
        }
    }
}

/// `\n` not preceded by `\r` becomes `\r\n`
fn convert_eol(data: &[u8], after_cr: &mut bool) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len() + data.len() / 8);
    for &byte in data {
        if byte == b'\n' && !*after_cr {
            out.push(b'\r');
        }
        out.push(byte);
        *after_cr = byte == b'\r';
    }
    out
}

pub(crate) fn lock<T: ?Sized>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn read<T>(lock: &RwLock<T>) -> std::sync::RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> std::sync::RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}
