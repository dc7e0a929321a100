//! Scheme registry
//!
//! Maps a URI scheme to a handler. Handlers are registered statically at
//! process start or found lazily through [`PluginSource`]s the first time a
//! scheme misses. A discovered handler is accepted only if it is the
//! registry's handler type, and is then cached like a static one.
//!
//! Two process-wide registries exist: [`crate::backend::registry`] for
//! interfaces and [`crate::buffer::registry`] for scroll-back buffers.

use std::any::Any;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::{Arc, Mutex, RwLock};

use tracing::{debug, info, warn};

use crate::backend::{self, BackendHandler};
use crate::config::{ConfigPatch, InterfaceConfig};
use crate::core::interface::{lock, Callbacks, Interface};
use crate::error::{Result, VttyError};
use crate::uri::ParsedUri;

pub type PluginLoader = Box<dyn Fn() -> Result<Arc<dyn Any + Send + Sync>> + Send + Sync>;

/// A named, not yet loaded handler offered by a plugin source
pub struct PluginEntry {
    pub name: String,
    pub load: PluginLoader,
}

impl PluginEntry {
    pub fn new<F>(name: impl Into<String>, load: F) -> Self
    where
        F: Fn() -> Result<Arc<dyn Any + Send + Sync>> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            load: Box::new(load),
        }
    }

    /// Entry whose loader hands out a clone of `handler`
    pub fn with_handler<H>(name: impl Into<String>, handler: H) -> Self
    where
        H: Clone + Send + Sync + 'static,
    {
        Self::new(name, move || Ok(Arc::new(handler.clone()) as Arc<dyn Any + Send + Sync>))
    }
}

/// External discovery mechanism: lists the entries of a named group
pub trait PluginSource: Send + Sync {
    fn entries(&self, group: &str) -> Vec<PluginEntry>;
}

pub struct Registry<H> {
    kind: &'static str,
    handlers: RwLock<HashMap<String, H>>,
    sources: RwLock<Vec<Arc<dyn PluginSource>>>,
    /// Schemes already looked up through the plugin sources
    searched: Mutex<HashSet<String>>,
}

impl<H: Clone + Send + Sync + 'static> Registry<H> {
    pub fn new(kind: &'static str) -> Self {
        Self {
            kind,
            handlers: RwLock::new(HashMap::new()),
            sources: RwLock::new(Vec::new()),
            searched: Mutex::new(HashSet::new()),
        }
    }

    /// Plugin group name, e.g. `vtty.backend`
    pub fn group(&self) -> String {
        format!("vtty.{}", self.kind)
    }

    /// Insert `handler`; an existing registration is replaced
    pub fn register(&self, scheme: &str, handler: H) {
        let previous = write(&self.handlers).insert(scheme.to_string(), handler);
        if previous.is_some() {
            warn!("{} scheme {:?} re-registered, replacing previous handler", self.kind, scheme);
        } else {
            debug!("{} scheme {:?} registered", self.kind, scheme);
        }
    }

    pub fn unregister(&self, scheme: &str) -> Option<H> {
        write(&self.handlers).remove(scheme)
    }

    pub fn add_source(&self, source: Arc<dyn PluginSource>) {
        write(&self.sources).push(source);
        // New source, new chances for earlier misses
        lock(&self.searched).clear();
    }

    pub fn is_registered(&self, scheme: &str) -> bool {
        read(&self.handlers).contains_key(scheme)
    }

    /// Static map first, then a one-time plugin lookup
    pub fn resolve(&self, scheme: &str) -> Result<H> {
        if let Some(handler) = read(&self.handlers).get(scheme) {
            return Ok(handler.clone());
        }

        let mut searched = lock(&self.searched);
        // Another thread may have discovered it while we waited
        if let Some(handler) = read(&self.handlers).get(scheme) {
            return Ok(handler.clone());
        }
        if !searched.insert(scheme.to_string()) {
            return Err(self.unknown(scheme));
        }

        let sources = read(&self.sources).clone();
        let group = self.group();
        for source in sources {
            for entry in source.entries(&group) {
                if entry.name != scheme {
                    continue;
                }
                let handler = self.load(scheme, &entry)?;
                info!("{} scheme {:?} loaded from plugin", self.kind, scheme);
                write(&self.handlers).insert(scheme.to_string(), handler.clone());
                return Ok(handler);
            }
        }
        Err(self.unknown(scheme))
    }

    fn load(&self, scheme: &str, entry: &PluginEntry) -> Result<H> {
        let loaded = (entry.load)().map_err(|e| VttyError::InvalidPlugin {
            scheme: scheme.to_string(),
            reason: format!("loader failed: {}", e),
        })?;
        loaded
            .downcast::<H>()
            .map(|handler| (*handler).clone())
            .map_err(|_| VttyError::InvalidPlugin {
                scheme: scheme.to_string(),
                reason: format!("not a {} handler", self.kind),
            })
    }

    fn unknown(&self, scheme: &str) -> VttyError {
        VttyError::UnknownScheme {
            registry: self.kind,
            scheme: scheme.to_string(),
        }
    }

    /// Registered schemes plus those any plugin source offers, sorted
    pub fn schemes(&self) -> Vec<String> {
        let mut names: BTreeSet<String> = read(&self.handlers).keys().cloned().collect();
        let group = self.group();
        for source in read(&self.sources).iter() {
            names.extend(source.entries(&group).into_iter().map(|e| e.name));
        }
        names.into_iter().collect()
    }
}

/// Build an interface from `uri` using the process-wide backend registry
pub fn create(uri: &str, overrides: &ConfigPatch, callbacks: Callbacks) -> Result<Arc<Interface>> {
    create_with(backend::registry(), uri, overrides, callbacks)
}

/// Build an interface from `uri` using `registry`
///
/// The URI is parsed and the scheme resolved before any handler runs, so a
/// malformed URI or unknown scheme fails without side effects.
pub fn create_with(
    registry: &Registry<BackendHandler>,
    uri: &str,
    overrides: &ConfigPatch,
    callbacks: Callbacks,
) -> Result<Arc<Interface>> {
    let parsed = ParsedUri::parse(uri)?;
    let factory = registry.resolve(&parsed.scheme)?;
    let config = InterfaceConfig::resolve(&factory.defaults(), &parsed, overrides)?;
    let backend = factory.create(&parsed, &config)?;
    debug!("creating {} interface for {}", parsed.scheme, uri);
    Interface::new(parsed, config, backend, callbacks)
}

fn read<T>(lock: &RwLock<T>) -> std::sync::RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(std::sync::PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> std::sync::RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(std::sync::PoisonError::into_inner)
}
