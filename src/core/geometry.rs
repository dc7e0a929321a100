//! Multi-client geometry negotiation
//!
//! Every attached client reports its own size; the shared screen uses the
//! componentwise minimum over the live ones so that no client ever has to
//! render a line longer, or a screen taller, than it can display.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::core::interface::Client;

/// Rows × columns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Geometry {
    pub rows: u16,
    pub cols: u16,
}

impl Geometry {
    /// The smallest geometry the engine will negotiate
    pub const MIN: Geometry = Geometry { rows: 1, cols: 1 };

    /// Geometry clamped to at least 1×1
    pub fn new(rows: u16, cols: u16) -> Self {
        Self {
            rows: rows.max(1),
            cols: cols.max(1),
        }
    }
}

impl fmt::Display for Geometry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.rows, self.cols)
    }
}

/// Identifier handed out on attach; never reused within one interface
pub type ClientId = u64;

pub(crate) struct ClientEntry {
    pub client: Arc<dyn Client>,
    pub geometry: Geometry,
    pub live: bool,
}

/// Attached clients and their reported geometries
#[derive(Default)]
pub(crate) struct ClientTable {
    entries: BTreeMap<ClientId, ClientEntry>,
    next_id: ClientId,
}

impl ClientTable {
    pub fn attach(&mut self, client: Arc<dyn Client>, geometry: Geometry) -> ClientId {
        self.next_id += 1;
        let id = self.next_id;
        self.entries.insert(
            id,
            ClientEntry {
                client,
                geometry,
                live: true,
            },
        );
        id
    }

    /// Remove a client; returns whether it was attached
    pub fn detach(&mut self, id: ClientId) -> bool {
        self.entries.remove(&id).is_some()
    }

    /// Update a client's geometry; false when the id is unknown or dead
    pub fn resize(&mut self, id: ClientId, geometry: Geometry) -> bool {
        match self.entries.get_mut(&id) {
            Some(entry) if entry.live => {
                entry.geometry = geometry;
                true
            }
            _ => false,
        }
    }

    /// Flag a client whose writes failed; returns whether it was live before
    pub fn mark_dead(&mut self, id: ClientId) -> bool {
        match self.entries.get_mut(&id) {
            Some(entry) => std::mem::replace(&mut entry.live, false),
            None => false,
        }
    }

    pub fn geometry(&self, id: ClientId) -> Option<Geometry> {
        self.entries.get(&id).filter(|e| e.live).map(|e| e.geometry)
    }

    pub fn live_count(&self) -> usize {
        self.entries.values().filter(|e| e.live).count()
    }

    /// Live clients, in attach order
    pub fn live(&self) -> Vec<(ClientId, Arc<dyn Client>)> {
        self.entries
            .iter()
            .filter(|(_, e)| e.live)
            .map(|(id, e)| (*id, Arc::clone(&e.client)))
            .collect()
    }

    /// Componentwise minimum over live clients, or 1×1 when none are live
    pub fn negotiate(&self) -> Geometry {
        negotiate(self.entries.values().filter(|e| e.live).map(|e| e.geometry))
    }
}

/// Componentwise minimum of `sizes`, clamped to at least 1×1
pub fn negotiate(sizes: impl IntoIterator<Item = Geometry>) -> Geometry {
    sizes
        .into_iter()
        .reduce(|a, b| Geometry {
            rows: a.rows.min(b.rows),
            cols: a.cols.min(b.cols),
        })
        .map(|g| Geometry::new(g.rows, g.cols))
        .unwrap_or(Geometry::MIN)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Result;
    use proptest::prelude::*;

    struct NullClient;

    impl Client for NullClient {
        fn write(&self, _data: &[u8]) -> Result<()> {
            Ok(())
        }
    }

    fn null() -> Arc<dyn Client> {
        Arc::new(NullClient)
    }

    #[test]
    fn test_negotiate_empty_is_min() {
        assert_eq!(negotiate([]), Geometry::MIN);
        assert_eq!(ClientTable::default().negotiate(), Geometry::MIN);
    }

    #[test]
    fn test_dead_clients_do_not_count() {
        let mut table = ClientTable::default();
        let small = table.attach(null(), Geometry::new(10, 20));
        table.attach(null(), Geometry::new(30, 100));
        assert_eq!(table.negotiate(), Geometry::new(10, 20));

        assert!(table.mark_dead(small));
        assert!(!table.mark_dead(small));
        assert_eq!(table.negotiate(), Geometry::new(30, 100));
        assert_eq!(table.live_count(), 1);
        assert!(!table.resize(small, Geometry::new(1, 1)));
    }

    #[test]
    fn test_zero_sizes_clamp_to_one() {
        assert_eq!(Geometry::new(0, 0), Geometry::MIN);
        let mut table = ClientTable::default();
        table.attach(null(), Geometry { rows: 0, cols: 5 });
        assert_eq!(table.negotiate(), Geometry::new(1, 5));
    }

    #[derive(Debug, Clone)]
    enum Op {
        Attach(u16, u16),
        Detach(usize),
        Resize(usize, u16, u16),
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            (0u16..200, 0u16..300).prop_map(|(r, c)| Op::Attach(r, c)),
            any::<usize>().prop_map(Op::Detach),
            (any::<usize>(), 0u16..200, 0u16..300).prop_map(|(i, r, c)| Op::Resize(i, r, c)),
        ]
    }

    proptest! {
        #[test]
        fn prop_negotiated_is_componentwise_min(ops in prop::collection::vec(op(), 0..64)) {
            let mut table = ClientTable::default();
            let mut model: Vec<(ClientId, u16, u16)> = Vec::new();

            for op in ops {
                match op {
                    Op::Attach(r, c) => {
                        let id = table.attach(null(), Geometry { rows: r, cols: c });
                        model.push((id, r, c));
                    }
                    Op::Detach(i) if !model.is_empty() => {
                        let (id, _, _) = model.remove(i % model.len());
                        table.detach(id);
                    }
                    Op::Resize(i, r, c) if !model.is_empty() => {
                        let idx = i % model.len();
                        model[idx].1 = r;
                        model[idx].2 = c;
                        table.resize(model[idx].0, Geometry { rows: r, cols: c });
                    }
                    _ => {}
                }

                let expected = if model.is_empty() {
                    Geometry::MIN
                } else {
                    Geometry::new(
                        model.iter().map(|m| m.1).min().unwrap_or(1),
                        model.iter().map(|m| m.2).min().unwrap_or(1),
                    )
                };
                prop_assert_eq!(table.negotiate(), expected);
            }
        }
    }
}
