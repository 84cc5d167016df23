//! # Listener registry: one socket per `(network, address)`.
//!
//! ```text
//! listen(network, address)
//!   ├─ active[key]     → dup of the kept socket
//!   ├─ inherited[key]  → move to active (origin = Inherited), dup
//!   └─ otherwise       → bind, insert into active (origin = Bound), dup
//! ```
//!
//! Keys use the address **as requested**, so `127.0.0.1:0` asked for again by a
//! successor resolves to the socket (and port) its parent bound.
//! Entries stay until the reloader stops: the registry copy keeps a socket
//! listening while a successor takes over. Stopping without a successor closes
//! them, so once servers drop their copies new connections are refused.

use std::collections::BTreeMap;
use std::io;

use serde::Serialize;

use crate::error::ReloadError;
use crate::reloader::listener::{Network, StdListener};

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub(crate) struct ListenerKey {
    pub(crate) network: Network,
    pub(crate) address: String,
}

impl ListenerKey {
    pub(crate) fn new(network: Network, address: impl Into<String>) -> Self {
        Self {
            network,
            address: address.into(),
        }
    }
}

/// How a registry socket came into this process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Origin {
    /// Bound by this process.
    Bound,
    /// Inherited from the parent process.
    Inherited,
}

impl Origin {
    pub(crate) fn as_str(&self) -> &'static str {
        match self {
            Origin::Bound => "bound",
            Origin::Inherited => "inherited",
        }
    }
}

/// Introspection record for an active listener.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ListenerInfo {
    /// Requested network.
    pub network: Network,
    /// Requested address (the registry key).
    pub address: String,
    /// Address the socket is actually bound to.
    pub local_address: String,
    /// Bound here or inherited.
    pub origin: Origin,
    /// Generation that first bound the socket.
    pub generation: u64,
}

#[derive(Debug)]
struct Entry {
    socket: StdListener,
    origin: Origin,
    generation: u64,
}

/// A socket to pass to a successor.
#[derive(Debug)]
pub(crate) struct Snapshot {
    pub(crate) key: ListenerKey,
    pub(crate) socket: StdListener,
    pub(crate) generation: u64,
}

#[derive(Debug)]
pub(crate) struct ListenerRegistry {
    generation: u64,
    active: BTreeMap<ListenerKey, Entry>,
    inherited: BTreeMap<ListenerKey, Entry>,
}

impl ListenerRegistry {
    pub(crate) fn new(generation: u64) -> Self {
        Self {
            generation,
            active: BTreeMap::new(),
            inherited: BTreeMap::new(),
        }
    }

    /// Registry of a successor; `sockets` are claimed on demand by [`listen`](Self::listen).
    pub(crate) fn with_inherited(generation: u64, sockets: Vec<Snapshot>) -> Self {
        let mut registry = Self::new(generation);
        for s in sockets {
            registry.inherited.insert(
                s.key,
                Entry {
                    socket: s.socket,
                    origin: Origin::Inherited,
                    generation: s.generation,
                },
            );
        }
        registry
    }

    /// Returns a dup of the socket for `(network, address)` and where it came from.
    pub(crate) fn listen(
        &mut self,
        network: Network,
        address: &str,
    ) -> Result<(StdListener, Origin), ReloadError> {
        let key = ListenerKey::new(network, address);

        if let Some(entry) = self.active.get(&key) {
            return Ok((entry.socket.try_clone()?, entry.origin));
        }
        if let Some(entry) = self.inherited.remove(&key) {
            let dup = entry.socket.try_clone()?;
            self.active.insert(key, entry);
            return Ok((dup, Origin::Inherited));
        }

        let socket = StdListener::bind(network, address)?;
        let dup = socket.try_clone()?;
        self.active.insert(
            key,
            Entry {
                socket,
                origin: Origin::Bound,
                generation: self.generation,
            },
        );
        Ok((dup, Origin::Bound))
    }

    /// Dups of every open socket: active ones and inherited ones nobody claimed yet.
    pub(crate) fn snapshot(&self) -> io::Result<Vec<Snapshot>> {
        self.active
            .iter()
            .chain(self.inherited.iter())
            .map(|(key, entry)| -> io::Result<Snapshot> {
                Ok(Snapshot {
                    key: key.clone(),
                    socket: entry.socket.try_clone()?,
                    generation: entry.generation,
                })
            })
            .collect()
    }

    /// Closes inherited sockets that were never claimed; returns how many.
    pub(crate) fn close_unclaimed(&mut self) -> usize {
        let n = self.inherited.len();
        self.inherited.clear();
        n
    }

    /// Closes every socket the registry holds; returns how many.
    pub(crate) fn close_all(&mut self) -> usize {
        let n = self.active.len() + self.inherited.len();
        self.active.clear();
        self.inherited.clear();
        n
    }

    pub(crate) fn infos(&self) -> Vec<ListenerInfo> {
        self.active
            .iter()
            .map(|(key, entry)| ListenerInfo {
                network: key.network,
                address: key.address.clone(),
                local_address: entry.socket.local_address(),
                origin: entry.origin,
                generation: entry.generation,
            })
            .collect()
    }
}
