// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Connection registry with an account -> connections inverted index.
//!
//! One mutex guards both maps. Critical sections only touch the maps; senders
//! are cloned out so no I/O happens under the lock.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

pub type ConnectionId = u64;

/// State of one subscribed socket.
#[derive(Debug, Clone)]
pub struct Subscriber {
    pub session_id: Uuid,
    pub accounts: BTreeSet<String>,
    pub currency: String,
    pub(crate) outbound: mpsc::Sender<String>,
    pub(crate) closed: CancellationToken,
}

/// Where to deliver a message for one connection.
#[derive(Debug, Clone)]
pub struct Target {
    pub id: ConnectionId,
    pub currency: String,
    pub outbound: mpsc::Sender<String>,
}

#[derive(Default)]
struct RegistryInner {
    subscribers: HashMap<ConnectionId, Subscriber>,
    by_account: HashMap<String, HashSet<ConnectionId>>,
}

#[derive(Default)]
pub struct Registry {
    inner: Mutex<RegistryInner>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, RegistryInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Insert a connection, or update its session id and currency.
    pub fn upsert(
        &self,
        id: ConnectionId,
        session_id: Uuid,
        currency: String,
        outbound: mpsc::Sender<String>,
        closed: CancellationToken,
    ) {
        let mut inner = self.lock();
        inner
            .subscribers
            .entry(id)
            .and_modify(|s| {
                s.session_id = session_id;
                s.currency = currency.clone();
            })
            .or_insert_with(|| Subscriber {
                session_id,
                accounts: BTreeSet::new(),
                currency,
                outbound,
                closed,
            });
    }

    /// Add `account` to the connection's interest set. Returns false when the
    /// account was already tracked or the connection is unknown.
    pub fn add_account(&self, id: ConnectionId, account: &str) -> bool {
        let mut inner = self.lock();
        let Some(subscriber) = inner.subscribers.get_mut(&id) else {
            return false;
        };
        if !subscriber.accounts.insert(account.to_string()) {
            return false;
        }
        inner
            .by_account
            .entry(account.to_string())
            .or_default()
            .insert(id);
        true
    }

    /// Remove a connection and its index entries.
    pub fn remove(&self, id: ConnectionId) -> Option<Subscriber> {
        let mut inner = self.lock();
        let subscriber = inner.subscribers.remove(&id)?;
        for account in &subscriber.accounts {
            if let Some(ids) = inner.by_account.get_mut(account) {
                ids.remove(&id);
                if ids.is_empty() {
                    inner.by_account.remove(account);
                }
            }
        }
        Some(subscriber)
    }

    /// Remove every connection.
    pub fn drain(&self) -> Vec<Subscriber> {
        let mut inner = self.lock();
        inner.by_account.clear();
        inner.subscribers.drain().map(|(_, s)| s).collect()
    }

    pub fn get(&self, id: ConnectionId) -> Option<Subscriber> {
        self.lock().subscribers.get(&id).cloned()
    }

    /// Connections interested in `account`.
    pub fn targets_for(&self, account: &str) -> Vec<Target> {
        let inner = self.lock();
        let Some(ids) = inner.by_account.get(account) else {
            return Vec::new();
        };
        ids.iter()
            .filter_map(|id| {
                inner.subscribers.get(id).map(|s| Target {
                    id: *id,
                    currency: s.currency.clone(),
                    outbound: s.outbound.clone(),
                })
            })
            .collect()
    }

    pub fn all_targets(&self) -> Vec<Target> {
        self.lock()
            .subscribers
            .iter()
            .map(|(id, s)| Target {
                id: *id,
                currency: s.currency.clone(),
                outbound: s.outbound.clone(),
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.lock().subscribers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const A: &str = "nano_1zyb1s96twbtycqwgh1o6wsnpsksgdoohokikgjqjaz63pxnju457pz8tm3r";
    const B: &str = "nano_1qato4k7z3spc8gq1zyd8xeqfbzsoxwo36a45ozbrxcatut7up8ohyardu1z";

    fn register(registry: &Registry, id: ConnectionId) -> mpsc::Receiver<String> {
        let (tx, rx) = mpsc::channel(4);
        registry.upsert(id, Uuid::new_v4(), "USD".into(), tx, CancellationToken::new());
        rx
    }

    #[test]
    fn add_account_is_idempotent() {
        let registry = Registry::new();
        let _rx = register(&registry, 1);

        assert!(registry.add_account(1, A));
        assert!(!registry.add_account(1, A));
        assert_eq!(registry.get(1).unwrap().accounts.len(), 1);
        assert_eq!(registry.targets_for(A).len(), 1);
    }

    #[test]
    fn unknown_connection_cannot_add_accounts() {
        let registry = Registry::new();
        assert!(!registry.add_account(9, A));
        assert!(registry.targets_for(A).is_empty());
    }

    #[test]
    fn index_tracks_multiple_connections() {
        let registry = Registry::new();
        let _r1 = register(&registry, 1);
        let _r2 = register(&registry, 2);
        registry.add_account(1, A);
        registry.add_account(2, A);
        registry.add_account(2, B);

        let mut ids: Vec<_> = registry.targets_for(A).into_iter().map(|t| t.id).collect();
        ids.sort_unstable();
        assert_eq!(ids, vec![1, 2]);

        registry.remove(2);
        assert_eq!(registry.targets_for(A).len(), 1);
        assert!(registry.targets_for(B).is_empty());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn upsert_keeps_interest_set() {
        let registry = Registry::new();
        let (tx, _rx) = mpsc::channel(4);
        let session = Uuid::new_v4();
        registry.upsert(1, Uuid::new_v4(), "USD".into(), tx.clone(), CancellationToken::new());
        registry.add_account(1, A);
        registry.upsert(1, session, "EUR".into(), tx, CancellationToken::new());

        let subscriber = registry.get(1).unwrap();
        assert_eq!(subscriber.session_id, session);
        assert_eq!(subscriber.currency, "EUR");
        assert!(subscriber.accounts.contains(A));
        assert_eq!(registry.all_targets()[0].currency, "EUR");
    }

    #[test]
    fn drain_empties_everything() {
        let registry = Registry::new();
        let _r1 = register(&registry, 1);
        registry.add_account(1, A);
        assert_eq!(registry.drain().len(), 1);
        assert!(registry.is_empty());
        assert!(registry.targets_for(A).is_empty());
    }
}
