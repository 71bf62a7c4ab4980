// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Work Arbiter
//!
//! Races every configured proof-of-work backend for one `(hash, tier)` job and
//! keeps the first non-empty result.
//!
//! ## Race rules
//!
//! - No providers: fails immediately with [`WorkError::NoProviders`].
//! - A provider error is recorded; the race only fails once every provider has
//!   failed ([`WorkError::AllFailed`]).
//! - The whole race is bounded by a deadline ([`WorkError::Timeout`]).
//! - Once a winner is known, every other provider receives one `cancel` call so
//!   HTTP work servers stop computing. Remote services ignore it.

pub mod providers;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::future::join_all;
use futures_util::stream::{FuturesUnordered, StreamExt};
use tracing::{debug, info, warn};

pub use providers::{BoomPowProvider, NodeWorkProvider};

/// Default bound on a single arbitration race.
pub const DEFAULT_WORK_DEADLINE: Duration = Duration::from_secs(30);

/// The two difficulty targets a block can require.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DifficultyTier {
    /// Send and change blocks.
    High,
    /// Open and receive blocks, and every banano block.
    Low,
}

impl DifficultyTier {
    /// Threshold encoding forwarded to node-style work servers.
    pub fn threshold(self) -> &'static str {
        match self {
            DifficultyTier::High => "fffffff800000000",
            DifficultyTier::Low => "fffffe0000000000",
        }
    }

    /// Multiplier relative to the base difficulty, for delegated services.
    pub fn multiplier(self) -> u32 {
        match self {
            DifficultyTier::High => 64,
            DifficultyTier::Low => 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WorkError {
    #[error("No work providers configured")]
    NoProviders,

    #[error("Work generation timed out after {0:?}")]
    Timeout(Duration),

    #[error("All work providers failed: {}", .0.join("; "))]
    AllFailed(Vec<String>),

    #[error("{0}")]
    Provider(String),
}

/// A backend able to compute proof-of-work for a block hash.
#[async_trait]
pub trait WorkProvider: Send + Sync {
    fn name(&self) -> &str;

    async fn generate(&self, hash: &str, tier: DifficultyTier) -> Result<String, WorkError>;

    /// Best-effort request to abandon in-flight work for `hash`.
    async fn cancel(&self, _hash: &str) {}
}

/// Drive all futures concurrently and return the index and value of the first
/// one to succeed. Remaining futures are dropped. If none succeeds, every error
/// is returned with its index, in completion order.
pub async fn race_first_ok<F, T, E>(futures: Vec<F>) -> Result<(usize, T), Vec<(usize, E)>>
where
    F: Future<Output = Result<T, E>>,
{
    let mut pending: FuturesUnordered<_> = futures
        .into_iter()
        .enumerate()
        .map(|(index, fut)| async move { (index, fut.await) })
        .collect();

    let mut errors = Vec::new();
    while let Some((index, result)) = pending.next().await {
        match result {
            Ok(value) => return Ok((index, value)),
            Err(e) => errors.push((index, e)),
        }
    }
    Err(errors)
}

/// Races the configured [`WorkProvider`]s.
#[derive(Clone, Default)]
pub struct WorkArbiter {
    providers: Vec<Arc<dyn WorkProvider>>,
}

impl WorkArbiter {
    pub fn new(providers: Vec<Arc<dyn WorkProvider>>) -> Self {
        Self { providers }
    }

    pub fn provider_count(&self) -> usize {
        self.providers.len()
    }

    pub fn provider_names(&self) -> Vec<String> {
        self.providers.iter().map(|p| p.name().to_string()).collect()
    }

    pub async fn generate(
        &self,
        hash: &str,
        tier: DifficultyTier,
        deadline: Duration,
    ) -> Result<String, WorkError> {
        if self.providers.is_empty() {
            return Err(WorkError::NoProviders);
        }

        let attempts = self
            .providers
            .iter()
            .map(|provider| Self::attempt(provider.as_ref(), hash, tier))
            .collect::<Vec<_>>();

        match tokio::time::timeout(deadline, race_first_ok(attempts)).await {
            Ok(Ok((winner, work))) => {
                info!(
                    hash = %hash,
                    provider = %self.providers[winner].name(),
                    "Work generated"
                );
                self.cancel_except(hash, Some(winner)).await;
                Ok(work)
            }
            Ok(Err(errors)) => {
                let messages = errors
                    .into_iter()
                    .map(|(index, e)| format!("{}: {}", self.providers[index].name(), e))
                    .collect::<Vec<_>>();
                warn!(hash = %hash, errors = ?messages, "All work providers failed");
                Err(WorkError::AllFailed(messages))
            }
            Err(_) => {
                warn!(hash = %hash, deadline_secs = deadline.as_secs(), "Work generation timed out");
                self.cancel_except(hash, None).await;
                Err(WorkError::Timeout(deadline))
            }
        }
    }

    async fn attempt(
        provider: &dyn WorkProvider,
        hash: &str,
        tier: DifficultyTier,
    ) -> Result<String, WorkError> {
        let work = provider.generate(hash, tier).await?;
        if work.trim().is_empty() {
            return Err(WorkError::Provider("empty work value".to_string()));
        }
        Ok(work)
    }

    async fn cancel_except(&self, hash: &str, winner: Option<usize>) {
        let cancels = self
            .providers
            .iter()
            .enumerate()
            .filter(|(index, _)| Some(*index) != winner)
            .map(|(_, provider)| {
                debug!(hash = %hash, provider = %provider.name(), "Cancelling work");
                provider.cancel(hash)
            });
        join_all(cancels).await;
    }
}
