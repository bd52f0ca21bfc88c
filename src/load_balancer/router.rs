//! Weighted failover between two providers.

use std::future::Future;
use std::sync::Arc;

use crate::load_balancer::switch::{RouterState, Slot};
use crate::observability::metrics;
use crate::provider::{NodeInfo, PastTransaction, Provider, ProviderKind};
use crate::types::{KazeError, KazeResult};
use crate::wallet::balance::Balance;
use crate::wallet::claims::Claims;
use crate::wallet::fixed8::Fixed8;

/// The provider a routed call landed on.
#[derive(Debug)]
pub enum Routed<'a, A, B> {
    A(&'a A),
    B(&'a B),
}

impl<A, B> Clone for Routed<'_, A, B> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<A, B> Copy for Routed<'_, A, B> {}

impl<A: Provider, B: Provider> Provider for Routed<'_, A, B> {
    fn kind(&self) -> ProviderKind {
        match self {
            Routed::A(p) => p.kind(),
            Routed::B(p) => p.kind(),
        }
    }

    fn resolve_endpoint(&self, net: &str) -> KazeResult<String> {
        match self {
            Routed::A(p) => p.resolve_endpoint(net),
            Routed::B(p) => p.resolve_endpoint(net),
        }
    }

    async fn fetch_nodes(&self, net: &str) -> KazeResult<Vec<NodeInfo>> {
        match self {
            Routed::A(p) => p.fetch_nodes(net).await,
            Routed::B(p) => p.fetch_nodes(net).await,
        }
    }

    async fn discover_best_node(&self, net: &str) -> KazeResult<String> {
        match self {
            Routed::A(p) => p.discover_best_node(net).await,
            Routed::B(p) => p.discover_best_node(net).await,
        }
    }

    async fn get_balance(&self, net: &str, address: &str) -> KazeResult<Balance> {
        match self {
            Routed::A(p) => p.get_balance(net, address).await,
            Routed::B(p) => p.get_balance(net, address).await,
        }
    }

    async fn get_claims(&self, net: &str, address: &str) -> KazeResult<Claims> {
        match self {
            Routed::A(p) => p.get_claims(net, address).await,
            Routed::B(p) => p.get_claims(net, address).await,
        }
    }

    async fn get_max_claimable(&self, net: &str, address: &str) -> KazeResult<Fixed8> {
        match self {
            Routed::A(p) => p.get_max_claimable(net, address).await,
            Routed::B(p) => p.get_max_claimable(net, address).await,
        }
    }

    async fn get_history(&self, net: &str, address: &str) -> KazeResult<Vec<PastTransaction>> {
        match self {
            Routed::A(p) => p.get_history(net, address).await,
            Routed::B(p) => p.get_history(net, address).await,
        }
    }

    async fn get_ledger_height(&self, net: &str) -> KazeResult<u64> {
        match self {
            Routed::A(p) => p.get_ledger_height(net).await,
            Routed::B(p) => p.get_ledger_height(net).await,
        }
    }
}

/// Routes provider calls between slot A and slot B using a shared [`RouterState`].
#[derive(Debug)]
pub struct AccessRouter<A, B> {
    a: A,
    b: B,
    state: Arc<RouterState>,
}

impl<A: Provider, B: Provider> AccessRouter<A, B> {
    pub fn new(a: A, b: B, state: Arc<RouterState>) -> Self {
        Self { a, b, state }
    }

    pub fn state(&self) -> &RouterState {
        &self.state
    }

    pub fn provider(&self, slot: Slot) -> Routed<'_, A, B> {
        match slot {
            Slot::A => Routed::A(&self.a),
            Slot::B => Routed::B(&self.b),
        }
    }

    /// Run `call` against a provider chosen by the routing weight, failing
    /// over to the other provider once.
    pub async fn route<'s, T, F, Fut>(&'s self, call: &'static str, f: F) -> KazeResult<T>
    where
        F: Fn(Routed<'s, A, B>) -> Fut,
        Fut: Future<Output = KazeResult<T>>,
    {
        let slot = self.state.choose();
        self.route_from(slot, call, f).await
    }

    pub(crate) async fn route_from<'s, T, F, Fut>(&'s self, slot: Slot, call: &'static str, f: F) -> KazeResult<T>
    where
        F: Fn(Routed<'s, A, B>) -> Fut,
        Fut: Future<Output = KazeResult<T>>,
    {
        let first = self.provider(slot);
        match f(first).await {
            Ok(value) => {
                metrics::record_provider_call(first.kind(), call, true);
                self.state.reward(slot);
                Ok(value)
            }
            Err(first_error) => {
                metrics::record_provider_call(first.kind(), call, false);
                let fallback = self.provider(slot.other());
                tracing::warn!(
                    provider = %first.kind(),
                    fallback = %fallback.kind(),
                    call,
                    error = %first_error,
                    "Provider call failed, failing over"
                );
                self.state.reward(slot.other());

                match f(fallback).await {
                    Ok(value) => {
                        metrics::record_provider_call(fallback.kind(), call, true);
                        Ok(value)
                    }
                    Err(e) => {
                        metrics::record_provider_call(fallback.kind(), call, false);
                        tracing::error!(provider = %fallback.kind(), call, error = %e, "Fallback provider failed");
                        Err(KazeError::Provider {
                            provider: fallback.kind(),
                            call,
                            source: Box::new(e),
                            primary: first.kind(),
                            primary_error: Box::new(first_error),
                        })
                    }
                }
            }
        }
    }

    pub async fn get_balance(&self, net: &str, address: &str) -> KazeResult<Balance> {
        self.route("get_balance", |p| async move { p.get_balance(net, address).await })
            .await
    }

    pub async fn get_claims(&self, net: &str, address: &str) -> KazeResult<Claims> {
        self.route("get_claims", |p| async move { p.get_claims(net, address).await })
            .await
    }

    pub async fn get_max_claimable(&self, net: &str, address: &str) -> KazeResult<Fixed8> {
        self.route("get_max_claimable", |p| async move { p.get_max_claimable(net, address).await })
            .await
    }

    pub async fn get_history(&self, net: &str, address: &str) -> KazeResult<Vec<PastTransaction>> {
        self.route("get_history", |p| async move { p.get_history(net, address).await })
            .await
    }

    pub async fn get_ledger_height(&self, net: &str) -> KazeResult<u64> {
        self.route("get_ledger_height", |p| async move { p.get_ledger_height(net).await })
            .await
    }

    pub async fn discover_best_node(&self, net: &str) -> KazeResult<String> {
        self.route("discover_best_node", |p| async move { p.discover_best_node(net).await })
            .await
    }
}
