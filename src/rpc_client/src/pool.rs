// Copyright 2022 Singularity Data
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
// http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use petrel_common::error::Result;
use tokio::sync::OnceCell;

use crate::{QueryClient, TimeSeriesClient};

/// A client that can live in a [`ClientPool`].
#[async_trait]
pub trait PooledClient: Clone + Send + Sync + 'static {
    async fn shutdown(&self);
}

/// Creates clients on first use of an endpoint. A trait so tests can inject
/// mock transports.
#[async_trait]
pub trait ClientFactory<C>: Send + Sync + 'static {
    async fn connect(&self, host: &str, port: u16) -> Result<C>;
}

/// One persistent client per `(host, port)`. Entries are created lazily with
/// at-most-one construction per key: concurrent `get`s for the same endpoint
/// share a `OnceCell`, so only one of them dials.
pub struct ClientPool<C: PooledClient> {
    factory: Arc<dyn ClientFactory<C>>,
    clients: Mutex<HashMap<String, Arc<OnceCell<C>>>>,
}

pub type QueryClientPool = ClientPool<QueryClient>;
pub type TimeSeriesClientPool = ClientPool<TimeSeriesClient>;

impl<C: PooledClient> ClientPool<C> {
    pub fn new(factory: Arc<dyn ClientFactory<C>>) -> Self {
        Self {
            factory,
            clients: Mutex::new(HashMap::new()),
        }
    }

    /// Get the client bound to `(host, port)`, dialing it if absent. A failed
    /// dial leaves the entry empty, so a later `get` retries.
    pub async fn get(&self, host: &str, port: u16) -> Result<C> {
        let key = format!("{}_{}", host, port);
        let cell = {
            let mut clients = self.clients.lock();
            clients.entry(key).or_default().clone()
        };
        let client = cell
            .get_or_try_init(|| self.factory.connect(host, port))
            .await?;
        Ok(client.clone())
    }

    /// Shut down every cached client and clear the pool. `get` after shutdown
    /// is undefined: it will dial a fresh client against a dispatcher that is
    /// going away.
    pub async fn shutdown_all(&self) {
        let cells = {
            let mut clients = self.clients.lock();
            clients.drain().map(|(_, cell)| cell).collect::<Vec<_>>()
        };
        for cell in cells {
            if let Some(client) = cell.get() {
                client.shutdown().await;
            }
        }
    }

    pub fn cached_count(&self) -> usize {
        self.clients.lock().len()
    }
}

#[async_trait]
impl PooledClient for QueryClient {
    async fn shutdown(&self) {
        QueryClient::shutdown(self).await
    }
}

#[async_trait]
impl PooledClient for TimeSeriesClient {
    async fn shutdown(&self) {
        TimeSeriesClient::shutdown(self).await
    }
}

struct GrpcQueryClientFactory;

#[async_trait]
impl ClientFactory<QueryClient> for GrpcQueryClientFactory {
    async fn connect(&self, host: &str, port: u16) -> Result<QueryClient> {
        QueryClient::new(host, port).await
    }
}

struct GrpcTimeSeriesClientFactory;

#[async_trait]
impl ClientFactory<TimeSeriesClient> for GrpcTimeSeriesClientFactory {
    async fn connect(&self, host: &str, port: u16) -> Result<TimeSeriesClient> {
        TimeSeriesClient::new(host, port).await
    }
}

impl ClientPool<QueryClient> {
    /// Pool dialing real gRPC transports.
    pub fn grpc() -> Self {
        Self::new(Arc::new(GrpcQueryClientFactory))
    }
}

impl ClientPool<TimeSeriesClient> {
    /// Pool dialing real gRPC transports.
    pub fn grpc() -> Self {
        Self::new(Arc::new(GrpcTimeSeriesClientFactory))
    }
}
