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

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use petrel_common::error::ErrorCode::{ConnectionError, RpcError};
use petrel_common::error::Result;
use petrel_pb::task_service::time_series_service_client::TimeSeriesServiceClient;
use petrel_pb::task_service::{TimeSeriesQueryRequest, TimeSeriesResponse};
use tonic::transport::{Channel, Endpoint};

/// Client to one worker's time-series service. Cloning is lightweight.
#[derive(Clone)]
pub struct TimeSeriesClient {
    pub inner: Arc<dyn TimeSeriesClientInner>,
}

impl TimeSeriesClient {
    pub async fn new(host: &str, port: u16) -> Result<Self> {
        Ok(Self {
            inner: Arc::new(GrpcTimeSeriesClient::connect(host, port).await?),
        })
    }

    pub fn mock(inner: impl TimeSeriesClientInner + 'static) -> Self {
        Self {
            inner: Arc::new(inner),
        }
    }

    pub async fn submit(
        &self,
        request: TimeSeriesQueryRequest,
        timeout: Duration,
    ) -> Result<TimeSeriesResponse> {
        self.inner.submit(request, timeout).await
    }

    pub async fn shutdown(&self) {
        self.inner.shutdown().await
    }
}

#[async_trait]
pub trait TimeSeriesClientInner: Send + Sync {
    async fn submit(
        &self,
        request: TimeSeriesQueryRequest,
        timeout: Duration,
    ) -> Result<TimeSeriesResponse>;

    /// Initiate orderly shutdown of the underlying transport.
    async fn shutdown(&self) {}
}

pub struct GrpcTimeSeriesClient {
    client: TimeSeriesServiceClient<Channel>,
}

impl GrpcTimeSeriesClient {
    pub async fn connect(host: &str, port: u16) -> Result<Self> {
        let endpoint = Endpoint::from_shared(format!("http://{}:{}", host, port))
            .map_err(|e| ConnectionError(e.into()))?;
        let channel = endpoint
            .connect()
            .await
            .map_err(|e| ConnectionError(e.into()))?;
        Ok(Self {
            client: TimeSeriesServiceClient::new(channel),
        })
    }
}

#[async_trait]
impl TimeSeriesClientInner for GrpcTimeSeriesClient {
    async fn submit(
        &self,
        request: TimeSeriesQueryRequest,
        timeout: Duration,
    ) -> Result<TimeSeriesResponse> {
        let mut client = self.client.clone();
        let mut request = tonic::Request::new(request);
        request.set_timeout(timeout);
        let response = client.submit(request).await.map_err(|e| RpcError(e.into()))?;
        Ok(response.into_inner())
    }
}
