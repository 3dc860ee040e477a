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
use petrel_pb::task_service::query_service_client::QueryServiceClient;
use petrel_pb::task_service::{CancelRequest, ExplainResponse, QueryRequest, QueryResponse};
use tonic::transport::{Channel, Endpoint};

/// Client to one worker's query service. Cloning the instance is lightweight.
#[derive(Clone)]
pub struct QueryClient {
    pub inner: Arc<dyn QueryClientInner>,
}

impl QueryClient {
    /// Connect to the query service at `host:port`.
    pub async fn new(host: &str, port: u16) -> Result<Self> {
        Ok(Self {
            inner: Arc::new(GrpcQueryClient::connect(host, port).await?),
        })
    }

    pub fn mock(inner: impl QueryClientInner + 'static) -> Self {
        Self {
            inner: Arc::new(inner),
        }
    }

    pub async fn submit(&self, request: QueryRequest, timeout: Duration) -> Result<QueryResponse> {
        self.inner.submit(request, timeout).await
    }

    pub async fn explain(
        &self,
        request: QueryRequest,
        timeout: Duration,
    ) -> Result<Vec<ExplainResponse>> {
        self.inner.explain(request, timeout).await
    }

    pub async fn cancel(&self, request_id: u64) -> Result<()> {
        self.inner.cancel(request_id).await
    }

    pub async fn shutdown(&self) {
        self.inner.shutdown().await
    }
}

/// The transport seam: implemented by the gRPC client below and by mocks in
/// tests.
#[async_trait]
pub trait QueryClientInner: Send + Sync {
    async fn submit(&self, request: QueryRequest, timeout: Duration) -> Result<QueryResponse>;

    async fn explain(
        &self,
        request: QueryRequest,
        timeout: Duration,
    ) -> Result<Vec<ExplainResponse>>;

    async fn cancel(&self, request_id: u64) -> Result<()>;

    /// Initiate orderly shutdown of the underlying transport.
    async fn shutdown(&self) {}
}

pub struct GrpcQueryClient {
    client: QueryServiceClient<Channel>,
}

impl GrpcQueryClient {
    pub async fn connect(host: &str, port: u16) -> Result<Self> {
        let endpoint = Endpoint::from_shared(format!("http://{}:{}", host, port))
            .map_err(|e| ConnectionError(e.into()))?;
        let channel = endpoint
            .connect()
            .await
            .map_err(|e| ConnectionError(e.into()))?;
        Ok(Self {
            client: QueryServiceClient::new(channel),
        })
    }

    fn request_with_timeout<T>(message: T, timeout: Duration) -> tonic::Request<T> {
        let mut request = tonic::Request::new(message);
        request.set_timeout(timeout);
        request
    }
}

#[async_trait]
impl QueryClientInner for GrpcQueryClient {
    async fn submit(&self, request: QueryRequest, timeout: Duration) -> Result<QueryResponse> {
        let mut client = self.client.clone();
        let response = client
            .submit(Self::request_with_timeout(request, timeout))
            .await
            .map_err(|e| RpcError(e.into()))?;
        Ok(response.into_inner())
    }

    async fn explain(
        &self,
        request: QueryRequest,
        timeout: Duration,
    ) -> Result<Vec<ExplainResponse>> {
        let mut client = self.client.clone();
        let mut stream = client
            .explain(Self::request_with_timeout(request, timeout))
            .await
            .map_err(|e| RpcError(e.into()))?
            .into_inner();

        let mut responses = Vec::new();
        while let Some(response) = stream.message().await.map_err(|e| RpcError(e.into()))? {
            responses.push(response);
        }
        Ok(responses)
    }

    async fn cancel(&self, request_id: u64) -> Result<()> {
        let mut client = self.client.clone();
        client
            .cancel(tonic::Request::new(CancelRequest { request_id }))
            .await
            .map_err(|e| RpcError(e.into()))?;
        Ok(())
    }
}
