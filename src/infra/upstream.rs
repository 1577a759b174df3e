//! HTTP client for the remote GraphQL API.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Url, header};
use serde_json::{Value, json};
use sessionlens_api_types::GraphqlRequest;

use crate::application::upstream::{GraphqlUpstream, UpstreamError};
use crate::domain::entities::BearerToken;
use crate::infra::error::InfraError;

#[derive(Clone, Debug)]
pub struct ReqwestGraphqlClient {
    client: Client,
    endpoint: Url,
}

impl ReqwestGraphqlClient {
    pub fn new(endpoint: Url, timeout: Duration) -> Result<Self, InfraError> {
        let client = Client::builder()
            .user_agent(concat!("sessionlens/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .map_err(|err| InfraError::http_client(err.to_string()))?;
        Ok(Self { client, endpoint })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

#[async_trait]
impl GraphqlUpstream for ReqwestGraphqlClient {
    async fn execute(
        &self,
        request: &GraphqlRequest,
        token: &BearerToken,
    ) -> Result<Value, UpstreamError> {
        let body = json!({
            "query": request.query,
            "variables": request.variables.clone().unwrap_or_else(|| json!({})),
        });

        let response = self
            .client
            .post(self.endpoint.clone())
            .header(header::AUTHORIZATION, token.expose())
            .json(&body)
            .send()
            .await
            .map_err(|err| UpstreamError::transport(err.without_url().to_string()))?;

        let status = response.status();
        let bytes = response
            .bytes()
            .await
            .map_err(|err| UpstreamError::transport(err.without_url().to_string()))?;

        if !status.is_success() {
            return Err(UpstreamError::Status {
                status: status.as_u16(),
                body: String::from_utf8_lossy(&bytes).into_owned(),
            });
        }

        serde_json::from_slice(&bytes)
            .map_err(|err| UpstreamError::malformed(format!("failed to parse body: {err}")))
    }
}
