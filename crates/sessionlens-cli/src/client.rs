#![deny(clippy::all, clippy::pedantic)]

use std::fs;

use reqwest::{Client, Url, header};
use serde_json::Value;
use sessionlens_api_types::GraphqlRequest;
use thiserror::Error;

use crate::args::Cli;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("authorization token is required (use --token-file or ALVA_API_TOKEN)")]
    MissingToken,
    #[error("failed to read token file: {0}")]
    TokenFile(std::io::Error),
    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("server error: {0}")]
    Server(String),
    #[error("GraphQL errors: {0}")]
    Graphql(String),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("failed to write output file {path}: {source}")]
    Output {
        path: String,
        source: std::io::Error,
    },
}

#[derive(Clone)]
pub struct Ctx {
    pub client: Client,
    pub endpoint: Url,
    token: String,
}

impl std::fmt::Debug for Ctx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ctx")
            .field("endpoint", &self.endpoint.as_str())
            .field("token", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}

impl Ctx {
    pub fn new(endpoint: &str, token: String) -> Result<Self, CliError> {
        let endpoint = Url::parse(endpoint)?;
        let client = Client::builder().user_agent(Self::user_agent()).build()?;
        Ok(Self {
            client,
            endpoint,
            token,
        })
    }

    pub fn user_agent() -> &'static str {
        concat!("sessionlens-cli/", env!("CARGO_PKG_VERSION"))
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    /// Post `request` and return the response document.
    ///
    /// A non-2xx status or a top-level `errors` array is an error.
    pub async fn execute(&self, request: &GraphqlRequest) -> Result<Value, CliError> {
        let resp = self
            .client
            .post(self.endpoint.clone())
            .header(header::AUTHORIZATION, &self.token)
            .json(request)
            .send()
            .await?;

        let status = resp.status();
        let bytes = resp.bytes().await?;
        if !status.is_success() {
            let text = String::from_utf8_lossy(&bytes).into_owned();
            return Err(CliError::Server(format!("status {status} body {text}")));
        }

        let document: Value = serde_json::from_slice(&bytes)
            .map_err(|e| CliError::Server(format!("failed to parse body: {e}")))?;
        if let Some(errors) = document.get("errors") {
            return Err(CliError::Graphql(errors.to_string()));
        }
        Ok(document)
    }
}

pub fn build_ctx_from_cli(cli: &Cli) -> Result<Ctx, CliError> {
    let token = if let Some(path) = &cli.token_file {
        fs::read_to_string(path)
            .map_err(CliError::TokenFile)?
            .trim()
            .to_string()
    } else {
        cli.token_env.clone().ok_or(CliError::MissingToken)?
    };
    if token.is_empty() {
        return Err(CliError::MissingToken);
    }

    Ctx::new(&cli.endpoint, token)
}
