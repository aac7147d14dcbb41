//! Scenario executor: the calls under test

use coursecheck_common::{HarnessError, HarnessResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

use crate::assert::Check;
use crate::client::{ApiClient, ApiResponse, HttpMethod};
use crate::template::Bindings;

/// One call under test together with what its response must satisfy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestSpec {
    #[serde(default)]
    pub method: HttpMethod,

    /// Path relative to the base URL; may contain `${alias}`
    pub path: String,

    #[serde(default)]
    pub body: Option<Value>,

    #[serde(default)]
    pub expect: Vec<Check>,
}

impl RequestSpec {
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            method: HttpMethod::Get,
            path: path.into(),
            body: None,
            expect: Vec::new(),
        }
    }

    pub fn expect(mut self, check: Check) -> Self {
        self.expect.push(check);
        self
    }
}

pub struct Executor<'a> {
    client: &'a ApiClient,
}

impl<'a> Executor<'a> {
    pub fn new(client: &'a ApiClient) -> Self {
        Self { client }
    }

    /// Issue every request in order, one attempt each, waiting for each
    /// response before sending the next
    pub async fn execute(
        &self,
        requests: &[RequestSpec],
        bindings: &Bindings,
    ) -> HarnessResult<Vec<ApiResponse>> {
        let mut responses = Vec::with_capacity(requests.len());
        for request in requests {
            let path = bindings
                .resolve_str(&request.path)
                .map_err(HarnessError::SpecParse)?;
            let body = request
                .body
                .as_ref()
                .map(|b| bindings.resolve_value(b))
                .transpose()
                .map_err(HarnessError::SpecParse)?;

            let response = self.client.send(request.method, &path, body.as_ref()).await?;
            info!("{} {} -> {}", request.method, path, response.status);
            responses.push(response);
        }
        Ok(responses)
    }
}
