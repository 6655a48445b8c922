use crate::api::{ApiRequest, ApiResponse, Method, Transport};
use crate::Result;
use anyhow::Context;
use tracing::trace;
use url::Url;

/// Sends requests to the expense service with `reqwest`.
pub(crate) struct HttpTransport {
    base_url: Url,
    client: reqwest::Client,
}

impl HttpTransport {
    pub(crate) fn new(base_url: Url) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("expenses/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Unable to build the HTTP client")?;
        Ok(Self { base_url, client })
    }

    fn url(&self, request: &ApiRequest) -> Result<Url> {
        build_url(&self.base_url, request)
    }
}

/// Joins the request path and query onto `base_url`, which must end with a `/`.
fn build_url(base_url: &Url, request: &ApiRequest) -> Result<Url> {
    let mut url = base_url
        .join(request.path.trim_start_matches('/'))
        .with_context(|| format!("Invalid request path '{}'", request.path))?;
    if !request.query.is_empty() {
        url.query_pairs_mut().extend_pairs(&request.query);
    }
    Ok(url)
}

#[async_trait::async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse> {
        let url = self.url(&request)?;
        let method = match request.method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Delete => reqwest::Method::DELETE,
        };
        trace!("{} {url}", request.method);

        let mut builder = self.client.request(method, url);
        if let Some(token) = &request.bearer {
            builder = builder.bearer_auth(token);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder
            .send()
            .await
            .with_context(|| format!("Unable to reach {}", self.base_url))?;
        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .context("Unable to read the response body")?;
        trace!("{} {} -> {status}", request.method, request.path);
        Ok(ApiResponse { status, body })
    }
}
