use reqwest::{Client, Method, Response, Url};
use serde::{Serialize, de::DeserializeOwned};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("server error: status {status} body {body}")]
    Status { status: u16, body: String },
    #[error("failed to parse body: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Shared HTTP client bound to one base URL.
#[derive(Clone, Debug)]
pub struct ApiCtx {
    client: Client,
    base: Url,
}

impl ApiCtx {
    pub fn new(base: &str) -> Result<Self, ApiError> {
        let client = Client::builder().user_agent(Self::user_agent()).build()?;
        Self::with_client(client, base)
    }

    pub fn with_client(client: Client, base: &str) -> Result<Self, ApiError> {
        let mut base = Url::parse(base)?;
        // Relative joins must append to the base path, not replace its last segment.
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        Ok(Self { client, base })
    }

    pub fn user_agent() -> &'static str {
        concat!("ipsum/", env!("CARGO_PKG_VERSION"))
    }

    pub fn url(&self, path: &str) -> Result<Url, ApiError> {
        self.base.join(path).map_err(ApiError::Url)
    }

    /// Send a request to `path` under the base URL and decode the JSON reply.
    pub async fn request<T, B>(
        &self,
        method: Method,
        path: &str,
        query: Option<&[(&str, String)]>,
        body: Option<&B>,
    ) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let mut url = self.url(path)?;
        if let Some(q) = query {
            url.set_query(None);
            let mut qp = url.query_pairs_mut();
            for (k, v) in q {
                qp.append_pair(k, v);
            }
        }
        self.send(method, url, body).await
    }

    /// Send a request to an absolute URL, e.g. a pagination cursor.
    pub async fn request_url<T>(&self, method: Method, url: &str) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
    {
        let url = Url::parse(url)?;
        self.send::<T, ()>(method, url, None).await
    }

    async fn send<T, B>(&self, method: Method, url: Url, body: Option<&B>) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        debug!(method = %method, url = %url, "API request");
        let mut req = self.client.request(method.clone(), url.clone());
        if let Some(b) = body {
            req = req.json(b);
        }

        let resp = req.send().await?;
        debug!(
            method = %method,
            url = %url,
            status = resp.status().as_u16(),
            "API response"
        );
        Self::handle(resp).await
    }

    async fn handle<T: DeserializeOwned>(resp: Response) -> Result<T, ApiError> {
        let status = resp.status();
        let bytes = resp.bytes().await?;
        if !status.is_success() {
            let body = String::from_utf8_lossy(&bytes).into_owned();
            return Err(ApiError::Status {
                status: status.as_u16(),
                body,
            });
        }
        // An empty reply decodes as JSON null.
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(serde_json::from_slice(b"null")?);
        }
        Ok(serde_json::from_slice(&bytes)?)
    }
}
