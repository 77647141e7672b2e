use std::{ops::Deref, sync::Arc};

use reqwest::{
    header::{HeaderMap, HeaderValue, REFERER, USER_AGENT},
    Client, ClientBuilder,
};

use crate::error::SponsrResult;

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0";
pub const DEFAULT_REFERER: &str = "https://kinescope.io/";

#[derive(Clone)]
pub struct HttpClient {
    client: Arc<Client>,
    referer: Arc<str>,
}

impl HttpClient {
    /// Builds a client on top of `builder`, so callers can set their own timeouts.
    pub fn new(builder: ClientBuilder, referer: Option<&str>) -> SponsrResult<Self> {
        let referer = referer.unwrap_or(DEFAULT_REFERER);

        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static(DEFAULT_USER_AGENT));
        if let Ok(value) = HeaderValue::from_str(referer) {
            headers.insert(REFERER, value);
        } else {
            tracing::warn!("Ignored invalid referer: {referer}");
        }

        let client = builder.default_headers(headers).build()?;
        Ok(Self {
            client: Arc::new(client),
            referer: referer.into(),
        })
    }

    pub fn referer(&self) -> &str {
        &self.referer
    }

    /// Scheme and host of the referer, used as the `Origin` of license requests.
    pub fn origin(&self) -> String {
        match url::Url::parse(&self.referer) {
            Ok(url) => url.origin().ascii_serialization(),
            Err(_) => self.referer.trim_end_matches('/').to_string(),
        }
    }
}

impl Deref for HttpClient {
    type Target = Client;

    fn deref(&self) -> &Self::Target {
        &self.client
    }
}
