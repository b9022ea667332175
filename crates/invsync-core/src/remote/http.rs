//! HTTP transport over a blocking `reqwest` client

use reqwest::blocking::Client;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

use super::transport::{Method, Request, Response, Transport};
use crate::Result;
use crate::config::Account;

/// [`Transport`] talking to a REST API over HTTP
pub struct HttpTransport {
    client: Client,
    base_url: String,
    authorization: Option<String>,
}

impl HttpTransport {
    /// Build a transport for `account`
    ///
    /// The account's secret, if any, is sent as `Bearer <username> <secret>`.
    pub fn new(account: &Account) -> Result<Self> {
        let timeout = Duration::from_secs(account.config.timeout_secs);
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .danger_accept_invalid_certs(!account.config.verify_tls)
            .build()?;

        let authorization = account
            .secret
            .as_ref()
            .map(|secret| format!("Bearer {} {}", account.config.username, secret));

        Ok(Self {
            client,
            base_url: account.config.address.trim_end_matches('/').to_string(),
            authorization,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }
}

impl Transport for HttpTransport {
    fn send(&self, request: &Request) -> Result<Response> {
        let url = self.url(&request.path);
        debug!(method = %request.method, url = %url, "Remote request");

        let mut req = match request.method {
            Method::Get => self.client.get(&url),
            Method::Post => self.client.post(&url),
            Method::Put => self.client.put(&url),
            Method::Delete => self.client.delete(&url),
        };
        req = req.header("Accept", "application/json");
        if let Some(auth) = &self.authorization {
            req = req.header("Authorization", auth);
        }
        for (name, value) in &request.headers {
            req = req.header(name, value);
        }
        if let Some(body) = &request.body {
            req = req.json(body);
        }

        let response = req.send()?;
        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_ascii_lowercase(), v.to_string()))
            })
            .collect();
        let text = response.text()?;
        let body = if text.trim().is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text).unwrap_or(Value::String(text))
        };

        debug!(status, url = %url, "Remote response");
        Ok(Response {
            status,
            body,
            headers,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AccountConfig;

    #[test]
    fn url_joins_without_double_slash() {
        let account = Account::new("prod", AccountConfig::new("https://cmk.example.com/api/1.0/"));
        let transport = HttpTransport::new(&account).unwrap();
        assert_eq!(
            transport.url("/domain-types/folder_config/collections/all"),
            "https://cmk.example.com/api/1.0/domain-types/folder_config/collections/all"
        );
    }

    #[test]
    fn authorization_uses_username_and_secret() {
        let mut account = Account::new("prod", AccountConfig::new("https://cmk.example.com"));
        account.config.username = "automation".to_string();
        account.secret = Some("s3cret".to_string());
        let transport = HttpTransport::new(&account).unwrap();
        assert_eq!(
            transport.authorization.as_deref(),
            Some("Bearer automation s3cret")
        );
    }
}
