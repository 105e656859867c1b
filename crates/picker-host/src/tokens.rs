//! Token providers.
//!
//! A provider resolves a bearer token for a resource audience. `Ok(None)`
//! means no usable token was issued; `Err` means the identity layer failed.
//! Callers must not use a missing token as credential material.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use picker_core::{AuthToken, PickerError, PickerResult};
use serde::Deserialize;
use tokio::sync::RwLock;
use tracing::{debug, warn};

/// Boxed future returned by [`TokenProvider::get_token`].
pub type TokenFuture<'a> = Pin<Box<dyn Future<Output = PickerResult<Option<AuthToken>>> + Send + 'a>>;

/// Resolves bearer tokens for resource audiences.
pub trait TokenProvider: Send + Sync {
    fn get_token<'a>(&'a self, resource: &'a str) -> TokenFuture<'a>;
}

impl<T: TokenProvider + ?Sized> TokenProvider for Arc<T> {
    fn get_token<'a>(&'a self, resource: &'a str) -> TokenFuture<'a> {
        (**self).get_token(resource)
    }
}

/// Tokens held in memory, keyed by resource (trailing slashes ignored).
#[derive(Default)]
pub struct StaticTokenProvider {
    tokens: RwLock<HashMap<String, AuthToken>>,
    fallback: Option<AuthToken>,
}

impl StaticTokenProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from `(resource, token)` pairs.
    pub fn from_pairs<I, R, T>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (R, T)>,
        R: AsRef<str>,
        T: Into<AuthToken>,
    {
        let tokens = pairs
            .into_iter()
            .map(|(r, t)| (normalize_resource(r.as_ref()), t.into()))
            .collect();
        Self {
            tokens: RwLock::new(tokens),
            fallback: None,
        }
    }

    /// Token returned for resources without an explicit entry.
    pub fn with_fallback(mut self, token: impl Into<AuthToken>) -> Self {
        self.fallback = Some(token.into());
        self
    }

    pub async fn insert(&self, resource: &str, token: impl Into<AuthToken>) {
        self.tokens
            .write()
            .await
            .insert(normalize_resource(resource), token.into());
    }

    pub async fn remove(&self, resource: &str) {
        self.tokens.write().await.remove(&normalize_resource(resource));
    }
}

impl TokenProvider for StaticTokenProvider {
    fn get_token<'a>(&'a self, resource: &'a str) -> TokenFuture<'a> {
        Box::pin(async move {
            let tokens = self.tokens.read().await;
            let token = tokens
                .get(&normalize_resource(resource))
                .or(self.fallback.as_ref())
                .cloned();
            debug!(resource, found = token.is_some(), "static token lookup");
            Ok(token)
        })
    }
}

fn normalize_resource(resource: &str) -> String {
    resource.trim_end_matches('/').to_ascii_lowercase()
}

/// OAuth2 client-credentials provider.
///
/// Requests `<resource>/.default` from a token endpoint, e.g.
/// `https://login.microsoftonline.com/<tenant>/oauth2/v2.0/token`.
pub struct HttpTokenProvider {
    client: reqwest::Client,
    token_endpoint: String,
    client_id: String,
    client_secret: String,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
}

impl HttpTokenProvider {
    pub fn new(
        token_endpoint: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            token_endpoint: token_endpoint.into(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
        }
    }

    async fn fetch(&self, resource: &str) -> PickerResult<Option<AuthToken>> {
        let scope = scope_for(resource);
        debug!(endpoint = %self.token_endpoint, scope = %scope, "requesting token");

        let resp = self
            .client
            .post(&self.token_endpoint)
            .form(&[
                ("grant_type", "client_credentials"),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("scope", scope.as_str()),
            ])
            .send()
            .await
            .map_err(|e| PickerError::Transport(format!("token request failed: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            warn!(status = %status, resource, "token endpoint rejected request");
            return Err(PickerError::AuthFailed(format!(
                "token endpoint returned {status}"
            )));
        }

        let body: TokenResponse = resp
            .json()
            .await
            .map_err(|e| PickerError::Codec(format!("token response: {e}")))?;
        Ok(body
            .access_token
            .filter(|t| !t.is_empty())
            .map(AuthToken::new))
    }
}

impl TokenProvider for HttpTokenProvider {
    fn get_token<'a>(&'a self, resource: &'a str) -> TokenFuture<'a> {
        Box::pin(self.fetch(resource))
    }
}

/// Scope string requested for a resource audience.
pub fn scope_for(resource: &str) -> String {
    format!("{}/.default", resource.trim_end_matches('/'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn static_lookup_ignores_trailing_slash_and_case() {
        let provider = StaticTokenProvider::from_pairs([("https://Contoso.sharepoint.com/", "tok-123")]);
        let token = provider
            .get_token("https://contoso.sharepoint.com")
            .await
            .unwrap();
        assert_eq!(token.unwrap().secret(), "tok-123");
    }

    #[tokio::test]
    async fn static_missing_resource_is_none() {
        let provider = StaticTokenProvider::new();
        assert!(provider.get_token("https://x").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn static_fallback_and_mutation() {
        let provider = StaticTokenProvider::new().with_fallback("any");
        assert_eq!(
            provider.get_token("https://x").await.unwrap().unwrap().secret(),
            "any"
        );
        provider.insert("https://x", "specific").await;
        assert_eq!(
            provider.get_token("https://x").await.unwrap().unwrap().secret(),
            "specific"
        );
        provider.remove("https://x").await;
        assert_eq!(
            provider.get_token("https://x").await.unwrap().unwrap().secret(),
            "any"
        );
    }

    #[tokio::test]
    async fn arc_provider_delegates() {
        let provider: Arc<dyn TokenProvider> =
            Arc::new(StaticTokenProvider::from_pairs([("https://x", "t")]));
        assert!(provider.get_token("https://x").await.unwrap().is_some());
    }

    #[test]
    fn scope_strips_trailing_slash() {
        assert_eq!(
            scope_for("https://contoso.sharepoint.com/"),
            "https://contoso.sharepoint.com/.default"
        );
    }
}
