//! Token providers with scripted failure modes.

use picker_core::PickerError;

use crate::tokens::{TokenFuture, TokenProvider};

/// Identity layer that always rejects.
pub struct FailingTokenProvider;

impl TokenProvider for FailingTokenProvider {
    fn get_token<'a>(&'a self, resource: &'a str) -> TokenFuture<'a> {
        Box::pin(async move {
            Err(PickerError::AuthFailed(format!("no consent for {resource}")))
        })
    }
}

/// Identity layer that never answers.
pub struct PendingTokenProvider;

impl TokenProvider for PendingTokenProvider {
    fn get_token<'a>(&'a self, _resource: &'a str) -> TokenFuture<'a> {
        Box::pin(std::future::pending())
    }
}
