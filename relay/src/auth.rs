//! Bearer-token auth gate for tunnel dials.
//!
//! Checks run in order: the Authorization header must be a well-formed
//! `Bearer <token>`, the reserved `ci-test` subdomain only admits the
//! static CI token, and any other dial resolves the token to a GitHub
//! identity whose login must match the requested subdomain. Loopback
//! dials carry no meaningful subdomain, so any authenticated identity is
//! admitted there.

use std::sync::Arc;

use axum::http::header::AUTHORIZATION;
use axum::http::HeaderMap;
use futures_util::future::BoxFuture;
use serde::Deserialize;
use tracing::error;

use reqbouncer_shared::Error;

/// Identity resolved from a bearer token.
#[derive(Debug, Clone, Deserialize)]
pub struct GithubUser {
    pub login: String,
}

/// Async `token -> identity` function.
pub type GithubUserProvider =
    Arc<dyn Fn(String) -> BoxFuture<'static, anyhow::Result<GithubUser>> + Send + Sync>;

/// Subdomain reserved for CI smoke tests.
const CI_TEST_SUBDOMAIN: &str = "ci-test";

/// Validate the dial against the requested subdomain. Returns the
/// resolved identity, or `None` on the CI-token path. No session state is
/// created here.
pub async fn authorize(
    headers: &HeaderMap,
    subdomain: &str,
    ci_test_token: &str,
    provider: &GithubUserProvider,
) -> Result<Option<GithubUser>, Error> {
    let header = headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .ok_or(Error::MissingAuth)?;

    let parts: Vec<&str> = header.split(' ').collect();
    if parts.len() != 2 || parts[0] != "Bearer" {
        return Err(Error::MalformedAuth);
    }
    let token = parts[1];

    if subdomain == CI_TEST_SUBDOMAIN {
        // An unset CI token disables the reserved subdomain entirely.
        if ci_test_token.is_empty() || token != ci_test_token {
            return Err(Error::InvalidToken);
        }
        return Ok(None);
    }

    let user = match provider(token.to_string()).await {
        Ok(user) => user,
        Err(err) => {
            error!(error = %err, "error getting user from github");
            return Err(Error::InvalidToken);
        }
    };

    if !is_loopback(subdomain) && !user.login.eq_ignore_ascii_case(subdomain) {
        return Err(Error::NotAllowed);
    }

    Ok(Some(user))
}

/// Loopback dials carry the whole `host:port` as their subdomain label.
pub fn is_loopback(subdomain: &str) -> bool {
    subdomain.starts_with("localhost:") || subdomain.starts_with("127.0.0.1:")
}

/// Default provider backed by the GitHub `/user` endpoint.
pub fn github_user_provider() -> GithubUserProvider {
    let client = reqwest::Client::new();
    Arc::new(move |token: String| {
        let client = client.clone();
        Box::pin(async move {
            let user = client
                .get("https://api.github.com/user")
                .bearer_auth(token)
                .header(reqwest::header::USER_AGENT, "reqbouncer")
                .send()
                .await?
                .error_for_status()?
                .json::<GithubUser>()
                .await?;
            Ok(user)
        })
    })
}
