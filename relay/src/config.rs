//! Relay configuration.

use crate::auth::GithubUserProvider;

/// Everything the relay needs to serve.
#[derive(Clone)]
pub struct Config {
    /// TCP listen port.
    pub port: u16,

    /// OAuth client id surfaced by `/_config`.
    pub github_client_id: String,

    /// Resolves bearer tokens to GitHub identities.
    pub github_user_provider: GithubUserProvider,

    /// Static token admitting the reserved `ci-test` subdomain.
    pub ci_test_token: String,

    /// Expose the `/debug/*` endpoints.
    pub debug: bool,
}
