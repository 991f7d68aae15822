use anyhow::Result;
use tracing_subscriber::EnvFilter;

use reqbouncer_relay::{auth, serve, Config};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("reqbouncer_relay=info")),
        )
        .init();

    let port: u16 = std::env::var("PORT")
        .unwrap_or_else(|_| "4040".to_string())
        .parse()
        .unwrap_or(4040);
    let github_client_id = std::env::var("REQBOUNCER_GITHUB_CLIENT_ID").unwrap_or_default();
    let ci_test_token = std::env::var("REQBOUNCER_CI_TEST_TOKEN").unwrap_or_default();
    let debug = matches!(
        std::env::var("REQBOUNCER_DEBUG").as_deref(),
        Ok("1") | Ok("true")
    );

    serve(Config {
        port,
        github_client_id,
        github_user_provider: auth::github_user_provider(),
        ci_test_token,
        debug,
    })
    .await
}
