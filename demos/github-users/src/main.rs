//! Lists GitHub users, then the repositories of the first one.
//!
//! Run with:
//!
//! ```bash
//! RUST_LOG=info cargo run -p github-users
//! ```

use actionpipe_core::ActionState;
use actionpipe_http::{HttpConfig, ReqwestClient};
use actionpipe_runtime::metrics::MetricsServer;
use actionpipe_runtime::{
    ActionClient, ActionStreamExt, ClientConfig, LoggingInterceptor, first_item,
};
use futures::StreamExt;
use github_users::config::DemoConfig;
use github_users::{User, UserReposAction, UsersAction};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "github_users=info,actionpipe_runtime=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = DemoConfig::from_env()?;
    tracing::info!(api_url = %config.api_url, since = config.since, "Starting GitHub users demo");

    let mut metrics = config.metrics_addr.map(MetricsServer::new);
    if let Some(server) = metrics.as_mut() {
        server.start()?;
    }

    let http = ReqwestClient::new(
        HttpConfig::default()
            .with_timeout(config.timeout)
            .with_user_agent("actionpipe-github-users"),
    )?;
    let client = ActionClient::builder()
        .base_url(&config.api_url)
        .http_client(http)
        .interceptor(LoggingInterceptor::new())
        .config(
            ClientConfig::default().with_default_header("Accept", "application/vnd.github+json"),
        )
        .build()?;

    let users = client.pipe::<UsersAction>();
    let repos = client.pipe::<UserReposAction>();

    // Print every successful users listing, whoever sent it.
    let mut listings = users.observe_success();
    let printer = tokio::spawn(async move {
        while let Some((action, response)) = listings.next().await {
            let logins: Vec<&str> = response.body.iter().map(|u| u.login.as_str()).collect();
            tracing::info!(since = action.since, count = logins.len(), "received {logins:?}");
        }
    });

    let fire_and_forget = users.send(UsersAction {
        since: config.since,
    });

    let mut chain = users
        .dispatch(UsersAction {
            since: config.since,
        })
        .then_dispatch(&repos, first_item(|user: &User| UserReposAction::new(&user.login)));

    while let Some(event) = chain.next().await {
        match event {
            Ok(ActionState::Started { action, .. }) => {
                tracing::info!(login = %action.login, "repos request started");
            }
            Ok(ActionState::Succeeded {
                action, response, ..
            }) => {
                let names: Vec<&str> = response.body.iter().map(|r| r.name.as_str()).collect();
                tracing::info!(login = %action.login, "repos request finished {names:?}");
            }
            Ok(ActionState::Failed { action, error, .. }) => {
                tracing::error!(login = %action.login, %error, "repos request failed");
            }
            Err(error) => tracing::error!(%error, "users request failed"),
        }
    }

    fire_and_forget.wait().await;
    printer.abort();

    if let Some(rendered) = metrics.as_ref().and_then(MetricsServer::render) {
        tracing::debug!("metrics:\n{rendered}");
    }

    Ok(())
}
