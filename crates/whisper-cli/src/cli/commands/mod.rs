//! CLI command handlers.

pub mod access;
pub mod config;
pub mod locations;
pub mod notify;
pub mod show;
pub mod users;

use anyhow::{Context, Result};
use url::Url;
use whisper_core::admin::{AdminClient, AdminError};
use whisper_core::config::Config;
use whisper_core::stub::{RequestDispatcher, failure_handler};

/// Builds an admin client for the configured site and loads its snapshot.
///
/// Unless `error_page` is set, request failures are logged by a default
/// handler and reported as a short error; otherwise no handler is installed
/// and the server's error body is printed as is.
pub async fn connect(config: &Config, site: Option<&str>, error_page: bool) -> Result<AdminClient> {
    let admin_url = config.admin_url(site)?;

    let mut builder = RequestDispatcher::builder(admin_url.clone())
        .csrf_path(config.csrf_path.clone())
        .timeout(config.timeout());
    if !error_page {
        builder = builder.error_handler(failure_handler(|body, status| {
            tracing::debug!(status, body_len = body.len(), "admin request failed");
        }));
    }

    let mut client = AdminClient::new(builder.build()?);
    client
        .refresh()
        .await
        .map_err(|e| report(&client, e))
        .with_context(|| format!("load locations and users from {admin_url}"))?;
    Ok(client)
}

/// Routes request failures through the dispatcher's handler chain and
/// converts the error for the CLI.
pub fn report(client: &AdminClient, err: AdminError) -> anyhow::Error {
    if let Some(failure) = err.failure() {
        client.dispatcher().report_failure(failure, None);
    }
    anyhow::Error::new(err)
}

/// Host (with port, if any) as shown in links to the site.
pub fn site_host(url: &Url) -> String {
    let host = url.host_str().unwrap_or_default();
    match url.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    }
}

fn location_id(client: &AdminClient, path: &str) -> Result<String> {
    let path = path.trim();
    client
        .acl()
        .find_location_with_path(path)
        .map(|l| l.id.clone())
        .with_context(|| format!("No location with path '{path}'"))
}

fn user_id(client: &AdminClient, email: &str) -> Result<String> {
    let email = email.trim();
    client
        .acl()
        .find_user_with_email(email)
        .map(|u| u.id.clone())
        .with_context(|| format!("No user with email '{email}'"))
}
