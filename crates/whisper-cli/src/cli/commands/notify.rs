//! Notification handler.

use anyhow::{Context, Result};
use url::Url;
use whisper_core::admin::AdminClient;
use whisper_core::notify::{self, Notification};

use super::site_host;

pub fn run(
    client: &AdminClient,
    site: &Url,
    user: Option<&str>,
    location: Option<&str>,
) -> Result<()> {
    let host = site_host(site);
    let acl = client.acl();

    let note: Notification = match (user, location) {
        (Some(email), _) => {
            let email = email.trim();
            let user = acl
                .find_user_with_email(email)
                .with_context(|| format!("No user with email '{email}'"))?;
            notify::for_user(acl, user, &host)
        }
        (None, Some(path)) => {
            let path = path.trim();
            let location = acl
                .find_location_with_path(path)
                .with_context(|| format!("No location with path '{path}'"))?;
            notify::for_location(location, &host)
        }
        (None, None) => anyhow::bail!("Please specify --user or --location"),
    };

    println!("To: {}", note.to);
    println!();
    println!("{}", note.body);
    Ok(())
}
