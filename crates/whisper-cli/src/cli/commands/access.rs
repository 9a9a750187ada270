//! Grant and revoke handlers.

use anyhow::Result;
use whisper_core::admin::AdminClient;

use super::{location_id, report, user_id};

pub async fn grant(client: &mut AdminClient, email: &str, path: &str) -> Result<()> {
    let location = location_id(client, path)?;
    let granted = client
        .grant_access(email, &location)
        .await
        .map_err(|e| report(client, e))?;

    match granted {
        Some(user) => println!("Granted {} access to {}", user.email, path.trim()),
        None => println!("Nothing to do: '{}' can already access {}", email.trim(), path.trim()),
    }
    Ok(())
}

pub async fn revoke(client: &mut AdminClient, email: &str, path: &str) -> Result<()> {
    let location = location_id(client, path)?;
    let user = user_id(client, email)?;
    client
        .revoke_access(&user, &location)
        .await
        .map_err(|e| report(client, e))?;
    println!("Revoked {} access to {}", email.trim(), path.trim());
    Ok(())
}
