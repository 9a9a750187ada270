//! User command handlers.

use anyhow::Result;
use whisper_core::admin::AdminClient;

use super::{report, user_id};

pub fn list(client: &AdminClient) {
    let acl = client.acl();
    if acl.users.is_empty() {
        println!("No users found.");
        return;
    }

    for user in &acl.users {
        let count = acl.accessible_locations(user).count();
        println!("{} ({count} locations)", user.email);
    }
}

pub async fn add(client: &mut AdminClient, email: &str) -> Result<()> {
    let user = client.add_user(email).await.map_err(|e| report(client, e))?;
    println!("Added user {}", user.email);
    Ok(())
}

pub async fn remove(client: &mut AdminClient, email: &str) -> Result<()> {
    let id = user_id(client, email)?;
    let removed = client
        .remove_user(&id)
        .await
        .map_err(|e| report(client, e))?;
    println!("Removed user {}", removed.email);
    Ok(())
}
