//! Location command handlers.

use anyhow::Result;
use whisper_core::admin::AdminClient;

use super::{location_id, report};

pub fn list(client: &AdminClient) {
    let locations = &client.acl().locations;
    if locations.is_empty() {
        println!("No locations found.");
        return;
    }

    for location in locations {
        println!(
            "{} ({} allowed)",
            location.path,
            location.allowed_users.len()
        );
    }
}

pub async fn add(client: &mut AdminClient, path: &str) -> Result<()> {
    let added = client
        .add_location(path)
        .await
        .map_err(|e| report(client, e))?;

    match added {
        Some(location) => println!("Added location {}", location.path),
        None => println!("Location '{}' already exists or is empty.", path.trim()),
    }
    Ok(())
}

pub async fn remove(client: &mut AdminClient, path: &str) -> Result<()> {
    let id = location_id(client, path)?;
    let removed = client
        .remove_location(&id)
        .await
        .map_err(|e| report(client, e))?;
    println!("Removed location {}", removed.path);
    Ok(())
}
