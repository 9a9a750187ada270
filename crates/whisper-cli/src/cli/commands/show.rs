//! Overview of the current snapshot.

use url::Url;
use whisper_core::admin::AdminClient;

use super::site_host;

pub fn show(client: &AdminClient, site: &Url) {
    let acl = client.acl();

    println!("Locations on {}:", site_host(site));
    if acl.locations.is_empty() {
        println!("  (none)");
    }
    for location in &acl.locations {
        println!("  {}", location.path);
        if location.allowed_users.is_empty() {
            println!("    (no users)");
        }
        for user in &location.allowed_users {
            println!("    {}", user.email);
        }
    }

    println!("Users:");
    if acl.users.is_empty() {
        println!("  (none)");
    }
    for user in &acl.users {
        let paths: Vec<&str> = acl
            .accessible_locations(user)
            .map(|l| l.path.as_str())
            .collect();
        if paths.is_empty() {
            println!("  {}", user.email);
        } else {
            println!("  {} -> {}", user.email, paths.join(", "));
        }
    }
}
