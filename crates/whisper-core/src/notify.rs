//! Composes the message telling users what was shared with them.

use crate::model::{AccessControl, Location, User};

/// A ready-to-send notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    /// Comma separated recipients.
    pub to: String,
    pub body: String,
}

/// Builds a notification for `to` listing `paths` on `host`.
pub fn compose<S: AsRef<str>, P: AsRef<str>>(to: &[S], paths: &[P], host: &str) -> Notification {
    let to = to.iter().map(AsRef::as_ref).collect::<Vec<_>>().join(", ");

    if paths.is_empty() {
        return Notification {
            to,
            body: "I have shared nothing with you. Enjoy.".to_string(),
        };
    }

    let website = if paths.len() > 1 { "websites" } else { "a website" };
    let urls = paths
        .iter()
        .map(|path| {
            let path = path.as_ref();
            let sep = if path.starts_with('/') { "" } else { "/" };
            format!("https://{host}{sep}{path}")
        })
        .collect::<Vec<_>>()
        .join("\n");

    Notification {
        to,
        body: format!("I have shared {website} with you.\nPlease visit:\n{urls}"),
    }
}

/// Notification for one user covering every location it can access.
pub fn for_user(acl: &AccessControl, user: &User, host: &str) -> Notification {
    let paths: Vec<&str> = acl
        .accessible_locations(user)
        .map(|l| l.path.as_str())
        .collect();
    compose(&[user.email.as_str()], &paths, host)
}

/// Notification for everyone allowed to access `location`.
pub fn for_location(location: &Location, host: &str) -> Notification {
    let to: Vec<&str> = location
        .allowed_users
        .iter()
        .map(|u| u.email.as_str())
        .collect();
    compose(&to, &[location.path.as_str()], host)
}
