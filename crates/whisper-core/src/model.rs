//! Access-control records and the lookups built over them.
//!
//! Field names follow the JSON the admin API serves (`self`,
//! `allowedUsers`). Ids are URNs of the form `urn:uuid:<uuid>`.

use serde::{Deserialize, Serialize};

const URN_UUID_PREFIX: &str = "urn:uuid:";

/// Strips the `urn:uuid:` prefix from an id.
pub fn urn_to_uuid(urn: &str) -> &str {
    urn.strip_prefix(URN_UUID_PREFIX).unwrap_or(urn)
}

/// A user that can be granted access to locations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    /// URL of the user resource.
    #[serde(rename = "self")]
    pub self_url: String,
    pub email: String,
}

impl User {
    pub fn uuid(&self) -> &str {
        urn_to_uuid(&self.id)
    }
}

/// A protected path of the site.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    pub id: String,
    /// URL of the location resource.
    #[serde(rename = "self")]
    pub self_url: String,
    pub path: String,
    #[serde(default)]
    pub allowed_users: Vec<User>,
}

impl Location {
    pub fn uuid(&self) -> &str {
        urn_to_uuid(&self.id)
    }

    /// Resource that represents `user`'s permission to access this location.
    pub fn allowed_user_url(&self, user: &User) -> String {
        let sep = if self.self_url.ends_with('/') { "" } else { "/" };
        format!("{}{sep}allowed-users/{}/", self.self_url, user.uuid())
    }

    pub fn allowed_user_ids(&self) -> impl Iterator<Item = &str> {
        self.allowed_users.iter().map(|u| u.id.as_str())
    }
}

/// Body of `GET api/locations/`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LocationList {
    pub locations: Vec<Location>,
}

/// Body of `GET api/users/`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserList {
    pub users: Vec<User>,
}

/// Snapshot of locations and users, rebuilt on every refresh.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccessControl {
    pub locations: Vec<Location>,
    pub users: Vec<User>,
}

impl AccessControl {
    pub fn new(locations: Vec<Location>, users: Vec<User>) -> Self {
        Self { locations, users }
    }

    pub fn can_access(user: &User, location: &Location) -> bool {
        location.allowed_user_ids().any(|id| id == user.id)
    }

    pub fn find_user_with_email(&self, email: &str) -> Option<&User> {
        self.users.iter().find(|u| u.email == email)
    }

    pub fn find_user_with_id(&self, id: &str) -> Option<&User> {
        self.users.iter().find(|u| u.id == id)
    }

    pub fn find_location_with_id(&self, id: &str) -> Option<&Location> {
        self.locations.iter().find(|l| l.id == id)
    }

    pub fn find_location_with_path(&self, path: &str) -> Option<&Location> {
        self.locations.iter().find(|l| l.path == path)
    }

    /// Locations `user` is allowed to access, in listing order.
    pub fn accessible_locations<'a>(
        &'a self,
        user: &'a User,
    ) -> impl Iterator<Item = &'a Location> {
        self.locations
            .iter()
            .filter(move |l| Self::can_access(user, l))
    }

    pub fn location_paths(&self) -> Vec<&str> {
        self.locations.iter().map(|l| l.path.as_str()).collect()
    }

    pub fn has_location_path(&self, path: &str) -> bool {
        self.find_location_with_path(path).is_some()
    }

    pub fn insert_location(&mut self, location: Location) {
        self.locations.push(location);
    }

    pub fn remove_location(&mut self, id: &str) -> Option<Location> {
        let idx = self.locations.iter().position(|l| l.id == id)?;
        Some(self.locations.remove(idx))
    }

    pub fn insert_user(&mut self, user: User) {
        self.users.push(user);
    }

    /// Removes a user along with every grant it held.
    pub fn remove_user(&mut self, id: &str) -> Option<User> {
        let idx = self.users.iter().position(|u| u.id == id)?;
        let user = self.users.remove(idx);
        for location in &mut self.locations {
            Self::remove_allowed_user(&user, location);
        }
        Some(user)
    }

    pub fn remove_allowed_user(user: &User, location: &mut Location) {
        location.allowed_users.retain(|u| u.id != user.id);
    }

    /// Records that `user` may access the location with `location_id`.
    ///
    /// Returns false if the location is unknown. Existing grants are kept.
    pub fn grant(&mut self, location_id: &str, user: User) -> bool {
        let Some(location) = self.locations.iter_mut().find(|l| l.id == location_id) else {
            return false;
        };
        if !Self::can_access(&user, location) {
            location.allowed_users.push(user);
        }
        true
    }

    /// Drops `user_id`'s grant on the location with `location_id`.
    pub fn revoke(&mut self, location_id: &str, user_id: &str) -> bool {
        let Some(location) = self.locations.iter_mut().find(|l| l.id == location_id) else {
            return false;
        };
        let before = location.allowed_users.len();
        location.allowed_users.retain(|u| u.id != user_id);
        location.allowed_users.len() != before
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn user(n: u32, email: &str) -> User {
        User {
            id: format!("urn:uuid:user-{n}"),
            self_url: format!("https://example.com/admin/api/users/user-{n}/"),
            email: email.to_string(),
        }
    }

    fn location(n: u32, path: &str, allowed: Vec<User>) -> Location {
        Location {
            id: format!("urn:uuid:loc-{n}"),
            self_url: format!("https://example.com/admin/api/locations/loc-{n}/"),
            path: path.to_string(),
            allowed_users: allowed,
        }
    }

    fn sample() -> AccessControl {
        let alice = user(1, "alice@example.com");
        let bob = user(2, "bob@example.com");
        AccessControl::new(
            vec![
                location(1, "/docs", vec![alice.clone()]),
                location(2, "/wiki", vec![alice.clone(), bob.clone()]),
                location(3, "/private", vec![]),
            ],
            vec![alice, bob],
        )
    }

    #[test]
    fn test_urn_to_uuid() {
        assert_eq!(urn_to_uuid("urn:uuid:41be0192"), "41be0192");
        assert_eq!(urn_to_uuid("41be0192"), "41be0192");
    }

    #[test]
    fn test_location_deserializes_api_field_names() {
        let value = json!({
            "id": "urn:uuid:loc-1",
            "self": "https://example.com/admin/api/locations/loc-1/",
            "path": "/docs",
            "allowedUsers": [{
                "id": "urn:uuid:user-1",
                "self": "https://example.com/admin/api/users/user-1/",
                "email": "alice@example.com"
            }]
        });
        let location: Location = serde_json::from_value(value).unwrap();
        assert_eq!(location.path, "/docs");
        assert_eq!(location.uuid(), "loc-1");
        assert_eq!(location.allowed_users[0].email, "alice@example.com");
    }

    #[test]
    fn test_location_without_allowed_users_defaults_to_empty() {
        let location: Location = serde_json::from_value(json!({
            "id": "urn:uuid:loc-9",
            "self": "https://example.com/admin/api/locations/loc-9/",
            "path": "/new"
        }))
        .unwrap();
        assert!(location.allowed_users.is_empty());
    }

    #[test]
    fn test_allowed_user_url() {
        let loc = location(1, "/docs", vec![]);
        let alice = user(1, "alice@example.com");
        assert_eq!(
            loc.allowed_user_url(&alice),
            "https://example.com/admin/api/locations/loc-1/allowed-users/user-1/"
        );
    }

    #[test]
    fn test_lookups() {
        let acl = sample();
        let bob = acl.find_user_with_email("bob@example.com").unwrap();
        assert_eq!(bob.id, "urn:uuid:user-2");
        assert!(acl.find_user_with_email("carol@example.com").is_none());
        assert_eq!(
            acl.find_location_with_id("urn:uuid:loc-3").unwrap().path,
            "/private"
        );
        assert_eq!(acl.location_paths(), vec!["/docs", "/wiki", "/private"]);
        assert!(acl.has_location_path("/wiki"));
    }

    #[test]
    fn test_accessible_locations() {
        let acl = sample();
        let bob = acl.find_user_with_email("bob@example.com").unwrap();
        let paths: Vec<&str> = acl
            .accessible_locations(bob)
            .map(|l| l.path.as_str())
            .collect();
        assert_eq!(paths, vec!["/wiki"]);
    }

    #[test]
    fn test_remove_user_strips_grants() {
        let mut acl = sample();
        let removed = acl.remove_user("urn:uuid:user-1").unwrap();
        assert_eq!(removed.email, "alice@example.com");
        assert_eq!(acl.users.len(), 1);
        for location in &acl.locations {
            assert!(!AccessControl::can_access(&removed, location));
        }
        assert!(acl.remove_user("urn:uuid:user-1").is_none());
    }

    #[test]
    fn test_grant_and_revoke() {
        let mut acl = sample();
        let bob = acl.find_user_with_email("bob@example.com").unwrap().clone();

        assert!(acl.grant("urn:uuid:loc-3", bob.clone()));
        assert!(acl.grant("urn:uuid:loc-3", bob.clone()));
        let private = acl.find_location_with_id("urn:uuid:loc-3").unwrap();
        assert_eq!(private.allowed_users.len(), 1);

        assert!(acl.revoke("urn:uuid:loc-3", &bob.id));
        assert!(!acl.revoke("urn:uuid:loc-3", &bob.id));
        assert!(!acl.grant("urn:uuid:missing", bob));
    }
}
