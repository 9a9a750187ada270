//! Admin operations over the access-control REST API.
//!
//! [`AdminClient`] keeps a local [`AccessControl`] snapshot in step with
//! the server: each successful call applies the same change locally, so a
//! full [`refresh`](AdminClient::refresh) is only needed at startup.

use std::fmt;

use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tracing::{debug, info};

use crate::model::{AccessControl, Location, LocationList, User, UserList};
use crate::stub::{Failure, Method, RequestDispatcher};

/// Collection resource for locations, relative to the admin base URL.
pub const LOCATIONS_RESOURCE: &str = "api/locations/";
/// Collection resource for users, relative to the admin base URL.
pub const USERS_RESOURCE: &str = "api/users/";

/// Errors from admin operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdminError {
    /// The request (or the token fetch before it) failed.
    Request(Failure),
    /// No record with the given key in the current snapshot.
    NotFound { kind: &'static str, key: String },
    /// The server answered with JSON of an unexpected shape.
    Decode { resource: String, message: String },
    /// Input rejected before any request was made.
    InvalidInput(String),
}

impl AdminError {
    fn not_found(kind: &'static str, key: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            key: key.into(),
        }
    }

    /// Returns the underlying request failure, if any.
    pub fn failure(&self) -> Option<&Failure> {
        match self {
            Self::Request(failure) => Some(failure),
            _ => None,
        }
    }
}

impl fmt::Display for AdminError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Request(failure) => write!(f, "Request failed: {failure}"),
            Self::NotFound { kind, key } => write!(f, "No {kind} '{key}'"),
            Self::Decode { resource, message } => {
                write!(f, "Unexpected response from {resource}: {message}")
            }
            Self::InvalidInput(message) => f.write_str(message),
        }
    }
}

impl std::error::Error for AdminError {}

impl From<Failure> for AdminError {
    fn from(failure: Failure) -> Self {
        Self::Request(failure)
    }
}

pub type AdminResult<T> = std::result::Result<T, AdminError>;

/// Client for the admin API with a local snapshot of its state.
pub struct AdminClient {
    dispatcher: RequestDispatcher,
    acl: AccessControl,
}

impl AdminClient {
    pub fn new(dispatcher: RequestDispatcher) -> Self {
        Self {
            dispatcher,
            acl: AccessControl::default(),
        }
    }

    pub fn dispatcher(&self) -> &RequestDispatcher {
        &self.dispatcher
    }

    /// Current snapshot of locations and users.
    pub fn acl(&self) -> &AccessControl {
        &self.acl
    }

    /// Reloads locations, then users, replacing the snapshot.
    ///
    /// # Errors
    /// Returns an error if either request fails or returns an unexpected body.
    pub async fn refresh(&mut self) -> AdminResult<()> {
        let locations: LocationList = self.fetch(Method::Get, LOCATIONS_RESOURCE, None).await?;
        let users: UserList = self.fetch(Method::Get, USERS_RESOURCE, None).await?;
        debug!(
            locations = locations.locations.len(),
            users = users.users.len(),
            "snapshot refreshed"
        );
        self.acl = AccessControl::new(locations.locations, users.users);
        Ok(())
    }

    /// Protects a new path.
    ///
    /// Returns `None` without contacting the server when the trimmed path is
    /// empty or already listed.
    ///
    /// # Errors
    /// Returns an error if the request fails.
    pub async fn add_location(&mut self, path: &str) -> AdminResult<Option<Location>> {
        let path = path.trim();
        if path.is_empty() || self.acl.has_location_path(path) {
            debug!(path, "location empty or already present, skipping");
            return Ok(None);
        }

        let location: Location = self
            .fetch(Method::Post, LOCATIONS_RESOURCE, Some(json!({ "path": path })))
            .await?;
        info!(path = %location.path, id = %location.id, "location added");
        self.acl.insert_location(location.clone());
        Ok(Some(location))
    }

    /// Deletes the location with `location_id`.
    ///
    /// # Errors
    /// Returns an error if the location is unknown or the request fails.
    pub async fn remove_location(&mut self, location_id: &str) -> AdminResult<Location> {
        let resource = self
            .acl
            .find_location_with_id(location_id)
            .map(|l| l.self_url.clone())
            .ok_or_else(|| AdminError::not_found("location", location_id))?;

        self.call(Method::Delete, &resource, None).await?;
        info!(id = location_id, "location removed");
        self.acl
            .remove_location(location_id)
            .ok_or_else(|| AdminError::not_found("location", location_id))
    }

    /// Creates a user.
    ///
    /// # Errors
    /// Returns an error if the email is empty or the request fails.
    pub async fn add_user(&mut self, email: &str) -> AdminResult<User> {
        let email = email.trim();
        if email.is_empty() {
            return Err(AdminError::InvalidInput("Email must not be empty".to_string()));
        }

        let user: User = self
            .fetch(Method::Post, USERS_RESOURCE, Some(json!({ "email": email })))
            .await?;
        info!(email = %user.email, id = %user.id, "user added");
        self.acl.insert_user(user.clone());
        Ok(user)
    }

    /// Deletes a user; its grants disappear with it.
    ///
    /// # Errors
    /// Returns an error if the user is unknown or the request fails.
    pub async fn remove_user(&mut self, user_id: &str) -> AdminResult<User> {
        let resource = self
            .acl
            .find_user_with_id(user_id)
            .map(|u| u.self_url.clone())
            .ok_or_else(|| AdminError::not_found("user", user_id))?;

        self.call(Method::Delete, &resource, None).await?;
        info!(id = user_id, "user removed");
        self.acl
            .remove_user(user_id)
            .ok_or_else(|| AdminError::not_found("user", user_id))
    }

    /// Allows the user with `email` to access the location, creating the
    /// user first when it does not exist.
    ///
    /// Returns `None` when the trimmed email is empty or the user already
    /// has access.
    ///
    /// # Errors
    /// Returns an error if the location is unknown or a request fails.
    pub async fn grant_access(
        &mut self,
        email: &str,
        location_id: &str,
    ) -> AdminResult<Option<User>> {
        let email = email.trim();
        if email.is_empty() {
            return Ok(None);
        }
        let location = self
            .acl
            .find_location_with_id(location_id)
            .ok_or_else(|| AdminError::not_found("location", location_id))?;

        let existing = self.acl.find_user_with_email(email).cloned();
        if let Some(user) = &existing
            && AccessControl::can_access(user, location)
        {
            debug!(email, location = %location.path, "user already has access");
            return Ok(None);
        }

        let user = match existing {
            Some(user) => user,
            None => self.add_user(email).await?,
        };

        let resource = self
            .acl
            .find_location_with_id(location_id)
            .map(|l| l.allowed_user_url(&user))
            .ok_or_else(|| AdminError::not_found("location", location_id))?;
        self.call(Method::Put, &resource, None).await?;
        info!(email = %user.email, location = location_id, "access granted");
        self.acl.grant(location_id, user.clone());
        Ok(Some(user))
    }

    /// Withdraws a user's permission to access a location.
    ///
    /// # Errors
    /// Returns an error if the user or location is unknown or the request fails.
    pub async fn revoke_access(&mut self, user_id: &str, location_id: &str) -> AdminResult<()> {
        let user = self
            .acl
            .find_user_with_id(user_id)
            .ok_or_else(|| AdminError::not_found("user", user_id))?;
        let resource = self
            .acl
            .find_location_with_id(location_id)
            .map(|l| l.allowed_user_url(user))
            .ok_or_else(|| AdminError::not_found("location", location_id))?;

        self.call(Method::Delete, &resource, None).await?;
        info!(user = user_id, location = location_id, "access revoked");
        self.acl.revoke(location_id, user_id);
        Ok(())
    }

    async fn fetch<T: DeserializeOwned>(
        &self,
        method: Method,
        resource: &str,
        params: Option<Value>,
    ) -> AdminResult<T> {
        let value = self
            .dispatcher
            .request(method, resource, params.as_ref())
            .await?;
        serde_json::from_value(value).map_err(|e| AdminError::Decode {
            resource: resource.to_string(),
            message: e.to_string(),
        })
    }

    async fn call(&self, method: Method, resource: &str, params: Option<Value>) -> AdminResult<()> {
        self.dispatcher
            .request(method, resource, params.as_ref())
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;
    use url::Url;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::stub::BufferDocument;

    fn can_bind_localhost() -> bool {
        std::net::TcpListener::bind("127.0.0.1:0").is_ok()
    }

    fn user_json(server: &MockServer, n: u32, email: &str) -> Value {
        json!({
            "id": format!("urn:uuid:user-{n}"),
            "self": format!("{}/admin/api/users/user-{n}/", server.uri()),
            "email": email,
        })
    }

    fn location_json(server: &MockServer, n: u32, path: &str, allowed: Vec<Value>) -> Value {
        json!({
            "id": format!("urn:uuid:loc-{n}"),
            "self": format!("{}/admin/api/locations/loc-{n}/", server.uri()),
            "path": path,
            "allowedUsers": allowed,
        })
    }

    async fn setup(server: &MockServer) -> AdminClient {
        Mock::given(method("POST"))
            .and(path("/auth/api/csrftoken/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "csrfToken": "T" })))
            .expect(1)
            .mount(server)
            .await;

        let alice = user_json(server, 1, "alice@example.com");
        let bob = user_json(server, 2, "bob@example.com");
        Mock::given(method("GET"))
            .and(path("/admin/api/locations/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "locations": [
                    location_json(server, 1, "/docs", vec![alice.clone()]),
                    location_json(server, 2, "/wiki", vec![alice.clone(), bob.clone()]),
                ]
            })))
            .mount(server)
            .await;
        Mock::given(method("GET"))
            .and(path("/admin/api/users/"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({ "users": [alice, bob] })),
            )
            .mount(server)
            .await;

        let base = Url::parse(&format!("{}/admin/", server.uri())).unwrap();
        let dispatcher = RequestDispatcher::builder(base)
            .document(Arc::new(BufferDocument::new()))
            .build()
            .unwrap();
        let mut client = AdminClient::new(dispatcher);
        client.refresh().await.unwrap();
        client
    }

    #[tokio::test]
    async fn test_refresh_loads_snapshot() {
        if !can_bind_localhost() {
            eprintln!("Skipping: cannot bind localhost TCP port in this environment.");
            return;
        }
        let server = MockServer::start().await;
        let client = setup(&server).await;

        assert_eq!(client.acl().location_paths(), vec!["/docs", "/wiki"]);
        assert_eq!(client.acl().users.len(), 2);
    }

    #[tokio::test]
    async fn test_add_location_posts_trimmed_path() {
        if !can_bind_localhost() {
            eprintln!("Skipping: cannot bind localhost TCP port in this environment.");
            return;
        }
        let server = MockServer::start().await;
        let mut client = setup(&server).await;

        Mock::given(method("POST"))
            .and(path("/admin/api/locations/"))
            .and(header("X-CSRFToken", "T"))
            .and(body_json(json!({ "path": "/blog" })))
            .respond_with(ResponseTemplate::new(201).set_body_json(location_json(
                &server,
                3,
                "/blog",
                vec![],
            )))
            .expect(1)
            .mount(&server)
            .await;

        let created = client.add_location("  /blog ").await.unwrap().unwrap();
        assert_eq!(created.path, "/blog");
        assert!(client.acl().has_location_path("/blog"));

        assert!(client.add_location("/blog").await.unwrap().is_none());
        assert!(client.add_location("   ").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_remove_user_strips_grants_locally() {
        if !can_bind_localhost() {
            eprintln!("Skipping: cannot bind localhost TCP port in this environment.");
            return;
        }
        let server = MockServer::start().await;
        let mut client = setup(&server).await;

        Mock::given(method("DELETE"))
            .and(path("/admin/api/users/user-1/"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let removed = client.remove_user("urn:uuid:user-1").await.unwrap();
        assert_eq!(removed.email, "alice@example.com");
        for location in &client.acl().locations {
            assert!(!AccessControl::can_access(&removed, location));
        }
    }

    #[tokio::test]
    async fn test_grant_access_creates_unknown_user_first() {
        if !can_bind_localhost() {
            eprintln!("Skipping: cannot bind localhost TCP port in this environment.");
            return;
        }
        let server = MockServer::start().await;
        let mut client = setup(&server).await;

        Mock::given(method("POST"))
            .and(path("/admin/api/users/"))
            .and(body_json(json!({ "email": "carol@example.com" })))
            .respond_with(
                ResponseTemplate::new(201)
                    .set_body_json(user_json(&server, 3, "carol@example.com")),
            )
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/admin/api/locations/loc-1/allowed-users/user-3/"))
            .and(header("X-CSRFToken", "T"))
            .respond_with(ResponseTemplate::new(201).set_body_json(user_json(
                &server,
                3,
                "carol@example.com",
            )))
            .expect(1)
            .mount(&server)
            .await;

        let granted = client
            .grant_access(" carol@example.com ", "urn:uuid:loc-1")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(granted.id, "urn:uuid:user-3");

        let docs = client.acl().find_location_with_id("urn:uuid:loc-1").unwrap();
        assert!(AccessControl::can_access(&granted, docs));
        assert!(client.acl().find_user_with_email("carol@example.com").is_some());
    }

    #[tokio::test]
    async fn test_grant_access_is_noop_for_existing_grant() {
        if !can_bind_localhost() {
            eprintln!("Skipping: cannot bind localhost TCP port in this environment.");
            return;
        }
        let server = MockServer::start().await;
        let mut client = setup(&server).await;

        let result = client
            .grant_access("alice@example.com", "urn:uuid:loc-1")
            .await
            .unwrap();
        assert!(result.is_none());
        assert!(client.grant_access("", "urn:uuid:loc-1").await.unwrap().is_none());

        let err = client
            .grant_access("alice@example.com", "urn:uuid:missing")
            .await
            .unwrap_err();
        assert!(matches!(err, AdminError::NotFound { kind: "location", .. }));
    }

    #[tokio::test]
    async fn test_revoke_access_deletes_grant() {
        if !can_bind_localhost() {
            eprintln!("Skipping: cannot bind localhost TCP port in this environment.");
            return;
        }
        let server = MockServer::start().await;
        let mut client = setup(&server).await;

        Mock::given(method("DELETE"))
            .and(path("/admin/api/locations/loc-2/allowed-users/user-2/"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        client
            .revoke_access("urn:uuid:user-2", "urn:uuid:loc-2")
            .await
            .unwrap();
        let wiki = client.acl().find_location_with_id("urn:uuid:loc-2").unwrap();
        assert_eq!(wiki.allowed_users.len(), 1);
    }

    #[tokio::test]
    async fn test_request_failure_keeps_snapshot() {
        if !can_bind_localhost() {
            eprintln!("Skipping: cannot bind localhost TCP port in this environment.");
            return;
        }
        let server = MockServer::start().await;
        let mut client = setup(&server).await;

        Mock::given(method("DELETE"))
            .and(path("/admin/api/locations/loc-1/"))
            .respond_with(ResponseTemplate::new(403).set_body_string("Forbidden"))
            .mount(&server)
            .await;

        let err = client.remove_location("urn:uuid:loc-1").await.unwrap_err();
        assert_eq!(err.failure(), Some(&Failure::new(403, "Forbidden")));
        assert!(client.acl().has_location_path("/docs"));
    }
}
