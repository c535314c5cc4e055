//! GitHub users and repositories, described as actions.
//!
//! [`UsersAction`] lists users; [`UserReposAction`] lists one user's public
//! repositories. The binary chains them: the first listed user's
//! repositories are fetched once the users request succeeds.

use actionpipe_core::{ActionError, HttpAction, RequestSpec};
use serde::Deserialize;

pub mod config;

/// A GitHub account as listed by `GET /users`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct User {
    /// Account name
    pub login: String,
    /// Numeric id
    #[serde(default)]
    pub id: Option<u64>,
    /// Avatar image URL
    #[serde(default)]
    pub avatar_url: Option<String>,
    /// Profile page URL
    #[serde(default)]
    pub html_url: Option<String>,
    /// `User` or `Organization`
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    /// Whether the account is GitHub staff
    #[serde(default)]
    pub site_admin: bool,
}

/// A repository as listed by `GET /users/{login}/repos`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Repository {
    /// Numeric id
    pub id: u64,
    /// Short name
    pub name: String,
    /// `owner/name`
    pub full_name: String,
    /// Free-form description
    #[serde(default)]
    pub description: Option<String>,
    /// Repository page URL
    #[serde(default)]
    pub html_url: Option<String>,
    /// Whether this is a fork
    #[serde(default)]
    pub fork: bool,
    /// Star count
    #[serde(default)]
    pub stargazers_count: u64,
}

/// `GET /users?since={since}`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct UsersAction {
    /// Only list users with an id greater than this
    pub since: i64,
}

impl HttpAction for UsersAction {
    type Response = Vec<User>;

    fn request(&self) -> RequestSpec {
        RequestSpec::get("/users").query("since", self.since)
    }

    fn validate(&self) -> Result<(), ActionError> {
        if self.since < 0 {
            return Err(ActionError::validation(format!(
                "since must be non-negative, got {}",
                self.since
            )));
        }
        Ok(())
    }
}

/// `GET /users/{login}/repos`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserReposAction {
    /// Account whose repositories are listed
    pub login: String,
}

impl UserReposAction {
    /// Repositories of `login`
    #[must_use]
    pub fn new(login: impl Into<String>) -> Self {
        Self {
            login: login.into(),
        }
    }
}

impl HttpAction for UserReposAction {
    type Response = Vec<Repository>;

    fn request(&self) -> RequestSpec {
        RequestSpec::get("/users/{login}/repos").path_param("login", &self.login)
    }
}
