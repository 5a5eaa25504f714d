//! Approved-user lookup, built once at start-up.

use std::collections::HashSet;

use crate::error::UsageError;

pub const APPROVED_USERS_ENV: &str = "APPROVED_USERS";

/// The set of user ids allowed to call the engine. Empty means everyone.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApprovedUsers {
    ids: HashSet<String>,
}

impl ApprovedUsers {
    pub fn new<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let ids = ids
            .into_iter()
            .map(|id| id.as_ref().trim().to_string())
            .filter(|id| !id.is_empty())
            .collect();
        Self { ids }
    }

    /// Configured ids plus the comma-separated list in `env_value`.
    pub fn from_sources(configured: &[String], env_value: Option<&str>) -> Self {
        let from_env = env_value.into_iter().flat_map(|v| v.split(','));
        Self::new(configured.iter().map(String::as_str).chain(from_env))
    }

    /// Like [`ApprovedUsers::from_sources`], reading `APPROVED_USERS`.
    pub fn from_env(configured: &[String]) -> Self {
        let env_value = std::env::var(APPROVED_USERS_ENV).ok();
        let users = Self::from_sources(configured, env_value.as_deref());
        if users.is_open() {
            log::info!("no approved users configured, every user is accepted");
        } else {
            log::debug!("{} approved users", users.ids.len());
        }
        users
    }

    pub fn is_open(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn check(&self, user_id: &str) -> Result<(), UsageError> {
        if self.is_open() || self.ids.contains(user_id) {
            Ok(())
        } else {
            Err(UsageError::NotApproved(user_id.to_string()))
        }
    }
}
