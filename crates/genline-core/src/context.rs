use serde::{Deserialize, Serialize};

/// Identity of the caller behind a generation request
///
/// Populated from headers set by the authentication layer in front of
/// Genline; this crate never validates credentials itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
    /// User the generation runs on behalf of
    pub user_id: String,
    /// Subscription debited for the generation
    pub subscription_id: String,
    /// Role reported by the authentication layer
    pub role: CallerRole,
}

/// Caller role as reported upstream
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CallerRole(pub String);

impl CallerRole {
    /// Role used when the header is absent
    pub fn user() -> Self {
        Self("user".to_owned())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl RequestContext {
    /// Context for a regular user billed against their own subscription
    pub fn user(user_id: impl Into<String>) -> Self {
        let user_id = user_id.into();
        Self {
            subscription_id: user_id.clone(),
            user_id,
            role: CallerRole::user(),
        }
    }

    /// Replace the caller role
    #[must_use]
    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.role = CallerRole(role.into());
        self
    }

    /// Bill a different subscription than the user's own
    #[must_use]
    pub fn with_subscription(mut self, subscription_id: impl Into<String>) -> Self {
        self.subscription_id = subscription_id.into();
        self
    }

    /// Whether generations for this caller are debited
    pub fn is_billable(&self, non_billable_roles: &[String]) -> bool {
        !non_billable_roles.iter().any(|role| role == self.role.as_str())
    }
}
