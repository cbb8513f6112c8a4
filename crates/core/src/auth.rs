use serde::{Deserialize, Serialize};

use crate::{AppResult, NonEmptyString};

/// Identity of an authenticated back-office user, as resolved by the
/// upstream identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserIdentity {
    subject: String,
}

impl UserIdentity {
    /// Creates an identity from the provider's subject claim.
    pub fn from_subject(subject: impl Into<String>) -> AppResult<Self> {
        Ok(Self {
            subject: String::from(NonEmptyString::new(subject)?),
        })
    }

    /// Returns the stable subject claim from the identity provider.
    #[must_use]
    pub fn subject(&self) -> &str {
        self.subject.as_str()
    }
}
