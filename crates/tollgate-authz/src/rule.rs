//! The closed set of authorization rules.

use serde::{Deserialize, Serialize};

use tollgate_core::Role;

/// A named authorization rule a route can demand.
///
/// The set is closed; routes reference rules by value, never by string, so a
/// misspelled rule is a compile error rather than a silent deny.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Rule {
    /// Any authenticated caller.
    Any,
    /// Callers holding the USER role.
    UserOnly,
    /// Callers holding the ADMIN role.
    AdminOnly,
    /// Admins, or the caller whose subject matches the target entity's owner.
    AdminOrSubject,
}

impl Rule {
    /// Returns the canonical rule name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Any => "any",
            Self::UserOnly => "user-only",
            Self::AdminOnly => "admin-only",
            Self::AdminOrSubject => "admin-or-subject",
        }
    }

    /// Returns the roles that satisfy this rule outright.
    ///
    /// `AdminOrSubject` lists only ADMIN here; the ownership escape hatch is
    /// evaluated separately against the target subject.
    #[must_use]
    pub const fn required_roles(self) -> &'static [Role] {
        match self {
            Self::Any => &[Role::Admin, Role::User],
            Self::UserOnly => &[Role::User],
            Self::AdminOnly => &[Role::Admin],
            Self::AdminOrSubject => &[Role::Admin],
        }
    }

    /// Returns true if this rule compares the caller against a target subject.
    #[must_use]
    pub const fn wants_target(self) -> bool {
        matches!(self, Self::AdminOrSubject)
    }
}

impl std::fmt::Display for Rule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
