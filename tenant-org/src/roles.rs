//! Role authority
//!
//! This module defines the organization role hierarchy and the pure permission
//! checks every mutating membership operation must pass before touching state.
//! Nothing here performs I/O.

use serde::{Deserialize, Serialize};

use crate::error::{TeamError, TeamResult};

/// User role within an organization.
///
/// Roles are strictly ordered: Viewer < Member < Admin < Owner. The ordering is
/// the only thing escalation checks look at, so every comparison goes through
/// [`OrganizationRole::ordinal`].
///
/// # Permission Model
///
/// - **Viewer**: Read-only access to organization resources
/// - **Member**: Regular collaborator
/// - **Admin**: Can invite members and change roles up to admin
/// - **Owner**: Full control, including removing members; exactly one per organization
///
/// # Examples
///
/// ```
/// use tenant_org::OrganizationRole;
///
/// assert_eq!(OrganizationRole::Owner.ordinal(), 4);
/// assert!(OrganizationRole::Admin > OrganizationRole::Member);
/// assert!(OrganizationRole::Admin.can_manage_members());
/// assert!(!OrganizationRole::Member.can_manage_members());
/// ```
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum OrganizationRole {
    /// Read-only access
    Viewer = 1,

    /// Regular collaborator
    Member = 2,

    /// Can manage invitations and roles
    Admin = 3,

    /// Organization owner
    Owner = 4,
}

impl OrganizationRole {
    /// Numeric rank of the role (owner=4, admin=3, member=2, viewer=1).
    pub fn ordinal(&self) -> u8 {
        *self as u8
    }

    /// Check if this role may manage other members at all.
    ///
    /// # Returns
    ///
    /// `true` for Admin and Owner roles
    pub fn can_manage_members(&self) -> bool {
        self.ordinal() >= OrganizationRole::Admin.ordinal()
    }

    /// Parse role from string representation.
    ///
    /// # Arguments
    ///
    /// * `s` - String to parse (case-insensitive, surrounding whitespace ignored)
    ///
    /// # Returns
    ///
    /// `Some(OrganizationRole)` if valid, `None` otherwise
    ///
    /// # Examples
    ///
    /// ```
    /// use tenant_org::OrganizationRole;
    ///
    /// assert_eq!(OrganizationRole::parse("admin"), Some(OrganizationRole::Admin));
    /// assert_eq!(OrganizationRole::parse(" VIEWER "), Some(OrganizationRole::Viewer));
    /// assert_eq!(OrganizationRole::parse("editor"), None);
    /// ```
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "viewer" => Some(Self::Viewer),
            "member" => Some(Self::Member),
            "admin" => Some(Self::Admin),
            "owner" => Some(Self::Owner),
            _ => None,
        }
    }

    /// Parse a role supplied by a caller, failing with a validation error.
    pub fn parse_required(s: &str) -> TeamResult<Self> {
        Self::parse(s).ok_or_else(|| TeamError::Validation(format!("unknown role '{}'", s.trim())))
    }

    /// Get string representation of the role.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Viewer => "viewer",
            Self::Member => "member",
            Self::Admin => "admin",
            Self::Owner => "owner",
        }
    }

    /// Get a human-readable display name for the role.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Viewer => "Viewer",
            Self::Member => "Member",
            Self::Admin => "Admin",
            Self::Owner => "Owner",
        }
    }
}

impl Default for OrganizationRole {
    fn default() -> Self {
        Self::Member
    }
}

impl std::fmt::Display for OrganizationRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Decide whether an actor may manage a membership holding `target_role`.
///
/// The owner may manage any member. Anyone else must be an admin. Nobody may
/// manage the owner's membership.
///
/// # Examples
///
/// ```
/// use tenant_org::roles::can_manage;
/// use tenant_org::OrganizationRole;
///
/// assert!(can_manage(OrganizationRole::Owner, true, OrganizationRole::Admin));
/// assert!(can_manage(OrganizationRole::Admin, false, OrganizationRole::Member));
/// assert!(!can_manage(OrganizationRole::Member, false, OrganizationRole::Viewer));
/// assert!(!can_manage(OrganizationRole::Admin, false, OrganizationRole::Owner));
/// ```
pub fn can_manage(acting_role: OrganizationRole, acting_is_owner: bool, target_role: OrganizationRole) -> bool {
    if target_role == OrganizationRole::Owner {
        return false;
    }
    acting_is_owner || acting_role == OrganizationRole::Admin
}

/// Gate for operations on an existing membership.
///
/// Fails with [`TeamError::OwnerImmutable`] when the target is the owner and
/// [`TeamError::PermissionDenied`] when the actor may not manage the target.
pub fn authorize_manage(
    acting_role: OrganizationRole,
    acting_is_owner: bool,
    target_role: OrganizationRole,
) -> TeamResult<()> {
    if target_role == OrganizationRole::Owner {
        return Err(TeamError::OwnerImmutable);
    }
    if !can_manage(acting_role, acting_is_owner, target_role) {
        return Err(TeamError::PermissionDenied(format!(
            "role '{}' cannot manage '{}' members",
            acting_role, target_role
        )));
    }
    Ok(())
}

/// Gate for granting `new_role`, either through an invitation or a role update.
///
/// The actor must be allowed to manage members, may not grant a role ranked
/// above their own, and the owner role is never grantable.
pub fn authorize_assignment(
    acting_role: OrganizationRole,
    acting_is_owner: bool,
    new_role: OrganizationRole,
) -> TeamResult<()> {
    if !(acting_is_owner || acting_role.can_manage_members()) {
        return Err(TeamError::PermissionDenied(format!(
            "role '{}' cannot assign roles",
            acting_role
        )));
    }
    if new_role == OrganizationRole::Owner {
        return Err(TeamError::PermissionDenied(
            "the owner role cannot be granted".to_string(),
        ));
    }
    let ceiling = if acting_is_owner {
        OrganizationRole::Owner
    } else {
        acting_role
    };
    if new_role.ordinal() > ceiling.ordinal() {
        return Err(TeamError::PermissionDenied(format!(
            "role '{}' cannot grant '{}'",
            acting_role, new_role
        )));
    }
    Ok(())
}
