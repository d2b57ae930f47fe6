//! Error types for membership operations
//!
//! Every expected outcome of a membership operation (bad token, missing
//! permission, full plan) is a variant here and is returned to the caller as a
//! typed result. Only [`TeamError::Infrastructure`] represents an unexpected
//! failure.

use thiserror::Error;

/// Membership and seat-entitlement error kinds.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TeamError {
    /// The actor's role does not permit the operation
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// Membership, invitation or organization does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// No invitation matches the presented token
    #[error("Invalid invitation token")]
    InvalidToken,

    /// The invitation exists but has expired
    #[error("Invitation has expired")]
    Expired,

    /// The accepting identity's email differs from the invited email
    #[error("Invitation was issued to a different email address")]
    EmailMismatch,

    /// The subject already belongs to the organization
    #[error("Already a member of this organization")]
    AlreadyMember,

    /// A live invitation already exists for this email
    #[error("A live invitation already exists for this email")]
    DuplicateInvite,

    /// The owner's membership cannot be changed or removed
    #[error("The organization owner's membership cannot be modified")]
    OwnerImmutable,

    /// The plan has no free seat for an explicit activation
    #[error("Seat limit reached ({limit} seats)")]
    SeatLimitReached {
        /// Effective seat limit at the time of the request
        limit: u32,
    },

    /// Actor is neither the inviter nor the owner
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Malformed input (email, role)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Lookup or transaction failure
    #[error("Infrastructure error: {0}")]
    Infrastructure(String),
}

/// Result type for membership operations.
pub type TeamResult<T> = Result<T, TeamError>;

impl TeamError {
    /// Check if this error should be logged at error level.
    ///
    /// Everything except infrastructure failures is an expected outcome.
    pub fn is_server_error(&self) -> bool {
        matches!(self, TeamError::Infrastructure(_))
    }

    /// Get HTTP status code for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            TeamError::PermissionDenied(_) | TeamError::OwnerImmutable => 403,
            TeamError::Unauthorized(_) => 403,
            TeamError::NotFound(_) | TeamError::InvalidToken => 404,
            TeamError::Expired => 410,
            TeamError::EmailMismatch => 403,
            TeamError::AlreadyMember | TeamError::DuplicateInvite => 409,
            TeamError::SeatLimitReached { .. } => 402,
            TeamError::Validation(_) => 422,
            TeamError::Infrastructure(_) => 500,
        }
    }

    /// Get error code for API responses.
    pub fn error_code(&self) -> &'static str {
        match self {
            TeamError::PermissionDenied(_) => "PERMISSION_DENIED",
            TeamError::NotFound(_) => "NOT_FOUND",
            TeamError::InvalidToken => "INVALID_TOKEN",
            TeamError::Expired => "INVITATION_EXPIRED",
            TeamError::EmailMismatch => "EMAIL_MISMATCH",
            TeamError::AlreadyMember => "ALREADY_MEMBER",
            TeamError::DuplicateInvite => "DUPLICATE_INVITE",
            TeamError::OwnerImmutable => "OWNER_IMMUTABLE",
            TeamError::SeatLimitReached { .. } => "SEAT_LIMIT_REACHED",
            TeamError::Unauthorized(_) => "UNAUTHORIZED",
            TeamError::Validation(_) => "VALIDATION_ERROR",
            TeamError::Infrastructure(_) => "INTERNAL_ERROR",
        }
    }

    pub(crate) fn membership_not_found(id: uuid::Uuid) -> Self {
        TeamError::NotFound(format!("membership {}", id))
    }
}
