use axum::{extract::FromRequestParts, http::request::Parts};

use crate::error::AppError;
use crate::state::AppState;
use crate::utils::jwt;

pub mod permissions {
    pub const SUBMISSION_SUBMIT: &str = "submission:submit";
    pub const GRADE_MANAGE: &str = "grade:manage";
    pub const STATISTICS_VIEW: &str = "statistics:view";
    pub const PLAGIARISM_VIEW: &str = "plagiarism:view";
    pub const ENROLLMENT_MANAGE: &str = "enrollment:manage";
}

/// Permissions granted to each platform role when a token is issued.
pub const ROLE_PERMISSIONS: &[(&str, &[&str])] = &[
    (
        "admin",
        &[
            permissions::SUBMISSION_SUBMIT,
            permissions::GRADE_MANAGE,
            permissions::STATISTICS_VIEW,
            permissions::PLAGIARISM_VIEW,
            permissions::ENROLLMENT_MANAGE,
        ],
    ),
    (
        "instructor",
        &[
            permissions::GRADE_MANAGE,
            permissions::STATISTICS_VIEW,
            permissions::PLAGIARISM_VIEW,
            permissions::ENROLLMENT_MANAGE,
        ],
    ),
    ("student", &[permissions::SUBMISSION_SUBMIT]),
];

pub fn permissions_for_role(role: &str) -> Vec<String> {
    ROLE_PERMISSIONS
        .iter()
        .find(|(r, _)| *r == role)
        .map(|(_, perms)| perms.iter().map(|p| p.to_string()).collect())
        .unwrap_or_default()
}

/// Authenticated user extracted from the `Authorization: Bearer <token>` header.
///
/// Add this as a handler parameter to require authentication.
/// Permission checks happen via `require_permission()` in the handler body.
pub struct AuthUser {
    pub user_id: i32,
    pub username: String,
    pub role: String,
    pub permissions: Vec<String>,
}

impl AuthUser {
    pub fn has_permission(&self, permission: &str) -> bool {
        self.permissions.iter().any(|p| p == permission)
    }

    /// Returns `Ok(())` if the user has the given permission, `Err(PermissionDenied)` otherwise.
    pub fn require_permission(&self, permission: &str) -> Result<(), AppError> {
        if self.has_permission(permission) {
            Ok(())
        } else {
            Err(AppError::PermissionDenied)
        }
    }

    /// Owners may always read their own data; everyone else needs `permission`.
    pub fn require_owner_or(&self, owner_id: i32, permission: &str) -> Result<(), AppError> {
        if self.user_id == owner_id {
            Ok(())
        } else {
            self.require_permission(permission)
        }
    }
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get("Authorization")
            .and_then(|v| v.to_str().ok())
            .ok_or(AppError::TokenMissing)?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .ok_or(AppError::TokenInvalid)?;

        let claims = jwt::verify(&state.config.auth.jwt_secret, token)
            .map_err(|_| AppError::TokenInvalid)?;

        Ok(AuthUser {
            user_id: claims.uid,
            username: claims.sub,
            role: claims.role,
            permissions: claims.permissions,
        })
    }
}
