use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Student,
    Admin,
}

/// Authenticated caller, resolved by the host before any command runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionContext {
    pub user_id: String,
    pub role: UserRole,
}

impl SessionContext {
    pub fn student(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            role: UserRole::Student,
        }
    }

    pub fn admin(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            role: UserRole::Admin,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }

    pub fn ensure_admin(&self) -> AppResult<()> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(AppError::forbidden("administrator role required"))
        }
    }

    /// Students may only touch their own data; admins may read anyone's.
    pub fn ensure_can_access(&self, student_id: &str) -> AppResult<()> {
        if self.is_admin() || self.user_id == student_id {
            Ok(())
        } else {
            Err(AppError::forbidden(format!(
                "user {} cannot access student {}",
                self.user_id, student_id
            )))
        }
    }
}
