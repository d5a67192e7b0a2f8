pub mod auth;
pub mod bookmarks;
pub mod folders;
pub mod health;
pub mod users;

use crate::error::AppError;

fn invalid(message: &'static str) -> AppError {
    AppError::bad_request("VALIDATION_ERROR", message)
}
