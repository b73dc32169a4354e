//! Backend operations, grouped by concern, as methods on [`IdeasHub`].
//!
//! [`IdeasHub`]: crate::client::IdeasHub

pub mod auth;
pub mod ideas;
pub mod interactions;

use crate::transport::ApiError;

/// Check an id before it is spliced into a URL path.
pub(crate) fn path_id<'a>(kind: &str, id: &'a str) -> Result<&'a str, ApiError> {
    let id = id.trim();
    if id.is_empty() {
        return Err(ApiError::validation(format!("{kind} id is empty")));
    }
    if id.contains(&['/', '?', '#', '%'][..]) || id.chars().any(char::is_whitespace) {
        return Err(ApiError::validation(format!("{kind} id {id:?} is not valid")));
    }
    Ok(id)
}
