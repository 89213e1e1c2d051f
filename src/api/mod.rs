mod client;
#[cfg(feature = "desktop")]
pub mod commands;
mod error;
pub mod wire;

pub use client::ApiClient;
pub use error::ApiError;

/// Login route for a page that needs authentication, carrying the page the
/// user should come back to.
pub fn login_redirect(return_path: &str) -> String {
    let encoded: String = url::form_urlencoded::byte_serialize(return_path.as_bytes()).collect();
    format!("/login?redirect={encoded}")
}

/// Where to send the user after a failed call, if anywhere.
pub fn redirect_for(err: &ApiError, return_path: &str) -> Option<String> {
    err.is_unauthorized().then(|| login_redirect(return_path))
}
