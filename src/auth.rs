//! Auth-domain models: redacted credentials, grants, and the PKCE authorization helper.

pub mod credentials;
pub mod grant;
pub mod pkce;

pub use credentials::*;
pub use grant::*;
pub use pkce::*;
