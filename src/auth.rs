//! Auth-domain identifiers, credentials, and principals.

pub mod credential;
pub mod id;
pub mod principal;

pub use credential::*;
pub use id::*;
pub use principal::*;
