//! State managers over the record store.

pub mod authcode;
pub mod elevation;
pub mod grant;

pub use authcode::{AuthCodeManager, IssuedCode};
pub use grant::GrantManager;
