//! X11 backend crate for the shroud screen locker.
//!
//! This crate provides the production implementations of the capability
//! traits defined in `shroud-core`:
//!
//! - [`X11Display`]: the display connection, over `x11rb`
//! - [`PamAuthority`]: the credential authority, over PAM (cargo feature
//!   `pam`, since it links `libpam`)
//!
//! The `shroud` binary wires these together with the core's lock manager and
//! input loop.

pub mod display;

#[cfg(feature = "pam")]
pub mod auth;

pub use display::X11Display;

#[cfg(feature = "pam")]
pub use auth::PamAuthority;
