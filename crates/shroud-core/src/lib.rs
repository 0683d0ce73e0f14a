//! Core state machine for the shroud screen locker.
//!
//! This crate implements everything between the display connection and the
//! authentication backend, without depending on either. It is intentionally
//! backend-agnostic to allow:
//!
//! - Unit tests without a display server or PAM
//! - Security review to focus on the lock/input/credential path
//! - Different display backends behind the [`DisplayServer`] trait
//!
//! # Modules
//!
//! - [`traits`]: The capability seams ([`DisplayServer`], [`CredentialAuthority`])
//! - [`buffer`]: Bounded, self-wiping password accumulator
//! - [`keys`]: Keysym translation (keypad remapping, printable filtering)
//! - [`retry`]: Bounded retry-with-back-off for grab acquisition
//! - [`locker`]: Per-screen lock acquisition and release
//! - [`input`]: The password-entry event loop
//! - [`mock`]: Configurable mocks for testing
//!
//! # Flow
//!
//! The lock manager acquires one [`ScreenLock`] per physical screen. If at
//! least one screen locked, the input loop consumes key events until the
//! credential authority accepts a submitted password; the manager then
//! releases every lock and the process exits.

pub mod buffer;
pub mod input;
pub mod keys;
pub mod locker;
pub mod mock;
pub mod retry;
pub mod traits;

// Re-export commonly used types at the crate root for convenience
pub use buffer::{PasswordBuffer, MAX_PASSWORD_LEN};
pub use input::{InputLoop, SessionState};
pub use keys::{KeyAction, Keysym};
pub use locker::{LockColors, LockManager, LockSet, ScreenLock, VisualState};
pub use retry::RetryPolicy;
pub use traits::{
    Color, CredentialAuthority, CursorHandle, DisplayError, DisplayEvent, DisplayServer,
    GrabOutcome, PixmapHandle, Verdict, WindowHandle,
};
