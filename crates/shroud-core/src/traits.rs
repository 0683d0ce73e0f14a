//! Trait definitions for pluggable components.
//!
//! These traits define the interfaces for:
//! - The display server connection (screen enumeration, windows, grabs, events)
//! - The credential authority (password verification)
//!
//! By using traits, the lock manager and input loop can be tested with mock
//! implementations and different display backends can be swapped at compile
//! time.

use secrecy::SecretString;

use crate::keys::Keysym;

/// Error type for display server operations.
#[derive(Debug, thiserror::Error)]
pub enum DisplayError {
    /// The connection to the display server could not be established.
    #[error("cannot open display: {0}")]
    ConnectionFailed(String),

    /// The connection to the display server broke mid-session.
    #[error("display connection lost: {0}")]
    ConnectionLost(String),

    /// A request to the display server failed.
    #[error("display request failed: {0}")]
    RequestFailed(String),

    /// A screen index outside the range reported by the display.
    #[error("no such screen: {0}")]
    UnknownScreen(usize),
}

/// Opaque handle to a window owned by the display server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WindowHandle(pub u32);

/// Opaque handle to an off-screen pixmap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PixmapHandle(pub u32);

/// Opaque handle to a cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CursorHandle(pub u32);

/// An allocated color cell (a pixel value in the screen's colormap).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Color(pub u32);

/// Result of a single pointer or keyboard grab request.
///
/// A grab request returns rather than blocking: the display server may
/// transiently deny a grab while another client is mid-transition, which is
/// why acquisition runs under a [`RetryPolicy`](crate::retry::RetryPolicy).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrabOutcome {
    /// Exclusive input delivery was granted.
    Acquired,
    /// The display server refused the grab, possibly transiently.
    Denied,
}

/// A typed event from the display server's event stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayEvent {
    /// A key was pressed; the backend has already resolved the keycode and
    /// modifier state to a keysym.
    KeyPress(Keysym),
    /// Anything else (key release, mapping change, substructure notify, ...).
    /// The input loop answers these by re-raising every lock surface.
    Other,
}

/// The display server capability the locking core is handed.
///
/// This trait abstracts the windowing connection, allowing:
/// - An X11 backend for production
/// - A scripted mock for unit tests without a display server
///
/// All operations are synchronous; the locker is single-threaded and the
/// only blocking call is [`next_event`](DisplayServer::next_event).
pub trait DisplayServer {
    /// Number of physical screens reported by the display.
    fn screen_count(&self) -> usize;

    /// Allocate a named color in the given screen's default colormap.
    fn alloc_color(&mut self, screen: usize, name: &str) -> Result<Color, DisplayError>;

    /// Free previously allocated color cells on the given screen.
    fn free_colors(&mut self, screen: usize, colors: &[Color]) -> Result<(), DisplayError>;

    /// Create a full-screen, override-redirect window painted with the given
    /// background color. The window is not yet mapped.
    fn create_lock_window(
        &mut self,
        screen: usize,
        background: Color,
    ) -> Result<WindowHandle, DisplayError>;

    /// Create an invisible cursor (a blank 8x8 bitmap) for the given window.
    ///
    /// Returns the backing pixmap alongside the cursor so both can be freed
    /// on release.
    fn create_invisible_cursor(
        &mut self,
        window: WindowHandle,
    ) -> Result<(PixmapHandle, CursorHandle), DisplayError>;

    /// Attach a cursor to a window.
    fn define_cursor(
        &mut self,
        window: WindowHandle,
        cursor: CursorHandle,
    ) -> Result<(), DisplayError>;

    /// Map the window and raise it to the top of the stacking order.
    fn map_raised(&mut self, window: WindowHandle) -> Result<(), DisplayError>;

    /// Raise an already-mapped window to the top of the stacking order.
    fn raise_window(&mut self, window: WindowHandle) -> Result<(), DisplayError>;

    /// Change the window's background color. Takes effect on the next clear.
    fn set_window_background(
        &mut self,
        window: WindowHandle,
        color: Color,
    ) -> Result<(), DisplayError>;

    /// Repaint the window with its current background color.
    fn clear_window(&mut self, window: WindowHandle) -> Result<(), DisplayError>;

    /// Request exclusive pointer delivery for the given screen's root window,
    /// showing `cursor` while the grab is held.
    fn grab_pointer(
        &mut self,
        screen: usize,
        cursor: CursorHandle,
    ) -> Result<GrabOutcome, DisplayError>;

    /// Request exclusive keyboard delivery for the given screen's root window.
    fn grab_keyboard(&mut self, screen: usize) -> Result<GrabOutcome, DisplayError>;

    /// Release the pointer grab.
    fn ungrab_pointer(&mut self) -> Result<(), DisplayError>;

    /// Subscribe the screen's root window to substructure-change
    /// notifications, so windows appearing above the lock surface become
    /// visible as events and trigger a re-raise.
    fn watch_substructure(&mut self, screen: usize) -> Result<(), DisplayError>;

    /// Block until the next event arrives.
    fn next_event(&mut self) -> Result<DisplayEvent, DisplayError>;

    /// Sound the display's audible alert.
    fn bell(&mut self) -> Result<(), DisplayError>;

    /// Destroy a window.
    fn destroy_window(&mut self, window: WindowHandle) -> Result<(), DisplayError>;

    /// Free a pixmap.
    fn free_pixmap(&mut self, pixmap: PixmapHandle) -> Result<(), DisplayError>;

    /// Free a cursor.
    fn free_cursor(&mut self, cursor: CursorHandle) -> Result<(), DisplayError>;

    /// Flush pending requests and wait for the server to process them.
    fn sync(&mut self) -> Result<(), DisplayError>;
}

/// The authority's accept/reject decision.
///
/// Deliberately binary: internal authority failures are folded into
/// [`Rejected`](Verdict::Rejected) by implementations so a broken authority
/// can never become an unlock bypass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// The credential was accepted; the session may unlock.
    Accepted,
    /// The credential was rejected (or the authority failed internally).
    Rejected,
}

/// Trait for credential authority implementations.
///
/// This trait abstracts the authentication backend, allowing:
/// - PAM for production
/// - A configurable mock for testing
///
/// # Contract
///
/// Implementations must treat the credential as sensitive: no copies
/// retained beyond the call, no credential material in logs, and no internal
/// error detail leaked to the caller. The invoking user's identity is
/// resolved from the process environment at call time.
pub trait CredentialAuthority {
    /// Verify a submitted secret against the operating environment's
    /// authentication policy.
    fn verify(&self, secret: &SecretString) -> Verdict;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_error_display() {
        assert_eq!(
            DisplayError::ConnectionFailed("refused".into()).to_string(),
            "cannot open display: refused"
        );
        assert_eq!(
            DisplayError::UnknownScreen(3).to_string(),
            "no such screen: 3"
        );
    }

    #[test]
    fn grab_outcome_equality() {
        assert_eq!(GrabOutcome::Acquired, GrabOutcome::Acquired);
        assert_ne!(GrabOutcome::Acquired, GrabOutcome::Denied);
    }
}
