//! The password-entry event loop.
//!
//! Single-threaded consumer of the display's event stream while the session
//! is locked. Key presses edit the password buffer and drive authentication
//! on submit; every other event re-raises the lock surfaces. The loop exits
//! only on a successful authentication.
//!
//! # Security
//!
//! The buffer contents never appear in log events, and the submitted copy
//! travels as a `SecretString` that is wiped on drop.

use tracing::{debug, trace};

use crate::buffer::PasswordBuffer;
use crate::keys::{self, KeyAction};
use crate::locker::{LockSet, VisualState};
use crate::traits::{CredentialAuthority, DisplayError, DisplayEvent, DisplayServer, Verdict};

/// Where the locked session currently stands. Transient, never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Waiting for the user to type or submit a password.
    AwaitingInput,
    /// A submitted password is with the credential authority.
    Authenticating,
    /// The authority accepted; the session is over.
    Unlocked,
}

/// The single-threaded input loop driving password entry.
pub struct InputLoop {
    buffer: PasswordBuffer,
    state: SessionState,
}

impl InputLoop {
    pub fn new() -> Self {
        Self {
            buffer: PasswordBuffer::new(),
            state: SessionState::AwaitingInput,
        }
    }

    /// Current session state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Consume events until the authority accepts a submitted password.
    ///
    /// Key events are processed strictly in arrival order, and the visual
    /// repaint for a key event is applied before the next event is read.
    /// Rejected submissions ring the bell, clear the buffer and keep the
    /// loop running; there is no other way out than acceptance, short of a
    /// display error.
    pub fn run<D, A>(
        &mut self,
        display: &mut D,
        locks: &LockSet,
        authority: &A,
    ) -> Result<(), DisplayError>
    where
        D: DisplayServer,
        A: CredentialAuthority,
    {
        loop {
            match display.next_event()? {
                DisplayEvent::KeyPress(keysym) => {
                    self.handle_key(display, locks, authority, keysym)?;
                    if self.state == SessionState::Unlocked {
                        return Ok(());
                    }
                }
                DisplayEvent::Other => {
                    // Defend against windows trying to appear above the lock.
                    locks.raise_all(display)?;
                }
            }
        }
    }

    fn handle_key<D, A>(
        &mut self,
        display: &mut D,
        locks: &LockSet,
        authority: &A,
        keysym: keys::Keysym,
    ) -> Result<(), DisplayError>
    where
        D: DisplayServer,
        A: CredentialAuthority,
    {
        let was_empty = self.buffer.is_empty();

        match keys::resolve(keysym) {
            KeyAction::Submit => {
                self.state = SessionState::Authenticating;
                let secret = self.buffer.take_secret();
                match authority.verify(&secret) {
                    Verdict::Accepted => {
                        debug!("authority accepted credential, unlocking");
                        self.state = SessionState::Unlocked;
                    }
                    Verdict::Rejected => {
                        debug!("authority rejected credential");
                        display.bell()?;
                        self.state = SessionState::AwaitingInput;
                    }
                }
            }
            KeyAction::Cancel => self.buffer.clear(),
            KeyAction::Backspace => {
                self.buffer.pop();
            }
            KeyAction::Char(c) => {
                if !self.buffer.push(c) {
                    trace!("password buffer full, character dropped");
                }
            }
            KeyAction::Ignore => {}
        }

        // Repaint only on emptiness transitions; no-op keys (backspace on an
        // empty buffer, ignored symbols) must not repaint.
        let now_empty = self.buffer.is_empty();
        if was_empty != now_empty {
            locks.repaint_all(display, VisualState::from_empty(now_empty))?;
        }

        Ok(())
    }
}

impl Default for InputLoop {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::{Keysym, XK_BACKSPACE, XK_ESCAPE, XK_KP_0, XK_KP_ENTER, XK_RETURN};
    use crate::locker::{LockColors, LockManager};
    use crate::mock::{MockAuthority, MockDisplay};
    use crate::retry::RetryPolicy;
    use std::time::Duration;

    fn key(c: char) -> DisplayEvent {
        DisplayEvent::KeyPress(Keysym(c as u32))
    }

    fn locked_display(screens: usize, events: Vec<DisplayEvent>) -> (MockDisplay, LockSet) {
        let mut display = MockDisplay::with_screens(screens);
        let mut manager = LockManager::with_retry(RetryPolicy::new(5, Duration::ZERO));
        let locks = manager.acquire_all(&mut display, &LockColors::default());
        display.script_events(events);
        (display, locks)
    }

    /// The typing/idle color currently painted on every lock surface.
    fn surface_colors<'d>(display: &'d MockDisplay, locks: &LockSet) -> Vec<&'d str> {
        locks
            .iter_locked()
            .map(|lock| {
                display
                    .color_name(display.window_backgrounds[&lock.window()])
                    .unwrap()
            })
            .collect()
    }

    #[test]
    fn accepted_password_unlocks() {
        let mut events: Vec<_> = "secret".chars().map(key).collect();
        events.push(DisplayEvent::KeyPress(XK_RETURN));
        let (mut display, locks) = locked_display(1, events);
        let authority = MockAuthority::accepting("secret");

        let mut input = InputLoop::new();
        input.run(&mut display, &locks, &authority).unwrap();

        assert_eq!(input.state(), SessionState::Unlocked);
        assert_eq!(authority.call_count(), 1);
        assert_eq!(display.bells, 0);
    }

    #[test]
    fn rejected_password_clears_buffer_and_rings_bell() {
        // a, b, c, Backspace, Enter with the authority rejecting "ab".
        let events = vec![
            key('a'),
            key('b'),
            key('c'),
            DisplayEvent::KeyPress(XK_BACKSPACE),
            DisplayEvent::KeyPress(XK_RETURN),
        ];
        let (mut display, locks) = locked_display(1, events);
        let authority = MockAuthority::accepting("letmein");

        let mut input = InputLoop::new();
        // The script runs out after the rejection; the loop keeps waiting.
        let err = input.run(&mut display, &locks, &authority).unwrap_err();
        assert!(matches!(err, DisplayError::ConnectionLost(_)));

        assert_eq!(input.state(), SessionState::AwaitingInput);
        assert!(input.buffer.is_empty());
        assert_eq!(authority.call_count(), 1);
        assert_eq!(display.bells, 1);
    }

    #[test]
    fn cancel_always_empties_the_buffer() {
        let events = vec![key('x'), key('y'), DisplayEvent::KeyPress(XK_ESCAPE)];
        let (mut display, locks) = locked_display(1, events);
        let authority = MockAuthority::rejecting_all();

        let mut input = InputLoop::new();
        let _ = input.run(&mut display, &locks, &authority);

        assert!(input.buffer.is_empty());
        assert_eq!(authority.call_count(), 0);
        assert_eq!(surface_colors(&display, &locks), vec!["black"]);
    }

    #[test]
    fn backspace_on_empty_buffer_changes_nothing() {
        let events = vec![DisplayEvent::KeyPress(XK_BACKSPACE)];
        let (mut display, locks) = locked_display(1, events);
        let authority = MockAuthority::rejecting_all();

        let repaints_before = display.cleared_windows.len();
        let mut input = InputLoop::new();
        let _ = input.run(&mut display, &locks, &authority);

        assert!(input.buffer.is_empty());
        assert_eq!(display.cleared_windows.len(), repaints_before);
    }

    #[test]
    fn visual_state_tracks_buffer_emptiness_on_every_key() {
        let events = vec![
            key('a'),
            key('b'),
            DisplayEvent::KeyPress(XK_BACKSPACE),
            DisplayEvent::KeyPress(XK_BACKSPACE),
            key('c'),
        ];
        let (mut display, mut locks) = locked_display(2, vec![]);
        let authority = MockAuthority::rejecting_all();
        let mut input = InputLoop::new();

        // Drive one event at a time and check the invariant after each.
        for event in events {
            display.script_events(vec![event]);
            let _ = input.run(&mut display, &locks, &authority);
            let expected = if input.buffer.is_empty() { "black" } else { "#005577" };
            for color in surface_colors(&display, &locks) {
                assert_eq!(color, expected);
            }
        }

        let mut manager = LockManager::new();
        manager.release_all(&mut display, &mut locks);
    }

    #[test]
    fn non_key_events_reraise_every_surface() {
        let events = vec![DisplayEvent::Other, DisplayEvent::Other];
        let (mut display, locks) = locked_display(2, events);
        let authority = MockAuthority::rejecting_all();

        let raises_before = display.raised_windows.len();
        let mut input = InputLoop::new();
        let _ = input.run(&mut display, &locks, &authority);

        // Two non-key events, two surfaces raised each time.
        assert_eq!(display.raised_windows.len() - raises_before, 4);
    }

    #[test]
    fn keypad_entry_is_indistinguishable_from_standard_keys() {
        // "12" typed on the keypad, submitted with keypad enter.
        let events = vec![
            DisplayEvent::KeyPress(Keysym(XK_KP_0.0 + 1)),
            DisplayEvent::KeyPress(Keysym(XK_KP_0.0 + 2)),
            DisplayEvent::KeyPress(XK_KP_ENTER),
        ];
        let (mut display, locks) = locked_display(1, events);
        let authority = MockAuthority::accepting("12");

        let mut input = InputLoop::new();
        input.run(&mut display, &locks, &authority).unwrap();

        assert_eq!(input.state(), SessionState::Unlocked);
    }

    #[test]
    fn ignored_keys_do_not_touch_buffer_or_visuals() {
        let events = vec![
            DisplayEvent::KeyPress(Keysym(0xffbe)), // F1
            DisplayEvent::KeyPress(Keysym(0xffe1)), // Shift_L
        ];
        let (mut display, locks) = locked_display(1, events);
        let authority = MockAuthority::rejecting_all();

        let repaints_before = display.cleared_windows.len();
        let mut input = InputLoop::new();
        let _ = input.run(&mut display, &locks, &authority);

        assert!(input.buffer.is_empty());
        assert_eq!(display.cleared_windows.len(), repaints_before);
        assert_eq!(authority.call_count(), 0);
    }

    #[test]
    fn overflowing_characters_are_dropped() {
        let mut events: Vec<_> = std::iter::repeat(key('a')).take(300).collect();
        events.push(DisplayEvent::KeyPress(XK_RETURN));
        let (mut display, locks) = locked_display(1, events);
        let password = "a".repeat(255);
        let authority = MockAuthority::accepting(password.as_str());

        let mut input = InputLoop::new();
        input.run(&mut display, &locks, &authority).unwrap();

        assert_eq!(input.state(), SessionState::Unlocked);
    }

    #[test]
    fn full_session_unlocks_and_releases() {
        // End-to-end: lock, type the password, unlock, release.
        let mut display = MockDisplay::with_screens(2);
        let mut manager = LockManager::with_retry(RetryPolicy::new(5, Duration::ZERO));
        let mut locks = manager.acquire_all(&mut display, &LockColors::default());
        assert!(locks.fully_locked());

        let mut events: Vec<_> = "secret".chars().map(key).collect();
        events.push(DisplayEvent::KeyPress(XK_RETURN));
        display.script_events(events);

        let authority = MockAuthority::accepting("secret");
        let mut input = InputLoop::new();
        input.run(&mut display, &locks, &authority).unwrap();
        assert_eq!(input.state(), SessionState::Unlocked);

        manager.release_all(&mut display, &mut locks);
        assert_eq!(locks.locked_count(), 0);
        assert_eq!(display.destroyed_windows.len(), 2);
    }
}
