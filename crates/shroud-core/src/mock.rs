//! Mock display server and credential authority for testing.
//!
//! These configurable mocks let the lock manager and input loop run without
//! a display server or a real authentication backend: scripted events,
//! per-device grab-denial budgets, and recorded side effects (raises,
//! repaints, bells, frees) that tests assert against.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};

use secrecy::{ExposeSecret, SecretString};

use crate::traits::{
    Color, CredentialAuthority, CursorHandle, DisplayError, DisplayEvent, DisplayServer,
    GrabOutcome, PixmapHandle, Verdict, WindowHandle,
};

/// How many grab requests to deny before granting one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DenialBudget {
    Count(u32),
    Always,
}

impl DenialBudget {
    /// Consume one denial if any remain; returns the outcome to report.
    fn next_outcome(&mut self) -> GrabOutcome {
        match self {
            DenialBudget::Always => GrabOutcome::Denied,
            DenialBudget::Count(0) => GrabOutcome::Acquired,
            DenialBudget::Count(n) => {
                *n -= 1;
                GrabOutcome::Denied
            }
        }
    }
}

/// A scripted in-memory display server.
///
/// Recorded side effects are public fields so tests can assert on them
/// directly.
pub struct MockDisplay {
    screens: usize,
    events: VecDeque<DisplayEvent>,
    next_id: u32,
    pointer_denials: DenialBudget,
    keyboard_denials: DenialBudget,
    color_names: HashMap<Color, String>,

    /// Background color currently set per window.
    pub window_backgrounds: HashMap<WindowHandle, Color>,
    /// Windows repainted via `clear_window`, in order.
    pub cleared_windows: Vec<WindowHandle>,
    /// Windows mapped (and implicitly raised), in order.
    pub mapped: Vec<WindowHandle>,
    /// Windows raised via `raise_window`, in order.
    pub raised_windows: Vec<WindowHandle>,
    /// Screens subscribed to substructure notifications.
    pub watched_screens: Vec<usize>,
    /// Colors freed, in order.
    pub freed_colors: Vec<Color>,
    pub freed_pixmaps: Vec<PixmapHandle>,
    pub freed_cursors: Vec<CursorHandle>,
    pub destroyed_windows: Vec<WindowHandle>,
    /// Total grab requests seen per device.
    pub pointer_grab_attempts: u32,
    pub keyboard_grab_attempts: u32,
    pub pointer_ungrabs: u32,
    /// Audible alerts sounded.
    pub bells: u32,
    pub syncs: u32,
}

impl MockDisplay {
    /// Create a mock reporting the given number of screens, with all grabs
    /// granted immediately and no scripted events.
    pub fn with_screens(screens: usize) -> Self {
        Self {
            screens,
            events: VecDeque::new(),
            next_id: 1,
            pointer_denials: DenialBudget::Count(0),
            keyboard_denials: DenialBudget::Count(0),
            color_names: HashMap::new(),
            window_backgrounds: HashMap::new(),
            cleared_windows: Vec::new(),
            mapped: Vec::new(),
            raised_windows: Vec::new(),
            watched_screens: Vec::new(),
            freed_colors: Vec::new(),
            freed_pixmaps: Vec::new(),
            freed_cursors: Vec::new(),
            destroyed_windows: Vec::new(),
            pointer_grab_attempts: 0,
            keyboard_grab_attempts: 0,
            pointer_ungrabs: 0,
            bells: 0,
            syncs: 0,
        }
    }

    /// Append events to the script consumed by `next_event`.
    pub fn script_events(&mut self, events: impl IntoIterator<Item = DisplayEvent>) {
        self.events.extend(events);
    }

    /// Deny the next `count` pointer grab requests before granting one.
    pub fn deny_pointer_grabs(&mut self, count: u32) {
        self.pointer_denials = DenialBudget::Count(count);
    }

    /// Deny the next `count` keyboard grab requests before granting one.
    pub fn deny_keyboard_grabs(&mut self, count: u32) {
        self.keyboard_denials = DenialBudget::Count(count);
    }

    /// Deny every pointer grab request.
    pub fn deny_all_pointer_grabs(&mut self) {
        self.pointer_denials = DenialBudget::Always;
    }

    /// Deny every keyboard grab request.
    pub fn deny_all_keyboard_grabs(&mut self) {
        self.keyboard_denials = DenialBudget::Always;
    }

    /// The name a color cell was allocated under.
    pub fn color_name(&self, color: Color) -> Option<&str> {
        self.color_names.get(&color).map(String::as_str)
    }

    fn fresh_id(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn check_screen(&self, screen: usize) -> Result<(), DisplayError> {
        if screen < self.screens {
            Ok(())
        } else {
            Err(DisplayError::UnknownScreen(screen))
        }
    }
}

impl DisplayServer for MockDisplay {
    fn screen_count(&self) -> usize {
        self.screens
    }

    fn alloc_color(&mut self, screen: usize, name: &str) -> Result<Color, DisplayError> {
        self.check_screen(screen)?;
        let color = Color(self.fresh_id());
        self.color_names.insert(color, name.to_string());
        Ok(color)
    }

    fn free_colors(&mut self, screen: usize, colors: &[Color]) -> Result<(), DisplayError> {
        self.check_screen(screen)?;
        self.freed_colors.extend_from_slice(colors);
        Ok(())
    }

    fn create_lock_window(
        &mut self,
        screen: usize,
        background: Color,
    ) -> Result<WindowHandle, DisplayError> {
        self.check_screen(screen)?;
        let window = WindowHandle(self.fresh_id());
        self.window_backgrounds.insert(window, background);
        Ok(window)
    }

    fn create_invisible_cursor(
        &mut self,
        _window: WindowHandle,
    ) -> Result<(PixmapHandle, CursorHandle), DisplayError> {
        Ok((PixmapHandle(self.fresh_id()), CursorHandle(self.fresh_id())))
    }

    fn define_cursor(
        &mut self,
        _window: WindowHandle,
        _cursor: CursorHandle,
    ) -> Result<(), DisplayError> {
        Ok(())
    }

    fn map_raised(&mut self, window: WindowHandle) -> Result<(), DisplayError> {
        self.mapped.push(window);
        Ok(())
    }

    fn raise_window(&mut self, window: WindowHandle) -> Result<(), DisplayError> {
        self.raised_windows.push(window);
        Ok(())
    }

    fn set_window_background(
        &mut self,
        window: WindowHandle,
        color: Color,
    ) -> Result<(), DisplayError> {
        self.window_backgrounds.insert(window, color);
        Ok(())
    }

    fn clear_window(&mut self, window: WindowHandle) -> Result<(), DisplayError> {
        self.cleared_windows.push(window);
        Ok(())
    }

    fn grab_pointer(
        &mut self,
        screen: usize,
        _cursor: CursorHandle,
    ) -> Result<GrabOutcome, DisplayError> {
        self.check_screen(screen)?;
        self.pointer_grab_attempts += 1;
        Ok(self.pointer_denials.next_outcome())
    }

    fn grab_keyboard(&mut self, screen: usize) -> Result<GrabOutcome, DisplayError> {
        self.check_screen(screen)?;
        self.keyboard_grab_attempts += 1;
        Ok(self.keyboard_denials.next_outcome())
    }

    fn ungrab_pointer(&mut self) -> Result<(), DisplayError> {
        self.pointer_ungrabs += 1;
        Ok(())
    }

    fn watch_substructure(&mut self, screen: usize) -> Result<(), DisplayError> {
        self.check_screen(screen)?;
        self.watched_screens.push(screen);
        Ok(())
    }

    fn next_event(&mut self) -> Result<DisplayEvent, DisplayError> {
        self.events
            .pop_front()
            .ok_or_else(|| DisplayError::ConnectionLost("event script exhausted".to_string()))
    }

    fn bell(&mut self) -> Result<(), DisplayError> {
        self.bells += 1;
        Ok(())
    }

    fn destroy_window(&mut self, window: WindowHandle) -> Result<(), DisplayError> {
        self.destroyed_windows.push(window);
        Ok(())
    }

    fn free_pixmap(&mut self, pixmap: PixmapHandle) -> Result<(), DisplayError> {
        self.freed_pixmaps.push(pixmap);
        Ok(())
    }

    fn free_cursor(&mut self, cursor: CursorHandle) -> Result<(), DisplayError> {
        self.freed_cursors.push(cursor);
        Ok(())
    }

    fn sync(&mut self) -> Result<(), DisplayError> {
        self.syncs += 1;
        Ok(())
    }
}

/// A configurable credential authority for testing.
///
/// Accepts a fixed password, accepts everything, or rejects everything, and
/// counts how many times it was asked.
pub struct MockAuthority {
    expected: Option<String>,
    accept_all: bool,
    calls: AtomicUsize,
}

impl MockAuthority {
    /// Accept exactly the given password; reject anything else.
    pub fn accepting(password: impl Into<String>) -> Self {
        Self {
            expected: Some(password.into()),
            accept_all: false,
            calls: AtomicUsize::new(0),
        }
    }

    /// Accept every submission.
    pub fn accepting_all() -> Self {
        Self {
            expected: None,
            accept_all: true,
            calls: AtomicUsize::new(0),
        }
    }

    /// Reject every submission.
    pub fn rejecting_all() -> Self {
        Self {
            expected: None,
            accept_all: false,
            calls: AtomicUsize::new(0),
        }
    }

    /// Number of verification calls seen.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl CredentialAuthority for MockAuthority {
    fn verify(&self, secret: &SecretString) -> Verdict {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let accepted = self.accept_all
            || self
                .expected
                .as_deref()
                .is_some_and(|expected| expected == secret.expose_secret());
        if accepted {
            Verdict::Accepted
        } else {
            Verdict::Rejected
        }
    }
}
