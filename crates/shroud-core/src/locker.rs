//! Screen lock acquisition and release.
//!
//! The [`LockManager`] builds one [`ScreenLock`] per physical screen: a
//! full-screen override-redirect window with an invisible cursor, plus
//! exclusive pointer and keyboard grabs acquired under a bounded retry
//! policy. A screen is either fully locked or not locked at all; anything
//! partially acquired is released before the screen is recorded as failed.

use tracing::{debug, warn};

use crate::retry::RetryPolicy;
use crate::traits::{
    Color, CursorHandle, DisplayError, DisplayServer, GrabOutcome, PixmapHandle, WindowHandle,
};

/// Whether the lock surfaces show the "idle" or the "typing" color.
///
/// Purely derived from password-buffer emptiness; not part of the session
/// state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisualState {
    /// The password buffer is empty.
    Idle,
    /// The password buffer holds at least one character.
    Typing,
}

impl VisualState {
    /// The visual state implied by buffer emptiness.
    pub fn from_empty(empty: bool) -> Self {
        if empty {
            VisualState::Idle
        } else {
            VisualState::Typing
        }
    }
}

/// The color pair painted on every lock surface.
#[derive(Debug, Clone)]
pub struct LockColors {
    /// Background while the password buffer is empty.
    pub idle: String,
    /// Background while the password buffer is non-empty.
    pub typing: String,
}

impl Default for LockColors {
    fn default() -> Self {
        Self {
            idle: "black".to_string(),
            typing: "#005577".to_string(),
        }
    }
}

/// Per-screen resource bundle: the blocking surface, its two visual-state
/// colors, and the invisible cursor.
///
/// Owned exclusively by the [`LockManager`]; exists only fully initialized,
/// with the surface mapped and both grabs held.
#[derive(Debug)]
pub struct ScreenLock {
    screen: usize,
    window: WindowHandle,
    pixmap: PixmapHandle,
    cursor: CursorHandle,
    idle_color: Color,
    typing_color: Color,
}

impl ScreenLock {
    pub fn screen(&self) -> usize {
        self.screen
    }

    pub fn window(&self) -> WindowHandle {
        self.window
    }

    fn color_for(&self, state: VisualState) -> Color {
        match state {
            VisualState::Idle => self.idle_color,
            VisualState::Typing => self.typing_color,
        }
    }
}

/// Ordered collection of per-screen locks, one slot per physical screen.
///
/// A slot is empty if that screen failed to lock. Membership is fixed once
/// the acquisition pass completes; screens are never added or removed
/// mid-session.
#[derive(Debug, Default)]
pub struct LockSet {
    slots: Vec<Option<ScreenLock>>,
}

impl LockSet {
    /// Number of slots (physical screens seen during acquisition).
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Number of screens that actually locked.
    pub fn locked_count(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    /// Whether every physical screen is locked.
    pub fn fully_locked(&self) -> bool {
        !self.slots.is_empty() && self.locked_count() == self.slots.len()
    }

    /// Iterate over the successfully locked screens.
    pub fn iter_locked(&self) -> impl Iterator<Item = &ScreenLock> {
        self.slots.iter().flatten()
    }

    /// Repaint every locked surface with the color for `state`.
    pub fn repaint_all<D: DisplayServer>(
        &self,
        display: &mut D,
        state: VisualState,
    ) -> Result<(), DisplayError> {
        for lock in self.iter_locked() {
            display.set_window_background(lock.window, lock.color_for(state))?;
            display.clear_window(lock.window)?;
        }
        Ok(())
    }

    /// Raise every locked surface back above anything that appeared over it.
    pub fn raise_all<D: DisplayServer>(&self, display: &mut D) -> Result<(), DisplayError> {
        for lock in self.iter_locked() {
            display.raise_window(lock.window)?;
        }
        Ok(())
    }
}

/// Resources acquired so far for one screen, so every failure path can
/// release exactly what exists.
#[derive(Default)]
struct PartialLock {
    colors: Vec<Color>,
    window: Option<WindowHandle>,
    pixmap: Option<PixmapHandle>,
    cursor: Option<CursorHandle>,
}

impl PartialLock {
    /// Best-effort release; failures are logged, not propagated, since the
    /// screen is being abandoned anyway.
    fn release<D: DisplayServer>(self, display: &mut D, screen: usize) {
        let _ = display.ungrab_pointer();
        if !self.colors.is_empty() {
            if let Err(e) = display.free_colors(screen, &self.colors) {
                warn!(screen, error = %e, "failed to free colors");
            }
        }
        if let Some(cursor) = self.cursor {
            let _ = display.free_cursor(cursor);
        }
        if let Some(pixmap) = self.pixmap {
            let _ = display.free_pixmap(pixmap);
        }
        if let Some(window) = self.window {
            if let Err(e) = display.destroy_window(window) {
                warn!(screen, error = %e, "failed to destroy lock window");
            }
        }
    }
}

/// Orchestrates one [`ScreenLock`] per physical screen.
pub struct LockManager {
    retry: RetryPolicy,
    /// Set once any screen's grab acquisition exhausts its retries. Once
    /// set, no further keyboard grabs are attempted on later screens: a
    /// session that cannot be fully captured is treated as unlockable.
    aborted: bool,
}

impl LockManager {
    pub fn new() -> Self {
        Self::with_retry(RetryPolicy::default())
    }

    /// Use a custom retry policy for grab acquisition.
    pub fn with_retry(retry: RetryPolicy) -> Self {
        Self {
            retry,
            aborted: false,
        }
    }

    /// Attempt to lock every screen the display reports.
    ///
    /// Screens that fail (grab exhaustion, or any display error while
    /// building the surface) end up as empty slots; callers decide what a
    /// partially or completely unlocked set means. Everything partially
    /// acquired for a failed screen is released before moving on.
    pub fn acquire_all<D: DisplayServer>(&mut self, display: &mut D, colors: &LockColors) -> LockSet {
        let screen_count = display.screen_count();
        let mut slots = Vec::with_capacity(screen_count);

        for screen in 0..screen_count {
            let slot = match self.lock_screen(display, screen, colors) {
                Ok(Some(lock)) => {
                    debug!(screen, "screen locked");
                    Some(lock)
                }
                Ok(None) => {
                    warn!(screen, "could not acquire input grabs");
                    None
                }
                Err(e) => {
                    warn!(screen, error = %e, "locking failed");
                    None
                }
            };
            slots.push(slot);
        }

        if let Err(e) = display.sync() {
            warn!(error = %e, "display sync failed after lock pass");
        }

        LockSet { slots }
    }

    /// Release every locked screen: pointer grab, colors, cursor, pixmap,
    /// surface. Empty slots are skipped; calling this twice is a no-op.
    pub fn release_all<D: DisplayServer>(&mut self, display: &mut D, locks: &mut LockSet) {
        for slot in &mut locks.slots {
            let Some(lock) = slot.take() else { continue };
            let _ = display.ungrab_pointer();
            if let Err(e) =
                display.free_colors(lock.screen, &[lock.idle_color, lock.typing_color])
            {
                warn!(screen = lock.screen, error = %e, "failed to free colors");
            }
            let _ = display.free_cursor(lock.cursor);
            let _ = display.free_pixmap(lock.pixmap);
            if let Err(e) = display.destroy_window(lock.window) {
                warn!(screen = lock.screen, error = %e, "failed to destroy lock window");
            }
            debug!(screen = lock.screen, "screen released");
        }
        if let Err(e) = display.sync() {
            warn!(error = %e, "display sync failed after release");
        }
    }

    fn lock_screen<D: DisplayServer>(
        &mut self,
        display: &mut D,
        screen: usize,
        colors: &LockColors,
    ) -> Result<Option<ScreenLock>, DisplayError> {
        let mut partial = PartialLock::default();
        match self.try_lock_screen(display, screen, colors, &mut partial) {
            Ok(Some(lock)) => Ok(Some(lock)),
            Ok(None) => {
                partial.release(display, screen);
                Ok(None)
            }
            Err(e) => {
                partial.release(display, screen);
                Err(e)
            }
        }
    }

    fn try_lock_screen<D: DisplayServer>(
        &mut self,
        display: &mut D,
        screen: usize,
        colors: &LockColors,
        partial: &mut PartialLock,
    ) -> Result<Option<ScreenLock>, DisplayError> {
        let idle_color = display.alloc_color(screen, &colors.idle)?;
        partial.colors.push(idle_color);
        let typing_color = display.alloc_color(screen, &colors.typing)?;
        partial.colors.push(typing_color);

        let window = display.create_lock_window(screen, idle_color)?;
        partial.window = Some(window);

        let (pixmap, cursor) = display.create_invisible_cursor(window)?;
        partial.pixmap = Some(pixmap);
        partial.cursor = Some(cursor);
        display.define_cursor(window, cursor)?;

        display.map_raised(window)?;

        let pointer_held = self.retry.run(|| {
            matches!(display.grab_pointer(screen, cursor), Ok(GrabOutcome::Acquired))
        });
        if !pointer_held {
            self.aborted = true;
            return Ok(None);
        }

        // Once any screen has proven unlockable, later screens skip the
        // keyboard grab entirely and fail fast.
        let keyboard_held = !self.aborted
            && self
                .retry
                .run(|| matches!(display.grab_keyboard(screen), Ok(GrabOutcome::Acquired)));
        if !keyboard_held {
            self.aborted = true;
            return Ok(None);
        }

        display.watch_substructure(screen)?;

        Ok(Some(ScreenLock {
            screen,
            window,
            pixmap,
            cursor,
            idle_color,
            typing_color,
        }))
    }
}

impl Default for LockManager {
    fn default() -> Self {
        Self::new()
    }
}
