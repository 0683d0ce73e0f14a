//! X11 implementation of the display capability.
//!
//! Wraps an `x11rb` connection and exposes exactly the operations the
//! locking core needs: screen enumeration, the full-screen blocking window,
//! color cells, the invisible cursor, input grabs and the event stream.
//! Keycodes are resolved to keysyms here, using the server's keyboard
//! mapping with standard shift-column selection; everything past the keysym
//! is the core's business.

use shroud_core::keys::Keysym;
use shroud_core::traits::{
    Color, CursorHandle, DisplayError, DisplayEvent, DisplayServer, GrabOutcome, PixmapHandle,
    WindowHandle,
};
use x11rb::connection::Connection;
use x11rb::protocol::xproto::{
    ChangeWindowAttributesAux, Colormap, ConfigureWindowAux, ConnectionExt as _, CreateGCAux,
    CreateWindowAux, EventMask, GrabMode, GrabStatus, KeyButMask, Rectangle, StackMode, Visualid,
    WindowClass,
};
use x11rb::protocol::Event;
use x11rb::rust_connection::RustConnection;

const CURSOR_SIZE: u16 = 8;

/// Per-screen facts captured from the connection setup.
struct ScreenInfo {
    root: u32,
    width: u16,
    height: u16,
    root_visual: Visualid,
    root_depth: u8,
    colormap: Colormap,
}

/// The server's keycode-to-keysym table.
///
/// Column 0 is the unshifted symbol, column 1 the shifted one. Alphabetic
/// keys commonly leave column 1 as NoSymbol, in which case shift selects the
/// uppercase form of column 0, per the core X lookup rules.
struct KeymapTable {
    first_keycode: u8,
    keysyms_per_keycode: u8,
    keysyms: Vec<u32>,
}

impl KeymapTable {
    fn lookup(&self, keycode: u8, shifted: bool) -> u32 {
        let Some(offset) = keycode.checked_sub(self.first_keycode) else {
            return 0;
        };
        let per = self.keysyms_per_keycode.max(1) as usize;
        let start = offset as usize * per;
        let Some(group) = self.keysyms.get(start..start + per) else {
            return 0;
        };
        let base = group.first().copied().unwrap_or(0);
        if !shifted {
            return base;
        }
        match group.get(1).copied() {
            Some(sym) if sym != 0 => sym,
            _ => upcase_keysym(base),
        }
    }
}

/// Uppercase a Latin keysym, for keys whose shifted column is NoSymbol.
fn upcase_keysym(keysym: u32) -> u32 {
    match keysym {
        // a..=z, à..=þ except ÷
        0x61..=0x7a | 0xe0..=0xf6 | 0xf8..=0xfe => keysym - 0x20,
        _ => keysym,
    }
}

/// An open X11 display connection.
pub struct X11Display {
    conn: RustConnection,
    screens: Vec<ScreenInfo>,
    keymap: KeymapTable,
}

impl X11Display {
    /// Connect to the display named by `$DISPLAY`.
    pub fn open() -> Result<Self, DisplayError> {
        let (conn, _) = x11rb::connect(None)
            .map_err(|e| DisplayError::ConnectionFailed(e.to_string()))?;

        let setup = conn.setup();
        let screens = setup
            .roots
            .iter()
            .map(|screen| ScreenInfo {
                root: screen.root,
                width: screen.width_in_pixels,
                height: screen.height_in_pixels,
                root_visual: screen.root_visual,
                root_depth: screen.root_depth,
                colormap: screen.default_colormap,
            })
            .collect();

        let first_keycode = setup.min_keycode;
        let count = setup.max_keycode - setup.min_keycode + 1;
        let mapping = conn
            .get_keyboard_mapping(first_keycode, count)
            .map_err(req_err)?
            .reply()
            .map_err(req_err)?;
        let keymap = KeymapTable {
            first_keycode,
            keysyms_per_keycode: mapping.keysyms_per_keycode,
            keysyms: mapping.keysyms,
        };

        Ok(Self {
            conn,
            screens,
            keymap,
        })
    }

    fn screen(&self, screen: usize) -> Result<&ScreenInfo, DisplayError> {
        self.screens
            .get(screen)
            .ok_or(DisplayError::UnknownScreen(screen))
    }

    fn fresh_id(&self) -> Result<u32, DisplayError> {
        self.conn.generate_id().map_err(req_err)
    }
}

fn req_err(e: impl std::fmt::Display) -> DisplayError {
    DisplayError::RequestFailed(e.to_string())
}

fn lost(e: impl std::fmt::Display) -> DisplayError {
    DisplayError::ConnectionLost(e.to_string())
}

impl DisplayServer for X11Display {
    fn screen_count(&self) -> usize {
        self.screens.len()
    }

    fn alloc_color(&mut self, screen: usize, name: &str) -> Result<Color, DisplayError> {
        let colormap = self.screen(screen)?.colormap;
        let reply = self
            .conn
            .alloc_named_color(colormap, name.as_bytes())
            .map_err(req_err)?
            .reply()
            .map_err(|e| {
                DisplayError::RequestFailed(format!("cannot allocate color {name:?}: {e}"))
            })?;
        Ok(Color(reply.pixel))
    }

    fn free_colors(&mut self, screen: usize, colors: &[Color]) -> Result<(), DisplayError> {
        let colormap = self.screen(screen)?.colormap;
        let pixels: Vec<u32> = colors.iter().map(|c| c.0).collect();
        self.conn
            .free_colors(colormap, 0, &pixels)
            .map_err(req_err)?;
        Ok(())
    }

    fn create_lock_window(
        &mut self,
        screen: usize,
        background: Color,
    ) -> Result<WindowHandle, DisplayError> {
        let info = self.screen(screen)?;
        let (root, width, height, depth, visual) = (
            info.root,
            info.width,
            info.height,
            info.root_depth,
            info.root_visual,
        );
        let window = self.fresh_id()?;
        let attributes = CreateWindowAux::new()
            .override_redirect(1)
            .background_pixel(background.0);
        self.conn
            .create_window(
                depth,
                window,
                root,
                0,
                0,
                width,
                height,
                0,
                WindowClass::COPY_FROM_PARENT,
                visual,
                &attributes,
            )
            .map_err(req_err)?;
        Ok(WindowHandle(window))
    }

    fn create_invisible_cursor(
        &mut self,
        window: WindowHandle,
    ) -> Result<(PixmapHandle, CursorHandle), DisplayError> {
        let pixmap = self.fresh_id()?;
        self.conn
            .create_pixmap(1, pixmap, window.0, CURSOR_SIZE, CURSOR_SIZE)
            .map_err(req_err)?;

        // A fresh pixmap has undefined contents; blank it before using it as
        // both the cursor's source and mask.
        let gc = self.fresh_id()?;
        self.conn
            .create_gc(gc, pixmap, &CreateGCAux::new().foreground(0))
            .map_err(req_err)?;
        self.conn
            .poly_fill_rectangle(
                pixmap,
                gc,
                &[Rectangle {
                    x: 0,
                    y: 0,
                    width: CURSOR_SIZE,
                    height: CURSOR_SIZE,
                }],
            )
            .map_err(req_err)?;
        self.conn.free_gc(gc).map_err(req_err)?;

        let cursor = self.fresh_id()?;
        self.conn
            .create_cursor(cursor, pixmap, pixmap, 0, 0, 0, 0, 0, 0, 0, 0)
            .map_err(req_err)?;
        Ok((PixmapHandle(pixmap), CursorHandle(cursor)))
    }

    fn define_cursor(
        &mut self,
        window: WindowHandle,
        cursor: CursorHandle,
    ) -> Result<(), DisplayError> {
        self.conn
            .change_window_attributes(
                window.0,
                &ChangeWindowAttributesAux::new().cursor(cursor.0),
            )
            .map_err(req_err)?;
        Ok(())
    }

    fn map_raised(&mut self, window: WindowHandle) -> Result<(), DisplayError> {
        self.conn.map_window(window.0).map_err(req_err)?;
        self.raise_window(window)
    }

    fn raise_window(&mut self, window: WindowHandle) -> Result<(), DisplayError> {
        self.conn
            .configure_window(
                window.0,
                &ConfigureWindowAux::new().stack_mode(StackMode::ABOVE),
            )
            .map_err(req_err)?;
        Ok(())
    }

    fn set_window_background(
        &mut self,
        window: WindowHandle,
        color: Color,
    ) -> Result<(), DisplayError> {
        self.conn
            .change_window_attributes(
                window.0,
                &ChangeWindowAttributesAux::new().background_pixel(color.0),
            )
            .map_err(req_err)?;
        Ok(())
    }

    fn clear_window(&mut self, window: WindowHandle) -> Result<(), DisplayError> {
        self.conn
            .clear_area(false, window.0, 0, 0, 0, 0)
            .map_err(req_err)?;
        self.conn.flush().map_err(lost)?;
        Ok(())
    }

    fn grab_pointer(
        &mut self,
        screen: usize,
        cursor: CursorHandle,
    ) -> Result<GrabOutcome, DisplayError> {
        let root = self.screen(screen)?.root;
        let reply = self
            .conn
            .grab_pointer(
                false,
                root,
                EventMask::BUTTON_PRESS | EventMask::BUTTON_RELEASE | EventMask::POINTER_MOTION,
                GrabMode::ASYNC,
                GrabMode::ASYNC,
                x11rb::NONE,
                cursor.0,
                x11rb::CURRENT_TIME,
            )
            .map_err(req_err)?
            .reply()
            .map_err(req_err)?;
        Ok(if reply.status == GrabStatus::SUCCESS {
            GrabOutcome::Acquired
        } else {
            GrabOutcome::Denied
        })
    }

    fn grab_keyboard(&mut self, screen: usize) -> Result<GrabOutcome, DisplayError> {
        let root = self.screen(screen)?.root;
        let reply = self
            .conn
            .grab_keyboard(
                true,
                root,
                x11rb::CURRENT_TIME,
                GrabMode::ASYNC,
                GrabMode::ASYNC,
            )
            .map_err(req_err)?
            .reply()
            .map_err(req_err)?;
        Ok(if reply.status == GrabStatus::SUCCESS {
            GrabOutcome::Acquired
        } else {
            GrabOutcome::Denied
        })
    }

    fn ungrab_pointer(&mut self) -> Result<(), DisplayError> {
        self.conn
            .ungrab_pointer(x11rb::CURRENT_TIME)
            .map_err(req_err)?;
        Ok(())
    }

    fn watch_substructure(&mut self, screen: usize) -> Result<(), DisplayError> {
        let root = self.screen(screen)?.root;
        self.conn
            .change_window_attributes(
                root,
                &ChangeWindowAttributesAux::new().event_mask(EventMask::SUBSTRUCTURE_NOTIFY),
            )
            .map_err(req_err)?;
        Ok(())
    }

    fn next_event(&mut self) -> Result<DisplayEvent, DisplayError> {
        self.conn.flush().map_err(lost)?;
        let event = self.conn.wait_for_event().map_err(lost)?;
        Ok(match event {
            Event::KeyPress(key) => {
                let shifted = u16::from(key.state) & u16::from(KeyButMask::SHIFT) != 0;
                DisplayEvent::KeyPress(Keysym(self.keymap.lookup(key.detail, shifted)))
            }
            _ => DisplayEvent::Other,
        })
    }

    fn bell(&mut self) -> Result<(), DisplayError> {
        self.conn.bell(100).map_err(req_err)?;
        self.conn.flush().map_err(lost)?;
        Ok(())
    }

    fn destroy_window(&mut self, window: WindowHandle) -> Result<(), DisplayError> {
        self.conn.destroy_window(window.0).map_err(req_err)?;
        Ok(())
    }

    fn free_pixmap(&mut self, pixmap: PixmapHandle) -> Result<(), DisplayError> {
        self.conn.free_pixmap(pixmap.0).map_err(req_err)?;
        Ok(())
    }

    fn free_cursor(&mut self, cursor: CursorHandle) -> Result<(), DisplayError> {
        self.conn.free_cursor(cursor.0).map_err(req_err)?;
        Ok(())
    }

    fn sync(&mut self) -> Result<(), DisplayError> {
        self.conn
            .get_input_focus()
            .map_err(lost)?
            .reply()
            .map_err(lost)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> KeymapTable {
        // Keycodes 8..=10, two columns each:
        //   8 -> ('a', NoSymbol), 9 -> ('1', '!'), 10 -> (Return, NoSymbol)
        KeymapTable {
            first_keycode: 8,
            keysyms_per_keycode: 2,
            keysyms: vec![0x61, 0, 0x31, 0x21, 0xff0d, 0],
        }
    }

    #[test]
    fn unshifted_lookup_uses_first_column() {
        assert_eq!(table().lookup(8, false), 0x61); // a
        assert_eq!(table().lookup(9, false), 0x31); // 1
    }

    #[test]
    fn shifted_lookup_uses_second_column() {
        assert_eq!(table().lookup(9, true), 0x21); // !
    }

    #[test]
    fn shifted_alphabetic_falls_back_to_uppercase() {
        assert_eq!(table().lookup(8, true), 0x41); // A
    }

    #[test]
    fn shifted_non_alphabetic_fallback_keeps_symbol() {
        assert_eq!(table().lookup(10, true), 0xff0d); // Return
    }

    #[test]
    fn out_of_range_keycodes_yield_no_symbol() {
        assert_eq!(table().lookup(7, false), 0);
        assert_eq!(table().lookup(11, false), 0);
        assert_eq!(table().lookup(255, true), 0);
    }

    #[test]
    fn upcase_covers_latin1() {
        assert_eq!(upcase_keysym(0x61), 0x41); // a -> A
        assert_eq!(upcase_keysym(0xe9), 0xc9); // é -> É
        assert_eq!(upcase_keysym(0xf7), 0xf7); // ÷ unchanged
        assert_eq!(upcase_keysym(0x31), 0x31); // 1 unchanged
    }
}
