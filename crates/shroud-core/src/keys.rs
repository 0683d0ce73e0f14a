//! Keysym translation for the password-entry loop.
//!
//! The display backend resolves raw keycodes and modifier state to X keysyms;
//! everything after that lives here: keypad remapping, filtering of
//! function/modifier/private-keypad symbols, and the final dispatch into a
//! [`KeyAction`].

/// An X11 key symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Keysym(pub u32);

pub const XK_BACKSPACE: Keysym = Keysym(0xff08);
pub const XK_RETURN: Keysym = Keysym(0xff0d);
pub const XK_ESCAPE: Keysym = Keysym(0xff1b);
pub const XK_KP_ENTER: Keysym = Keysym(0xff8d);
pub const XK_KP_0: Keysym = Keysym(0xffb0);
pub const XK_KP_9: Keysym = Keysym(0xffb9);
pub const XK_0: Keysym = Keysym(0x0030);

impl Keysym {
    /// Keypad keys, XK_KP_Space ..= XK_KP_Equal.
    fn is_keypad(self) -> bool {
        (0xff80..=0xffbd).contains(&self.0)
    }

    /// Vendor-private keypad range.
    fn is_private_keypad(self) -> bool {
        (0x1100_0000..=0x1100_ffff).contains(&self.0)
    }

    /// Function keys, XK_F1 ..= XK_F35.
    fn is_function(self) -> bool {
        (0xffbe..=0xffe0).contains(&self.0)
    }

    /// Miscellaneous function keys, XK_Select ..= XK_Break.
    fn is_misc_function(self) -> bool {
        (0xff60..=0xff6b).contains(&self.0)
    }

    /// Keypad function keys, XK_KP_F1 ..= XK_KP_F4.
    fn is_pf(self) -> bool {
        (0xff91..=0xff94).contains(&self.0)
    }

    /// Modifier keys (Shift, Control, Alt, Super, ...) plus Mode_switch and
    /// Num_Lock.
    fn is_modifier(self) -> bool {
        (0xffe1..=0xffee).contains(&self.0) || self.0 == 0xff7e || self.0 == 0xff7f
    }

    /// The character this keysym produces, if it is printable.
    ///
    /// Latin-1 keysyms map directly to their code point; Unicode keysyms
    /// carry the code point in their low 24 bits. Control characters yield
    /// `None` so they can never enter the password buffer.
    fn to_char(self) -> Option<char> {
        match self.0 {
            0x20..=0x7e | 0xa0..=0xff => char::from_u32(self.0),
            ks if ks & 0xff00_0000 == 0x0100_0000 => {
                char::from_u32(ks & 0x00ff_ffff).filter(|c| !c.is_control())
            }
            _ => None,
        }
    }
}

/// The logical effect of one key press on the password-entry session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAction {
    /// Terminate the buffer and hand it to the credential authority.
    Submit,
    /// Clear the buffer without submitting.
    Cancel,
    /// Remove the last character, if any.
    Backspace,
    /// Append a printable character, capacity permitting.
    Char(char),
    /// No effect on the buffer and no submission.
    Ignore,
}

/// Translate a keysym into its logical action.
///
/// Keypad enter and keypad digits are first remapped to their standard
/// counterparts, so they are indistinguishable from them in buffer effect.
/// Remaining function, keypad, misc-function, PF, private-keypad and
/// modifier symbols are silently ignored.
pub fn resolve(keysym: Keysym) -> KeyAction {
    let keysym = remap_keypad(keysym);

    if keysym.is_function()
        || keysym.is_keypad()
        || keysym.is_misc_function()
        || keysym.is_pf()
        || keysym.is_private_keypad()
        || keysym.is_modifier()
    {
        return KeyAction::Ignore;
    }

    match keysym {
        XK_RETURN => KeyAction::Submit,
        XK_ESCAPE => KeyAction::Cancel,
        XK_BACKSPACE => KeyAction::Backspace,
        other => match other.to_char() {
            Some(c) => KeyAction::Char(c),
            None => KeyAction::Ignore,
        },
    }
}

fn remap_keypad(keysym: Keysym) -> Keysym {
    if !keysym.is_keypad() {
        return keysym;
    }
    if keysym == XK_KP_ENTER {
        XK_RETURN
    } else if (XK_KP_0.0..=XK_KP_9.0).contains(&keysym.0) {
        Keysym(keysym.0 - XK_KP_0.0 + XK_0.0)
    } else {
        keysym
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn printable_ascii_becomes_char() {
        assert_eq!(resolve(Keysym('a' as u32)), KeyAction::Char('a'));
        assert_eq!(resolve(Keysym('Z' as u32)), KeyAction::Char('Z'));
        assert_eq!(resolve(Keysym(' ' as u32)), KeyAction::Char(' '));
        assert_eq!(resolve(Keysym('!' as u32)), KeyAction::Char('!'));
    }

    #[test]
    fn latin1_becomes_char() {
        assert_eq!(resolve(Keysym(0xe9)), KeyAction::Char('é'));
    }

    #[test]
    fn unicode_keysym_becomes_char() {
        // XK for U+20AC EURO SIGN
        assert_eq!(resolve(Keysym(0x0100_20ac)), KeyAction::Char('€'));
    }

    #[test]
    fn editing_keys_dispatch() {
        assert_eq!(resolve(XK_RETURN), KeyAction::Submit);
        assert_eq!(resolve(XK_ESCAPE), KeyAction::Cancel);
        assert_eq!(resolve(XK_BACKSPACE), KeyAction::Backspace);
    }

    #[test]
    fn keypad_enter_is_submit() {
        assert_eq!(resolve(XK_KP_ENTER), KeyAction::Submit);
    }

    #[test]
    fn keypad_digits_match_standard_digits() {
        for digit in 0..=9u32 {
            let keypad = resolve(Keysym(XK_KP_0.0 + digit));
            let standard = resolve(Keysym(XK_0.0 + digit));
            assert_eq!(keypad, standard);
            assert_eq!(
                keypad,
                KeyAction::Char(char::from_digit(digit, 10).unwrap())
            );
        }
    }

    #[test]
    fn function_and_modifier_keys_are_ignored() {
        assert_eq!(resolve(Keysym(0xffbe)), KeyAction::Ignore); // F1
        assert_eq!(resolve(Keysym(0xffe0)), KeyAction::Ignore); // F35
        assert_eq!(resolve(Keysym(0xffe1)), KeyAction::Ignore); // Shift_L
        assert_eq!(resolve(Keysym(0xffe9)), KeyAction::Ignore); // Alt_L
        assert_eq!(resolve(Keysym(0xff7f)), KeyAction::Ignore); // Num_Lock
        assert_eq!(resolve(Keysym(0xff60)), KeyAction::Ignore); // Select
        assert_eq!(resolve(Keysym(0xff91)), KeyAction::Ignore); // KP_F1
        assert_eq!(resolve(Keysym(0x1100_0001)), KeyAction::Ignore);
    }

    #[test]
    fn non_remapped_keypad_keys_are_ignored() {
        assert_eq!(resolve(Keysym(0xff80)), KeyAction::Ignore); // KP_Space
        assert_eq!(resolve(Keysym(0xffbd)), KeyAction::Ignore); // KP_Equal
    }

    #[test]
    fn control_characters_are_ignored() {
        assert_eq!(resolve(Keysym(0xff09)), KeyAction::Ignore); // Tab
        assert_eq!(resolve(Keysym(0x0100_0007)), KeyAction::Ignore); // control char via Unicode keysym
    }
}
