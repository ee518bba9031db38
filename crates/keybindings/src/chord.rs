//! Keystroke parsing
//!
//! A keystroke is written as modifier tokens joined by `+` followed by
//! exactly one base-key token, e.g. `"ControlLeft+KeyC"`. Token
//! matching is case-sensitive against a fixed vocabulary: the W3C
//! `KeyboardEvent.code` names plus the usual short aliases (`ctrl`,
//! `shift`, `c`, ...). Left/right modifier variants collapse into one
//! flag, so `"ControlRight+KeyC"` and `"ctrl+c"` parse to the same
//! chord.

use std::fmt;

/// Keystroke parse failure
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum KeystrokeError {
    #[error("unrecognized token: {0}")]
    UnknownToken(String),
    #[error("keystroke has no base key")]
    MissingKey,
    #[error("keystroke has more than one base key: {0} and {1}")]
    MultipleKeys(String, String),
}

/// A key chord: modifier flags plus one base key
///
/// Equality is structural; the order modifiers were written in does
/// not matter. [`KeyChord::canonical`] is the stored lookup form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KeyChord {
    pub modifiers: Modifiers,
    pub key: Key,
}

impl KeyChord {
    pub fn new(modifiers: Modifiers, key: Key) -> Self {
        Self { modifiers, key }
    }

    /// Parse a keystroke description
    pub fn parse(s: &str) -> Result<Self, KeystrokeError> {
        let mut modifiers = Modifiers::default();
        let mut key: Option<Key> = None;

        for token in s.split('+') {
            let token = token.trim();
            match token {
                "ControlLeft" | "ControlRight" | "ctrl" | "control" => modifiers.ctrl = true,
                "ShiftLeft" | "ShiftRight" | "shift" => modifiers.shift = true,
                "AltLeft" | "AltRight" | "alt" => modifiers.alt = true,
                "MetaLeft" | "MetaRight" | "OSLeft" | "OSRight" | "meta" | "cmd" => {
                    modifiers.meta = true
                }
                other => match Key::from_token(other) {
                    Some(k) => {
                        if let Some(first) = key {
                            return Err(KeystrokeError::MultipleKeys(
                                first.code().to_string(),
                                k.code().to_string(),
                            ));
                        }
                        key = Some(k);
                    }
                    None => return Err(KeystrokeError::UnknownToken(other.to_string())),
                },
            }
        }

        match key {
            Some(key) => Ok(Self { modifiers, key }),
            None => Err(KeystrokeError::MissingKey),
        }
    }

    /// Canonical string form: modifiers in a fixed order, then the
    /// base key's code name
    pub fn canonical(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for KeyChord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.modifiers.ctrl {
            write!(f, "Control+")?;
        }
        if self.modifiers.shift {
            write!(f, "Shift+")?;
        }
        if self.modifiers.alt {
            write!(f, "Alt+")?;
        }
        if self.modifiers.meta {
            write!(f, "Meta+")?;
        }
        write!(f, "{}", self.key.code())
    }
}

/// Modifier flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Modifiers {
    pub ctrl: bool,
    pub shift: bool,
    pub alt: bool,
    pub meta: bool,
}

impl Modifiers {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn ctrl() -> Self {
        Self {
            ctrl: true,
            ..Default::default()
        }
    }

    pub fn shift() -> Self {
        Self {
            shift: true,
            ..Default::default()
        }
    }

    pub fn ctrl_shift() -> Self {
        Self {
            ctrl: true,
            shift: true,
            ..Default::default()
        }
    }

    pub fn any(&self) -> bool {
        self.ctrl || self.shift || self.alt || self.meta
    }
}

/// A base key, identified by its W3C `KeyboardEvent.code` name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[rustfmt::skip]
pub enum Key {
    // Letters
    A, B, C, D, E, F, G, H, I, J, K, L, M,
    N, O, P, Q, R, S, T, U, V, W, X, Y, Z,

    // Digits
    Digit0, Digit1, Digit2, Digit3, Digit4,
    Digit5, Digit6, Digit7, Digit8, Digit9,

    // Function keys
    F1, F2, F3, F4, F5, F6, F7, F8, F9, F10, F11, F12,

    // Special keys
    Escape, Tab, Space, Enter, Backspace, Delete,
    Insert, Home, End, PageUp, PageDown,
    ArrowLeft, ArrowRight, ArrowUp, ArrowDown,

    // Punctuation
    Minus, Equal, BracketLeft, BracketRight, Backslash,
    Semicolon, Quote, Comma, Period, Slash, Backquote,
}

impl Key {
    /// Resolve one token; exact, case-sensitive match
    #[rustfmt::skip]
    pub fn from_token(s: &str) -> Option<Self> {
        let key = match s {
            "KeyA" | "a" => Key::A, "KeyB" | "b" => Key::B,
            "KeyC" | "c" => Key::C, "KeyD" | "d" => Key::D,
            "KeyE" | "e" => Key::E, "KeyF" | "f" => Key::F,
            "KeyG" | "g" => Key::G, "KeyH" | "h" => Key::H,
            "KeyI" | "i" => Key::I, "KeyJ" | "j" => Key::J,
            "KeyK" | "k" => Key::K, "KeyL" | "l" => Key::L,
            "KeyM" | "m" => Key::M, "KeyN" | "n" => Key::N,
            "KeyO" | "o" => Key::O, "KeyP" | "p" => Key::P,
            "KeyQ" | "q" => Key::Q, "KeyR" | "r" => Key::R,
            "KeyS" | "s" => Key::S, "KeyT" | "t" => Key::T,
            "KeyU" | "u" => Key::U, "KeyV" | "v" => Key::V,
            "KeyW" | "w" => Key::W, "KeyX" | "x" => Key::X,
            "KeyY" | "y" => Key::Y, "KeyZ" | "z" => Key::Z,

            "Digit0" | "0" => Key::Digit0, "Digit1" | "1" => Key::Digit1,
            "Digit2" | "2" => Key::Digit2, "Digit3" | "3" => Key::Digit3,
            "Digit4" | "4" => Key::Digit4, "Digit5" | "5" => Key::Digit5,
            "Digit6" | "6" => Key::Digit6, "Digit7" | "7" => Key::Digit7,
            "Digit8" | "8" => Key::Digit8, "Digit9" | "9" => Key::Digit9,

            "F1" | "f1" => Key::F1, "F2" | "f2" => Key::F2,
            "F3" | "f3" => Key::F3, "F4" | "f4" => Key::F4,
            "F5" | "f5" => Key::F5, "F6" | "f6" => Key::F6,
            "F7" | "f7" => Key::F7, "F8" | "f8" => Key::F8,
            "F9" | "f9" => Key::F9, "F10" | "f10" => Key::F10,
            "F11" | "f11" => Key::F11, "F12" | "f12" => Key::F12,

            "Escape" | "escape" | "esc" => Key::Escape,
            "Tab" | "tab" => Key::Tab,
            "Space" | "space" => Key::Space,
            "Enter" | "enter" => Key::Enter,
            "Backspace" | "backspace" => Key::Backspace,
            "Delete" | "delete" => Key::Delete,
            "Insert" | "insert" => Key::Insert,
            "Home" | "home" => Key::Home,
            "End" | "end" => Key::End,
            "PageUp" | "pageup" => Key::PageUp,
            "PageDown" | "pagedown" => Key::PageDown,
            "ArrowLeft" | "left" => Key::ArrowLeft,
            "ArrowRight" | "right" => Key::ArrowRight,
            "ArrowUp" | "up" => Key::ArrowUp,
            "ArrowDown" | "down" => Key::ArrowDown,

            "Minus" | "-" => Key::Minus,
            "Equal" | "=" => Key::Equal,
            "BracketLeft" | "[" => Key::BracketLeft,
            "BracketRight" | "]" => Key::BracketRight,
            "Backslash" | "\\" => Key::Backslash,
            "Semicolon" | ";" => Key::Semicolon,
            "Quote" | "'" => Key::Quote,
            "Comma" | "," => Key::Comma,
            "Period" | "." => Key::Period,
            "Slash" | "/" => Key::Slash,
            "Backquote" | "`" => Key::Backquote,

            _ => return None,
        };
        Some(key)
    }

    /// The W3C code name
    #[rustfmt::skip]
    pub fn code(&self) -> &'static str {
        match self {
            Key::A => "KeyA", Key::B => "KeyB", Key::C => "KeyC",
            Key::D => "KeyD", Key::E => "KeyE", Key::F => "KeyF",
            Key::G => "KeyG", Key::H => "KeyH", Key::I => "KeyI",
            Key::J => "KeyJ", Key::K => "KeyK", Key::L => "KeyL",
            Key::M => "KeyM", Key::N => "KeyN", Key::O => "KeyO",
            Key::P => "KeyP", Key::Q => "KeyQ", Key::R => "KeyR",
            Key::S => "KeyS", Key::T => "KeyT", Key::U => "KeyU",
            Key::V => "KeyV", Key::W => "KeyW", Key::X => "KeyX",
            Key::Y => "KeyY", Key::Z => "KeyZ",

            Key::Digit0 => "Digit0", Key::Digit1 => "Digit1",
            Key::Digit2 => "Digit2", Key::Digit3 => "Digit3",
            Key::Digit4 => "Digit4", Key::Digit5 => "Digit5",
            Key::Digit6 => "Digit6", Key::Digit7 => "Digit7",
            Key::Digit8 => "Digit8", Key::Digit9 => "Digit9",

            Key::F1 => "F1", Key::F2 => "F2", Key::F3 => "F3",
            Key::F4 => "F4", Key::F5 => "F5", Key::F6 => "F6",
            Key::F7 => "F7", Key::F8 => "F8", Key::F9 => "F9",
            Key::F10 => "F10", Key::F11 => "F11", Key::F12 => "F12",

            Key::Escape => "Escape",
            Key::Tab => "Tab",
            Key::Space => "Space",
            Key::Enter => "Enter",
            Key::Backspace => "Backspace",
            Key::Delete => "Delete",
            Key::Insert => "Insert",
            Key::Home => "Home",
            Key::End => "End",
            Key::PageUp => "PageUp",
            Key::PageDown => "PageDown",
            Key::ArrowLeft => "ArrowLeft",
            Key::ArrowRight => "ArrowRight",
            Key::ArrowUp => "ArrowUp",
            Key::ArrowDown => "ArrowDown",

            Key::Minus => "Minus",
            Key::Equal => "Equal",
            Key::BracketLeft => "BracketLeft",
            Key::BracketRight => "BracketRight",
            Key::Backslash => "Backslash",
            Key::Semicolon => "Semicolon",
            Key::Quote => "Quote",
            Key::Comma => "Comma",
            Key::Period => "Period",
            Key::Slash => "Slash",
            Key::Backquote => "Backquote",
        }
    }
}
