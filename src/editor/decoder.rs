//! Keystroke token decoder
//!
//! Classifies one raw input token (as produced by the terminal layer) into a
//! logical edit command. Unknown sequences decode to [`EditCommand::Ignore`].

/// Logical edit command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditCommand {
    Enter,
    PasteRequest,
    Backspace,
    Delete,
    Home,
    End,
    CursorLeft,
    CursorRight,
    CursorUp,
    CursorDown,
    Ignore,
    InsertPrintable(char),
}

/// Fixed token patterns, checked before the printable fallback
const SEQUENCES: &[(&[u8], EditCommand)] = &[
    (b"\r", EditCommand::Enter),
    (b"\x16", EditCommand::PasteRequest), // Ctrl+V
    (b"\x7f", EditCommand::Backspace),
    (b"\x08", EditCommand::Backspace), // Ctrl+H
    (b"\x1b[3~", EditCommand::Delete),
    (b"\x1b[2~", EditCommand::Ignore), // Insert
    // Home / End: xterm, vt220 and application-cursor forms
    (b"\x1b[H", EditCommand::Home),
    (b"\x1b[1~", EditCommand::Home),
    (b"\x1bOH", EditCommand::Home),
    (b"\x1b[F", EditCommand::End),
    (b"\x1b[4~", EditCommand::End),
    (b"\x1bOF", EditCommand::End),
    // Arrows, normal and application mode
    (b"\x1b[A", EditCommand::CursorUp),
    (b"\x1b[B", EditCommand::CursorDown),
    (b"\x1b[C", EditCommand::CursorRight),
    (b"\x1b[D", EditCommand::CursorLeft),
    (b"\x1bOA", EditCommand::CursorUp),
    (b"\x1bOB", EditCommand::CursorDown),
    (b"\x1bOC", EditCommand::CursorRight),
    (b"\x1bOD", EditCommand::CursorLeft),
];

/// Decode a single keystroke token
pub fn decode(token: &[u8]) -> EditCommand {
    if let Some((_, command)) = SEQUENCES.iter().find(|(seq, _)| *seq == token) {
        return *command;
    }

    // Exactly one non-control character
    let Ok(text) = std::str::from_utf8(token) else {
        return EditCommand::Ignore;
    };
    let mut chars = text.chars();
    match (chars.next(), chars.next()) {
        (Some(ch), None) if !ch.is_control() => EditCommand::InsertPrintable(ch),
        _ => EditCommand::Ignore,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_control_tokens() {
        assert_eq!(decode(b"\r"), EditCommand::Enter);
        assert_eq!(decode(&[0x16]), EditCommand::PasteRequest);
        assert_eq!(decode(&[0x7f]), EditCommand::Backspace);
        assert_eq!(decode(b"\x1b[3~"), EditCommand::Delete);
    }

    #[test]
    fn test_navigation_tokens() {
        assert_eq!(decode(b"\x1b[H"), EditCommand::Home);
        assert_eq!(decode(b"\x1bOF"), EditCommand::End);
        assert_eq!(decode(b"\x1b[A"), EditCommand::CursorUp);
        assert_eq!(decode(b"\x1b[B"), EditCommand::CursorDown);
        assert_eq!(decode(b"\x1bOC"), EditCommand::CursorRight);
        assert_eq!(decode(b"\x1b[D"), EditCommand::CursorLeft);
        assert_eq!(decode(b"\x1b[2~"), EditCommand::Ignore);
    }

    #[test]
    fn test_printable() {
        assert_eq!(decode(b"a"), EditCommand::InsertPrintable('a'));
        assert_eq!(decode(b" "), EditCommand::InsertPrintable(' '));
        assert_eq!(decode("µ".as_bytes()), EditCommand::InsertPrintable('µ'));
    }

    #[test]
    fn test_unrecognized_is_ignored() {
        assert_eq!(decode(b""), EditCommand::Ignore);
        assert_eq!(decode(b"\x1b"), EditCommand::Ignore);
        assert_eq!(decode(b"\x1b[1;5A"), EditCommand::Ignore);
        assert_eq!(decode(b"\x1b[15~"), EditCommand::Ignore);
        assert_eq!(decode(b"ab"), EditCommand::Ignore);
        assert_eq!(decode(b"\t"), EditCommand::Ignore);
        assert_eq!(decode(&[0xff, 0xfe]), EditCommand::Ignore);
    }
}
