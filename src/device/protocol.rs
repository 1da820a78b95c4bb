//! Instrument text protocol
//!
//! Fixed commands understood by the instrument's Lua interpreter, and the
//! inbound line-ending normalizer.

/// TCP port of the instrument's raw socket interface
pub const DEVICE_PORT: u16 = 5025;

/// Sent once after every successful connect so errors are printed as they occur
pub const INIT_COMMAND: &str = "localnode.showerrors = 1\n";

/// Starts an anonymous script that runs as soon as it is closed
pub const SCRIPT_BEGIN: &str = "loadandrunscript\n";

/// Closes the script started by [`SCRIPT_BEGIN`]
pub const SCRIPT_END: &str = "endscript\n";

/// Prints and clears the instrument's error queue
pub const DRAIN_ERRORS_COMMAND: &str = concat!(
    "if errorqueue.count == 0 then print(\"0, Queue Is Empty\") ",
    "else for i = 1, errorqueue.count do ",
    "local code, message = errorqueue.next() ",
    "print(code .. \", \" .. message) end ",
    "errorqueue.clear() end\n",
);

/// Line boundary the local terminal expects in raw mode
const CRLF: &str = "\r\n";

/// Normalizes inbound text to CRLF line boundaries.
///
/// CR, LF and CRLF all count as one boundary. State carries across chunks so
/// a CRLF split between two reads is still a single boundary, and a UTF-8
/// sequence split between two reads is decoded whole.
#[derive(Debug, Default)]
pub struct LineEndings {
    /// Last chunk ended with CR; a leading LF in the next chunk belongs to it
    pending_cr: bool,
    /// Incomplete UTF-8 sequence from the end of the last chunk
    partial: Vec<u8>,
}

impl LineEndings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Normalize one received chunk
    pub fn normalize(&mut self, bytes: &[u8]) -> String {
        let mut data = std::mem::take(&mut self.partial);
        data.extend_from_slice(bytes);

        let mut text = String::with_capacity(data.len());
        let mut rest = data.as_slice();
        loop {
            match std::str::from_utf8(rest) {
                Ok(valid) => {
                    text.push_str(valid);
                    break;
                }
                Err(e) => {
                    let (valid, after) = rest.split_at(e.valid_up_to());
                    text.push_str(&String::from_utf8_lossy(valid));
                    match e.error_len() {
                        Some(len) => {
                            text.push(char::REPLACEMENT_CHARACTER);
                            rest = &after[len..];
                        }
                        None => {
                            // Incomplete sequence at the end, keep it for the next chunk
                            self.partial = after.to_vec();
                            break;
                        }
                    }
                }
            }
        }

        let mut out = String::with_capacity(text.len() + 8);
        for ch in text.chars() {
            match ch {
                '\r' => {
                    out.push_str(CRLF);
                    self.pending_cr = true;
                }
                '\n' => {
                    if !self.pending_cr {
                        out.push_str(CRLF);
                    }
                    self.pending_cr = false;
                }
                _ => {
                    out.push(ch);
                    self.pending_cr = false;
                }
            }
        }
        out
    }
}

/// Frame a script for [`SCRIPT_BEGIN`]/[`SCRIPT_END`].
///
/// Returns the three messages in send order. The end sentinel gets a leading
/// newline when the source does not end with one, so it always starts a line.
pub fn script_frames(source: &str) -> [String; 3] {
    let end = if source.is_empty() || source.ends_with('\n') {
        SCRIPT_END.to_string()
    } else {
        format!("\n{}", SCRIPT_END)
    };
    [SCRIPT_BEGIN.to_string(), source.to_string(), end]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mixed_line_endings() {
        let mut endings = LineEndings::new();
        let out = endings.normalize(b"ok\r\nerr\rnext\n");

        assert_eq!(out, "ok\r\nerr\r\nnext\r\n");
        assert_eq!(out.matches(CRLF).count(), 3);
        assert_eq!(out.matches('\r').count(), 3);
        assert_eq!(out.matches('\n').count(), 3);
    }

    #[test]
    fn test_blank_lines_preserved() {
        let mut endings = LineEndings::new();
        assert_eq!(endings.normalize(b"a\n\nb\r\r"), "a\r\n\r\nb\r\n\r\n");
    }

    #[test]
    fn test_crlf_split_across_chunks() {
        let mut endings = LineEndings::new();
        let mut out = endings.normalize(b"first\r");
        out.push_str(&endings.normalize(b"\nsecond\n"));
        assert_eq!(out, "first\r\nsecond\r\n");
    }

    #[test]
    fn test_utf8_split_across_chunks() {
        let mut endings = LineEndings::new();
        let bytes = "1.5µA\n".as_bytes();
        let split = bytes.iter().position(|&b| b >= 0x80).map(|i| i + 1).unwrap_or(0);

        let mut out = endings.normalize(&bytes[..split]);
        out.push_str(&endings.normalize(&bytes[split..]));
        assert_eq!(out, "1.5µA\r\n");
    }

    #[test]
    fn test_invalid_byte_before_split_utf8() {
        let mut endings = LineEndings::new();
        let mut out = endings.normalize(&[0xff, b'a', 0xc2]);
        assert_eq!(out, "\u{fffd}a");

        out.push_str(&endings.normalize(&[0xb5, b'\n']));
        assert_eq!(out, "\u{fffd}aµ\r\n");
    }

    #[test]
    fn test_invalid_bytes_replaced_individually() {
        let mut endings = LineEndings::new();
        assert_eq!(endings.normalize(&[b'x', 0xff, 0xfe, b'y']), "x\u{fffd}\u{fffd}y");
    }

    #[test]
    fn test_script_frames() {
        let [begin, body, end] = script_frames("print(1)");
        assert_eq!(begin, "loadandrunscript\n");
        assert_eq!(body, "print(1)");
        assert_eq!(end, "\nendscript\n");

        let [_, _, end] = script_frames("print(1)\n");
        assert_eq!(end, "endscript\n");
    }

    #[test]
    fn test_drain_command_is_single_line() {
        assert_eq!(DRAIN_ERRORS_COMMAND.matches('\n').count(), 1);
        assert!(DRAIN_ERRORS_COMMAND.ends_with('\n'));
        assert!(DRAIN_ERRORS_COMMAND.contains("errorqueue.clear()"));
    }
}
