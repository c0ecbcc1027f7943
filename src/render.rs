#![doc = r#"
Rendering song bytes as text.

The only output kind today is the Arcade hex literal; the selector is a
tagged variant so new formats slot in without changing the pipeline's
contract.
"#]

use crate::convert::CharBreak;

/// Which textual form the song bytes are rendered into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[non_exhaustive]
pub enum OutputFormat {
    /// A backtick-delimited hex literal for a MakeCode Arcade project.
    #[default]
    ArcadeHexString,
}

const HEX_DIGITS: &[u8; 16] = b"0123456789abcdef";

/// Renders bytes as a `` hex`...` `` literal.
///
/// Each byte becomes two lowercase hex digits in input order. With a
/// non-zero break, a newline and a four-space indent precede every Nth
/// pair counting from the first, and a final newline precedes the closing
/// backtick, so broken output always opens on a fresh line. The break
/// counts hex pairs, not characters.
pub fn hex_string(bytes: &[u8], char_break: CharBreak) -> String {
    let mut out = String::with_capacity(bytes.len() * 2 + 8);
    out.push_str("hex`");
    for (i, byte) in bytes.iter().enumerate() {
        if char_break.breaks_before(i) {
            out.push_str("\n    ");
        }
        out.push(HEX_DIGITS[(byte >> 4) as usize] as char);
        out.push(HEX_DIGITS[(byte & 0x0f) as usize] as char);
    }
    if !char_break.is_none() {
        out.push('\n');
    }
    out.push('`');
    out
}
