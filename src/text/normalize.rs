use std::borrow::Cow;
use std::fmt;

use serde::{Deserialize, Serialize};

const UTF8_BOM: char = '\u{FEFF}';
const UTF16_BOM: char = '\u{FFFE}';

/// Line ending style of a piece of text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LineEnding {
    Lf,
    CrLf,
}

impl LineEnding {
    pub fn as_str(&self) -> &'static str {
        match self {
            LineEnding::Lf => "\n",
            LineEnding::CrLf => "\r\n",
        }
    }
}

impl fmt::Display for LineEnding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            LineEnding::Lf => "LF",
            LineEnding::CrLf => "CRLF",
        };
        f.write_str(label)
    }
}

fn is_bom(ch: char) -> bool {
    ch == UTF8_BOM || ch == UTF16_BOM
}

/// Removes every byte-order mark from the text, wherever it appears.
///
/// Removing a BOM can never produce a new one, so a single filtering pass
/// already reaches the fixed point. Text without any BOM is returned borrowed.
pub fn strip_all_boms(text: &str) -> Cow<'_, str> {
    if !text.contains(is_bom) {
        return Cow::Borrowed(text);
    }
    Cow::Owned(text.chars().filter(|ch| !is_bom(*ch)).collect())
}

/// CRLF if the text contains any CRLF sequence, LF otherwise.
pub fn detect_line_ending(text: &str) -> LineEnding {
    if text.contains("\r\n") {
        LineEnding::CrLf
    } else {
        LineEnding::Lf
    }
}

/// Rewrites every CRLF and bare LF to `target`. Lone CR characters are left alone.
pub fn normalize_eol(text: &str, target: LineEnding) -> String {
    let unified = text.replace("\r\n", "\n");
    match target {
        LineEnding::Lf => unified,
        LineEnding::CrLf => unified.replace('\n', "\r\n"),
    }
}
