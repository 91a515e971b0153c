use std::borrow::Cow;

mod scanner;

use scanner::{
    State, closes_dollar_quote, dollar_quote_tag, is_block_comment_end, is_block_comment_start,
    is_line_comment_start, scan_digits,
};

/// Positional marker style a backend expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaceholderStyle {
    /// Bare `?` markers bound strictly by position (MySQL family).
    Question,
    /// Numbered `$N` markers (`PostgreSQL` family).
    Dollar,
}

/// One positional marker found in SQL text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Marker {
    start: usize,
    end: usize,
    /// Explicit number for `?N` and `$N` markers.
    number: Option<usize>,
    style: PlaceholderStyle,
}

/// Locate `?`, `?N` and `$N` markers outside string literals, quoted identifiers,
/// comments and dollar-quoted blocks.
fn scan_markers(sql: &str) -> Vec<Marker> {
    let bytes = sql.as_bytes();
    let mut markers = Vec::new();
    let mut state = State::Normal;
    let mut idx = 0;

    while idx < bytes.len() {
        let b = bytes[idx];
        match state {
            State::Normal => match b {
                b'\'' => state = State::SingleQuoted,
                b'"' => state = State::DoubleQuoted,
                b'`' => state = State::Backticked,
                _ if is_line_comment_start(bytes, idx) => state = State::LineComment,
                _ if is_block_comment_start(bytes, idx) => {
                    state = State::BlockComment(1);
                    idx += 1;
                }
                b'$' => {
                    if let Some((tag, close)) = dollar_quote_tag(bytes, idx) {
                        state = State::DollarQuoted(tag);
                        idx = close;
                    } else if let Some((end, digits)) = scan_digits(bytes, idx + 1) {
                        markers.push(Marker {
                            start: idx,
                            end,
                            number: digits.parse().ok(),
                            style: PlaceholderStyle::Dollar,
                        });
                        idx = end;
                        continue;
                    }
                }
                b'?' => {
                    if let Some((end, digits)) = scan_digits(bytes, idx + 1) {
                        markers.push(Marker {
                            start: idx,
                            end,
                            number: digits.parse().ok(),
                            style: PlaceholderStyle::Question,
                        });
                        idx = end;
                        continue;
                    }
                    markers.push(Marker {
                        start: idx,
                        end: idx + 1,
                        number: None,
                        style: PlaceholderStyle::Question,
                    });
                }
                _ => {}
            },
            State::SingleQuoted | State::DoubleQuoted | State::Backticked => {
                let quote = match state {
                    State::SingleQuoted => b'\'',
                    State::DoubleQuoted => b'"',
                    _ => b'`',
                };
                if b == quote {
                    if bytes.get(idx + 1) == Some(&quote) {
                        idx += 1; // doubled quote is an escape
                    } else {
                        state = State::Normal;
                    }
                }
            }
            State::LineComment => {
                if b == b'\n' {
                    state = State::Normal;
                }
            }
            State::BlockComment(depth) => {
                if is_block_comment_start(bytes, idx) {
                    state = State::BlockComment(depth + 1);
                    idx += 1;
                } else if is_block_comment_end(bytes, idx) {
                    state = if depth == 1 {
                        State::Normal
                    } else {
                        State::BlockComment(depth - 1)
                    };
                    idx += 1;
                }
            }
            State::DollarQuoted(ref tag) => {
                if closes_dollar_quote(bytes, idx, tag) {
                    let tag_len = tag.len();
                    state = State::Normal;
                    idx += tag_len + 1;
                }
            }
        }
        idx += 1;
    }

    markers
}

fn question_markers(sql: &str) -> Vec<Marker> {
    scan_markers(sql)
        .into_iter()
        .filter(|m| m.style == PlaceholderStyle::Question)
        .collect()
}

/// Number of `?` markers in `sql`, ignoring anything quoted or commented out.
#[must_use]
pub fn count_placeholders(sql: &str) -> usize {
    question_markers(sql).len()
}

/// Number of parameters `sql` expects when written in `style`.
///
/// `Question` counts `?` markers. `Dollar` takes the highest `$N`, since numbered markers
/// may repeat or appear out of order.
#[must_use]
pub fn count_placeholders_in(sql: &str, style: PlaceholderStyle) -> usize {
    match style {
        PlaceholderStyle::Question => count_placeholders(sql),
        PlaceholderStyle::Dollar => scan_markers(sql)
            .iter()
            .filter(|m| m.style == PlaceholderStyle::Dollar)
            .filter_map(|m| m.number)
            .max()
            .unwrap_or(0),
    }
}

/// Render `?` markers in the target style.
///
/// `Question` leaves the text alone. `Dollar` numbers bare `?` markers `$1..$n` in order of
/// appearance and maps explicit `?N` to `$N`. Quoted text and comments are never touched:
/// ```rust
/// use sql_mapper::translation::{PlaceholderStyle, render_placeholders};
///
/// let sql = "SELECT * FROM t WHERE note = '?' AND a = ? AND b = ?";
/// assert_eq!(
///     render_placeholders(sql, PlaceholderStyle::Dollar),
///     "SELECT * FROM t WHERE note = '?' AND a = $1 AND b = $2"
/// );
/// ```
/// Returns a borrowed `Cow` when no changes are needed.
#[must_use]
pub fn render_placeholders(sql: &str, style: PlaceholderStyle) -> Cow<'_, str> {
    if matches!(style, PlaceholderStyle::Question) {
        return Cow::Borrowed(sql);
    }

    let markers = question_markers(sql);
    if markers.is_empty() {
        return Cow::Borrowed(sql);
    }

    let mut out = String::with_capacity(sql.len() + markers.len() * 2);
    let mut copied = 0;
    let mut ordinal = 0usize;
    for marker in markers {
        out.push_str(&sql[copied..marker.start]);
        let number = marker.number.unwrap_or_else(|| {
            ordinal += 1;
            ordinal
        });
        out.push('$');
        out.push_str(&number.to_string());
        copied = marker.end;
    }
    out.push_str(&sql[copied..]);
    Cow::Owned(out)
}
