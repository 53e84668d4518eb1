//! Line decoder for tuple-per-line record dumps.
//!
//! Each input line holds one parenthesized tuple such as
//!
//! ```text
//! ('42','dGVzdEBleGFtcGxlLmNvbQ==',1,2,3,4,5,6,'10.0.0.1'),
//! ```
//!
//! Only positions 0 (user ID), 1 (base64 email) and 8 (IP) are interpreted.
//! Fields may be quoted with `'` or `"`, and list-valued fields such as
//! `[1,2,3]` keep their inner commas.
//!
//! # Example
//!
//! ```
//! use idquery::decoder::decode_line;
//!
//! let record = decode_line("('42','dGVzdEBleGFtcGxlLmNvbQ==',1,2,3,4,5,6,'10.0.0.1'),")
//!     .expect("valid line");
//! assert_eq!(record.email, "test@example.com");
//! assert_eq!(record.ip, "10.0.0.1");
//! ```

use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use base64::Engine;

use crate::record::{is_null_email, normalize_ip, UserRecord, NOT_AVAILABLE};

/// Minimum number of top-level fields a line must have.
pub const MIN_FIELDS: usize = 9;

const USER_ID_FIELD: usize = 0;
const EMAIL_FIELD: usize = 1;
const IP_FIELD: usize = 8;

/// Standard alphabet, padding required, non-zero trailing bits tolerated.
const EMAIL_ENGINE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new()
        .with_decode_allow_trailing_bits(true)
        .with_decode_padding_mode(DecodePaddingMode::RequireCanonical),
);

/// Scanner state while splitting a tuple body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScanState {
    Unquoted,
    InQuote(char),
}

/// Top-level fields of one tuple body.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tokens {
    /// Whitespace-trimmed fields, quotes retained.
    pub fields: Vec<String>,

    /// The body ended inside a quoted field. Everything after the opening
    /// quote was folded into a single field.
    pub unterminated_quote: bool,

    /// The bracket depth was not zero at the end of the body.
    pub unbalanced_brackets: bool,
}

impl Tokens {
    /// Number of top-level fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Check whether no field was found.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Why a line produced no record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// The trimmed line is not wrapped in `(` and `)`.
    NotParenthesized,
    /// The tuple has fewer than [`MIN_FIELDS`] top-level fields.
    TooFewFields(usize),
}

impl std::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotParenthesized => write!(f, "not a parenthesized tuple"),
            Self::TooFewFields(n) => write!(f, "only {n} fields, need {MIN_FIELDS}"),
        }
    }
}

/// Result of decoding one line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineOutcome {
    /// The line was empty or whitespace.
    Blank,
    /// The line could not be turned into a record.
    Rejected(RejectReason),
    /// The line produced a record.
    Decoded {
        /// The decoded record.
        record: UserRecord,
        /// The tuple ended inside a quoted field (see [`Tokens::unterminated_quote`]).
        unterminated_quote: bool,
        /// Brackets in the tuple did not balance (see [`Tokens::unbalanced_brackets`]).
        unbalanced_brackets: bool,
    },
}

impl LineOutcome {
    /// Consume the outcome, keeping only a decoded record.
    #[must_use]
    pub fn into_record(self) -> Option<UserRecord> {
        match self {
            Self::Decoded { record, .. } => Some(record),
            Self::Blank | Self::Rejected(_) => None,
        }
    }
}

/// Decode one line into a record.
///
/// Returns `None` for blank lines, lines that are not a parenthesized tuple,
/// and tuples with fewer than [`MIN_FIELDS`] fields. Never panics.
#[must_use]
pub fn decode_line(line: &str) -> Option<UserRecord> {
    classify_line(line).into_record()
}

/// Decode one line and report why it was rejected, if it was.
#[must_use]
pub fn classify_line(line: &str) -> LineOutcome {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return LineOutcome::Blank;
    }

    let Some(body) = tuple_body(trimmed) else {
        return LineOutcome::Rejected(RejectReason::NotParenthesized);
    };

    let tokens = tokenize(body);
    if tokens.len() < MIN_FIELDS {
        return LineOutcome::Rejected(RejectReason::TooFewFields(tokens.len()));
    }

    let user_id = strip_quotes(&tokens.fields[USER_ID_FIELD]);
    let encoded = strip_quotes(&tokens.fields[EMAIL_FIELD]);
    let email = decode_email(encoded);
    let ip = normalize_ip(strip_quotes(&tokens.fields[IP_FIELD]));

    LineOutcome::Decoded {
        record: UserRecord::new(user_id, email, ip, encoded),
        unterminated_quote: tokens.unterminated_quote,
        unbalanced_brackets: tokens.unbalanced_brackets,
    }
}

/// Strip one trailing comma and the enclosing parentheses.
fn tuple_body(trimmed: &str) -> Option<&str> {
    let line = trimmed.strip_suffix(',').unwrap_or(trimmed);
    line.strip_prefix('(')?.strip_suffix(')')
}

/// Split a tuple body into its top-level fields.
///
/// A quote opens a quoted field only outside brackets, and only the same
/// quote character closes it. Brackets nest only outside quotes. Commas
/// separate fields only when unquoted at depth zero.
#[must_use]
pub fn tokenize(body: &str) -> Tokens {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut state = ScanState::Unquoted;
    let mut depth: i32 = 0;

    for ch in body.chars() {
        match state {
            ScanState::InQuote(quote) => {
                if ch == quote {
                    state = ScanState::Unquoted;
                }
                current.push(ch);
            }
            ScanState::Unquoted => match ch {
                '\'' | '"' if depth == 0 => {
                    state = ScanState::InQuote(ch);
                    current.push(ch);
                }
                '[' => {
                    depth += 1;
                    current.push(ch);
                }
                ']' => {
                    depth -= 1;
                    current.push(ch);
                }
                ',' if depth == 0 => {
                    fields.push(current.trim().to_string());
                    current.clear();
                }
                _ => current.push(ch),
            },
        }
    }

    if !current.is_empty() {
        fields.push(current.trim().to_string());
    }

    Tokens {
        fields,
        unterminated_quote: matches!(state, ScanState::InQuote(_)),
        unbalanced_brackets: depth != 0,
    }
}

/// Trim whitespace, then any run of `'` or `"` from both ends.
#[must_use]
pub fn strip_quotes(field: &str) -> &str {
    field.trim().trim_matches(|c| c == '\'' || c == '"')
}

/// Resolve the email from its encoded field.
///
/// Null markers map to [`NOT_AVAILABLE`]. Otherwise the field is base64
/// decoded and invalid UTF-8 is replaced; if base64 decoding fails, or the
/// field contains non-ASCII characters, the raw field is returned unchanged.
#[must_use]
pub fn decode_email(encoded: &str) -> String {
    if is_null_email(encoded) {
        return NOT_AVAILABLE.to_string();
    }
    if !encoded.is_ascii() {
        return encoded.to_string();
    }

    match EMAIL_ENGINE.decode(base64_symbols(encoded)) {
        Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
        Err(_) => encoded.to_string(),
    }
}

/// Keep only base64 symbols, stopping at the padding that closes a quantum.
///
/// Characters outside the alphabet are discarded and stray `=` before the
/// second symbol of a quantum are ignored. Anything after a completed
/// padding run is dropped.
fn base64_symbols(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut quad_pos = 0usize;
    let mut pads = 0usize;

    for ch in input.chars() {
        if ch == '=' {
            if quad_pos >= 2 {
                pads += 1;
                if quad_pos + pads >= 4 {
                    out.extend(std::iter::repeat('=').take(4 - quad_pos));
                    return out;
                }
            }
            continue;
        }
        if ch.is_ascii_alphanumeric() || ch == '+' || ch == '/' {
            out.push(ch);
            quad_pos = (quad_pos + 1) % 4;
            pads = 0;
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_email_and_ip() {
        let record = decode_line("('1','',x,x,x,x,x,x,'null'),").unwrap();
        assert_eq!(record, UserRecord::new("1", "N/A", "N/A", ""));
    }

    #[test]
    fn test_base64_email() {
        let record =
            decode_line("('42','dGVzdEBleGFtcGxlLmNvbQ==',1,2,3,4,5,6,'10.0.0.1')").unwrap();
        assert_eq!(record.user_id, "42");
        assert_eq!(record.email, "test@example.com");
        assert_eq!(record.ip, "10.0.0.1");
        assert_eq!(record.encoded, "dGVzdEBleGFtcGxlLmNvbQ==");
    }

    #[test]
    fn test_invalid_base64_falls_back_to_raw() {
        let record = decode_line("('7','not-base64!!!',1,2,3,4,5,6,'5.5.5.5')").unwrap();
        assert_eq!(record.email, "not-base64!!!");
        assert_eq!(record.encoded, "not-base64!!!");
        assert_eq!(record.ip, "5.5.5.5");
    }

    #[test]
    fn test_short_line_rejected() {
        assert!(decode_line("short,line").is_none());
        assert_eq!(
            classify_line("short,line"),
            LineOutcome::Rejected(RejectReason::NotParenthesized)
        );
    }

    #[test]
    fn test_blank_line() {
        assert_eq!(classify_line(""), LineOutcome::Blank);
        assert_eq!(classify_line("   \t"), LineOutcome::Blank);
        assert!(decode_line("  ").is_none());
    }

    #[test]
    fn test_eight_fields_rejected() {
        assert_eq!(
            classify_line("('1','',2,3,4,5,6,7)"),
            LineOutcome::Rejected(RejectReason::TooFewFields(8))
        );
    }

    #[test]
    fn test_exactly_nine_fields_accepted() {
        assert!(decode_line("('1','',2,3,4,5,6,7,'8.8.8.8')").is_some());
    }

    #[test]
    fn test_fields_beyond_ip_ignored() {
        let record = decode_line("('1','',2,3,4,5,6,7,'8.8.8.8','extra',[9,9])").unwrap();
        assert_eq!(record.ip, "8.8.8.8");
    }

    #[test]
    fn test_bracketed_list_is_one_field() {
        let tokens = tokenize("'9','',1,2,3,[1,2,3],5,6,'9.9.9.9'");
        assert_eq!(tokens.len(), 9);
        assert_eq!(tokens.fields[5], "[1,2,3]");
        assert!(!tokens.unbalanced_brackets);

        let record = decode_line("('9','',1,2,3,[1,2,3],5,6,'9.9.9.9')").unwrap();
        assert_eq!(record.ip, "9.9.9.9");
    }

    #[test]
    fn test_nested_brackets() {
        let tokens = tokenize("a,[[1,2],[3,4]],b");
        assert_eq!(tokens.fields, vec!["a", "[[1,2],[3,4]]", "b"]);
    }

    #[test]
    fn test_quoted_comma_kept() {
        let tokens = tokenize("'a,b',\"c,d\",e");
        assert_eq!(tokens.fields, vec!["'a,b'", "\"c,d\"", "e"]);
        assert!(!tokens.unterminated_quote);
    }

    #[test]
    fn test_other_quote_does_not_close() {
        let tokens = tokenize("'it\"s',x");
        assert_eq!(tokens.fields, vec!["'it\"s'", "x"]);
    }

    #[test]
    fn test_quote_inside_brackets_does_not_open() {
        let tokens = tokenize("['a,b'],c");
        // The bracket keeps the comma; the quote never opened.
        assert_eq!(tokens.fields, vec!["['a,b']", "c"]);
        assert!(!tokens.unterminated_quote);
    }

    #[test]
    fn test_unterminated_quote_swallows_rest() {
        let tokens = tokenize("'1','abc,2,3,4,5,6,7,8");
        assert_eq!(tokens.len(), 2);
        assert!(tokens.unterminated_quote);
        assert_eq!(
            classify_line("('1','abc,2,3,4,5,6,7,8)"),
            LineOutcome::Rejected(RejectReason::TooFewFields(2))
        );
    }

    #[test]
    fn test_unterminated_quote_flag_on_decoded_line() {
        let outcome = classify_line("('1','',2,3,4,5,6,7,'8.8.8.8','oops,9)");
        match outcome {
            LineOutcome::Decoded {
                record,
                unterminated_quote,
                unbalanced_brackets,
            } => {
                assert!(unterminated_quote);
                assert!(!unbalanced_brackets);
                assert_eq!(record.ip, "8.8.8.8");
            }
            other => panic!("expected decoded line, got {other:?}"),
        }
    }

    #[test]
    fn test_stray_closing_bracket_disables_separators() {
        let tokens = tokenize("a],b,c");
        assert_eq!(tokens.fields, vec!["a],b,c"]);
        assert!(tokens.unbalanced_brackets);
    }

    #[test]
    fn test_unbalanced_brackets_reported_on_decoded_line() {
        let outcome = classify_line("('3','',1,2,3,4,5,6,'9.9.9.9',x])");
        match outcome {
            LineOutcome::Decoded {
                unbalanced_brackets,
                ..
            } => assert!(unbalanced_brackets),
            other => panic!("expected decoded line, got {other:?}"),
        }
    }

    #[test]
    fn test_empty_fields_between_commas() {
        let tokens = tokenize("a,,b,");
        assert_eq!(tokens.fields, vec!["a", "", "b"]);
    }

    #[test]
    fn test_whitespace_and_trailing_comma() {
        let record = decode_line("   ( '5' , 'YUBiLmM=' ,1,2,3,4,5,6, \"1.1.1.1\" ),  ").unwrap();
        assert_eq!(record.user_id, "5");
        assert_eq!(record.email, "a@b.c");
        assert_eq!(record.ip, "1.1.1.1");
    }

    #[test]
    fn test_missing_closing_paren_rejected() {
        assert_eq!(
            classify_line("('1','',2,3,4,5,6,7,'8'"),
            LineOutcome::Rejected(RejectReason::NotParenthesized)
        );
        assert!(decode_line("('1','',2,3,4,5,6,7,'8') ,").is_none());
    }

    #[test]
    fn test_upper_null_markers() {
        let record = decode_line("('3',NULL,1,2,3,4,5,6,NULL)").unwrap();
        assert_eq!(record.email, NOT_AVAILABLE);
        assert_eq!(record.ip, NOT_AVAILABLE);
        assert_eq!(record.encoded, "NULL");
    }

    #[test]
    fn test_strip_quotes() {
        assert_eq!(strip_quotes("'abc'"), "abc");
        assert_eq!(strip_quotes("\"'abc'\""), "abc");
        assert_eq!(strip_quotes("  'a'b'  "), "a'b");
        assert_eq!(strip_quotes("''"), "");
    }

    #[test]
    fn test_decode_email_invalid_utf8_is_replaced() {
        // 0xff 0xfe is not valid UTF-8.
        let email = decode_email("//4=");
        assert_eq!(email, "\u{fffd}\u{fffd}");
    }

    #[test]
    fn test_decode_email_ignores_foreign_characters() {
        assert_eq!(decode_email("dGVz\ndA=="), "test");
        assert_eq!(decode_email("YQ==garbage"), "a");
    }

    #[test]
    fn test_decode_email_non_ascii_kept_raw() {
        assert_eq!(decode_email("éYQ=="), "éYQ==");
        assert_eq!(decode_email("YQ==é"), "YQ==é");

        let record = decode_line("('1','YQ==é',1,2,3,4,5,6,'1.1.1.1')").unwrap();
        assert_eq!(record.email, "YQ==é");
        assert!(record.email_is_raw());
    }

    #[test]
    fn test_decode_email_requires_padding() {
        assert_eq!(decode_email("YQ"), "YQ");
        assert_eq!(decode_email("YWJjZA"), "YWJjZA");
    }

    #[test]
    fn test_decode_email_trailing_bits_tolerated() {
        assert_eq!(decode_email("YR=="), "a");
    }

    #[test]
    fn test_decode_is_idempotent() {
        let line = "('42','dGVzdEBleGFtcGxlLmNvbQ==',[1,2],'x,y',3,4,5,6,'10.0.0.1'),";
        let first = decode_line(line);
        let second = decode_line(line);
        assert!(first.is_some());
        assert_eq!(first, second);
    }

    #[test]
    fn test_reject_reason_display() {
        assert_eq!(
            RejectReason::NotParenthesized.to_string(),
            "not a parenthesized tuple"
        );
        assert_eq!(
            RejectReason::TooFewFields(3).to_string(),
            "only 3 fields, need 9"
        );
    }
}
