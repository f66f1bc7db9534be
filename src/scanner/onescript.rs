//! Внешний сканер OneScript: маркеры областей, многострочные строки и даты
//!
//! The scanner state holds the region nesting depth (little-endian `u32`,
//! empty for depth zero), so `#КонецОбласти` is only recognised inside a
//! region.

use logos::Logos;

use super::{ExternalScanner, ScanOutcome, ScannerState};
use crate::grammar::onescript::externals;
use crate::language::tables::ValidExternals;

/// Слово после `#` в строке области
#[derive(Logos, Debug, Clone, Copy, PartialEq, Eq)]
enum RegionMarker {
    #[token("Область", ignore(case))]
    #[token("Region", ignore(case))]
    Start,

    #[token("КонецОбласти", ignore(case))]
    #[token("EndRegion", ignore(case))]
    End,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct OneScriptScanner;

/// The scanner instance referenced by the OneScript language.
pub static ONESCRIPT_SCANNER: OneScriptScanner = OneScriptScanner;

fn depth(state: &ScannerState) -> u32 {
    match state.as_bytes() {
        [a, b, c, d] => u32::from_le_bytes([*a, *b, *c, *d]),
        _ => 0,
    }
}

fn with_depth(depth: u32) -> ScannerState {
    if depth == 0 {
        ScannerState::new()
    } else {
        ScannerState(depth.to_le_bytes().to_vec())
    }
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

fn line_end(text: &str) -> usize {
    text.find(|c: char| c == '\r' || c == '\n').unwrap_or(text.len())
}

impl OneScriptScanner {
    fn scan_region(&self, rest: &str, valid: ValidExternals, state: &ScannerState) -> ScanOutcome {
        // Решение зависит только от текущей строки
        let examined = (line_end(rest) + 1).min(rest.len());
        let after_hash = rest[1..]
            .find(|c: char| c != ' ' && c != '\t')
            .map_or(rest.len(), |i| i + 1);
        let word = &rest[after_hash..];

        let mut lexer = RegionMarker::lexer(word);
        let marker = match lexer.next() {
            Some(Ok(marker)) if lexer.span().start == 0 => marker,
            _ => return ScanOutcome::Decline { examined },
        };
        let length = after_hash + lexer.span().end;
        if rest[length..].chars().next().map_or(false, is_word_char) {
            return ScanOutcome::Decline { examined };
        }

        let depth = depth(state);
        match marker {
            RegionMarker::Start if valid.contains(externals::REGION_START) => ScanOutcome::Token {
                token: externals::REGION_START,
                length,
                state: with_depth(depth.saturating_add(1)),
                examined,
            },
            RegionMarker::End if valid.contains(externals::REGION_END) && depth > 0 => {
                ScanOutcome::Token {
                    token: externals::REGION_END,
                    length,
                    state: with_depth(depth - 1),
                    examined,
                }
            }
            _ => ScanOutcome::Decline { examined },
        }
    }

    /// Length of a string literal starting at `"`, and the bytes examined.
    fn scan_string(rest: &str) -> (Option<usize>, usize) {
        let bytes = rest.as_bytes();
        let mut i = 1;
        loop {
            match bytes.get(i) {
                None => return (None, i),
                Some(b'"') => {
                    if bytes.get(i + 1) == Some(&b'"') {
                        i += 2;
                    } else {
                        return (Some(i + 1), (i + 2).min(bytes.len()));
                    }
                }
                Some(b'\r') | Some(b'\n') => match Self::continuation(bytes, i) {
                    Ok(next) => i = next,
                    Err(examined) => return (None, examined),
                },
                Some(_) => i += 1,
            }
        }
    }

    /// Skips blank and comment lines up to the next `|`; returns the offset
    /// just past it.
    fn continuation(bytes: &[u8], mut i: usize) -> Result<usize, usize> {
        loop {
            match bytes.get(i) {
                None => return Err(i),
                Some(b' ') | Some(b'\t') | Some(b'\r') | Some(b'\n') => i += 1,
                Some(b'|') => return Ok(i + 1),
                Some(b'/') if bytes.get(i + 1) == Some(&b'/') => {
                    while i < bytes.len() && bytes[i] != b'\n' {
                        i += 1;
                    }
                }
                Some(_) => return Err(i + 1),
            }
        }
    }

    /// Length of a date literal starting at `'`, and the bytes examined.
    fn scan_date(rest: &str) -> (Option<usize>, usize) {
        let body = &rest[1..];
        let close = match body.find(|c: char| c == '\'' || c == '\r' || c == '\n') {
            Some(i) if body[i..].starts_with('\'') => i,
            Some(i) => return (None, i + 2),
            None => return (None, rest.len()),
        };
        let length = close + 2;
        let digits: Vec<u32> = body[..close].chars().filter_map(|c| c.to_digit(10)).collect();
        if is_valid_date(&digits) {
            (Some(length), length)
        } else {
            (None, length)
        }
    }
}

fn number(digits: &[u32]) -> u32 {
    digits.iter().fold(0, |acc, d| acc * 10 + d)
}

fn days_in_month(year: u32, month: u32) -> u32 {
    match month {
        1 | 3 | 5 | 7 | 8 | 10 | 12 => 31,
        4 | 6 | 9 | 11 => 30,
        2 if (year % 4 == 0 && year % 100 != 0) || year % 400 == 0 => 29,
        2 => 28,
        _ => 0,
    }
}

/// `YYYYMMDD`, `YYYYMMDDhhmm` or `YYYYMMDDhhmmss`; all zeros is the empty date.
fn is_valid_date(digits: &[u32]) -> bool {
    if !matches!(digits.len(), 8 | 12 | 14) {
        return false;
    }
    if digits.iter().all(|d| *d == 0) {
        return true;
    }
    let year = number(&digits[0..4]);
    let month = number(&digits[4..6]);
    let day = number(&digits[6..8]);
    if year == 0 || day == 0 || day > days_in_month(year, month) {
        return false;
    }
    if digits.len() >= 12 {
        let hour = number(&digits[8..10]);
        let minute = number(&digits[10..12]);
        if hour > 23 || minute > 59 {
            return false;
        }
    }
    digits.len() < 14 || number(&digits[12..14]) <= 59
}

impl ExternalScanner for OneScriptScanner {
    fn token_count(&self) -> usize {
        externals::NAMES.len()
    }

    fn scan(
        &self,
        input: &str,
        offset: usize,
        valid: ValidExternals,
        state: &ScannerState,
    ) -> ScanOutcome {
        let rest = match input.get(offset..) {
            Some(rest) if !rest.is_empty() => rest,
            _ => return ScanOutcome::Decline { examined: 0 },
        };
        let same_state = || state.clone();

        match rest.as_bytes()[0] {
            b'#' if valid.contains(externals::REGION_START) || valid.contains(externals::REGION_END) => {
                self.scan_region(rest, valid, state)
            }
            b'"' if valid.contains(externals::STRING) => match Self::scan_string(rest) {
                (Some(length), examined) => ScanOutcome::Token {
                    token: externals::STRING,
                    length,
                    state: same_state(),
                    examined,
                },
                (None, examined) => ScanOutcome::Decline { examined },
            },
            b'\'' if valid.contains(externals::DATE) => match Self::scan_date(rest) {
                (Some(length), examined) => ScanOutcome::Token {
                    token: externals::DATE,
                    length,
                    state: same_state(),
                    examined,
                },
                (None, examined) => ScanOutcome::Decline { examined },
            },
            _ => ScanOutcome::Decline { examined: 1 },
        }
    }
}
