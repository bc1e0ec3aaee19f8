//! Inline `[n]` marker scanning as a small finite automaton.
//!
//! Accepted: `[` followed by one or more ASCII digits and `]`. Leading zeros
//! are allowed (`[01]` is 1), `[0]` is a marker, and values too large for a
//! `u32` saturate to `u32::MAX`. Callers decide which numbers resolve.
//! Anything else between the brackets (spaces, signs, letters, decimal
//! points) abandons the marker. A `[` inside an open marker restarts it, so
//! `[[2]]` yields 2.

use std::collections::BTreeSet;
use std::str::Chars;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Outside,
    Open,
    /// Digits read so far, saturating.
    Digits(u32),
}

/// Iterator over marker numbers in order of appearance, repeats included.
#[derive(Debug, Clone)]
pub struct MarkerScanner<'a> {
    chars: Chars<'a>,
    state: State,
}

impl<'a> MarkerScanner<'a> {
    pub fn new(text: &'a str) -> Self {
        Self {
            chars: text.chars(),
            state: State::Outside,
        }
    }
}

impl Iterator for MarkerScanner<'_> {
    type Item = u32;

    fn next(&mut self) -> Option<u32> {
        for c in self.chars.by_ref() {
            self.state = match (self.state, c) {
                (_, '[') => State::Open,
                (State::Open, '0'..='9') => State::Digits(digit(c)),
                (State::Digits(value), '0'..='9') => {
                    State::Digits(value.saturating_mul(10).saturating_add(digit(c)))
                }
                (State::Digits(value), ']') => {
                    self.state = State::Outside;
                    return Some(value);
                }
                _ => State::Outside,
            };
        }
        None
    }
}

fn digit(c: char) -> u32 {
    c.to_digit(10).unwrap_or(0)
}

pub fn scan_markers(text: &str) -> MarkerScanner<'_> {
    MarkerScanner::new(text)
}

/// Distinct marker numbers, ascending.
pub fn distinct_markers(text: &str) -> BTreeSet<u32> {
    scan_markers(text).collect()
}

/// Number of markers, repeats included.
pub fn marker_count(text: &str) -> usize {
    scan_markers(text).count()
}

/// Whether `text` contains the marker `[number]`.
pub fn references(text: &str, number: u32) -> bool {
    scan_markers(text).any(|n| n == number)
}
