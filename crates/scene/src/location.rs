//! Location codes.
//!
//! Every indoor/outdoor entity on the campus is addressed by a positional
//! string code:
//!
//! | kind     | shape                                   | example          |
//! |----------|-----------------------------------------|------------------|
//! | building | 3 letters + 2 digits                    | `BMB01`          |
//! | floor    | building + level letter + 2 digits      | `BMB01N02`       |
//! | room     | floor + 3 digits + optional letter      | `BMB01N02012a`   |
//! | door     | floor + `D` + 3 digits                  | `BMB01N02D001`   |
//!
//! Level letters are one of `N`, `P`, `M`, `Z`, `S`. Matching is
//! case-insensitive. Like-expressions replace any position with `_` and are
//! used for bulk queries only.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

pub const BUILDING_CODE_LEN: usize = 5;
pub const FLOOR_CODE_LEN: usize = 8;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum CodeKind {
    Building,
    Floor,
    Room,
    Door,
    Invalid,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum LikeKind {
    Building,
    Room,
    Door,
}

static BUILDING_RE: LazyLock<Regex> = LazyLock::new(|| code_regex(r"[A-Z]{3}[0-9]{2}"));
static FLOOR_RE: LazyLock<Regex> = LazyLock::new(|| code_regex(r"[A-Z]{3}[0-9]{2}[NMPSZ][0-9]{2}"));
static ROOM_RE: LazyLock<Regex> = LazyLock::new(|| code_regex(r"[A-Z]{3}[0-9]{2}[NMPSZ][0-9]{5}[a-z]?"));
static DOOR_RE: LazyLock<Regex> = LazyLock::new(|| code_regex(r"[A-Z]{3}[0-9]{2}[NMPSZ][0-9]{2}D[0-9]{3}"));

static BUILDING_LIKE_RE: LazyLock<Regex> = LazyLock::new(|| code_regex(r"[A-Z_]{3}[0-9_]{2}"));
static ROOM_LIKE_RE: LazyLock<Regex> =
    LazyLock::new(|| code_regex(r"[A-Z_]{3}[0-9_]{2}[NMPSZ_][0-9_]{5}[a-z_]?"));
static DOOR_LIKE_RE: LazyLock<Regex> =
    LazyLock::new(|| code_regex(r"[A-Z_]{3}[0-9_]{2}[NMPSZ_][0-9_]{2}[D_][0-9_]{3}"));

/// Anchored, case-insensitive, ASCII-only pattern.
fn code_regex(body: &str) -> Regex {
    Regex::new(&format!("(?i-u)^{body}$")).expect("location code pattern")
}

/// Classifies an exact location code. Never fails: anything unrecognised is
/// `CodeKind::Invalid`.
pub fn classify(code: &str) -> CodeKind {
    if BUILDING_RE.is_match(code) {
        CodeKind::Building
    } else if FLOOR_RE.is_match(code) {
        CodeKind::Floor
    } else if ROOM_RE.is_match(code) {
        CodeKind::Room
    } else if DOOR_RE.is_match(code) {
        CodeKind::Door
    } else {
        CodeKind::Invalid
    }
}

/// Classifies a like-expression. A string without any `_` is an exact code,
/// not a like-expression, and yields `None`.
pub fn classify_like(expr: &str) -> Option<LikeKind> {
    if !expr.contains('_') {
        return None;
    }
    if BUILDING_LIKE_RE.is_match(expr) {
        Some(LikeKind::Building)
    } else if ROOM_LIKE_RE.is_match(expr) {
        Some(LikeKind::Room)
    } else if DOOR_LIKE_RE.is_match(expr) {
        Some(LikeKind::Door)
    } else {
        None
    }
}

pub fn is_building_code(code: &str) -> bool {
    classify(code) == CodeKind::Building
}

pub fn is_room_code(code: &str) -> bool {
    classify(code) == CodeKind::Room
}

pub fn is_door_code(code: &str) -> bool {
    classify(code) == CodeKind::Door
}

pub fn is_floor_code(code: &str) -> bool {
    classify(code) == CodeKind::Floor
}

pub fn is_building_code_or_like(code: &str) -> bool {
    is_building_code(code) || classify_like(code) == Some(LikeKind::Building)
}

pub fn is_room_code_or_like(code: &str) -> bool {
    is_room_code(code) || classify_like(code) == Some(LikeKind::Room)
}

pub fn is_door_code_or_like(code: &str) -> bool {
    is_door_code(code) || classify_like(code) == Some(LikeKind::Door)
}

fn prefix(code: &str, len: usize) -> &str {
    // Codes are ASCII when valid; fall back to a char boundary otherwise.
    let mut end = len.min(code.len());
    while !code.is_char_boundary(end) {
        end -= 1;
    }
    &code[..end]
}

/// First 5 characters. Total: shorter input is returned unchanged.
pub fn building_prefix(code: &str) -> &str {
    prefix(code, BUILDING_CODE_LEN)
}

/// First 8 characters. Total: shorter input is returned unchanged.
pub fn floor_prefix(code: &str) -> &str {
    prefix(code, FLOOR_CODE_LEN)
}

/// Owned location code. Holds any string; use `kind()` before relying on its
/// shape.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LocationCode(String);

impl LocationCode {
    pub fn new(code: impl Into<String>) -> Self {
        LocationCode(code.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn kind(&self) -> CodeKind {
        classify(&self.0)
    }

    pub fn building_prefix(&self) -> &str {
        building_prefix(&self.0)
    }

    pub fn floor_prefix(&self) -> &str {
        floor_prefix(&self.0)
    }

    pub fn building_code(&self) -> LocationCode {
        LocationCode::new(self.building_prefix())
    }

    /// Floor code this code lies on, when it is at least floor length.
    pub fn floor_code(&self) -> Option<LocationCode> {
        (self.0.len() >= FLOOR_CODE_LEN).then(|| LocationCode::new(self.floor_prefix()))
    }

    pub fn shares_building(&self, other: &LocationCode) -> bool {
        self.building_prefix() == other.building_prefix()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Display for LocationCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for LocationCode {
    fn from(s: &str) -> Self {
        LocationCode::new(s)
    }
}

impl AsRef<str> for LocationCode {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_each_kind() {
        assert_eq!(classify("BMB01"), CodeKind::Building);
        assert_eq!(classify("BMB01N02"), CodeKind::Floor);
        assert_eq!(classify("BMB01N02012"), CodeKind::Room);
        assert_eq!(classify("BMB01N02123a"), CodeKind::Room);
        assert_eq!(classify("BMB01N0201234"), CodeKind::Invalid);
        assert_eq!(classify("BMB01N02D001"), CodeKind::Door);
        assert_eq!(classify("bmb01n02"), CodeKind::Floor);
    }

    #[test]
    fn rejects_malformed_codes() {
        for code in ["", "BM01", "BMB011", "BMB01X02", "BMB01N2", "BMB01N02D01", "BMB01N021234", "custom-marker", "ŽMB01"] {
            assert_eq!(classify(code), CodeKind::Invalid, "{code}");
        }
    }

    #[test]
    fn every_building_code_prefixes_its_floors() {
        for b in ["BMB01", "ABC99", "xyz00"] {
            assert_eq!(classify(b), CodeKind::Building);
            for level in ["N01", "P02", "M00", "Z03", "S01"] {
                let floor = format!("{b}{level}");
                assert_eq!(classify(&floor), CodeKind::Floor);
                assert_eq!(building_prefix(&floor), b);
            }
        }
    }

    #[test]
    fn door_floor_prefix() {
        let door = "BMB01N02D001";
        assert_eq!(classify(door), CodeKind::Door);
        assert_eq!(floor_prefix(door), "BMB01N02");
    }

    #[test]
    fn prefixes_are_total() {
        assert_eq!(building_prefix("AB"), "AB");
        assert_eq!(floor_prefix("BMB01"), "BMB01");
        assert_eq!(floor_prefix("ŽŽŽŽŽ"), "ŽŽŽŽ");
        assert_eq!(LocationCode::new("BMB01").floor_code(), None);
    }

    #[test]
    fn like_expressions_need_a_wildcard() {
        assert_eq!(classify_like("BM___"), Some(LikeKind::Building));
        assert_eq!(classify_like("BMB01N02___"), Some(LikeKind::Room));
        assert_eq!(classify_like("BMB01N02_____"), None);
        assert_eq!(classify_like("BMB01"), None);
        assert_eq!(classify_like("BMB0_N02D001"), Some(LikeKind::Door));
        assert_eq!(classify_like("BMB0_N02X001"), None);
        assert!(is_building_code_or_like("BMB01"));
        assert!(is_room_code_or_like("BMB01N02_1_a"));
    }
}
