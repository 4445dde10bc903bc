// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Puzzle identity, pro detection and display names.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// Filename marker for puzzles that need Pro access or an unlock.
pub const PRO_MARKER: &str = "_pro_";

/// Image extensions recognized as puzzles.
pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp", "gif", "svg", "avif"];

/// A puzzle is identified by its category directory and image filename.
///
/// Serialized as `"{category}/{filename}"`, which is also the form stored in
/// unlock and wishlist documents.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PuzzleId {
    pub category: String,
    pub filename: String,
}

impl PuzzleId {
    pub fn new(category: impl Into<String>, filename: impl Into<String>) -> Self {
        Self {
            category: category.into(),
            filename: filename.into(),
        }
    }

    /// Whether the filename marks this puzzle as pro.
    pub fn is_pro(&self) -> bool {
        self.filename.contains(PRO_MARKER)
    }
}

impl fmt::Display for PuzzleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.category, self.filename)
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("Invalid puzzle id: {0}")]
pub struct InvalidPuzzleId(pub String);

impl FromStr for PuzzleId {
    type Err = InvalidPuzzleId;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (category, filename) = s
            .split_once('/')
            .ok_or_else(|| InvalidPuzzleId(s.to_string()))?;

        if !is_safe_segment(category) || !is_safe_segment(filename) {
            return Err(InvalidPuzzleId(s.to_string()));
        }

        Ok(Self::new(category, filename))
    }
}

impl Serialize for PuzzleId {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for PuzzleId {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// A single path segment with no traversal or separators.
pub fn is_safe_segment(segment: &str) -> bool {
    !segment.is_empty()
        && segment != "."
        && segment != ".."
        && !segment.contains(['/', '\\', '\0'])
        && segment.len() <= 200
}

/// How puzzle names are presented to visitors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PuzzleNameDisplay {
    /// `_pro_a-cute-kitty.jpg` shows as `A Cute Kitty`.
    #[default]
    Formatted,
    /// The filename without extension.
    Filename,
    /// No name at all.
    Hidden,
}

impl FromStr for PuzzleNameDisplay {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "formatted" => Ok(Self::Formatted),
            "filename" => Ok(Self::Filename),
            "hidden" | "none" => Ok(Self::Hidden),
            other => Err(format!("unknown name display mode: {other}")),
        }
    }
}

/// Display name for a puzzle file under the given mode.
pub fn display_name(filename: &str, mode: PuzzleNameDisplay) -> Option<String> {
    match mode {
        PuzzleNameDisplay::Hidden => None,
        PuzzleNameDisplay::Filename => Some(strip_extension(filename).to_string()),
        PuzzleNameDisplay::Formatted => Some(format_name(filename)),
    }
}

fn strip_extension(filename: &str) -> &str {
    match filename.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => filename,
    }
}

fn format_name(filename: &str) -> String {
    let stem = strip_extension(filename).replace(PRO_MARKER, " ");

    stem.split(|c: char| c == '-' || c == '_' || c.is_whitespace())
        .filter(|word| !word.is_empty())
        .map(title_case)
        .collect::<Vec<_>>()
        .join(" ")
}

fn title_case(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first
            .to_uppercase()
            .chain(chars.flat_map(char::to_lowercase))
            .collect(),
        None => String::new(),
    }
}

/// Whether a filename has a recognized image extension.
pub fn is_image_file(filename: &str) -> bool {
    filename
        .rsplit_once('.')
        .map(|(_, ext)| {
            let ext = ext.to_ascii_lowercase();
            IMAGE_EXTENSIONS.contains(&ext.as_str())
        })
        .unwrap_or(false)
}

/// A puzzle in the catalog.
#[derive(Debug, Clone)]
pub struct Puzzle {
    pub id: PuzzleId,
    /// Lowercased formatted name, precomputed for search.
    pub search_key: String,
}

impl Puzzle {
    pub fn new(id: PuzzleId) -> Self {
        let search_key = format!("{} {}", format_name(&id.filename), id.category).to_lowercase();
        Self { id, search_key }
    }

    pub fn is_pro(&self) -> bool {
        self.id.is_pro()
    }

    /// Public URL of the puzzle image.
    pub fn image_path(&self) -> String {
        format!(
            "/puzzles/{}/{}",
            urlencoding::encode(&self.id.category),
            urlencoding::encode(&self.id.filename)
        )
    }

    /// URL of the play page for this puzzle.
    pub fn play_path(&self) -> String {
        format!(
            "/play/{}/{}",
            urlencoding::encode(&self.id.category),
            urlencoding::encode(&self.id.filename)
        )
    }
}

/// Puzzle summary for API responses.
#[derive(Debug, Clone, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "camelCase")]
pub struct PuzzleSummary {
    #[cfg_attr(feature = "binding-generation", ts(type = "string"))]
    pub id: PuzzleId,
    pub category: String,
    pub display_name: Option<String>,
    pub is_pro: bool,
    pub image_url: String,
    pub play_url: String,
}

impl PuzzleSummary {
    pub fn from_puzzle(puzzle: &Puzzle, mode: PuzzleNameDisplay) -> Self {
        Self {
            id: puzzle.id.clone(),
            category: puzzle.id.category.clone(),
            display_name: display_name(&puzzle.id.filename, mode),
            is_pro: puzzle.is_pro(),
            image_url: puzzle.image_path(),
            play_url: puzzle.play_path(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formatted_name_strips_pro_marker_and_extension() {
        assert_eq!(
            display_name("_pro_a-cute-kitty.jpg", PuzzleNameDisplay::Formatted).as_deref(),
            Some("A Cute Kitty")
        );
        assert_eq!(
            display_name("sunset_over_HILLS.png", PuzzleNameDisplay::Formatted).as_deref(),
            Some("Sunset Over Hills")
        );
        assert_eq!(
            display_name("mountain-lake_pro_.webp", PuzzleNameDisplay::Formatted).as_deref(),
            Some("Mountain Lake")
        );
    }

    #[test]
    fn other_display_modes() {
        assert_eq!(
            display_name("_pro_a-cute-kitty.jpg", PuzzleNameDisplay::Filename).as_deref(),
            Some("_pro_a-cute-kitty")
        );
        assert_eq!(
            display_name("_pro_a-cute-kitty.jpg", PuzzleNameDisplay::Hidden),
            None
        );
        assert_eq!("none".parse(), Ok(PuzzleNameDisplay::Hidden));
        assert!("fancy".parse::<PuzzleNameDisplay>().is_err());
    }

    #[test]
    fn pro_detection_is_substring_match() {
        assert!(PuzzleId::new("animals", "_pro_a-cute-kitty.jpg").is_pro());
        assert!(PuzzleId::new("animals", "kitty_pro_2.jpg").is_pro());
        assert!(!PuzzleId::new("animals", "kitty-pro.jpg").is_pro());
        assert!(!PuzzleId::new("_pro_animals", "kitty.jpg").is_pro());
    }

    #[test]
    fn puzzle_id_parse_rejects_traversal() {
        let id: PuzzleId = "animals/_pro_cat.jpg".parse().unwrap();
        assert_eq!(id, PuzzleId::new("animals", "_pro_cat.jpg"));
        assert_eq!(id.to_string(), "animals/_pro_cat.jpg");

        assert!("animals".parse::<PuzzleId>().is_err());
        assert!("../secrets".parse::<PuzzleId>().is_err());
        assert!("animals/../../etc".parse::<PuzzleId>().is_err());
        assert!("/cat.jpg".parse::<PuzzleId>().is_err());
    }

    #[test]
    fn puzzle_id_serializes_as_string() {
        let id = PuzzleId::new("nature", "river.jpg");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"nature/river.jpg\"");

        let back: PuzzleId = serde_json::from_str("\"nature/river.jpg\"").unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn image_detection() {
        assert!(is_image_file("cat.JPG"));
        assert!(is_image_file("cat.webp"));
        assert!(!is_image_file("notes.txt"));
        assert!(!is_image_file("README"));
    }
}
