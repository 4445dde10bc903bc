// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Puzzle catalog loaded from the public image directory.

use crate::models::puzzle::{is_image_file, is_safe_segment, Puzzle, PuzzleId};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// All puzzles, grouped by category.
#[derive(Default, Clone)]
pub struct CatalogService {
    categories: BTreeMap<String, Vec<Puzzle>>,
}

impl CatalogService {
    /// Scan `{dir}/{category}/{image}`.
    ///
    /// A missing directory yields an empty catalog so the API can still start
    /// without any images deployed.
    pub fn load_from_dir<P: AsRef<Path>>(dir: P) -> Result<Self, CatalogError> {
        let dir = dir.as_ref();
        if !dir.exists() {
            tracing::warn!(path = %dir.display(), "Puzzle directory not found, catalog is empty");
            return Ok(Self::default());
        }

        let mut ids = Vec::new();
        for category in fs::read_dir(dir).map_err(|e| CatalogError::Io(e.to_string()))? {
            let category = category.map_err(|e| CatalogError::Io(e.to_string()))?;
            if !category.path().is_dir() {
                continue;
            }
            let Some(category_name) = category.file_name().to_str().map(str::to_string) else {
                continue;
            };

            for file in
                fs::read_dir(category.path()).map_err(|e| CatalogError::Io(e.to_string()))?
            {
                let file = file.map_err(|e| CatalogError::Io(e.to_string()))?;
                if let Some(filename) = file.file_name().to_str() {
                    ids.push(PuzzleId::new(category_name.clone(), filename));
                }
            }
        }

        let catalog = Self::from_ids(ids);
        tracing::info!(
            categories = catalog.categories.len(),
            puzzles = catalog.len(),
            "Loaded puzzle catalog"
        );
        Ok(catalog)
    }

    /// Build a catalog from puzzle IDs, skipping anything that is not an image.
    pub fn from_ids(ids: impl IntoIterator<Item = PuzzleId>) -> Self {
        let mut categories: BTreeMap<String, Vec<Puzzle>> = BTreeMap::new();

        for id in ids {
            if !is_safe_segment(&id.category)
                || !is_safe_segment(&id.filename)
                || !is_image_file(&id.filename)
                || id.category.starts_with('.')
                || id.filename.starts_with('.')
            {
                continue;
            }
            categories
                .entry(id.category.clone())
                .or_default()
                .push(Puzzle::new(id));
        }

        for puzzles in categories.values_mut() {
            puzzles.sort_by(|a, b| a.id.filename.cmp(&b.id.filename));
            puzzles.dedup_by(|a, b| a.id == b.id);
        }

        Self { categories }
    }

    pub fn categories(&self) -> impl Iterator<Item = &str> {
        self.categories.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.categories.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }

    pub fn get(&self, id: &PuzzleId) -> Option<&Puzzle> {
        self.categories
            .get(&id.category)?
            .iter()
            .find(|p| p.id.filename == id.filename)
    }

    /// All puzzles, in category then filename order.
    pub fn all(&self) -> impl Iterator<Item = &Puzzle> {
        self.categories.values().flatten()
    }

    /// Case-insensitive search over names and categories, optionally within
    /// one category. An empty query matches everything.
    pub fn search(&self, category: Option<&str>, query: &str) -> Vec<&Puzzle> {
        let needle = query.trim().to_lowercase();

        let candidates: Box<dyn Iterator<Item = &Puzzle> + '_> = match category {
            Some(name) => match self.categories.get(name) {
                Some(puzzles) => Box::new(puzzles.iter()),
                None => return Vec::new(),
            },
            None => Box::new(self.all()),
        };

        candidates
            .filter(|p| needle.is_empty() || p.search_key.contains(&needle))
            .collect()
    }
}

/// Errors from catalog loading.
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("Failed to read puzzle directory: {0}")]
    Io(String),
}
