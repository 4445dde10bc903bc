// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Page slicing for listings and the page-number window shown by the pager.

use serde::Serialize;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

pub const DEFAULT_PER_PAGE: u32 = 24;
pub const MAX_PER_PAGE: u32 = 100;
/// Pages shown on each side of the current one in the pager.
pub const PAGER_RADIUS: u32 = 2;

/// One page of results.
#[derive(Debug, Clone, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: u32,
    pub per_page: u32,
    pub total_items: u32,
    pub total_pages: u32,
}

/// Slice `items` into the requested page.
///
/// `page` is 1-based and clamped to the valid range, so an out-of-range page
/// returns the last page rather than nothing. An empty input has one (empty)
/// page.
pub fn paginate<T: Clone>(items: &[T], page: u32, per_page: u32) -> Page<T> {
    let per_page = per_page.clamp(1, MAX_PER_PAGE);
    let total_items = items.len() as u32;
    let total_pages = total_items.div_ceil(per_page).max(1);
    let page = page.clamp(1, total_pages);

    let start = ((page - 1) * per_page) as usize;
    let end = (start + per_page as usize).min(items.len());

    Page {
        items: items.get(start..end).unwrap_or_default().to_vec(),
        page,
        per_page,
        total_items,
        total_pages,
    }
}

/// An entry in the pager: a page number or a gap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum PageLink {
    Page(u32),
    #[serde(serialize_with = "serialize_gap")]
    Gap,
}

fn serialize_gap<S: serde::Serializer>(serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str("...")
}

/// Page numbers to show around `current`: always the first and last page,
/// `radius` pages on each side of the current one, and gaps in between.
pub fn page_window(current: u32, total_pages: u32, radius: u32) -> Vec<PageLink> {
    if total_pages == 0 {
        return Vec::new();
    }
    let current = current.clamp(1, total_pages);
    let lo = current.saturating_sub(radius).max(1);
    let hi = (current + radius).min(total_pages);

    let mut links = Vec::new();
    if lo > 1 {
        links.push(PageLink::Page(1));
        if lo > 2 {
            links.push(PageLink::Gap);
        }
    }
    links.extend((lo..=hi).map(PageLink::Page));
    if hi < total_pages {
        if hi < total_pages - 1 {
            links.push(PageLink::Gap);
        }
        links.push(PageLink::Page(total_pages));
    }
    links
}
