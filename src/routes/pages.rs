// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Server-rendered pages: legal text, the play page, sitemap and robots.txt.
//!
//! Markup is built with `maud`, which escapes every interpolated value.

use crate::error::Result;
use crate::middleware::auth::session_cookie_value;
use crate::models::puzzle::display_name;
use crate::models::{Entitlements, Puzzle, PuzzleId};
use crate::pagination::{page_window, paginate, PageLink, DEFAULT_PER_PAGE, PAGER_RADIUS};
use crate::services::entitlements::get_authenticated_user;
use crate::AppState;
use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse, Redirect, Response},
    routing::get,
    Router,
};
use axum_extra::extract::cookie::CookieJar;
use maud::{html, Markup, PreEscaped, DOCTYPE};
use serde::Deserialize;
use std::sync::Arc;

pub const SITE_NAME: &str = "Playzzle";

/// Where an anonymous visitor is sent for a pro puzzle.
pub const LOGIN_FOR_MEMBERSHIP: &str = "/login?from=/membership";
/// Where a signed-in visitor without access is sent.
pub const MEMBERSHIP_PATH: &str = "/membership";

pub fn routes() -> Router<Arc<AppState>> {
    let mut router = Router::new()
        .route("/puzzles", get(puzzles_index))
        .route("/category/{name}", get(category_page))
        .route("/play/{category}/{filename}", get(play_page))
        .route("/sitemap.xml", get(sitemap))
        .route("/robots.txt", get(robots));

    for page in LEGAL_PAGES {
        router = router.route(page.path, get(move || async move { legal_page(page) }));
    }
    router
}

// ─── Legal Pages ─────────────────────────────────────────────

pub struct LegalPage {
    pub path: &'static str,
    pub title: &'static str,
    pub paragraphs: &'static [&'static str],
}

pub const LEGAL_PAGES: &[LegalPage] = &[
    LegalPage {
        path: "/privacy-policy",
        title: "Privacy Policy",
        paragraphs: &[
            "We collect your name, email address and profile picture from your sign-in provider to create your account.",
            "Payments are processed by Razorpay. We store the order and payment identifiers, never your card or bank details.",
            "Puzzle progress and best times are kept in your browser's local storage and are not sent to our servers.",
            "You can ask us to delete your account and associated data at any time through the contact page.",
        ],
    },
    LegalPage {
        path: "/terms-and-conditions",
        title: "Terms and Conditions",
        paragraphs: &[
            "By using this site you agree to these terms. Puzzle images are licensed for personal play only.",
            "Pro membership grants access to all pro puzzles for the purchased period. Single-puzzle purchases unlock one pro puzzle permanently.",
            "Accounts found abusing the service may be suspended without notice.",
        ],
    },
    LegalPage {
        path: "/refund-policy",
        title: "Refund Policy",
        paragraphs: &[
            "Digital purchases are delivered immediately and are generally non-refundable.",
            "If a payment was captured but access was not granted, contact us within 7 days and we will either grant access or refund the payment in full.",
            "Approved refunds are returned to the original payment method within 5-7 business days.",
        ],
    },
    LegalPage {
        path: "/shipping-policy",
        title: "Shipping Policy",
        paragraphs: &[
            "All products are digital. Nothing is shipped.",
            "Access is granted to your account as soon as the payment is confirmed.",
        ],
    },
    LegalPage {
        path: "/contact-us",
        title: "Contact Us",
        paragraphs: &[
            "For help with your account, payments or refunds, reach us through the support form in your account page.",
            "We reply to most requests within two business days.",
        ],
    },
];

fn legal_page(page: &LegalPage) -> Html<String> {
    layout(
        page.title,
        html! {
            @for paragraph in page.paragraphs {
                p { (paragraph) }
            }
        },
    )
}

// ─── Listings ────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
pub struct ListingParams {
    #[serde(default)]
    pub q: Option<String>,
    #[serde(default)]
    pub page: Option<u32>,
}

async fn puzzles_index(State(state): State<Arc<AppState>>) -> Html<String> {
    layout(
        "Puzzles",
        html! {
            ul.categories {
                @for category in state.catalog.categories() {
                    li { a href=(format!("/category/{}", urlencoding::encode(category))) { (category) } }
                }
            }
        },
    )
}

async fn category_page(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
    Query(params): Query<ListingParams>,
) -> Response {
    if !state.catalog.categories().any(|c| c == name) {
        return not_found_page();
    }

    let query = params.q.as_deref().unwrap_or_default();
    let matches = state.catalog.search(Some(&name), query);
    let page = paginate(&matches, params.page.unwrap_or(1), DEFAULT_PER_PAGE);
    let mode = state.config.puzzle_name_display;
    let base = format!("/category/{}", urlencoding::encode(&name));

    let body = html! {
        form method="get" action=(base) {
            input type="search" name="q" value=(query) placeholder="Search puzzles";
        }
        ul.puzzles {
            @for puzzle in &page.items {
                @let label = display_name(&puzzle.id.filename, mode).unwrap_or_default();
                li {
                    a href=(puzzle.play_path()) {
                        img src=(puzzle.image_path()) alt=(label) loading="lazy";
                        (label)
                        @if puzzle.is_pro() {
                            span.badge { "Pro" }
                        }
                    }
                }
            }
        }
        (render_pager(&base, query, page.page, page.total_pages))
    };

    layout(&name, body).into_response()
}

fn render_pager(base: &str, query: &str, current: u32, total_pages: u32) -> Markup {
    if total_pages <= 1 {
        return html! {};
    }
    html! {
        nav.pager {
            @for link in page_window(current, total_pages, PAGER_RADIUS) {
                @match link {
                    PageLink::Page(n) if n == current => {
                        span aria-current="page" { (n) }
                    },
                    PageLink::Page(n) => {
                        a href=(format!("{base}?q={}&page={n}", urlencoding::encode(query))) { (n) }
                    }
                    PageLink::Gap => {
                        span { (PreEscaped("&hellip;")) }
                    },
                }
            }
        }
    }
}

// ─── Play Page ───────────────────────────────────────────────

/// Outcome of the play-page access gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayAccess {
    Allowed,
    Redirect(&'static str),
}

/// Decide whether `user` may play `puzzle`.
pub fn play_access(puzzle: &PuzzleId, user: Option<&Entitlements>) -> PlayAccess {
    if !puzzle.is_pro() {
        return PlayAccess::Allowed;
    }
    let Some(user) = user else {
        return PlayAccess::Redirect(LOGIN_FOR_MEMBERSHIP);
    };
    if user.is_superadmin() || user.is_pro || user.has_unlocked(puzzle) {
        PlayAccess::Allowed
    } else {
        PlayAccess::Redirect(MEMBERSHIP_PATH)
    }
}

/// Puzzle variants the play page can switch between.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlayMode {
    #[default]
    Jigsaw,
    Slide,
    Move,
}

impl PlayMode {
    const ALL: [PlayMode; 3] = [PlayMode::Jigsaw, PlayMode::Slide, PlayMode::Move];

    fn as_str(self) -> &'static str {
        match self {
            PlayMode::Jigsaw => "jigsaw",
            PlayMode::Slide => "slide",
            PlayMode::Move => "move",
        }
    }

    fn label(self) -> &'static str {
        match self {
            PlayMode::Jigsaw => "Jigsaw",
            PlayMode::Slide => "Slide",
            PlayMode::Move => "Move",
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct PlayParams {
    #[serde(default)]
    pub mode: Option<PlayMode>,
}

async fn play_page(
    State(state): State<Arc<AppState>>,
    Path((category, filename)): Path<(String, String)>,
    Query(params): Query<PlayParams>,
    jar: CookieJar,
) -> Result<Response> {
    let Some(puzzle) = format!("{category}/{filename}")
        .parse::<PuzzleId>()
        .ok()
        .and_then(|id| state.catalog.get(&id))
    else {
        return Ok(not_found_page());
    };

    // Free puzzles never need the entitlement lookups
    let user = if puzzle.is_pro() {
        get_authenticated_user(&state.auth, &state.db, session_cookie_value(&jar)).await?
    } else {
        None
    };

    match play_access(&puzzle.id, user.as_ref()) {
        PlayAccess::Allowed => {
            let mode = params.mode.unwrap_or_default();
            Ok(render_play_page(puzzle, &state, mode).into_response())
        }
        PlayAccess::Redirect(to) => {
            tracing::debug!(puzzle = %puzzle.id, to, "Play gate redirect");
            Ok(Redirect::temporary(to).into_response())
        }
    }
}

fn render_play_page(puzzle: &Puzzle, state: &AppState, mode: PlayMode) -> Html<String> {
    let name = display_name(&puzzle.id.filename, state.config.puzzle_name_display);
    let title = name.as_deref().unwrap_or("Puzzle");
    let play_path = puzzle.play_path();
    let image_path = puzzle.image_path();

    layout(
        title,
        html! {
            nav.modes {
                @for option in PlayMode::ALL {
                    a href={ (play_path) "?mode=" (option.as_str()) }
                        aria-current=[(option == mode).then_some("page")] {
                        (option.label())
                    }
                }
            }
            div id="board" data-mode=(mode.as_str()) data-puzzle-id=(puzzle.id.to_string()) data-image=(image_path) {
                img src=(image_path) alt=(title);
            }
            script src="/js/play.js" defer {}
        },
    )
}

fn not_found_page() -> Response {
    (
        StatusCode::NOT_FOUND,
        layout("Puzzle not found", html! { p { "This puzzle does not exist." } }),
    )
        .into_response()
}

// ─── Sitemap & Robots ────────────────────────────────────────

const SITEMAP_STATIC_PATHS: &[&str] = &["/", "/puzzles", "/membership", "/login", "/signup"];

async fn sitemap(State(state): State<Arc<AppState>>) -> Response {
    let base = state.config.site_url.trim_end_matches('/');

    let mut urls: Vec<String> = SITEMAP_STATIC_PATHS
        .iter()
        .copied()
        .chain(LEGAL_PAGES.iter().map(|p| p.path))
        .map(|path| format!("{base}{path}"))
        .collect();
    urls.extend(
        state
            .catalog
            .categories()
            .map(|c| format!("{base}/category/{}", urlencoding::encode(c))),
    );
    urls.extend(state.catalog.all().map(|p| format!("{base}{}", p.play_path())));

    let xml = html! {
        (PreEscaped(r#"<?xml version="1.0" encoding="UTF-8"?>"#))
        urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9" {
            @for url in &urls {
                url { loc { (url) } }
            }
        }
    };

    ([(header::CONTENT_TYPE, "application/xml")], xml.into_string()).into_response()
}

async fn robots(State(state): State<Arc<AppState>>) -> Response {
    let base = state.config.site_url.trim_end_matches('/');
    let body = format!(
        "User-agent: *\n\
         Allow: /\n\
         Disallow: /api/\n\
         Disallow: /account\n\
         Disallow: /dashboard\n\
         Disallow: /super-admin\n\
         \n\
         Sitemap: {base}/sitemap.xml\n"
    );
    ([(header::CONTENT_TYPE, "text/plain; charset=utf-8")], body).into_response()
}

/// Shared page shell around `body`.
fn layout(title: &str, body: Markup) -> Html<String> {
    let page = html! {
        (DOCTYPE)
        html lang="en" {
            head {
                meta charset="utf-8";
                meta name="viewport" content="width=device-width, initial-scale=1";
                title { (title) " | " (SITE_NAME) }
                link rel="stylesheet" href="/css/site.css";
            }
            body {
                header { a href="/" { (SITE_NAME) } }
                main {
                    h1 { (title) }
                    (body)
                }
            }
        }
    };
    Html(page.into_string())
}
