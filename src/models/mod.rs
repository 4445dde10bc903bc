// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Data models for the application.

pub mod entitlements;
pub mod puzzle;
pub mod transaction;
pub mod user;

pub use entitlements::{CustomClaims, Entitlements, SessionUser};
pub use puzzle::{Puzzle, PuzzleId, PuzzleNameDisplay, PuzzleSummary};
pub use transaction::{PlanGrant, Transaction};
pub use user::{Membership, UnlockedPuzzles, UserProfile, Wishlist};
