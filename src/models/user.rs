//! User documents stored in Firestore.

use crate::models::puzzle::PuzzleId;
use crate::time_utils::{format_utc_rfc3339, parse_utc_rfc3339};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Membership status value that grants Pro access while unexpired.
pub const MEMBERSHIP_ACTIVE: &str = "active";

/// User profile stored at `users/{uid}`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub photo_url: Option<String>,
    #[serde(default)]
    pub membership: Option<Membership>,
}

/// Pro membership record.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Membership {
    pub status: String,
    #[serde(default)]
    pub plan_id: Option<String>,
    /// Expiry (RFC 3339)
    pub expires_at: String,
    #[serde(default)]
    pub updated_at: Option<String>,
}

impl Membership {
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        parse_utc_rfc3339(&self.expires_at)
    }

    /// Active status and an expiry strictly after `now`.
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        self.status == MEMBERSHIP_ACTIVE && self.expires_at().is_some_and(|exp| exp > now)
    }

    /// Membership after buying `duration` more on `plan_id`.
    ///
    /// Time is added to whichever is later: now, or the current expiry.
    pub fn extended(
        current: Option<&Membership>,
        plan_id: &str,
        duration: Duration,
        now: DateTime<Utc>,
    ) -> Membership {
        let base = current
            .and_then(Membership::expires_at)
            .filter(|expiry| *expiry > now)
            .unwrap_or(now);

        Membership {
            status: MEMBERSHIP_ACTIVE.to_string(),
            plan_id: Some(plan_id.to_string()),
            expires_at: format_utc_rfc3339(base + duration),
            updated_at: Some(format_utc_rfc3339(now)),
        }
    }
}

/// Puzzles a user has unlocked individually, stored at `unlocked_puzzles/{uid}`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnlockedPuzzles {
    #[serde(default)]
    pub puzzle_ids: Vec<String>,
}

impl UnlockedPuzzles {
    pub fn contains(&self, id: &PuzzleId) -> bool {
        let id = id.to_string();
        self.puzzle_ids.iter().any(|p| *p == id)
    }

    /// Add a puzzle; returns false if it was already present.
    pub fn insert(&mut self, id: &PuzzleId) -> bool {
        if self.contains(id) {
            return false;
        }
        self.puzzle_ids.push(id.to_string());
        true
    }
}

/// Wishlist stored at `wishlists/{uid}`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Wishlist {
    #[serde(default)]
    pub items: Vec<String>,
}

impl Wishlist {
    /// Add the puzzle if absent, remove it if present.
    /// Returns true if the puzzle is now on the wishlist.
    pub fn toggle(&mut self, id: &PuzzleId) -> bool {
        let id = id.to_string();
        if let Some(pos) = self.items.iter().position(|item| *item == id) {
            self.items.remove(pos);
            false
        } else {
            self.items.push(id);
            true
        }
    }
}
