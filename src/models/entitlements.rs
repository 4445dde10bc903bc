// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Session identity and the entitlements derived from it.

use crate::models::puzzle::PuzzleId;
use crate::models::user::{UnlockedPuzzles, UserProfile, Wishlist};
use crate::models::Transaction;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// Claims minted by the identity provider itself. These never count as
/// custom claims even though they share the token's top level.
const RESERVED_CLAIMS: &[&str] = &[
    "iss",
    "aud",
    "sub",
    "exp",
    "iat",
    "nbf",
    "auth_time",
    "user_id",
    "uid",
    "email",
    "email_verified",
    "name",
    "picture",
    "phone_number",
    "firebase",
];

/// Custom claims attached to an account.
///
/// `superadmin` is the only claim the application interprets; anything else
/// is carried through untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct CustomClaims {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub superadmin: Option<bool>,
    #[serde(flatten)]
    #[cfg_attr(feature = "binding-generation", ts(skip))]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl CustomClaims {
    pub fn is_superadmin(&self) -> bool {
        self.superadmin == Some(true)
    }

    /// Drop provider-reserved keys picked up by a flattened decode.
    pub fn without_reserved(mut self) -> Self {
        self.extra
            .retain(|key, _| !RESERVED_CLAIMS.contains(&key.as_str()));
        self
    }
}

/// Identity established from a verified session cookie.
#[derive(Debug, Clone)]
pub struct SessionUser {
    pub uid: String,
    pub email: Option<String>,
    pub email_verified: bool,
    pub name: Option<String>,
    pub picture: Option<String>,
    pub claims: CustomClaims,
}

/// Everything the application knows about what a user may access.
#[derive(Debug, Clone, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "camelCase")]
pub struct Entitlements {
    pub uid: String,
    pub email: Option<String>,
    pub display_name: Option<String>,
    pub picture: Option<String>,
    pub claims: CustomClaims,
    pub is_pro: bool,
    pub pro_expires_at: Option<String>,
    pub unlocked_puzzles: Vec<String>,
    pub credits: u32,
    pub credit_transaction_ids: Vec<String>,
    pub wishlist: Vec<String>,
}

impl Entitlements {
    /// Combine the session identity with the four per-user lookups.
    pub fn from_parts(
        session: &SessionUser,
        profile: Option<UserProfile>,
        unlocked: Option<UnlockedPuzzles>,
        transactions: Vec<Transaction>,
        wishlist: Option<Wishlist>,
        now: DateTime<Utc>,
    ) -> Self {
        let profile = profile.unwrap_or_default();
        let membership = profile.membership.as_ref();

        let is_pro = session.claims.is_superadmin()
            || membership.is_some_and(|m| m.is_active_at(now));

        let credit_transaction_ids: Vec<String> = transactions
            .iter()
            .filter(|tx| tx.user_id == session.uid && tx.is_available_credit())
            .filter_map(|tx| tx.id.clone())
            .collect();

        Self {
            uid: session.uid.clone(),
            email: session.email.clone().or(profile.email),
            display_name: session.name.clone().or(profile.display_name),
            picture: session.picture.clone().or(profile.photo_url),
            claims: session.claims.clone(),
            is_pro,
            pro_expires_at: membership.map(|m| m.expires_at.clone()),
            unlocked_puzzles: unlocked.unwrap_or_default().puzzle_ids,
            credits: credit_transaction_ids.len() as u32,
            credit_transaction_ids,
            wishlist: wishlist.unwrap_or_default().items,
        }
    }

    pub fn is_superadmin(&self) -> bool {
        self.claims.is_superadmin()
    }

    pub fn has_unlocked(&self, id: &PuzzleId) -> bool {
        let id = id.to_string();
        self.unlocked_puzzles.iter().any(|p| *p == id)
    }

    /// Whether the user may play the puzzle without spending anything.
    pub fn can_access(&self, id: &PuzzleId) -> bool {
        !id.is_pro() || self.is_superadmin() || self.is_pro || self.has_unlocked(id)
    }
}
