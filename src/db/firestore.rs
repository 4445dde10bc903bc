// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firestore client wrapper with typed operations.
//!
//! Provides high-level operations for:
//! - Users (profile and membership)
//! - Unlocked puzzles
//! - Transactions (payments and puzzle credits)
//! - Wishlists

use crate::db::collections;
use crate::error::AppError;
use crate::models::transaction::{PLAN_SINGLE_PUZZLE, STATUS_SUCCESS};
use crate::models::{Membership, PuzzleId, Transaction, UnlockedPuzzles, UserProfile, Wishlist};
use chrono::{Duration, Utc};
use firestore::errors::{BackoffError, FirestoreError};
use firestore::FirestoreWritePrecondition;
use serde::Deserialize;

/// Result of spending a credit on a puzzle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnlockOutcome {
    /// A credit was consumed; carries the transaction ID that paid for it.
    Unlocked { transaction_id: String },
    /// The puzzle was already unlocked; nothing was spent.
    AlreadyUnlocked,
    /// The user has no unused credits.
    NoCredits,
}

/// What a verified payment should change besides the transaction record.
#[derive(Debug, Clone, Default)]
pub struct PaymentEffects {
    /// Puzzle to unlock immediately with this payment.
    pub unlock: Option<PuzzleId>,
    /// Membership time bought with this payment.
    pub membership: Option<MembershipPurchase>,
}

/// Membership time to add on top of whatever the user already has.
#[derive(Debug, Clone)]
pub struct MembershipPurchase {
    pub plan_id: String,
    pub duration: Duration,
}

/// Aborted or contended reads are retried with the whole transaction.
fn retryable(err: FirestoreError) -> BackoffError<FirestoreError> {
    match err {
        FirestoreError::DatabaseError(ref db_err) if db_err.retry_possible => {
            BackoffError::transient(err)
        }
        other => BackoffError::permanent(other),
    }
}

async fn read_doc<T>(
    client: &firestore::FirestoreDb,
    collection: &str,
    id: &str,
) -> Result<Option<T>, FirestoreError>
where
    for<'de> T: Deserialize<'de> + Send,
{
    client
        .fluent()
        .select()
        .by_id_in(collection)
        .obj()
        .one(id)
        .await
}

/// Unused single-puzzle credits for a user, oldest first.
async fn query_available_credits(
    client: &firestore::FirestoreDb,
    uid: &str,
) -> Result<Vec<Transaction>, FirestoreError> {
    let uid = uid.to_string();
    let mut credits: Vec<Transaction> = client
        .fluent()
        .select()
        .from(collections::TRANSACTIONS)
        .filter(move |q| {
            q.for_all([
                q.field("userId").eq(uid.clone()),
                q.field("status").eq(STATUS_SUCCESS),
                q.field("planId").eq(PLAN_SINGLE_PUZZLE),
                q.field("creditUsed").eq(false),
            ])
        })
        .obj()
        .query()
        .await?;

    credits.sort_by(|a, b| a.created_at.cmp(&b.created_at));
    Ok(credits)
}

/// Firestore database client.
#[derive(Clone)]
pub struct FirestoreDb {
    client: Option<firestore::FirestoreDb>,
}

impl FirestoreDb {
    /// Create a new Firestore client.
    ///
    /// For local development with emulator, set FIRESTORE_EMULATOR_HOST.
    pub async fn new(project_id: &str) -> Result<Self, AppError> {
        // The emulator needs an unauthenticated connection
        if std::env::var("FIRESTORE_EMULATOR_HOST").is_ok() {
            return Self::create_emulator_client(project_id).await;
        }

        let client = firestore::FirestoreDb::new(project_id)
            .await
            .map_err(|e| AppError::Database(format!("Failed to connect to Firestore: {}", e)))?;

        tracing::info!(project = project_id, "Connected to Firestore");

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a Firestore client for the emulator with unauthenticated access.
    async fn create_emulator_client(project_id: &str) -> Result<Self, AppError> {
        tracing::info!("Using unauthenticated connection for Firestore Emulator");

        let token_source = gcloud_sdk::ExternalJwtFunctionSource::new(|| async {
            Ok(gcloud_sdk::Token {
                token_type: "Bearer".to_string(),
                token: gcloud_sdk::SecretValue::new(
                    "eyJhbGciOiJub25lIn0.eyJ1aWQiOiJ0ZXN0In0."
                        .to_string()
                        .into(),
                ),
                expiry: chrono::Utc::now() + chrono::Duration::hours(1),
            })
        });

        let options = firestore::FirestoreDbOptions::new(project_id.to_string());

        let client = firestore::FirestoreDb::with_options_token_source(
            options,
            gcloud_sdk::GCP_DEFAULT_SCOPES.clone(),
            gcloud_sdk::TokenSourceType::ExternalSource(Box::new(token_source)),
        )
        .await
        .map_err(|e| {
            AppError::Database(format!("Failed to connect to Firestore Emulator: {}", e))
        })?;

        tracing::info!(
            project = project_id,
            "Connected to Firestore (Emulator/Unauthenticated)"
        );

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a mock Firestore client for testing (offline mode).
    ///
    /// All database operations will return an error if called.
    pub fn new_mock() -> Self {
        Self { client: None }
    }

    /// Helper to get the client or return an error if offline.
    fn get_client(&self) -> Result<&firestore::FirestoreDb, AppError> {
        self.client
            .as_ref()
            .ok_or_else(|| AppError::Database("Database not connected (offline mode)".to_string()))
    }

    // ─── User Operations ─────────────────────────────────────────

    /// Get a user's profile document.
    pub async fn get_user_profile(&self, uid: &str) -> Result<Option<UserProfile>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::USERS)
            .obj()
            .one(uid)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Create or update a user's profile document.
    pub async fn upsert_user_profile(
        &self,
        uid: &str,
        profile: &UserProfile,
    ) -> Result<(), AppError> {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::USERS)
            .document_id(uid)
            .object(profile)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    // ─── Unlocked Puzzle Operations ──────────────────────────────

    /// Get the puzzles a user has unlocked individually.
    pub async fn get_unlocked_puzzles(
        &self,
        uid: &str,
    ) -> Result<Option<UnlockedPuzzles>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::UNLOCKED_PUZZLES)
            .obj()
            .one(uid)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    // ─── Transaction Operations ──────────────────────────────────

    /// Unused single-puzzle credits for a user, oldest first.
    pub async fn get_available_credits(&self, uid: &str) -> Result<Vec<Transaction>, AppError> {
        query_available_credits(self.get_client()?, uid)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Get a transaction by payment ID.
    pub async fn get_transaction(&self, payment_id: &str) -> Result<Option<Transaction>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::TRANSACTIONS)
            .obj()
            .one(payment_id)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Record a verified payment and apply what it grants.
    ///
    /// The transaction document is keyed by payment ID and created with a
    /// must-not-exist precondition, so replaying the same payment is a
    /// no-op. Returns `false` for such duplicates. Everything read here is
    /// read inside the Firestore transaction that writes it.
    pub async fn record_payment(
        &self,
        payment_id: &str,
        transaction: &Transaction,
        effects: PaymentEffects,
    ) -> Result<bool, AppError> {
        let client = self.get_client()?;
        let uid = transaction.user_id.as_str();

        let recorded = client
            .run_transaction::<bool, _, FirestoreError>(|db, db_transaction| {
                let payment_id = payment_id.to_string();
                let record = transaction.clone();
                let effects = effects.clone();

                Box::pin(async move {
                    let existing: Option<Transaction> =
                        read_doc(&db, collections::TRANSACTIONS, &payment_id)
                            .await
                            .map_err(retryable)?;
                    if existing.is_some() {
                        return Ok(false);
                    }

                    let uid = record.user_id.as_str();
                    let unlocked = match &effects.unlock {
                        Some(puzzle) => {
                            let mut unlocked: UnlockedPuzzles =
                                read_doc(&db, collections::UNLOCKED_PUZZLES, uid)
                                    .await
                                    .map_err(retryable)?
                                    .unwrap_or_default();
                            unlocked.insert(puzzle);
                            Some(unlocked)
                        }
                        None => None,
                    };
                    let profile = match &effects.membership {
                        Some(purchase) => {
                            let mut profile: UserProfile =
                                read_doc(&db, collections::USERS, uid)
                                    .await
                                    .map_err(retryable)?
                                    .unwrap_or_default();
                            profile.membership = Some(Membership::extended(
                                profile.membership.as_ref(),
                                &purchase.plan_id,
                                purchase.duration,
                                Utc::now(),
                            ));
                            Some(profile)
                        }
                        None => None,
                    };

                    db.fluent()
                        .update()
                        .in_col(collections::TRANSACTIONS)
                        .precondition(FirestoreWritePrecondition::Exists(false))
                        .document_id(&payment_id)
                        .object(&record)
                        .add_to_transaction(db_transaction)?;

                    if let Some(unlocked) = &unlocked {
                        db.fluent()
                            .update()
                            .in_col(collections::UNLOCKED_PUZZLES)
                            .document_id(uid)
                            .object(unlocked)
                            .add_to_transaction(db_transaction)?;
                    }

                    if let Some(profile) = &profile {
                        db.fluent()
                            .update()
                            .in_col(collections::USERS)
                            .document_id(uid)
                            .object(profile)
                            .add_to_transaction(db_transaction)?;
                    }

                    Ok(true)
                })
            })
            .await
            .map_err(|e| AppError::Database(format!("Payment transaction failed: {}", e)))?;

        if recorded {
            tracing::info!(
                uid,
                payment_id,
                plan_id = %transaction.plan_id,
                unlocked = effects.unlock.is_some(),
                membership = effects.membership.is_some(),
                "Payment recorded"
            );
        } else {
            tracing::info!(payment_id, "Payment already recorded (idempotent skip)");
        }

        Ok(recorded)
    }

    /// Spend one unused credit to unlock a puzzle.
    ///
    /// The unlock document and the user's credits are read inside the same
    /// Firestore transaction that marks the credit used and writes the
    /// unlock. Concurrent unlocks contend on those reads, and the loser is
    /// retried against the winner's writes.
    pub async fn consume_credit_atomic(
        &self,
        uid: &str,
        puzzle: &PuzzleId,
    ) -> Result<UnlockOutcome, AppError> {
        let client = self.get_client()?;

        let outcome = client
            .run_transaction::<UnlockOutcome, _, FirestoreError>(|db, db_transaction| {
                let uid = uid.to_string();
                let puzzle = puzzle.clone();

                Box::pin(async move {
                    let mut unlocked: UnlockedPuzzles =
                        read_doc(&db, collections::UNLOCKED_PUZZLES, &uid)
                            .await
                            .map_err(retryable)?
                            .unwrap_or_default();
                    if unlocked.contains(&puzzle) {
                        return Ok(UnlockOutcome::AlreadyUnlocked);
                    }

                    let credits = query_available_credits(&db, &uid)
                        .await
                        .map_err(retryable)?;
                    let Some(mut credit) = credits
                        .into_iter()
                        .find(|tx| tx.is_available_credit() && tx.id.is_some())
                    else {
                        return Ok(UnlockOutcome::NoCredits);
                    };
                    let transaction_id = credit.id.clone().unwrap_or_default();

                    credit.credit_used = true;
                    credit.puzzle_id = Some(puzzle.to_string());
                    unlocked.insert(&puzzle);

                    db.fluent()
                        .update()
                        .in_col(collections::TRANSACTIONS)
                        .precondition(FirestoreWritePrecondition::Exists(true))
                        .document_id(&transaction_id)
                        .object(&credit)
                        .add_to_transaction(db_transaction)?;

                    db.fluent()
                        .update()
                        .in_col(collections::UNLOCKED_PUZZLES)
                        .document_id(&uid)
                        .object(&unlocked)
                        .add_to_transaction(db_transaction)?;

                    Ok(UnlockOutcome::Unlocked { transaction_id })
                })
            })
            .await
            .map_err(|e| AppError::Database(format!("Unlock transaction failed: {}", e)))?;

        if let UnlockOutcome::Unlocked { transaction_id } = &outcome {
            tracing::info!(uid, puzzle = %puzzle, transaction_id = %transaction_id, "Credit spent on puzzle");
        }

        Ok(outcome)
    }

    // ─── Wishlist Operations ─────────────────────────────────────

    /// Get a user's wishlist.
    pub async fn get_wishlist(&self, uid: &str) -> Result<Option<Wishlist>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::WISHLISTS)
            .obj()
            .one(uid)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Add or remove a puzzle from the wishlist and return the new list.
    pub async fn toggle_wishlist(&self, uid: &str, puzzle: &PuzzleId) -> Result<Wishlist, AppError> {
        // Fetch-modify-write; concurrent toggles by the same user are last-write-wins
        let mut wishlist = self.get_wishlist(uid).await?.unwrap_or_default();
        let added = wishlist.toggle(puzzle);

        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::WISHLISTS)
            .document_id(uid)
            .object(&wishlist)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        tracing::debug!(uid, puzzle = %puzzle, added, "Wishlist updated");
        Ok(wishlist)
    }
}
