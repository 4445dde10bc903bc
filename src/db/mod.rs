//! Database layer (Firestore).

pub mod firestore;

pub use firestore::FirestoreDb;

/// Collection names as constants.
pub mod collections {
    /// User profiles and membership (keyed by uid)
    pub const USERS: &str = "users";
    /// Individually unlocked puzzles (keyed by uid)
    pub const UNLOCKED_PUZZLES: &str = "unlocked_puzzles";
    /// Completed payments (keyed by payment ID)
    pub const TRANSACTIONS: &str = "transactions";
    /// Wishlists (keyed by uid)
    pub const WISHLISTS: &str = "wishlists";
}
