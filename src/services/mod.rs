// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - business logic layer.

pub mod catalog;
pub mod entitlements;
pub mod firebase_auth;
pub mod identity_toolkit;
pub mod razorpay;

pub use catalog::CatalogService;
pub use entitlements::get_authenticated_user;
pub use firebase_auth::{AuthError, FirebaseAuth};
pub use identity_toolkit::{IdentityError, IdentityToolkitClient};
pub use razorpay::{RazorpayClient, RazorpayError};
