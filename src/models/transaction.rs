// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Payment transactions and the plans they were bought for.

use chrono::Duration;
use serde::{Deserialize, Serialize};

pub const STATUS_SUCCESS: &str = "success";
pub const PLAN_SINGLE_PUZZLE: &str = "single_puzzle";

/// A completed payment, stored at `transactions/{payment_id}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    /// Firestore document ID, populated on reads.
    #[serde(alias = "_firestore_id", skip_serializing, default)]
    pub id: Option<String>,
    pub user_id: String,
    pub plan_id: String,
    pub status: String,
    #[serde(default)]
    pub credit_used: bool,
    #[serde(default)]
    pub order_id: Option<String>,
    #[serde(default)]
    pub payment_id: Option<String>,
    #[serde(default)]
    pub puzzle_id: Option<String>,
    /// Amount in the smallest currency unit (paise)
    #[serde(default)]
    pub amount: Option<u64>,
    #[serde(default)]
    pub created_at: Option<String>,
}

impl Transaction {
    /// A successful single-puzzle purchase that has not been spent yet.
    pub fn is_available_credit(&self) -> bool {
        self.status == STATUS_SUCCESS && self.plan_id == PLAN_SINGLE_PUZZLE && !self.credit_used
    }
}

/// List price of a plan in whole rupees. Unpriced plans cannot be bought.
pub fn plan_price_rupees(plan_id: &str) -> Option<u64> {
    match plan_id {
        PLAN_SINGLE_PUZZLE => Some(49),
        "pro_monthly" => Some(199),
        "pro_quarterly" => Some(499),
        "pro_yearly" => Some(1499),
        _ => None,
    }
}

/// What a plan ID grants once paid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanGrant {
    /// One puzzle credit.
    Credit,
    /// Pro membership for the given number of days.
    Membership { days: i64 },
    /// Unknown plan; the payment is recorded but grants nothing.
    Unknown,
}

impl PlanGrant {
    pub fn for_plan(plan_id: &str) -> Self {
        match plan_id {
            PLAN_SINGLE_PUZZLE => Self::Credit,
            "pro_monthly" => Self::Membership { days: 30 },
            "pro_quarterly" => Self::Membership { days: 90 },
            "pro_yearly" => Self::Membership { days: 365 },
            _ => Self::Unknown,
        }
    }

    pub fn membership_duration(&self) -> Option<Duration> {
        match self {
            Self::Membership { days } => Some(Duration::days(*days)),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tx(status: &str, plan: &str, used: bool) -> Transaction {
        Transaction {
            id: Some("pay_1".to_string()),
            user_id: "uid".to_string(),
            plan_id: plan.to_string(),
            status: status.to_string(),
            credit_used: used,
            order_id: None,
            payment_id: None,
            puzzle_id: None,
            amount: None,
            created_at: None,
        }
    }

    #[test]
    fn available_credit_needs_all_three_conditions() {
        assert!(tx("success", "single_puzzle", false).is_available_credit());
        assert!(!tx("success", "single_puzzle", true).is_available_credit());
        assert!(!tx("failed", "single_puzzle", false).is_available_credit());
        assert!(!tx("success", "pro_monthly", false).is_available_credit());
    }

    #[test]
    fn plan_grants() {
        assert_eq!(PlanGrant::for_plan("single_puzzle"), PlanGrant::Credit);
        assert_eq!(
            PlanGrant::for_plan("pro_yearly").membership_duration(),
            Some(Duration::days(365))
        );
        assert_eq!(PlanGrant::for_plan("lifetime_gold"), PlanGrant::Unknown);
    }

    #[test]
    fn every_granting_plan_has_a_price() {
        for plan in ["single_puzzle", "pro_monthly", "pro_quarterly", "pro_yearly"] {
            assert_ne!(PlanGrant::for_plan(plan), PlanGrant::Unknown, "{plan}");
            assert!(plan_price_rupees(plan).is_some(), "{plan}");
        }
        assert_eq!(plan_price_rupees("lifetime_gold"), None);
    }

    #[test]
    fn firestore_id_alias_is_read_not_written() {
        let json = serde_json::json!({
            "_firestore_id": "pay_abc",
            "userId": "u1",
            "planId": "single_puzzle",
            "status": "success",
            "creditUsed": false
        });
        let tx: Transaction = serde_json::from_value(json).unwrap();
        assert_eq!(tx.id.as_deref(), Some("pay_abc"));

        let out = serde_json::to_value(&tx).unwrap();
        assert!(out.get("id").is_none());
        assert!(out.get("_firestore_id").is_none());
        assert_eq!(out["planId"], "single_puzzle");
    }
}
