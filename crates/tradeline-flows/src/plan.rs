//! What a participant asks the orchestrator to settle, and what it gets back.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tradeline_types::{
    FinalityReceipt, LiveRecord, PartyId, SignedTransition, TxId, constants,
};

/// A settlement the calling participant proposes.
///
/// | Plan           | Proposer | Consumes                 | Authorizers              |
/// |----------------|----------|--------------------------|--------------------------|
/// | `Issue`        | issuer   | nothing                  | issuer, owner            |
/// | `Pay`          | payer    | own balance              | issuer, payer, recipient |
/// | `PlaceOrder`   | buyer    | own balance              | buyer, seller, issuer    |
/// | `DeliverOrder` | seller   | order + buyer's balance  | seller, buyer, issuer    |
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SettlementPlan {
    /// Mint `amount` units backed by the proposer to `owner`.
    Issue { owner: PartyId, amount: i64 },
    /// Transfer `amount` units to `recipient`, change back to the proposer.
    Pay { recipient: PartyId, amount: i64 },
    /// Place an order with `seller`, paying the down payment now.
    PlaceOrder {
        seller: PartyId,
        external_id: String,
        description: String,
        price: Decimal,
        down_payment_fraction: Decimal,
    },
    /// Deliver the proposer's placed order and collect the balance due.
    DeliverOrder { external_id: String },
}

impl SettlementPlan {
    /// A `PlaceOrder` plan with the default description.
    #[must_use]
    pub fn place_order(
        seller: PartyId,
        external_id: impl Into<String>,
        price: Decimal,
        down_payment_fraction: Decimal,
    ) -> Self {
        Self::PlaceOrder {
            seller,
            external_id: external_id.into(),
            description: constants::DEFAULT_ORDER_DESCRIPTION.to_string(),
            price,
            down_payment_fraction,
        }
    }

    #[must_use]
    pub fn deliver_order(external_id: impl Into<String>) -> Self {
        Self::DeliverOrder {
            external_id: external_id.into(),
        }
    }
}

impl std::fmt::Display for SettlementPlan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Issue { amount, .. } => write!(f, "ISSUE({amount})"),
            Self::Pay { amount, .. } => write!(f, "PAY({amount})"),
            Self::PlaceOrder { external_id, .. } => write!(f, "PLACE_ORDER({external_id})"),
            Self::DeliverOrder { external_id } => write!(f, "DELIVER_ORDER({external_id})"),
        }
    }
}

/// A committed settlement.
#[derive(Debug, Clone)]
pub struct SettlementOutcome {
    pub tx_id: TxId,
    pub transition: SignedTransition,
    pub receipt: FinalityReceipt,
}

impl SettlementOutcome {
    /// The records the settlement produced, with their references.
    #[must_use]
    pub fn outputs(&self) -> Vec<LiveRecord> {
        self.transition.transition.outputs()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn place_order_uses_default_description() {
        let plan = SettlementPlan::place_order(
            PartyId([3; 32]),
            "ord-1",
            Decimal::ONE_HUNDRED,
            Decimal::new(1, 1),
        );
        let SettlementPlan::PlaceOrder { description, .. } = &plan else {
            panic!("wrong variant");
        };
        assert_eq!(description, constants::DEFAULT_ORDER_DESCRIPTION);
        assert_eq!(plan.to_string(), "PLACE_ORDER(ord-1)");
    }

    #[test]
    fn plan_serde_roundtrip() {
        let plan = SettlementPlan::deliver_order("ord-9");
        let json = serde_json::to_string(&plan).unwrap();
        let back: SettlementPlan = serde_json::from_str(&json).unwrap();
        assert_eq!(plan, back);
    }
}
