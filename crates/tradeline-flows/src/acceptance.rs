//! Role checks an authorizer applies after the contract rules pass.
//!
//! The contract rules say whether a transition is *valid*; these checks say
//! whether this particular party is *willing* to sign it. A seller wants to
//! be paid at least the down payment and a buyer pays exactly the balance
//! due. A party's own balance is only ever spent if it offered that very
//! record, to settle an order, with the seller as the only other payee and
//! any change coming back.

use tradeline_types::{Command, LiveRecord, OrderStatus, PartyId, Transition};

/// Why this party refuses to sign. Sent back as a rejection reason.
pub type Refusal = String;

/// Decide whether `me` accepts `tx`, having offered `offered` (if anything)
/// during negotiation.
///
/// # Errors
/// A human-readable refusal.
pub fn check_acceptance(
    me: PartyId,
    tx: &Transition,
    offered: Option<&LiveRecord>,
) -> Result<(), Refusal> {
    if !tx.required_authorizers().contains(&me) {
        return Err("not a required authorizer of this transition".to_string());
    }

    if let Some(offered) = offered.filter(|o| !tx.consumed().contains(o)) {
        return Err(format!(
            "offered record {} is not the one consumed",
            offered.reference
        ));
    }

    let spends_ours = check_own_spend(me, tx, offered)?;

    let touches_orders = tx
        .consumed()
        .iter()
        .map(|l| &l.record)
        .chain(tx.produced())
        .any(|r| r.as_order().is_some());
    if !touches_orders {
        return if spends_ours {
            Err("spends our balance outside an order settlement".to_string())
        } else {
            Ok(())
        };
    }

    let orders: Vec<_> = tx.produced().iter().filter_map(|r| r.as_order()).collect();
    let [order] = orders.as_slice() else {
        return Err(format!("expected exactly one output order, found {}", orders.len()));
    };

    let stranger = tx
        .produced()
        .iter()
        .filter_map(|r| r.as_balance())
        .map(|b| b.owner)
        .find(|owner| *owner != me && *owner != order.seller)
        .filter(|_| spends_ours);
    if let Some(stranger) = stranger {
        return Err(format!("pays {stranger} from our balance, who is not the seller"));
    }

    let paid_to_seller: i64 = tx
        .produced()
        .iter()
        .filter_map(|r| r.as_balance())
        .filter(|b| b.owner == order.seller)
        .fold(0i64, |acc, b| acc.saturating_add(b.amount));

    for intent in tx.intents() {
        match intent.command {
            Command::OrderPlacing { .. } if me == order.seller => {
                let down = order
                    .down_payment()
                    .ok_or_else(|| "down payment out of range".to_string())?;
                if paid_to_seller < down {
                    return Err(format!(
                        "seller receives {paid_to_seller}, down payment is {down}"
                    ));
                }
            }
            Command::OrderDelivered { .. } if me == order.buyer => {
                if order.status != OrderStatus::Delivered {
                    return Err(format!("output order is {}, not DELIVERED", order.status));
                }
                let due = order
                    .balance_due()
                    .ok_or_else(|| "balance due out of range".to_string())?;
                if paid_to_seller != due {
                    return Err(format!(
                        "seller receives {paid_to_seller}, balance due is {due}"
                    ));
                }
            }
            _ => {}
        }
    }

    Ok(())
}

/// Our balances may be consumed only if we offered them, and any declared
/// change must come back to us. Returns whether `tx` spends one of ours.
fn check_own_spend(
    me: PartyId,
    tx: &Transition,
    offered: Option<&LiveRecord>,
) -> Result<bool, Refusal> {
    let mut spends_ours = false;
    for live in tx.consumed() {
        if !live.record.as_balance().is_some_and(|b| b.owner == me) {
            continue;
        }
        if offered != Some(live) {
            return Err(format!(
                "consumes our balance {} that we did not offer",
                live.reference
            ));
        }
        spends_ours = true;
    }

    let stray_change = tx
        .intents()
        .iter()
        .filter_map(|i| i.command.change_owner())
        .find(|owner| *owner != me);
    match stray_change {
        Some(owner) if spends_ours => Err(format!(
            "change from our balance goes to {owner}, not back to us"
        )),
        _ => Ok(spends_ours),
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;
    use tradeline_types::{
        BalanceRecord, Intent, NotaryId, OrderId, OrderRecord, TransitionBuilder,
    };

    use super::*;

    const ISSUER: PartyId = PartyId([1; 32]);
    const BUYER: PartyId = PartyId([2; 32]);
    const SELLER: PartyId = PartyId([3; 32]);

    fn order() -> OrderRecord {
        OrderRecord::new_placed(
            OrderId::new("ord-1"),
            "widgets",
            BUYER,
            SELLER,
            Decimal::ONE_HUNDRED,
            Decimal::new(1, 1),
        )
    }

    fn placing(paid: i64) -> Transition {
        let mut b = TransitionBuilder::new(NotaryId([0; 32]));
        b.add_consumed(LiveRecord::dummy_balance(ISSUER, BUYER, 100))
            .add_produced(order())
            .add_produced(BalanceRecord::new(ISSUER, SELLER, paid))
            .add_produced(BalanceRecord::new(ISSUER, BUYER, 100 - paid))
            .add_intent(Intent::new(
                Command::OrderPlacing {
                    change_owner: Some(BUYER),
                },
                [ISSUER, BUYER, SELLER],
            ));
        b.build()
    }

    fn delivering(offered: &LiveRecord, paid: i64) -> Transition {
        delivering_with_change(offered, paid, None)
    }

    /// Delivery paying `paid` to the seller, with whatever else the offered
    /// balance holds going to `change` (if given).
    fn delivering_with_change(
        offered: &LiveRecord,
        paid: i64,
        change: Option<PartyId>,
    ) -> Transition {
        let placed = order();
        let held = offered.record.as_balance().map_or(0, |b| b.amount);
        let mut b = TransitionBuilder::new(NotaryId([0; 32]));
        b.add_consumed(LiveRecord::dummy(placed.clone().into()))
            .add_consumed(offered.clone())
            .add_produced(placed.delivered())
            .add_produced(BalanceRecord::new(ISSUER, SELLER, paid));
        if let Some(owner) = change {
            b.add_produced(BalanceRecord::new(ISSUER, owner, held - paid));
        }
        b.add_intent(Intent::new(
            Command::OrderDelivered {
                change_owner: change,
            },
            [ISSUER, BUYER, SELLER],
        ));
        b.build()
    }

    #[test]
    fn seller_accepts_full_down_payment() {
        assert!(check_acceptance(SELLER, &placing(10), None).is_ok());
    }

    #[test]
    fn seller_refuses_short_down_payment() {
        let refusal = check_acceptance(SELLER, &placing(9), None).unwrap_err();
        assert!(refusal.contains("down payment"), "{refusal}");
    }

    #[test]
    fn buyer_refuses_overpaying_on_delivery() {
        let offered = LiveRecord::dummy_balance(ISSUER, BUYER, 90);
        assert!(check_acceptance(BUYER, &delivering(&offered, 90), Some(&offered)).is_ok());
        let offered = LiveRecord::dummy_balance(ISSUER, BUYER, 95);
        let refusal =
            check_acceptance(BUYER, &delivering(&offered, 95), Some(&offered)).unwrap_err();
        assert!(refusal.contains("balance due"), "{refusal}");
    }

    #[test]
    fn offered_record_must_be_consumed() {
        let offered = LiveRecord::dummy_balance(ISSUER, BUYER, 90);
        let other = LiveRecord::dummy_balance(ISSUER, BUYER, 90);
        let tx = delivering(&other, 90);
        let refusal = check_acceptance(BUYER, &tx, Some(&offered)).unwrap_err();
        assert!(refusal.contains("not the one consumed"), "{refusal}");
    }

    #[test]
    fn buyer_accepts_delivery_with_change_back() {
        let offered = LiveRecord::dummy_balance(ISSUER, BUYER, 140);
        let tx = delivering_with_change(&offered, 90, Some(BUYER));
        assert!(check_acceptance(BUYER, &tx, Some(&offered)).is_ok());
    }

    #[test]
    fn buyer_refuses_change_routed_elsewhere() {
        let accomplice = PartyId([4; 32]);
        let offered = LiveRecord::dummy_balance(ISSUER, BUYER, 500);
        let tx = delivering_with_change(&offered, 90, Some(accomplice));
        let refusal = check_acceptance(BUYER, &tx, Some(&offered)).unwrap_err();
        assert!(refusal.contains("not back to us"), "{refusal}");
    }

    #[test]
    fn buyer_refuses_underpaying_seller() {
        let offered = LiveRecord::dummy_balance(ISSUER, BUYER, 140);
        let tx = delivering_with_change(&offered, 50, Some(BUYER));
        let refusal = check_acceptance(BUYER, &tx, Some(&offered)).unwrap_err();
        assert!(refusal.contains("balance due"), "{refusal}");
    }

    #[test]
    fn unoffered_balance_is_not_spent() {
        let mut b = TransitionBuilder::new(NotaryId([0; 32]));
        b.add_consumed(LiveRecord::dummy_balance(ISSUER, BUYER, 70))
            .add_produced(BalanceRecord::new(ISSUER, SELLER, 70))
            .add_intent(Intent::new(
                Command::Pay { change_owner: None },
                [ISSUER, BUYER, SELLER],
            ));
        let refusal = check_acceptance(BUYER, &b.build(), None).unwrap_err();
        assert!(refusal.contains("did not offer"), "{refusal}");
    }

    #[test]
    fn offered_balance_only_settles_orders() {
        let offered = LiveRecord::dummy_balance(ISSUER, BUYER, 70);
        let mut b = TransitionBuilder::new(NotaryId([0; 32]));
        b.add_consumed(offered.clone())
            .add_produced(BalanceRecord::new(ISSUER, SELLER, 70))
            .add_intent(Intent::new(
                Command::Pay { change_owner: None },
                [ISSUER, BUYER, SELLER],
            ));
        let refusal = check_acceptance(BUYER, &b.build(), Some(&offered)).unwrap_err();
        assert!(refusal.contains("outside an order"), "{refusal}");
    }

    #[test]
    fn payee_receives_payment_from_others() {
        let mut b = TransitionBuilder::new(NotaryId([0; 32]));
        b.add_consumed(LiveRecord::dummy_balance(ISSUER, BUYER, 70))
            .add_produced(BalanceRecord::new(ISSUER, SELLER, 70))
            .add_intent(Intent::new(
                Command::Pay { change_owner: None },
                [ISSUER, BUYER, SELLER],
            ));
        assert!(check_acceptance(SELLER, &b.build(), None).is_ok());
    }

    #[test]
    fn outsider_refuses() {
        let outsider = PartyId([9; 32]);
        assert!(check_acceptance(outsider, &placing(10), None).is_err());
    }
}
