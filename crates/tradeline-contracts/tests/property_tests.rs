use proptest::prelude::*;
use rust_decimal::Decimal;
use tradeline_contracts::validate;
use tradeline_types::{
    BalanceRecord, Command, Intent, LiveRecord, NotaryId, OrderId, OrderRecord, OrderStatus,
    PartyId, Transition, TransitionBuilder, ValidationError,
};

const ISSUER: PartyId = PartyId([1; 32]);
const BUYER: PartyId = PartyId([2; 32]);
const SELLER: PartyId = PartyId([3; 32]);

/// A positive consumed amount (1 to 1,000,000).
fn arb_amount() -> impl Strategy<Value = i64> {
    1i64..1_000_000i64
}

/// Any output amount, including zero and negatives.
fn arb_output_amount() -> impl Strategy<Value = i64> {
    -1_000i64..1_001_000i64
}

fn arb_status() -> impl Strategy<Value = OrderStatus> {
    prop::sample::select(vec![OrderStatus::Placed, OrderStatus::Delivered])
}

fn split(input: i64, paid: i64, change: i64) -> Transition {
    let mut b = TransitionBuilder::new(NotaryId([0; 32]));
    b.add_consumed(LiveRecord::dummy_balance(ISSUER, BUYER, input))
        .add_produced(BalanceRecord::new(ISSUER, SELLER, paid))
        .add_produced(BalanceRecord::new(ISSUER, BUYER, change))
        .add_intent(Intent::new(
            Command::Pay {
                change_owner: Some(BUYER),
            },
            [ISSUER, BUYER, SELLER],
        ));
    b.build()
}

fn order(status: OrderStatus, external_id: &str) -> OrderRecord {
    OrderRecord {
        status,
        ..OrderRecord::new_placed(
            OrderId::new(external_id),
            "widgets",
            BUYER,
            SELLER,
            Decimal::new(100, 0),
            Decimal::new(1, 1),
        )
    }
}

fn delivery(consumed: OrderRecord, produced: OrderRecord) -> Transition {
    let mut b = TransitionBuilder::new(NotaryId([0; 32]));
    b.add_consumed(LiveRecord::dummy(consumed.into()))
        .add_consumed(LiveRecord::dummy_balance(ISSUER, BUYER, 90))
        .add_produced(produced)
        .add_produced(BalanceRecord::new(ISSUER, SELLER, 90))
        .add_intent(Intent::new(
            Command::OrderDelivered { change_owner: None },
            [ISSUER, BUYER, SELLER],
        ));
    b.build()
}

proptest! {
    // ===================================================================
    // INVARIANT 1: Accepted payments conserve value.
    //
    // For any consumed amount and any pair of output amounts, a split is
    // accepted only if both outputs are positive and sum to the input.
    // ===================================================================
    #[test]
    fn accepted_split_conserves_value(
        input in arb_amount(),
        paid in arb_output_amount(),
        change in arb_output_amount(),
    ) {
        let verdict = validate(&split(input, paid, change));
        if verdict.is_ok() {
            prop_assert_eq!(paid + change, input);
            prop_assert!(paid > 0 && change > 0);
        }
    }

    // ===================================================================
    // INVARIANT 2: Every conserving positive split is accepted.
    // ===================================================================
    #[test]
    fn conserving_split_accepted(input in 2i64..1_000_000i64, cut in 1i64..1_000_000i64) {
        let paid = 1 + cut % (input - 1);
        let change = input - paid;
        prop_assert!(validate(&split(input, paid, change)).is_ok());
    }

    // ===================================================================
    // INVARIANT 3: Unequal sums are always a conservation violation.
    // ===================================================================
    #[test]
    fn non_conserving_split_rejected(
        input in arb_amount(),
        paid in 1i64..1_000_000i64,
        change in 1i64..1_000_000i64,
    ) {
        prop_assume!(paid + change != input);
        let verdict = validate(&split(input, paid, change));
        let is_conservation_violation =
            matches!(verdict, Err(ValidationError::ConservationViolation { .. }));
        prop_assert!(is_conservation_violation);
    }

    // ===================================================================
    // INVARIANT 4: Order lifecycle is monotonic.
    //
    // A delivery is accepted only for Placed → Delivered on the same
    // logical order.
    // ===================================================================
    #[test]
    fn lifecycle_only_moves_forward(from in arb_status(), to in arb_status()) {
        let consumed = order(from, "ord-1");
        let produced = OrderRecord { status: to, ..consumed.clone() };
        let verdict = validate(&delivery(consumed, produced));
        let forward = from == OrderStatus::Placed && to == OrderStatus::Delivered;
        prop_assert_eq!(verdict.is_ok(), forward);
    }

    // ===================================================================
    // INVARIANT 5: Logical identity never changes across versions.
    // ===================================================================
    #[test]
    fn logical_id_change_rejected(a in "[a-z]{1,8}", b in "[a-z]{1,8}") {
        let consumed = order(OrderStatus::Placed, &a);
        let produced = order(OrderStatus::Delivered, &b);
        let verdict = validate(&delivery(consumed, produced));
        let is_identity_violation =
            matches!(verdict, Err(ValidationError::LogicalIdentityViolation { .. }));
        prop_assert!(is_identity_violation);
    }
}
