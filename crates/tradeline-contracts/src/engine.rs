//! Validation entry point.

use std::collections::BTreeSet;

use tradeline_types::{Command, PartyId, Transition, ValidationError};

use crate::view::TransitionView;
use crate::{balance, order};

/// Decide whether `tx` satisfies the rule of its single intent.
///
/// Pure and deterministic: the same transition always yields the same
/// verdict, so every authorizer and the notary reach the same conclusion.
pub fn validate(tx: &Transition) -> Result<(), ValidationError> {
    let [intent] = tx.intents() else {
        return Err(ValidationError::MultipleOrNoCommand {
            count: tx.intents().len(),
        });
    };

    let view = TransitionView::new(tx);

    match &intent.command {
        Command::Issue => balance::verify_issue(tx, intent)?,
        Command::Pay { change_owner } => {
            if view.has_orders() {
                return Err(ValidationError::MalformedTransition {
                    command: intent.command.to_string(),
                    reason: "payment must not touch order records".to_string(),
                });
            }
            balance::verify_payment(&view, intent, *change_owner)?;
        }
        Command::OrderPlacing { .. } => order::verify_placing(&view, intent)?,
        Command::OrderDelivered { .. } => order::verify_delivered(&view, intent)?,
    }

    verify_participation(tx)
}

/// Every required authorizer must have a stake in a touched record.
fn verify_participation(tx: &Transition) -> Result<(), ValidationError> {
    let participants: BTreeSet<PartyId> = tx
        .consumed()
        .iter()
        .map(|live| &live.record)
        .chain(tx.produced())
        .flat_map(tradeline_types::Record::participants)
        .collect();

    match tx
        .required_authorizers()
        .into_iter()
        .find(|party| !participants.contains(party))
    {
        Some(party) => Err(ValidationError::UnexpectedAuthorizer { party }),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use tradeline_types::{
        BalanceRecord, Command, Intent, LiveRecord, NotaryId, PartyId, TransitionBuilder,
        ValidationError,
    };

    use super::validate;

    const ISSUER: PartyId = PartyId([1; 32]);
    const BUYER: PartyId = PartyId([2; 32]);
    const SELLER: PartyId = PartyId([3; 32]);

    #[test]
    fn zero_intents_rejected() {
        let mut b = TransitionBuilder::new(NotaryId([0; 32]));
        b.add_produced(BalanceRecord::new(ISSUER, BUYER, 10));
        let err = validate(&b.build()).unwrap_err();
        assert_eq!(err, ValidationError::MultipleOrNoCommand { count: 0 });
    }

    #[test]
    fn two_intents_rejected() {
        let mut b = TransitionBuilder::new(NotaryId([0; 32]));
        b.add_produced(BalanceRecord::new(ISSUER, BUYER, 10))
            .add_intent(Intent::new(Command::Issue, [ISSUER, BUYER]))
            .add_intent(Intent::new(Command::Issue, [ISSUER, BUYER]));
        let err = validate(&b.build()).unwrap_err();
        assert_eq!(err, ValidationError::MultipleOrNoCommand { count: 2 });
    }

    #[test]
    fn outsider_authorizer_rejected() {
        let outsider = PartyId([7; 32]);
        let mut b = TransitionBuilder::new(NotaryId([0; 32]));
        b.add_produced(BalanceRecord::new(ISSUER, BUYER, 10))
            .add_intent(Intent::new(Command::Issue, [ISSUER, BUYER, outsider]));
        let err = validate(&b.build()).unwrap_err();
        assert_eq!(err, ValidationError::UnexpectedAuthorizer { party: outsider });
    }

    #[test]
    fn pay_touching_orders_rejected() {
        let order = tradeline_types::OrderRecord::new_placed(
            tradeline_types::OrderId::new("o"),
            "x",
            BUYER,
            SELLER,
            rust_decimal::Decimal::ONE_HUNDRED,
            rust_decimal::Decimal::ZERO,
        );
        let mut b = TransitionBuilder::new(NotaryId([0; 32]));
        b.add_consumed(LiveRecord::dummy_balance(ISSUER, BUYER, 10))
            .add_produced(BalanceRecord::new(ISSUER, SELLER, 10))
            .add_produced(order)
            .add_intent(Intent::new(
                Command::Pay { change_owner: None },
                [ISSUER, BUYER, SELLER],
            ));
        let err = validate(&b.build()).unwrap_err();
        assert!(matches!(err, ValidationError::MalformedTransition { .. }), "{err}");
    }

    #[test]
    fn verdict_is_deterministic() {
        let mut b = TransitionBuilder::new(NotaryId([0; 32]));
        b.add_consumed(LiveRecord::dummy_balance(ISSUER, BUYER, 10))
            .add_produced(BalanceRecord::new(ISSUER, SELLER, 4))
            .add_produced(BalanceRecord::new(ISSUER, BUYER, 6))
            .add_intent(Intent::new(
                Command::Pay {
                    change_owner: Some(BUYER),
                },
                [ISSUER, BUYER, SELLER],
            ));
        let tx = b.build();
        assert_eq!(validate(&tx), validate(&tx));
        assert!(validate(&tx).is_ok());
    }
}
