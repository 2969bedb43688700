//! Balance rules: issuance and transfer with optional change.
//!
//! ```text
//! ISSUE:  ∅                → [B(issuer, owner, n > 0)]
//! PAY:    [B(i, O, A)]     → [B(i, P, A)]              P ≠ O
//!         [B(i, O, A)]     → [B(i, P, a), B(i, C, A−a)] P ≠ C, C = change owner
//! ```
//!
//! Conservation: the produced amounts always sum to the consumed amount.

use tradeline_types::{Intent, PartyId, Transition, ValidationError};

use crate::view::TransitionView;

type Result<T> = std::result::Result<T, ValidationError>;

/// Issuance: no inputs, one positive balance output, signed by its issuer.
pub(crate) fn verify_issue(tx: &Transition, intent: &Intent) -> Result<()> {
    if !tx.consumed().is_empty() {
        return Err(ValidationError::InvalidIssuance {
            reason: format!("must consume nothing, consumes {}", tx.consumed().len()),
        });
    }

    let [output] = tx.produced() else {
        return Err(ValidationError::InvalidIssuance {
            reason: format!("must produce exactly 1 record, produces {}", tx.produced().len()),
        });
    };

    let Some(balance) = output.as_balance() else {
        return Err(ValidationError::InvalidIssuance {
            reason: "output must be a balance record".to_string(),
        });
    };

    if balance.amount <= 0 {
        return Err(ValidationError::InvalidIssuance {
            reason: format!("amount must be positive, got {}", balance.amount),
        });
    }

    if !intent.is_signed_by(&balance.issuer) {
        return Err(ValidationError::InvalidIssuance {
            reason: format!("issuer {} is not a signer", balance.issuer),
        });
    }

    Ok(())
}

/// Transfer of exactly one consumed balance into one or two outputs.
///
/// Shared by `PAY` and by both order commands, which settle money in the
/// same transition.
pub(crate) fn verify_payment(
    view: &TransitionView<'_>,
    intent: &Intent,
    change_owner: Option<PartyId>,
) -> Result<()> {
    let command = intent.command.to_string();

    let [input] = view.consumed_balances.as_slice() else {
        return Err(ValidationError::MalformedTransition {
            command,
            reason: format!(
                "must consume exactly 1 balance record, consumes {}",
                view.consumed_balances.len()
            ),
        });
    };

    for &(index, output) in &view.produced_balances {
        if output.amount <= 0 {
            return Err(ValidationError::NonPositiveAmount {
                index,
                amount: output.amount,
            });
        }
    }

    match view.produced_balances.as_slice() {
        [(_, output)] => {
            if output.amount != input.amount {
                return Err(ValidationError::ConservationViolation {
                    consumed: input.amount,
                    produced: output.amount,
                });
            }
            if output.owner == input.owner {
                return Err(ValidationError::OwnerUnchanged { owner: input.owner });
            }
        }
        [(_, first), (_, second)] => {
            let produced = first.amount.saturating_add(second.amount);
            if produced != input.amount {
                return Err(ValidationError::ConservationViolation {
                    consumed: input.amount,
                    produced,
                });
            }
            if first.owner == second.owner {
                return Err(ValidationError::AmbiguousSplit { owner: first.owner });
            }
            let change_declared = change_owner
                .is_some_and(|change| first.owner == change || second.owner == change);
            if !change_declared {
                return Err(ValidationError::UndeclaredChange {
                    declared: change_owner,
                });
            }
        }
        outputs => {
            return Err(ValidationError::MalformedTransition {
                command,
                reason: format!("must produce 1 or 2 balance records, produces {}", outputs.len()),
            });
        }
    }

    for &(index, output) in &view.produced_balances {
        // Claims from different issuers are not fungible.
        if output.issuer != input.issuer {
            return Err(ValidationError::MalformedTransition {
                command,
                reason: format!(
                    "output {index} issued by {} but consumed balance issued by {}",
                    output.issuer, input.issuer
                ),
            });
        }
        if !intent.is_signed_by(&output.issuer) {
            return Err(ValidationError::MissingIssuerSignature {
                issuer: output.issuer,
            });
        }
    }

    Ok(())
}
