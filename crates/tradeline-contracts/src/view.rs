//! Typed partition of a transition's records.

use tradeline_types::{BalanceRecord, OrderRecord, Record, Transition};

/// Consumed and produced records split by kind, keeping produced indices
/// so errors can point at the offending output.
pub(crate) struct TransitionView<'a> {
    pub consumed_balances: Vec<&'a BalanceRecord>,
    pub consumed_orders: Vec<&'a OrderRecord>,
    pub produced_balances: Vec<(usize, &'a BalanceRecord)>,
    pub produced_orders: Vec<&'a OrderRecord>,
}

impl<'a> TransitionView<'a> {
    pub fn new(tx: &'a Transition) -> Self {
        let mut view = Self {
            consumed_balances: Vec::new(),
            consumed_orders: Vec::new(),
            produced_balances: Vec::new(),
            produced_orders: Vec::new(),
        };
        for live in tx.consumed() {
            match &live.record {
                Record::Balance(b) => view.consumed_balances.push(b),
                Record::Order(o) => view.consumed_orders.push(o),
            }
        }
        for (index, record) in tx.produced().iter().enumerate() {
            match record {
                Record::Balance(b) => view.produced_balances.push((index, b)),
                Record::Order(o) => view.produced_orders.push(o),
            }
        }
        view
    }

    pub fn has_orders(&self) -> bool {
        !self.consumed_orders.is_empty() || !self.produced_orders.is_empty()
    }
}
