//! Polled balance reads with optimistic local adjustment.

use crate::domain::Wad;

pub mod balance;

pub use balance::{spawn_balance_monitor, BalanceHandle, BalanceRegistry};

/// Two explicit fields with an explicit reconciliation rule: an
/// authoritative on-chain value and an optional optimistic override shown in
/// its place until the chain catches up.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BalanceSnapshot {
    pub on_chain: Option<Wad>,
    pub optimistic: Option<Wad>,
}

impl BalanceSnapshot {
    /// The value a client should display.
    pub fn displayed(&self) -> Option<Wad> {
        self.optimistic.or(self.on_chain)
    }

    /// Apply a fresh authoritative read. Clears the optimistic override once
    /// the chain has caught up to (or moved past) it.
    pub fn apply_poll(&mut self, polled: Wad) {
        self.on_chain = Some(polled);
        if let Some(optimistic) = self.optimistic {
            if polled <= optimistic {
                self.optimistic = None;
            }
        }
    }

    /// Locally decrement the displayed balance by `amount_sent`, clamped at
    /// zero, never negative.
    pub fn apply_optimistic(&mut self, amount_sent: Wad) {
        let base = self.displayed().unwrap_or(Wad::ZERO);
        self.optimistic = Some(base.saturating_sub(amount_sent));
    }

    pub fn clear_optimistic(&mut self) {
        self.optimistic = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn optimistic_decrement_clamps_at_zero() {
        let mut s = BalanceSnapshot::default();
        s.apply_poll(Wad::from_int(5));
        s.apply_optimistic(Wad::from_int(10));
        assert_eq!(s.displayed(), Some(Wad::ZERO));
    }

    #[test]
    fn optimistic_value_is_displayed_until_chain_catches_up() {
        let mut s = BalanceSnapshot::default();
        s.apply_poll(Wad::from_int(100));
        s.apply_optimistic(Wad::from_int(30));
        assert_eq!(s.displayed(), Some(Wad::from_int(70)));

        // Chain still behind: optimistic stays.
        s.apply_poll(Wad::from_int(100));
        assert_eq!(s.displayed(), Some(Wad::from_int(70)));

        // Chain caught up (at or below the override): authoritative again.
        s.apply_poll(Wad::from_int(70));
        assert_eq!(s.optimistic, None);
        assert_eq!(s.displayed(), Some(Wad::from_int(70)));
    }

    #[test]
    fn chain_moving_past_the_override_also_clears_it() {
        let mut s = BalanceSnapshot::default();
        s.apply_poll(Wad::from_int(100));
        s.apply_optimistic(Wad::from_int(30));
        s.apply_poll(Wad::from_int(65));
        assert_eq!(s.optimistic, None);
        assert_eq!(s.displayed(), Some(Wad::from_int(65)));
    }

    #[test]
    fn stacked_optimistic_updates_compound() {
        let mut s = BalanceSnapshot::default();
        s.apply_poll(Wad::from_int(100));
        s.apply_optimistic(Wad::from_int(30));
        s.apply_optimistic(Wad::from_int(30));
        assert_eq!(s.displayed(), Some(Wad::from_int(40)));
    }

    #[test]
    fn no_data_displays_nothing() {
        let s = BalanceSnapshot::default();
        assert_eq!(s.displayed(), None);
    }
}
