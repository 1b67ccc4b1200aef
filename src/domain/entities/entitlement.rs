use std::collections::{BTreeMap, BTreeSet};

use crate::errors::IapError;

use super::product_id::ProductId;

/// What the user receives when a product is purchased.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntitlementGrant {
    /// Adds `quantity` units of a countable entitlement (for example, extra
    /// lives) per purchased unit.
    Consumable { entitlement: String, quantity: u32 },
    /// Permanently unlocks a feature (for example, map access).
    Unlock { entitlement: String },
}

/// User-facing entitlement state owned by the view-model.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntitlementState {
    pub consumables: BTreeMap<String, u32>,
    pub unlocks: BTreeSet<String>,
    /// Non-consumable products the user owns.
    pub purchased_product_ids: BTreeSet<ProductId>,
}

impl EntitlementState {
    pub fn count(&self, entitlement: &str) -> u32 {
        self.consumables.get(entitlement).copied().unwrap_or(0)
    }

    pub fn is_unlocked(&self, entitlement: &str) -> bool {
        self.unlocks.contains(entitlement)
    }

    pub fn is_product_purchased(&self, product_id: &ProductId) -> bool {
        self.purchased_product_ids.contains(product_id)
    }

    pub(crate) fn add_consumable(&mut self, entitlement: &str, amount: u32) -> u32 {
        let count = self.consumables.entry(entitlement.to_owned()).or_insert(0);
        *count = count.saturating_add(amount);
        *count
    }

    pub(crate) fn unlock(&mut self, entitlement: &str) -> bool {
        self.unlocks.insert(entitlement.to_owned())
    }

    pub(crate) fn record_purchase(&mut self, product_id: &ProductId) -> bool {
        self.purchased_product_ids.insert(product_id.clone())
    }

    /// Spends `amount` units of a consumable entitlement, returning the
    /// remaining count.
    pub(crate) fn consume(&mut self, entitlement: &str, amount: u32) -> Result<u32, IapError> {
        let available = self.count(entitlement);
        if amount > available {
            return Err(IapError::InsufficientEntitlement {
                entitlement: entitlement.to_owned(),
                requested: amount,
                available,
            });
        }
        let remaining = available - amount;
        if remaining == 0 {
            self.consumables.remove(entitlement);
        } else {
            self.consumables.insert(entitlement.to_owned(), remaining);
        }
        Ok(remaining)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_consumable_accumulates() {
        let mut state = EntitlementState::default();
        assert_eq!(state.add_consumable("lives", 5), 5);
        assert_eq!(state.add_consumable("lives", 3), 8);
        assert_eq!(state.count("lives"), 8);
        assert_eq!(state.count("coins"), 0);
    }

    #[test]
    fn test_consume_removes_exhausted_entry() {
        let mut state = EntitlementState::default();
        state.add_consumable("lives", 2);
        assert_eq!(state.consume("lives", 1).unwrap(), 1);
        assert_eq!(state.consume("lives", 1).unwrap(), 0);
        assert!(!state.consumables.contains_key("lives"));
    }

    #[test]
    fn test_consume_more_than_available_fails() {
        let mut state = EntitlementState::default();
        state.add_consumable("lives", 1);
        let err = state.consume("lives", 2).unwrap_err();
        assert!(matches!(
            err,
            IapError::InsufficientEntitlement {
                requested: 2,
                available: 1,
                ..
            }
        ));
        assert_eq!(state.count("lives"), 1);
    }

    #[test]
    fn test_unlock_is_idempotent() {
        let mut state = EntitlementState::default();
        assert!(state.unlock("maps"));
        assert!(!state.unlock("maps"));
        assert!(state.is_unlocked("maps"));
    }
}
