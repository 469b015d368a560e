use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::ValidationError;
use crate::ledger::models::MAX_SLOTS_PER_ACCOUNT;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotAssignment {
    pub recipient_index: usize,
    pub slot: u32,
}

/// Mapping of recipients to tickets for one run. Immutable once computed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotAllocation {
    assignments: Vec<SlotAssignment>,
    required: usize,
}

impl SlotAllocation {
    /// Sort the pool ascending and hand the lowest tickets to recipients in
    /// list order. Repeated identifiers in the pool count once.
    pub fn allocate(pool: &[u32], required: usize) -> Self {
        let mut slots = pool.to_vec();
        slots.sort_unstable();
        slots.dedup();

        let assignments = slots
            .into_iter()
            .take(required)
            .enumerate()
            .map(|(recipient_index, slot)| SlotAssignment {
                recipient_index,
                slot,
            })
            .collect();

        Self {
            assignments,
            required,
        }
    }

    pub fn assignments(&self) -> &[SlotAssignment] {
        &self.assignments
    }

    /// Recipients left without a ticket
    pub fn deficit(&self) -> usize {
        self.required - self.assignments.len()
    }

    pub fn is_complete(&self) -> bool {
        self.deficit() == 0
    }

    pub fn slot_for(&self, recipient_index: usize) -> Option<u32> {
        self.assignments
            .get(recipient_index)
            .map(|assignment| assignment.slot)
    }

    pub fn slot_ids(&self) -> Vec<u32> {
        self.assignments.iter().map(|a| a.slot).collect()
    }
}

/// Ticket creation is bounded per transaction and by the per-account ceiling
pub fn validate_slot_request(existing: usize, count: u32) -> Result<(), ValidationError> {
    if count == 0 || count > MAX_SLOTS_PER_ACCOUNT {
        return Err(ValidationError::InvalidSlotCount {
            count,
            reason: format!("must be between 1 and {}", MAX_SLOTS_PER_ACCOUNT),
        });
    }
    if existing + count as usize > MAX_SLOTS_PER_ACCOUNT as usize {
        return Err(ValidationError::InvalidSlotCount {
            count,
            reason: format!(
                "account already holds {} of at most {} tickets",
                existing, MAX_SLOTS_PER_ACCOUNT
            ),
        });
    }
    Ok(())
}

/// Ticket creation for approval in a wallet; the wallet fills in fee and sequence
pub fn slot_create_request(account: &str, count: u32) -> Value {
    json!({
        "TransactionType": "TicketCreate",
        "Account": account,
        "TicketCount": count,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_allocates_lowest_slots_in_order() {
        let allocation = SlotAllocation::allocate(&[40, 12, 33, 7, 19], 3);

        assert!(allocation.is_complete());
        assert_eq!(allocation.slot_ids(), vec![7, 12, 19]);
        assert_eq!(allocation.slot_for(0), Some(7));
        assert_eq!(allocation.slot_for(2), Some(19));
        assert_eq!(allocation.slot_for(3), None);
    }

    #[test]
    fn test_reports_deficit() {
        let allocation = SlotAllocation::allocate(&[5, 6], 5);

        assert!(!allocation.is_complete());
        assert_eq!(allocation.deficit(), 3);
        assert_eq!(allocation.assignments().len(), 2);
    }

    #[test]
    fn test_duplicate_pool_entries_are_used_once() {
        let allocation = SlotAllocation::allocate(&[9, 9, 3, 3, 4], 4);

        let unique: HashSet<u32> = allocation.slot_ids().into_iter().collect();
        assert_eq!(unique.len(), allocation.assignments().len());
        assert_eq!(allocation.slot_ids(), vec![3, 4, 9]);
        assert_eq!(allocation.deficit(), 1);
    }

    #[test]
    fn test_slot_request_bounds() {
        assert!(validate_slot_request(0, 250).is_ok());
        assert!(validate_slot_request(0, 0).is_err());
        assert!(validate_slot_request(0, 251).is_err());
        assert!(matches!(
            validate_slot_request(200, 60),
            Err(ValidationError::InvalidSlotCount { count: 60, .. })
        ));
    }
}
