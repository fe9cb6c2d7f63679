//! Cache types for saved payment instruments.

use super::{BankAccount, CreditCard};

/// Cache key for payment instrument lists.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq)]
pub enum CacheKey {
    CreditCards,
    BankAccounts,
}

/// Cached value types.
#[derive(Debug, Clone)]
pub enum CacheValue {
    CreditCards(Vec<CreditCard>),
    BankAccounts(Vec<BankAccount>),
}
