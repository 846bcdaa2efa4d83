//! Merchant Registry
//!
//! Maps custodial identities to merchant records and hands out sequential
//! merchant ids.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::aggregate::Merchant;
use crate::domain::{DomainError, Identity, MerchantId};

/// Registry of merchants keyed by custodial identity
#[derive(Debug, Clone)]
pub struct MerchantRegistry {
    merchants: HashMap<Identity, Merchant>,
    ids: BTreeMap<MerchantId, Identity>,
    next_id: MerchantId,
}

impl Default for MerchantRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl MerchantRegistry {
    pub fn new() -> Self {
        Self {
            merchants: HashMap::new(),
            ids: BTreeMap::new(),
            next_id: MerchantId::FIRST,
        }
    }

    /// Register a merchant under `custodial_wallet`.
    ///
    /// # Errors
    /// - `InvalidAmount` for a blank name or the nil identity
    /// - `AlreadyRegistered` if the identity already owns a record
    pub fn register(
        &mut self,
        name: String,
        custodial_wallet: Identity,
        at: DateTime<Utc>,
    ) -> Result<Merchant, DomainError> {
        if name.trim().is_empty() {
            return Err(DomainError::InvalidAmount("merchant name is empty".to_string()));
        }
        if custodial_wallet.is_nil() {
            return Err(DomainError::InvalidAmount("custodial wallet is the null identity".to_string()));
        }
        if self.is_registered(&custodial_wallet) {
            return Err(DomainError::AlreadyRegistered(custodial_wallet));
        }

        let id = self.next_id;
        self.next_id = id.next();

        let merchant = Merchant::register(id, name, custodial_wallet, at);
        self.ids.insert(id, custodial_wallet);
        self.merchants.insert(custodial_wallet, merchant.clone());

        Ok(merchant)
    }

    pub fn get(&self, custodial_wallet: &Identity) -> Option<&Merchant> {
        self.merchants.get(custodial_wallet)
    }

    pub fn get_by_id(&self, id: MerchantId) -> Option<&Merchant> {
        self.ids
            .get(&id)
            .and_then(|wallet| self.merchants.get(wallet))
            .filter(|merchant| merchant.is_registered())
    }

    pub fn is_registered(&self, custodial_wallet: &Identity) -> bool {
        self.merchants
            .get(custodial_wallet)
            .is_some_and(Merchant::is_registered)
    }

    /// Id the next registration will receive
    pub fn next_id(&self) -> MerchantId {
        self.next_id
    }

    /// Merchants in id order
    pub fn merchants(&self) -> impl Iterator<Item = &Merchant> {
        self.ids.values().filter_map(|wallet| self.merchants.get(wallet))
    }

    pub fn len(&self) -> usize {
        self.merchants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.merchants.is_empty()
    }

    /// Sum of all merchant ledger balances
    pub fn total_balance(&self) -> Decimal {
        self.merchants.values().map(|m| m.balance().value()).sum()
    }

    /// Replace an existing record, returning the previous one
    pub(crate) fn update(&mut self, merchant: Merchant) -> Option<Merchant> {
        self.merchants.insert(merchant.custodial_wallet(), merchant)
    }

    /// Put back a record as it was before an aborted operation
    pub(crate) fn restore(&mut self, custodial_wallet: Identity, prior: Option<Merchant>) {
        match prior {
            Some(merchant) => {
                self.ids.insert(merchant.id(), custodial_wallet);
                self.merchants.insert(custodial_wallet, merchant);
            }
            None => {
                if let Some(removed) = self.merchants.remove(&custodial_wallet) {
                    self.ids.remove(&removed.id());
                }
            }
        }
    }

    pub(crate) fn rewind_next_id(&mut self, next_id: MerchantId) {
        self.next_id = next_id;
    }
}
