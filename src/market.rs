//! Peer-to-peer listings marketplace.
//!
//! Sellers advertise named offers at a fixed price. Buying an offer transfers
//! the price from buyer to seller through the ledger; whether the listing
//! survives the purchase depends on the [`PurchasePolicy`].

use std::collections::BTreeMap;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::Points;
use crate::config::PurchasePolicy;
use crate::ledger::{Ledger, LedgerError};
use crate::model::UserId;
use crate::store::{DocumentStore, MemoryStore, StoreError};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Listing {
    pub name: String,
    pub price: Points,
}

/// A seller's offers, in registration order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Shop {
    pub items: Vec<Listing>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarketDocument {
    pub shops: BTreeMap<UserId, Shop>,
}

#[derive(Debug, Error)]
pub enum MarketError {
    #[error("listing name must not be empty")]
    EmptyName,

    #[error("price must be positive, got {0}")]
    InvalidPrice(Points),

    #[error("seller {0} has no listings")]
    EmptyShop(UserId),

    #[error("seller {seller} has no listing named '{name}'")]
    ListingNotFound { seller: UserId, name: String },

    #[error("you cannot buy your own listing")]
    OwnListing,

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// A listing together with its seller, as shown when browsing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Offer {
    pub seller: UserId,
    pub listing: Listing,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Purchase {
    pub seller: UserId,
    pub listing: Listing,
    /// The listing was taken down by the purchase.
    pub removed: bool,
}

pub struct Marketplace {
    store: Mutex<Box<dyn DocumentStore<MarketDocument>>>,
    policy: PurchasePolicy,
}

impl Marketplace {
    pub fn new(
        store: impl DocumentStore<MarketDocument> + 'static,
        policy: PurchasePolicy,
    ) -> Self {
        Self {
            store: Mutex::new(Box::new(store)),
            policy,
        }
    }

    pub fn in_memory(policy: PurchasePolicy) -> Self {
        Self::new(MemoryStore::<MarketDocument>::default(), policy)
    }

    pub fn policy(&self) -> PurchasePolicy {
        self.policy
    }

    pub fn register(
        &self,
        seller: UserId,
        name: &str,
        price: Points,
    ) -> Result<Listing, MarketError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(MarketError::EmptyName);
        }
        if !price.is_positive() {
            return Err(MarketError::InvalidPrice(price));
        }
        let listing = Listing {
            name: name.to_string(),
            price,
        };
        self.transact(|doc| {
            doc.shops
                .entry(seller)
                .or_default()
                .items
                .push(listing.clone());
            Ok(())
        })?;
        info!(seller, name = %listing.name, price = %listing.price, "listing registered");
        Ok(listing)
    }

    /// The seller's own listings.
    pub fn listings(&self, seller: UserId) -> Vec<Listing> {
        self.lock()
            .load()
            .shops
            .remove(&seller)
            .map(|shop| shop.items)
            .unwrap_or_default()
    }

    /// Remove every listing of `seller` named `name`; returns how many went.
    pub fn delete(&self, seller: UserId, name: &str) -> Result<usize, MarketError> {
        let name = name.trim();
        self.transact(|doc| {
            let shop = doc
                .shops
                .get_mut(&seller)
                .filter(|shop| !shop.items.is_empty())
                .ok_or(MarketError::EmptyShop(seller))?;
            let before = shop.items.len();
            shop.items.retain(|item| item.name != name);
            match before - shop.items.len() {
                0 => Err(MarketError::ListingNotFound {
                    seller,
                    name: name.to_string(),
                }),
                removed => Ok(removed),
            }
        })
    }

    /// Every listing across all sellers.
    pub fn browse(&self) -> Vec<Offer> {
        self.lock()
            .load()
            .shops
            .into_iter()
            .flat_map(|(seller, shop)| {
                shop.items
                    .into_iter()
                    .map(move |listing| Offer { seller, listing })
            })
            .collect()
    }

    /// Buy the first listing of `seller` named `name`:
    /// - Buyers cannot buy from themselves
    /// - The price moves from buyer to seller in one ledger unit
    /// - Under [`PurchasePolicy::Consume`] the listing is taken down
    ///
    /// The market lock is held across the ledger transfer so a consumable
    /// listing cannot be sold twice.
    pub fn purchase(
        &self,
        ledger: &Ledger,
        buyer: UserId,
        seller: UserId,
        name: &str,
    ) -> Result<Purchase, MarketError> {
        let name = name.trim();
        if buyer == seller {
            return Err(MarketError::OwnListing);
        }

        let store = self.lock();
        let mut doc = store.load();
        let shop = doc
            .shops
            .get_mut(&seller)
            .filter(|shop| !shop.items.is_empty())
            .ok_or(MarketError::EmptyShop(seller))?;
        let idx = shop
            .items
            .iter()
            .position(|item| item.name == name)
            .ok_or_else(|| MarketError::ListingNotFound {
                seller,
                name: name.to_string(),
            })?;
        let listing = shop.items[idx].clone();

        ledger.transfer(buyer, seller, listing.price)?;

        let removed = self.policy == PurchasePolicy::Consume;
        if removed {
            shop.items.remove(idx);
            store.save(&doc)?;
        }
        info!(
            buyer,
            seller,
            name = %listing.name,
            price = %listing.price,
            removed,
            "listing purchased"
        );
        Ok(Purchase {
            seller,
            listing,
            removed,
        })
    }

    fn transact<T>(
        &self,
        f: impl FnOnce(&mut MarketDocument) -> Result<T, MarketError>,
    ) -> Result<T, MarketError> {
        let store = self.lock();
        let mut doc = store.load();
        let value = f(&mut doc)?;
        store.save(&doc)?;
        Ok(value)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Box<dyn DocumentStore<MarketDocument>>> {
        self.store
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Split `(name) price` into its parts.
pub fn parse_name_and_price(args: &str) -> Option<(String, i64)> {
    let (name, rest) = parse_bracketed_name(args)?;
    let price = rest.split_whitespace().next()?.parse().ok()?;
    Some((name, price))
}

/// Extract the name between the first `(` and the following `)`, returning it
/// with whatever text follows.
pub fn parse_bracketed_name(args: &str) -> Option<(String, &str)> {
    let open = args.find('(')?;
    let close = open + args[open..].find(')')?;
    let name = args[open + 1..close].trim();
    if name.is_empty() {
        return None;
    }
    Some((name.to_string(), &args[close + 1..]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::Field;

    fn pts(value: i64) -> Points {
        Points::new(value)
    }

    fn funded_ledger(balances: &[(UserId, i64)]) -> Ledger {
        let ledger = Ledger::in_memory();
        for (user, amount) in balances {
            ledger.credit(*user, Field::Points, pts(*amount)).unwrap();
        }
        ledger
    }

    #[test]
    fn parses_name_and_price() {
        assert_eq!(
            parse_name_and_price("(Thumbnail design) 30"),
            Some(("Thumbnail design".to_string(), 30))
        );
        assert_eq!(parse_name_and_price("Thumbnail 30"), None);
        assert_eq!(parse_name_and_price("() 30"), None);
        assert_eq!(parse_name_and_price("(Logo)"), None);
        assert_eq!(
            parse_bracketed_name("(Logo) delete"),
            Some(("Logo".to_string(), " delete"))
        );
    }

    #[test]
    fn register_and_list_in_order() {
        let market = Marketplace::in_memory(PurchasePolicy::Repeatable);
        market.register(1, "Logo", pts(30)).unwrap();
        market.register(1, "Banner", pts(50)).unwrap();
        market.register(2, "Logo", pts(10)).unwrap();

        let names: Vec<_> = market.listings(1).into_iter().map(|l| l.name).collect();
        assert_eq!(names, vec!["Logo", "Banner"]);
        assert_eq!(market.browse().len(), 3);
        assert!(market.listings(3).is_empty());
    }

    #[test]
    fn register_rejects_bad_input() {
        let market = Marketplace::in_memory(PurchasePolicy::Repeatable);
        assert!(matches!(
            market.register(1, "  ", pts(30)),
            Err(MarketError::EmptyName)
        ));
        assert!(matches!(
            market.register(1, "Logo", Points::ZERO),
            Err(MarketError::InvalidPrice(_))
        ));
        assert!(market.browse().is_empty());
    }

    #[test]
    fn delete_removes_matching_names() {
        let market = Marketplace::in_memory(PurchasePolicy::Repeatable);
        market.register(1, "Logo", pts(30)).unwrap();
        market.register(1, "Logo", pts(35)).unwrap();
        market.register(1, "Banner", pts(50)).unwrap();

        assert_eq!(market.delete(1, "Logo").unwrap(), 2);
        assert!(matches!(
            market.delete(1, "Logo"),
            Err(MarketError::ListingNotFound { seller: 1, .. })
        ));
        assert!(matches!(market.delete(2, "Logo"), Err(MarketError::EmptyShop(2))));
        assert_eq!(market.listings(1).len(), 1);
    }

    #[test]
    fn repeatable_purchase_keeps_listing() {
        let ledger = funded_ledger(&[(2, 100)]);
        let market = Marketplace::in_memory(PurchasePolicy::Repeatable);
        market.register(1, "Logo", pts(30)).unwrap();

        let purchase = market.purchase(&ledger, 2, 1, "Logo").unwrap();
        assert!(!purchase.removed);
        market.purchase(&ledger, 2, 1, "Logo").unwrap();

        assert_eq!(ledger.balance(2), pts(40));
        assert_eq!(ledger.balance(1), pts(60));
        assert_eq!(market.listings(1).len(), 1);
    }

    #[test]
    fn consume_purchase_removes_listing() {
        let ledger = funded_ledger(&[(2, 100)]);
        let market = Marketplace::in_memory(PurchasePolicy::Consume);
        market.register(1, "Logo", pts(30)).unwrap();

        assert!(market.purchase(&ledger, 2, 1, "Logo").unwrap().removed);
        assert!(matches!(
            market.purchase(&ledger, 2, 1, "Logo"),
            Err(MarketError::EmptyShop(1))
        ));
        assert_eq!(ledger.balance(2), pts(70));
    }

    #[test]
    fn purchase_without_funds_changes_nothing() {
        let ledger = funded_ledger(&[(2, 10)]);
        let market = Marketplace::in_memory(PurchasePolicy::Consume);
        market.register(1, "Logo", pts(30)).unwrap();

        assert!(matches!(
            market.purchase(&ledger, 2, 1, "Logo"),
            Err(MarketError::Ledger(LedgerError::InsufficientFunds { user: 2, .. }))
        ));
        assert_eq!(ledger.balance(2), pts(10));
        assert_eq!(market.listings(1).len(), 1);
    }

    #[test]
    fn purchase_rejects_own_and_unknown_listings() {
        let ledger = funded_ledger(&[(1, 100), (2, 100)]);
        let market = Marketplace::in_memory(PurchasePolicy::Repeatable);
        market.register(1, "Logo", pts(30)).unwrap();

        assert!(matches!(
            market.purchase(&ledger, 1, 1, "Logo"),
            Err(MarketError::OwnListing)
        ));
        assert!(matches!(
            market.purchase(&ledger, 2, 1, "Banner"),
            Err(MarketError::ListingNotFound { .. })
        ));
    }
}
