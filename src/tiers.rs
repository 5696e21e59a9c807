//! Bundle catalogue and purchase-signal resolution.
//!
//! A purchase arrives with a product name (checkout metadata or the bundle
//! label the pricing page sent), a paid amount in cents, or both. Resolution
//! always lands on exactly one bundle: a payment that already succeeded must
//! still be granted an entitlement, so anything unrecognised falls back to
//! [`DEFAULT_BUNDLE`].

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BundleKey {
    Single,
    Starter,
    Weekend,
    Challenge,
    Moving,
    Estate,
}

impl BundleKey {
    pub fn as_str(self) -> &'static str {
        match self {
            BundleKey::Single => "single",
            BundleKey::Starter => "starter",
            BundleKey::Weekend => "weekend",
            BundleKey::Challenge => "challenge",
            BundleKey::Moving => "moving",
            BundleKey::Estate => "estate",
        }
    }

    /// Index into the price-ordered catalogue.
    const fn position(self) -> usize {
        match self {
            BundleKey::Single => 0,
            BundleKey::Starter => 1,
            BundleKey::Weekend => 2,
            BundleKey::Challenge => 3,
            BundleKey::Moving => 4,
            BundleKey::Estate => 5,
        }
    }

    /// Exact, case-insensitive key lookup (`"Moving"` → `Moving`).
    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim().to_lowercase();
        BUNDLES
            .iter()
            .map(|bundle| bundle.key)
            .find(|key| key.as_str() == value)
    }
}

impl fmt::Display for BundleKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BundleDefinition {
    pub key: BundleKey,
    pub display_name: &'static str,
    pub scan_allotment: u32,
    pub validity_days: u32,
    /// Whole dollars. Informational only, never checked against the charge.
    pub base_price: u32,
    pub add_on_price: u32,
}

pub const DEFAULT_BUNDLE: BundleKey = BundleKey::Weekend;

/// Ordered by price.
static BUNDLES: [BundleDefinition; 6] = [
    BundleDefinition {
        key: BundleKey::Single,
        display_name: "Single Scan",
        scan_allotment: 1,
        validity_days: 30,
        base_price: 2,
        add_on_price: 1,
    },
    BundleDefinition {
        key: BundleKey::Starter,
        display_name: "Starter Pack",
        scan_allotment: 10,
        validity_days: 30,
        base_price: 7,
        add_on_price: 3,
    },
    BundleDefinition {
        key: BundleKey::Weekend,
        display_name: "Weekend Warrior",
        scan_allotment: 50,
        validity_days: 30,
        base_price: 17,
        add_on_price: 7,
    },
    BundleDefinition {
        key: BundleKey::Challenge,
        display_name: "Declutter Challenge",
        scan_allotment: 100,
        validity_days: 30,
        base_price: 27,
        add_on_price: 10,
    },
    BundleDefinition {
        key: BundleKey::Moving,
        display_name: "Moving Master",
        scan_allotment: 200,
        validity_days: 60,
        base_price: 37,
        add_on_price: 17,
    },
    BundleDefinition {
        key: BundleKey::Estate,
        display_name: "Estate Pro",
        scan_allotment: 1000,
        validity_days: 90,
        base_price: 97,
        add_on_price: 47,
    },
];

// Higher tiers first: a cheaper fragment must never shadow a pricier bundle.
const NAME_PRIORITY: [(&str, BundleKey); 6] = [
    ("estate", BundleKey::Estate),
    ("moving", BundleKey::Moving),
    ("challenge", BundleKey::Challenge),
    ("weekend", BundleKey::Weekend),
    ("starter", BundleKey::Starter),
    ("single", BundleKey::Single),
];

// Inclusive lower bounds in cents, highest first.
const AMOUNT_THRESHOLDS: [(i64, BundleKey); 6] = [
    (9700, BundleKey::Estate),
    (3700, BundleKey::Moving),
    (2700, BundleKey::Challenge),
    (1700, BundleKey::Weekend),
    (700, BundleKey::Starter),
    (200, BundleKey::Single),
];

pub fn all() -> &'static [BundleDefinition] {
    &BUNDLES
}

pub fn bundle(key: BundleKey) -> &'static BundleDefinition {
    &BUNDLES[key.position()]
}

pub fn default_bundle() -> &'static BundleDefinition {
    bundle(DEFAULT_BUNDLE)
}

fn match_name(hint: &str) -> Option<BundleKey> {
    let hint = hint.to_lowercase();
    NAME_PRIORITY
        .iter()
        .find(|(fragment, _)| hint.contains(fragment))
        .map(|(_, key)| *key)
}

fn match_amount(cents: i64) -> Option<BundleKey> {
    AMOUNT_THRESHOLDS
        .iter()
        .find(|(threshold, _)| cents >= *threshold)
        .map(|(_, key)| *key)
}

/// Resolve a purchase signal to its bundle.
///
/// A non-blank name hint that matches a known fragment wins over the amount.
/// A hint that matches nothing falls through to the amount thresholds, and
/// when neither says anything the default bundle is returned.
pub fn resolve(product_name_hint: Option<&str>, paid_amount_cents: Option<i64>) -> &'static BundleDefinition {
    let by_name = product_name_hint
        .map(str::trim)
        .filter(|hint| !hint.is_empty())
        .and_then(match_name);

    let key = by_name
        .or_else(|| paid_amount_cents.and_then(match_amount))
        .unwrap_or(DEFAULT_BUNDLE);

    bundle(key)
}
