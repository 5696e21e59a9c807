use std::fmt;

use chrono::{Datelike, Utc};
use rand::Rng;
use serde::Serialize;

use crate::tiers::{BundleDefinition, BundleKey};

const ALPHABET: &[u8; 36] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";
const RANDOM_LEN: usize = 6;
const ADD_ON_SUFFIX: &str = "YEAR";
const ADD_ON_VALIDITY_DAYS: u32 = 365;

/// A human-enterable code plus the entitlement terms it stands for.
///
/// Uniqueness is probabilistic; codes are checked by a person against the
/// purchase record, not used as secrets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessCode {
    pub prefix: &'static str,
    pub random_segment: String,
    pub year: i32,
    pub add_on: bool,
    pub scans: u32,
    pub days: u32,
}

impl AccessCode {
    pub fn code(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for AccessCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}-{:04}", self.prefix, self.random_segment, self.year)?;
        if self.add_on {
            write!(f, "-{ADD_ON_SUFFIX}")?;
        }
        Ok(())
    }
}

pub fn prefix(key: BundleKey) -> &'static str {
    match key {
        BundleKey::Single => "SINGLE",
        BundleKey::Starter => "STARTER",
        BundleKey::Weekend => "WEEKEND",
        BundleKey::Challenge => "CHALLENGE",
        BundleKey::Moving => "MOVING",
        BundleKey::Estate => "ESTATE",
    }
}

fn random_segment<R: Rng + ?Sized>(rng: &mut R) -> String {
    (0..RANDOM_LEN)
        .map(|_| char::from(ALPHABET[rng.gen_range(0..ALPHABET.len())]))
        .collect()
}

/// Issue a code stamped with the current UTC year.
pub fn issue<R: Rng + ?Sized>(bundle: &BundleDefinition, add_on: bool, rng: &mut R) -> AccessCode {
    issue_for_year(bundle, add_on, Utc::now().year(), rng)
}

pub fn issue_for_year<R: Rng + ?Sized>(
    bundle: &BundleDefinition,
    add_on: bool,
    year: i32,
    rng: &mut R,
) -> AccessCode {
    let days = if add_on {
        ADD_ON_VALIDITY_DAYS
    } else {
        bundle.validity_days
    };

    AccessCode {
        prefix: prefix(bundle.key),
        random_segment: random_segment(rng),
        year,
        add_on,
        scans: bundle.scan_allotment,
        days,
    }
}
