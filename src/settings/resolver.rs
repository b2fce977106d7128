//! Precedence merge of stored settings under deployment overrides.
//!
//! There are exactly two tiers here: the override block wins
//! unconditionally for whitelisted keys, and the stored record is the
//! fallback for everything else. The fixed environment credential
//! identifiers in [`crate::aws`] form a third tier that exists only for
//! the credential fields.

use crate::settings::{OverrideMap, SettingsMap};

/// Merge stored settings under normalized overrides.
///
/// Every key present in `overrides` overwrites (or inserts into) the
/// stored map; all other keys keep their stored value. When the override
/// map is empty the stored map is returned unchanged, without copying.
pub fn resolve(settings: SettingsMap, overrides: &OverrideMap) -> SettingsMap {
    if overrides.is_empty() {
        return settings;
    }

    let mut merged = settings;
    for (key, value) in overrides {
        merged.insert(key.clone(), value.clone());
    }
    merged
}
