//! The event-type table shared by every component.
//!
//! Base codes (`other`, `product`, `category`, `search`) are fixed. All other
//! names are deployment extensions: they ship with defaults and can be
//! remapped or extended through `SHOPLYTICS_EVENT_TYPES` without touching
//! the engine. Components look codes up by name, never by literal.

use std::collections::BTreeMap;

use crate::error::CoreError;

pub const OTHER: &str = "other";
pub const PRODUCT: &str = "product";
pub const CATEGORY: &str = "category";
pub const SEARCH: &str = "search";

pub const REGISTER: &str = "register";
pub const SIGN: &str = "sign";
pub const FIRST_VIEWED_PAGE: &str = "first_viewed_page";
pub const POPUP_SHOW: &str = "popup_show";
pub const POPUP_CLICK: &str = "popup_click";
pub const VOUCHER: &str = "voucher";
pub const CART_PRODUCT_ADD: &str = "cart_product_add";
pub const CART_PRODUCT_UPDATE: &str = "cart_product_update";
pub const RECOMMENDATION_SHOW: &str = "recommendation_show";
pub const RECOMMENDATION_CLICK: &str = "recommendation_click";

const BASE: &[(&str, i32)] = &[(OTHER, 0), (PRODUCT, 1), (CATEGORY, 2), (SEARCH, 3)];

const DEFAULT_EXTENSIONS: &[(&str, i32)] = &[
    (REGISTER, 4),
    (SIGN, 5),
    (FIRST_VIEWED_PAGE, 6),
    (POPUP_SHOW, 7),
    (POPUP_CLICK, 8),
    (VOUCHER, 9),
    (CART_PRODUCT_ADD, 10),
    (CART_PRODUCT_UPDATE, 11),
    (RECOMMENDATION_SHOW, 12),
    (RECOMMENDATION_CLICK, 13),
];

/// Page-like events whose dwell time is closed out by the next one.
const VIEWABLE_CONTENT: &[&str] = &[OTHER, PRODUCT, CATEGORY];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventTypes {
    by_name: BTreeMap<String, i32>,
}

impl Default for EventTypes {
    fn default() -> Self {
        let by_name = BASE
            .iter()
            .chain(DEFAULT_EXTENSIONS)
            .map(|(name, code)| (name.to_string(), *code))
            .collect();
        Self { by_name }
    }
}

impl EventTypes {
    /// Apply a `name=code,name=code` override list on top of the defaults.
    ///
    /// Base names cannot be remapped, and no two names may share a code.
    pub fn with_overrides(raw: &str) -> Result<Self, CoreError> {
        let mut table = Self::default();
        for entry in raw.split(',').map(str::trim).filter(|e| !e.is_empty()) {
            let (name, code) = entry
                .split_once('=')
                .ok_or_else(|| CoreError::InvalidEventTypeEntry(entry.to_string()))?;
            let name = name.trim().to_ascii_lowercase();
            let code: i32 = code
                .trim()
                .parse()
                .map_err(|_| CoreError::InvalidEventTypeEntry(entry.to_string()))?;
            if name.is_empty() || code < 0 || BASE.iter().any(|(base, _)| *base == name) {
                return Err(CoreError::InvalidEventTypeEntry(entry.to_string()));
            }
            table.by_name.insert(name, code);
        }
        table.check_unique_codes()?;
        Ok(table)
    }

    fn check_unique_codes(&self) -> Result<(), CoreError> {
        let mut seen: BTreeMap<i32, &str> = BTreeMap::new();
        for (name, code) in &self.by_name {
            if let Some(first) = seen.insert(*code, name) {
                return Err(CoreError::DuplicateEventTypeCode {
                    code: *code,
                    first: first.to_string(),
                    second: name.clone(),
                });
            }
        }
        Ok(())
    }

    pub fn code(&self, name: &str) -> Option<i32> {
        self.by_name.get(name).copied()
    }

    pub fn is_known(&self, code: i32) -> bool {
        self.by_name.values().any(|c| *c == code)
    }

    /// Returns `true` when `code` is configured under `name`.
    pub fn is(&self, code: i32, name: &str) -> bool {
        self.code(name) == Some(code)
    }

    pub fn viewable_content(&self) -> Vec<i32> {
        VIEWABLE_CONTENT
            .iter()
            .filter_map(|name| self.code(name))
            .collect()
    }

    pub fn is_viewable_content(&self, code: i32) -> bool {
        self.viewable_content().contains(&code)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, i32)> {
        self.by_name.iter().map(|(name, code)| (name.as_str(), *code))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_cover_base_and_extensions() {
        let types = EventTypes::default();
        assert_eq!(types.code(PRODUCT), Some(1));
        assert_eq!(types.code(REGISTER), Some(4));
        assert_eq!(types.code(SIGN), Some(5));
        assert!(types.is_known(0));
        assert!(!types.is_known(99));
    }

    #[test]
    fn viewable_content_is_other_product_category() {
        let types = EventTypes::default();
        let mut codes = types.viewable_content();
        codes.sort_unstable();
        assert_eq!(codes, vec![0, 1, 2]);
        assert!(!types.is_viewable_content(3));
    }

    #[test]
    fn overrides_remap_and_extend() {
        let types = EventTypes::with_overrides("register=40, wishlist=41").expect("parse");
        assert_eq!(types.code(REGISTER), Some(40));
        assert_eq!(types.code("wishlist"), Some(41));
        assert!(!types.is_known(4));
    }

    #[test]
    fn overrides_cannot_remap_base_codes() {
        let err = EventTypes::with_overrides("product=7").expect_err("base is fixed");
        assert!(matches!(err, CoreError::InvalidEventTypeEntry(_)));
    }

    #[test]
    fn overrides_reject_shared_codes() {
        let err = EventTypes::with_overrides("register=5").expect_err("sign already uses 5");
        assert!(matches!(err, CoreError::DuplicateEventTypeCode { code: 5, .. }));
    }

    #[test]
    fn overrides_reject_malformed_entries() {
        assert!(EventTypes::with_overrides("register").is_err());
        assert!(EventTypes::with_overrides("register=abc").is_err());
        assert!(EventTypes::with_overrides("register=-1").is_err());
        assert!(EventTypes::with_overrides("").is_ok());
    }
}
