//! Render options: the typed keys the engine understands plus free-form extras.

use qweb_expr::{Map, Value};
use serde::{Deserialize, Serialize};

/// Option keys that change the compiled output and therefore partition the cache.
pub const CACHE_KEYS: &[&str] = &[
    "lang",
    "inherit_branding",
    "inherit_branding_auto",
    "editable",
    "translatable",
    "edit_translations",
];

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderOptions {
    pub lang: Option<String>,
    pub inherit_branding: bool,
    pub inherit_branding_auto: bool,
    pub editable: bool,
    pub translatable: bool,
    pub edit_translations: bool,
    /// Enables `t-debug`. Checked at render time, so not part of the cache key.
    pub dev_mode: bool,
    /// Anything else, e.g. keys merged in by `t-call-options`.
    #[serde(skip)]
    pub extra: Map,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    lang: Option<String>,
    inherit_branding: bool,
    inherit_branding_auto: bool,
    editable: bool,
    translatable: bool,
    edit_translations: bool,
}

impl RenderOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_lang(mut self, lang: impl Into<String>) -> Self {
        self.lang = Some(lang.into());
        self
    }

    /// Builds options from a JSON object; unknown keys land in `extra`.
    pub fn from_json(json: serde_json::Value) -> Self {
        let mut options = Self::default();
        if let Value::Map(map) = Value::from(json) {
            options.merge(&map);
        }
        options
    }

    pub fn cache_key(&self) -> CacheKey {
        CacheKey {
            lang: self.lang.clone(),
            inherit_branding: self.inherit_branding,
            inherit_branding_auto: self.inherit_branding_auto,
            editable: self.editable,
            translatable: self.translatable,
            edit_translations: self.edit_translations,
        }
    }

    /// Overlays `entries` onto these options in place.
    pub fn merge(&mut self, entries: &Map) {
        for (key, value) in entries {
            match key.as_str() {
                "lang" => {
                    self.lang = match value {
                        Value::Str(s) => Some(s.clone()),
                        _ => None,
                    }
                }
                "inherit_branding" => self.inherit_branding = value.truthy(),
                "inherit_branding_auto" => self.inherit_branding_auto = value.truthy(),
                "editable" => self.editable = value.truthy(),
                "translatable" => self.translatable = value.truthy(),
                "edit_translations" => self.edit_translations = value.truthy(),
                "dev_mode" => self.dev_mode = value.truthy(),
                _ => {
                    self.extra.insert(key.clone(), value.clone());
                }
            }
        }
    }

    /// A copy of these options with `entries` merged in.
    pub fn merged(&self, entries: &Map) -> RenderOptions {
        let mut copy = self.clone();
        copy.merge(entries);
        copy
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_cache_key_ignores_non_cache_options() {
        let base = RenderOptions::new().with_lang("fr_FR");
        let mut other = base.clone();
        other.dev_mode = true;
        other.extra.insert("foo".into(), Value::Int(1));
        assert_eq!(base.cache_key(), other.cache_key());

        let translated = base.clone().with_lang("de_DE");
        assert_ne!(base.cache_key(), translated.cache_key());
    }

    #[test]
    fn test_from_json_splits_known_and_extra_keys() {
        let options = RenderOptions::from_json(json!({
            "lang": "nl_NL",
            "inherit_branding": 1,
            "company": "ACME",
        }));
        assert_eq!(options.lang.as_deref(), Some("nl_NL"));
        assert!(options.inherit_branding);
        assert_eq!(options.extra.get("company"), Some(&Value::str("ACME")));
    }

    #[test]
    fn test_merged_leaves_original_untouched() {
        let base = RenderOptions::new();
        let mut extra = Map::new();
        extra.insert("editable".into(), Value::Bool(true));
        let merged = base.merged(&extra);
        assert!(merged.editable);
        assert!(!base.editable);
    }

    #[test]
    fn test_deserializes_typed_subset() {
        let options: RenderOptions =
            serde_json::from_value(json!({"lang": "en_US", "dev_mode": true})).unwrap();
        assert!(options.dev_mode);
        assert!(options.extra.is_empty());
    }
}
