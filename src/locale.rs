// Locale dictionaries for user-visible text.
//
// Display text is looked up through the `LocaleProvider` trait so components
// never reach into a module-level singleton; the store is handed to them at
// construction.

use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

pub const DEFAULT_LOCALE: &str = "est";

/// Keys whose values are transient "work in progress" placeholders. A locale
/// switch can leave one of these behind in a result box, so consumers need the
/// full cross-locale set to recognize and clear stale values.
const PROGRESS_KEYS: [&str; 3] = ["cancelling", "transcribing_wait", "summarizing_wait"];

/// Known even when no locale table loaded at all.
const PROGRESS_FALLBACKS: [&str; 6] = [
    "Cancelling...",
    "Transcribing...",
    "Summarizing...",
    "Katkestan...",
    "Transkribeerin...",
    "Loon kokkuvõtet...",
];

pub trait LocaleProvider: Send + Sync {
    /// Text for `key` in the active locale. Missing keys echo the key itself
    /// so an untranslated label is visible instead of blank.
    fn text(&self, key: &str) -> String;

    /// Every known in-progress placeholder phrase across all loaded locales.
    fn progress_phrases(&self) -> Vec<String>;
}

pub struct LocaleStore {
    tables: BTreeMap<String, HashMap<String, String>>,
    active: RwLock<String>,
}

impl LocaleStore {
    /// Store with the built-in dictionaries (Estonian default, English).
    pub fn bundled() -> Self {
        let mut tables = BTreeMap::new();
        for (lang, raw) in [
            ("eng", include_str!("../assets/locales/eng.json")),
            ("est", include_str!("../assets/locales/est.json")),
        ] {
            match serde_json::from_str::<HashMap<String, String>>(raw) {
                Ok(table) => {
                    tables.insert(lang.to_string(), table);
                }
                Err(e) => {
                    tracing::error!("Bundled locale '{}' failed to parse: {}", lang, e);
                }
            }
        }
        Self {
            tables,
            active: RwLock::new(DEFAULT_LOCALE.to_string()),
        }
    }

    pub fn active(&self) -> String {
        self.active.read().map(|l| l.clone()).unwrap_or_else(|_| DEFAULT_LOCALE.to_string())
    }

    /// Switch the active locale. Unknown locales are ignored and the current
    /// one stays in effect.
    pub fn set_active(&self, lang: &str) -> bool {
        if !self.tables.contains_key(lang) {
            tracing::warn!("Unknown locale '{}' requested, keeping '{}'", lang, self.active());
            return false;
        }
        if let Ok(mut active) = self.active.write() {
            *active = lang.to_string();
        }
        true
    }

    pub fn available(&self) -> Vec<String> {
        self.tables.keys().cloned().collect()
    }
}

impl LocaleProvider for LocaleStore {
    fn text(&self, key: &str) -> String {
        let lang = self.active();
        self.tables
            .get(&lang)
            .and_then(|table| table.get(key))
            .cloned()
            .unwrap_or_else(|| key.to_string())
    }

    fn progress_phrases(&self) -> Vec<String> {
        let mut phrases: Vec<String> = PROGRESS_FALLBACKS.iter().map(|s| s.to_string()).collect();
        for table in self.tables.values() {
            for key in PROGRESS_KEYS {
                if let Some(value) = table.get(key) {
                    if !phrases.iter().any(|p| p == value) {
                        phrases.push(value.clone());
                    }
                }
            }
        }
        phrases
    }
}
