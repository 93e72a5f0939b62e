//! Filename → symbol resolution.
//!
//! Rules are tried in order; the first that matches wins:
//!
//! 1. `quant_seconds_data_<SYM>` → `<SYM>` (with the alias table applied, so
//!    `quant_seconds_data_google` → `GOOG`)
//! 2. `<sym>_2024_data` → `<sym>`
//! 3. `2024_to_april_2025_<sym>_data` → `<sym>`
//! 4. anything else → the file stem

use std::collections::HashMap;
use std::path::Path;

const SECONDS_PREFIX: &str = "quant_seconds_data_";
const YEAR_MARKER: &str = "_2024_data";
const RANGE_PREFIX: &str = "2024_to_april_2025_";
const DATA_SUFFIX: &str = "_data";

/// Derives symbol identifiers from data file names.
#[derive(Debug, Clone)]
pub struct SymbolResolver {
    aliases: HashMap<String, String>,
}

impl Default for SymbolResolver {
    fn default() -> Self {
        let mut aliases = HashMap::new();
        aliases.insert("google".to_string(), "GOOG".to_string());
        Self { aliases }
    }
}

impl SymbolResolver {
    /// Resolver with no aliases at all.
    pub fn without_aliases() -> Self {
        Self {
            aliases: HashMap::new(),
        }
    }

    /// Register an extra rename, applied to the raw name a prefix rule extracts.
    pub fn with_alias(mut self, raw: impl Into<String>, symbol: impl Into<String>) -> Self {
        self.aliases.insert(raw.into(), symbol.into());
        self
    }

    /// Symbol for `path`, or `None` when the file has no usable stem.
    pub fn resolve(&self, path: &Path) -> Option<String> {
        let stem = path.file_stem()?.to_str()?;
        if stem.is_empty() {
            return None;
        }
        let symbol = self.resolve_stem(stem);
        (!symbol.is_empty()).then_some(symbol)
    }

    fn resolve_stem(&self, stem: &str) -> String {
        if let Some(raw) = stem.strip_prefix(SECONDS_PREFIX) {
            return self.alias(raw);
        }
        if let Some(pos) = stem.find(YEAR_MARKER) {
            return self.alias(&stem[..pos]);
        }
        if let Some(rest) = stem.strip_prefix(RANGE_PREFIX) {
            let raw = rest.find(DATA_SUFFIX).map_or(rest, |pos| &rest[..pos]);
            return self.alias(raw);
        }
        stem.to_string()
    }

    fn alias(&self, raw: &str) -> String {
        self.aliases
            .get(raw)
            .cloned()
            .unwrap_or_else(|| raw.to_string())
    }
}
