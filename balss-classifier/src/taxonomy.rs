//! Category taxonomy validation and alias mapping
//!
//! Every category value that enters or leaves the classifier goes through
//! [`Taxonomy::validate_and_map`]. The function is total: unknown values map
//! to the catch-all slug and are logged, never rejected.
//!
//! Aliases are data. The table is checked once when a [`Taxonomy`] is built,
//! so an alias pointing outside the official set fails construction instead
//! of silently degrading at runtime.

use balss_common::db::DEFAULT_CATEGORIES;
use once_cell::sync::Lazy;
use std::collections::{HashMap, HashSet};
use thiserror::Error;
use tracing::{debug, warn};

/// Catch-all slug for anything the taxonomy does not recognise
pub const CATCH_ALL_SLUG: &str = "other";

/// Synonyms seen from users and from the AI service
const DEFAULT_ALIASES: &[(&str, &str)] = &[
    ("spices", "condiments"),
    ("garšvielas", "condiments"),
    ("seasonings", "condiments"),
    ("herbs", "condiments"),
    ("unknown", "other"),
    ("vegetable", "vegetables"),
    ("dārzeņi", "vegetables"),
    ("fruit", "fruits"),
    ("augļi", "fruits"),
    ("drink", "beverages"),
    ("drinks", "beverages"),
    ("dzērieni", "beverages"),
    ("alkohols", "alcohol"),
    ("wine", "alcohol"),
    ("beer", "alcohol"),
    ("spirits", "alcohol"),
    ("bread", "bakery"),
    ("maize", "bakery"),
    ("sweets", "snacks"),
    ("candy", "snacks"),
    ("saldumi", "snacks"),
    ("milk", "dairy"),
    ("piena produkti", "dairy"),
    ("egg", "eggs"),
    ("olas", "eggs"),
    ("pets", "pet"),
    ("mājdzīvniekiem", "pet"),
    ("cosmetics", "hygiene"),
    ("cleaning", "household"),
    ("cereals", "grains"),
    ("seafood", "fish"),
    ("frozen", "ready_meals"),
    ("ready meals", "ready_meals"),
];

static BUILTIN: Lazy<Taxonomy> = Lazy::new(|| {
    Taxonomy::new(
        DEFAULT_CATEGORIES.iter().map(|(slug, ..)| *slug),
        DEFAULT_ALIASES,
    )
    .expect("built-in taxonomy is consistent")
});

/// Problems detected while building a taxonomy
#[derive(Debug, Error, PartialEq)]
pub enum TaxonomyError {
    #[error("Alias '{alias}' maps to '{target}', which is not an official slug")]
    UnknownAliasTarget { alias: String, target: String },

    #[error("Alias '{0}' shadows an official slug")]
    AliasShadowsSlug(String),

    #[error("Alias '{0}' is defined more than once")]
    DuplicateAlias(String),

    #[error("Official slugs must include the catch-all 'other'")]
    MissingCatchAll,
}

/// Official category slugs plus a validated alias table
#[derive(Debug, Clone)]
pub struct Taxonomy {
    official: HashSet<String>,
    aliases: HashMap<String, String>,
}

impl Taxonomy {
    /// Build a taxonomy, rejecting inconsistent alias tables
    pub fn new<'a>(
        official: impl IntoIterator<Item = &'a str>,
        aliases: &[(&str, &str)],
    ) -> Result<Self, TaxonomyError> {
        let official: HashSet<String> = official
            .into_iter()
            .map(|slug| slug.trim().to_lowercase())
            .collect();

        if !official.contains(CATCH_ALL_SLUG) {
            return Err(TaxonomyError::MissingCatchAll);
        }

        let mut table = HashMap::with_capacity(aliases.len());
        for (alias, target) in aliases {
            let alias = alias.trim().to_lowercase();
            let target = target.trim().to_lowercase();

            if official.contains(&alias) {
                return Err(TaxonomyError::AliasShadowsSlug(alias));
            }
            if !official.contains(&target) {
                return Err(TaxonomyError::UnknownAliasTarget { alias, target });
            }
            if table.insert(alias.clone(), target).is_some() {
                return Err(TaxonomyError::DuplicateAlias(alias));
            }
        }

        Ok(Self {
            official,
            aliases: table,
        })
    }

    /// Shared built-in taxonomy
    pub fn builtin() -> &'static Taxonomy {
        &BUILTIN
    }

    pub fn is_official(&self, slug: &str) -> bool {
        self.official.contains(slug)
    }

    /// Official slugs in no particular order
    pub fn slugs(&self) -> impl Iterator<Item = &str> {
        self.official.iter().map(String::as_str)
    }

    /// Canonicalize a category value to an official slug
    ///
    /// 1. lowercase + trim
    /// 2. official slug → unchanged
    /// 3. alias → mapped slug (debug note)
    /// 4. anything else → catch-all (warning)
    pub fn validate_and_map<'a>(&'a self, raw: &str) -> &'a str {
        let candidate = raw.trim().to_lowercase();

        if let Some(slug) = self.official.get(&candidate) {
            return slug;
        }

        if let Some(mapped) = self.aliases.get(&candidate) {
            debug!(raw = %raw, mapped = %mapped, "Mapped category alias");
            return mapped;
        }

        warn!(raw = %raw, "Unrecognized category, using '{}'", CATCH_ALL_SLUG);
        self.official
            .get(CATCH_ALL_SLUG)
            .map(String::as_str)
            .unwrap_or(CATCH_ALL_SLUG)
    }
}

/// Validate against the built-in taxonomy
pub fn validate_and_map_category(raw: &str) -> &'static str {
    Taxonomy::builtin().validate_and_map(raw)
}
