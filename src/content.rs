//! Content pool: the style, theme and category variety behind puzzle prompts.

use std::sync::{Arc, RwLock};

use rand::Rng;
use rand::seq::IndexedRandom;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

const SEED_STYLES: &[&str] = &[
    "watercolor",
    "oil painting",
    "pixel art",
    "isometric 3D render",
    "charcoal sketch",
    "vintage photograph",
    "paper cutout",
    "neon synthwave",
];

const SEED_THEMES: &[&str] = &[
    "a quiet harbor at dawn",
    "a bustling night market",
    "a snowy mountain village",
    "an overgrown greenhouse",
    "a desert caravan",
    "a rainy city street",
];

const SEED_CATEGORIES: &[&str] = &[
    "animals",
    "food",
    "tools",
    "nature",
    "architecture",
    "music",
    "weather",
    "transport",
];

/// One style, theme and category drawn from the pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentPick {
    /// Visual style.
    pub style: String,
    /// Scene theme.
    pub theme: String,
    /// Word category.
    pub category: String,
}

/// New entries proposed by a pool expansion.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolAdditions {
    /// Additional styles.
    #[serde(default)]
    pub styles: Vec<String>,
    /// Additional themes.
    #[serde(default)]
    pub themes: Vec<String>,
    /// Additional categories.
    #[serde(default)]
    pub categories: Vec<String>,
}

#[derive(Debug, Default)]
struct PoolLists {
    styles: Vec<String>,
    themes: Vec<String>,
    categories: Vec<String>,
}

/// Shared, growable content pool.
///
/// Clones share the same lists, so the generator sees entries added by the
/// expander.
#[derive(Debug, Clone, Default)]
pub struct ContentPool {
    lists: Arc<RwLock<PoolLists>>,
}

impl ContentPool {
    /// Creates a pool with the built-in seed entries.
    #[instrument]
    pub fn seeded() -> Self {
        let owned = |items: &[&str]| items.iter().map(|s| s.to_string()).collect();
        Self {
            lists: Arc::new(RwLock::new(PoolLists {
                styles: owned(SEED_STYLES),
                themes: owned(SEED_THEMES),
                categories: owned(SEED_CATEGORIES),
            })),
        }
    }

    /// Draws one entry from each list. Empty lists yield an empty string.
    pub fn pick<R: Rng + ?Sized>(&self, rng: &mut R) -> ContentPick {
        let lists = self.lists.read().unwrap_or_else(|e| e.into_inner());
        ContentPick {
            style: choose(&lists.styles, &mut *rng),
            theme: choose(&lists.themes, &mut *rng),
            category: choose(&lists.categories, &mut *rng),
        }
    }

    /// Adds new entries, skipping blanks and case-insensitive duplicates.
    /// Returns how many entries were added.
    #[instrument(skip(self, additions))]
    pub fn extend(&self, additions: PoolAdditions) -> usize {
        let mut lists = self.lists.write().unwrap_or_else(|e| e.into_inner());
        let added = merge(&mut lists.styles, additions.styles)
            + merge(&mut lists.themes, additions.themes)
            + merge(&mut lists.categories, additions.categories);
        info!(added, "Content pool extended");
        added
    }

    /// Current list sizes as (styles, themes, categories).
    pub fn sizes(&self) -> (usize, usize, usize) {
        let lists = self.lists.read().unwrap_or_else(|e| e.into_inner());
        (lists.styles.len(), lists.themes.len(), lists.categories.len())
    }
}

fn choose<R: Rng + ?Sized>(items: &[String], rng: &mut R) -> String {
    items.choose(rng).cloned().unwrap_or_default()
}

fn merge(existing: &mut Vec<String>, incoming: Vec<String>) -> usize {
    let mut added = 0;
    for entry in incoming {
        let entry = entry.trim().to_string();
        if entry.is_empty() || existing.iter().any(|e| e.eq_ignore_ascii_case(&entry)) {
            debug!(entry = %entry, "Skipping duplicate pool entry");
            continue;
        }
        existing.push(entry);
        added += 1;
    }
    added
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn test_pick_draws_from_seed_lists() {
        let pool = ContentPool::seeded();
        let pick = pool.pick(&mut StdRng::seed_from_u64(11));
        assert!(SEED_STYLES.contains(&pick.style.as_str()));
        assert!(SEED_THEMES.contains(&pick.theme.as_str()));
        assert!(SEED_CATEGORIES.contains(&pick.category.as_str()));
    }

    #[test]
    fn test_extend_skips_duplicates_and_blanks() {
        let pool = ContentPool::seeded();
        let before = pool.sizes();
        let added = pool.extend(PoolAdditions {
            styles: vec!["Watercolor".to_string(), "ukiyo-e print".to_string()],
            themes: vec!["  ".to_string()],
            categories: vec!["sports".to_string(), "sports".to_string()],
        });
        assert_eq!(added, 2);
        assert_eq!(pool.sizes(), (before.0 + 1, before.1, before.2 + 1));
    }

    #[test]
    fn test_clones_share_lists() {
        let pool = ContentPool::seeded();
        let clone = pool.clone();
        clone.extend(PoolAdditions {
            themes: vec!["a lighthouse in a storm".to_string()],
            ..Default::default()
        });
        assert_eq!(pool.sizes(), clone.sizes());
    }

    #[test]
    fn test_empty_pool_picks_blanks() {
        let pick = ContentPool::default().pick(&mut StdRng::seed_from_u64(0));
        assert!(pick.style.is_empty() && pick.theme.is_empty() && pick.category.is_empty());
    }
}
