//! # Collections
//!
//! The six independent groups of entities the manager persists.
//!
//! ## Names
//! ```text
//! ┌──────────────┬──────────────────┬─────────────────┐
//! │ Variant      │ Logical name     │ SQLite table    │
//! ├──────────────┼──────────────────┼─────────────────┤
//! │ Characters   │ rpgCards         │ rpg_cards       │
//! │ Spells       │ rpgSpells        │ rpg_spells      │
//! │ Items        │ rpgItems         │ rpg_items       │
//! │ Attacks      │ rpgAttacks       │ rpg_attacks     │
//! │ Categories   │ rpgCategories    │ rpg_categories  │
//! │ Grimoires    │ rpgGrimoires     │ rpg_grimoires   │
//! └──────────────┴──────────────────┴─────────────────┘
//! ```
//!
//! The logical name is what appears as a key in snapshot documents, so it
//! must never change.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::validation::{BinaryField, PAGE_BINARY_FIELDS, TOP_LEVEL_BINARY_FIELDS};

/// A named group of entities.
///
/// Ordering follows declaration order, which is also the order collections
/// appear in exported snapshots.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS,
)]
#[ts(export)]
pub enum Collection {
    /// Character sheets.
    #[serde(rename = "rpgCards")]
    Characters,

    /// Spells and abilities.
    #[serde(rename = "rpgSpells")]
    Spells,

    /// Items and equipment.
    #[serde(rename = "rpgItems")]
    Items,

    /// Attack definitions.
    #[serde(rename = "rpgAttacks")]
    Attacks,

    /// User-defined categories.
    #[serde(rename = "rpgCategories")]
    Categories,

    /// Grimoires and journals (own an ordered list of page entries).
    #[serde(rename = "rpgGrimoires")]
    Grimoires,
}

impl Collection {
    /// Every collection, in snapshot order.
    pub const ALL: [Collection; 6] = [
        Collection::Characters,
        Collection::Spells,
        Collection::Items,
        Collection::Attacks,
        Collection::Categories,
        Collection::Grimoires,
    ];

    /// Name used as the snapshot document key.
    pub fn name(&self) -> &'static str {
        match self {
            Collection::Characters => "rpgCards",
            Collection::Spells => "rpgSpells",
            Collection::Items => "rpgItems",
            Collection::Attacks => "rpgAttacks",
            Collection::Categories => "rpgCategories",
            Collection::Grimoires => "rpgGrimoires",
        }
    }

    /// SQLite table holding this collection.
    ///
    /// Static strings only; safe to splice into SQL text.
    pub fn table_name(&self) -> &'static str {
        match self {
            Collection::Characters => "rpg_cards",
            Collection::Spells => "rpg_spells",
            Collection::Items => "rpg_items",
            Collection::Attacks => "rpg_attacks",
            Collection::Categories => "rpg_categories",
            Collection::Grimoires => "rpg_grimoires",
        }
    }

    /// Looks a collection up by its snapshot key.
    pub fn from_name(name: &str) -> Option<Collection> {
        Collection::ALL.into_iter().find(|c| c.name() == name)
    }

    /// Binary fields at the top level of an entity.
    pub fn binary_fields(&self) -> &'static [BinaryField] {
        TOP_LEVEL_BINARY_FIELDS
    }

    /// Binary fields inside each page entry, if this collection has pages.
    pub fn page_binary_fields(&self) -> Option<&'static [BinaryField]> {
        match self {
            Collection::Grimoires => Some(PAGE_BINARY_FIELDS),
            _ => None,
        }
    }
}

impl std::fmt::Display for Collection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for Collection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(collection) = Collection::from_name(s) {
            return Ok(collection);
        }
        match s.to_lowercase().as_str() {
            "characters" | "character" | "cards" | "rpg_cards" => Ok(Collection::Characters),
            "spells" | "spell" | "abilities" | "rpg_spells" => Ok(Collection::Spells),
            "items" | "item" | "rpg_items" => Ok(Collection::Items),
            "attacks" | "attack" | "rpg_attacks" => Ok(Collection::Attacks),
            "categories" | "category" | "rpg_categories" => Ok(Collection::Categories),
            "grimoires" | "grimoire" | "journals" | "rpg_grimoires" => Ok(Collection::Grimoires),
            other => Err(format!(
                "Unknown collection: '{}'. Valid options: characters, spells, items, attacks, categories, grimoires",
                other
            )),
        }
    }
}
