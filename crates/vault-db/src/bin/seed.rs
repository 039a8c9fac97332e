//! # Seed Data Generator
//!
//! Populates a store with sample characters, spells, items and a grimoire
//! for development.
//!
//! ## Usage
//! ```bash
//! # Seed ./rpg_vault_dev.db
//! cargo run -p vault-db --bin seed
//!
//! # Specify database path
//! cargo run -p vault-db --bin seed -- --db ./data/rpg_vault.db
//! ```
//!
//! Images are tiny generated PNG stand-ins; only the bytes matter.

use std::env;
use vault_core::{Collection, Entity, IdGenerator, Value};
use vault_db::{DbConfig, LocalStore};

/// (name, class, level)
const CHARACTERS: &[(&str, &str, i64)] = &[
    ("Aria Windrunner", "Ranger", 5),
    ("Borin Ironfist", "Fighter", 7),
    ("Celeste Dawnlight", "Cleric", 4),
    ("Dax Shadowstep", "Rogue", 6),
];

/// (name, level, school)
const SPELLS: &[(&str, i64, &str)] = &[
    ("Fire Bolt", 0, "Evocation"),
    ("Shield", 1, "Abjuration"),
    ("Misty Step", 2, "Conjuration"),
    ("Fireball", 3, "Evocation"),
];

/// (name, weight)
const ITEMS: &[(&str, f64)] = &[
    ("Hempen Rope (50 ft)", 10.0),
    ("Healing Potion", 0.5),
    ("Lantern", 2.0),
];

const CATEGORIES: &[&str] = &["Party", "Villains", "Loot"];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();

    let mut db_path = String::from("./rpg_vault_dev.db");

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = args[i + 1].clone();
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("RPG Vault Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -d, --db <PATH>    Database file path (default: ./rpg_vault_dev.db)");
                println!("  -h, --help         Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    println!("🌱 RPG Vault Seed Data Generator");
    println!("================================");
    println!("Database: {}", db_path);
    println!();

    let store = LocalStore::new(DbConfig::new(&db_path));
    store.open().await?;
    println!("✓ Store opened");

    let existing = store.count(Collection::Characters).await?;
    if existing > 0 {
        println!("⚠ Store already has {} characters", existing);
        println!("  Skipping seed to avoid duplicates.");
        println!("  Delete the database file to regenerate.");
        return Ok(());
    }

    let ids = IdGenerator::new();
    let start = std::time::Instant::now();

    let mut category_ids = Vec::new();
    for name in CATEGORIES {
        let category = Entity::new(ids.next()).with("name", *name);
        category_ids.push(store.put(Collection::Categories, &category).await?);
    }

    for (index, (name, class, level)) in CHARACTERS.iter().enumerate() {
        let card = Entity::new(ids.next())
            .with("name", *name)
            .with("class", *class)
            .with("level", *level)
            .with("categoryId", category_ids[index % category_ids.len()].as_str())
            .with_binary("image", sample_png(index as u8), "image/png");
        store.put(Collection::Characters, &card).await?;
    }

    for (name, level, school) in SPELLS {
        let spell = Entity::new(ids.next())
            .with("name", *name)
            .with("level", *level)
            .with("school", *school);
        store.put(Collection::Spells, &spell).await?;
    }

    for (index, (name, weight)) in ITEMS.iter().enumerate() {
        let item = Entity::new(ids.next())
            .with("name", *name)
            .with("weight", *weight)
            .with_binary("image", sample_png(100 + index as u8), "image/png");
        store.put(Collection::Items, &item).await?;
    }

    let attack = Entity::new(ids.next())
        .with("name", "Longsword")
        .with("damage", "1d8+3")
        .with("damageType", "slashing");
    store.put(Collection::Attacks, &attack).await?;

    let mut grimoire = Entity::new(ids.next()).with("name", "Tome of Embers");
    for (index, (name, _, _)) in SPELLS.iter().enumerate() {
        grimoire.push_page(Value::map([
            ("title", Value::from(*name)),
            ("image", Value::Bytes(sample_png(200 + index as u8))),
            ("imageMimeType", Value::from("image/png")),
        ]));
    }
    store.put(Collection::Grimoires, &grimoire).await?;

    let elapsed = start.elapsed();
    println!();
    for collection in Collection::ALL {
        println!("  {:<14} {}", collection.name(), store.count(collection).await?);
    }
    println!();
    println!("✓ Seed complete in {:?}", elapsed);

    Ok(())
}

/// PNG signature followed by a few varying bytes.
fn sample_png(seed: u8) -> Vec<u8> {
    let mut bytes = vec![0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a];
    bytes.extend((0..24u8).map(|i| i.wrapping_mul(seed).wrapping_add(seed)));
    bytes
}
