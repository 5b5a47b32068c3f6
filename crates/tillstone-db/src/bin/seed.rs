//! # Seed Data Generator
//!
//! Populates a database with demo master data for development.
//!
//! ## Usage
//! ```bash
//! # 200 products (default)
//! cargo run -p tillstone-db --bin seed
//!
//! # Custom amount and database path
//! cargo run -p tillstone-db --bin seed -- --count 2000 --db ./data/tillstone.db
//! ```
//!
//! ## What Gets Seeded
//! - Built-in languages and labels (always; existing texts are kept)
//! - Location `MAIN`
//! - Units: piece, kilogram, litre, pack
//! - One category per product family
//! - `count` products with opening stock at `MAIN`
//!
//! Products are skipped when the database already has some.

use clap::Parser;
use tillstone_core::{Audit, Product, SYSTEM_USER};
use tillstone_db::{Database, DbConfig};
use uuid::Uuid;

#[derive(Debug, Parser)]
#[command(name = "seed", about = "Tillstone POS seed data generator")]
struct Args {
    /// Database file path
    #[arg(short, long, default_value = "./tillstone_dev.db")]
    db: String,

    /// Number of products to generate
    #[arg(short, long, default_value_t = 200)]
    count: usize,
}

/// Product families: (category, sku prefix, unit symbol, names).
const FAMILIES: &[(&str, &str, &str, &[&str])] = &[
    (
        "Beverages",
        "BEV",
        "pc",
        &[
            "Cola", "Lemonade", "Orange Juice", "Apple Juice", "Iced Tea", "Sparkling Water",
            "Still Water", "Energy Drink", "Ginger Ale", "Tonic Water",
        ],
    ),
    (
        "Snacks",
        "SNK",
        "pc",
        &[
            "Potato Chips", "Tortilla Chips", "Salted Pretzels", "Popcorn", "Chocolate Bar",
            "Gummy Bears", "Oat Cookies", "Rice Crackers", "Trail Mix", "Peanuts",
        ],
    ),
    (
        "Dairy",
        "DRY",
        "l",
        &[
            "Whole Milk", "Skim Milk", "Oat Milk", "Greek Yogurt", "Plain Yogurt", "Butter",
            "Cheddar", "Mozzarella", "Cream Cheese", "Sour Cream",
        ],
    ),
    (
        "Grocery",
        "GRO",
        "kg",
        &[
            "White Rice", "Brown Rice", "Spaghetti", "Penne", "Flour", "Sugar", "Salt",
            "Rolled Oats", "Lentils", "Chickpeas",
        ],
    ),
    (
        "Household",
        "HOU",
        "pk",
        &[
            "Dish Soap", "Laundry Powder", "Paper Towels", "Toilet Paper", "Trash Bags",
            "Sponges", "Glass Cleaner", "Bleach", "Hand Soap", "Matches",
        ],
    ),
];

const UNITS: &[(&str, &str)] = &[("Piece", "pc"), ("Kilogram", "kg"), ("Litre", "l"), ("Pack", "pk")];

const SIZES: &[(&str, i64)] = &[("Small", 0), ("Regular", 80), ("Large", 150), ("Family", 300)];

/// Tax rates in basis points
const TAX_RATES: &[u32] = &[0, 500, 825, 1000];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    println!("Tillstone POS Seed Data Generator");
    println!("=================================");
    println!("Database: {}", args.db);
    println!("Products: {}", args.count);
    println!();

    let db = Database::new(DbConfig::new(&args.db)).await?;
    println!("✓ Connected, migrations applied");

    let added = db.labels().seed_builtin().await?;
    println!("✓ Labels seeded ({added} new rows)");

    let location = match db.locations().get_by_code("MAIN").await? {
        Some(location) => location,
        None => db.locations().create("MAIN", "Main store", SYSTEM_USER).await?,
    };
    println!("✓ Location {}", location.code);

    let existing = db.products().count().await?;
    if existing > 0 {
        println!("⚠ Database already has {existing} products, skipping product seed.");
        println!("  Delete the database file to regenerate.");
        return Ok(());
    }

    let mut unit_ids = Vec::with_capacity(UNITS.len());
    for (name, symbol) in UNITS {
        let unit = db.units().create(name, symbol, SYSTEM_USER).await?;
        unit_ids.push((*symbol, unit.id));
    }

    println!();
    println!("Generating products...");
    let start = std::time::Instant::now();
    let mut generated = 0;

    'families: for (family_idx, (category_name, prefix, unit_symbol, names)) in FAMILIES.iter().enumerate() {
        let category = db.categories().create(category_name, None, SYSTEM_USER).await?;
        let unit_id = unit_ids
            .iter()
            .find(|(symbol, _)| symbol == unit_symbol)
            .map(|(_, id)| id.clone());

        for (name_idx, name) in names.iter().enumerate() {
            for (size_idx, (size, price_addon)) in SIZES.iter().enumerate() {
                if generated >= args.count {
                    break 'families;
                }

                let seed = family_idx * 1000 + name_idx * 10 + size_idx;
                let mut product = generate_product(prefix, name, size, *price_addon, seed);
                product.category_id = Some(category.id.clone());
                product.unit_id = unit_id.clone();

                if let Err(e) = db.products().insert(&product).await {
                    eprintln!("Failed to insert {}: {}", product.sku, e);
                    continue;
                }

                let opening = (seed % 60) as i64;
                if opening > 0 {
                    db.inventory()
                        .set_opening_stock(&product.id, &location.id, opening, None, None, SYSTEM_USER)
                        .await?;
                }

                generated += 1;
                if generated % 100 == 0 {
                    println!("  Generated {generated} products...");
                }
            }
        }
    }

    println!();
    println!("✓ Generated {generated} products in {:?}", start.elapsed());

    let hits = db.products().search("milk", 10).await?;
    println!("  Search 'milk': {} results", hits.len());

    println!();
    println!("✓ Seed complete!");
    Ok(())
}

/// Builds one demo product. Deterministic for a given `seed`.
fn generate_product(prefix: &str, name: &str, size: &str, price_addon: i64, seed: usize) -> Product {
    let short: String = name.chars().filter(|c| c.is_ascii_alphabetic()).take(3).collect();
    let sku = format!("{}-{}-{:04}", prefix, short.to_uppercase(), seed);

    // 1.99 - 9.99 plus the size addon
    let price_cents = 199 + ((seed * 17) % 800) as i64 + price_addon;
    let cost_cents = price_cents * (55 + (seed % 25) as i64) / 100;

    Product {
        id: Uuid::new_v4().to_string(),
        sku,
        barcode: Some(format!("200{:010}", seed)),
        name: format!("{name} {size}"),
        description: None,
        category_id: None,
        brand_id: None,
        unit_id: None,
        price_cents,
        cost_cents,
        tax_rate_bps: TAX_RATES[seed % TAX_RATES.len()],
        track_inventory: true,
        allow_negative_stock: false,
        reorder_level: 10,
        audit: Audit::new(SYSTEM_USER),
    }
}
