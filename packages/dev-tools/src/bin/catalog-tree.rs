//! Catalog tree inspector
//!
//! Opens the store selected by the `CATALOG_*` environment variables and
//! prints every category tree with depth indentation.
//!
//! # Usage
//!
//! ```bash
//! # Inspect the default database (./data/catalog.db)
//! cargo run --bin catalog-tree
//!
//! # Seed a small demo catalog first, then print it
//! cargo run --bin catalog-tree -- --seed-demo
//!
//! # Audit the nested-set invariants of every tree
//! CATALOG_DATABASE_PATH=/tmp/catalog.db cargo run --bin catalog-tree -- --verify
//! ```

use catalog_core::config::StoreConfig;
use catalog_core::models::{Category, CategoryId, CategoryName};
use catalog_core::services::CategoryRepository;
use std::env;

const DEMO_CATALOG: &[(&str, &str, &str, Option<&str>)] = &[
    ("Food", "shipin", "food", None),
    ("Fruit", "shuiguo", "fruit", Some("Food")),
    ("Apples", "pingguo", "apple", Some("Fruit")),
    ("Citrus", "ganju", "citrus", Some("Fruit")),
    ("Dairy", "ruzhipin", "dairy", Some("Food")),
    ("Household", "jiaju", "home", None),
    ("Cleaning", "qingjie", "clean", Some("Household")),
];

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("catalog_core=info")),
        )
        .init();

    let args: Vec<String> = env::args().skip(1).collect();
    let seed_demo = args.iter().any(|a| a == "--seed-demo");
    let verify = args.iter().any(|a| a == "--verify");

    let config = StoreConfig::from_env()?;
    tracing::info!(
        "Store: {} ({})",
        config.backend,
        config.database_path.display()
    );
    let repository = CategoryRepository::from_config(&config).await?;

    if seed_demo {
        seed(&repository).await?;
    }

    for root in repository.root().await? {
        if root.is_undefined() {
            println!("{:>6}  {} (undefined)", root.id, root.name.name);
            continue;
        }

        print_line(&root, 0);
        for category in repository.descendants(root.id).await? {
            let depth = repository.depth(category.id).await?.unwrap_or(0);
            print_line(&category, depth);
        }

        if verify {
            match repository.verify(root.id).await {
                Ok(()) => println!("        tree {} ok", root.id),
                Err(e) => println!("        tree {} FAILED: {}", root.id, e),
            }
        }
    }

    Ok(())
}

fn print_line(category: &Category, depth: usize) {
    println!(
        "{:>6}  {}{} [{}]",
        category.id,
        "  ".repeat(depth),
        category.name.name,
        category.name.alias
    );
}

async fn seed(repository: &CategoryRepository) -> anyhow::Result<()> {
    let mut created: Vec<(&str, CategoryId)> = Vec::new();

    for (name, mnemonic, alias, parent) in DEMO_CATALOG {
        let id = repository.next_identity().await?;
        let parent_id = match parent {
            Some(parent) => created
                .iter()
                .find(|(n, _)| n == parent)
                .map(|(_, id)| *id)
                .ok_or_else(|| anyhow::anyhow!("Demo parent '{}' not seeded yet", parent))?,
            None => id,
        };

        repository
            .save(Category::new(
                id,
                parent_id,
                CategoryName::new(*name, *mnemonic, *alias),
            ))
            .await?;
        created.push((*name, id));
    }

    tracing::info!("Seeded {} demo categories", created.len());
    Ok(())
}
