//! Seed a demo catalog.
//!
//! Inserts a handful of products and one collection so a fresh database has
//! something to put in a cart. Refuses to run against a non-empty catalog.

use tracing::info;

use dam_nation_api::db::{Catalog, PgStore};
use dam_nation_api::models::{NewCollection, NewProduct};
use dam_nation_core::{CurrencyCode, Price, PriceRef};

use super::{CliError, connect};

/// `(name, description, cents, price reference)` for the extra demo products.
const EXTRAS: [(&str, &str, i64, &str); 2] = [
    ("Dam Nation Hoodie", "Heavyweight pullover hoodie.", 5500, "price_demo_hoodie"),
    ("Dam Nation Sticker", "Die-cut vinyl sticker.", 300, "price_demo_sticker"),
];

fn parse_ref(value: &str) -> Result<PriceRef, CliError> {
    PriceRef::parse(value).map_err(|e| CliError::InvalidArgument(e.to_string()))
}

/// Seed the demo catalog.
///
/// # Errors
///
/// Returns an error if the catalog already has products or a write fails.
pub async fn demo_catalog(tee_price_ref: &str) -> Result<(), CliError> {
    let store = PgStore::new(connect().await?);

    if !store.list_products().await?.is_empty() {
        return Err(CliError::InvalidArgument(
            "catalog already has products; refusing to seed".to_owned(),
        ));
    }

    let mut products = vec![NewProduct {
        name: "Dam Nation Tee".to_owned(),
        description: "Classic cotton tee.".to_owned(),
        price: Price::from_cents(2500, CurrencyCode::USD),
        price_ref: parse_ref(tee_price_ref)?,
    }];
    for (name, description, cents, price_ref) in EXTRAS {
        products.push(NewProduct {
            name: name.to_owned(),
            description: description.to_owned(),
            price: Price::from_cents(cents, CurrencyCode::USD),
            price_ref: parse_ref(price_ref)?,
        });
    }

    let collection = store
        .create_collection(&NewCollection {
            name: "Merch".to_owned(),
            description: "Everything Dam Nation.".to_owned(),
        })
        .await?;

    for input in &products {
        let product = store.create_product(input).await?;
        store.add_to_collection(collection.id, product.id).await?;
        info!(product_id = %product.id, name = %product.name, "Seeded product");
    }

    info!(collection_id = %collection.id, products = products.len(), "Seeding complete!");
    Ok(())
}
