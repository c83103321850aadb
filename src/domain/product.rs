//! Product record and its dedup fingerprint

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::brand::classify_brand;

/// A single catalog listing as scraped from a category page.
///
/// Field names on the wire are PascalCase so queue payloads stay readable by
/// every producer and consumer generation sharing the queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Product {
    pub title: String,
    pub brand: String,
    pub price: f64,
    /// Price text as rendered by the store, trimmed.
    pub raw_price: String,
    /// 1-based listing page the card was found on.
    pub page: u32,
    pub category: String,
}

impl Product {
    /// Build a product from extracted card fields, classifying the brand from the title.
    #[must_use]
    pub fn from_listing(title: &str, price: f64, raw_price: &str, page: u32, category: &str) -> Self {
        Self {
            title: title.trim().to_string(),
            brand: classify_brand(title).to_string(),
            price,
            raw_price: raw_price.trim().to_string(),
            page,
            category: category.to_string(),
        }
    }

    #[must_use]
    pub fn fingerprint(&self) -> Fingerprint {
        Fingerprint::new(&self.title, self.price)
    }
}

/// Identity of a listing within one scrape run: trimmed title plus the price
/// rounded to cents.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint(String);

impl Fingerprint {
    #[must_use]
    pub fn new(title: &str, price: f64) -> Self {
        Self(format!("{}|{price:.2}", title.trim()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<Fingerprint> for String {
    fn from(fingerprint: Fingerprint) -> Self {
        fingerprint.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fingerprint_trims_title_and_rounds_price() {
        let fp = Fingerprint::new("  RTX 4060  ", 1999.9);
        assert_eq!(fp.as_str(), "RTX 4060|1999.90");
        assert_eq!(fp, Fingerprint::new("RTX 4060", 1999.90));
    }

    #[test]
    fn from_listing_classifies_and_trims() {
        let product = Product::from_listing(" Placa de Video ASUS RTX 4060 ", 1999.99, " R$ 1.999,99 ", 2, "GPU");
        assert_eq!(product.title, "Placa de Video ASUS RTX 4060");
        assert_eq!(product.brand, "ASUS");
        assert_eq!(product.raw_price, "R$ 1.999,99");
        assert_eq!(product.page, 2);
        assert_eq!(product.fingerprint().as_str(), "Placa de Video ASUS RTX 4060|1999.99");
    }

    #[test]
    fn serializes_with_pascal_case_keys() {
        let product = Product::from_listing("Processador AMD Ryzen 5", 799.0, "R$ 799,00", 1, "CPU");
        let json = serde_json::to_value(&product).unwrap();
        assert_eq!(json["Title"], "Processador AMD Ryzen 5");
        assert_eq!(json["Brand"], "AMD");
        assert_eq!(json["RawPrice"], "R$ 799,00");
        assert_eq!(json["Page"], 1);
        assert_eq!(json["Category"], "CPU");

        let back: Product = serde_json::from_value(json).unwrap();
        assert_eq!(back, product);
    }
}
