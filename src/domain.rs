//! Domain module - catalog listings and the rules applied to them
//!
//! Pure value types and functions: no I/O lives here.

pub mod brand;
pub mod category;
pub mod price;
pub mod product;
pub mod repositories;

pub use brand::{UNCLASSIFIED_BRAND, classify_brand};
pub use category::CategoryConfig;
pub use price::parse_price;
pub use product::{Fingerprint, Product};
pub use repositories::{ProductRepository, ProductStats};
