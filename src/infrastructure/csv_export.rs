//! CSV export of a scrape run
//!
//! Spreadsheet-friendly snapshot written next to the queue fan-out: UTF-8
//! with a BOM so Excel picks the right encoding, Portuguese headers, rows
//! grouped by category and sorted by ascending price.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use thiserror::Error;
use tracing::info;

use crate::domain::product::Product;

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

const HEADER: [&str; 6] = ["Categoria", "Marca", "Título", "Preço", "Preço Raw", "Página"];

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("No products to export")]
    Empty,

    #[error("Failed to create export directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to create export file {path}: {source}")]
    CreateFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error while exporting: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV write error: {0}")]
    Csv(#[from] csv::Error),
}

pub struct CsvExporter {
    directory: PathBuf,
}

impl CsvExporter {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }

    /// Write `products` to a new timestamped file and return its path.
    pub fn export(&self, products: &[Product]) -> Result<PathBuf, ExportError> {
        self.export_at(products, Local::now())
    }

    pub fn export_at(&self, products: &[Product], at: DateTime<Local>) -> Result<PathBuf, ExportError> {
        if products.is_empty() {
            return Err(ExportError::Empty);
        }

        std::fs::create_dir_all(&self.directory).map_err(|source| ExportError::CreateDir {
            path: self.directory.clone(),
            source,
        })?;

        let path = self.directory.join(file_name(at));
        let file = File::create(&path).map_err(|source| ExportError::CreateFile {
            path: path.clone(),
            source,
        })?;

        write_products(BufWriter::new(file), products)?;
        info!("💾 Exported {} products to {}", products.len(), path.display());
        Ok(path)
    }

    #[must_use]
    pub fn directory(&self) -> &Path {
        &self.directory
    }
}

/// `products_YYYYmmdd_HHMMSS.csv`
#[must_use]
pub fn file_name(at: DateTime<Local>) -> String {
    format!("products_{}.csv", at.format("%Y%m%d_%H%M%S"))
}

/// Write BOM, header and one row per product, sorted by category then price.
pub fn write_products<W: Write>(mut writer: W, products: &[Product]) -> Result<(), ExportError> {
    writer.write_all(UTF8_BOM)?;

    let mut sorted: Vec<&Product> = products.iter().collect();
    sorted.sort_by(|a, b| {
        a.category
            .cmp(&b.category)
            .then_with(|| a.price.total_cmp(&b.price))
    });

    let mut csv = csv::Writer::from_writer(writer);
    csv.write_record(HEADER)?;
    for product in sorted {
        let price = format!("{:.2}", product.price);
        let page = product.page.to_string();
        csv.write_record([
            product.category.as_str(),
            product.brand.as_str(),
            product.title.as_str(),
            price.as_str(),
            product.raw_price.as_str(),
            page.as_str(),
        ])?;
    }
    csv.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn product(category: &str, title: &str, price: f64) -> Product {
        Product::from_listing(title, price, &format!("R$ {price}"), 1, category)
    }

    fn rows(bytes: &[u8]) -> Vec<Vec<String>> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .from_reader(&bytes[UTF8_BOM.len()..]);
        reader
            .records()
            .map(|r| r.unwrap().iter().map(ToString::to_string).collect())
            .collect()
    }

    #[test]
    fn rows_sorted_by_category_then_price() {
        let products = vec![
            product("GPU", "Placa X", 300.0),
            product("CPU", "Processador B", 500.0),
            product("CPU", "Processador A", 200.0),
        ];
        let mut out = Vec::new();

        write_products(&mut out, &products).unwrap();

        assert!(out.starts_with(UTF8_BOM));
        let rows = rows(&out);
        assert_eq!(rows[0], HEADER.map(String::from).to_vec());
        let order: Vec<(&str, &str)> = rows[1..].iter().map(|r| (r[0].as_str(), r[3].as_str())).collect();
        assert_eq!(order, vec![("CPU", "200.00"), ("CPU", "500.00"), ("GPU", "300.00")]);
    }

    #[test]
    fn export_writes_timestamped_file() {
        let dir = tempfile::tempdir().unwrap();
        let exporter = CsvExporter::new(dir.path().join("exports"));
        let at = Local.with_ymd_and_hms(2024, 3, 5, 14, 7, 9).unwrap();

        let path = exporter.export_at(&[product("GPU", "Placa X", 1234.5)], at).unwrap();

        assert_eq!(path.file_name().unwrap(), "products_20240305_140709.csv");
        let content = std::fs::read(&path).unwrap();
        let rows = rows(&content);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1][3], "1234.50");
        assert_eq!(rows[1][5], "1");
    }

    #[test]
    fn unusable_directory_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, b"x").unwrap();
        let exporter = CsvExporter::new(blocker.join("exports"));

        let result = exporter.export(&[product("GPU", "Placa X", 10.0)]);

        assert!(matches!(result, Err(ExportError::CreateDir { ref path, .. }) if path.ends_with("exports")));
    }

    #[test]
    fn empty_export_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let exporter = CsvExporter::new(dir.path());
        assert!(matches!(exporter.export(&[]), Err(ExportError::Empty)));
    }
}
