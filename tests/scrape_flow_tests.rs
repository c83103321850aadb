//! End-to-end scrape flow over scripted pages: walk, dedup, publish, export

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use pc_scraper::application::ScrapePipeline;
use pc_scraper::crawling::scripted::{ScriptedDriver, ScriptedPage};
use pc_scraper::crawling::{CategoryWalker, ExtractorSelectors, PageExtractor, ScrapeOrchestrator, StopReason};
use pc_scraper::domain::{CategoryConfig, Product};
use pc_scraper::infrastructure::config::ScraperConfig;
use pc_scraper::infrastructure::metrics::PrometheusRender;
use pc_scraper::infrastructure::queue::{ProductPublisher, QueueError};
use pc_scraper::infrastructure::{CsvExporter, ScraperMetrics};
use tokio_util::sync::CancellationToken;

#[derive(Default)]
struct CollectingPublisher {
    messages: Mutex<Vec<Vec<u8>>>,
}

#[async_trait]
impl ProductPublisher for CollectingPublisher {
    async fn publish(&self, product: &Product) -> Result<(), QueueError> {
        let payload = pc_scraper::infrastructure::queue::encode_product(product)?;
        self.messages.lock().unwrap().push(payload);
        Ok(())
    }
}

fn card(title: &str, price: &str) -> String {
    format!(
        r#"<div class="MuiCard-root MuiPaper-root"><a href="/p"><h2 class="MuiTypography-root">{title}</h2></a><div><span>{price}</span><span>à vista</span></div></div>"#
    )
}

fn listing(cards: &[String]) -> String {
    format!(r#"<!doctype html><html><body><div id="__next">{}</div></body></html>"#, cards.concat())
}

fn build(max_pages: u32, categories: Vec<CategoryConfig>, metrics: Arc<ScraperMetrics>) -> ScrapeOrchestrator {
    let settings = ScraperConfig {
        max_pages,
        ..ScraperConfig::default()
    };
    let extractor = PageExtractor::new(&ExtractorSelectors::default()).unwrap();
    ScrapeOrchestrator::new(categories, CategoryWalker::new(settings, extractor, metrics).with_seed(42))
}

#[tokio::test(start_paused = true)]
async fn two_page_limit_with_empty_second_page() {
    let gpu = CategoryConfig::new("GPU", "https://www.pichau.com.br/hardware/placa-de-video", "placa");
    let mut driver = ScriptedDriver::new()
        .with_page(
            "https://www.pichau.com.br/hardware/placa-de-video?page=1",
            ScriptedPage::new(
                "Placas de Vídeo | Pichau",
                listing(&[
                    card("Placa de Video ASUS Dual RTX 4060", "R$ 1.999,99"),
                    card("Placa de Video MSI Ventus RTX 4070", "R$Â 3.899,90"),
                    card("Placa de Video Gigabyte RX 7600", "R$ 1.649,00"),
                ]),
            ),
        )
        .with_page(
            "https://www.pichau.com.br/hardware/placa-de-video?page=2",
            ScriptedPage::new("Placas de Vídeo | Pichau", listing(&[])),
        );
    let metrics = ScraperMetrics::new();

    let report = build(2, vec![gpu], Arc::clone(&metrics))
        .run(&mut driver, &CancellationToken::new())
        .await;

    assert_eq!(report.products.len(), 3);
    assert_eq!(report.categories[0].stop_reason, StopReason::EmptyPage);
    assert_eq!(driver.visited.len(), 2);
    let brands: Vec<&str> = report.products.iter().map(|p| p.brand.as_str()).collect();
    assert_eq!(brands, vec!["ASUS", "MSI", "GIGABYTE"]);
    assert!((report.products[1].price - 3899.90).abs() < 1e-9);

    let exposition = metrics.to_prometheus();
    assert!(exposition.contains(r#"scraper_pages_processed_total{category="GPU",status="empty"} 1"#));
}

#[tokio::test(start_paused = true)]
async fn pipeline_publishes_json_and_writes_sorted_csv() {
    let categories = vec![
        CategoryConfig::new("GPU", "https://shop.test/gpu", "placa"),
        CategoryConfig::new("CPU", "https://shop.test/cpu", "processador"),
    ];
    let mut driver = ScriptedDriver::new()
        .with_page(
            "https://shop.test/gpu?page=1",
            ScriptedPage::new("GPU", listing(&[card("Placa de Video Zotac RTX 3050", "R$ 300,00")])),
        )
        .with_page(
            "https://shop.test/cpu?page=1",
            ScriptedPage::new(
                "CPU",
                listing(&[
                    card("Processador Intel Core i7", "R$ 500,00"),
                    card("Processador AMD Ryzen 5", "R$ 200,00"),
                ]),
            ),
        );
    let publisher = Arc::new(CollectingPublisher::default());
    let dir = tempfile::tempdir().unwrap();
    let mut pipeline = ScrapePipeline::new(build(1, categories, ScraperMetrics::new()), publisher.clone())
        .with_exporter(CsvExporter::new(dir.path()));

    let report = pipeline.run(&mut driver, &CancellationToken::new()).await;

    assert_eq!(report.published, 3);
    let messages = publisher.messages.lock().unwrap();
    let first: serde_json::Value = serde_json::from_slice(&messages[0]).unwrap();
    assert_eq!(first["Category"], "GPU");
    assert_eq!(first["Brand"], "ZOTAC");

    let csv_path = report.export_path.expect("csv written");
    let content = std::fs::read_to_string(csv_path).unwrap();
    let lines: Vec<&str> = content.trim_start_matches('\u{feff}').lines().collect();
    assert_eq!(lines[0], "Categoria,Marca,Título,Preço,Preço Raw,Página");
    assert!(lines[1].starts_with("CPU,AMD,"));
    assert!(lines[1].contains(",200.00,"));
    assert!(lines[2].starts_with("CPU,INTEL,"));
    assert!(lines[3].starts_with("GPU,ZOTAC,"));
}

#[tokio::test(start_paused = true)]
async fn cancellation_mid_run_keeps_collected_products() {
    let categories = vec![CategoryConfig::new("GPU", "https://shop.test/gpu", "placa")];
    let mut driver = ScriptedDriver::new();
    for page in 1..=5 {
        driver = driver.with_page(
            format!("https://shop.test/gpu?page={page}"),
            ScriptedPage::new("GPU", listing(&[card(&format!("Placa de Video #{page}"), "R$ 99,00")])),
        );
    }
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    // Fires during the wait after page 1 (idle <= 3s, wait >= 4s).
    tokio::spawn(async move {
        tokio::time::sleep(std::time::Duration::from_secs(4)).await;
        trigger.cancel();
    });

    let report = build(5, categories, ScraperMetrics::new()).run(&mut driver, &cancel).await;

    assert!(report.cancelled);
    assert_eq!(report.categories[0].stop_reason, StopReason::Cancelled);
    assert!(!report.products.is_empty());
    assert!(report.products.len() < 5);
}
