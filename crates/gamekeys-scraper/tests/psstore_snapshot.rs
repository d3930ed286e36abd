//! Golden snapshot of a captured ru-ua product page. If the storefront
//! markup drifts, re-capture the fixture and review the snapshot diff.

use std::fs;
use std::path::{Path, PathBuf};

use gamekeys_core::GameDraft;
use gamekeys_scraper::{scrape_offer, scrape_page};

fn sample_dir() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("../../fixtures/psstore/sample")
}

fn fixture_html() -> String {
    fs::read_to_string(sample_dir().join("product.html")).expect("read fixture page")
}

#[test]
fn captured_page_scrapes_to_golden_snapshot() {
    let expected: GameDraft = serde_json::from_str(
        &fs::read_to_string(sample_dir().join("snapshot.json")).expect("read snapshot"),
    )
    .expect("parse snapshot");

    let draft = scrape_page(&fixture_html()).expect("scrape fixture page");
    assert_eq!(draft, expected);
}

#[test]
fn offer_extraction_sees_the_same_price_cells() {
    let offer = scrape_offer(&fixture_html()).expect("extract offer");
    assert_eq!(offer.final_price, "1 049,40 UAH");
    assert_eq!(offer.original_price, "1 749 UAH");
    assert_eq!(offer.discount_info, "Сэкономьте 40%");
    assert_eq!(
        offer.discount_descriptor,
        "Предложение заканчивается 4.4.2025 10:59 PM UTC"
    );
}
