//! Core domain model for the gamekeys catalog pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const CRATE_NAME: &str = "gamekeys-core";

/// Candidate record produced by scraping one product page, before it has
/// been reconciled against the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct GameDraft {
    pub title: String,
    pub image_url: String,
    pub background_image_url: String,
    pub original_price: f64,
    pub discount_price: Option<f64>,
    pub discount_percentage: String,
    pub discount_end_date: String,
    pub full_description: String,
    pub short_description: String,
    pub genres: Vec<String>,
    pub release_date: String,
    pub release_year: String,
    pub platform_support: String,
    pub sku: String,
    #[serde(rename = "voicePS5")]
    pub voice_ps5: String,
    #[serde(rename = "voicePS4")]
    pub voice_ps4: String,
    #[serde(rename = "subtitlesPS5")]
    pub subtitles_ps5: String,
    #[serde(rename = "subtitlesPS4")]
    pub subtitles_ps4: String,
    pub categories: Vec<Uuid>,
}

/// Persisted catalog entity. Ingestion owns the draft-shaped fields;
/// `is_featured`, `is_weekly_discount`, `is_bestseller` and `likes` are
/// managed by catalog administration and survive re-ingestion untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameRecord {
    pub id: Uuid,
    pub title: String,
    pub image_url: String,
    pub background_image_url: String,
    pub original_price: f64,
    pub discount_price: Option<f64>,
    pub discount_percentage: String,
    pub discount_end_date: String,
    pub full_description: String,
    pub short_description: String,
    pub genres: Vec<String>,
    pub release_date: String,
    pub release_year: String,
    pub platform_support: String,
    pub sku: String,
    #[serde(rename = "voicePS5")]
    pub voice_ps5: String,
    #[serde(rename = "voicePS4")]
    pub voice_ps4: String,
    #[serde(rename = "subtitlesPS5")]
    pub subtitles_ps5: String,
    #[serde(rename = "subtitlesPS4")]
    pub subtitles_ps4: String,
    pub is_featured: bool,
    pub is_weekly_discount: bool,
    pub is_bestseller: bool,
    pub likes: i32,
    pub categories: Vec<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl GameRecord {
    pub fn from_draft(id: Uuid, draft: GameDraft, now: DateTime<Utc>) -> Self {
        Self {
            id,
            title: draft.title,
            image_url: draft.image_url,
            background_image_url: draft.background_image_url,
            original_price: draft.original_price,
            discount_price: draft.discount_price,
            discount_percentage: draft.discount_percentage,
            discount_end_date: draft.discount_end_date,
            full_description: draft.full_description,
            short_description: draft.short_description,
            genres: draft.genres,
            release_date: draft.release_date,
            release_year: draft.release_year,
            platform_support: draft.platform_support,
            sku: draft.sku,
            voice_ps5: draft.voice_ps5,
            voice_ps4: draft.voice_ps4,
            subtitles_ps5: draft.subtitles_ps5,
            subtitles_ps4: draft.subtitles_ps4,
            is_featured: false,
            is_weekly_discount: false,
            is_bestseller: false,
            likes: 0,
            categories: draft.categories,
            created_at: now,
            updated_at: now,
        }
    }

    /// Replace every ingested field with the draft's values. Categories are
    /// replaced only when the ingestion supplied any; catalog-managed flags,
    /// likes and `created_at` are never touched.
    pub fn apply_draft(&mut self, draft: GameDraft, now: DateTime<Utc>) {
        self.title = draft.title;
        self.image_url = draft.image_url;
        self.background_image_url = draft.background_image_url;
        self.original_price = draft.original_price;
        self.discount_price = draft.discount_price;
        self.discount_percentage = draft.discount_percentage;
        self.discount_end_date = draft.discount_end_date;
        self.full_description = draft.full_description;
        self.short_description = draft.short_description;
        self.genres = draft.genres;
        self.release_date = draft.release_date;
        self.release_year = draft.release_year;
        self.platform_support = draft.platform_support;
        self.sku = draft.sku;
        self.voice_ps5 = draft.voice_ps5;
        self.voice_ps4 = draft.voice_ps4;
        self.subtitles_ps5 = draft.subtitles_ps5;
        self.subtitles_ps4 = draft.subtitles_ps4;
        if !draft.categories.is_empty() {
            self.categories = draft.categories;
        }
        self.updated_at = now;
    }
}

/// Store-wide pricing configuration. Exactly one row exists; it is created
/// lazily with defaults on first read and mutated only through the explicit
/// settings update operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreSettings {
    pub id: Uuid,
    pub exchange_rate: f64,
    pub markup_percent: f64,
    pub last_updated: DateTime<Utc>,
}

impl StoreSettings {
    pub const DEFAULT_EXCHANGE_RATE: f64 = 2.5;
    pub const DEFAULT_MARKUP_PERCENT: f64 = 50.0;

    pub fn with_defaults(id: Uuid, now: DateTime<Utc>) -> Self {
        Self {
            id,
            exchange_rate: Self::DEFAULT_EXCHANGE_RATE,
            markup_percent: Self::DEFAULT_MARKUP_PERCENT,
            last_updated: now,
        }
    }
}

/// Currency-conversion result for one price quote.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceBreakdown {
    pub uah_price: f64,
    pub exchange_rate: f64,
    pub cost_price: f64,
    pub markup_percent: f64,
    pub final_price: i64,
}

impl PriceBreakdown {
    /// `cost = uah_price * exchange_rate`, reported at two decimals;
    /// `final_price = round(cost * (1 + markup/100))` computed from full
    /// precision, rounded to a whole currency unit.
    pub fn calculate(uah_price: f64, exchange_rate: f64, markup_percent: f64) -> Self {
        let cost = uah_price * exchange_rate;
        let final_price = (cost * (1.0 + markup_percent / 100.0)).round() as i64;
        Self {
            uah_price,
            exchange_rate,
            cost_price: (cost * 100.0).round() / 100.0,
            markup_percent,
            final_price,
        }
    }
}

/// Successful per-URL entry of a bulk scrape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScrapedGame {
    pub url: String,
    pub game_id: Uuid,
    pub title: String,
}

/// Failed per-URL entry of a bulk scrape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScrapeFailure {
    pub url: String,
    pub error: String,
}

/// Per-URL result of a bulk scrape run.
#[derive(Debug, Clone, PartialEq)]
pub enum ScrapeOutcome {
    Succeeded(ScrapedGame),
    Failed(ScrapeFailure),
}

/// Aggregate view of a bulk scrape run. Partial failure is an expected
/// outcome, not an error state of the batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct BulkScrapeReport {
    pub total_processed: usize,
    pub success_count: usize,
    pub failed_count: usize,
    pub successes: Vec<ScrapedGame>,
    pub failures: Vec<ScrapeFailure>,
}

impl BulkScrapeReport {
    pub fn from_outcomes(outcomes: Vec<ScrapeOutcome>) -> Self {
        let mut report = Self::default();
        for outcome in outcomes {
            report.total_processed += 1;
            match outcome {
                ScrapeOutcome::Succeeded(entry) => {
                    report.success_count += 1;
                    report.successes.push(entry);
                }
                ScrapeOutcome::Failed(entry) => {
                    report.failed_count += 1;
                    report.failures.push(entry);
                }
            }
        }
        report
    }
}

/// Successful per-id entry of a price refresh run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceUpdate {
    pub game_id: Uuid,
    pub title: String,
    pub original_price: f64,
    pub discount_price: Option<f64>,
    pub discount_percentage: String,
}

/// Failed per-id entry of a price refresh run. `game_id` echoes the caller's
/// input verbatim so unknown and malformed ids report alike.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceRefreshFailure {
    pub game_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub error: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PriceRefreshOutcome {
    Updated(PriceUpdate),
    Failed(PriceRefreshFailure),
}

/// Aggregate view of a price refresh run.
#[derive(Debug, Clone, PartialEq, Serialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct PriceRefreshReport {
    pub total_processed: usize,
    pub success_count: usize,
    pub failed_count: usize,
    pub updated_games: Vec<PriceUpdate>,
    pub failures: Vec<PriceRefreshFailure>,
}

impl PriceRefreshReport {
    pub fn from_outcomes(outcomes: Vec<PriceRefreshOutcome>) -> Self {
        let mut report = Self::default();
        for outcome in outcomes {
            report.total_processed += 1;
            match outcome {
                PriceRefreshOutcome::Updated(entry) => {
                    report.success_count += 1;
                    report.updated_games.push(entry);
                }
                PriceRefreshOutcome::Failed(entry) => {
                    report.failed_count += 1;
                    report.failures.push(entry);
                }
            }
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn draft(title: &str, year: &str) -> GameDraft {
        GameDraft {
            title: title.to_string(),
            image_url: "https://img.example/cover.png".to_string(),
            original_price: 1999.0,
            release_year: year.to_string(),
            ..GameDraft::default()
        }
    }

    fn ts() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).single().unwrap()
    }

    #[test]
    fn price_breakdown_matches_rate_and_markup() {
        let quote = PriceBreakdown::calculate(100.0, 2.5, 50.0);
        assert_eq!(quote.cost_price, 250.0);
        assert_eq!(quote.final_price, 375);

        for (uah, markup) in [(1.0, 0.0), (19.99, 35.0), (1299.0, 50.0), (740.5, 120.0)] {
            let quote = PriceBreakdown::calculate(uah, 2.5, markup);
            let expected = (uah * 2.5 * (1.0 + markup / 100.0)).round() as i64;
            assert_eq!(quote.final_price, expected, "uah={uah} markup={markup}");
        }
    }

    #[test]
    fn zero_markup_final_price_is_rounded_cost() {
        let quote = PriceBreakdown::calculate(19.99, 2.5, 0.0);
        assert_eq!(quote.final_price, (19.99f64 * 2.5).round() as i64);
        // 19.99 * 2.5 is 49.974999... in f64, so the two-decimal cost
        // rounds down.
        assert_eq!(quote.cost_price, 49.97);
    }

    #[test]
    fn apply_draft_preserves_catalog_managed_fields() {
        let mut record = GameRecord::from_draft(Uuid::new_v4(), draft("Bloodborne", "2015"), ts());
        record.is_featured = true;
        record.is_bestseller = true;
        record.likes = 42;
        record.categories = vec![Uuid::new_v4()];
        let kept_categories = record.categories.clone();

        let mut second = draft("Bloodborne GOTY", "2015");
        second.original_price = 999.0;
        record.apply_draft(second, ts());

        assert_eq!(record.title, "Bloodborne GOTY");
        assert_eq!(record.original_price, 999.0);
        assert!(record.is_featured);
        assert!(record.is_bestseller);
        assert_eq!(record.likes, 42);
        assert_eq!(record.categories, kept_categories);
    }

    #[test]
    fn apply_draft_replaces_categories_only_when_supplied() {
        let mut record = GameRecord::from_draft(Uuid::new_v4(), draft("Returnal", "2021"), ts());
        let original = vec![Uuid::new_v4()];
        record.categories = original.clone();

        let replacement = vec![Uuid::new_v4()];
        let mut with_category = draft("Returnal", "2021");
        with_category.categories = replacement.clone();
        record.apply_draft(with_category, ts());
        assert_eq!(record.categories, replacement);

        record.apply_draft(draft("Returnal", "2021"), ts());
        assert_eq!(record.categories, replacement);
    }

    #[test]
    fn bulk_report_folds_outcomes_in_order() {
        let ok = ScrapedGame {
            url: "https://store.playstation.com/ru-ua/product/A".to_string(),
            game_id: Uuid::new_v4(),
            title: "A".to_string(),
        };
        let bad = ScrapeFailure {
            url: "https://store.playstation.com/ru-ua/product/B".to_string(),
            error: "http status 404".to_string(),
        };
        let report = BulkScrapeReport::from_outcomes(vec![
            ScrapeOutcome::Succeeded(ok.clone()),
            ScrapeOutcome::Failed(bad.clone()),
            ScrapeOutcome::Succeeded(ok.clone()),
        ]);
        assert_eq!(report.total_processed, 3);
        assert_eq!(report.success_count, 2);
        assert_eq!(report.failed_count, 1);
        assert_eq!(report.failures[0].url, bad.url);
    }

    #[test]
    fn report_serializes_with_admin_panel_field_names() {
        let report = BulkScrapeReport::from_outcomes(Vec::new());
        let json = serde_json::to_value(&report).unwrap();
        assert!(json.get("totalProcessed").is_some());
        assert!(json.get("successCount").is_some());
        assert!(json.get("failedCount").is_some());

        let quote = serde_json::to_value(PriceBreakdown::calculate(10.0, 2.5, 50.0)).unwrap();
        assert!(quote.get("uahPrice").is_some());
        assert!(quote.get("finalPrice").is_some());

        let draft = serde_json::to_value(draft("Stray", "2022")).unwrap();
        assert!(draft.get("voicePS5").is_some());
        assert!(draft.get("subtitlesPS4").is_some());
        assert!(draft.get("backgroundImageUrl").is_some());
    }
}
