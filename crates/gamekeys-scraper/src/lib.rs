//! PlayStation Store product-page extraction.
//!
//! Every logical field is read through an ordered selector chain: the
//! primary locator first, then fallbacks for older page revisions, first
//! non-empty match wins. Optional fields come back empty instead of
//! erroring; the draft builder rejects the page only when a mandatory
//! field is still missing after the whole chain.

pub mod normalize;

use scraper::{Html, Selector};
use serde_json::Value as JsonValue;
use thiserror::Error;

use gamekeys_core::GameDraft;

use crate::normalize::{force_width, PlatformSupport};

pub const CRATE_NAME: &str = "gamekeys-scraper";

const TITLE_SELECTORS: [&str; 2] = ["h1.psw-m-b-5", r#"[data-qa="mfe-game-title#name"]"#];

// Offer cells are scoped to the CTA stack first so that a second offer
// rendered elsewhere on the page (bundles, add-ons) cannot shadow the
// main one.
const FINAL_PRICE_SELECTORS: [&str; 2] = [
    r#".psw-fill-x.psw-l-stack-left [data-qa="mfeCtaMain#offer0#finalPrice"]"#,
    r#"[data-qa="mfeCtaMain#offer0#finalPrice"]"#,
];
const ORIGINAL_PRICE_SELECTORS: [&str; 2] = [
    r#".psw-fill-x.psw-l-stack-left [data-qa="mfeCtaMain#offer0#originalPrice"]"#,
    r#"[data-qa="mfeCtaMain#offer0#originalPrice"]"#,
];
const DISCOUNT_INFO_SELECTORS: [&str; 2] = [
    r#".psw-fill-x.psw-l-stack-left [data-qa="mfeCtaMain#offer0#discountInfo"]"#,
    r#"[data-qa="mfeCtaMain#offer0#discountInfo"]"#,
];
const DISCOUNT_DESCRIPTOR_SELECTORS: [&str; 2] = [
    r#".psw-fill-x.psw-l-stack-left [data-qa="mfeCtaMain#offer0#discountDescriptor"]"#,
    r#"[data-qa="mfeCtaMain#offer0#discountDescriptor"]"#,
];

const DESCRIPTION_SELECTORS: [&str; 1] = [r#"[data-qa="mfe-game-overview#description"]"#];
const PLATFORM_SELECTORS: [&str; 1] =
    [r#"[data-qa="gameInfo#releaseInformation#platform-value"]"#];
const RELEASE_DATE_SELECTORS: [&str; 1] =
    [r#"[data-qa="gameInfo#releaseInformation#releaseDate-value"]"#];

const GENRE_VALUE_SELECTOR: &str = r#"[data-qa="gameInfo#releaseInformation#genre-value"]"#;
const GENRE_SPAN_SELECTOR: &str =
    r#"[data-qa="gameInfo#releaseInformation#genre-value"] span[style="text-transform: capitalize;"]"#;

const VOICE_SELECTOR: &str = r#"[data-qa="gameInfo#releaseInformation#voice-value"]"#;
const SUBTITLES_SELECTOR: &str = r#"[data-qa="gameInfo#releaseInformation#subtitles-value"]"#;
const LEGACY_VOICE_PS5_SELECTOR: &str =
    r#"[data-qa="gameInfo#releaseInformation#ps5Voice-value"]"#;
const LEGACY_VOICE_PS4_SELECTOR: &str =
    r#"[data-qa="gameInfo#releaseInformation#ps4Voice-value"]"#;
const LEGACY_SUBTITLES_PS5_SELECTOR: &str =
    r#"[data-qa="gameInfo#releaseInformation#ps5Subtitles-value"]"#;
const LEGACY_SUBTITLES_PS4_SELECTOR: &str =
    r#"[data-qa="gameInfo#releaseInformation#ps4Subtitles-value"]"#;

const HERO_IMAGE_SELECTOR: &str = r#"img[data-qa="gameBackgroundImage#heroImage#image"]"#;
const BACKGROUND_FALLBACK_SELECTORS: [&str; 4] = [
    "img.psw-fill-x.psw-l-fit-contain",
    "img.psw-image.psw-fill-x.psw-l-fit-contain",
    "img.psw-l-fit-cover",
    "img.psw-right-top-third",
];
const COVER_IMAGE_SELECTORS: [&str; 2] = [
    "img.psw-fill-x.psw-l-fit-contain",
    "img.psw-image.psw-fill-x.psw-l-fit-contain",
];

const PRODUCT_JSON_SELECTOR: &str = r#"script[type="application/ld+json"]"#;

#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("invalid selector {selector:?}: {message}")]
    Selector {
        selector: &'static str,
        message: String,
    },
    #[error("{0} not found on page")]
    MissingField(&'static str),
    #[error("no parseable price on page")]
    UnparseablePrice,
}

/// Raw text of the page's primary offer block, before normalization.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OfferBlock {
    pub final_price: String,
    pub original_price: String,
    pub discount_info: String,
    pub discount_descriptor: String,
}

/// Voice and subtitle rows, filled only for supported platforms.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LanguageSupport {
    pub voice_ps5: String,
    pub voice_ps4: String,
    pub subtitles_ps5: String,
    pub subtitles_ps4: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct ProductMetadata {
    sku: String,
    image: String,
}

/// Parses raw page HTML and assembles the draft in one step.
pub fn scrape_page(html: &str) -> Result<GameDraft, ScrapeError> {
    build_draft(&Html::parse_document(html))
}

/// Parses raw page HTML and pulls only the offer block, for price
/// refreshes that leave the rest of the record alone.
pub fn scrape_offer(html: &str) -> Result<OfferBlock, ScrapeError> {
    extract_offer(&Html::parse_document(html))
}

/// Assembles the canonical draft for one product page.
///
/// A page with no title, no resolvable price, or no derivable image is
/// rejected whole rather than stored partially filled.
pub fn build_draft(document: &Html) -> Result<GameDraft, ScrapeError> {
    let title =
        first_text(document, &TITLE_SELECTORS)?.ok_or(ScrapeError::MissingField("game title"))?;

    let offer = extract_offer(document)?;
    let (original_price, discount_price) =
        normalize::resolve_prices(&offer.original_price, &offer.final_price)
            .ok_or(ScrapeError::UnparseablePrice)?;

    let full_description = first_text(document, &DESCRIPTION_SELECTORS)?.unwrap_or_default();

    let platform_text = first_text(document, &PLATFORM_SELECTORS)?.unwrap_or_default();
    let platforms = PlatformSupport::infer(&platform_text);
    let languages = extract_language_support(document, platforms)?;

    let release_date = first_text(document, &RELEASE_DATE_SELECTORS)?.unwrap_or_default();

    let metadata = extract_product_metadata(document)?;
    let image_url = if !metadata.sku.is_empty() {
        chihiro_image_url(&metadata.sku)
    } else if !metadata.image.is_empty() {
        metadata.image.clone()
    } else {
        first_attr(document, &COVER_IMAGE_SELECTORS, "src")?.unwrap_or_default()
    };
    if image_url.is_empty() {
        return Err(ScrapeError::MissingField("game image"));
    }

    Ok(GameDraft {
        title,
        image_url,
        background_image_url: extract_background_image(document)?,
        original_price,
        discount_price: Some(discount_price),
        discount_percentage: normalize::discount_label(&offer.discount_info),
        discount_end_date: normalize::discount_end_date(&offer.discount_descriptor),
        short_description: normalize::short_description(&full_description),
        full_description,
        genres: extract_genres(document)?,
        release_year: normalize::release_year(&release_date),
        release_date,
        platform_support: platforms.label(),
        sku: metadata.sku,
        voice_ps5: languages.voice_ps5,
        voice_ps4: languages.voice_ps4,
        subtitles_ps5: languages.subtitles_ps5,
        subtitles_ps4: languages.subtitles_ps4,
        categories: Vec::new(),
    })
}

pub fn extract_offer(document: &Html) -> Result<OfferBlock, ScrapeError> {
    Ok(OfferBlock {
        final_price: first_text(document, &FINAL_PRICE_SELECTORS)?.unwrap_or_default(),
        original_price: first_text(document, &ORIGINAL_PRICE_SELECTORS)?.unwrap_or_default(),
        discount_info: first_text(document, &DISCOUNT_INFO_SELECTORS)?.unwrap_or_default(),
        discount_descriptor: first_text(document, &DISCOUNT_DESCRIPTOR_SELECTORS)?
            .unwrap_or_default(),
    })
}

/// Store image endpoint keyed by SKU, sized for the catalog grid.
pub fn chihiro_image_url(sku: &str) -> String {
    format!(
        "https://store.playstation.com/store/api/chihiro/00_09_000/container/UA/ru/99/{sku}/0/image?_version=00_09_000&platform=chihiro&bg_color=000000&opacity=100&w=336&h=336"
    )
}

fn extract_language_support(
    document: &Html,
    platforms: PlatformSupport,
) -> Result<LanguageSupport, ScrapeError> {
    let mut languages = LanguageSupport::default();

    if let Some(voice) = first_text(document, &[VOICE_SELECTOR])? {
        if platforms.ps5 {
            languages.voice_ps5 = voice.clone();
        }
        if platforms.ps4 {
            languages.voice_ps4 = voice;
        }
    }
    if let Some(subtitles) = first_text(document, &[SUBTITLES_SELECTOR])? {
        if platforms.ps5 {
            languages.subtitles_ps5 = subtitles.clone();
        }
        if platforms.ps4 {
            languages.subtitles_ps4 = subtitles;
        }
    }

    // Older page revisions render one row per platform instead.
    if platforms.ps5 && languages.voice_ps5.is_empty() {
        languages.voice_ps5 =
            first_text(document, &[LEGACY_VOICE_PS5_SELECTOR])?.unwrap_or_default();
    }
    if platforms.ps4 && languages.voice_ps4.is_empty() {
        languages.voice_ps4 =
            first_text(document, &[LEGACY_VOICE_PS4_SELECTOR])?.unwrap_or_default();
    }
    if platforms.ps5 && languages.subtitles_ps5.is_empty() {
        languages.subtitles_ps5 =
            first_text(document, &[LEGACY_SUBTITLES_PS5_SELECTOR])?.unwrap_or_default();
    }
    if platforms.ps4 && languages.subtitles_ps4.is_empty() {
        languages.subtitles_ps4 =
            first_text(document, &[LEGACY_SUBTITLES_PS4_SELECTOR])?.unwrap_or_default();
    }

    Ok(languages)
}

fn extract_background_image(document: &Html) -> Result<String, ScrapeError> {
    if let Some(src) = first_attr(document, &[HERO_IMAGE_SELECTOR], "src")? {
        return Ok(force_width(&src));
    }
    if let Some(srcset) = first_attr(document, &[HERO_IMAGE_SELECTOR], "srcset")? {
        if let Some(candidate) = pick_srcset_candidate(&srcset) {
            return Ok(force_width(&candidate));
        }
    }
    for selector in BACKGROUND_FALLBACK_SELECTORS {
        if let Some(src) = first_attr(document, &[selector], "src")? {
            return Ok(force_width(&src));
        }
        if let Some(srcset) = first_attr(document, &[selector], "srcset")? {
            if let Some(candidate) = pick_srcset_candidate(&srcset) {
                return Ok(force_width(&candidate));
            }
        }
    }
    Ok(String::new())
}

/// Picks from `url descriptor, url descriptor, ...` the candidate already
/// rendered at the target width, else the first one.
fn pick_srcset_candidate(srcset: &str) -> Option<String> {
    let marker = format!("w={}", normalize::TARGET_IMAGE_WIDTH);
    let mut first = None;
    for part in srcset.split(',') {
        let Some(url) = part.split_whitespace().next() else {
            continue;
        };
        if url.contains(&marker) {
            return Some(url.to_string());
        }
        if first.is_none() {
            first = Some(url.to_string());
        }
    }
    first
}

fn extract_genres(document: &Html) -> Result<Vec<String>, ScrapeError> {
    let mut genres = all_texts(document, GENRE_SPAN_SELECTOR)?;
    if genres.is_empty() {
        if let Some(text) = first_text(document, &[GENRE_VALUE_SELECTOR])? {
            genres = text
                .split(',')
                .filter_map(|genre| text_or_none(genre.to_string()))
                .collect();
        }
    }
    Ok(genres)
}

// First structured-data block that parses wins; unparseable ones are
// skipped instead of aborting the page.
fn extract_product_metadata(document: &Html) -> Result<ProductMetadata, ScrapeError> {
    let sel = parse_selector(PRODUCT_JSON_SELECTOR)?;
    for script in document.select(&sel) {
        let raw = script.text().collect::<String>();
        if let Ok(metadata) = serde_json::from_str::<JsonValue>(&raw) {
            // The store has shipped both `sku` and `productID`, and `image`
            // as either a string or an array of renditions.
            let sku = metadata
                .get("sku")
                .or_else(|| metadata.get("productID"))
                .and_then(JsonValue::as_str)
                .unwrap_or_default()
                .to_string();
            let image = match metadata.get("image") {
                Some(JsonValue::String(url)) => url.clone(),
                Some(JsonValue::Array(urls)) => urls
                    .first()
                    .and_then(JsonValue::as_str)
                    .unwrap_or_default()
                    .to_string(),
                _ => String::new(),
            };
            return Ok(ProductMetadata { sku, image });
        }
    }
    Ok(ProductMetadata::default())
}

fn parse_selector(selector: &'static str) -> Result<Selector, ScrapeError> {
    Selector::parse(selector).map_err(|e| ScrapeError::Selector {
        selector,
        message: e.to_string(),
    })
}

fn text_or_none(value: String) -> Option<String> {
    let trimmed = value.trim().to_string();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed)
    }
}

/// First non-empty text across an ordered selector chain.
fn first_text(document: &Html, selectors: &[&'static str]) -> Result<Option<String>, ScrapeError> {
    for selector in selectors {
        let sel = parse_selector(selector)?;
        if let Some(text) = document
            .select(&sel)
            .next()
            .and_then(|n| text_or_none(n.text().collect::<String>()))
        {
            return Ok(Some(text));
        }
    }
    Ok(None)
}

/// First non-empty attribute value across an ordered selector chain.
fn first_attr(
    document: &Html,
    selectors: &[&'static str],
    attr: &str,
) -> Result<Option<String>, ScrapeError> {
    for selector in selectors {
        let sel = parse_selector(selector)?;
        if let Some(value) = document
            .select(&sel)
            .next()
            .and_then(|n| n.value().attr(attr))
            .and_then(|s| text_or_none(s.to_string()))
        {
            return Ok(Some(value));
        }
    }
    Ok(None)
}

fn all_texts(document: &Html, selector: &'static str) -> Result<Vec<String>, ScrapeError> {
    let sel = parse_selector(selector)?;
    Ok(document
        .select(&sel)
        .filter_map(|n| text_or_none(n.text().collect::<String>()))
        .collect())
}
