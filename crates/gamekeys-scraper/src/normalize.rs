//! Pure normalizers turning raw page text into canonical field values.
//!
//! Malformed storefront markup is expected here, not exceptional. Every
//! function is total: it returns a best-effort value, an empty value, or
//! passes its input through unchanged, and the record builder decides
//! which fields are allowed to stay empty.

use url::Url;

/// Width forced onto every product image URL.
pub const TARGET_IMAGE_WIDTH: &str = "1920";

const OFFER_END_PREFIXES: [&str; 2] = ["Предложение заканчивается ", "Offer ends "];
const DISCOUNT_PREFIXES: [&str; 2] = ["Сэкономьте ", "Save "];

/// Console generations a product page claims to support.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlatformSupport {
    pub ps4: bool,
    pub ps5: bool,
}

impl PlatformSupport {
    /// Reads the release-information platform row. A bare "PS4" listing
    /// still runs on PS5 through backward compatibility, and a page with
    /// no platform row at all is assumed to run on both.
    pub fn infer(platform_text: &str) -> Self {
        let text = platform_text.trim();
        if text.is_empty() {
            return Self { ps4: true, ps5: true };
        }
        let ps4 = text.contains("PS4");
        let ps5 = text.contains("PS5") || ps4;
        Self { ps4, ps5 }
    }

    /// Joined label in the storefront's display order, PS5 first.
    pub fn label(&self) -> String {
        let mut parts = Vec::new();
        if self.ps5 {
            parts.push("PS5");
        }
        if self.ps4 {
            parts.push("PS4");
        }
        parts.join(", ")
    }
}

/// Strips everything but digits and separators, normalizes the decimal
/// comma, and parses: `"1 049,40 UAH"` -> `Some(1049.4)`.
pub fn parse_price(raw: &str) -> Option<f64> {
    let cleaned: String = raw
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == ',')
        .collect();
    if cleaned.is_empty() {
        return None;
    }
    cleaned.replace(',', ".").parse::<f64>().ok()
}

/// Resolves the offer's `(list, discounted)` price pair. A missing
/// discount cell falls back to the list price, a missing list cell falls
/// back to the discount cell, and `None` only when neither parses.
pub fn resolve_prices(original_raw: &str, discount_raw: &str) -> Option<(f64, f64)> {
    match (parse_price(original_raw), parse_price(discount_raw)) {
        (Some(original), Some(discount)) => Some((original, discount)),
        (Some(original), None) => Some((original, original)),
        (None, Some(discount)) => Some((discount, discount)),
        (None, None) => None,
    }
}

/// Strips the localized "offer ends" phrase and rewrites the remainder
/// from `"4.4.2025 10:59 PM UTC"` to `"04.04.2025 22:59 GMT+3"`. The
/// store renders the label already shifted to Kyiv time, so only the
/// shape changes. Input that does not match the expected shape passes
/// through unchanged.
pub fn discount_end_date(raw: &str) -> String {
    format_offer_end(strip_known_prefix(raw.trim(), &OFFER_END_PREFIXES))
}

fn format_offer_end(raw: &str) -> String {
    if raw.is_empty() {
        return String::new();
    }
    let mut parts = raw.split_whitespace();
    let (Some(date), Some(time), Some(meridiem)) = (parts.next(), parts.next(), parts.next())
    else {
        return raw.to_string();
    };

    let mut dmy = date.split('.');
    let (Some(day), Some(month), Some(year)) = (
        parse_component(dmy.next()),
        parse_component(dmy.next()),
        parse_component(dmy.next()),
    ) else {
        return raw.to_string();
    };

    let mut hm = time.split(':');
    let (Some(mut hours), Some(minutes)) = (parse_component(hm.next()), parse_component(hm.next()))
    else {
        return raw.to_string();
    };

    if meridiem.eq_ignore_ascii_case("pm") && hours < 12 {
        hours += 12;
    } else if meridiem.eq_ignore_ascii_case("am") && hours == 12 {
        hours = 0;
    }

    format!("{day:02}.{month:02}.{year} {hours:02}:{minutes:02} GMT+3")
}

fn parse_component(part: Option<&str>) -> Option<u32> {
    part.and_then(|p| p.parse().ok())
}

/// `"25.12.2024"` -> `"2024"`. Anything that does not split into exactly
/// three dot-separated parts yields the empty string.
pub fn release_year(release_date: &str) -> String {
    let parts: Vec<&str> = release_date.split('.').collect();
    match parts.as_slice() {
        [_, _, year] => year.trim().to_string(),
        _ => String::new(),
    }
}

/// Trims the localized "save" phrase off the discount label, leaving the
/// percentage: `"Сэкономьте 40%"` -> `"40%"`.
pub fn discount_label(raw: &str) -> String {
    strip_known_prefix(raw.trim(), &DISCOUNT_PREFIXES)
        .trim()
        .to_string()
}

/// Storefront listing blurb: the first 300 characters of the overview.
pub fn short_description(full: &str) -> String {
    full.chars().take(300).collect()
}

/// Forces the `w` query parameter to [`TARGET_IMAGE_WIDTH`], appending it
/// when absent and replacing it when present. Other query parameters
/// survive. Non-parseable URLs get the parameter appended textually.
pub fn force_width(image_url: &str) -> String {
    let Ok(mut url) = Url::parse(image_url) else {
        return if image_url.contains('?') {
            format!("{image_url}&w={TARGET_IMAGE_WIDTH}")
        } else {
            format!("{image_url}?w={TARGET_IMAGE_WIDTH}")
        };
    };
    let kept: Vec<(String, String)> = url
        .query_pairs()
        .map(|(name, value)| (name.into_owned(), value.into_owned()))
        .filter(|(name, _)| name != "w")
        .collect();
    {
        let mut editor = url.query_pairs_mut();
        editor.clear();
        for (name, value) in &kept {
            editor.append_pair(name, value);
        }
        editor.append_pair("w", TARGET_IMAGE_WIDTH);
    }
    url.to_string()
}

fn strip_known_prefix<'a>(text: &'a str, prefixes: &[&str]) -> &'a str {
    for prefix in prefixes {
        if let Some(rest) = text.strip_prefix(prefix) {
            return rest;
        }
    }
    text
}
