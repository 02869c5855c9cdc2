use crate::urls;
use scraper::{ElementRef, Html, Selector};
use serde_json::Value;

const META_IMAGE_SELECTORS: &[&str] = &[
    r#"meta[property="og:image"]"#,
    r#"meta[property="og:image:url"]"#,
    r#"meta[name="og:image"]"#,
    r#"meta[name="twitter:image"]"#,
    r#"meta[name="twitter:image:src"]"#,
];

const STRUCTURED_DATA_SELECTOR: &str = r#"script[type="application/ld+json"]"#;

// Marketplace product-page landmarks. The primary element is the main
// gallery image; the secondary wrapper holds it on older page layouts.
const PRIMARY_LANDMARK_SELECTOR: &str = "#landingImage";
const SECONDARY_LANDMARK_SELECTOR: &str = "#imgTagWrapperId img";
const HIRES_ATTR: &str = "data-old-hires";
const DYNAMIC_IMAGE_ATTR: &str = "data-a-dynamic-image";

/// One step of an extraction chain. Strategies are pure over the parsed
/// document; the selection policy folds a chain and stops at the first hit.
pub struct ExtractorStrategy {
    pub name: &'static str,
    run: fn(&Html, Option<&str>) -> Option<String>,
}

const MARKETPLACE_CHAIN: &[ExtractorStrategy] = &[
    ExtractorStrategy {
        name: "marketplace_landmark",
        run: run_marketplace,
    },
    ExtractorStrategy {
        name: "meta_tags",
        run: run_meta,
    },
    ExtractorStrategy {
        name: "structured_data",
        run: run_structured_data,
    },
    ExtractorStrategy {
        name: "generic_scan",
        run: run_generic,
    },
];

const GENERIC_CHAIN: &[ExtractorStrategy] = &[
    ExtractorStrategy {
        name: "meta_tags",
        run: run_meta,
    },
    ExtractorStrategy {
        name: "structured_data",
        run: run_structured_data,
    },
    ExtractorStrategy {
        name: "generic_scan",
        run: run_generic,
    },
];

fn run_meta(doc: &Html, _base: Option<&str>) -> Option<String> {
    meta_image(doc)
}

fn run_structured_data(doc: &Html, _base: Option<&str>) -> Option<String> {
    structured_data_image(doc)
}

fn run_marketplace(doc: &Html, _base: Option<&str>) -> Option<String> {
    marketplace_image(doc)
}

fn run_generic(doc: &Html, base: Option<&str>) -> Option<String> {
    generic_large_image(doc, base)
}

#[derive(Debug, Clone)]
pub struct SelectedCandidate {
    pub url: String,
    pub strategy: &'static str,
}

/// Folds the strategy chain for the page and validates the winner.
///
/// The chain is ordered by reliability; the first strategy to produce a
/// value wins and no later strategy is consulted. A winner that cannot be
/// absolutized, is inline (`data:`), or is a tracking pixel disqualifies the
/// record for this run rather than falling through to weaker strategies.
pub fn select_candidate(doc: &Html, page_url: &str) -> Option<SelectedCandidate> {
    let chain = if urls::is_marketplace_url(page_url) {
        MARKETPLACE_CHAIN
    } else {
        GENERIC_CHAIN
    };

    for strategy in chain {
        let Some(raw) = (strategy.run)(doc, Some(page_url)) else {
            continue;
        };
        let absolute = urls::absolutize(&raw, page_url)?;
        if absolute.starts_with("data:") || urls::is_tracking_pixel_url(&absolute) {
            return None;
        }
        return Some(SelectedCandidate {
            url: absolute,
            strategy: strategy.name,
        });
    }
    None
}

/// Alternate candidate for the one-shot degenerate-image fallback: a fresh
/// generic scan, absolutized against the original page URL, that must differ
/// from the rejected download and must not be a beacon.
pub fn fallback_candidate(doc: &Html, page_url: &str, original_url: &str) -> Option<String> {
    let raw = generic_large_image(doc, Some(page_url))?;
    let absolute = urls::absolutize(&raw, page_url)?;
    if absolute == original_url || urls::is_tracking_pixel_url(&absolute) {
        return None;
    }
    Some(absolute)
}

/// Open-graph / Twitter card image, in fixed priority order.
pub fn meta_image(doc: &Html) -> Option<String> {
    for raw_selector in META_IMAGE_SELECTORS {
        let selector = Selector::parse(raw_selector).expect("meta image selector");
        for tag in doc.select(&selector) {
            if let Some(content) = tag.value().attr("content") {
                let trimmed = content.trim();
                if !trimmed.is_empty() {
                    return Some(trimmed.to_string());
                }
            }
        }
    }
    None
}

/// First usable image from the page's embedded JSON-LD blocks. Blocks that
/// fail to parse or have an unexpected shape are skipped, not fatal.
pub fn structured_data_image(doc: &Html) -> Option<String> {
    let selector = Selector::parse(STRUCTURED_DATA_SELECTOR).expect("ld+json selector");
    for script in doc.select(&selector) {
        let payload = script.text().collect::<String>();
        let Ok(value) = serde_json::from_str::<Value>(&payload) else {
            continue;
        };

        let blocks: Vec<&Value> = match &value {
            Value::Array(items) => items.iter().collect(),
            other => vec![other],
        };
        for block in blocks {
            if let Some(found) = image_from_structured_block(block) {
                return Some(found);
            }
        }
    }
    None
}

fn image_from_structured_block(block: &Value) -> Option<String> {
    let obj = block.as_object()?;

    match obj.get("image") {
        Some(Value::Array(items)) => {
            if let Some(found) = items.first().and_then(structured_image_value) {
                return Some(found);
            }
        }
        Some(other) => {
            if let Some(found) = structured_image_value(other) {
                return Some(found);
            }
        }
        None => {}
    }

    if let Some(offer_image) = obj
        .get("offers")
        .and_then(|offers| offers.get("image"))
        .and_then(structured_image_value)
    {
        return Some(offer_image);
    }

    None
}

// An image value in structured data is either a bare URL string or an
// ImageObject carrying the URL in its `url` field.
fn structured_image_value(value: &Value) -> Option<String> {
    let raw = match value {
        Value::String(s) => s.as_str(),
        Value::Object(obj) => obj.get("url").and_then(|v| v.as_str())?,
        _ => return None,
    };
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    Some(trimmed.to_string())
}

/// Broad scan over every image element: `src`, each `srcset` entry's URL
/// portion, and the keys of any packed size-keyed image map. Candidates are
/// absolutized against `base` when one is given, then filtered; a media-CDN
/// host wins over earlier survivors, otherwise scan order decides.
pub fn generic_large_image(doc: &Html, base: Option<&str>) -> Option<String> {
    let selector = Selector::parse("img").expect("img selector");

    let mut survivors: Vec<String> = Vec::new();
    let mut push_candidate = |raw: &str| {
        let raw = raw.trim();
        if raw.is_empty() || raw.starts_with("data:") {
            return;
        }
        let resolved = match base {
            Some(base_url) => match urls::absolutize(raw, base_url) {
                Some(v) => v,
                None => return,
            },
            None => raw.to_string(),
        };
        if resolved.starts_with("data:") || urls::is_tracking_pixel_url(&resolved) {
            return;
        }
        if !survivors.iter().any(|existing| existing == &resolved) {
            survivors.push(resolved);
        }
    };

    for img in doc.select(&selector) {
        if let Some(src) = img.value().attr("src") {
            push_candidate(src);
        }
        if let Some(srcset) = img.value().attr("srcset") {
            for entry in srcset.split(',') {
                if let Some(candidate_url) = entry.trim().split_whitespace().next() {
                    push_candidate(candidate_url);
                }
            }
        }
        if let Some(packed) = img.value().attr(DYNAMIC_IMAGE_ATTR) {
            for key in dynamic_image_urls(packed) {
                push_candidate(&key);
            }
        }
    }

    if let Some(cdn_hosted) = survivors.iter().find(|u| urls::is_media_cdn_url(u)) {
        return Some(cdn_hosted.clone());
    }
    survivors.into_iter().next()
}

/// Marketplace-specific landmarks, strongest first, falling back to the
/// generic scan (unabsolutized; the selection policy absolutizes the winner).
pub fn marketplace_image(doc: &Html) -> Option<String> {
    let primary = Selector::parse(PRIMARY_LANDMARK_SELECTOR).expect("primary landmark selector");
    if let Some(found) = doc.select(&primary).next().and_then(|el| landmark_image_url(&el)) {
        return Some(found);
    }

    let secondary =
        Selector::parse(SECONDARY_LANDMARK_SELECTOR).expect("secondary landmark selector");
    if let Some(found) = doc
        .select(&secondary)
        .next()
        .and_then(|el| landmark_image_url(&el))
    {
        return Some(found);
    }

    generic_large_image(doc, None)
}

fn landmark_image_url(el: &ElementRef<'_>) -> Option<String> {
    if let Some(hires) = el.value().attr(HIRES_ATTR) {
        let trimmed = hires.trim();
        if !trimmed.is_empty() {
            return Some(trimmed.to_string());
        }
    }

    if let Some(src) = el.value().attr("src") {
        let trimmed = src.trim();
        // Lazy-loading layouts put an inline placeholder in src and the real
        // URLs in the packed map.
        if !trimmed.is_empty() && !trimmed.starts_with("data:") {
            return Some(trimmed.to_string());
        }
    }

    el.value()
        .attr(DYNAMIC_IMAGE_ATTR)
        .and_then(largest_dynamic_image_url)
}

/// Largest-area URL from a packed size-keyed image map: a JSON object of
/// `url -> [width, height]`. Malformed JSON yields `None`; malformed entries
/// are ignored; ties keep the earlier entry.
pub fn largest_dynamic_image_url(raw_json: &str) -> Option<String> {
    let value: Value = serde_json::from_str(raw_json).ok()?;
    let map = value.as_object()?;

    let mut best: Option<(String, f64)> = None;
    for (candidate_url, dims) in map {
        let Some(items) = dims.as_array() else {
            continue;
        };
        let (Some(width), Some(height)) = (
            items.first().and_then(|v| v.as_f64()),
            items.get(1).and_then(|v| v.as_f64()),
        ) else {
            continue;
        };
        let area = width * height;
        let better = match &best {
            None => true,
            Some((_, best_area)) => area > *best_area,
        };
        if better {
            best = Some((candidate_url.clone(), area));
        }
    }
    best.map(|(url, _)| url)
}

fn dynamic_image_urls(raw_json: &str) -> Vec<String> {
    let Ok(value) = serde_json::from_str::<Value>(raw_json) else {
        return Vec::new();
    };
    let Some(map) = value.as_object() else {
        return Vec::new();
    };
    map.keys().cloned().collect()
}
