use crate::catalog::{self, DealRecord};
use crate::{extract, fetch, normalize, urls, EnrichError, Result};
use scraper::Html;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::PathBuf;
use std::thread;
use std::time::Duration;

const DEFAULT_DELAY_MS: u64 = 1_000;
const MAX_DELAY_MS: u64 = 10_000;
const DEFAULT_PUBLIC_PREFIX: &str = "/images";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrichRequest {
    pub catalog_path: PathBuf,
    pub images_dir: PathBuf,
    /// Site-root-relative prefix recorded into each enriched record.
    pub public_prefix: String,
    /// Pause after each successful record, to go easy on the source sites.
    pub delay_ms: u64,
    /// Optional cap on how many records one run may process.
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrichSummary {
    pub records_total: usize,
    pub records_scanned: usize,
    pub enriched: usize,
    pub skipped_no_candidate: usize,
    pub failed: usize,
    pub catalog_rewritten: bool,
    pub catalog_path: String,
    pub images_dir: String,
}

pub fn build_enrich_request(
    catalog_path: PathBuf,
    images_dir: PathBuf,
    public_prefix: Option<String>,
    delay_ms: Option<u64>,
    limit: Option<usize>,
) -> Result<EnrichRequest> {
    if catalog_path.as_os_str().is_empty() {
        return Err(EnrichError::InvalidRequest(
            "catalog path cannot be empty".to_string(),
        ));
    }
    if images_dir.as_os_str().is_empty() {
        return Err(EnrichError::InvalidRequest(
            "images dir cannot be empty".to_string(),
        ));
    }

    Ok(EnrichRequest {
        catalog_path,
        images_dir,
        public_prefix: normalize_public_prefix(public_prefix.as_deref()),
        delay_ms: delay_ms.unwrap_or(DEFAULT_DELAY_MS).min(MAX_DELAY_MS),
        limit,
    })
}

fn normalize_public_prefix(value: Option<&str>) -> String {
    let trimmed = value.unwrap_or("").trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return DEFAULT_PUBLIC_PREFIX.to_string();
    }
    if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{trimmed}")
    }
}

fn public_image_path(prefix: &str, file_stem: &str) -> String {
    format!("{prefix}/{file_stem}.{}", normalize::OUTPUT_EXTENSION)
}

fn record_file_stem(id: &str) -> Result<String> {
    let raw = id.trim();
    let mut out = String::with_capacity(raw.len());
    for ch in raw.chars() {
        if ch.is_ascii_alphanumeric() || ch == '-' || ch == '_' || ch == '.' {
            out.push(ch);
        } else {
            out.push('_');
        }
    }
    let trimmed = out.trim_matches(|ch| ch == '.' || ch == '_').to_string();
    if trimmed.is_empty() {
        return Err(EnrichError::InvalidRequest(format!(
            "record id {id:?} does not produce a usable file name"
        )));
    }
    if trimmed == raw {
        return Ok(trimmed);
    }
    // Sanitization can map distinct ids onto the same name ("a/b" and
    // "a_b"), so an altered id gets a digest suffix to keep one file per
    // record.
    let digest = hex::encode(Sha256::digest(raw.as_bytes()));
    Ok(format!("{trimmed}_{}", &digest[..8]))
}

struct EnrichedImage {
    public_path: String,
    candidate_url: String,
    strategy: &'static str,
    used_fallback: bool,
}

/// Sweeps the catalog once: every record still lacking an image gets the
/// full fetch/extract/validate/normalize treatment inside its own failure
/// boundary. The catalog file is rewritten at most once, at the end, and
/// only if something actually changed.
pub fn run_catalog_enrich<FLog>(request: &EnrichRequest, mut log_line: FLog) -> Result<EnrichSummary>
where
    FLog: FnMut(&str, &str, serde_json::Value) -> Result<()>,
{
    let mut records = catalog::load_catalog(&request.catalog_path)?;
    std::fs::create_dir_all(&request.images_dir)?;

    let agent = fetch::build_agent();

    let records_total = records.len();
    let mut scanned = 0_usize;
    let mut enriched = 0_usize;
    let mut skipped = 0_usize;
    let mut failed = 0_usize;
    let mut changed = false;

    for record in records.iter_mut() {
        if !catalog::needs_image(record) {
            continue;
        }
        if let Some(limit) = request.limit {
            if scanned >= limit {
                break;
            }
        }
        scanned += 1;

        match enrich_record(&agent, record, request, &mut log_line) {
            Ok(done) => {
                record.image = Some(done.public_path.clone());
                let alt_missing = record
                    .image_alt
                    .as_deref()
                    .map(str::trim)
                    .unwrap_or("")
                    .is_empty();
                if alt_missing {
                    record.image_alt = Some(record.title.clone());
                }
                changed = true;
                enriched += 1;
                log_line(
                    "info",
                    "record_enriched",
                    serde_json::json!({
                        "id": record.id,
                        "image": done.public_path,
                        "candidate": urls::redact_url_for_log(&done.candidate_url),
                        "strategy": done.strategy,
                        "used_fallback": done.used_fallback,
                    }),
                )?;
                if request.delay_ms > 0 {
                    thread::sleep(Duration::from_millis(request.delay_ms));
                }
            }
            Err(EnrichError::NoCandidate { url }) => {
                skipped += 1;
                log_line(
                    "warn",
                    "no_candidate",
                    serde_json::json!({
                        "id": record.id,
                        "url": urls::redact_url_for_log(&url),
                    }),
                )?;
            }
            Err(err) => {
                failed += 1;
                log_line(
                    "warn",
                    "record_failed",
                    serde_json::json!({
                        "id": record.id,
                        "error": err.to_string(),
                    }),
                )?;
            }
        }
    }

    if changed {
        catalog::save_catalog(&request.catalog_path, &records)?;
        log_line(
            "info",
            "catalog_rewritten",
            serde_json::json!({
                "path": request.catalog_path.to_string_lossy(),
                "enriched": enriched,
            }),
        )?;
    }

    Ok(EnrichSummary {
        records_total,
        records_scanned: scanned,
        enriched,
        skipped_no_candidate: skipped,
        failed,
        catalog_rewritten: changed,
        catalog_path: request.catalog_path.to_string_lossy().to_string(),
        images_dir: request.images_dir.to_string_lossy().to_string(),
    })
}

fn enrich_record<FLog>(
    agent: &ureq::Agent,
    record: &DealRecord,
    request: &EnrichRequest,
    log_line: &mut FLog,
) -> Result<EnrichedImage>
where
    FLog: FnMut(&str, &str, serde_json::Value) -> Result<()>,
{
    let page_url = record.url.trim();
    let file_stem = record_file_stem(&record.id)?;

    let html = fetch::fetch_html(agent, page_url)?;
    let doc = Html::parse_document(&html);

    let selected = extract::select_candidate(&doc, page_url).ok_or_else(|| {
        EnrichError::NoCandidate {
            url: page_url.to_string(),
        }
    })?;
    log_line(
        "info",
        "candidate_selected",
        serde_json::json!({
            "id": record.id,
            "candidate": urls::redact_url_for_log(&selected.url),
            "strategy": selected.strategy,
        }),
    )?;

    let mut bytes = fetch::fetch_image_bytes(agent, &selected.url, page_url)?;
    let mut used_fallback = false;

    let dimensions = normalize::probe_dimensions(&bytes);
    if normalize::is_degenerate(dimensions) {
        // One fallback round only: a broader generic scan, absolutized
        // against the page URL. The second download's quality is accepted
        // as-is.
        if let Some(alternate) = extract::fallback_candidate(&doc, page_url, &selected.url) {
            log_line(
                "info",
                "image_degenerate_retry",
                serde_json::json!({
                    "id": record.id,
                    "rejected": urls::redact_url_for_log(&selected.url),
                    "dimensions": dimensions.map(|(w, h)| format!("{w}x{h}")),
                    "alternate": urls::redact_url_for_log(&alternate),
                }),
            )?;
            bytes = fetch::fetch_image_bytes(agent, &alternate, page_url).map_err(|_| {
                EnrichError::DegenerateImage {
                    url: selected.url.clone(),
                }
            })?;
            used_fallback = true;
        }
    }

    let normalized = normalize::normalize_to_square(&bytes)?;
    let out_path = request
        .images_dir
        .join(format!("{file_stem}.{}", normalize::OUTPUT_EXTENSION));
    std::fs::write(&out_path, &normalized)?;

    Ok(EnrichedImage {
        public_path: public_image_path(&request.public_prefix, &file_stem),
        candidate_url: selected.url,
        strategy: selected.strategy,
        used_fallback,
    })
}
