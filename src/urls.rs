use regex::Regex;
use url::Url;

/// Root domain whose subdomains get the marketplace-specific extraction path.
const MARKETPLACE_ROOT_DOMAIN: &str = "amazon.com";

/// Hosts that serve the marketplace's product imagery.
const MEDIA_CDN_DOMAINS: &[&str] = &[
    "media-amazon.com",
    "ssl-images-amazon.com",
    "images-amazon.com",
];

/// Resolves a possibly relative or protocol-relative URL against a base page URL.
///
/// Empty or malformed input yields `None` so callers can skip the candidate
/// silently instead of failing the record.
pub fn absolutize(raw: &str, base: &str) -> Option<String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Some(rest) = raw.strip_prefix("//") {
        let promoted = format!("https://{rest}");
        return Url::parse(&promoted).ok().map(|u| u.to_string());
    }

    if let Ok(parsed) = Url::parse(raw) {
        return Some(parsed.to_string());
    }

    let base = Url::parse(base).ok()?;
    base.join(raw).ok().map(|u| u.to_string())
}

pub fn host_of(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    parsed.host_str().map(|v| v.to_ascii_lowercase())
}

fn host_in_domain(host: &str, domain: &str) -> bool {
    host == domain || host.ends_with(&format!(".{domain}"))
}

/// True when the URL's hostname is the marketplace root domain or any
/// subdomain of it. Malformed input is never an error, just `false`.
pub fn is_marketplace_url(url: &str) -> bool {
    match host_of(url) {
        Some(host) => host_in_domain(&host, MARKETPLACE_ROOT_DOMAIN),
        None => false,
    }
}

/// True when the URL is hosted on the marketplace's media CDN.
pub fn is_media_cdn_url(url: &str) -> bool {
    match host_of(url) {
        Some(host) => MEDIA_CDN_DOMAINS
            .iter()
            .any(|domain| host_in_domain(&host, domain)),
        None => false,
    }
}

/// True for known tracking-beacon URLs: forensic-logging hosts, beacon
/// paths, 1x1/transparent spacer names, or a generic "pixel" keyword in the
/// path. These are never acceptable as a product image.
pub fn is_tracking_pixel_url(url: &str) -> bool {
    let beacon_re = Regex::new(
        r"(/uedata\b|/1x1[./]|/1x1$|transparent[_-]?pixel|grey[_-]?pixel|spacer\.(gif|png))",
    )
    .expect("tracking beacon regex");

    // Still-relative candidates carry their path in the raw string.
    let path = match Url::parse(url) {
        Ok(parsed) => {
            if let Some(host) = parsed.host_str() {
                if host.to_ascii_lowercase().starts_with("fls-") {
                    return true;
                }
            }
            parsed.path().to_ascii_lowercase()
        }
        Err(_) => url.to_ascii_lowercase(),
    };
    beacon_re.is_match(&path) || path.contains("pixel")
}

/// Strips path/query from a URL for log lines; invalid input gets a marker.
pub fn redact_url_for_log(value: &str) -> String {
    match Url::parse(value) {
        Ok(uri) => {
            let scheme = uri.scheme();
            let authority = uri.host_str().unwrap_or("unknown-host");
            format!("{scheme}://{authority}/...")
        }
        Err(_) => "[invalid-url]".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absolutize_resolves_relative_against_base() {
        assert_eq!(
            absolutize("/img/widget.jpg", "https://example.com/p"),
            Some("https://example.com/img/widget.jpg".to_string())
        );
        assert_eq!(
            absolutize("photos/a.png", "https://example.com/deals/today"),
            Some("https://example.com/deals/photos/a.png".to_string())
        );
    }

    #[test]
    fn absolutize_promotes_protocol_relative_to_https() {
        assert_eq!(
            absolutize("//cdn.example.com/a.jpg", "https://example.com/p"),
            Some("https://cdn.example.com/a.jpg".to_string())
        );
    }

    #[test]
    fn absolutize_passes_through_absolute_urls() {
        assert_eq!(
            absolutize("https://cdn.example.com/a.jpg", "https://example.com/p"),
            Some("https://cdn.example.com/a.jpg".to_string())
        );
    }

    #[test]
    fn absolutize_rejects_empty_and_unjoinable_input() {
        assert_eq!(absolutize("", "https://example.com"), None);
        assert_eq!(absolutize("   ", "https://example.com"), None);
        assert_eq!(absolutize("/img/a.jpg", "not a url"), None);
    }

    #[test]
    fn marketplace_detection_covers_subdomains_only() {
        assert!(is_marketplace_url("https://www.amazon.com/dp/B000"));
        assert!(is_marketplace_url("https://smile.amazon.com/dp/B000"));
        assert!(is_marketplace_url("https://amazon.com/dp/B000"));
        assert!(!is_marketplace_url("https://notamazon.com/dp/B000"));
        assert!(!is_marketplace_url("https://amazon.com.evil.example/x"));
        assert!(!is_marketplace_url("garbage"));
    }

    #[test]
    fn media_cdn_detection() {
        assert!(is_media_cdn_url("https://m.media-amazon.com/images/I/a.jpg"));
        assert!(is_media_cdn_url(
            "https://images-na.ssl-images-amazon.com/images/I/a.jpg"
        ));
        assert!(!is_media_cdn_url("https://cdn.example.com/a.jpg"));
    }

    #[test]
    fn tracking_pixel_detection() {
        assert!(is_tracking_pixel_url("https://fls-na.amazon.com/1/batch/1/OP/"));
        assert!(is_tracking_pixel_url("https://example.com/uedata/nvp"));
        assert!(is_tracking_pixel_url("https://example.com/img/1x1.gif"));
        assert!(is_tracking_pixel_url("https://example.com/t/pixel.gif"));
        assert!(is_tracking_pixel_url(
            "https://example.com/assets/transparent-pixel.png"
        ));
        assert!(!is_tracking_pixel_url("https://example.com/img/widget.jpg"));
        assert!(!is_tracking_pixel_url("not a url"));
    }
}
