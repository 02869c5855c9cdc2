use crate::{EnrichError, Result};
use std::io::Read;
use std::time::Duration;

const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/130.0.0.0 Safari/537.36";
const PAGE_ACCEPT: &str =
    "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,*/*;q=0.8";
const PAGE_ACCEPT_LANGUAGE: &str = "en-US,en;q=0.9";
const REQUEST_TIMEOUT_SECS: u64 = 25;

/// One agent per run; redirects are followed by ureq itself.
pub fn build_agent() -> ureq::Agent {
    let mut config = ureq::Agent::config_builder();
    config = config
        .http_status_as_error(false)
        .timeout_global(Some(Duration::from_secs(REQUEST_TIMEOUT_SECS)))
        .user_agent(DEFAULT_USER_AGENT);
    config.build().into()
}

/// Fetches a deal page as text. Single attempt; any non-2xx status is a
/// failure for the caller to handle at the record boundary.
pub fn fetch_html(agent: &ureq::Agent, url: &str) -> Result<String> {
    let mut response = agent
        .get(url)
        .header("Accept", PAGE_ACCEPT)
        .header("Accept-Language", PAGE_ACCEPT_LANGUAGE)
        .header("Cache-Control", "no-cache")
        .header("Pragma", "no-cache")
        .call()
        .map_err(|err| EnrichError::Network {
            url: url.to_string(),
            message: err.to_string(),
        })?;

    let status = response.status().as_u16();
    if !(200..300).contains(&status) {
        return Err(EnrichError::Http {
            status,
            url: url.to_string(),
        });
    }

    let mut body = Vec::new();
    response
        .body_mut()
        .as_reader()
        .read_to_end(&mut body)
        .map_err(|err| EnrichError::Network {
            url: url.to_string(),
            message: err.to_string(),
        })?;
    Ok(String::from_utf8_lossy(&body).into_owned())
}

/// Downloads a selected image candidate, presenting the deal page as referer.
pub fn fetch_image_bytes(agent: &ureq::Agent, url: &str, referer: &str) -> Result<Vec<u8>> {
    let mut response = agent
        .get(url)
        .header("Accept", "image/*")
        .header("Referer", referer)
        .call()
        .map_err(|err| EnrichError::Network {
            url: url.to_string(),
            message: err.to_string(),
        })?;

    let status = response.status().as_u16();
    if !(200..300).contains(&status) {
        return Err(EnrichError::Http {
            status,
            url: url.to_string(),
        });
    }

    let mut data = Vec::new();
    response
        .body_mut()
        .as_reader()
        .read_to_end(&mut data)
        .map_err(|err| EnrichError::Network {
            url: url.to_string(),
            message: err.to_string(),
        })?;
    Ok(data)
}
