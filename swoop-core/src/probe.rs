use reqwest::{header, Client};
use tracing::debug;

use crate::error::DownloadError;

/// What the capability probe learned about the resource.
#[derive(Debug, Clone)]
pub struct ResourceDescriptor {
    /// Total byte length, 0 when the server did not report one.
    pub total_size: u64,
    /// Resolved file name for the final artifact.
    pub file_name: String,
    /// Whether the server serves arbitrary byte subranges.
    pub accepts_ranges: bool,
}

/// Issues one streaming GET and reads only its headers: total size from
/// `Content-Length`, range capability from `Accept-Ranges`, and a file name
/// unless the caller supplied one. The body is never read; dropping the
/// response closes the stream, and chunk fetches open their own.
pub async fn probe(
    client: &Client,
    url: &str,
    extra_headers: &header::HeaderMap,
    file_name_override: Option<&str>,
) -> Result<ResourceDescriptor, DownloadError> {
    let response = client
        .get(url)
        .headers(extra_headers.clone())
        .send()
        .await
        .map_err(|e| DownloadError::SourceUnavailable(e.to_string()))?;

    let headers = response.headers();

    let total_size = headers
        .get(header::CONTENT_LENGTH)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse::<u64>().ok())
        .unwrap_or(0);

    // A server advertising ranges for an unknown length is useless for
    // planning, so both have to hold.
    let accepts_ranges = total_size > 0
        && headers
            .get(header::ACCEPT_RANGES)
            .and_then(|value| value.to_str().ok())
            .map(|value| value.to_lowercase().contains("bytes"))
            .unwrap_or(false);

    let file_name = match file_name_override {
        Some(name) => name.to_string(),
        None => file_name_from_disposition(headers)
            .or_else(|| file_name_from_url(url))
            .ok_or_else(|| {
                DownloadError::SourceUnavailable(format!(
                    "no file name in response headers or in url {url}"
                ))
            })?,
    };

    debug!(total_size, accepts_ranges, file_name = %file_name, "probed resource");

    Ok(ResourceDescriptor {
        total_size,
        file_name,
        accepts_ranges,
    })
}

/// Pulls a `filename=` value out of a Content-Disposition style header.
fn file_name_from_disposition(headers: &header::HeaderMap) -> Option<String> {
    let value = headers
        .get(header::CONTENT_DISPOSITION)?
        .to_str()
        .ok()?
        .trim();
    let key_at = value.to_lowercase().find("filename")?;
    let eq_at = key_at + value[key_at..].find('=')?;
    let name = value[eq_at + 1..].trim().trim_matches('"').trim();
    (!name.is_empty()).then(|| name.to_string())
}

/// Falls back to the last path segment of the url, query string stripped.
fn file_name_from_url(url: &str) -> Option<String> {
    let slash_at = url.rfind('/')?;
    let mut name = &url[slash_at + 1..];
    if let Some(query_at) = name.find('?') {
        name = &name[..query_at];
    }
    if let Some(fragment_at) = name.find('#') {
        name = &name[..fragment_at];
    }
    let name = name.replace('"', "");
    (!name.is_empty()).then_some(name)
}
