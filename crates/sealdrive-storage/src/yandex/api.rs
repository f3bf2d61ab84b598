//! Yandex Disk REST API types and status handling shared by the async and
//! blocking clients.

use chrono::{DateTime, Utc};
use sealdrive_core::error::{Result, SealError};
use sealdrive_core::types::File;
use serde::Deserialize;

pub const DEFAULT_API_BASE: &str = "https://cloud-api.yandex.net/v1/disk";

/// Length of the `disk:/` root marker on item paths.
const ROOT_MARKER_LEN: usize = 6;

/// Items requested per listing page.
pub(crate) const PAGE_LIMIT: u64 = 100;

const HTTP_OK: u16 = 200;
const HTTP_CONFLICT: u16 = 409;

/// `Link` object returned by the upload/download URL endpoints.
#[derive(Debug, Deserialize)]
struct Link {
    href: Option<String>,
}

/// Error body returned by the API on failures.
#[derive(Debug, Deserialize)]
struct ApiError {
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Resource {
    #[serde(rename = "_embedded")]
    embedded: Option<ResourceList>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ResourceList {
    #[serde(default)]
    pub items: Vec<Item>,
    #[serde(default)]
    pub total: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Item {
    pub name: String,
    pub path: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub size: Option<u64>,
    pub modified: String,
}

pub(crate) fn auth_header(token: &str) -> String {
    format!("OAuth {token}")
}

pub(crate) fn resources_url(base: &str) -> String {
    format!("{}/resources", base.trim_end_matches('/'))
}

pub(crate) fn upload_url(base: &str) -> String {
    format!("{}/resources/upload", base.trim_end_matches('/'))
}

pub(crate) fn download_url(base: &str) -> String {
    format!("{}/resources/download", base.trim_end_matches('/'))
}

/// Strip the `disk:/` root marker from an item path.
pub fn strip_root(path: &str) -> String {
    path.chars().skip(ROOT_MARKER_LEN).collect()
}

fn reason(body: &[u8], fallback: &str) -> String {
    serde_json::from_slice::<ApiError>(body)
        .ok()
        .and_then(|e| e.description.or(e.message))
        .unwrap_or_else(|| fallback.to_string())
}

/// Interpret the response of `GET /resources/upload`.
pub(crate) fn parse_upload_link(status: u16, body: &[u8], remote_path: &str) -> Result<String> {
    if status == HTTP_CONFLICT {
        return Err(SealError::AlreadyExists(remote_path.to_string()));
    }
    if status != HTTP_OK {
        return Err(SealError::UploadUrl {
            status,
            reason: reason(body, "unexpected status"),
        });
    }
    let link: Link = serde_json::from_slice(body).map_err(|e| SealError::UploadUrl {
        status,
        reason: format!("malformed response: {e}"),
    })?;
    link.href.ok_or_else(|| SealError::UploadUrl {
        status,
        reason: "No href key".to_string(),
    })
}

/// Interpret the response of `GET /resources/download`.
pub(crate) fn parse_download_link(status: u16, body: &[u8]) -> Result<String> {
    if status != HTTP_OK {
        return Err(SealError::DownloadUrl {
            status,
            reason: reason(body, "unexpected status"),
        });
    }
    let link: Link = serde_json::from_slice(body).map_err(|e| SealError::DownloadUrl {
        status,
        reason: format!("malformed response: {e}"),
    })?;
    link.href.ok_or_else(|| SealError::DownloadUrl {
        status,
        reason: "No href key".to_string(),
    })
}

/// Interpret one page of `GET /resources`.
pub(crate) fn parse_list_page(status: u16, body: &[u8]) -> Result<ResourceList> {
    if status != HTTP_OK {
        return Err(SealError::List {
            status,
            reason: reason(body, "unexpected status"),
        });
    }
    let resource: Resource = serde_json::from_slice(body).map_err(|e| SealError::List {
        status,
        reason: format!("malformed response: {e}"),
    })?;
    resource.embedded.ok_or_else(|| SealError::List {
        status,
        reason: "path is not a directory (no _embedded list)".to_string(),
    })
}

/// Whether another page should be requested after `fetched` items in total,
/// the last page holding `page_len` of them.
pub(crate) fn has_more(total: Option<u64>, fetched: u64, page_len: usize) -> bool {
    page_len > 0 && total.is_some_and(|t| fetched < t)
}

impl Item {
    pub(crate) fn into_file(self) -> Result<File> {
        let modified = DateTime::parse_from_rfc3339(&self.modified)
            .map(|d| d.with_timezone(&Utc))
            .map_err(|e| SealError::List {
                status: HTTP_OK,
                reason: format!("invalid modified timestamp '{}': {e}", self.modified),
            })?;
        Ok(File {
            path: strip_root(&self.path),
            name: self.name,
            size: self.size.unwrap_or(0),
            modified,
            is_dir: self.kind == "dir",
        })
    }
}
