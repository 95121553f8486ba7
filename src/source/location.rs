//! Classification of the configured snapshot source and participant
//! address validation.

use crate::error::SyncError;
use anyhow::{bail, Context, Result};
use std::path::PathBuf;
use url::{ParseError, Url};

/// Upper bound on address length accepted before any path or URL is built.
pub const MAX_ADDRESS_LEN: usize = 128;

/// Where participant snapshots come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceLocation {
    /// `GET {base}/users/{address}`.
    Remote(Url),
    /// `{root}/users/{address}` on the local filesystem.
    Local(PathBuf),
}

impl SourceLocation {
    /// Resolves a configured source string.
    ///
    /// `http`/`https` URLs are remote. A `file://` URL, or anything that
    /// does not parse as an absolute URL because it lacks a base, is a
    /// local root directory.
    pub fn resolve(source: &str) -> Result<Self> {
        let source = source.trim();
        if source.is_empty() {
            bail!("source url must not be empty");
        }

        match Url::parse(source) {
            Ok(url) => match url.scheme() {
                "http" | "https" => Ok(SourceLocation::Remote(url)),
                "file" => url
                    .to_file_path()
                    .map(SourceLocation::Local)
                    .map_err(|_| anyhow::anyhow!("file url {source} has no usable path")),
                other => bail!("unsupported source scheme {other} in {source}"),
            },
            Err(ParseError::RelativeUrlWithoutBase) => Ok(SourceLocation::Local(PathBuf::from(source))),
            Err(err) => Err(err).with_context(|| format!("invalid source url {source}")),
        }
    }

    pub fn is_local(&self) -> bool {
        matches!(self, SourceLocation::Local(_))
    }

    /// Builds the snapshot endpoint for `address`. Only meaningful for
    /// remote sources.
    pub(crate) fn user_url(base: &Url, address: &str) -> Result<Url, SyncError> {
        let mut url = base.clone();
        url.path_segments_mut()
            .map_err(|_| SyncError::validation(format!("source url {base} cannot be a base")))?
            .pop_if_empty()
            .push("users")
            .push(address);
        Ok(url)
    }
}

/// Accepts only non-empty, strictly ASCII-alphanumeric addresses.
pub fn validate_address(address: &str) -> Result<(), SyncError> {
    if address.is_empty() {
        return Err(SyncError::validation("address must not be empty"));
    }
    if address.len() > MAX_ADDRESS_LEN {
        return Err(SyncError::validation(format!(
            "address exceeds {MAX_ADDRESS_LEN} characters"
        )));
    }
    if !address.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(SyncError::validation(format!(
            "address {address:?} must be alphanumeric"
        )));
    }
    Ok(())
}
