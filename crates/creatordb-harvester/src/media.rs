//! Avatar re-hosting: fetch the upstream image once and serve it from owned
//! storage so reads never depend on a volatile CDN URL.

use std::path::PathBuf;

use sha2::{Digest, Sha256};

use crate::client::HttpFetcher;
use crate::error::HarvestError;

const AVATAR_DIR: &str = "avatars";

/// Where a profile's avatar now lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RehostedAvatar {
    /// URL to publish in the profile.
    pub url: String,
    /// The upstream URL the bytes came from.
    pub source_url: String,
}

#[derive(Debug, Clone)]
pub struct AvatarRehoster {
    fetcher: HttpFetcher,
    media_dir: PathBuf,
    base_url: String,
}

impl AvatarRehoster {
    #[must_use]
    pub fn new(fetcher: HttpFetcher, media_dir: PathBuf, base_url: &str) -> Self {
        Self {
            fetcher,
            media_dir,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Downloads `source_url` and stores it content-addressed under
    /// `<media_dir>/avatars/`.
    ///
    /// Identical images map to the same file, so re-hosting the same avatar
    /// twice is a no-op on disk.
    ///
    /// # Errors
    ///
    /// Returns [`HarvestError`] if the download fails, the body is empty, or
    /// the file cannot be written.
    pub async fn rehost(&self, source_url: &str) -> Result<RehostedAvatar, HarvestError> {
        let (bytes, content_type) = self.fetcher.get_bytes(source_url).await?;
        if bytes.is_empty() {
            return Err(HarvestError::unrecognized(format!("empty avatar body from {source_url}")));
        }

        let ext = image_extension(content_type.as_deref(), source_url);
        let name = format!("{:x}.{ext}", Sha256::digest(&bytes));
        let dir = self.media_dir.join(AVATAR_DIR);
        let path = dir.join(&name);

        if tokio::fs::try_exists(&path).await? {
            tracing::debug!(path = %path.display(), "avatar already stored");
        } else {
            tokio::fs::create_dir_all(&dir).await?;
            tokio::fs::write(&path, &bytes).await?;
            tracing::debug!(path = %path.display(), bytes = bytes.len(), "avatar stored");
        }

        Ok(RehostedAvatar {
            url: format!("{}/{AVATAR_DIR}/{name}", self.base_url),
            source_url: source_url.to_string(),
        })
    }
}

/// Picks a file extension from the response content type, then the URL path.
fn image_extension(content_type: Option<&str>, url: &str) -> &'static str {
    let mime = content_type
        .and_then(|ct| ct.split(';').next())
        .map(|ct| ct.trim().to_ascii_lowercase());
    match mime.as_deref() {
        Some("image/png") => return "png",
        Some("image/webp") => return "webp",
        Some("image/gif") => return "gif",
        Some("image/jpeg" | "image/jpg") => return "jpg",
        _ => {}
    }

    let path = url.split(['?', '#']).next().unwrap_or(url).to_ascii_lowercase();
    if path.ends_with(".png") {
        "png"
    } else if path.ends_with(".webp") {
        "webp"
    } else if path.ends_with(".gif") {
        "gif"
    } else {
        "jpg"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_prefers_content_type() {
        assert_eq!(image_extension(Some("image/png"), "https://cdn/x.jpg"), "png");
        assert_eq!(image_extension(Some("image/webp; charset=binary"), "x"), "webp");
    }

    #[test]
    fn extension_falls_back_to_url_then_jpg() {
        assert_eq!(image_extension(None, "https://cdn/a/b.webp?sig=1"), "webp");
        assert_eq!(
            image_extension(Some("application/octet-stream"), "https://cdn/a/b"),
            "jpg"
        );
    }
}
