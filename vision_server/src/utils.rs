//! Utility functions
//!
use std::{
    fs::File,
    io::Cursor,
    path::{Path, PathBuf},
};

use reqwest::Client;

use crate::models::ModelError;

/// Download a file from a URL to a given filepath.
///
/// The content goes to a `.part` file next to the target and is moved into place once complete.
pub async fn download_file(
    client: &Client,
    url: &str,
    filepath: impl AsRef<Path>,
) -> Result<(), ModelError> {
    let to_download_error = |source| ModelError::Download {
        url: url.to_owned(),
        source,
    };
    let resp = client
        .get(url)
        .send()
        .await
        .and_then(|resp| resp.error_for_status())
        .map_err(to_download_error)?;
    let bytes = resp.bytes().await.map_err(to_download_error)?;

    let filepath = filepath.as_ref();
    let partial = filepath.with_extension("part");
    let mut file = File::create(&partial)?;
    let mut content = Cursor::new(bytes);
    std::io::copy(&mut content, &mut file)?;
    std::fs::rename(&partial, filepath)?;

    Ok(())
}

/// Resolve `source` to a local file in `dir`, downloading it when it is a URL not cached yet.
///
/// Anything that is not an `http(s)` URL is taken as a local path.
pub async fn fetch_cached(client: &Client, source: &str, dir: &Path) -> Result<PathBuf, ModelError> {
    if !is_url(source) {
        return Ok(PathBuf::from(source));
    }

    let file_name = source
        .rsplit('/')
        .next()
        .filter(|name| !name.is_empty())
        .ok_or_else(|| ModelError::Load(format!("no file name in {source}")))?;
    let filepath = dir.join(file_name);

    if !filepath.exists() {
        std::fs::create_dir_all(dir)?;
        log::info!("Downloading {} to {}", source, filepath.display());
        download_file(client, source, &filepath).await?;
    }

    Ok(filepath)
}

fn is_url(source: &str) -> bool {
    source.starts_with("http://") || source.starts_with("https://")
}
