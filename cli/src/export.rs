//! Writing a generated image to disk.
//!
//! The backend hands images back either as `data:` URLs with a base64 payload
//! or as remote URLs. Both end up as raw bytes whose format is sniffed from
//! the content rather than trusted from the URL.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use image::ImageFormat;
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportedImage {
    pub path: PathBuf,
    pub format: ImageFormat,
    pub bytes: usize,
}

pub fn decode_data_url(url: &str) -> anyhow::Result<Vec<u8>> {
    let rest = url.strip_prefix("data:").context("not a data URL")?;
    let (meta, payload) = rest.split_once(',').context("data URL has no payload")?;
    if !meta.ends_with(";base64") {
        bail!("only base64 data URLs are supported (got '{meta}')");
    }
    STANDARD
        .decode(payload.trim())
        .context("data URL payload is not valid base64")
}

pub async fn fetch_image_bytes(client: &reqwest::Client, image_url: &str) -> anyhow::Result<Vec<u8>> {
    if image_url.starts_with("data:") {
        return decode_data_url(image_url);
    }

    debug!(url = image_url, "downloading image");
    let bytes = client
        .get(image_url)
        .send()
        .await
        .with_context(|| format!("downloading {image_url}"))?
        .error_for_status()?
        .bytes()
        .await?;
    Ok(bytes.to_vec())
}

/// Writes `bytes` to `path`, adding the sniffed format's extension when the
/// path has none.
pub async fn write_image(bytes: &[u8], path: &Path) -> anyhow::Result<ExportedImage> {
    let format = image::guess_format(bytes).context("data is not a recognised image format")?;

    let path = match (path.extension(), format.extensions_str().first()) {
        (None, Some(ext)) => path.with_extension(ext),
        _ => path.to_path_buf(),
    };

    tokio::fs::write(&path, bytes)
        .await
        .with_context(|| format!("writing {}", path.display()))?;
    info!(path = %path.display(), ?format, bytes = bytes.len(), "image exported");

    Ok(ExportedImage {
        path,
        format,
        bytes: bytes.len(),
    })
}

pub async fn export_image(
    client: &reqwest::Client,
    image_url: &str,
    path: &Path,
) -> anyhow::Result<ExportedImage> {
    let bytes = fetch_image_bytes(client, image_url).await?;
    write_image(&bytes, path).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn png_bytes() -> Vec<u8> {
        let img = image::RgbImage::from_pixel(2, 2, image::Rgb([200, 40, 10]));
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, ImageFormat::Png).unwrap();
        out.into_inner()
    }

    #[test]
    fn test_decode_data_url() {
        let png = png_bytes();
        let url = format!("data:image/png;base64,{}", STANDARD.encode(&png));
        assert_eq!(decode_data_url(&url).unwrap(), png);
    }

    #[test]
    fn test_decode_rejects_non_base64_data_url() {
        assert!(decode_data_url("data:text/plain,hello").is_err());
        assert!(decode_data_url("data:image/png;base64").is_err());
        assert!(decode_data_url("data:image/png;base64,***").is_err());
        assert!(decode_data_url("https://example.com/a.png").is_err());
    }

    #[tokio::test]
    async fn test_write_image_adds_extension() {
        let dir = tempfile::tempdir().unwrap();
        let exported = write_image(&png_bytes(), &dir.path().join("fox")).await.unwrap();

        assert_eq!(exported.format, ImageFormat::Png);
        assert_eq!(exported.path, dir.path().join("fox.png"));
        assert_eq!(std::fs::read(&exported.path).unwrap(), png_bytes());
    }

    #[tokio::test]
    async fn test_write_image_keeps_given_extension() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("fox.img");
        let exported = write_image(&png_bytes(), &target).await.unwrap();
        assert_eq!(exported.path, target);
    }

    #[tokio::test]
    async fn test_write_image_rejects_non_image() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("notes.txt");
        assert!(write_image(b"just some text", &target).await.is_err());
        assert!(!target.exists());
    }

    #[tokio::test]
    async fn test_export_remote_image() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/images/42.png")
            .with_status(200)
            .with_header("content-type", "image/png")
            .with_body(png_bytes())
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let client = reqwest::Client::new();
        let exported = export_image(
            &client,
            &format!("{}/images/42.png", server.url()),
            &dir.path().join("remote"),
        )
        .await
        .unwrap();

        assert_eq!(exported.format, ImageFormat::Png);
        assert_eq!(exported.bytes, png_bytes().len());
    }
}
