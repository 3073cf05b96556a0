use std::time::Duration;

use axum::body::Bytes;
use image::{DynamicImage, GenericImageView};
use tracing::info;

use crate::error::{AppError, AMBIGUOUS_SOURCE, NOT_AN_IMAGE, NO_IMAGE, TOO_SMALL};
use crate::utils::download_bytes;

pub const MIN_DIMENSION: u32 = 50;

/// Where the image for one request comes from.
#[derive(Debug, Clone)]
pub enum ImageSource {
    Upload {
        bytes: Bytes,
        content_type: Option<String>,
    },
    Cid(String),
    Url(String),
}

impl ImageSource {
    /// Picks the source out of a JSON request body.
    pub fn from_request(cid: Option<String>, image_url: Option<String>) -> Result<Self, AppError> {
        let present = |value: Option<String>| value.filter(|v| !v.trim().is_empty());

        match (present(cid), present(image_url)) {
            (Some(cid), None) => Ok(ImageSource::Cid(cid.trim().to_string())),
            (None, Some(url)) => Ok(ImageSource::Url(url.trim().to_string())),
            (Some(_), Some(_)) => Err(AppError::invalid(AMBIGUOUS_SOURCE)),
            (None, None) => Err(AppError::invalid(NO_IMAGE)),
        }
    }
}

/// Turns an [`ImageSource`] into validated pixels.
#[derive(Debug, Clone)]
pub struct ImageFetcher {
    client: reqwest::Client,
    gateway: String,
}

impl ImageFetcher {
    pub fn new(gateway: &str, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(ImageFetcher {
            client,
            gateway: gateway.trim_end_matches('/').to_string(),
        })
    }

    pub fn gateway_url(&self, cid: &str) -> String {
        format!("{}/ipfs/{}", self.gateway, cid)
    }

    pub async fn acquire(&self, source: ImageSource) -> Result<DynamicImage, AppError> {
        let bytes = match source {
            ImageSource::Upload {
                bytes,
                content_type,
            } => {
                let is_image = content_type
                    .as_deref()
                    .is_some_and(|mime| mime.starts_with("image/"));
                if !is_image {
                    return Err(AppError::invalid(NOT_AN_IMAGE));
                }
                bytes
            }
            ImageSource::Cid(cid) => {
                let url = self.gateway_url(&cid);
                info!("Fetching image for CID {} from {}", cid, url);
                download_bytes(&self.client, &url).await?
            }
            ImageSource::Url(url) => {
                info!("Fetching image from {}", url);
                download_bytes(&self.client, &url).await?
            }
        };

        let image = tokio::task::spawn_blocking(move || image::load_from_memory(&bytes))
            .await
            .map_err(|err| AppError::Internal(format!("image decode task failed: {}", err)))??;

        validate_dimensions(&image)?;
        Ok(image)
    }
}

pub fn validate_dimensions(image: &DynamicImage) -> Result<(), AppError> {
    let (width, height) = image.dimensions();
    if width < MIN_DIMENSION || height < MIN_DIMENSION {
        return Err(AppError::invalid(TOO_SMALL));
    }
    Ok(())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use image::{ImageOutputFormat, RgbImage};
    use std::io::Cursor;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    pub(crate) fn png(width: u32, height: u32) -> Vec<u8> {
        let mut buf = Vec::new();
        DynamicImage::ImageRgb8(RgbImage::new(width, height))
            .write_to(&mut Cursor::new(&mut buf), ImageOutputFormat::Png)
            .unwrap();
        buf
    }

    fn fetcher(gateway: &str) -> ImageFetcher {
        ImageFetcher::new(gateway, Duration::from_secs(5)).unwrap()
    }

    fn upload(bytes: Vec<u8>, content_type: Option<&str>) -> ImageSource {
        ImageSource::Upload {
            bytes: Bytes::from(bytes),
            content_type: content_type.map(str::to_string),
        }
    }

    #[test]
    fn request_needs_exactly_one_source() {
        assert!(matches!(
            ImageSource::from_request(Some("bafy".into()), None),
            Ok(ImageSource::Cid(cid)) if cid == "bafy"
        ));
        assert!(matches!(
            ImageSource::from_request(None, Some("http://x/y.png".into())),
            Ok(ImageSource::Url(url)) if url == "http://x/y.png"
        ));

        let err = ImageSource::from_request(None, None).unwrap_err();
        assert_eq!(err.detail(), NO_IMAGE);

        let err = ImageSource::from_request(Some("  ".into()), Some(String::new())).unwrap_err();
        assert_eq!(err.detail(), NO_IMAGE);

        let err = ImageSource::from_request(Some("a".into()), Some("b".into())).unwrap_err();
        assert_eq!(err.detail(), AMBIGUOUS_SOURCE);
    }

    #[test]
    fn gateway_url_uses_ipfs_path() {
        assert_eq!(
            fetcher("https://ipfs.io/").gateway_url("bafyabc"),
            "https://ipfs.io/ipfs/bafyabc"
        );
    }

    #[tokio::test]
    async fn upload_decodes_and_keeps_dimensions() {
        let image = fetcher("http://unused")
            .acquire(upload(png(200, 100), Some("image/png")))
            .await
            .unwrap();
        assert_eq!(image.dimensions(), (200, 100));
    }

    #[tokio::test]
    async fn upload_requires_image_content_type() {
        for content_type in [Some("text/plain"), Some("application/octet-stream"), None] {
            let err = fetcher("http://unused")
                .acquire(upload(png(100, 100), content_type))
                .await
                .unwrap_err();
            assert!(matches!(err, AppError::InvalidInput(_)), "{content_type:?}");
            assert_eq!(err.detail(), NOT_AN_IMAGE);
        }
    }

    #[tokio::test]
    async fn garbage_bytes_are_a_decode_error() {
        let err = fetcher("http://unused")
            .acquire(upload(b"not really a png".to_vec(), Some("image/png")))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Decode(_)));
    }

    #[tokio::test]
    async fn small_images_are_rejected() {
        for (w, h) in [(40, 40), (49, 200), (200, 49)] {
            let err = fetcher("http://unused")
                .acquire(upload(png(w, h), Some("image/png")))
                .await
                .unwrap_err();
            assert_eq!(err.detail(), TOO_SMALL, "{w}x{h}");
        }

        fetcher("http://unused")
            .acquire(upload(png(50, 50), Some("image/png")))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn cid_is_fetched_from_gateway() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/ipfs/bafygood"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(png(60, 300)))
            .expect(1)
            .mount(&server)
            .await;

        let image = fetcher(&server.uri())
            .acquire(ImageSource::Cid("bafygood".into()))
            .await
            .unwrap();
        assert_eq!(image.dimensions(), (60, 300));
    }

    #[tokio::test]
    async fn missing_cid_is_a_fetch_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;

        let err = fetcher(&server.uri())
            .acquire(ImageSource::Cid("bad-cid-that-404s".into()))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Fetch(_)));
    }

    #[tokio::test]
    async fn url_fetch_times_out_without_retry() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/slow.png"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_bytes(png(100, 100))
                    .set_delay(Duration::from_millis(500)),
            )
            .expect(1)
            .mount(&server)
            .await;

        let fetcher = ImageFetcher::new(&server.uri(), Duration::from_millis(50)).unwrap();
        let err = fetcher
            .acquire(ImageSource::Url(format!("{}/slow.png", server.uri())))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Fetch(ref e) if e.is_timeout()));
    }
}
