//! Reference decoders for files, in-memory bytes and HTTP(S) URIs.

use std::fs;
use std::time::Duration;

use bytes::Bytes;
use image::DynamicImage;
use image::imageops::FilterType;
use tokio::runtime::{Handle, RuntimeFlavor};
use tracing::{debug, trace};

use crate::domain::entities::{Size, SourceData};
use crate::domain::errors::{EngineError, LoadError};
use crate::domain::ports::ImageDecoderPort;

/// Downscales `image` to fit inside `size`, preserving aspect ratio.
///
/// Images that already fit are returned untouched; nothing is upscaled.
#[must_use]
pub fn fit(image: DynamicImage, size: Option<Size>) -> DynamicImage {
    match size {
        Some(size) if !size.contains(image.width(), image.height()) => {
            trace!(
                width = image.width(),
                height = image.height(),
                to = %size,
                "Downscaling decoded image"
            );
            image.resize(size.width(), size.height(), FilterType::Lanczos3)
        }
        _ => image,
    }
}

/// Decodes encoded image bytes and fits them into `size`.
///
/// # Errors
/// Returns [`LoadError::Decode`] or [`LoadError::Unsupported`] for bad data.
pub fn decode_bytes(bytes: &[u8], size: Option<Size>) -> Result<DynamicImage, LoadError> {
    let image = image::load_from_memory(bytes)?;
    Ok(fit(image, size))
}

/// Decodes image files from the local filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileDecoder;

impl ImageDecoderPort for FileDecoder {
    fn decode(&self, data: &SourceData, size: Option<Size>) -> Result<DynamicImage, LoadError> {
        let SourceData::File(path) = data else {
            return Err(LoadError::unsupported(format!(
                "file decoder cannot read {} sources",
                data.kind()
            )));
        };
        let bytes = fs::read(path)?;
        debug!(path = %path.display(), bytes = bytes.len(), "Read image file");
        decode_bytes(&bytes, size)
    }
}

/// Decodes encoded images held in memory.
#[derive(Debug, Clone, Copy, Default)]
pub struct BytesDecoder;

impl ImageDecoderPort for BytesDecoder {
    fn decode(&self, data: &SourceData, size: Option<Size>) -> Result<DynamicImage, LoadError> {
        let SourceData::Bytes(bytes) = data else {
            return Err(LoadError::unsupported(format!(
                "bytes decoder cannot read {} sources",
                data.kind()
            )));
        };
        decode_bytes(bytes, size)
    }
}

/// Fetches and decodes `http://` and `https://` URIs.
///
/// Requests run on the given tokio runtime while the calling load worker
/// blocks on the result. The client timeout bounds every fetch.
#[derive(Debug, Clone)]
pub struct HttpDecoder {
    client: reqwest::Client,
    runtime: Handle,
}

impl HttpDecoder {
    /// Creates a decoder with the given request timeout.
    ///
    /// # Errors
    /// Returns [`EngineError::Config`] if the HTTP client cannot be built.
    pub fn new(timeout: Duration, runtime: Handle) -> Result<Self, EngineError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| EngineError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client, runtime })
    }

    /// Blocks the calling thread on the download.
    ///
    /// Inside a multi-thread runtime the worker is handed off first. A
    /// current-thread runtime cannot block at all, so the load is rejected.
    fn fetch(&self, url: &str) -> Result<Bytes, LoadError> {
        match Handle::try_current() {
            Err(_) => self.runtime.block_on(self.download(url)),
            Ok(current) if current.runtime_flavor() == RuntimeFlavor::MultiThread => {
                tokio::task::block_in_place(|| self.runtime.block_on(self.download(url)))
            }
            Ok(_) => Err(LoadError::unsupported(
                "cannot block inside a current-thread runtime, submit the request instead",
            )),
        }
    }

    async fn download(&self, url: &str) -> Result<Bytes, LoadError> {
        let response = self.client.get(url).send().await.map_err(request_error)?;

        if !response.status().is_success() {
            return Err(LoadError::network(format!(
                "HTTP {}: {}",
                response.status(),
                response.status().canonical_reason().unwrap_or("Unknown")
            )));
        }

        response.bytes().await.map_err(request_error)
    }
}

fn request_error(err: reqwest::Error) -> LoadError {
    if err.is_timeout() {
        LoadError::timeout(err.to_string())
    } else {
        LoadError::network(err.to_string())
    }
}

impl ImageDecoderPort for HttpDecoder {
    fn decode(&self, data: &SourceData, size: Option<Size>) -> Result<DynamicImage, LoadError> {
        let SourceData::Uri(url) = data else {
            return Err(LoadError::unsupported(format!(
                "http decoder cannot read {} sources",
                data.kind()
            )));
        };
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(LoadError::unsupported(format!("unsupported scheme in '{url}'")));
        }

        let bytes = self.fetch(url)?;
        debug!(url = %url, bytes = bytes.len(), "Downloaded image");
        decode_bytes(&bytes, size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Read, Write};
    use std::net::TcpListener;
    use std::path::PathBuf;
    use std::thread;

    fn png(width: u32, height: u32) -> Vec<u8> {
        let mut buffer = Cursor::new(Vec::new());
        DynamicImage::new_rgb8(width, height)
            .write_to(&mut buffer, image::ImageFormat::Png)
            .unwrap();
        buffer.into_inner()
    }

    /// Serves one HTTP response and returns the URL to request.
    fn serve_once(status: &'static str, body: Vec<u8>) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut request = [0u8; 1024];
            let _ = stream.read(&mut request);
            let header = format!(
                "HTTP/1.1 {status}\r\nContent-Type: image/png\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                body.len()
            );
            stream.write_all(header.as_bytes()).unwrap();
            stream.write_all(&body).unwrap();
        });
        format!("http://{addr}/image.png")
    }

    #[test]
    fn test_fit_downscales_preserving_aspect() {
        let image = DynamicImage::new_rgb8(200, 100);
        let fitted = fit(image, Some(Size::new(50, 50).unwrap()));
        assert_eq!((fitted.width(), fitted.height()), (50, 25));
    }

    #[test]
    fn test_fit_never_upscales() {
        let image = DynamicImage::new_rgb8(20, 10);
        let fitted = fit(image, Some(Size::new(100, 100).unwrap()));
        assert_eq!((fitted.width(), fitted.height()), (20, 10));
    }

    #[test]
    fn test_file_decoder_reads_and_fits() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.png");
        fs::write(&path, png(40, 40)).unwrap();

        let image = FileDecoder
            .decode(&SourceData::File(path), Some(Size::new(10, 10).unwrap()))
            .unwrap();

        assert_eq!((image.width(), image.height()), (10, 10));
    }

    #[test]
    fn test_file_decoder_missing_file_is_io_error() {
        let err = FileDecoder
            .decode(&SourceData::File(PathBuf::from("/nonexistent/oxiload.png")), None)
            .unwrap_err();
        assert!(matches!(err, LoadError::Io { .. }));
    }

    #[test]
    fn test_bytes_decoder_rejects_garbage() {
        let err = BytesDecoder
            .decode(&SourceData::Bytes(Bytes::from_static(b"not an image")), None)
            .unwrap_err();
        assert!(!err.is_transport_error());
    }

    #[test]
    fn test_decoders_reject_foreign_sources() {
        let err = BytesDecoder
            .decode(&SourceData::from("https://example.com/a.png"), None)
            .unwrap_err();
        assert!(matches!(err, LoadError::Unsupported { .. }));

        let err = FileDecoder
            .decode(&SourceData::Bytes(Bytes::from(png(1, 1))), None)
            .unwrap_err();
        assert!(matches!(err, LoadError::Unsupported { .. }));
    }

    #[test]
    fn test_http_decoder_downloads_image() {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let decoder = HttpDecoder::new(Duration::from_secs(5), runtime.handle().clone()).unwrap();
        let url = serve_once("200 OK", png(30, 20));

        let image = decoder.decode(&SourceData::Uri(url), None).unwrap();

        assert_eq!((image.width(), image.height()), (30, 20));
    }

    #[test]
    fn test_http_decoder_reports_status() {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let decoder = HttpDecoder::new(Duration::from_secs(5), runtime.handle().clone()).unwrap();
        let url = serve_once("404 Not Found", Vec::new());

        let err = decoder.decode(&SourceData::Uri(url), None).unwrap_err();

        assert_eq!(err, LoadError::network("HTTP 404 Not Found: Not Found"));
    }

    #[test]
    fn test_http_decoder_rejects_other_schemes() {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let decoder = HttpDecoder::new(Duration::from_secs(5), runtime.handle().clone()).unwrap();

        let err = decoder
            .decode(&SourceData::from("ftp://example.com/a.png"), None)
            .unwrap_err();

        assert!(matches!(err, LoadError::Unsupported { .. }));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_http_decoder_blocks_inside_multi_thread_runtime() {
        let decoder = HttpDecoder::new(Duration::from_secs(5), Handle::current()).unwrap();
        let url = serve_once("200 OK", png(12, 8));

        let image = decoder.decode(&SourceData::Uri(url), None).unwrap();

        assert_eq!((image.width(), image.height()), (12, 8));
    }

    #[tokio::test]
    async fn test_http_decoder_rejects_current_thread_runtime() {
        let decoder = HttpDecoder::new(Duration::from_secs(5), Handle::current()).unwrap();

        let err = decoder
            .decode(&SourceData::from("http://127.0.0.1:9/a.png"), None)
            .unwrap_err();

        assert!(matches!(err, LoadError::Unsupported { .. }));
    }
}
