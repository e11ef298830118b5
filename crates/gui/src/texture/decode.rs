//! Asynchronous decoding of replacement images.
//!
//! Decodes run on the tokio blocking pool. The result travels back over a
//! oneshot channel and is applied by the owning activation between frames.
//! A decode whose activation has been torn down drops its result instead of
//! sending it.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use image::RgbaImage;
use shared::ImageSource;
use tokio::runtime::Handle;
use tokio::sync::oneshot;

use crate::error::{Result, ViewerError};

/// Fetches the encoded bytes behind an [`ImageSource`]
pub trait ImageLoader: Send + Sync {
    fn load(&self, source: &ImageSource) -> Result<Vec<u8>>;
}

/// Reads `file://` URIs and plain paths from disk
#[derive(Debug, Default, Clone, Copy)]
pub struct FsImageLoader;

impl ImageLoader for FsImageLoader {
    fn load(&self, source: &ImageSource) -> Result<Vec<u8>> {
        match source {
            ImageSource::Bytes(bytes) => Ok(bytes.clone()),
            ImageSource::Uri(uri) => Ok(std::fs::read(resolve_path(uri)?)?),
        }
    }
}

/// Map a URI to a local path; network schemes are rejected
pub fn resolve_path(uri: &str) -> Result<PathBuf> {
    if let Some(rest) = uri.strip_prefix("file://") {
        return Ok(PathBuf::from(rest));
    }
    if uri.is_empty() || uri.contains("://") || uri.starts_with("data:") {
        return Err(ViewerError::UnsupportedSource(uri.to_string()));
    }
    Ok(PathBuf::from(uri))
}

pub fn decode_image(bytes: &[u8]) -> Result<RgbaImage> {
    Ok(image::load_from_memory(bytes)?.to_rgba8())
}

/// Outcome of checking a pending decode
#[derive(Debug)]
pub enum DecodePoll {
    Pending,
    Ready(Result<RgbaImage>),
    /// The decode task went away without a result
    Abandoned,
}

/// A decode in flight for one page
#[derive(Debug)]
pub struct PendingDecode {
    page_index: usize,
    receiver: oneshot::Receiver<Result<RgbaImage>>,
}

impl PendingDecode {
    pub fn page_index(&self) -> usize {
        self.page_index
    }

    /// Non-blocking check, called between frames
    pub fn poll(&mut self) -> DecodePoll {
        match self.receiver.try_recv() {
            Ok(result) => DecodePoll::Ready(result),
            Err(oneshot::error::TryRecvError::Empty) => DecodePoll::Pending,
            Err(oneshot::error::TryRecvError::Closed) => DecodePoll::Abandoned,
        }
    }

    pub async fn wait(self) -> DecodePoll {
        match self.receiver.await {
            Ok(result) => DecodePoll::Ready(result),
            Err(_) => DecodePoll::Abandoned,
        }
    }
}

/// Start loading and decoding `source` for `page_index`.
///
/// `alive` is the owning activation's liveness flag; once it is cleared the
/// finished decode is discarded.
pub fn spawn_decode(
    runtime: &Handle,
    loader: Arc<dyn ImageLoader>,
    source: ImageSource,
    page_index: usize,
    alive: Arc<AtomicBool>,
) -> PendingDecode {
    let (tx, receiver) = oneshot::channel();
    runtime.spawn_blocking(move || {
        let result = loader.load(&source).and_then(|bytes| decode_image(&bytes));
        if !alive.load(Ordering::Acquire) {
            tracing::debug!(
                "Discarding decode of {} for page {page_index}: activation ended",
                source.describe()
            );
            return;
        }
        let _ = tx.send(result);
    });
    PendingDecode {
        page_index,
        receiver,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_file_uri() {
        assert_eq!(
            resolve_path("file:///tmp/page.png").unwrap(),
            PathBuf::from("/tmp/page.png")
        );
        assert_eq!(resolve_path("notes/page.png").unwrap(), PathBuf::from("notes/page.png"));
    }

    #[test]
    fn test_network_uri_unsupported() {
        assert!(matches!(
            resolve_path("https://example.com/a.png"),
            Err(ViewerError::UnsupportedSource(_))
        ));
        assert!(resolve_path("data:image/png;base64,AAAA").is_err());
        assert!(resolve_path("").is_err());
    }

    #[test]
    fn test_decode_garbage_fails() {
        assert!(matches!(decode_image(b"not an image"), Err(ViewerError::Decode(_))));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = FsImageLoader
            .load(&ImageSource::uri("/definitely/not/here.png"))
            .unwrap_err();
        assert!(matches!(err, ViewerError::Io(_)));
    }

    #[tokio::test]
    async fn test_decode_delivers_result() {
        let bytes = crate::fixtures::png_bytes(3, 2, [10, 20, 30, 255]);
        let alive = Arc::new(AtomicBool::new(true));
        let pending = spawn_decode(
            &Handle::current(),
            Arc::new(FsImageLoader),
            ImageSource::Bytes(bytes),
            0,
            alive,
        );
        match pending.wait().await {
            DecodePoll::Ready(Ok(img)) => {
                assert_eq!(img.dimensions(), (3, 2));
                assert_eq!(img.get_pixel(1, 1).0, [10, 20, 30, 255]);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_dead_activation_discards_result() {
        let alive = Arc::new(AtomicBool::new(false));
        let pending = spawn_decode(
            &Handle::current(),
            Arc::new(FsImageLoader),
            ImageSource::Bytes(crate::fixtures::png_bytes(1, 1, [0, 0, 0, 255])),
            0,
            alive,
        );
        assert!(matches!(pending.wait().await, DecodePoll::Abandoned));
    }
}
