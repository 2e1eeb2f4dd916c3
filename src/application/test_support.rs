//! Shared fakes for engine tests.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use image::DynamicImage;
use parking_lot::{Condvar, Mutex};

use crate::domain::entities::{LoadedImage, Size, SourceData, TargetId};
use crate::domain::errors::LoadError;
use crate::domain::ports::{DisplayTarget, ImageDecoderPort};

/// Decoder that counts calls and can be held at a gate until released.
#[derive(Default)]
pub struct CountingDecoder {
    calls: AtomicUsize,
    held: Mutex<bool>,
    released: Condvar,
    entered: Mutex<usize>,
    entered_changed: Condvar,
}

impl CountingDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a decoder that blocks every call until [`CountingDecoder::release`].
    pub fn held() -> Self {
        let decoder = Self::default();
        *decoder.held.lock() = true;
        decoder
    }

    pub fn release(&self) {
        *self.held.lock() = false;
        self.released.notify_all();
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Blocks until `n` calls have entered `decode`.
    pub fn wait_for_calls(&self, n: usize) {
        let mut entered = self.entered.lock();
        while *entered < n {
            if self
                .entered_changed
                .wait_for(&mut entered, Duration::from_secs(5))
                .timed_out()
            {
                panic!("decoder was not called {n} times");
            }
        }
    }
}

impl ImageDecoderPort for CountingDecoder {
    fn decode(&self, _data: &SourceData, size: Option<Size>) -> Result<DynamicImage, LoadError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        {
            let mut entered = self.entered.lock();
            *entered += 1;
            self.entered_changed.notify_all();
        }

        let mut held = self.held.lock();
        while *held {
            self.released.wait(&mut held);
        }

        let (width, height) = size.map_or((8, 8), |s| (s.width(), s.height()));
        Ok(DynamicImage::new_rgb8(width, height))
    }
}

/// Decoder whose every call panics with the given message.
pub struct PanickingDecoder(pub &'static str);

impl ImageDecoderPort for PanickingDecoder {
    fn decode(&self, _data: &SourceData, _size: Option<Size>) -> Result<DynamicImage, LoadError> {
        panic!("{}", self.0);
    }
}

/// Display target that records what it was asked to show.
pub struct RecordingTarget {
    id: TargetId,
    images: Mutex<Vec<LoadedImage>>,
    errors: Mutex<Vec<LoadError>>,
}

impl RecordingTarget {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            id: TargetId::new(),
            images: Mutex::new(Vec::new()),
            errors: Mutex::new(Vec::new()),
        })
    }

    pub fn shown(&self) -> usize {
        self.images.lock().len()
    }

    pub fn last_image(&self) -> Option<LoadedImage> {
        self.images.lock().last().cloned()
    }

    pub fn errors(&self) -> usize {
        self.errors.lock().len()
    }
}

impl DisplayTarget for RecordingTarget {
    fn id(&self) -> TargetId {
        self.id
    }

    fn show_image(&self, image: &LoadedImage) {
        self.images.lock().push(image.clone());
    }

    fn show_error(&self, error: &LoadError) {
        self.errors.lock().push(error.clone());
    }
}
