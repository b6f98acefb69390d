//! Mock speech model for testing
//!
//! Renders text into a deterministic WAV (one sample per byte of text) and
//! can be configured to fail on a given call or on text containing a marker.

use async_trait::async_trait;
use std::io::Cursor;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::error::{Result, SynthesisError};
use crate::model::{SpeechModel, SpeechRequest};

/// Sample rate of the audio rendered by [`MockModel`].
pub const MOCK_SAMPLE_RATE: u32 = 16_000;

/// A mock model for pipeline and scheduling tests
pub struct MockModel {
    /// Zero-based call number that fails (None = never)
    fail_on_call: Option<usize>,
    /// Requests whose text contains this marker fail
    fail_on_text: Option<String>,
    /// Return bytes that are not a WAV file
    garbage: bool,
    /// Simulated inference time
    delay: Option<Duration>,
    call_count: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    requests: Mutex<Vec<SpeechRequest>>,
}

impl Default for MockModel {
    fn default() -> Self {
        Self::always_succeeds()
    }
}

impl MockModel {
    /// Create a model that always succeeds
    pub fn always_succeeds() -> Self {
        Self {
            fail_on_call: None,
            fail_on_text: None,
            garbage: false,
            delay: None,
            call_count: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Create a model whose `n`-th call (zero-based) fails
    pub fn fails_on_call(n: usize) -> Self {
        Self {
            fail_on_call: Some(n),
            ..Self::always_succeeds()
        }
    }

    /// Create a model that fails for any text containing `marker`
    pub fn fails_on_text(marker: &str) -> Self {
        Self {
            fail_on_text: Some(marker.to_string()),
            ..Self::always_succeeds()
        }
    }

    /// Create a model that answers with bytes that do not decode as audio
    pub fn returns_garbage() -> Self {
        Self {
            garbage: true,
            ..Self::always_succeeds()
        }
    }

    /// Sleep for `delay` inside every call
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Get the number of times synthesize() was called
    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }

    /// Highest number of overlapping synthesize() calls observed
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    /// Texts of all requests received, in call order
    pub fn texts(&self) -> Vec<String> {
        self.requests
            .lock()
            .map(|r| r.iter().map(|req| req.text.clone()).collect())
            .unwrap_or_default()
    }

    /// Render text the way this mock does: 16-bit mono, one sample per byte.
    pub fn render(text: &str) -> Vec<u8> {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: MOCK_SAMPLE_RATE,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };

        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer =
                hound::WavWriter::new(&mut cursor, spec).expect("in-memory WAV writer");
            for byte in text.bytes() {
                writer.write_sample(byte as i16).expect("in-memory WAV write");
            }
            writer.finalize().expect("in-memory WAV finalize");
        }
        cursor.into_inner()
    }
}

#[async_trait]
impl SpeechModel for MockModel {
    async fn synthesize(&self, request: &SpeechRequest) -> Result<Vec<u8>> {
        let call_num = self.call_count.fetch_add(1, Ordering::SeqCst);
        let concurrent = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(concurrent, Ordering::SeqCst);

        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request.clone());
        }

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.fail_on_call == Some(call_num) {
            return Err(SynthesisError::ResourceExhausted(format!(
                "mock failure on call {}",
                call_num
            )));
        }

        if let Some(marker) = &self.fail_on_text {
            if request.text.contains(marker.as_str()) {
                return Err(SynthesisError::InvalidInput(format!(
                    "mock rejects text containing {:?}",
                    marker
                )));
            }
        }

        if self.garbage {
            return Ok(b"definitely not a wav file".to_vec());
        }

        Ok(Self::render(&request.text))
    }

    fn name(&self) -> &'static str {
        "mock"
    }

    fn is_available(&self) -> Result<()> {
        Ok(())
    }
}
