//! In-memory PCM waveform plus its format.

use crate::storage;
use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use std::io::{BufWriter, Cursor, Read, Seek, Write};
use std::path::Path;

/// Decoded samples, interleaved across channels.
#[derive(Debug, Clone, PartialEq)]
pub enum Samples {
    /// Integer PCM of up to 32 bits per sample
    Int(Vec<i32>),
    /// 32-bit float PCM
    Float(Vec<f32>),
}

impl Samples {
    pub fn len(&self) -> usize {
        match self {
            Samples::Int(s) => s.len(),
            Samples::Float(s) => s.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A waveform produced for exactly one chunk.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioSegment {
    pub spec: WavSpec,
    pub samples: Samples,
}

impl AudioSegment {
    /// Decode a complete WAV file held in memory.
    pub fn from_wav_bytes(bytes: &[u8]) -> Result<Self, hound::Error> {
        Self::decode(WavReader::new(Cursor::new(bytes))?)
    }

    /// Decode a WAV file from disk.
    pub fn read(path: &Path) -> Result<Self, hound::Error> {
        Self::decode(WavReader::open(path)?)
    }

    fn decode<R: Read>(reader: WavReader<R>) -> Result<Self, hound::Error> {
        let spec = reader.spec();
        let samples = match spec.sample_format {
            SampleFormat::Int => {
                Samples::Int(reader.into_samples::<i32>().collect::<Result<_, _>>()?)
            }
            SampleFormat::Float => {
                Samples::Float(reader.into_samples::<f32>().collect::<Result<_, _>>()?)
            }
        };
        Ok(Self { spec, samples })
    }

    /// Duration in milliseconds.
    pub fn duration_ms(&self) -> u64 {
        let frames = self.samples.len() as u64 / self.spec.channels.max(1) as u64;
        frames * 1000 / self.spec.sample_rate.max(1) as u64
    }

    /// Encode as WAV into any seekable writer.
    pub fn write_to<W: Write + Seek>(&self, writer: W) -> Result<(), hound::Error> {
        let mut wav = WavWriter::new(writer, self.spec)?;
        self.write_samples(&mut wav)?;
        wav.finalize()
    }

    /// Stream the samples into an open writer whose spec matches this segment.
    pub fn write_samples<W: Write + Seek>(
        &self,
        wav: &mut WavWriter<W>,
    ) -> Result<(), hound::Error> {
        match &self.samples {
            Samples::Int(samples) => {
                for &s in samples {
                    wav.write_sample(s)?;
                }
            }
            Samples::Float(samples) => {
                for &s in samples {
                    wav.write_sample(s)?;
                }
            }
        }
        Ok(())
    }

    /// Write the segment to `dest` through a temp file and an atomic rename.
    pub fn save(&self, dest: &Path) -> Result<(), hound::Error> {
        let temp = storage::temp_beside(dest)?;
        let mut out = BufWriter::new(temp.as_file());
        self.write_to(&mut out)?;
        out.flush()?;
        drop(out);
        storage::publish(temp, dest)?;
        Ok(())
    }
}
