//! The canonical audio container: 16-bit PCM WAV.

use crate::{Error, Result};
use std::io::Cursor;

/// Decoded audio as interleaved `f32` samples in `[-1.0, 1.0]`.
#[derive(Debug, Clone, PartialEq)]
pub struct PcmAudio {
    pub channels: u16,
    pub sample_rate: u32,
    pub samples: Vec<f32>,
}

impl PcmAudio {
    /// Number of sample frames (one sample per channel).
    pub fn frames(&self) -> usize {
        if self.channels == 0 {
            0
        } else {
            self.samples.len() / self.channels as usize
        }
    }

    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            0.0
        } else {
            self.frames() as f64 / self.sample_rate as f64
        }
    }
}

/// Whether the bytes start with a RIFF/WAVE header.
pub fn is_wav(data: &[u8]) -> bool {
    data.len() >= 12 && &data[0..4] == b"RIFF" && &data[8..12] == b"WAVE"
}

/// Decode WAV bytes of any integer depth or 32-bit float.
pub fn decode_wav(data: &[u8]) -> Result<PcmAudio> {
    let mut reader = hound::WavReader::new(Cursor::new(data))
        .map_err(|e| Error::decode(format!("unreadable WAV: {}", e)))?;
    let spec = reader.spec();

    let samples: std::result::Result<Vec<f32>, hound::Error> = match spec.sample_format {
        hound::SampleFormat::Float => reader.samples::<f32>().collect(),
        hound::SampleFormat::Int => {
            let scale = (1i64 << (spec.bits_per_sample.saturating_sub(1))) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / scale))
                .collect()
        }
    };
    let samples = samples.map_err(|e| Error::decode(format!("corrupt WAV samples: {}", e)))?;

    Ok(PcmAudio {
        channels: spec.channels,
        sample_rate: spec.sample_rate,
        samples,
    })
}

/// Encode samples as 16-bit PCM WAV.
pub fn encode_wav(audio: &PcmAudio) -> Result<Vec<u8>> {
    let spec = hound::WavSpec {
        channels: audio.channels,
        sample_rate: audio.sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec)
            .map_err(|e| Error::encode(format!("WAV writer rejected spec: {}", e)))?;
        for sample in &audio.samples {
            let value = (sample.clamp(-1.0, 1.0) * i16::MAX as f32).round() as i16;
            writer
                .write_sample(value)
                .map_err(|e| Error::encode(format!("WAV write failed: {}", e)))?;
        }
        writer
            .finalize()
            .map_err(|e| Error::encode(format!("WAV finalize failed: {}", e)))?;
    }

    Ok(cursor.into_inner())
}
