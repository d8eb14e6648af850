//! WAV encode/decode for recognition uploads and speech artifacts.

use std::io::Cursor;
use std::path::Path;

use super::AudioClip;
use crate::error::{NikError, Result};

fn wav_err(e: hound::Error) -> NikError {
    match e {
        hound::Error::IoError(io) => NikError::Io(io),
        other => NikError::Other(other.into()),
    }
}

fn pcm16_spec(sample_rate: u32) -> hound::WavSpec {
    hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    }
}

fn to_i16(sample: f32) -> i16 {
    (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16
}

/// Encode a clip as an in-memory 16-bit PCM WAV file.
pub fn encode_wav_bytes(clip: &AudioClip) -> Result<Vec<u8>> {
    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer =
            hound::WavWriter::new(&mut cursor, pcm16_spec(clip.sample_rate)).map_err(wav_err)?;
        for &s in &clip.samples {
            writer.write_sample(to_i16(s)).map_err(wav_err)?;
        }
        writer.finalize().map_err(wav_err)?;
    }
    Ok(cursor.into_inner())
}

/// Read any PCM/float WAV file and downmix it to mono f32.
pub fn read_wav_mono(path: &Path) -> Result<AudioClip> {
    let mut reader = hound::WavReader::open(path).map_err(wav_err)?;
    let spec = reader.spec();
    let channels = usize::from(spec.channels.max(1));

    let interleaved: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .samples::<f32>()
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(wav_err)?,
        hound::SampleFormat::Int => {
            let max = ((1_i64 << (spec.bits_per_sample.clamp(1, 32) - 1)) - 1).max(1) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / max))
                .collect::<std::result::Result<Vec<_>, _>>()
                .map_err(wav_err)?
        }
    };

    let samples = if channels == 1 {
        interleaved
    } else {
        interleaved
            .chunks(channels)
            .map(|frame| frame.iter().sum::<f32>() / channels as f32)
            .collect()
    };

    Ok(AudioClip::new(samples, spec.sample_rate))
}
