//! PCM to WAV conversion for synthesized narration.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use crate::error::SpeechError;

/// Size of the canonical RIFF/WAVE header.
pub const HEADER_LEN: usize = 44;

/// Sample rate of the speech endpoint's PCM output.
pub const TTS_SAMPLE_RATE: u32 = 24_000;

const CHANNELS: u16 = 1;
const BITS_PER_SAMPLE: u16 = 16;
const BLOCK_ALIGN: u16 = CHANNELS * BITS_PER_SAMPLE / 8;

/// Header for `data_len` bytes of 16-bit mono linear PCM. Fails when a
/// size field does not fit in 32 bits.
pub fn wav_header(data_len: usize, sample_rate: u32) -> Result<[u8; HEADER_LEN], SpeechError> {
    let too_large = || SpeechError::AudioTooLarge { bytes: data_len };
    let data_len = u32::try_from(data_len).map_err(|_| too_large())?;
    let riff_len = data_len.checked_add(36).ok_or_else(too_large)?;
    let byte_rate = sample_rate
        .checked_mul(u32::from(BLOCK_ALIGN))
        .ok_or(SpeechError::InvalidSampleRate(sample_rate))?;

    let mut h = [0u8; HEADER_LEN];
    h[0..4].copy_from_slice(b"RIFF");
    h[4..8].copy_from_slice(&riff_len.to_le_bytes());
    h[8..12].copy_from_slice(b"WAVE");
    h[12..16].copy_from_slice(b"fmt ");
    h[16..20].copy_from_slice(&16u32.to_le_bytes());
    h[20..22].copy_from_slice(&1u16.to_le_bytes());
    h[22..24].copy_from_slice(&CHANNELS.to_le_bytes());
    h[24..28].copy_from_slice(&sample_rate.to_le_bytes());
    h[28..32].copy_from_slice(&byte_rate.to_le_bytes());
    h[32..34].copy_from_slice(&BLOCK_ALIGN.to_le_bytes());
    h[34..36].copy_from_slice(&BITS_PER_SAMPLE.to_le_bytes());
    h[36..40].copy_from_slice(b"data");
    h[40..44].copy_from_slice(&data_len.to_le_bytes());
    Ok(h)
}

/// Decode base64 PCM and prefix it with a WAV header. The PCM bytes are
/// copied verbatim.
pub fn pcm_to_wav(base64_pcm: &str, sample_rate: u32) -> Result<Vec<u8>, SpeechError> {
    let pcm = STANDARD.decode(base64_pcm.trim())?;
    let header = wav_header(pcm.len(), sample_rate)?;
    let mut out = Vec::with_capacity(HEADER_LEN + pcm.len());
    out.extend_from_slice(&header);
    out.extend_from_slice(&pcm);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn u32_at(buf: &[u8], at: usize) -> u32 {
        u32::from_le_bytes([buf[at], buf[at + 1], buf[at + 2], buf[at + 3]])
    }

    fn u16_at(buf: &[u8], at: usize) -> u16 {
        u16::from_le_bytes([buf[at], buf[at + 1]])
    }

    #[test]
    fn header_declares_sizes_and_rates() {
        for (pcm, rate) in [(vec![0u8; 0], 24_000u32), (vec![1, 2, 3, 4, 5], 16_000), ((0..=255).collect(), 44_100)] {
            let wav = pcm_to_wav(&STANDARD.encode(&pcm), rate).unwrap();
            let len = pcm.len() as u32;

            assert_eq!(&wav[0..4], b"RIFF");
            assert_eq!(u32_at(&wav, 4), 36 + len);
            assert_eq!(&wav[8..16], b"WAVEfmt ");
            assert_eq!(u32_at(&wav, 16), 16);
            assert_eq!(u16_at(&wav, 20), 1);
            assert_eq!(u16_at(&wav, 22), 1);
            assert_eq!(u32_at(&wav, 24), rate);
            assert_eq!(u32_at(&wav, 28), rate * 2);
            assert_eq!(u16_at(&wav, 32), 2);
            assert_eq!(u16_at(&wav, 34), 16);
            assert_eq!(&wav[36..40], b"data");
            assert_eq!(u32_at(&wav, 40), len);
            assert_eq!(&wav[HEADER_LEN..], &pcm[..]);
        }
    }

    #[test]
    fn malformed_base64_is_an_error() {
        assert!(matches!(
            pcm_to_wav("not base64!!", TTS_SAMPLE_RATE),
            Err(SpeechError::Decode(_))
        ));
    }

    #[test]
    fn oversized_fields_are_rejected() {
        assert!(matches!(
            wav_header(16, u32::MAX / 2 + 1),
            Err(SpeechError::InvalidSampleRate(_))
        ));
        assert!(wav_header(16, u32::MAX / 2).is_ok());
        assert!(matches!(
            wav_header(u32::MAX as usize - 35, TTS_SAMPLE_RATE),
            Err(SpeechError::AudioTooLarge { .. })
        ));
        #[cfg(target_pointer_width = "64")]
        assert!(matches!(
            wav_header(u32::MAX as usize + 1, TTS_SAMPLE_RATE),
            Err(SpeechError::AudioTooLarge { .. })
        ));
    }

    #[test]
    fn output_is_readable_as_pcm16_mono() {
        let samples: Vec<u8> = [0i16, 1000, -1000, i16::MAX]
            .iter()
            .flat_map(|s| s.to_le_bytes())
            .collect();
        let wav = pcm_to_wav(&STANDARD.encode(&samples), TTS_SAMPLE_RATE).unwrap();
        assert_eq!(wav.len(), HEADER_LEN + 8);
        assert_eq!(i16::from_le_bytes([wav[46], wav[47]]), 1000);
    }
}
