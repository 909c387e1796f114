//! PCM16-Kodierung fuer den Realtime-Data-Channel
//!
//! Ein Frame aus f32-Samples wird in drei Schritten zur Transport-Nutzlast:
//! 1. Quantisierung auf i16 (Clamping auf [-1, 1], asymmetrische Skalierung)
//! 2. Packen in Bytes (plattform-native Byte-Reihenfolge)
//! 3. base64, in Bloecken zu 32 KiB in den Encoder geschrieben
//!
//! Der Streaming-Encoder puffert Restbytes zwischen den Bloecken, deshalb ist
//! die Ausgabe identisch zur einmaligen Kodierung des ganzen Puffers.

use std::io::Write;

use base64::engine::general_purpose::STANDARD;
use base64::write::EncoderStringWriter;
use base64::Engine as _;

use crate::error::{AudioError, AudioResult};

/// Blockgroesse fuer die base64-Kodierung in Bytes
pub const BASE64_CHUNK_BYTES: usize = 0x8000;

/// Quantisiert f32-Samples auf i16.
///
/// Negative Werte werden mit 32768, positive mit 32767 skaliert, sodass
/// -1.0 und 1.0 exakt auf `i16::MIN` und `i16::MAX` fallen.
pub fn float_to_pcm16(samples: &[f32]) -> Vec<i16> {
    samples
        .iter()
        .map(|&s| {
            let s = s.clamp(-1.0, 1.0);
            if s < 0.0 {
                (s * 32768.0) as i16
            } else {
                (s * 32767.0) as i16
            }
        })
        .collect()
}

/// Packt i16-Samples in native Byte-Reihenfolge
pub fn pcm16_to_bytes(samples: &[i16]) -> Vec<u8> {
    let mut out = Vec::with_capacity(samples.len() * 2);
    for s in samples {
        out.extend_from_slice(&s.to_ne_bytes());
    }
    out
}

/// base64-Kodierung in Bloecken von `chunk_size` Bytes
pub fn encode_base64_chunked(bytes: &[u8], chunk_size: usize) -> AudioResult<String> {
    let mut writer = EncoderStringWriter::new(&STANDARD);
    for chunk in bytes.chunks(chunk_size.max(1)) {
        writer.write_all(chunk)?;
    }
    Ok(writer.into_inner())
}

/// Kodiert einen Frame zur Nutzlast fuer `input_audio_buffer.append`
pub fn encode_audio_frame(samples: &[f32]) -> AudioResult<String> {
    let bytes = pcm16_to_bytes(&float_to_pcm16(samples));
    encode_base64_chunked(&bytes, BASE64_CHUNK_BYTES)
}

/// Dekodiert eine base64-Nutzlast zurueck in i16-Samples
pub fn decode_pcm16(encoded: &str) -> AudioResult<Vec<i16>> {
    let bytes = STANDARD
        .decode(encoded)
        .map_err(|e| AudioError::Kodierung(e.to_string()))?;
    if bytes.len() % 2 != 0 {
        return Err(AudioError::Kodierung(format!(
            "PCM16-Puffer mit ungerader Laenge: {} Bytes",
            bytes.len()
        )));
    }
    Ok(bytes
        .chunks_exact(2)
        .map(|b| i16::from_ne_bytes([b[0], b[1]]))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Deterministische Testdaten ohne Zufallsgenerator
    fn testbytes(len: usize) -> Vec<u8> {
        (0..len).map(|i| ((i * 31 + i / 7) % 251) as u8).collect()
    }

    #[test]
    fn extremwerte_exakt() {
        assert_eq!(float_to_pcm16(&[-1.0, 1.0, 0.0]), vec![i16::MIN, i16::MAX, 0]);
    }

    #[test]
    fn ausserhalb_des_bereichs_saettigt() {
        assert_eq!(float_to_pcm16(&[2.5, -7.0]), vec![i16::MAX, i16::MIN]);
    }

    #[test]
    fn quantisierung_monoton_und_vorzeichentreu() {
        let eingabe: Vec<f32> = (-300..=300).map(|i| i as f32 / 200.0).collect();
        let ausgabe = float_to_pcm16(&eingabe);
        for paar in ausgabe.windows(2) {
            assert!(paar[0] <= paar[1], "nicht monoton: {:?}", paar);
        }
        for (f, q) in eingabe.iter().zip(&ausgabe) {
            if *f < 0.0 {
                assert!(*q <= 0, "Vorzeichen verloren bei {}", f);
            } else {
                assert!(*q >= 0, "Vorzeichen verloren bei {}", f);
            }
        }
    }

    #[test]
    fn nan_wird_null() {
        assert_eq!(float_to_pcm16(&[f32::NAN]), vec![0]);
    }

    #[test]
    fn blockweise_gleich_einmalig() {
        let bytes = testbytes(BASE64_CHUNK_BYTES * 3 + 1234);
        let blockweise = encode_base64_chunked(&bytes, BASE64_CHUNK_BYTES).unwrap();
        assert_eq!(blockweise, STANDARD.encode(&bytes));
    }

    #[test]
    fn ungerade_blockgroesse_gleich_einmalig() {
        let bytes = testbytes(10_000);
        assert_eq!(
            encode_base64_chunked(&bytes, 7).unwrap(),
            STANDARD.encode(&bytes)
        );
    }

    #[test]
    fn leerer_puffer() {
        assert_eq!(encode_base64_chunked(&[], BASE64_CHUNK_BYTES).unwrap(), "");
        assert_eq!(encode_audio_frame(&[]).unwrap(), "");
    }

    #[test]
    fn zwei_stille_frames() {
        let frames = [vec![0.0f32; 4096], vec![0.0f32; 4096]];
        for frame in &frames {
            let payload = encode_audio_frame(frame).unwrap();
            let bytes = STANDARD.decode(&payload).unwrap();
            assert_eq!(bytes.len(), 8192);
            assert!(bytes.iter().all(|&b| b == 0));
            let samples = decode_pcm16(&payload).unwrap();
            assert_eq!(samples.len(), 4096);
            assert!(samples.iter().all(|&s| s == 0));
        }
    }

    #[test]
    fn dekodierung_entspricht_quantisierung() {
        let frame: Vec<f32> = (0..4096).map(|i| ((i as f32) * 0.013).sin()).collect();
        let payload = encode_audio_frame(&frame).unwrap();
        assert_eq!(decode_pcm16(&payload).unwrap(), float_to_pcm16(&frame));
    }

    #[test]
    fn ungerade_laenge_abgelehnt() {
        let payload = STANDARD.encode([1u8, 2, 3]);
        assert!(matches!(decode_pcm16(&payload), Err(AudioError::Kodierung(_))));
    }

    #[test]
    fn ungueltiges_base64_abgelehnt() {
        assert!(decode_pcm16("%%%").is_err());
    }
}
