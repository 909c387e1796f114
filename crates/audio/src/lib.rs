//! esquads-audio – Client-Audio fuer die Realtime-Bruecke
//!
//! - Mikrofon-Capture via cpal mit fester Frame-Groesse
//! - DSP: Echo- und Rauschunterdrueckung, AGC je nach Capture-Constraints
//! - PCM16-Quantisierung und base64-Kodierung fuer den Data-Channel
//! - Opus fuer den Media-Track und die Wiedergabe des Remote-Audios

pub mod capture;
pub mod codec;
pub mod device;
pub mod dsp;
pub mod error;
pub mod pcm;
pub mod pipeline;
pub mod playback;
pub mod recorder;

pub use capture::{CaptureConfig, CaptureConsumer, FrameAssembler};
pub use codec::{OpusConfig, OpusDecoder, OpusEncoder, OPUS_SAMPLE_RATE};
pub use device::{list_input_devices, list_output_devices, AudioDevice, DeviceKind};
pub use dsp::echo_cancel::{EchoAbo, EchoCancelConfig, EchoCanceller, EchoReferenz};
pub use dsp::AudioProcessor;
pub use error::{AudioError, AudioResult};
pub use pcm::{decode_pcm16, encode_audio_frame, float_to_pcm16, BASE64_CHUNK_BYTES};
pub use pipeline::{build_capture_pipeline, AudioPipeline};
pub use playback::{OpusPlayback, PlaybackConfig};
pub use recorder::{
    AudioFrame, AudioRecorder, CaptureConstraints, FrameCallback, FrameSource, RecorderConfig,
};
