#![forbid(unsafe_code)]

pub mod core;
pub mod ease;
pub mod error;
pub mod model;
pub mod playback;
pub mod shape;
pub mod speech;
pub mod whiteboard;

pub use core::{Canvas, FrameRGBA, Rgba8};
pub use ease::Ease;
pub use error::{ChalkError, ChalkResult};
pub use model::{DrawingInstruction, MIN_DRAW_DURATION, Quiz, Slide, Timeline};
pub use playback::{
    HostAction, NoopHooks, Phase, PlaybackController, PlaybackHooks, QuizOutcome, key_action,
};
pub use shape::{Shape, parse_shape};
pub use speech::{
    NarrationDriver, NarrationEvent, SILENT_UTTERANCE_SECS, SilentBackend, SpeechBackend,
    SpeechEvent, SpeechEventKind, SpeechRequest, UtteranceId, Voice, VoiceGender, VoicePreference,
};
pub use whiteboard::Whiteboard;
