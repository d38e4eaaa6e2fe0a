use crate::error::ChalkResult;

/// Simulated utterance length used when audio cannot or must not play
/// (muted, empty text, synthesizer unavailable). Measured in narration
/// time, so the playback-rate-scaled clock shortens it like real speech.
pub const SILENT_UTTERANCE_SECS: f64 = 0.75;

/// Monotonic handle for one utterance issued through a driver.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct UtteranceId(pub u64);

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum VoiceGender {
    Female,
    Male,
}

/// One synthesizer voice as reported by the backend.
#[derive(Clone, Debug, PartialEq)]
pub struct Voice {
    pub name: String,
    /// BCP-47 tag, e.g. `en-US`.
    pub locale: String,
    pub gender: Option<VoiceGender>,
}

/// Host preference for voice selection.
///
/// Resolution order: first preferred name present, then locale + gender,
/// then any voice whose locale shares the language code, then the
/// backend default (`None`).
#[derive(Clone, Debug)]
pub struct VoicePreference {
    pub locale: String,
    pub gender: Option<VoiceGender>,
    pub preferred_names: Vec<String>,
}

impl Default for VoicePreference {
    fn default() -> Self {
        Self {
            locale: "en-US".to_string(),
            gender: Some(VoiceGender::Female),
            preferred_names: vec!["Samantha".to_string(), "Google US English".to_string()],
        }
    }
}

pub fn select_voice(voices: &[Voice], pref: &VoicePreference) -> Option<Voice> {
    for name in &pref.preferred_names {
        if let Some(v) = voices
            .iter()
            .find(|v| v.name.eq_ignore_ascii_case(name))
        {
            return Some(v.clone());
        }
    }
    if let Some(gender) = pref.gender {
        if let Some(v) = voices
            .iter()
            .find(|v| v.locale.eq_ignore_ascii_case(&pref.locale) && v.gender == Some(gender))
        {
            return Some(v.clone());
        }
    }
    let lang = pref.locale.split('-').next().unwrap_or(&pref.locale);
    voices
        .iter()
        .find(|v| {
            v.locale.eq_ignore_ascii_case(&pref.locale)
                || v.locale
                    .split('-')
                    .next()
                    .is_some_and(|l| l.eq_ignore_ascii_case(lang))
        })
        .cloned()
}

/// What the driver asks a backend to say.
#[derive(Clone, Debug)]
pub struct SpeechRequest {
    pub utterance: UtteranceId,
    pub text: String,
    /// Positive speech-rate multiplier.
    pub rate: f64,
    /// Resolved voice, or `None` for the backend default.
    pub voice: Option<Voice>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SpeechEventKind {
    /// Word-boundary progress: character index reached in the utterance
    /// text. Observational only.
    Boundary { char_index: usize },
    Finished,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SpeechEvent {
    pub utterance: UtteranceId,
    pub kind: SpeechEventKind,
}

/// The platform speech-synthesis primitive.
///
/// One utterance may be audible at a time process-wide: `speak` on any
/// backend implicitly supersedes prior audio, and `cancel` must stop the
/// current utterance without emitting a `Finished` event for it.
/// Completion and boundary events are pulled through `poll` by the
/// engine's tick loop; `tick` advances backends that simulate time.
pub trait SpeechBackend {
    fn voices(&self) -> Vec<Voice>;
    fn speak(&mut self, req: &SpeechRequest) -> ChalkResult<()>;
    fn cancel(&mut self);
    fn tick(&mut self, dt: f64);
    fn poll(&mut self) -> Vec<SpeechEvent>;
}

/// Backend for hosts without a synthesizer: every utterance "finishes"
/// after [`SILENT_UTTERANCE_SECS`] of ticked time. Indistinguishable to
/// the controller from real (muted) speech.
#[derive(Default)]
pub struct SilentBackend {
    current: Option<(UtteranceId, f64)>,
    events: Vec<SpeechEvent>,
}

impl SilentBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SpeechBackend for SilentBackend {
    fn voices(&self) -> Vec<Voice> {
        Vec::new()
    }

    fn speak(&mut self, req: &SpeechRequest) -> ChalkResult<()> {
        self.current = Some((req.utterance, SILENT_UTTERANCE_SECS));
        Ok(())
    }

    fn cancel(&mut self) {
        self.current = None;
    }

    fn tick(&mut self, dt: f64) {
        if let Some((id, remaining)) = &mut self.current {
            *remaining -= dt;
            if *remaining <= 0.0 {
                self.events.push(SpeechEvent {
                    utterance: *id,
                    kind: SpeechEventKind::Finished,
                });
                self.current = None;
            }
        }
    }

    fn poll(&mut self) -> Vec<SpeechEvent> {
        std::mem::take(&mut self.events)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NarrationEvent {
    Boundary {
        utterance: UtteranceId,
        char_index: usize,
    },
    Finished {
        utterance: UtteranceId,
    },
}

struct SilentUtterance {
    id: UtteranceId,
    remaining: f64,
}

/// Wraps a [`SpeechBackend`] with single-utterance cancellation tracking,
/// voice selection and a mute path.
///
/// `speak` always cancels the previous utterance first, and events for
/// anything but the current utterance are discarded, so a cancelled
/// utterance can never deliver `Finished` — the invariant the playback
/// controller's sequencing is built on.
pub struct NarrationDriver {
    backend: Box<dyn SpeechBackend>,
    preference: VoicePreference,
    next_id: u64,
    current: Option<UtteranceId>,
    muted: bool,
    silent: Option<SilentUtterance>,
}

impl NarrationDriver {
    pub fn new(backend: Box<dyn SpeechBackend>, preference: VoicePreference) -> Self {
        Self {
            backend,
            preference,
            next_id: 0,
            current: None,
            muted: false,
            silent: None,
        }
    }

    pub fn is_muted(&self) -> bool {
        self.muted
    }

    /// Mute or unmute. Muting mid-utterance silences the audio but keeps
    /// the utterance "running" on the simulated clock under the same id,
    /// so the caller's sequencing is unaffected.
    pub fn set_muted(&mut self, muted: bool) {
        if self.muted == muted {
            return;
        }
        self.muted = muted;
        if muted && self.current.is_some() && self.silent.is_none() {
            self.backend.cancel();
            if let Some(id) = self.current {
                self.silent = Some(SilentUtterance {
                    id,
                    remaining: SILENT_UTTERANCE_SECS,
                });
            }
        }
    }

    /// Start a new utterance, cancelling any in flight.
    ///
    /// Empty text, muted state and backend failure all degrade to a
    /// simulated completion so the caller never stalls waiting on audio
    /// that cannot occur.
    pub fn speak(&mut self, text: &str, rate: f64) -> UtteranceId {
        self.stop();

        let id = UtteranceId(self.next_id);
        self.next_id += 1;
        self.current = Some(id);

        if text.trim().is_empty() {
            // Complete on the next tick.
            self.silent = Some(SilentUtterance { id, remaining: 0.0 });
            return id;
        }
        if self.muted {
            self.silent = Some(SilentUtterance {
                id,
                remaining: SILENT_UTTERANCE_SECS,
            });
            return id;
        }

        let voice = select_voice(&self.backend.voices(), &self.preference);
        let req = SpeechRequest {
            utterance: id,
            text: text.to_string(),
            rate,
            voice,
        };
        if let Err(err) = self.backend.speak(&req) {
            tracing::debug!(%err, "synthesizer unavailable, degrading to silent completion");
            self.silent = Some(SilentUtterance {
                id,
                remaining: SILENT_UTTERANCE_SECS,
            });
        }
        id
    }

    /// Cancel the current utterance without emitting its completion.
    pub fn stop(&mut self) {
        if self.current.take().is_some() {
            self.backend.cancel();
        }
        self.silent = None;
    }

    /// Advance simulated time and drain backend events, keeping only
    /// those belonging to the current utterance.
    pub fn tick(&mut self, dt: f64) -> Vec<NarrationEvent> {
        let mut out = Vec::new();

        self.backend.tick(dt);

        if let Some(silent) = &mut self.silent {
            silent.remaining -= dt;
            if silent.remaining <= 0.0 {
                let id = silent.id;
                self.silent = None;
                if self.current == Some(id) {
                    self.current = None;
                    out.push(NarrationEvent::Finished { utterance: id });
                }
            }
        }

        for ev in self.backend.poll() {
            if Some(ev.utterance) != self.current {
                tracing::debug!(utterance = ev.utterance.0, "dropping stale speech event");
                continue;
            }
            match ev.kind {
                SpeechEventKind::Boundary { char_index } => {
                    out.push(NarrationEvent::Boundary {
                        utterance: ev.utterance,
                        char_index,
                    });
                }
                SpeechEventKind::Finished => {
                    self.current = None;
                    out.push(NarrationEvent::Finished {
                        utterance: ev.utterance,
                    });
                }
            }
        }

        out
    }
}

impl Drop for NarrationDriver {
    fn drop(&mut self) {
        // Release the shared synthesizer on every teardown path.
        self.backend.cancel();
    }
}
