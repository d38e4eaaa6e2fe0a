//! Shared test doubles: an instrumented speech backend with manually
//! driven completions, and a hook recorder.

use std::cell::RefCell;
use std::rc::Rc;

use chalkcast::{
    ChalkResult, PlaybackHooks, SpeechBackend, SpeechEvent, SpeechEventKind, SpeechRequest,
    UtteranceId, Voice,
};

#[derive(Default)]
pub struct RecState {
    /// Ordered call log: `speak:<text>@<rate>` and `cancel` entries.
    pub log: Vec<String>,
    pub pending: Option<(UtteranceId, String)>,
    pub queued: Vec<SpeechEvent>,
    /// When set, every utterance finishes on the next poll.
    pub auto_finish: bool,
}

/// Speech backend that records call ordering and lets tests decide when
/// an utterance "finishes", to stage completion races deliberately.
#[derive(Clone, Default)]
pub struct RecordingBackend(pub Rc<RefCell<RecState>>);

impl RecordingBackend {
    pub fn auto_finishing() -> Self {
        let backend = Self::default();
        backend.0.borrow_mut().auto_finish = true;
        backend
    }

    /// Deliver `Finished` for the in-flight utterance on the next poll.
    pub fn finish_pending(&self) {
        let mut s = self.0.borrow_mut();
        if let Some((id, _)) = s.pending.take() {
            s.queued.push(SpeechEvent {
                utterance: id,
                kind: SpeechEventKind::Finished,
            });
        }
    }

    /// Queue a completion for an utterance the backend no longer tracks,
    /// mimicking a synthesizer callback that was already dispatched when
    /// the cancellation happened.
    pub fn inject_finished(&self, id: UtteranceId) {
        self.0.borrow_mut().queued.push(SpeechEvent {
            utterance: id,
            kind: SpeechEventKind::Finished,
        });
    }

    pub fn speak_count(&self) -> usize {
        self.0
            .borrow()
            .log
            .iter()
            .filter(|e| e.starts_with("speak:"))
            .count()
    }

    pub fn log(&self) -> Vec<String> {
        self.0.borrow().log.clone()
    }

    pub fn pending_utterance(&self) -> Option<UtteranceId> {
        self.0.borrow().pending.as_ref().map(|(id, _)| *id)
    }
}

impl SpeechBackend for RecordingBackend {
    fn voices(&self) -> Vec<Voice> {
        Vec::new()
    }

    fn speak(&mut self, req: &SpeechRequest) -> ChalkResult<()> {
        let mut s = self.0.borrow_mut();
        s.log.push(format!("speak:{}@{}", req.text, req.rate));
        s.pending = Some((req.utterance, req.text.clone()));
        Ok(())
    }

    fn cancel(&mut self) {
        let mut s = self.0.borrow_mut();
        s.log.push("cancel".to_string());
        s.pending = None;
    }

    fn tick(&mut self, _dt: f64) {}

    fn poll(&mut self) -> Vec<SpeechEvent> {
        let mut s = self.0.borrow_mut();
        if s.auto_finish
            && let Some((id, _)) = s.pending.take()
        {
            s.queued.push(SpeechEvent {
                utterance: id,
                kind: SpeechEventKind::Finished,
            });
        }
        std::mem::take(&mut s.queued)
    }
}

/// Timeline of `n` plain slides narrated "narration-0", "narration-1", ...
pub fn plain_timeline(n: usize) -> chalkcast::Timeline {
    let slides: Vec<serde_json::Value> = (0..n)
        .map(|i| {
            serde_json::json!({
                "id": format!("s{i}"),
                "narration": format!("narration-{i}"),
                "duration": 10.0
            })
        })
        .collect();
    serde_json::from_value(serde_json::json!({
        "title": "test timeline",
        "slides": slides
    }))
    .expect("test timeline is valid")
}

/// Three-slide timeline whose middle slide is a quiz gate.
pub fn quiz_timeline() -> chalkcast::Timeline {
    let mut timeline = plain_timeline(3);
    let quiz: chalkcast::Quiz = serde_json::from_value(serde_json::json!({
        "question": "2 + 2?",
        "options": ["3", "4"],
        "correctIndex": 1,
        "teacherIntro": "time for a question",
        "correctFeedback": "well done",
        "wrongFeedback": "the answer was four"
    }))
    .expect("test quiz is valid");
    timeline.slides[1].is_quiz_slide = true;
    timeline.slides[1].quiz = Some(quiz);
    timeline
}

/// Hook recorder: collects lifecycle callbacks as readable strings.
#[derive(Clone, Default)]
pub struct RecordingHooks(pub Rc<RefCell<Vec<String>>>);

impl RecordingHooks {
    pub fn count_of(&self, prefix: &str) -> usize {
        self.0
            .borrow()
            .iter()
            .filter(|e| e.starts_with(prefix))
            .count()
    }
}

impl PlaybackHooks for RecordingHooks {
    fn on_phase_change(&mut self, phase: chalkcast::Phase) {
        self.0.borrow_mut().push(format!("phase:{phase:?}"));
    }
    fn on_slide_change(&mut self, index: usize) {
        self.0.borrow_mut().push(format!("slide:{index}"));
    }
    fn on_quiz_gate(&mut self, index: usize) {
        self.0.borrow_mut().push(format!("gate:{index}"));
    }
    fn on_word_boundary(&mut self, char_index: usize) {
        self.0.borrow_mut().push(format!("boundary:{char_index}"));
    }
    fn on_sequence_end(&mut self) {
        self.0.borrow_mut().push("end".to_string());
    }
}
