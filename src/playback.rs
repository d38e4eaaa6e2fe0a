use std::collections::BTreeSet;

use crate::{
    model::{Slide, Timeline},
    speech::{NarrationDriver, NarrationEvent, UtteranceId},
};

/// Playback phases. `QuizGate` means narration finished on a quiz slide
/// and the engine is waiting for [`PlaybackController::answer_quiz`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Playing,
    Paused,
    QuizGate,
    Ended,
}

/// What the narration currently in flight was started for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum NarrationKind {
    Slide,
    QuizIntro,
    QuizFeedback,
}

#[derive(Clone, Copy, Debug)]
struct ActiveNarration {
    generation: u64,
    utterance: UtteranceId,
    kind: NarrationKind,
}

/// Recorded result of one quiz gate. A `None` selection is a timeout:
/// spoken as wrong, scored distinctly.
#[derive(Clone, Debug, serde::Serialize)]
pub struct QuizOutcome {
    pub slide_id: String,
    pub correct: bool,
    pub selected: Option<usize>,
    pub timed_out: bool,
}

/// Lifecycle callbacks the engine emits outward. All default to no-ops;
/// hosts override what they observe.
pub trait PlaybackHooks {
    fn on_phase_change(&mut self, _phase: Phase) {}
    fn on_slide_change(&mut self, _index: usize) {}
    fn on_quiz_gate(&mut self, _index: usize) {}
    fn on_word_boundary(&mut self, _char_index: usize) {}
    fn on_sequence_end(&mut self) {}
}

pub struct NoopHooks;

impl PlaybackHooks for NoopHooks {}

/// Host-level keyboard convenience mapping. Not core logic; hosts feed
/// key names (lowercased) and dispatch the returned action themselves.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HostAction {
    TogglePlay,
    PrevSlide,
    NextSlide,
    ToggleFullscreen,
    ToggleMute,
}

pub fn key_action(key: &str) -> Option<HostAction> {
    match key {
        " " | "space" => Some(HostAction::TogglePlay),
        "arrowleft" | "left" => Some(HostAction::PrevSlide),
        "arrowright" | "right" => Some(HostAction::NextSlide),
        "f" => Some(HostAction::ToggleFullscreen),
        "m" => Some(HostAction::ToggleMute),
        _ => None,
    }
}

/// The playback state machine: sequences slides, drives the narration
/// driver, advances on narration completion, and gates on quiz answers.
///
/// Single-threaded and tick-driven: the host calls [`tick`] on a fixed
/// interval; the tick advances the rate-scaled elapsed clock and pumps
/// narration events. Every user-initiated interruption bumps a
/// generation token, and completion handling discards events whose
/// captured generation no longer matches — the race-prevention invariant
/// that keeps a stale completion from advancing past a seek.
///
/// [`tick`]: PlaybackController::tick
pub struct PlaybackController {
    timeline: Timeline,
    driver: NarrationDriver,
    hooks: Box<dyn PlaybackHooks>,
    phase: Phase,
    current_slide: usize,
    elapsed_in_slide: f64,
    rate: f64,
    generation: u64,
    active: Option<ActiveNarration>,
    answered: BTreeSet<usize>,
    outcomes: Vec<QuizOutcome>,
}

impl PlaybackController {
    pub fn new(timeline: Timeline, driver: NarrationDriver, hooks: Box<dyn PlaybackHooks>) -> Self {
        Self {
            timeline,
            driver,
            hooks,
            phase: Phase::Idle,
            current_slide: 0,
            elapsed_in_slide: 0.0,
            rate: 1.0,
            generation: 0,
            active: None,
            answered: BTreeSet::new(),
            outcomes: Vec::new(),
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn current_slide(&self) -> usize {
        self.current_slide
    }

    pub fn current_slide_data(&self) -> Option<&Slide> {
        self.timeline.slides.get(self.current_slide)
    }

    /// Seconds of drawing time elapsed in the current slide (already
    /// rate-scaled).
    pub fn elapsed_in_slide(&self) -> f64 {
        self.elapsed_in_slide
    }

    pub fn playback_rate(&self) -> f64 {
        self.rate
    }

    pub fn is_muted(&self) -> bool {
        self.driver.is_muted()
    }

    pub fn timeline(&self) -> &Timeline {
        &self.timeline
    }

    pub fn outcomes(&self) -> &[QuizOutcome] {
        &self.outcomes
    }

    /// Whole-timeline progress in `[0, 1]` from the advisory per-slide
    /// durations. Display-only; advancement stays narration-driven.
    pub fn timeline_progress(&self) -> f64 {
        if self.phase == Phase::Ended {
            return 1.0;
        }
        let total = self.timeline.total_duration();
        if total <= 0.0 {
            return 0.0;
        }
        let done: f64 = self
            .timeline
            .slides
            .iter()
            .take(self.current_slide)
            .map(|s| s.duration.max(0.0))
            .sum();
        let within = self
            .current_slide_data()
            .map(|s| self.elapsed_in_slide.min(s.duration.max(0.0)))
            .unwrap_or(0.0);
        ((done + within) / total).clamp(0.0, 1.0)
    }

    /// Begin (or resume) playback of the current slide.
    ///
    /// From `Ended` this restarts the presentation at slide 0. A no-op
    /// while already playing or gated on a quiz.
    pub fn play(&mut self) {
        match self.phase {
            Phase::Playing | Phase::QuizGate => return,
            Phase::Ended => {
                self.current_slide = 0;
                self.elapsed_in_slide = 0.0;
            }
            Phase::Idle | Phase::Paused => {}
        }

        if self.timeline.slides.is_empty() {
            self.set_phase(Phase::Ended);
            self.hooks.on_sequence_end();
            return;
        }

        self.set_phase(Phase::Playing);
        self.begin_current_narration();
    }

    /// Stop the clock and cancel narration, discarding its completion.
    pub fn pause(&mut self) {
        if self.phase != Phase::Playing {
            return;
        }
        self.interrupt();
        self.set_phase(Phase::Paused);
    }

    pub fn toggle_play(&mut self) {
        if self.phase == Phase::Playing {
            self.pause();
        } else {
            self.play();
        }
    }

    /// Cancel everything and return to `Idle`, keeping the slide index.
    pub fn stop(&mut self) {
        self.interrupt();
        self.set_phase(Phase::Idle);
    }

    /// Jump to a slide. Out-of-bounds indices clamp; seeking always
    /// pauses and resets the slide clock.
    #[tracing::instrument(skip(self))]
    pub fn go_to_slide(&mut self, index: usize) {
        if self.timeline.slides.is_empty() {
            return;
        }
        let clamped = index.min(self.timeline.slides.len() - 1);
        self.interrupt();
        let changed = clamped != self.current_slide;
        self.current_slide = clamped;
        self.elapsed_in_slide = 0.0;
        self.set_phase(Phase::Paused);
        if changed {
            self.hooks.on_slide_change(clamped);
        }
    }

    pub fn next_slide(&mut self) {
        self.go_to_slide(self.current_slide.saturating_add(1));
    }

    pub fn prev_slide(&mut self) {
        self.go_to_slide(self.current_slide.saturating_sub(1));
    }

    /// Change the playback-rate multiplier.
    ///
    /// Speech engines cannot change rate mid-utterance, so while playing
    /// this restarts the current slide's narration in full at the new
    /// rate. The elapsed clock's multiplier switches immediately either
    /// way.
    #[tracing::instrument(skip(self))]
    pub fn set_speed(&mut self, rate: f64) {
        if !rate.is_finite() || rate <= 0.0 {
            tracing::debug!(rate, "ignoring non-positive playback rate");
            return;
        }
        self.rate = rate;
        if self.phase == Phase::Playing {
            self.interrupt();
            self.begin_current_narration();
        }
    }

    /// Mute without touching the clock or the state machine; silent
    /// playback keeps its normal cadence.
    pub fn toggle_mute(&mut self) {
        let muted = !self.driver.is_muted();
        self.driver.set_muted(muted);
    }

    /// Answer the current quiz gate. `selected = None` records a timeout,
    /// which speaks the wrong-answer feedback but is scored distinctly.
    ///
    /// A no-op when no gate is open or the slide carries no quiz data.
    pub fn answer_quiz(&mut self, correct: bool, selected: Option<usize>) {
        if self.phase != Phase::QuizGate {
            tracing::debug!(phase = ?self.phase, "quiz answer outside a quiz gate, ignoring");
            return;
        }
        let Some(slide) = self.timeline.slides.get(self.current_slide) else {
            return;
        };
        let Some(quiz) = slide.quiz.clone() else {
            tracing::debug!(slide = %slide.id, "quiz answer for slide without quiz data, ignoring");
            return;
        };

        let timed_out = selected.is_none();
        self.outcomes.push(QuizOutcome {
            slide_id: slide.id.clone(),
            correct: correct && !timed_out,
            selected,
            timed_out,
        });
        self.answered.insert(self.current_slide);

        let feedback = if correct && !timed_out {
            quiz.correct_feedback
        } else {
            quiz.wrong_feedback
        };

        self.set_phase(Phase::Playing);
        let utterance = self.driver.speak(&feedback, self.rate);
        self.active = Some(ActiveNarration {
            generation: self.generation,
            utterance,
            kind: NarrationKind::QuizFeedback,
        });
    }

    /// Advance the engine by `dt` wall-clock seconds.
    ///
    /// Scales the drawing clock by the playback rate and pumps narration
    /// completion/boundary events. Drawing stays ticker-driven so visual
    /// animation never depends on speech-engine timing jitter.
    pub fn tick(&mut self, dt: f64) {
        let scaled = dt.max(0.0) * self.rate;
        if self.phase == Phase::Playing {
            self.elapsed_in_slide += scaled;
        }

        for event in self.driver.tick(scaled) {
            match event {
                NarrationEvent::Boundary {
                    utterance,
                    char_index,
                } => {
                    if self.matches_active(utterance) {
                        self.hooks.on_word_boundary(char_index);
                    }
                }
                NarrationEvent::Finished { utterance } => {
                    self.handle_narration_finished(utterance);
                }
            }
        }
    }

    fn matches_active(&self, utterance: UtteranceId) -> bool {
        self.active
            .is_some_and(|a| a.utterance == utterance && a.generation == self.generation)
    }

    fn handle_narration_finished(&mut self, utterance: UtteranceId) {
        let Some(active) = self.active else {
            tracing::debug!(utterance = utterance.0, "completion with no active narration");
            return;
        };
        // Stale-callback guard: the driver filters cancelled utterances,
        // and the generation check catches interruptions that happened
        // between dispatch and delivery. Expected steady-state traffic.
        if active.utterance != utterance || active.generation != self.generation {
            tracing::debug!(utterance = utterance.0, "discarding stale completion");
            return;
        }
        self.active = None;

        match active.kind {
            NarrationKind::QuizIntro => {
                self.set_phase(Phase::QuizGate);
                self.hooks.on_quiz_gate(self.current_slide);
            }
            NarrationKind::Slide | NarrationKind::QuizFeedback => {
                self.advance_or_end();
            }
        }
    }

    fn advance_or_end(&mut self) {
        let next = self.current_slide + 1;
        if next < self.timeline.slides.len() {
            self.current_slide = next;
            self.elapsed_in_slide = 0.0;
            self.hooks.on_slide_change(next);
            self.begin_current_narration();
        } else {
            self.set_phase(Phase::Ended);
            self.hooks.on_sequence_end();
        }
    }

    fn begin_current_narration(&mut self) {
        let Some(slide) = self.timeline.slides.get(self.current_slide) else {
            return;
        };

        let unanswered_quiz = slide.gates_on_quiz() && !self.answered.contains(&self.current_slide);
        let (text, kind) = if unanswered_quiz {
            let intro = slide
                .quiz
                .as_ref()
                .map(|q| q.teacher_intro.clone())
                .unwrap_or_default();
            (intro, NarrationKind::QuizIntro)
        } else {
            (slide.narration.clone(), NarrationKind::Slide)
        };

        let utterance = self.driver.speak(&text, self.rate);
        self.active = Some(ActiveNarration {
            generation: self.generation,
            utterance,
            kind,
        });
    }

    /// Invalidate any narration in flight: bump the generation token and
    /// cancel the utterance. Called on every user-initiated interruption
    /// before anything new starts.
    fn interrupt(&mut self) {
        self.generation = self.generation.wrapping_add(1);
        self.driver.stop();
        self.active = None;
    }

    fn set_phase(&mut self, phase: Phase) {
        if self.phase != phase {
            self.phase = phase;
            self.hooks.on_phase_change(phase);
        }
    }
}

impl Drop for PlaybackController {
    fn drop(&mut self) {
        self.driver.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_bindings_cover_the_documented_set() {
        assert_eq!(key_action(" "), Some(HostAction::TogglePlay));
        assert_eq!(key_action("space"), Some(HostAction::TogglePlay));
        assert_eq!(key_action("arrowleft"), Some(HostAction::PrevSlide));
        assert_eq!(key_action("arrowright"), Some(HostAction::NextSlide));
        assert_eq!(key_action("f"), Some(HostAction::ToggleFullscreen));
        assert_eq!(key_action("m"), Some(HostAction::ToggleMute));
        assert_eq!(key_action("q"), None);
    }
}
