use kurbo::Point;

use crate::{
    core::clamp01,
    error::{ChalkError, ChalkResult},
};

/// Floor applied to instruction durations before progress division.
pub const MIN_DRAW_DURATION: f64 = 0.1;

/// A complete narrated presentation: ordered slides plus a display title.
///
/// Produced by an external content generator and consumed as-is; the wire
/// format is camelCase JSON.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Timeline {
    pub title: String,
    pub slides: Vec<Slide>,
}

/// One unit of narrated content.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Slide {
    /// Stable identifier, unique within a timeline.
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub bullet_points: Vec<String>,
    /// Full utterance text for this slide. Advancement is narration-driven.
    #[serde(default)]
    pub narration: String,
    /// Nominal seconds budgeted for this slide. Advisory: feeds the
    /// total-timeline progress display only, never advancement.
    pub duration: f64,
    #[serde(default)]
    pub drawings: Vec<DrawingInstruction>,
    #[serde(default)]
    pub is_quiz_slide: bool,
    #[serde(default)]
    pub quiz: Option<Quiz>,
    /// Cosmetic hint for hosts. Must not affect timing; playback never
    /// reads it.
    #[serde(default)]
    pub transition: Option<String>,
}

impl Slide {
    /// Whether narration completion should gate on a quiz answer.
    pub fn gates_on_quiz(&self) -> bool {
        self.is_quiz_slide && self.quiz.is_some()
    }
}

/// Quiz gate payload carried by a quiz slide.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Quiz {
    pub question: String,
    pub options: Vec<String>,
    pub correct_index: usize,
    /// Spoken instead of the slide narration before the gate opens.
    #[serde(default)]
    pub teacher_intro: String,
    #[serde(default)]
    pub correct_feedback: String,
    #[serde(default)]
    pub wrong_feedback: String,
}

/// One animated drawing primitive.
///
/// Geometry fields are all optional at the serde layer; which ones a given
/// `kind` requires is resolved by [`crate::shape::parse_shape`] at render
/// time, so one malformed instruction never poisons the document.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DrawingInstruction {
    /// Seconds after slide start at which the draw-in begins.
    pub timestamp: f64,
    /// Seconds the draw-in animation takes (floored to
    /// [`MIN_DRAW_DURATION`] in progress computation).
    pub duration: f64,
    /// `line | circle | rectangle | arrow | text | polygon | curve`.
    #[serde(rename = "type")]
    pub kind: String,
    /// CSS hex color; unparseable values fall back to white.
    #[serde(default = "default_color")]
    pub color: String,
    #[serde(default = "default_line_width")]
    pub line_width: f64,
    /// Fill the shape once fully drawn in (circle/rectangle/polygon).
    #[serde(default)]
    pub fill: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub points: Option<Vec<Point>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub center: Option<Point>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub radius: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<Point>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<Point>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<Point>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_size: Option<f64>,
    #[serde(default)]
    pub handwriting: bool,
    #[serde(default)]
    pub glow: bool,
}

fn default_color() -> String {
    "#ffffff".to_string()
}

fn default_line_width() -> f64 {
    2.0
}

impl DrawingInstruction {
    /// Draw-in progress at `elapsed` seconds into the slide, in `[0, 1]`.
    ///
    /// `0` before and exactly at `timestamp`, clamped to `1` for all
    /// `elapsed >= timestamp + duration`.
    pub fn progress_at(&self, elapsed: f64) -> f64 {
        clamp01((elapsed - self.timestamp) / self.duration.max(MIN_DRAW_DURATION))
    }

    /// Whether the instruction has started by `elapsed` seconds.
    pub fn started_at(&self, elapsed: f64) -> bool {
        self.timestamp <= elapsed
    }
}

impl Timeline {
    /// Sum of the advisory per-slide durations.
    pub fn total_duration(&self) -> f64 {
        self.slides.iter().map(|s| s.duration.max(0.0)).sum()
    }

    /// Structural validation used by hosts and the CLI before playback.
    ///
    /// Deliberately does not inspect drawing geometry: malformed
    /// instructions are skipped per-frame at render time instead.
    pub fn validate(&self) -> ChalkResult<()> {
        if self.slides.is_empty() {
            return Err(ChalkError::validation("timeline must have >= 1 slide"));
        }

        let mut seen = std::collections::BTreeSet::new();
        for slide in &self.slides {
            if slide.id.trim().is_empty() {
                return Err(ChalkError::validation("slide id must be non-empty"));
            }
            if !seen.insert(slide.id.as_str()) {
                return Err(ChalkError::validation(format!(
                    "duplicate slide id '{}'",
                    slide.id
                )));
            }
            if !slide.duration.is_finite() || slide.duration <= 0.0 {
                return Err(ChalkError::validation(format!(
                    "slide '{}' duration must be finite and > 0",
                    slide.id
                )));
            }
            if slide.is_quiz_slide && slide.quiz.is_none() {
                return Err(ChalkError::validation(format!(
                    "slide '{}' is marked as a quiz slide but carries no quiz",
                    slide.id
                )));
            }
            if let Some(quiz) = &slide.quiz {
                if quiz.options.is_empty() {
                    return Err(ChalkError::validation(format!(
                        "slide '{}' quiz has no options",
                        slide.id
                    )));
                }
                if quiz.correct_index >= quiz.options.len() {
                    return Err(ChalkError::validation(format!(
                        "slide '{}' quiz correctIndex {} is out of range",
                        slide.id, quiz.correct_index
                    )));
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn basic_timeline() -> Timeline {
        Timeline {
            title: "Fractions".to_string(),
            slides: vec![
                Slide {
                    id: "s0".to_string(),
                    title: "Halves".to_string(),
                    bullet_points: vec!["A half is one of two equal parts".to_string()],
                    narration: "Let's split a circle in half.".to_string(),
                    duration: 12.0,
                    drawings: vec![DrawingInstruction {
                        timestamp: 0.5,
                        duration: 2.0,
                        kind: "circle".to_string(),
                        color: "#3b82f6".to_string(),
                        line_width: 3.0,
                        fill: false,
                        points: None,
                        center: Some(Point::new(400.0, 250.0)),
                        radius: Some(80.0),
                        position: None,
                        width: None,
                        height: None,
                        start: None,
                        end: None,
                        text: None,
                        font_size: None,
                        handwriting: false,
                        glow: false,
                    }],
                    is_quiz_slide: false,
                    quiz: None,
                    transition: Some("fade".to_string()),
                },
                Slide {
                    id: "s1".to_string(),
                    title: String::new(),
                    bullet_points: vec![],
                    narration: "Quick check!".to_string(),
                    duration: 20.0,
                    drawings: vec![],
                    is_quiz_slide: true,
                    quiz: Some(Quiz {
                        question: "How many halves make a whole?".to_string(),
                        options: vec!["1".to_string(), "2".to_string(), "3".to_string()],
                        correct_index: 1,
                        teacher_intro: "Time for a question.".to_string(),
                        correct_feedback: "Exactly right!".to_string(),
                        wrong_feedback: "Not quite, two halves make a whole.".to_string(),
                    }),
                    transition: None,
                },
            ],
        }
    }

    #[test]
    fn json_roundtrip() {
        let tl = basic_timeline();
        let s = serde_json::to_string_pretty(&tl).unwrap();
        assert!(s.contains("\"isQuizSlide\""));
        assert!(s.contains("\"lineWidth\""));
        let de: Timeline = serde_json::from_str(&s).unwrap();
        assert_eq!(de.slides.len(), 2);
        assert_eq!(de.slides[1].quiz.as_ref().unwrap().correct_index, 1);
    }

    #[test]
    fn unknown_drawing_kind_still_deserializes() {
        // Malformed instructions must survive parsing; they are skipped at
        // render time, not rejected at load time.
        let json = r#"{
            "title": "t",
            "slides": [{
                "id": "s0",
                "duration": 5.0,
                "drawings": [{"timestamp": 0, "duration": 1, "type": "scribble"}]
            }]
        }"#;
        let tl: Timeline = serde_json::from_str(json).unwrap();
        assert_eq!(tl.slides[0].drawings[0].kind, "scribble");
        assert!(tl.validate().is_ok());
    }

    #[test]
    fn validate_rejects_duplicate_ids() {
        let mut tl = basic_timeline();
        tl.slides[1].id = "s0".to_string();
        assert!(tl.validate().is_err());
    }

    #[test]
    fn validate_rejects_bad_quiz_index() {
        let mut tl = basic_timeline();
        tl.slides[1].quiz.as_mut().unwrap().correct_index = 9;
        assert!(tl.validate().is_err());
    }

    #[test]
    fn validate_rejects_quiz_slide_without_quiz() {
        let mut tl = basic_timeline();
        tl.slides[1].quiz = None;
        assert!(tl.validate().is_err());
    }

    #[test]
    fn progress_respects_min_duration_floor() {
        let mut ins = basic_timeline().slides[0].drawings[0].clone();
        ins.timestamp = 1.0;
        ins.duration = 0.0; // would divide by zero without the floor
        assert_eq!(ins.progress_at(1.0), 0.0);
        assert!((ins.progress_at(1.05) - 0.5).abs() < 1e-9);
        assert_eq!(ins.progress_at(1.1), 1.0);
        assert_eq!(ins.progress_at(50.0), 1.0);
    }

    #[test]
    fn progress_is_monotonic_and_clamped() {
        let mut ins = basic_timeline().slides[0].drawings[0].clone();
        ins.timestamp = 2.0;
        ins.duration = 4.0;
        assert_eq!(ins.progress_at(0.0), 0.0);
        assert_eq!(ins.progress_at(2.0), 0.0);
        let mut prev = 0.0;
        for i in 1..=40 {
            let p = ins.progress_at(2.0 + 4.0 * f64::from(i) / 40.0);
            assert!(p > prev || (p == 1.0 && prev == 1.0));
            prev = p;
        }
        assert_eq!(ins.progress_at(6.0), 1.0);
        assert_eq!(ins.progress_at(100.0), 1.0);
    }

    #[test]
    fn total_duration_sums_slides() {
        assert_eq!(basic_timeline().total_duration(), 32.0);
    }
}
