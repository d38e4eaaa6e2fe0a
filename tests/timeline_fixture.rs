//! Wire-format checks against a realistic generated timeline.

use chalkcast::Timeline;

#[test]
fn fixture_parses_and_validates() {
    let s = include_str!("data/lecture_timeline.json");
    let timeline: Timeline = serde_json::from_str(s).unwrap();
    timeline.validate().unwrap();

    assert_eq!(timeline.title, "Introduction to Right Triangles");
    assert_eq!(timeline.slides.len(), 3);
    assert_eq!(timeline.total_duration(), 44.0);

    let intro = &timeline.slides[0];
    assert_eq!(intro.bullet_points.len(), 2);
    assert_eq!(intro.transition.as_deref(), Some("fade"));
    assert_eq!(intro.drawings.len(), 4);
    assert!(intro.drawings[2].handwriting);

    let quiz_slide = &timeline.slides[1];
    assert!(quiz_slide.gates_on_quiz());
    let quiz = quiz_slide.quiz.as_ref().unwrap();
    assert_eq!(quiz.correct_index, 1);
    assert_eq!(quiz.options.len(), 3);

    // The malformed instructions survive parsing untouched; the renderer
    // is responsible for skipping them.
    let last = &timeline.slides[2];
    assert_eq!(last.drawings[2].kind, "sparkle");
    assert_eq!(last.drawings[3].points.as_ref().unwrap().len(), 1);
}

#[test]
fn defaults_fill_in_missing_styling() {
    let json = r#"{
        "title": "t",
        "slides": [{
            "id": "s0",
            "duration": 5.0,
            "drawings": [{
                "timestamp": 0,
                "duration": 1,
                "type": "line",
                "points": [{"x": 0, "y": 0}, {"x": 10, "y": 10}]
            }]
        }]
    }"#;
    let timeline: Timeline = serde_json::from_str(json).unwrap();
    let ins = &timeline.slides[0].drawings[0];
    assert_eq!(ins.color, "#ffffff");
    assert_eq!(ins.line_width, 2.0);
    assert!(!ins.fill);
    assert!(!ins.handwriting);
}
