use kurbo::Point;

use crate::{
    error::{ChalkError, ChalkResult},
    model::DrawingInstruction,
};

/// A drawing instruction with its geometry resolved and checked.
#[derive(Clone, Debug, PartialEq)]
pub enum Shape {
    Line {
        points: Vec<Point>,
    },
    Curve {
        points: Vec<Point>,
    },
    Polygon {
        points: Vec<Point>,
    },
    Circle {
        center: Point,
        radius: f64,
    },
    Rectangle {
        origin: Point,
        width: f64,
        height: f64,
    },
    Arrow {
        start: Point,
        end: Point,
    },
    Text {
        text: String,
        origin: Point,
        font_size: f64,
        handwriting: bool,
        glow: bool,
    },
}

/// Resolve an instruction's `kind` and geometry fields into a [`Shape`].
///
/// Unknown kinds, missing fields and degenerate geometry are errors; the
/// whiteboard turns those into per-instruction skips so one bad
/// instruction never aborts a frame.
pub fn parse_shape(ins: &DrawingInstruction) -> ChalkResult<Shape> {
    let kind = ins.kind.trim().to_ascii_lowercase();
    match kind.as_str() {
        "line" => Ok(Shape::Line {
            points: required_points(ins, 2)?,
        }),
        "curve" => Ok(Shape::Curve {
            points: required_points(ins, 2)?,
        }),
        "polygon" => Ok(Shape::Polygon {
            points: required_points(ins, 3)?,
        }),
        "circle" => {
            let center = finite_point(ins.center, "circle.center")?;
            let radius = ins
                .radius
                .ok_or_else(|| ChalkError::shape("circle is missing 'radius'"))?;
            if !radius.is_finite() || radius <= 0.0 {
                return Err(ChalkError::shape("circle radius must be finite and > 0"));
            }
            Ok(Shape::Circle { center, radius })
        }
        "rectangle" => {
            // Corner may arrive as `position` or (older timelines) `start`.
            let origin = finite_point(ins.position.or(ins.start), "rectangle.position")?;
            let width = finite_dim(ins.width, "rectangle.width")?;
            let height = finite_dim(ins.height, "rectangle.height")?;
            Ok(Shape::Rectangle {
                origin,
                width,
                height,
            })
        }
        "arrow" => {
            let start = finite_point(ins.start, "arrow.start")?;
            let end = finite_point(ins.end, "arrow.end")?;
            if (end - start).hypot() == 0.0 {
                return Err(ChalkError::shape("arrow start and end coincide"));
            }
            Ok(Shape::Arrow { start, end })
        }
        "text" => {
            let text = ins
                .text
                .clone()
                .ok_or_else(|| ChalkError::shape("text is missing 'text'"))?;
            if text.is_empty() {
                return Err(ChalkError::shape("text must be non-empty"));
            }
            let origin = finite_point(ins.position, "text.position")?;
            let font_size = ins.font_size.unwrap_or(24.0);
            if !font_size.is_finite() || font_size <= 0.0 {
                return Err(ChalkError::shape("text fontSize must be finite and > 0"));
            }
            Ok(Shape::Text {
                text,
                origin,
                font_size,
                handwriting: ins.handwriting,
                glow: ins.glow,
            })
        }
        other => Err(ChalkError::shape(format!("unknown shape kind '{other}'"))),
    }
}

fn required_points(ins: &DrawingInstruction, min: usize) -> ChalkResult<Vec<Point>> {
    let kind = &ins.kind;
    let points = ins
        .points
        .clone()
        .ok_or_else(|| ChalkError::shape(format!("{kind} is missing 'points'")))?;
    if points.len() < min {
        return Err(ChalkError::shape(format!(
            "{kind} needs >= {min} points, got {}",
            points.len()
        )));
    }
    for p in &points {
        if !p.x.is_finite() || !p.y.is_finite() {
            return Err(ChalkError::shape(format!("{kind} has a non-finite point")));
        }
    }
    Ok(points)
}

fn finite_point(p: Option<Point>, field: &str) -> ChalkResult<Point> {
    let p = p.ok_or_else(|| ChalkError::shape(format!("missing '{field}'")))?;
    if !p.x.is_finite() || !p.y.is_finite() {
        return Err(ChalkError::shape(format!("'{field}' is non-finite")));
    }
    Ok(p)
}

fn finite_dim(v: Option<f64>, field: &str) -> ChalkResult<f64> {
    let v = v.ok_or_else(|| ChalkError::shape(format!("missing '{field}'")))?;
    if !v.is_finite() || v <= 0.0 {
        return Err(ChalkError::shape(format!(
            "'{field}' must be finite and > 0"
        )));
    }
    Ok(v)
}
