use std::collections::HashMap;

use kurbo::{BezPath, Circle, Point, Rect, Shape as _, Vec2};

use crate::{
    core::{Canvas, FrameRGBA, Rgba8},
    ease::Ease,
    error::{ChalkError, ChalkResult},
    model::DrawingInstruction,
    shape::{Shape, parse_shape},
};

/// Fraction of the draw-in past which an arrow grows its head.
const ARROW_HEAD_AT: f64 = 0.8;

/// Back-sweep angle of each arrowhead barb, radians.
const ARROW_HEAD_ANGLE: f64 = 0.45;

/// Caret blink frequency for handwriting text, cycles per second of
/// slide time (deterministic: derived from `elapsed`, not wall time).
const CARET_BLINK_HZ: f64 = 2.0;

/// The drawing interpreter: paints a slide's instruction set at a given
/// elapsed time.
///
/// Every call repaints the full frame from scratch, so the output is a
/// pure function of `(instructions, elapsed)` and seeking/scrubbing needs
/// no undo logic. The struct only holds reusable scratch state (pixmap,
/// font contexts) that never leaks between frames.
pub struct Whiteboard {
    canvas: Canvas,
    background: Rgba8,
    ease: Ease,
    pixmap: vello_cpu::Pixmap,
    text: TextLayouter,
}

impl Whiteboard {
    pub fn new(canvas: Canvas) -> ChalkResult<Self> {
        let width: u16 = canvas
            .width
            .try_into()
            .map_err(|_| ChalkError::render("canvas width exceeds u16"))?;
        let height: u16 = canvas
            .height
            .try_into()
            .map_err(|_| ChalkError::render("canvas height exceeds u16"))?;
        Ok(Self {
            canvas,
            background: Rgba8::BOARD,
            ease: Ease::default(),
            pixmap: vello_cpu::Pixmap::new(width, height),
            text: TextLayouter::new(),
        })
    }

    pub fn canvas(&self) -> Canvas {
        self.canvas
    }

    /// Override the easing curve used for text fade/reveal smoothing.
    pub fn set_ease(&mut self, ease: Ease) {
        self.ease = ease;
    }

    /// Paint every instruction whose `timestamp` has passed, each at its
    /// own partial-completion progress.
    ///
    /// Malformed instructions (unknown kind, missing or degenerate
    /// geometry) are skipped individually; they never abort the frame.
    #[tracing::instrument(skip(self, instructions), fields(n = instructions.len()))]
    pub fn render(
        &mut self,
        instructions: &[DrawingInstruction],
        elapsed: f64,
    ) -> ChalkResult<FrameRGBA> {
        let width = self.pixmap.width();
        let height = self.pixmap.height();

        let bg = premul_rgba8(
            self.background.r,
            self.background.g,
            self.background.b,
            self.background.a,
        );
        clear_pixmap(&mut self.pixmap, bg);

        // Stable sort by start time; ties keep authored order.
        let mut order: Vec<&DrawingInstruction> = instructions.iter().collect();
        order.sort_by(|a, b| {
            a.timestamp
                .partial_cmp(&b.timestamp)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        let mut ctx = vello_cpu::RenderContext::new(width, height);
        for ins in order {
            if !ins.started_at(elapsed) {
                continue;
            }
            let shape = match parse_shape(ins) {
                Ok(shape) => shape,
                Err(err) => {
                    tracing::debug!(%err, kind = %ins.kind, "skipping malformed instruction");
                    continue;
                }
            };
            let color = Rgba8::from_hex(&ins.color).unwrap_or_default();
            let progress = ins.progress_at(elapsed);
            self.draw_shape(&mut ctx, &shape, ins, color, progress, elapsed);
        }
        ctx.flush();
        ctx.render_to_pixmap(&mut self.pixmap);

        Ok(FrameRGBA {
            width: self.canvas.width,
            height: self.canvas.height,
            data: self.pixmap.data_as_u8_slice().to_vec(),
            premultiplied: true,
        })
    }

    fn draw_shape(
        &mut self,
        ctx: &mut vello_cpu::RenderContext,
        shape: &Shape,
        ins: &DrawingInstruction,
        color: Rgba8,
        progress: f64,
        elapsed: f64,
    ) {
        ctx.set_transform(vello_cpu::kurbo::Affine::IDENTITY);
        ctx.set_paint(to_color(color));
        ctx.set_stroke(vello_cpu::kurbo::Stroke::new(ins.line_width.max(0.5)));

        match shape {
            Shape::Line { points } => {
                stroke(ctx, &partial_polyline(points, progress));
            }
            Shape::Curve { points } => {
                stroke(ctx, &smooth_curve(&partial_points(points, progress)));
            }
            Shape::Polygon { points } => {
                if progress >= 1.0 {
                    let mut path = polyline(points);
                    path.close_path();
                    if ins.fill {
                        fill(ctx, &path);
                    } else {
                        stroke(ctx, &path);
                    }
                } else {
                    // Closing edge only appears on completion.
                    stroke(ctx, &partial_polyline(points, progress));
                }
            }
            Shape::Circle { center, radius } => {
                if progress >= 1.0 && ins.fill {
                    fill(ctx, &Circle::new(*center, *radius).to_path(0.1));
                } else {
                    stroke(ctx, &circle_arc(*center, *radius, progress));
                }
            }
            Shape::Rectangle {
                origin,
                width,
                height,
            } => {
                let rect = Rect::new(origin.x, origin.y, origin.x + width, origin.y + height);
                if progress >= 1.0 {
                    if ins.fill {
                        fill(ctx, &rect.to_path(0.1));
                    } else {
                        stroke(ctx, &rect.to_path(0.1));
                    }
                } else {
                    let target = progress * 2.0 * (width + height);
                    stroke(ctx, &rect_perimeter(rect, target));
                }
            }
            Shape::Arrow { start, end } => {
                let tip = lerp_point(*start, *end, progress);
                let mut shaft = BezPath::new();
                shaft.move_to(*start);
                shaft.line_to(tip);
                stroke(ctx, &shaft);
                if progress > ARROW_HEAD_AT {
                    stroke(ctx, &arrow_head(*start, tip, ins.line_width));
                }
            }
            Shape::Text {
                text,
                origin,
                font_size,
                handwriting,
                glow,
            } => {
                let eased = self.ease.apply(progress);
                if *handwriting {
                    self.draw_handwriting(
                        ctx, text, *origin, *font_size, color, eased, progress, elapsed, *glow,
                    );
                } else {
                    self.draw_fade_text(ctx, text, *origin, *font_size, color, eased, *glow);
                }
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn draw_fade_text(
        &mut self,
        ctx: &mut vello_cpu::RenderContext,
        text: &str,
        origin: Point,
        font_size: f64,
        color: Rgba8,
        alpha: f64,
        glow: bool,
    ) {
        if alpha <= 0.0 {
            return;
        }
        let layout = self.text.layout(text, font_size as f32, color);
        ctx.push_opacity_layer(alpha as f32);
        if glow {
            self.text.draw_glow(ctx, &layout, origin, color);
        }
        self.text.draw(ctx, &layout, origin, None);
        ctx.pop_layer();
    }

    #[allow(clippy::too_many_arguments)]
    fn draw_handwriting(
        &mut self,
        ctx: &mut vello_cpu::RenderContext,
        text: &str,
        origin: Point,
        font_size: f64,
        color: Rgba8,
        eased: f64,
        progress: f64,
        elapsed: f64,
        glow: bool,
    ) {
        let chars: Vec<char> = text.chars().collect();
        let visible = ((chars.len() as f64) * eased).floor() as usize;
        let visible = visible.min(chars.len());
        let prefix: String = chars[..visible].iter().collect();

        let caret_x = if prefix.is_empty() {
            0.0
        } else {
            let layout = self.text.layout(&prefix, font_size as f32, color);
            if glow {
                self.text.draw_glow(ctx, &layout, origin, color);
            }
            self.text.draw(ctx, &layout, origin, None);
            f64::from(layout.width())
        };

        if progress < 1.0 && caret_on(elapsed) {
            let caret = Rect::new(
                origin.x + caret_x + 1.0,
                origin.y,
                origin.x + caret_x + 1.0 + (font_size * 0.08).max(2.0),
                origin.y + font_size * 1.1,
            );
            ctx.set_transform(vello_cpu::kurbo::Affine::IDENTITY);
            ctx.set_paint(to_color(color));
            fill(ctx, &caret.to_path(0.1));
        }
    }
}

/// Deterministic caret blink phase from slide time.
fn caret_on(elapsed: f64) -> bool {
    ((elapsed * CARET_BLINK_HZ).floor() as i64).rem_euclid(2) == 0
}

// ---------------------------------------------------------------------------
// Partial-shape path construction. Pure helpers, unit-tested below.
// ---------------------------------------------------------------------------

/// Linear interpolation between two points.
pub fn lerp_point(a: Point, b: Point, t: f64) -> Point {
    Point::new(a.x + (b.x - a.x) * t, a.y + (b.y - a.y) * t)
}

fn polyline(points: &[Point]) -> BezPath {
    let mut path = BezPath::new();
    if let Some((first, rest)) = points.split_first() {
        path.move_to(*first);
        for p in rest {
            path.line_to(*p);
        }
    }
    path
}

/// The revealed prefix of a polyline at fraction `t` of its segments:
/// whole segments by `floor(t * segments)`, plus a lerped partial point
/// into the next segment for sub-segment smoothness.
pub fn partial_points(points: &[Point], t: f64) -> Vec<Point> {
    if points.len() < 2 {
        return points.to_vec();
    }
    let t = t.clamp(0.0, 1.0);
    let segments = points.len() - 1;
    let exact = t * segments as f64;
    let whole = (exact.floor() as usize).min(segments);
    let frac = exact - whole as f64;

    let mut out: Vec<Point> = points[..=whole].to_vec();
    if whole < segments && frac > 0.0 {
        out.push(lerp_point(points[whole], points[whole + 1], frac));
    }
    out
}

/// Path for the revealed prefix of a polyline.
pub fn partial_polyline(points: &[Point], t: f64) -> BezPath {
    polyline(&partial_points(points, t))
}

/// Quadratic-midpoint smoothing over a point run: each interior point
/// becomes a control point toward the midpoint of the following segment.
pub fn smooth_curve(points: &[Point]) -> BezPath {
    let mut path = BezPath::new();
    match points.len() {
        0 | 1 => {}
        2 => {
            path.move_to(points[0]);
            path.line_to(points[1]);
        }
        n => {
            path.move_to(points[0]);
            for i in 1..n - 1 {
                let mid = lerp_point(points[i], points[i + 1], 0.5);
                path.quad_to(points[i], mid);
            }
            path.line_to(points[n - 1]);
        }
    }
    path
}

/// Circular arc from angle 0, sweeping `2π * progress` clockwise in
/// canvas (y-down) coordinates.
pub fn circle_arc(center: Point, radius: f64, progress: f64) -> BezPath {
    let sweep = std::f64::consts::TAU * progress.clamp(0.0, 1.0);
    kurbo::Arc::new(center, Vec2::new(radius, radius), 0.0, sweep, 0.0).to_path(0.1)
}

/// Rectangle perimeter traced to a cumulative length, edge order
/// top, right, bottom, left.
pub fn rect_perimeter(rect: Rect, target_len: f64) -> BezPath {
    let corners = [
        Point::new(rect.x0, rect.y0),
        Point::new(rect.x1, rect.y0),
        Point::new(rect.x1, rect.y1),
        Point::new(rect.x0, rect.y1),
        Point::new(rect.x0, rect.y0),
    ];

    let mut path = BezPath::new();
    path.move_to(corners[0]);
    let mut remaining = target_len.max(0.0);
    for pair in corners.windows(2) {
        let (a, b) = (pair[0], pair[1]);
        let edge_len = (b - a).hypot();
        if edge_len <= 0.0 {
            continue;
        }
        if remaining >= edge_len {
            path.line_to(b);
            remaining -= edge_len;
        } else {
            if remaining > 0.0 {
                path.line_to(lerp_point(a, b, remaining / edge_len));
            }
            break;
        }
    }
    path
}

/// Two barb strokes at the arrow tip, sized with the line width.
pub fn arrow_head(start: Point, tip: Point, line_width: f64) -> BezPath {
    let dir = tip - start;
    let angle = dir.y.atan2(dir.x);
    let len = 10.0 + line_width * 2.0;

    let barb = |offset: f64| -> Point {
        Point::new(
            tip.x - len * (angle + offset).cos(),
            tip.y - len * (angle + offset).sin(),
        )
    };

    let mut path = BezPath::new();
    path.move_to(barb(ARROW_HEAD_ANGLE));
    path.line_to(tip);
    path.line_to(barb(-ARROW_HEAD_ANGLE));
    path
}

// ---------------------------------------------------------------------------
// Rasterization plumbing.
// ---------------------------------------------------------------------------

fn to_color(c: Rgba8) -> vello_cpu::peniko::Color {
    vello_cpu::peniko::Color::from_rgba8(c.r, c.g, c.b, c.a)
}

fn stroke(ctx: &mut vello_cpu::RenderContext, path: &BezPath) {
    ctx.stroke_path(&bezpath_to_cpu(path));
}

fn fill(ctx: &mut vello_cpu::RenderContext, path: &BezPath) {
    ctx.fill_path(&bezpath_to_cpu(path));
}

fn point_to_cpu(p: Point) -> vello_cpu::kurbo::Point {
    vello_cpu::kurbo::Point::new(p.x, p.y)
}

fn bezpath_to_cpu(path: &BezPath) -> vello_cpu::kurbo::BezPath {
    use kurbo::PathEl;

    let mut out = vello_cpu::kurbo::BezPath::new();
    for &el in path.elements() {
        match el {
            PathEl::MoveTo(p) => out.move_to(point_to_cpu(p)),
            PathEl::LineTo(p) => out.line_to(point_to_cpu(p)),
            PathEl::QuadTo(p1, p2) => out.quad_to(point_to_cpu(p1), point_to_cpu(p2)),
            PathEl::CurveTo(p1, p2, p3) => {
                out.curve_to(point_to_cpu(p1), point_to_cpu(p2), point_to_cpu(p3));
            }
            PathEl::ClosePath => out.close_path(),
        }
    }
    out
}

fn premul_rgba8(r: u8, g: u8, b: u8, a: u8) -> [u8; 4] {
    let af = (a as u16) + 1;
    let premul = |c: u8| -> u8 { (((c as u16) * af) >> 8) as u8 };
    [premul(r), premul(g), premul(b), a]
}

fn clear_pixmap(pixmap: &mut vello_cpu::Pixmap, rgba: [u8; 4]) {
    let data = pixmap.data_as_u8_slice_mut();
    for px in data.chunks_exact_mut(4) {
        px.copy_from_slice(&rgba);
    }
}

/// Parley shaping/layout contexts plus a font handle cache, shared across
/// frames. Holds no per-frame state.
struct TextLayouter {
    font_ctx: parley::FontContext,
    layout_ctx: parley::LayoutContext<Rgba8>,
    font_cache: HashMap<u64, vello_cpu::peniko::FontData>,
}

impl TextLayouter {
    fn new() -> Self {
        Self {
            font_ctx: parley::FontContext::default(),
            layout_ctx: parley::LayoutContext::new(),
            font_cache: HashMap::new(),
        }
    }

    fn layout(&mut self, text: &str, size_px: f32, brush: Rgba8) -> parley::Layout<Rgba8> {
        let mut builder = self
            .layout_ctx
            .ranged_builder(&mut self.font_ctx, text, 1.0, true);
        builder.push_default(parley::style::StyleProperty::FontStack(
            parley::style::FontStack::Single(parley::style::FontFamily::Generic(
                parley::style::GenericFamily::SansSerif,
            )),
        ));
        builder.push_default(parley::style::StyleProperty::FontSize(size_px));
        builder.push_default(parley::style::StyleProperty::Brush(brush));

        let mut layout: parley::Layout<Rgba8> = builder.build(text);
        layout.break_all_lines(None);
        layout
    }

    /// Low-alpha offset underlay pass approximating a glow.
    fn draw_glow(
        &mut self,
        ctx: &mut vello_cpu::RenderContext,
        layout: &parley::Layout<Rgba8>,
        origin: Point,
        color: Rgba8,
    ) {
        let glow = color.with_alpha(0.35);
        for (dx, dy) in [(-2.0, 0.0), (2.0, 0.0), (0.0, -2.0), (0.0, 2.0)] {
            self.draw(
                ctx,
                layout,
                Point::new(origin.x + dx, origin.y + dy),
                Some(glow),
            );
        }
    }

    fn draw(
        &mut self,
        ctx: &mut vello_cpu::RenderContext,
        layout: &parley::Layout<Rgba8>,
        origin: Point,
        override_color: Option<Rgba8>,
    ) {
        ctx.set_transform(vello_cpu::kurbo::Affine::translate((origin.x, origin.y)));

        for line in layout.lines() {
            for item in line.items() {
                let parley::layout::PositionedLayoutItem::GlyphRun(run) = item else {
                    continue;
                };

                let color = override_color.unwrap_or(run.style().brush);
                ctx.set_paint(to_color(color));

                let font = run.run().font();
                let font_data = self
                    .font_cache
                    .entry(font.data.id())
                    .or_insert_with(|| {
                        vello_cpu::peniko::FontData::new(
                            vello_cpu::peniko::Blob::from(font.data.as_ref().to_vec()),
                            font.index,
                        )
                    })
                    .clone();

                let glyphs = run.glyphs().map(|g| vello_cpu::Glyph {
                    id: g.id,
                    x: g.x,
                    y: g.y,
                });
                ctx.glyph_run(&font_data)
                    .font_size(run.run().font_size())
                    .fill_glyphs(glyphs);
            }
        }

        ctx.set_transform(vello_cpu::kurbo::Affine::IDENTITY);
    }
}
