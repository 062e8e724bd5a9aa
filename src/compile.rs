use kurbo::{ParamCurve, ParamCurveArclen, PathSeg, Shape as _};

use crate::{
    blueprint::{Blueprint, Element, Side},
    core::{BezPath, Canvas, Fps, FrameIndex, FrameRange, Point, Rgba8},
    error::{ChalklineError, ChalklineResult},
    style::resolve_color_or_neutral,
};

// Fixed scene pacing. Scenes are strictly sequential: caption fades in,
// elements enter one at a time, the scene holds, then everything fades out.
const CAPTION_FADE_SECS: f64 = 0.5;
const ELEMENT_ENTER_SECS: f64 = 0.8;
const HOLD_SECS: f64 = 2.0;
const FADE_OUT_SECS: f64 = 0.5;

const LABEL_FONT_SIZE: f32 = 24.0;
const CAPTION_BOTTOM_MARGIN: f64 = 40.0;

#[derive(Clone, Debug)]
pub struct VideoConfig {
    pub canvas: Canvas,
    pub fps: Fps,
    pub background: Rgba8,
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            canvas: Canvas {
                width: 1280,
                height: 720,
            },
            fps: Fps { num: 30, den: 1 },
            background: Rgba8::opaque(0, 0, 0),
        }
    }
}

impl VideoConfig {
    pub fn validate(&self) -> ChalklineResult<()> {
        if self.canvas.width == 0 || self.canvas.height == 0 {
            return Err(ChalklineError::validation(
                "video canvas width/height must be > 0",
            ));
        }
        Fps::new(self.fps.num, self.fps.den)?;
        Ok(())
    }
}

/// Centered text placement. The backend lays the content out and positions
/// the layout box around `center`.
#[derive(Clone, Debug, PartialEq)]
pub struct TextSpec {
    pub content: String,
    pub size_px: f32,
    pub color: Rgba8,
    pub center: Point,
    pub max_width: Option<f64>,
}

#[derive(Clone, Debug)]
pub enum PlannedShape {
    Stroke {
        path: BezPath,
        color: Rgba8,
        width: f64,
    },
    Fill {
        path: BezPath,
        color: Rgba8,
    },
    Text(TextSpec),
}

/// Shapes that enter together during one animation window. A shape and its
/// label share a single entry so they appear as one unit.
#[derive(Clone, Debug)]
pub struct TimedGroup {
    pub shapes: Vec<PlannedShape>,
    pub enter: FrameRange, // scene-local frames
}

#[derive(Clone, Debug)]
pub struct ScenePlan {
    pub scene_id: u32,
    pub frames: u64,
    pub caption: TextSpec,
    pub caption_in: FrameRange,
    pub groups: Vec<TimedGroup>,
    pub fade_out: FrameRange,
}

#[derive(Clone, Debug)]
pub struct MoviePlan {
    pub canvas: Canvas,
    pub fps: Fps,
    pub background: Rgba8,
    pub scenes: Vec<ScenePlan>,
}

impl MoviePlan {
    pub fn total_frames(&self) -> u64 {
        self.scenes.iter().map(|s| s.frames).sum()
    }

    /// Map a global frame index to `(scene index, scene-local frame)`.
    pub fn locate(&self, frame: FrameIndex) -> Option<(usize, u64)> {
        let mut offset = 0u64;
        for (idx, scene) in self.scenes.iter().enumerate() {
            if frame.0 < offset + scene.frames {
                return Some((idx, frame.0 - offset));
            }
            offset += scene.frames;
        }
        None
    }
}

/// A fully resolved draw instruction for a single frame, in rendering order.
#[derive(Clone, Debug)]
pub enum DrawOp {
    Fill {
        path: BezPath,
        color: Rgba8,
        opacity: f32,
    },
    Stroke {
        path: BezPath,
        color: Rgba8,
        width: f64,
        opacity: f32,
    },
    Text {
        spec: TextSpec,
        opacity: f32,
    },
}

/// Lower a blueprint into per-scene frame plans.
pub fn compile_blueprint(bp: &Blueprint, video: &VideoConfig) -> ChalklineResult<MoviePlan> {
    bp.validate()?;
    video.validate()?;

    let fps = video.fps;
    let caption_frames = fps.secs_to_frames(CAPTION_FADE_SECS);
    let enter_frames = fps.secs_to_frames(ELEMENT_ENTER_SECS);
    let hold_frames = fps.secs_to_frames(HOLD_SECS);
    let fade_out_frames = fps.secs_to_frames(FADE_OUT_SECS);

    let geom = Geometry::for_canvas(video.canvas);
    let primary = resolve_color_or_neutral(&bp.style_profile.colors.primary);
    let neutral = resolve_color_or_neutral(&bp.style_profile.colors.neutral);
    let line_width = bp.style_profile.line_width;

    let mut scenes = Vec::with_capacity(bp.scenes.len());
    for scene in &bp.scenes {
        let mut groups = Vec::with_capacity(scene.elements.len());
        let mut cursor = caption_frames;
        for element in &scene.elements {
            let enter = FrameRange {
                start: FrameIndex(cursor),
                end: FrameIndex(cursor + enter_frames),
            };
            cursor += enter_frames;
            groups.push(TimedGroup {
                shapes: shapes_for_element(
                    element,
                    &bp.topic,
                    bp.style_profile.font_size_title,
                    primary,
                    neutral,
                    line_width,
                    &geom,
                ),
                enter,
            });
        }

        let frames = cursor + hold_frames + fade_out_frames;
        scenes.push(ScenePlan {
            scene_id: scene.scene_id,
            frames,
            caption: TextSpec {
                content: scene.text.clone(),
                size_px: bp.style_profile.font_size_body,
                color: neutral,
                center: geom.caption_center,
                max_width: Some(f64::from(video.canvas.width) * 0.9),
            },
            caption_in: FrameRange {
                start: FrameIndex(0),
                end: FrameIndex(caption_frames),
            },
            groups,
            fade_out: FrameRange {
                start: FrameIndex(frames - fade_out_frames),
                end: FrameIndex(frames),
            },
        });
    }

    Ok(MoviePlan {
        canvas: video.canvas,
        fps,
        background: video.background,
        scenes,
    })
}

/// Screen geometry derived from the canvas. One unit is an eighth of the
/// canvas height, mirroring the 8-unit frame the visuals were designed for.
struct Geometry {
    unit: f64,
    center: Point,
    left: Point,
    right: Point,
    caption_center: Point,
}

impl Geometry {
    fn for_canvas(canvas: Canvas) -> Self {
        let unit = f64::from(canvas.height) / 8.0;
        let center = canvas.center();
        Self {
            unit,
            center,
            left: Point::new(center.x - 3.0 * unit, center.y),
            right: Point::new(center.x + 3.0 * unit, center.y),
            caption_center: Point::new(center.x, f64::from(canvas.height) - CAPTION_BOTTOM_MARGIN),
        }
    }

    fn anchor(&self, side: Side) -> Point {
        match side {
            Side::Left => self.left,
            Side::Right => self.right,
        }
    }
}

fn shapes_for_element(
    element: &Element,
    topic: &str,
    title_size: f32,
    primary: Rgba8,
    neutral: Rgba8,
    line_width: f64,
    geom: &Geometry,
) -> Vec<PlannedShape> {
    match element {
        Element::Title => vec![PlannedShape::Text(TextSpec {
            content: topic.to_string(),
            size_px: title_size,
            color: neutral,
            center: geom.center,
            max_width: None,
        })],
        Element::Circle { label, pos } => {
            let at = geom.anchor(*pos);
            vec![
                PlannedShape::Stroke {
                    path: kurbo::Circle::new(at, geom.unit).to_path(1e-3),
                    color: primary,
                    width: line_width,
                },
                PlannedShape::Text(TextSpec {
                    content: label.clone(),
                    size_px: LABEL_FONT_SIZE,
                    color: neutral,
                    center: at,
                    max_width: None,
                }),
            ]
        }
        Element::Arrow { from, to } => vec![PlannedShape::Stroke {
            path: arrow_path(geom.anchor(*from), geom.anchor(*to), geom.unit),
            color: neutral,
            width: line_width,
        }],
        Element::Rectangle { label } => {
            let half_w = 2.0 * geom.unit;
            let half_h = geom.unit;
            vec![
                PlannedShape::Stroke {
                    path: kurbo::Rect::new(
                        geom.center.x - half_w,
                        geom.center.y - half_h,
                        geom.center.x + half_w,
                        geom.center.y + half_h,
                    )
                    .to_path(1e-3),
                    color: neutral,
                    width: line_width,
                },
                PlannedShape::Text(TextSpec {
                    content: label.clone(),
                    size_px: LABEL_FONT_SIZE,
                    color: neutral,
                    center: geom.center,
                    max_width: None,
                }),
            ]
        }
    }
}

/// Shaft plus an open two-barb head, trimmed so the arrow spans the gap
/// between the two anchored circles rather than their centers.
fn arrow_path(from: Point, to: Point, unit: f64) -> BezPath {
    let dir = (to - from).normalize();
    let start = from + dir * unit;
    let tip = to - dir * unit;
    let head = unit * 0.35;
    let barb = |angle: f64| {
        let rotated = kurbo::Vec2::new(
            -dir.x * angle.cos() + dir.y * angle.sin(),
            -dir.x * angle.sin() - dir.y * angle.cos(),
        );
        tip + rotated * head
    };

    let mut path = BezPath::new();
    path.move_to(start);
    path.line_to(tip);
    path.move_to(barb(0.5));
    path.line_to(tip);
    path.line_to(barb(-0.5));
    path
}

/// Resolve the draw list for one global frame. Returns an empty list past the
/// end of the plan.
pub fn ops_for_frame(plan: &MoviePlan, frame: FrameIndex) -> Vec<DrawOp> {
    let Some((scene_idx, local)) = plan.locate(frame) else {
        return Vec::new();
    };
    let scene = &plan.scenes[scene_idx];
    let local = FrameIndex(local);

    // Everything in the scene shares a common fade-out multiplier.
    let fade_mul = if local.0 >= scene.fade_out.start.0 {
        1.0 - fade_ramp(scene.fade_out.progress(local))
    } else {
        1.0
    };

    let mut ops = Vec::new();

    let caption_opacity = fade_ramp(scene.caption_in.progress(local)) * fade_mul;
    if caption_opacity > 0.0 {
        ops.push(DrawOp::Text {
            spec: scene.caption.clone(),
            opacity: caption_opacity as f32,
        });
    }

    for group in &scene.groups {
        if local.0 < group.enter.start.0 {
            continue;
        }
        let progress = group.enter.progress(local);
        for shape in &group.shapes {
            match shape {
                PlannedShape::Stroke { path, color, width } => {
                    // Draw-in: reveal the path by arc length.
                    let trimmed = partial_path(path, reveal_ramp(progress));
                    if trimmed.elements().is_empty() || fade_mul <= 0.0 {
                        continue;
                    }
                    ops.push(DrawOp::Stroke {
                        path: trimmed,
                        color: *color,
                        width: *width,
                        opacity: fade_mul as f32,
                    });
                }
                PlannedShape::Fill { path, color } => {
                    let opacity = fade_ramp(progress) * fade_mul;
                    if opacity > 0.0 {
                        ops.push(DrawOp::Fill {
                            path: path.clone(),
                            color: *color,
                            opacity: opacity as f32,
                        });
                    }
                }
                PlannedShape::Text(spec) => {
                    let opacity = fade_ramp(progress) * fade_mul;
                    if opacity > 0.0 {
                        ops.push(DrawOp::Text {
                            spec: spec.clone(),
                            opacity: opacity as f32,
                        });
                    }
                }
            }
        }
    }

    ops
}

/// Hermite smoothstep, applied to every fade. Flat at both ends so captions
/// and labels neither pop in nor snap out.
pub fn fade_ramp(t: f64) -> f64 {
    let t = t.clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

/// Decelerating cubic for stroke draw-in: the pen moves fast out of the gate
/// and lands softly at the end of the path.
pub fn reveal_ramp(t: f64) -> f64 {
    let u = 1.0 - t.clamp(0.0, 1.0);
    1.0 - u * u * u
}

/// Prefix of `path` covering fraction `t` of its total arc length.
pub fn partial_path(path: &BezPath, t: f64) -> BezPath {
    const ACCURACY: f64 = 1e-3;

    let t = t.clamp(0.0, 1.0);
    if t >= 1.0 {
        return path.clone();
    }
    let mut out = BezPath::new();
    if t <= 0.0 {
        return out;
    }

    let segs: Vec<PathSeg> = path.segments().collect();
    let total: f64 = segs.iter().map(|s| s.arclen(ACCURACY)).sum();
    if total <= 0.0 {
        return path.clone();
    }

    let mut remaining = t * total;
    let mut cursor: Option<Point> = None;
    for seg in segs {
        if remaining <= 1e-9 {
            break;
        }
        let start = seg.start();
        if cursor != Some(start) {
            out.move_to(start);
        }
        let len = seg.arclen(ACCURACY);
        if len <= remaining {
            push_seg(&mut out, seg);
            cursor = Some(seg.end());
            remaining -= len;
        } else {
            let u = seg.inv_arclen(remaining, ACCURACY);
            push_seg(&mut out, seg.subsegment(0.0..u));
            break;
        }
    }
    out
}

fn push_seg(out: &mut BezPath, seg: PathSeg) {
    match seg {
        PathSeg::Line(l) => out.line_to(l.p1),
        PathSeg::Quad(q) => out.quad_to(q.p1, q.p2),
        PathSeg::Cubic(c) => out.curve_to(c.p1, c.p2, c.p3),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{blueprint::generate_blueprint, script::fallback_script, style::StyleProfile};

    fn plan_for(topic: &str) -> MoviePlan {
        let bp = generate_blueprint(&fallback_script(topic), &StyleProfile::explainer_2d());
        compile_blueprint(&bp, &VideoConfig::default()).unwrap()
    }

    #[test]
    fn plan_has_one_scene_plan_per_blueprint_scene() {
        let plan = plan_for("How websockets work");
        assert_eq!(plan.scenes.len(), 4);
        assert_eq!(plan.scenes[0].scene_id, 1);
        assert!(plan.total_frames() > 0);
    }

    #[test]
    fn scene_timing_adds_up() {
        // 30fps: 15 caption + n*24 enter + 60 hold + 15 fade out.
        let plan = plan_for("t");
        let title = &plan.scenes[0];
        assert_eq!(title.groups.len(), 1);
        assert_eq!(title.frames, 15 + 24 + 60 + 15);
        assert_eq!(title.caption_in.end.0, 15);
        assert_eq!(title.groups[0].enter.start.0, 15);
        assert_eq!(title.groups[0].enter.end.0, 39);
        assert_eq!(title.fade_out.start.0, title.frames - 15);
    }

    #[test]
    fn locate_maps_global_frames_to_scene_local() {
        let plan = plan_for("t");
        assert_eq!(plan.locate(FrameIndex(0)), Some((0, 0)));
        let first = plan.scenes[0].frames;
        assert_eq!(plan.locate(FrameIndex(first)), Some((1, 0)));
        assert_eq!(plan.locate(FrameIndex(plan.total_frames())), None);
    }

    #[test]
    fn diagram_scene_lowers_to_circles_and_arrow_groups() {
        let script = crate::script::Script::from_lines(
            "t",
            [
                "Intro.".to_string(),
                "The connection stays open.".to_string(),
            ],
        );
        let bp = generate_blueprint(&script, &StyleProfile::explainer_2d());
        let plan = compile_blueprint(&bp, &VideoConfig::default()).unwrap();

        let diagram = &plan.scenes[1];
        assert_eq!(diagram.groups.len(), 3);
        // Two circle+label groups, then a bare arrow group.
        assert_eq!(diagram.groups[0].shapes.len(), 2);
        assert_eq!(diagram.groups[1].shapes.len(), 2);
        assert_eq!(diagram.groups[2].shapes.len(), 1);
        // Groups enter strictly one after another.
        assert_eq!(diagram.groups[0].enter.end, diagram.groups[1].enter.start);
        assert_eq!(diagram.groups[1].enter.end, diagram.groups[2].enter.start);
    }

    #[test]
    fn circle_anchors_sit_three_units_off_center() {
        let script = crate::script::Script::from_lines(
            "t",
            ["Intro.".to_string(), "A request arrives.".to_string()],
        );
        let bp = generate_blueprint(&script, &StyleProfile::explainer_2d());
        let plan = compile_blueprint(&bp, &VideoConfig::default()).unwrap();

        let PlannedShape::Text(client_label) = &plan.scenes[1].groups[0].shapes[1] else {
            panic!("expected circle label");
        };
        // 720px canvas: unit 90, center x 640.
        assert_eq!(client_label.center, Point::new(640.0 - 270.0, 360.0));
        let PlannedShape::Text(server_label) = &plan.scenes[1].groups[1].shapes[1] else {
            panic!("expected circle label");
        };
        assert_eq!(server_label.center, Point::new(640.0 + 270.0, 360.0));
    }

    #[test]
    fn first_frame_shows_only_the_caption_fading_in() {
        let plan = plan_for("t");
        let ops = ops_for_frame(&plan, FrameIndex(1));
        assert_eq!(ops.len(), 1);
        let DrawOp::Text { spec, opacity } = &ops[0] else {
            panic!("expected caption text");
        };
        assert_eq!(spec.size_px, 28.0);
        assert!(*opacity > 0.0 && *opacity < 1.0);
    }

    #[test]
    fn hold_frames_show_everything_at_full_opacity() {
        let plan = plan_for("t");
        let scene = &plan.scenes[0];
        let hold_frame = scene.groups.last().unwrap().enter.end.0 + 1;
        let ops = ops_for_frame(&plan, FrameIndex(hold_frame));
        assert_eq!(ops.len(), 2); // caption + title text
        for op in &ops {
            let opacity = match op {
                DrawOp::Fill { opacity, .. }
                | DrawOp::Stroke { opacity, .. }
                | DrawOp::Text { opacity, .. } => *opacity,
            };
            assert_eq!(opacity, 1.0);
        }
    }

    #[test]
    fn last_frame_is_nearly_faded_out() {
        let plan = plan_for("t");
        let last = plan.scenes[0].frames - 1;
        for op in ops_for_frame(&plan, FrameIndex(last)) {
            let opacity = match op {
                DrawOp::Fill { opacity, .. }
                | DrawOp::Stroke { opacity, .. }
                | DrawOp::Text { opacity, .. } => opacity,
            };
            assert!(opacity < 0.1);
        }
    }

    #[test]
    fn past_the_end_yields_no_ops() {
        let plan = plan_for("t");
        assert!(ops_for_frame(&plan, FrameIndex(plan.total_frames())).is_empty());
    }

    #[test]
    fn ramps_are_pinned_at_both_ends_and_clamped() {
        for ramp in [fade_ramp, reveal_ramp] {
            assert_eq!(ramp(0.0), 0.0);
            assert_eq!(ramp(1.0), 1.0);
            assert_eq!(ramp(-2.0), 0.0);
            assert_eq!(ramp(5.0), 1.0);
        }
    }

    #[test]
    fn fade_ramp_is_symmetric_and_monotonic() {
        assert_eq!(fade_ramp(0.5), 0.5);
        assert!((fade_ramp(0.25) - (1.0 - fade_ramp(0.75))).abs() < 1e-12);
        let mut prev = 0.0;
        for i in 1..=10 {
            let v = fade_ramp(f64::from(i) / 10.0);
            assert!(v > prev);
            prev = v;
        }
    }

    #[test]
    fn reveal_ramp_front_loads_progress() {
        // Most of the path appears in the first half of the window.
        assert!(reveal_ramp(0.5) > 0.8);
        assert!(reveal_ramp(0.25) > 0.5);
    }

    #[test]
    fn partial_path_endpoints() {
        let mut path = BezPath::new();
        path.move_to(Point::new(0.0, 0.0));
        path.line_to(Point::new(10.0, 0.0));
        path.line_to(Point::new(10.0, 10.0));

        assert!(partial_path(&path, 0.0).elements().is_empty());
        assert_eq!(partial_path(&path, 1.0).elements().len(), 3);
    }

    #[test]
    fn partial_path_halfway_stops_mid_polyline() {
        let mut path = BezPath::new();
        path.move_to(Point::new(0.0, 0.0));
        path.line_to(Point::new(10.0, 0.0));
        path.line_to(Point::new(10.0, 10.0));

        let half = partial_path(&path, 0.5);
        // MoveTo + one full segment: the 20-unit polyline cut at 10 units.
        assert_eq!(half.elements().len(), 2);
        let segs: Vec<PathSeg> = half.segments().collect();
        let end = segs.last().unwrap().end();
        assert!((end.x - 10.0).abs() < 1e-6);
        assert!(end.y.abs() < 1e-6);
    }

    #[test]
    fn partial_path_preserves_subpath_breaks() {
        // Arrow-style path: shaft subpath plus head subpath.
        let path = arrow_path(Point::new(0.0, 0.0), Point::new(100.0, 0.0), 10.0);
        let full = partial_path(&path, 1.0);
        let moves = full
            .elements()
            .iter()
            .filter(|e| matches!(e, kurbo::PathEl::MoveTo(_)))
            .count();
        assert_eq!(moves, 2);
    }

    #[test]
    fn arrow_spans_between_circle_edges() {
        let path = arrow_path(Point::new(100.0, 0.0), Point::new(200.0, 0.0), 10.0);
        let segs: Vec<PathSeg> = path.segments().collect();
        assert_eq!(segs[0].start(), Point::new(110.0, 0.0));
        assert_eq!(segs[0].end(), Point::new(190.0, 0.0));
    }
}
