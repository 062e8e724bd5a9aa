use std::collections::HashMap;

use crate::{
    compile::{DrawOp, TextSpec},
    core::{BezPath, Canvas, Point, Rgba8},
    error::{ChalklineError, ChalklineResult},
    render::{FrameRgba, RenderBackend},
};

/// Software rasterizer backed by `vello_cpu`, with text shaped by Parley
/// against the system font collection.
pub struct CpuBackend {
    background: Rgba8,
    text: TextLayouter,
    font_cache: HashMap<(u64, u32), vello_cpu::peniko::FontData>,
    frame: Option<FrameState>,
}

struct FrameState {
    width: u16,
    height: u16,
    ctx: vello_cpu::RenderContext,
}

impl CpuBackend {
    pub fn new(background: Rgba8) -> Self {
        Self {
            background,
            text: TextLayouter::new(),
            font_cache: HashMap::new(),
            frame: None,
        }
    }
}

impl RenderBackend for CpuBackend {
    fn begin_frame(&mut self, canvas: Canvas) -> ChalklineResult<()> {
        let width: u16 = canvas
            .width
            .try_into()
            .map_err(|_| ChalklineError::render("canvas width exceeds u16"))?;
        let height: u16 = canvas
            .height
            .try_into()
            .map_err(|_| ChalklineError::render("canvas height exceeds u16"))?;

        let mut ctx = vello_cpu::RenderContext::new(width, height);
        ctx.set_transform(vello_cpu::kurbo::Affine::IDENTITY);
        ctx.set_paint(vello_cpu::peniko::Color::from_rgba8(
            self.background.r,
            self.background.g,
            self.background.b,
            255,
        ));
        ctx.fill_rect(&vello_cpu::kurbo::Rect::new(
            0.0,
            0.0,
            f64::from(canvas.width),
            f64::from(canvas.height),
        ));

        self.frame = Some(FrameState { width, height, ctx });
        Ok(())
    }

    fn draw(&mut self, op: &DrawOp) -> ChalklineResult<()> {
        let Self {
            text,
            font_cache,
            frame,
            ..
        } = self;
        let Some(frame) = frame.as_mut() else {
            return Err(ChalklineError::render("draw called outside begin_frame"));
        };
        let ctx = &mut frame.ctx;
        ctx.set_paint_transform(vello_cpu::kurbo::Affine::IDENTITY);

        match op {
            DrawOp::Fill {
                path,
                color,
                opacity,
            } => {
                ctx.set_transform(vello_cpu::kurbo::Affine::IDENTITY);
                ctx.set_paint(color_to_cpu(*color));
                if *opacity < 1.0 {
                    ctx.push_opacity_layer(*opacity);
                }
                ctx.fill_path(&bezpath_to_cpu(path));
                if *opacity < 1.0 {
                    ctx.pop_layer();
                }
                Ok(())
            }
            DrawOp::Stroke {
                path,
                color,
                width,
                opacity,
            } => {
                // Outline with kurbo and fill the outline, so the backend
                // only leans on the fill primitive.
                let style = kurbo::Stroke::new(*width)
                    .with_caps(kurbo::Cap::Round)
                    .with_join(kurbo::Join::Round);
                let outline = kurbo::stroke(
                    path.elements().iter().copied(),
                    &style,
                    &kurbo::StrokeOpts::default(),
                    0.25,
                );

                ctx.set_transform(vello_cpu::kurbo::Affine::IDENTITY);
                ctx.set_paint(color_to_cpu(*color));
                if *opacity < 1.0 {
                    ctx.push_opacity_layer(*opacity);
                }
                ctx.fill_path(&bezpath_to_cpu(&outline));
                if *opacity < 1.0 {
                    ctx.pop_layer();
                }
                Ok(())
            }
            DrawOp::Text { spec, opacity } => {
                let layout = text.layout(spec)?;
                let origin = layout_origin(spec, &layout);
                ctx.set_transform(vello_cpu::kurbo::Affine::translate((origin.x, origin.y)));

                if *opacity < 1.0 {
                    ctx.push_opacity_layer(*opacity);
                }

                for line in layout.lines() {
                    for item in line.items() {
                        let parley::layout::PositionedLayoutItem::GlyphRun(run) = item else {
                            continue;
                        };

                        let brush = run.style().brush;
                        ctx.set_paint(vello_cpu::peniko::Color::from_rgba8(
                            brush.r, brush.g, brush.b, brush.a,
                        ));

                        let source = run.run().font();
                        let key = (source.data.id(), source.index);
                        let font = font_cache
                            .entry(key)
                            .or_insert_with(|| {
                                vello_cpu::peniko::FontData::new(
                                    vello_cpu::peniko::Blob::from(source.data.as_ref().to_vec()),
                                    source.index,
                                )
                            })
                            .clone();

                        let glyphs = run.positioned_glyphs().map(|g| vello_cpu::Glyph {
                            id: g.id,
                            x: g.x,
                            y: g.y,
                        });
                        ctx.glyph_run(&font)
                            .font_size(run.run().font_size())
                            .fill_glyphs(glyphs);
                    }
                }

                if *opacity < 1.0 {
                    ctx.pop_layer();
                }

                Ok(())
            }
        }
    }

    fn end_frame(&mut self) -> ChalklineResult<FrameRgba> {
        let Some(mut frame) = self.frame.take() else {
            return Err(ChalklineError::render("end_frame called outside begin_frame"));
        };

        let mut pixmap = vello_cpu::Pixmap::new(frame.width, frame.height);
        frame.ctx.flush();
        frame.ctx.render_to_pixmap(&mut pixmap);

        Ok(FrameRgba {
            width: u32::from(frame.width),
            height: u32::from(frame.height),
            data: pixmap.data_as_u8_slice().to_vec(),
            premultiplied: true,
        })
    }
}

/// Top-left corner that centers the layout box on the requested point.
fn layout_origin(spec: &TextSpec, layout: &parley::Layout<TextBrush>) -> Point {
    let box_width = match spec.max_width {
        Some(w) => w,
        None => f64::from(layout.width()),
    };
    Point::new(
        spec.center.x - box_width / 2.0,
        spec.center.y - f64::from(layout.height()) / 2.0,
    )
}

fn color_to_cpu(c: Rgba8) -> vello_cpu::peniko::Color {
    vello_cpu::peniko::Color::from_rgba8(c.r, c.g, c.b, c.a)
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

fn point_to_cpu(p: Point) -> vello_cpu::kurbo::Point {
    vello_cpu::kurbo::Point::new(p.x, p.y)
}

/// RGBA8 brush carried through Parley styling.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct TextBrush {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

/// Stateful helper for shaping text with the system sans-serif family.
struct TextLayouter {
    font_ctx: parley::FontContext,
    layout_ctx: parley::LayoutContext<TextBrush>,
}

impl TextLayouter {
    fn new() -> Self {
        Self {
            font_ctx: parley::FontContext::default(),
            layout_ctx: parley::LayoutContext::new(),
        }
    }

    fn layout(&mut self, spec: &TextSpec) -> ChalklineResult<parley::Layout<TextBrush>> {
        if !spec.size_px.is_finite() || spec.size_px <= 0.0 {
            return Err(ChalklineError::render("text size_px must be finite and > 0"));
        }

        let brush = TextBrush {
            r: spec.color.r,
            g: spec.color.g,
            b: spec.color.b,
            a: spec.color.a,
        };

        let mut builder = self
            .layout_ctx
            .ranged_builder(&mut self.font_ctx, &spec.content, 1.0, true);
        builder.push_default(parley::style::StyleProperty::FontStack(
            parley::style::FontStack::Single(parley::style::FontFamily::Generic(
                parley::style::GenericFamily::SansSerif,
            )),
        ));
        builder.push_default(parley::style::StyleProperty::FontSize(spec.size_px));
        builder.push_default(parley::style::StyleProperty::Brush(brush));

        let mut layout: parley::Layout<TextBrush> = builder.build(&spec.content);
        if let Some(w) = spec.max_width {
            layout.break_all_lines(Some(w as f32));
            layout.align(
                Some(w as f32),
                parley::Alignment::Center,
                parley::AlignmentOptions::default(),
            );
        } else {
            layout.break_all_lines(None);
        }

        Ok(layout)
    }
}
