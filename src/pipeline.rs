use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::Context as _;
use tracing::info;

use crate::{
    blueprint::{Blueprint, generate_blueprint},
    compile::{MoviePlan, VideoConfig, compile_blueprint},
    core::FrameIndex,
    encode::{EncodeConfig, Mp4Encoder},
    error::{ChalklineError, ChalklineResult},
    render::{FrameRgba, RenderBackend, render_frame},
    script::{GeneratedScript, LlmConfig, ScriptGenerator, ScriptOrigin},
    style::StyleProfile,
};

#[derive(Clone, Debug)]
pub struct PipelineConfig {
    pub output_dir: PathBuf,
    pub video: VideoConfig,
    pub llm: LlmConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("outputs"),
            video: VideoConfig::default(),
            llm: LlmConfig::default(),
        }
    }
}

/// Artifacts produced before any rendering happens. Kept separate from the
/// encode stage so the deterministic part can run without ffmpeg.
#[derive(Debug)]
pub struct PreparedTopic {
    pub script_origin: ScriptOrigin,
    pub script_path: PathBuf,
    pub blueprint_path: PathBuf,
    pub blueprint: Blueprint,
    pub plan: MoviePlan,
}

#[derive(Debug)]
pub struct PipelineReport {
    pub script_origin: ScriptOrigin,
    pub script_path: PathBuf,
    pub blueprint_path: PathBuf,
    pub video_path: PathBuf,
}

/// Lowercases the topic and maps every non-alphanumeric character to `_`,
/// giving a stable filesystem-safe stem for output names.
pub fn sanitize_topic(topic: &str) -> String {
    topic
        .to_lowercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

pub fn prepare_topic(topic: &str, cfg: &PipelineConfig) -> ChalklineResult<PreparedTopic> {
    let topic = topic.trim();
    if topic.is_empty() {
        return Err(ChalklineError::validation("topic must not be empty"));
    }
    cfg.video.validate()?;

    fs::create_dir_all(&cfg.output_dir).with_context(|| {
        format!(
            "failed to create output directory '{}'",
            cfg.output_dir.display()
        )
    })?;

    let generator = ScriptGenerator::new(cfg.llm.clone())?;
    let GeneratedScript { script, origin } = generator.generate(topic);
    script.validate()?;
    info!(topic, scenes = script.scenes.len(), origin = ?origin, "script ready");

    let script_path = cfg.output_dir.join("script.json");
    write_json(&script_path, &script)?;

    let style = StyleProfile::explainer_2d();
    let blueprint = generate_blueprint(&script, &style);
    blueprint.validate()?;

    let blueprint_path = cfg.output_dir.join("blueprint.json");
    write_json(&blueprint_path, &blueprint)?;

    let plan = compile_blueprint(&blueprint, &cfg.video)?;
    info!(
        scenes = plan.scenes.len(),
        frames = plan.total_frames(),
        "movie plan compiled"
    );

    Ok(PreparedTopic {
        script_origin: origin,
        script_path,
        blueprint_path,
        blueprint,
        plan,
    })
}

/// Renders every frame of the plan through `backend` and encodes the MP4 to
/// `<output_dir>/final_<sanitized topic>.mp4`.
pub fn run_pipeline(
    topic: &str,
    cfg: &PipelineConfig,
    backend: &mut dyn RenderBackend,
) -> ChalklineResult<PipelineReport> {
    let prepared = prepare_topic(topic, cfg)?;
    let plan = &prepared.plan;

    let video_path = cfg
        .output_dir
        .join(format!("final_{}.mp4", sanitize_topic(topic.trim())));

    let mut encoder = Mp4Encoder::spawn(
        EncodeConfig {
            width: plan.canvas.width,
            height: plan.canvas.height,
            fps: plan.fps,
            out_path: video_path.clone(),
            overwrite: true,
        },
        plan.background,
    )?;

    let total = plan.total_frames();
    for frame in 0..total {
        let rgba = render_frame(plan, FrameIndex(frame), backend)?;
        encoder.push_frame(&rgba)?;
        if frame % 30 == 0 {
            info!(frame, total, "rendering");
        }
    }
    encoder.finish()?;
    info!(path = %video_path.display(), "video written");

    Ok(PipelineReport {
        script_origin: prepared.script_origin,
        script_path: prepared.script_path,
        blueprint_path: prepared.blueprint_path,
        video_path,
    })
}

/// Renders a single frame of the plan to a PNG, for quick visual checks.
pub fn write_preview_frame(
    plan: &MoviePlan,
    frame: FrameIndex,
    backend: &mut dyn RenderBackend,
    out_path: &Path,
) -> ChalklineResult<()> {
    let rgba = render_frame(plan, frame, backend)?;
    let flat = unpremultiply(&rgba);
    image::save_buffer_with_format(
        out_path,
        &flat,
        rgba.width,
        rgba.height,
        image::ColorType::Rgba8,
        image::ImageFormat::Png,
    )
    .with_context(|| format!("failed to write '{}'", out_path.display()))?;
    Ok(())
}

fn unpremultiply(frame: &FrameRgba) -> Vec<u8> {
    let mut out = frame.data.clone();
    if !frame.premultiplied {
        return out;
    }
    for px in out.chunks_exact_mut(4) {
        let a = px[3] as u32;
        if a == 0 || a == 255 {
            continue;
        }
        for c in px.iter_mut().take(3) {
            *c = ((*c as u32 * 255 + a / 2) / a).min(255) as u8;
        }
    }
    out
}

fn write_json<T: serde::Serialize>(path: &Path, value: &T) -> ChalklineResult<()> {
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| ChalklineError::serde(format!("failed to serialize json: {e}")))?;
    fs::write(path, json + "\n")
        .with_context(|| format!("failed to write '{}'", path.display()))?;
    Ok(())
}
