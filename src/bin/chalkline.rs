use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use chalkline::{
    CpuBackend, FrameIndex, LlmConfig, PipelineConfig, VideoConfig,
    pipeline::{self, write_preview_frame},
};

#[derive(Parser, Debug)]
#[command(name = "chalkline", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate a script for a topic and render the full MP4 (requires `ffmpeg` on PATH).
    Render(RenderArgs),
    /// Render a single frame of a topic's movie plan as a PNG.
    Frame(FrameArgs),
}

#[derive(Parser, Debug)]
struct RenderArgs {
    /// Topic to explain.
    #[arg(default_value = "How websockets work")]
    topic: String,

    /// Directory for script.json, blueprint.json and the final MP4.
    #[arg(long, default_value = "outputs")]
    out_dir: PathBuf,

    /// Override the LLM model name.
    #[arg(long)]
    model: Option<String>,
}

#[derive(Parser, Debug)]
struct FrameArgs {
    /// Topic to explain.
    #[arg(default_value = "How websockets work")]
    topic: String,

    /// Frame index (0-based).
    #[arg(long)]
    frame: u64,

    /// Output PNG path.
    #[arg(long)]
    out: PathBuf,

    /// Directory for script.json and blueprint.json.
    #[arg(long, default_value = "outputs")]
    out_dir: PathBuf,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    match cli.cmd {
        Command::Render(args) => cmd_render(args),
        Command::Frame(args) => cmd_frame(args),
    }
}

fn config_for(out_dir: PathBuf, model: Option<String>) -> PipelineConfig {
    let mut llm = LlmConfig::default();
    if let Some(model) = model {
        llm.model = model;
    }
    PipelineConfig {
        output_dir: out_dir,
        video: VideoConfig::default(),
        llm,
    }
}

fn cmd_render(args: RenderArgs) -> anyhow::Result<()> {
    let cfg = config_for(args.out_dir, args.model);
    let mut backend = CpuBackend::new(cfg.video.background);

    let report = pipeline::run_pipeline(&args.topic, &cfg, &mut backend)?;

    eprintln!("script:    {}", report.script_path.display());
    eprintln!("blueprint: {}", report.blueprint_path.display());
    eprintln!("wrote {}", report.video_path.display());
    Ok(())
}

fn cmd_frame(args: FrameArgs) -> anyhow::Result<()> {
    let cfg = config_for(args.out_dir, None);
    let prepared = pipeline::prepare_topic(&args.topic, &cfg)?;

    let total = prepared.plan.total_frames();
    if args.frame >= total {
        anyhow::bail!("frame {} out of range (plan has {} frames)", args.frame, total);
    }

    let mut backend = CpuBackend::new(cfg.video.background);
    write_preview_frame(&prepared.plan, FrameIndex(args.frame), &mut backend, &args.out)?;

    eprintln!("wrote {}", args.out.display());
    Ok(())
}
