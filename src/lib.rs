#![forbid(unsafe_code)]

pub mod blueprint;
pub mod compile;
pub mod core;
pub mod encode;
pub mod error;
pub mod pipeline;
pub mod render;
pub mod render_cpu;
pub mod script;
pub mod style;

pub use blueprint::{Blueprint, BlueprintScene, Element, Side, generate_blueprint};
pub use compile::{MoviePlan, VideoConfig, compile_blueprint};
pub use core::{Canvas, Fps, FrameIndex, FrameRange, Rgba8};
pub use error::{ChalklineError, ChalklineResult};
pub use pipeline::{PipelineConfig, PipelineReport, run_pipeline};
pub use render::{FrameRgba, RenderBackend, render_frame};
pub use render_cpu::CpuBackend;
pub use script::{GeneratedScript, LlmConfig, Script, ScriptGenerator, ScriptOrigin};
pub use style::StyleProfile;
