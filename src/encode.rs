use std::{
    io::Write as _,
    path::{Path, PathBuf},
    process::{Child, ChildStdin, Command, Stdio},
};

use anyhow::Context as _;

use crate::{
    core::{Fps, Rgba8},
    error::{ChalklineError, ChalklineResult},
    render::FrameRgba,
};

#[derive(Clone, Debug)]
pub struct EncodeConfig {
    pub width: u32,
    pub height: u32,
    pub fps: Fps,
    pub out_path: PathBuf,
    pub overwrite: bool,
}

impl EncodeConfig {
    pub fn validate(&self) -> ChalklineResult<()> {
        Fps::new(self.fps.num, self.fps.den)?;
        if self.width == 0 || self.height == 0 {
            return Err(ChalklineError::validation(format!(
                "cannot encode a {}x{} video",
                self.width, self.height
            )));
        }
        // yuv420p subsamples chroma 2x2, so both dimensions must be even.
        if self.width % 2 != 0 || self.height % 2 != 0 {
            return Err(ChalklineError::validation(format!(
                "video dimensions must be even, got {}x{}",
                self.width, self.height
            )));
        }
        Ok(())
    }

    fn bytes_per_frame(&self) -> usize {
        (self.width * self.height * 4) as usize
    }
}

/// Arguments for one encoding run. The frame rate is passed as an exact
/// rational so rates like 30000/1001 do not drift.
fn ffmpeg_args(cfg: &EncodeConfig) -> Vec<String> {
    let mut args: Vec<String> = vec![if cfg.overwrite { "-y" } else { "-n" }.into()];
    for a in [
        "-loglevel",
        "error",
        "-f",
        "rawvideo",
        "-pix_fmt",
        "rgba",
    ] {
        args.push(a.into());
    }
    args.push("-s".into());
    args.push(format!("{}x{}", cfg.width, cfg.height));
    args.push("-r".into());
    args.push(format!("{}/{}", cfg.fps.num, cfg.fps.den));
    for a in [
        "-i",
        "pipe:0",
        "-an",
        "-c:v",
        "libx264",
        "-pix_fmt",
        "yuv420p",
        "-movflags",
        "+faststart",
    ] {
        args.push(a.into());
    }
    args.push(cfg.out_path.display().to_string());
    args
}

pub fn is_ffmpeg_on_path() -> bool {
    Command::new("ffmpeg")
        .arg("-version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .is_ok_and(|s| s.success())
}

fn ensure_parent_dir(path: &Path) -> ChalklineResult<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating output directory '{}'", parent.display()))?;
    }
    Ok(())
}

/// Streams raw RGBA frames into a spawned system `ffmpeg` and finalizes an
/// H.264 MP4. Using the system binary keeps the crate free of native FFmpeg
/// headers and libraries.
pub struct Mp4Encoder {
    cfg: EncodeConfig,
    bg: Rgba8,
    child: Child,
    pipe: Option<ChildStdin>,
    flat: Vec<u8>,
}

impl Mp4Encoder {
    pub fn spawn(cfg: EncodeConfig, background: Rgba8) -> ChalklineResult<Self> {
        cfg.validate()?;
        ensure_parent_dir(&cfg.out_path)?;

        if !cfg.overwrite && cfg.out_path.exists() {
            return Err(ChalklineError::validation(format!(
                "refusing to overwrite existing '{}'",
                cfg.out_path.display()
            )));
        }

        if !is_ffmpeg_on_path() {
            return Err(ChalklineError::encode(
                "MP4 output needs the ffmpeg binary on PATH; install ffmpeg or use the frame command",
            ));
        }

        let mut child = Command::new("ffmpeg")
            .args(ffmpeg_args(&cfg))
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| ChalklineError::encode(format!("could not start ffmpeg: {e}")))?;
        let pipe = child
            .stdin
            .take()
            .ok_or_else(|| ChalklineError::encode("ffmpeg started without a writable stdin"))?;

        Ok(Self {
            flat: vec![0u8; cfg.bytes_per_frame()],
            cfg,
            bg: background,
            child,
            pipe: Some(pipe),
        })
    }

    pub fn push_frame(&mut self, frame: &FrameRgba) -> ChalklineResult<()> {
        if frame.width != self.cfg.width || frame.height != self.cfg.height {
            return Err(ChalklineError::validation(format!(
                "frame is {}x{} but this encoder was opened for {}x{}",
                frame.width, frame.height, self.cfg.width, self.cfg.height
            )));
        }
        if frame.data.len() != self.flat.len() {
            return Err(ChalklineError::validation(format!(
                "frame buffer holds {} bytes, expected {}",
                frame.data.len(),
                self.flat.len()
            )));
        }

        composite_over(&mut self.flat, &frame.data, frame.premultiplied, self.bg)?;

        let Some(pipe) = self.pipe.as_mut() else {
            return Err(ChalklineError::encode(
                "push_frame called after the encoder was finalized",
            ));
        };
        pipe.write_all(&self.flat)
            .map_err(|e| ChalklineError::encode(format!("ffmpeg stopped accepting frames: {e}")))?;
        Ok(())
    }

    pub fn finish(mut self) -> ChalklineResult<()> {
        // Closing stdin signals end of stream.
        drop(self.pipe.take());

        let output = self
            .child
            .wait_with_output()
            .map_err(|e| ChalklineError::encode(format!("waiting for ffmpeg: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ChalklineError::encode(format!(
                "ffmpeg failed ({}): {}",
                output.status,
                stderr.trim()
            )));
        }
        Ok(())
    }
}

/// `(v * by) / 255` with rounding, for 8-bit alpha weighting.
fn scale8(v: u8, by: u16) -> u16 {
    (u16::from(v) * by + 127) / 255
}

/// Composite RGBA pixels over an opaque background color, writing fully
/// opaque RGBA8 into `dst`. The video stream carries no alpha channel, so
/// whatever transparency the renderer produced is resolved here.
fn composite_over(
    dst: &mut [u8],
    src: &[u8],
    src_is_premul: bool,
    bg: Rgba8,
) -> ChalklineResult<()> {
    if dst.len() != src.len() || dst.len() % 4 != 0 {
        return Err(ChalklineError::validation(
            "compositing needs two rgba8 buffers of the same size",
        ));
    }

    for (d, s) in dst.chunks_exact_mut(4).zip(src.chunks_exact(4)) {
        let alpha = s[3];
        if alpha == 255 {
            d[..3].copy_from_slice(&s[..3]);
            d[3] = 255;
            continue;
        }

        let inv = u16::from(255 - alpha);
        let weight = u16::from(alpha);
        for c in 0..3 {
            let under = scale8([bg.r, bg.g, bg.b][c], inv);
            let over = if src_is_premul {
                u16::from(s[c])
            } else {
                scale8(s[c], weight)
            };
            d[c] = (over + under).min(255) as u8;
        }
        d[3] = 255;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg(width: u32, height: u32, fps: Fps) -> EncodeConfig {
        EncodeConfig {
            width,
            height,
            fps,
            out_path: PathBuf::from("out/final.mp4"),
            overwrite: true,
        }
    }

    #[test]
    fn config_rejects_zero_and_odd_dimensions() {
        let fps = Fps { num: 30, den: 1 };
        assert!(cfg(0, 10, fps).validate().is_err());
        assert!(cfg(10, 0, fps).validate().is_err());
        assert!(cfg(11, 10, fps).validate().is_err());
        assert!(cfg(10, 11, fps).validate().is_err());
        assert!(cfg(10, 10, Fps { num: 30, den: 0 }).validate().is_err());
        assert!(cfg(1280, 720, fps).validate().is_ok());
    }

    #[test]
    fn args_carry_size_rate_and_codec() {
        let args = ffmpeg_args(&cfg(1280, 720, Fps { num: 30, den: 1 }));
        assert_eq!(args[0], "-y");
        let size_at = args.iter().position(|a| a == "-s").unwrap();
        assert_eq!(args[size_at + 1], "1280x720");
        let rate_at = args.iter().position(|a| a == "-r").unwrap();
        assert_eq!(args[rate_at + 1], "30/1");
        assert!(args.contains(&"libx264".to_string()));
        assert!(args.contains(&"yuv420p".to_string()));
        assert_eq!(args.last().unwrap(), "out/final.mp4");
    }

    #[test]
    fn fractional_rates_stay_exact_in_the_args() {
        let args = ffmpeg_args(&cfg(1280, 720, Fps { num: 30000, den: 1001 }));
        let rate_at = args.iter().position(|a| a == "-r").unwrap();
        assert_eq!(args[rate_at + 1], "30000/1001");
    }

    #[test]
    fn no_overwrite_config_asks_ffmpeg_not_to_clobber() {
        let mut c = cfg(10, 10, Fps { num: 30, den: 1 });
        c.overwrite = false;
        assert_eq!(ffmpeg_args(&c)[0], "-n");
    }

    #[test]
    fn composite_premul_half_red_over_black() {
        let src = vec![128u8, 0, 0, 128];
        let mut dst = vec![0u8; 4];
        composite_over(&mut dst, &src, true, Rgba8::opaque(0, 0, 0)).unwrap();
        assert_eq!(dst, vec![128, 0, 0, 255]);
    }

    #[test]
    fn composite_straight_half_red_over_black() {
        let src = vec![255u8, 0, 0, 128];
        let mut dst = vec![0u8; 4];
        composite_over(&mut dst, &src, false, Rgba8::opaque(0, 0, 0)).unwrap();
        assert_eq!(dst, vec![128, 0, 0, 255]);
    }

    #[test]
    fn composite_transparent_pixel_becomes_background() {
        let src = vec![0u8, 0, 0, 0];
        let mut dst = vec![0u8; 4];
        composite_over(&mut dst, &src, true, Rgba8::opaque(10, 20, 30)).unwrap();
        assert_eq!(dst, vec![10, 20, 30, 255]);
    }

    #[test]
    fn composite_rejects_length_mismatch() {
        let src = vec![0u8; 8];
        let mut dst = vec![0u8; 4];
        assert!(composite_over(&mut dst, &src, true, Rgba8::opaque(0, 0, 0)).is_err());
    }
}
