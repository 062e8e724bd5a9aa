use crate::error::{ChalklineError, ChalklineResult};

pub use kurbo::{Affine, BezPath, Point, Rect, Shape, Vec2};

#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
pub struct FrameIndex(pub u64);

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct FrameRange {
    pub start: FrameIndex,
    pub end: FrameIndex, // exclusive
}

impl FrameRange {
    pub fn new(start: FrameIndex, end: FrameIndex) -> ChalklineResult<Self> {
        if start.0 > end.0 {
            return Err(ChalklineError::validation("FrameRange start must be <= end"));
        }
        Ok(Self { start, end })
    }

    pub fn len_frames(self) -> u64 {
        self.end.0.saturating_sub(self.start.0)
    }

    pub fn is_empty(self) -> bool {
        self.start.0 == self.end.0
    }

    pub fn contains(self, f: FrameIndex) -> bool {
        self.start.0 <= f.0 && f.0 < self.end.0
    }

    /// Progress of `f` through the range in [0,1]. Empty ranges report 1.0 so
    /// that zero-length animation windows count as finished.
    pub fn progress(self, f: FrameIndex) -> f64 {
        if self.is_empty() || f.0 >= self.end.0 {
            return 1.0;
        }
        if f.0 < self.start.0 {
            return 0.0;
        }
        (f.0 - self.start.0) as f64 / self.len_frames() as f64
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Fps {
    pub num: u32,
    pub den: u32, // must be > 0
}

impl Fps {
    pub fn new(num: u32, den: u32) -> ChalklineResult<Self> {
        if den == 0 {
            return Err(ChalklineError::validation("Fps den must be > 0"));
        }
        if num == 0 {
            return Err(ChalklineError::validation("Fps num must be > 0"));
        }
        Ok(Self { num, den })
    }

    pub fn as_f64(self) -> f64 {
        f64::from(self.num) / f64::from(self.den)
    }

    pub fn frame_duration_secs(self) -> f64 {
        f64::from(self.den) / f64::from(self.num)
    }

    pub fn secs_to_frames(self, secs: f64) -> u64 {
        (secs * self.as_f64()).round().max(0.0) as u64
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Canvas {
    pub width: u32,
    pub height: u32,
}

impl Canvas {
    pub fn center(self) -> Point {
        Point::new(f64::from(self.width) / 2.0, f64::from(self.height) / 2.0)
    }
}

/// Straight-alpha RGBA8.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Rgba8 {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba8 {
    pub const fn opaque(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_range_contains_boundaries() {
        let r = FrameRange::new(FrameIndex(2), FrameIndex(5)).unwrap();
        assert!(!r.contains(FrameIndex(1)));
        assert!(r.contains(FrameIndex(2)));
        assert!(r.contains(FrameIndex(4)));
        assert!(!r.contains(FrameIndex(5)));
    }

    #[test]
    fn frame_range_progress_saturates() {
        let r = FrameRange::new(FrameIndex(10), FrameIndex(20)).unwrap();
        assert_eq!(r.progress(FrameIndex(5)), 0.0);
        assert_eq!(r.progress(FrameIndex(15)), 0.5);
        assert_eq!(r.progress(FrameIndex(20)), 1.0);
        assert_eq!(r.progress(FrameIndex(99)), 1.0);

        let empty = FrameRange::new(FrameIndex(3), FrameIndex(3)).unwrap();
        assert_eq!(empty.progress(FrameIndex(0)), 1.0);
    }

    #[test]
    fn fps_secs_to_frames_rounds() {
        let fps = Fps::new(30, 1).unwrap();
        assert_eq!(fps.secs_to_frames(2.0), 60);
        assert_eq!(fps.secs_to_frames(0.5), 15);
        assert_eq!(fps.secs_to_frames(-1.0), 0);
    }

    #[test]
    fn canvas_center_is_midpoint() {
        let c = Canvas {
            width: 1280,
            height: 720,
        };
        assert_eq!(c.center(), Point::new(640.0, 360.0));
    }
}
