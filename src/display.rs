use std::path::Path;

use anyhow::{Context, Result};
use image::{Rgba, RgbaImage};

use crate::presence::{HandRecord, Handedness, PresenceLabel};

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_info};

/// Half the side of the square drawn at each keypoint.
const KEYPOINT_RADIUS: i64 = 2;
const LEFT_COLOR: Rgba<u8> = Rgba([255, 64, 64, 255]);
const RIGHT_COLOR: Rgba<u8> = Rgba([64, 128, 255, 255]);

/// `mm:ss`, minutes growing past two digits when needed.
pub fn format_time(seconds: u64) -> String {
    format!("{:02}:{:02}", seconds / 60, seconds % 60)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusLine {
    pub label: PresenceLabel,
    pub elapsed_seconds: u64,
}

impl std::fmt::Display for StatusLine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} - Timer: {}",
            self.label,
            format_time(self.elapsed_seconds)
        )
    }
}

/// Draws the current frame and whatever the detector found on it.
pub trait Renderer: Send {
    fn render(&mut self, frame: &RgbaImage, hands: &[HandRecord], status: &StatusLine);
}

/// Paints every keypoint of every hand onto `canvas`. Points outside the
/// canvas are clipped.
pub fn draw_hands(canvas: &mut RgbaImage, hands: &[HandRecord]) {
    let (width, height) = (canvas.width() as i64, canvas.height() as i64);

    for hand in hands {
        let color = match hand.handedness {
            Handedness::Left => LEFT_COLOR,
            Handedness::Right => RIGHT_COLOR,
        };

        for point in &hand.keypoints {
            if !covers_canvas(point.x, width) || !covers_canvas(point.y, height) {
                continue;
            }
            let (cx, cy) = (point.x.round() as i64, point.y.round() as i64);
            for y in (cy - KEYPOINT_RADIUS).max(0)..=(cy + KEYPOINT_RADIUS).min(height - 1) {
                for x in (cx - KEYPOINT_RADIUS).max(0)..=(cx + KEYPOINT_RADIUS).min(width - 1) {
                    canvas.put_pixel(x as u32, y as u32, color);
                }
            }
        }
    }
}

/// Whether a square centred at `coord` can touch a canvas axis of length
/// `extent`. Also rejects NaN and infinities.
fn covers_canvas(coord: f32, extent: i64) -> bool {
    let margin = KEYPOINT_RADIUS as f32;
    coord.is_finite() && coord >= -margin && coord <= (extent - 1) as f32 + margin
}

/// Keeps the last annotated frame in memory and logs the status line
/// whenever it changes.
#[derive(Default)]
pub struct ConsoleRenderer {
    canvas: Option<RgbaImage>,
    last_line: Option<String>,
}

impl ConsoleRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_line(&self) -> Option<&str> {
        self.last_line.as_deref()
    }

    pub fn canvas(&self) -> Option<&RgbaImage> {
        self.canvas.as_ref()
    }

    pub fn save_snapshot(&self, path: &Path) -> Result<()> {
        let canvas = self
            .canvas
            .as_ref()
            .context("no frame has been rendered yet")?;
        canvas
            .save(path)
            .with_context(|| format!("failed to write snapshot to {}", path.display()))
    }
}

impl Renderer for ConsoleRenderer {
    fn render(&mut self, frame: &RgbaImage, hands: &[HandRecord], status: &StatusLine) {
        let canvas = self.canvas.get_or_insert_with(|| frame.clone());
        if canvas.dimensions() == frame.dimensions() {
            canvas.copy_from_slice(frame.as_raw());
        } else {
            *canvas = frame.clone();
        }
        draw_hands(canvas, hands);

        let line = status.to_string();
        if self.last_line.as_deref() != Some(line.as_str()) {
            log_info!("{line}");
            self.last_line = Some(line);
        } else {
            log_debug!("frame rendered ({} hands)", hands.len());
        }
    }
}
