use std::{collections::HashMap, path::Path, time::Duration};

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use image::RgbaImage;
use serde::Deserialize;
use tokio::time::{self, Interval, MissedTickBehavior};

use crate::presence::HandRecord;

/// A captured frame. `sequence` increases by one per frame.
#[derive(Debug, Clone)]
pub struct Frame {
    pub sequence: u64,
    pub image: RgbaImage,
}

/// Supplies frames at the display's cadence.
#[async_trait]
pub trait FrameSource: Send {
    /// Acquires the device. A failure here means the session never starts.
    async fn open(&mut self) -> Result<()> {
        Ok(())
    }

    /// Next frame, or `None` once the stream has ended.
    async fn next_frame(&mut self) -> Result<Option<Frame>>;

    /// Releases the device.
    fn close(&mut self) {}
}

/// Runs the hand-pose model against one frame.
#[async_trait]
pub trait HandDetector: Send + Sync {
    async fn estimate_hands(&self, frame: &Frame) -> Result<Vec<HandRecord>>;
}

/// One line of a replay file: either the hands found on that frame or the
/// error the detector reported for it.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ReplayEntry {
    Hands { hands: Vec<HandRecord> },
    Failure { error: String },
}

pub fn parse_replay(contents: &str) -> Result<Vec<ReplayEntry>> {
    contents
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(index, line)| {
            serde_json::from_str(line)
                .with_context(|| format!("invalid replay entry on line {}", index + 1))
        })
        .collect()
}

/// Plays back recorded detector output as blank frames at a fixed rate.
pub struct ReplaySource {
    total_frames: u64,
    next_sequence: u64,
    width: u32,
    height: u32,
    frame_interval: Duration,
    ticker: Option<Interval>,
}

impl ReplaySource {
    pub fn new(total_frames: u64, fps: u32, width: u32, height: u32) -> Self {
        Self {
            total_frames,
            next_sequence: 0,
            width,
            height,
            frame_interval: Duration::from_secs_f64(1.0 / f64::from(fps.max(1))),
            ticker: None,
        }
    }
}

#[async_trait]
impl FrameSource for ReplaySource {
    async fn open(&mut self) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            bail!("replay frame size must be non-zero");
        }
        let mut ticker = time::interval(self.frame_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        self.ticker = Some(ticker);
        Ok(())
    }

    async fn next_frame(&mut self) -> Result<Option<Frame>> {
        if self.next_sequence >= self.total_frames {
            return Ok(None);
        }
        let ticker = self
            .ticker
            .as_mut()
            .ok_or_else(|| anyhow!("replay source used before open"))?;
        ticker.tick().await;

        let frame = Frame {
            sequence: self.next_sequence,
            image: RgbaImage::new(self.width, self.height),
        };
        self.next_sequence += 1;
        Ok(Some(frame))
    }

    fn close(&mut self) {
        self.ticker = None;
    }
}

/// Answers each frame with the recorded detector output for its sequence
/// number. Frames past the end of the recording have no hands.
pub struct ReplayDetector {
    entries: HashMap<u64, ReplayEntry>,
}

impl ReplayDetector {
    pub fn new(entries: Vec<ReplayEntry>) -> Self {
        Self {
            entries: (0u64..).zip(entries).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl HandDetector for ReplayDetector {
    async fn estimate_hands(&self, frame: &Frame) -> Result<Vec<HandRecord>> {
        match self.entries.get(&frame.sequence) {
            Some(ReplayEntry::Hands { hands }) => Ok(hands.clone()),
            Some(ReplayEntry::Failure { error }) => Err(anyhow!("detector failed: {error}")),
            None => Ok(Vec::new()),
        }
    }
}

/// Reads a replay file and builds the matching source and detector.
pub fn load_replay(
    path: &Path,
    fps: u32,
    width: u32,
    height: u32,
) -> Result<(ReplaySource, ReplayDetector)> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read replay file {}", path.display()))?;
    let entries = parse_replay(&contents)?;
    let source = ReplaySource::new(entries.len() as u64, fps, width, height);
    Ok((source, ReplayDetector::new(entries)))
}
