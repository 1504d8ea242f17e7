//! Detector output as the rest of the app sees it.

use serde::{Deserialize, Serialize};

/// Handedness as reported by the detector. The detector looks at the raw,
/// unmirrored frame, so this is the opposite of what the user sees in the
/// mirrored preview.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Handedness {
    Left,
    Right,
}

impl Handedness {
    pub fn mirrored(self) -> Self {
        match self {
            Handedness::Left => Handedness::Right,
            Handedness::Right => Handedness::Left,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Keypoint {
    pub x: f32,
    pub y: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HandRecord {
    pub handedness: Handedness,
    #[serde(default)]
    pub score: Option<f32>,
    #[serde(default)]
    pub keypoints: Vec<Keypoint>,
}

impl HandRecord {
    pub fn new(handedness: Handedness) -> Self {
        Self {
            handedness,
            score: None,
            keypoints: Vec::new(),
        }
    }
}

/// One frame's worth of detector output.
#[derive(Debug, Clone, PartialEq)]
pub struct PresenceSample {
    hands: Vec<HandRecord>,
}

impl PresenceSample {
    /// Builds a sample from raw detector output, keeping at most `max_hands`.
    pub fn from_hands(mut hands: Vec<HandRecord>, max_hands: usize) -> Self {
        hands.truncate(max_hands);
        Self { hands }
    }

    pub fn empty() -> Self {
        Self { hands: Vec::new() }
    }

    pub fn hand_count(&self) -> usize {
        self.hands.len()
    }

    pub fn has_hands(&self) -> bool {
        !self.hands.is_empty()
    }

    pub fn hands(&self) -> &[HandRecord] {
        &self.hands
    }

    pub fn label(&self) -> PresenceLabel {
        PresenceLabel::from_hands(&self.hands)
    }
}

/// What the user is told about the current frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresenceLabel {
    NoHands,
    OneHand(Handedness),
    BothHands,
}

impl PresenceLabel {
    pub fn from_hands(hands: &[HandRecord]) -> Self {
        match hands {
            [] => PresenceLabel::NoHands,
            // Preview is mirrored, so the displayed side is flipped.
            [hand] => PresenceLabel::OneHand(hand.handedness.mirrored()),
            _ => PresenceLabel::BothHands,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PresenceLabel::NoHands => "No Hands Detected",
            PresenceLabel::OneHand(Handedness::Left) => "Left Hand Detected",
            PresenceLabel::OneHand(Handedness::Right) => "Right Hand Detected",
            PresenceLabel::BothHands => "Both Hands Detected",
        }
    }
}

impl std::fmt::Display for PresenceLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
