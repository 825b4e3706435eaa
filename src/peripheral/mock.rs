use crate::direction::{Direction, DirectionMap, LightColor};
use crate::emergency::TagId;
use crate::peripheral::{AudioSampler, LightBoard, TagReader};
use std::collections::VecDeque;

/// Tag reader handing out queued tags, one per poll.
#[derive(Debug, Default)]
pub struct MockTagReader {
    pending: VecDeque<TagId>,
    polls: usize,
}

impl MockTagReader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn present(&mut self, tag: TagId) {
        self.pending.push_back(tag);
    }

    pub fn polls(&self) -> usize {
        self.polls
    }
}

impl TagReader for MockTagReader {
    fn poll_tag(&mut self) -> Option<TagId> {
        self.polls += 1;
        self.pending.pop_front()
    }
}

/// Audio sampler cycling through a fixed set of scans.
#[derive(Debug, Clone)]
pub struct MockAudioSampler {
    scans: Vec<Vec<f32>>,
    taken: usize,
}

impl MockAudioSampler {
    pub fn new(scans: Vec<Vec<f32>>) -> Self {
        Self { scans, taken: 0 }
    }

    /// Flat silence of `sample_count` samples.
    pub fn quiet(sample_count: usize) -> Self {
        Self::new(vec![vec![0.0; sample_count]])
    }

    pub fn set_scans(&mut self, scans: Vec<Vec<f32>>) {
        self.scans = scans;
    }

    pub fn scans_taken(&self) -> usize {
        self.taken
    }
}

impl AudioSampler for MockAudioSampler {
    fn sample_scan(&mut self) -> Vec<f32> {
        let scan = if self.scans.is_empty() {
            Vec::new()
        } else {
            self.scans[self.taken % self.scans.len()].clone()
        };
        self.taken += 1;
        scan
    }
}

/// Light board remembering every command it was given.
#[derive(Debug, Clone)]
pub struct RecordingLightBoard {
    colors: DirectionMap<LightColor>,
    commands: Vec<(Direction, LightColor)>,
}

impl RecordingLightBoard {
    pub fn new() -> Self {
        Self {
            colors: DirectionMap::splat(LightColor::Red),
            commands: Vec::new(),
        }
    }

    pub fn color(&self, direction: Direction) -> LightColor {
        self.colors[direction]
    }

    pub fn colors(&self) -> DirectionMap<LightColor> {
        self.colors
    }

    pub fn commands(&self) -> &[(Direction, LightColor)] {
        &self.commands
    }

    pub fn clear_commands(&mut self) {
        self.commands.clear();
    }
}

impl Default for RecordingLightBoard {
    fn default() -> Self {
        Self::new()
    }
}

impl LightBoard for RecordingLightBoard {
    fn set_light(&mut self, direction: Direction, color: LightColor) {
        self.colors[direction] = color;
        self.commands.push((direction, color));
    }
}
