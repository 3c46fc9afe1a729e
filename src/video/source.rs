use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use image::DynamicImage;

use crate::error::{LagError, Result};

const FRAME_EXTENSIONS: [&str; 4] = ["png", "jpg", "jpeg", "bmp"];

/// A decoded, constant-rate recording of the device screen.
///
/// `frame` is called from the blocking pool, once per index, possibly from
/// many threads at the same time.
pub trait VideoSource: Send + Sync {
    fn frame_count(&self) -> usize;
    fn recording_start_millis(&self) -> i64;
    fn fps(&self) -> u32;
    fn frame(&self, index: usize) -> Result<DynamicImage>;
}

/// Frames extracted to a directory as individual images, ordered by the frame
/// number in each file name (`frame9.png` before `frame10.png`).
///
/// Images are decoded on demand so a long capture never sits in memory as a
/// whole.
pub struct ImageSequenceSource {
    frames: Vec<PathBuf>,
    recording_start_millis: i64,
    fps: u32,
}

impl ImageSequenceSource {
    pub fn open(dir: &Path, recording_start_millis: i64, fps: u32) -> anyhow::Result<Self> {
        if fps == 0 {
            bail!("fps must be greater than zero");
        }

        let mut frames = Vec::new();
        for entry in std::fs::read_dir(dir)
            .with_context(|| format!("Failed to list frames in {}", dir.display()))?
        {
            let path = entry?.path();
            if is_frame_file(&path) {
                frames.push(path);
            }
        }
        frames.sort_by_cached_key(|path| frame_sort_key(path));

        log::info!("Found {} frames in {}", frames.len(), dir.display());

        Ok(Self {
            frames,
            recording_start_millis,
            fps,
        })
    }
}

/// Last run of digits in the file stem, then the full name as a tie-break.
fn frame_sort_key(path: &Path) -> (Option<u64>, PathBuf) {
    let number = path
        .file_stem()
        .and_then(|stem| stem.to_str())
        .and_then(|stem| {
            let end = stem.rfind(|c: char| c.is_ascii_digit())? + 1;
            let digits = stem[..end]
                .chars()
                .rev()
                .take_while(char::is_ascii_digit)
                .count();
            stem[end - digits..end].parse().ok()
        });
    (number, path.to_path_buf())
}

fn is_frame_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            FRAME_EXTENSIONS
                .iter()
                .any(|known| ext.eq_ignore_ascii_case(known))
        })
        .unwrap_or(false)
}

impl VideoSource for ImageSequenceSource {
    fn frame_count(&self) -> usize {
        self.frames.len()
    }

    fn recording_start_millis(&self) -> i64 {
        self.recording_start_millis
    }

    fn fps(&self) -> u32 {
        self.fps
    }

    fn frame(&self, index: usize) -> Result<DynamicImage> {
        let path = self
            .frames
            .get(index)
            .ok_or_else(|| LagError::Video(format!("frame {index} out of range")))?;
        image::open(path).map_err(|err| LagError::Video(format!("{}: {err}", path.display())))
    }
}

/// Frames already decoded in memory.
pub struct MemoryVideoSource {
    frames: Vec<DynamicImage>,
    recording_start_millis: i64,
    fps: u32,
}

impl MemoryVideoSource {
    pub fn new(frames: Vec<DynamicImage>, recording_start_millis: i64, fps: u32) -> Self {
        Self {
            frames,
            recording_start_millis,
            fps,
        }
    }
}

impl VideoSource for MemoryVideoSource {
    fn frame_count(&self) -> usize {
        self.frames.len()
    }

    fn recording_start_millis(&self) -> i64 {
        self.recording_start_millis
    }

    fn fps(&self) -> u32 {
        self.fps
    }

    fn frame(&self, index: usize) -> Result<DynamicImage> {
        self.frames
            .get(index)
            .cloned()
            .ok_or_else(|| LagError::Video(format!("frame {index} out of range")))
    }
}
