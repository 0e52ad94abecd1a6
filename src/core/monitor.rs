// src/core/monitor.rs

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::{debug, info};

use crate::core::detector::{FrameResult, MarkerDetector};
use crate::cv::ComputerVision;
use crate::{Frame, PixelFormat, Result};

/// A frame whose pixels the caller owns, as handed out by a capture backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnedFrame {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
}

impl OwnedFrame {
    pub fn new(data: Vec<u8>, width: u32, height: u32, format: PixelFormat) -> Self {
        Self {
            data,
            width,
            height,
            format,
        }
    }

    /// Borrowed view, validated like any other frame.
    pub fn as_frame(&self) -> Result<Frame<'_>> {
        Frame::new(&self.data, self.width, self.height, self.format)
    }
}

/// Something that produces frames until it runs dry.
pub trait FrameSource {
    /// The next frame, or `None` once the source is exhausted.
    fn next_frame(&mut self) -> Result<Option<OwnedFrame>>;
}

impl<I> FrameSource for I
where
    I: Iterator<Item = OwnedFrame>,
{
    fn next_frame(&mut self) -> Result<Option<OwnedFrame>> {
        Ok(self.next())
    }
}

/// Cloneable stop switch for a running [`Monitor`].
#[derive(Debug, Clone)]
pub struct MonitorHandle {
    running: Arc<AtomicBool>,
}

impl MonitorHandle {
    /// Asks the loop to stop. The frame in flight is finished first.
    ///
    /// A stop issued before [`Monitor::run`] is kept: that run returns
    /// without pulling a frame. [`MonitorHandle::start`] re-arms the monitor.
    pub fn stop(&self) {
        self.running.store(false, Ordering::Release);
    }

    /// Re-arms the monitor after a stop or a finished run.
    pub fn start(&self) {
        self.running.store(true, Ordering::Release);
    }

    /// Whether the monitor is armed to process frames.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }
}

/// Drives a [`MarkerDetector`] over a [`FrameSource`].
///
/// Frames are processed strictly one after another. The stop flag is
/// checked between frames, never in the middle of one. A new monitor is
/// armed; a run disarms it when it ends.
pub struct Monitor<CV: ComputerVision> {
    detector: MarkerDetector<CV>,
    running: Arc<AtomicBool>,
}

impl<CV: ComputerVision> Monitor<CV> {
    pub fn new(detector: MarkerDetector<CV>) -> Self {
        Self {
            detector,
            running: Arc::new(AtomicBool::new(true)),
        }
    }

    pub fn handle(&self) -> MonitorHandle {
        MonitorHandle {
            running: Arc::clone(&self.running),
        }
    }

    pub fn detector(&self) -> &MarkerDetector<CV> {
        &self.detector
    }

    pub fn into_detector(self) -> MarkerDetector<CV> {
        self.detector
    }

    /// Processes frames from `source` until it is exhausted or a handle calls
    /// [`MonitorHandle::stop`]. Every result is passed to `sink`.
    ///
    /// Returns the number of frames processed. Source and frame errors end
    /// the loop and are returned as is. The monitor is disarmed afterwards.
    pub fn run<S, F>(&mut self, source: &mut S, mut sink: F) -> Result<usize>
    where
        S: FrameSource + ?Sized,
        F: FnMut(&FrameResult),
    {
        info!("monitor started");

        let outcome = self.pump(source, &mut sink);

        self.running.store(false, Ordering::Release);
        match &outcome {
            Ok(frames) => info!("monitor stopped after {frames} frames"),
            Err(e) => info!("monitor stopped on error: {e}"),
        }
        outcome
    }

    fn pump<S, F>(&mut self, source: &mut S, sink: &mut F) -> Result<usize>
    where
        S: FrameSource + ?Sized,
        F: FnMut(&FrameResult),
    {
        let mut frames = 0;
        while self.running.load(Ordering::Acquire) {
            let Some(owned) = source.next_frame()? else {
                debug!("frame source exhausted");
                break;
            };
            let result = self.detector.process_frame(&owned.as_frame()?)?;
            sink(&result);
            frames += 1;
        }
        Ok(frames)
    }
}
