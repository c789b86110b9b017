use std::time::Duration;

use serde::Serialize;

use crate::algorithm::ring_buffer::RingBuffer;

const FRAME_WINDOW: usize = 30;

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceStats {
    /// Over the last 30 sample timestamps.
    pub fps: f64,
    pub avg_processing_ms: f64,
    pub min_processing_ms: f64,
    pub max_processing_ms: f64,
    pub frames_processed: u64,
}

/// Rolling frame-rate and per-frame processing-time statistics.
#[derive(Debug, Clone)]
pub struct PerformanceMonitor {
    frame_times: RingBuffer<f64>,
    processing_ms: RingBuffer<f64>,
    frames_processed: u64,
}

impl Default for PerformanceMonitor {
    fn default() -> Self {
        Self::new()
    }
}

impl PerformanceMonitor {
    pub fn new() -> Self {
        Self {
            frame_times: RingBuffer::new(FRAME_WINDOW),
            processing_ms: RingBuffer::new(FRAME_WINDOW),
            frames_processed: 0,
        }
    }

    pub fn record(&mut self, t: f64, processing: Duration) {
        self.frame_times.push(t);
        self.processing_ms.push(processing.as_secs_f64() * 1000.0);
        self.frames_processed += 1;
    }

    pub fn fps(&self) -> f64 {
        let (Some(first), Some(last)) = (self.frame_times.get(0), self.frame_times.last()) else {
            return 0.0;
        };
        let span = last - first;
        if self.frame_times.len() < 2 || span <= 0.0 {
            return 0.0;
        }
        (self.frame_times.len() - 1) as f64 / span
    }

    pub fn stats(&self) -> PerformanceStats {
        if self.processing_ms.is_empty() {
            return PerformanceStats::default();
        }

        let count = self.processing_ms.len() as f64;
        let (sum, min, max) = self.processing_ms.iter().fold(
            (0.0, f64::INFINITY, f64::NEG_INFINITY),
            |(sum, min, max), value| (sum + value, min.min(*value), max.max(*value)),
        );

        PerformanceStats {
            fps: self.fps(),
            avg_processing_ms: sum / count,
            min_processing_ms: min,
            max_processing_ms: max,
            frames_processed: self.frames_processed,
        }
    }
}
