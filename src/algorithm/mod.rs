pub mod blink;
pub mod direction;
pub mod dwell;
pub mod gaze_engine;
pub mod gaze_smoothing;
pub mod intent;
pub mod ring_buffer;
pub mod sequence;
