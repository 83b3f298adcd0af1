//! Camera frame conversion, throttled symbol decoding, and result stabilization.

#[cfg(feature = "camera")]
pub mod camera;
pub mod decode_pipeline;
pub mod decode_session;
pub mod error;
pub mod luminance;
#[cfg(feature = "rxing")]
pub mod rxing_decoder;
pub mod stabilizer;
#[cfg(any(test, feature = "test-util"))]
pub mod testing;
pub mod throttle;
pub mod video_types;
