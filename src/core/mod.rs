/// Core functionality modules
///
/// The store the UI persists through, the microphone capture session that
/// produces sounds, and the playable references both of them hand out.

pub mod capture;
pub mod object_url;
pub mod playback;
pub mod store;

pub use capture::{
    AccessError, CaptureEvent, CaptureSession, CaptureState, CaptureSummary, InputStream,
    Microphone, Track,
};
pub use object_url::{ObjectUrl, ObjectUrlTable};
pub use playback::{AudioSink, Player};
pub use store::Store;
