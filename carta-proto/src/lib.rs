// carta-proto/src/lib.rs
// Wire framing and ICD message definitions shared by the controller and
// the test tooling. The worker speaks the same framing on its end.

pub mod events;
pub mod frame;
pub mod messages;
pub mod registry;

pub use events::EventType;
pub use frame::{decode_header, encode_frame, encode_raw, FrameError, FrameHeader, ICD_VERSION};
pub use registry::{descriptor, extract_file_id, MessageDescriptor};
