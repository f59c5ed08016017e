// carta-proto/src/messages.rs
// ICD message bodies, hand-written against the protobuf wire format. Only
// the messages the controller parses, synthesizes, or extracts a routing
// file id from are defined here; everything else proxies as opaque bytes.

use prost::Message;

/// Session establishment result carried in REGISTER_VIEWER_ACK.
#[derive(Clone, Copy, Debug, PartialEq, Eq, prost::Enumeration)]
#[repr(i32)]
pub enum SessionType {
    New = 0,
    Resumed = 1,
}

#[derive(Clone, PartialEq, Message)]
pub struct RegisterViewer {
    #[prost(uint32, tag = "1")]
    pub session_id: u32,
    #[prost(string, tag = "2")]
    pub api_key: String,
    #[prost(uint32, tag = "3")]
    pub client_feature_flags: u32,
}

#[derive(Clone, PartialEq, Message)]
pub struct RegisterViewerAck {
    #[prost(uint32, tag = "1")]
    pub session_id: u32,
    #[prost(bool, tag = "2")]
    pub success: bool,
    #[prost(string, tag = "3")]
    pub message: String,
    #[prost(enumeration = "SessionType", tag = "4")]
    pub session_type: i32,
    #[prost(uint32, tag = "5")]
    pub server_feature_flags: u32,
}

#[derive(Clone, PartialEq, Message)]
pub struct FileListRequest {
    #[prost(string, tag = "1")]
    pub directory: String,
    #[prost(int32, tag = "2")]
    pub filter_mode: i32,
}

#[derive(Clone, PartialEq, Message)]
pub struct FileInfoRequest {
    #[prost(string, tag = "1")]
    pub directory: String,
    #[prost(string, tag = "2")]
    pub file: String,
    #[prost(string, tag = "3")]
    pub hdu: String,
}

#[derive(Clone, PartialEq, Message)]
pub struct OpenFile {
    #[prost(string, tag = "1")]
    pub directory: String,
    #[prost(string, tag = "2")]
    pub file: String,
    #[prost(string, tag = "3")]
    pub hdu: String,
    #[prost(int32, tag = "4")]
    pub file_id: i32,
    #[prost(int32, tag = "5")]
    pub render_mode: i32,
}

#[derive(Clone, PartialEq, Message)]
pub struct OpenFileAck {
    #[prost(bool, tag = "1")]
    pub success: bool,
    #[prost(int32, tag = "2")]
    pub file_id: i32,
    #[prost(string, tag = "3")]
    pub message: String,
}

#[derive(Clone, PartialEq, Message)]
pub struct CloseFile {
    #[prost(int32, tag = "1")]
    pub file_id: i32,
}

#[derive(Clone, PartialEq, Message)]
pub struct SetImageChannels {
    #[prost(int32, tag = "1")]
    pub file_id: i32,
    #[prost(int32, tag = "2")]
    pub channel: i32,
    #[prost(int32, tag = "3")]
    pub stokes: i32,
}

#[derive(Clone, PartialEq, Message)]
pub struct SetCursor {
    #[prost(int32, tag = "1")]
    pub file_id: i32,
    #[prost(float, tag = "2")]
    pub x: f32,
    #[prost(float, tag = "3")]
    pub y: f32,
}

#[derive(Clone, PartialEq, Message)]
pub struct SetRegion {
    #[prost(int32, tag = "1")]
    pub file_id: i32,
    #[prost(int32, tag = "2")]
    pub region_id: i32,
}

#[derive(Clone, PartialEq, Message)]
pub struct RemoveRegion {
    #[prost(int32, tag = "1")]
    pub region_id: i32,
}

#[derive(Clone, PartialEq, Message)]
pub struct SetSpatialRequirements {
    #[prost(int32, tag = "1")]
    pub file_id: i32,
    #[prost(int32, tag = "2")]
    pub region_id: i32,
    #[prost(string, repeated, tag = "3")]
    pub spatial_profiles: Vec<String>,
}

#[derive(Clone, PartialEq, Message)]
pub struct SetHistogramRequirements {
    #[prost(int32, tag = "1")]
    pub file_id: i32,
    #[prost(int32, tag = "2")]
    pub region_id: i32,
}

#[derive(Clone, PartialEq, Message)]
pub struct SetStatsRequirements {
    #[prost(int32, tag = "1")]
    pub file_id: i32,
    #[prost(int32, tag = "2")]
    pub region_id: i32,
}

#[derive(Clone, PartialEq, Message)]
pub struct SetSpectralRequirements {
    #[prost(int32, tag = "1")]
    pub file_id: i32,
    #[prost(int32, tag = "2")]
    pub region_id: i32,
}

#[derive(Clone, PartialEq, Message)]
pub struct StartAnimation {
    #[prost(int32, tag = "1")]
    pub file_id: i32,
    #[prost(int32, tag = "2")]
    pub first_frame: i32,
    #[prost(int32, tag = "3")]
    pub last_frame: i32,
    #[prost(int32, tag = "4")]
    pub frame_rate: i32,
    #[prost(bool, tag = "5")]
    pub looping: bool,
}

#[derive(Clone, PartialEq, Message)]
pub struct StopAnimation {
    #[prost(int32, tag = "1")]
    pub file_id: i32,
    #[prost(int32, tag = "2")]
    pub end_frame: i32,
}

#[derive(Clone, PartialEq, Message)]
pub struct AnimationFlowControl {
    #[prost(int32, tag = "1")]
    pub file_id: i32,
    #[prost(int32, tag = "2")]
    pub received_frame: i32,
    #[prost(uint32, tag = "3")]
    pub animation_id: u32,
}

#[derive(Clone, PartialEq, Message)]
pub struct AddRequiredTiles {
    #[prost(int32, tag = "1")]
    pub file_id: i32,
    #[prost(int32, repeated, tag = "2")]
    pub tiles: Vec<i32>,
    #[prost(int32, tag = "3")]
    pub compression_type: i32,
    #[prost(float, tag = "4")]
    pub compression_quality: f32,
}

#[derive(Clone, PartialEq, Message)]
pub struct RemoveRequiredTiles {
    #[prost(int32, tag = "1")]
    pub file_id: i32,
    #[prost(int32, repeated, tag = "2")]
    pub tiles: Vec<i32>,
}

#[derive(Clone, PartialEq, Message)]
pub struct SetContourParameters {
    #[prost(int32, tag = "1")]
    pub file_id: i32,
    #[prost(double, repeated, tag = "2")]
    pub levels: Vec<f64>,
    #[prost(int32, tag = "3")]
    pub smoothing_mode: i32,
}

#[derive(Clone, PartialEq, Message)]
pub struct ResumeSession {
    #[prost(uint32, tag = "1")]
    pub session_id: u32,
}

#[derive(Clone, PartialEq, Message)]
pub struct OpenCatalogFile {
    #[prost(string, tag = "1")]
    pub directory: String,
    #[prost(string, tag = "2")]
    pub name: String,
    #[prost(int32, tag = "3")]
    pub file_id: i32,
    #[prost(int32, tag = "4")]
    pub preview_data_size: i32,
}

#[derive(Clone, PartialEq, Message)]
pub struct CloseCatalogFile {
    #[prost(int32, tag = "1")]
    pub file_id: i32,
}

/// Catalog filters address their file with an unsigned id on the wire; the
/// routing table unifies on signed 32-bit, so the accessor casts with
/// identity bits.
#[derive(Clone, PartialEq, Message)]
pub struct CatalogFilterRequest {
    #[prost(uint32, tag = "1")]
    pub file_id: u32,
    #[prost(string, repeated, tag = "2")]
    pub column_names: Vec<String>,
    #[prost(int32, tag = "3")]
    pub subset_data_size: i32,
}

#[derive(Clone, PartialEq, Message)]
pub struct CatalogFileInfoRequest {
    #[prost(string, tag = "1")]
    pub directory: String,
    #[prost(string, tag = "2")]
    pub name: String,
}

#[derive(Clone, PartialEq, Message)]
pub struct MomentRequest {
    #[prost(int32, tag = "1")]
    pub file_id: i32,
    #[prost(int32, tag = "2")]
    pub region_id: i32,
    #[prost(int32, repeated, tag = "3")]
    pub moments: Vec<i32>,
}

#[derive(Clone, PartialEq, Message)]
pub struct StopMomentCalc {
    #[prost(int32, tag = "1")]
    pub file_id: i32,
}

#[derive(Clone, PartialEq, Message)]
pub struct SaveFile {
    #[prost(int32, tag = "1")]
    pub file_id: i32,
    #[prost(string, tag = "2")]
    pub output_file_name: String,
    #[prost(string, tag = "3")]
    pub output_file_type: String,
}

#[derive(Clone, PartialEq, Message)]
pub struct PvRequest {
    #[prost(int32, tag = "1")]
    pub file_id: i32,
    #[prost(int32, tag = "2")]
    pub region_id: i32,
    #[prost(int32, tag = "3")]
    pub width: i32,
}

#[derive(Clone, PartialEq, Message)]
pub struct StopPvCalc {
    #[prost(int32, tag = "1")]
    pub file_id: i32,
}

#[derive(Clone, PartialEq, Message)]
pub struct FittingRequest {
    #[prost(int32, tag = "1")]
    pub file_id: i32,
    #[prost(int32, tag = "2")]
    pub region_id: i32,
}

#[derive(Clone, PartialEq, Message)]
pub struct StopFitting {
    #[prost(int32, tag = "1")]
    pub file_id: i32,
}

#[derive(Clone, PartialEq, Message)]
pub struct SetVectorOverlayParameters {
    #[prost(int32, tag = "1")]
    pub file_id: i32,
    #[prost(bool, tag = "2")]
    pub fractional: bool,
    #[prost(double, tag = "3")]
    pub threshold: f64,
}

#[derive(Clone, PartialEq, Message)]
pub struct EmptyEvent {}

#[derive(Clone, PartialEq, Message)]
pub struct ErrorData {
    #[prost(string, tag = "1")]
    pub message: String,
    #[prost(int32, tag = "2")]
    pub severity: i32,
    #[prost(string, repeated, tag = "3")]
    pub tags: Vec<String>,
}
