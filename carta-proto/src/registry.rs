// carta-proto/src/registry.rs
// Static opcode registry. Each entry names the message and, where the
// payload carries one, exposes a file-id accessor used for routing client
// frames to per-file workers. Opcodes outside the registry still proxy to
// the shared worker; they simply have no file id.

use std::collections::HashMap;

use lazy_static::lazy_static;
use prost::Message;

use crate::events::EventType;
use crate::messages;

/// Per-opcode metadata, read-only after initialization.
pub struct MessageDescriptor {
    pub name: &'static str,
    pub extract_file_id: Option<fn(&[u8]) -> Option<i32>>,
}

// A payload that fails to decode yields no file id; the frame then falls
// back to the shared worker.
macro_rules! with_file_id {
    ($name:expr, $ty:ty) => {
        MessageDescriptor {
            name: $name,
            extract_file_id: Some(|payload| {
                <$ty>::decode(payload).ok().map(|m| m.file_id)
            }),
        }
    };
}

macro_rules! opaque {
    ($name:expr) => {
        MessageDescriptor {
            name: $name,
            extract_file_id: None,
        }
    };
}

lazy_static! {
    static ref REGISTRY: HashMap<u16, MessageDescriptor> = {
        use EventType::*;
        let mut m = HashMap::new();

        m.insert(EmptyEvent as u16, opaque!("EMPTY_EVENT"));
        m.insert(RegisterViewer as u16, opaque!("REGISTER_VIEWER"));
        m.insert(RegisterViewerAck as u16, opaque!("REGISTER_VIEWER_ACK"));
        m.insert(FileListRequest as u16, opaque!("FILE_LIST_REQUEST"));
        m.insert(FileInfoRequest as u16, opaque!("FILE_INFO_REQUEST"));
        m.insert(ResumeSession as u16, opaque!("RESUME_SESSION"));
        m.insert(RemoveRegion as u16, opaque!("REMOVE_REGION"));
        m.insert(
            CatalogFileInfoRequest as u16,
            opaque!("CATALOG_FILE_INFO_REQUEST"),
        );
        m.insert(ErrorData as u16, opaque!("ERROR_DATA"));

        m.insert(
            OpenFile as u16,
            with_file_id!("OPEN_FILE", messages::OpenFile),
        );
        m.insert(
            CloseFile as u16,
            with_file_id!("CLOSE_FILE", messages::CloseFile),
        );
        m.insert(
            SetImageChannels as u16,
            with_file_id!("SET_IMAGE_CHANNELS", messages::SetImageChannels),
        );
        m.insert(
            SetCursor as u16,
            with_file_id!("SET_CURSOR", messages::SetCursor),
        );
        m.insert(
            SetRegion as u16,
            with_file_id!("SET_REGION", messages::SetRegion),
        );
        m.insert(
            SetSpatialRequirements as u16,
            with_file_id!("SET_SPATIAL_REQUIREMENTS", messages::SetSpatialRequirements),
        );
        m.insert(
            SetHistogramRequirements as u16,
            with_file_id!(
                "SET_HISTOGRAM_REQUIREMENTS",
                messages::SetHistogramRequirements
            ),
        );
        m.insert(
            SetStatsRequirements as u16,
            with_file_id!("SET_STATS_REQUIREMENTS", messages::SetStatsRequirements),
        );
        m.insert(
            SetSpectralRequirements as u16,
            with_file_id!(
                "SET_SPECTRAL_REQUIREMENTS",
                messages::SetSpectralRequirements
            ),
        );
        m.insert(
            StartAnimation as u16,
            with_file_id!("START_ANIMATION", messages::StartAnimation),
        );
        m.insert(
            StopAnimation as u16,
            with_file_id!("STOP_ANIMATION", messages::StopAnimation),
        );
        m.insert(
            AnimationFlowControl as u16,
            with_file_id!("ANIMATION_FLOW_CONTROL", messages::AnimationFlowControl),
        );
        m.insert(
            AddRequiredTiles as u16,
            with_file_id!("ADD_REQUIRED_TILES", messages::AddRequiredTiles),
        );
        m.insert(
            RemoveRequiredTiles as u16,
            with_file_id!("REMOVE_REQUIRED_TILES", messages::RemoveRequiredTiles),
        );
        m.insert(
            SetContourParameters as u16,
            with_file_id!("SET_CONTOUR_PARAMETERS", messages::SetContourParameters),
        );
        m.insert(
            OpenCatalogFile as u16,
            with_file_id!("OPEN_CATALOG_FILE", messages::OpenCatalogFile),
        );
        m.insert(
            CloseCatalogFile as u16,
            with_file_id!("CLOSE_CATALOG_FILE", messages::CloseCatalogFile),
        );
        m.insert(
            CatalogFilterRequest as u16,
            MessageDescriptor {
                name: "CATALOG_FILTER_REQUEST",
                // Unsigned on the wire; the routing table is signed.
                extract_file_id: Some(|payload| {
                    messages::CatalogFilterRequest::decode(payload)
                        .ok()
                        .map(|m| m.file_id as i32)
                }),
            },
        );
        m.insert(
            MomentRequest as u16,
            with_file_id!("MOMENT_REQUEST", messages::MomentRequest),
        );
        m.insert(
            StopMomentCalc as u16,
            with_file_id!("STOP_MOMENT_CALC", messages::StopMomentCalc),
        );
        m.insert(
            SaveFile as u16,
            with_file_id!("SAVE_FILE", messages::SaveFile),
        );
        m.insert(
            PvRequest as u16,
            with_file_id!("PV_REQUEST", messages::PvRequest),
        );
        m.insert(
            StopPvCalc as u16,
            with_file_id!("STOP_PV_CALC", messages::StopPvCalc),
        );
        m.insert(
            FittingRequest as u16,
            with_file_id!("FITTING_REQUEST", messages::FittingRequest),
        );
        m.insert(
            StopFitting as u16,
            with_file_id!("STOP_FITTING", messages::StopFitting),
        );
        m.insert(
            SetVectorOverlayParameters as u16,
            with_file_id!(
                "SET_VECTOR_OVERLAY_PARAMETERS",
                messages::SetVectorOverlayParameters
            ),
        );

        m
    };
}

/// Looks up the descriptor for a raw opcode.
pub fn descriptor(event_type: u16) -> Option<&'static MessageDescriptor> {
    REGISTRY.get(&event_type)
}

/// Extracts the routing file id from a payload, if the opcode carries one.
/// Deterministic on the payload bytes; any parse failure yields `None`.
pub fn extract_file_id(event_type: u16, payload: &[u8]) -> Option<i32> {
    descriptor(event_type)
        .and_then(|d| d.extract_file_id)
        .and_then(|f| f(payload))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::{CatalogFilterRequest, RemoveRegion, SetCursor};

    #[test]
    fn test_extracts_file_id_from_set_cursor() {
        let msg = SetCursor {
            file_id: 7,
            x: 1.0,
            y: 2.0,
        };
        let payload = msg.encode_to_vec();
        assert_eq!(
            extract_file_id(EventType::SetCursor as u16, &payload),
            Some(7)
        );
    }

    #[test]
    fn test_negative_file_id_is_preserved() {
        let msg = SetCursor {
            file_id: -2,
            x: 0.0,
            y: 0.0,
        };
        let payload = msg.encode_to_vec();
        assert_eq!(
            extract_file_id(EventType::SetCursor as u16, &payload),
            Some(-2)
        );
    }

    #[test]
    fn test_unsigned_id_casts_with_identity_bits() {
        let msg = CatalogFilterRequest {
            file_id: u32::MAX,
            column_names: vec![],
            subset_data_size: 0,
        };
        let payload = msg.encode_to_vec();
        assert_eq!(
            extract_file_id(EventType::CatalogFilterRequest as u16, &payload),
            Some(-1)
        );
    }

    #[test]
    fn test_opcode_without_file_id_yields_none() {
        let msg = RemoveRegion { region_id: 5 };
        let payload = msg.encode_to_vec();
        assert_eq!(
            extract_file_id(EventType::RemoveRegion as u16, &payload),
            None
        );
    }

    #[test]
    fn test_unknown_opcode_yields_none() {
        assert!(descriptor(999).is_none());
        assert_eq!(extract_file_id(999, &[1, 2, 3]), None);
    }

    #[test]
    fn test_garbage_payload_yields_none() {
        // 0xff is a truncated varint key, so the decode fails cleanly.
        assert_eq!(
            extract_file_id(EventType::SetCursor as u16, &[0xff, 0xff]),
            None
        );
    }

    #[test]
    fn test_extraction_is_deterministic() {
        let msg = SetCursor {
            file_id: 42,
            x: 3.5,
            y: -1.5,
        };
        let payload = msg.encode_to_vec();
        let a = extract_file_id(EventType::SetCursor as u16, &payload);
        let b = extract_file_id(EventType::SetCursor as u16, &payload);
        assert_eq!(a, Some(42));
        assert_eq!(a, b);
    }
}
