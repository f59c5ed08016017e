// carta-proto/src/events.rs
// Event type opcodes carried in the first two bytes of every frame.

/// Message kind identifier. The numbering is part of the ICD and must match
/// the frontend and worker builds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum EventType {
    EmptyEvent = 0,
    RegisterViewer = 1,
    FileListRequest = 2,
    FileInfoRequest = 3,
    OpenFile = 4,
    SetImageChannels = 5,
    SetCursor = 6,
    SetSpatialRequirements = 7,
    SetHistogramRequirements = 8,
    SetStatsRequirements = 9,
    SetRegion = 10,
    RemoveRegion = 11,
    CloseFile = 12,
    SetSpectralRequirements = 13,
    StartAnimation = 14,
    StartAnimationAck = 15,
    StopAnimation = 16,
    RegisterViewerAck = 17,
    FileListResponse = 18,
    FileInfoResponse = 19,
    OpenFileAck = 20,
    SetRegionAck = 21,
    HistogramData = 22,
    SpatialProfileData = 23,
    SpectralProfileData = 24,
    RegionStatsData = 25,
    ErrorData = 26,
    AnimationFlowControl = 27,
    AddRequiredTiles = 28,
    RemoveRequiredTiles = 29,
    RasterTileData = 30,
    RegionListRequest = 31,
    RegionListResponse = 32,
    RegionFileInfoRequest = 33,
    RegionFileInfoResponse = 34,
    ImportRegion = 35,
    ImportRegionAck = 36,
    ExportRegion = 37,
    ExportRegionAck = 38,
    SetContourParameters = 45,
    ContourImageData = 46,
    ResumeSession = 47,
    ResumeSessionAck = 48,
    RasterTileSync = 49,
    CatalogListRequest = 50,
    CatalogListResponse = 51,
    CatalogFileInfoRequest = 52,
    CatalogFileInfoResponse = 53,
    OpenCatalogFile = 54,
    OpenCatalogFileAck = 55,
    CloseCatalogFile = 56,
    CatalogFilterRequest = 57,
    CatalogFilterResponse = 58,
    MomentRequest = 61,
    MomentResponse = 62,
    MomentProgress = 63,
    StopMomentCalc = 64,
    SaveFile = 65,
    SaveFileAck = 66,
    PvRequest = 71,
    PvResponse = 72,
    PvProgress = 73,
    StopPvCalc = 74,
    FittingRequest = 75,
    FittingResponse = 76,
    SetVectorOverlayParameters = 77,
    VectorOverlayTileData = 78,
    FittingProgress = 79,
    StopFitting = 80,
}

impl EventType {
    /// Maps a raw opcode back to a known event type. Unknown opcodes are
    /// still routable (they proxy to the shared worker) and yield `None`.
    pub fn from_u16(raw: u16) -> Option<EventType> {
        use EventType::*;
        let t = match raw {
            0 => EmptyEvent,
            1 => RegisterViewer,
            2 => FileListRequest,
            3 => FileInfoRequest,
            4 => OpenFile,
            5 => SetImageChannels,
            6 => SetCursor,
            7 => SetSpatialRequirements,
            8 => SetHistogramRequirements,
            9 => SetStatsRequirements,
            10 => SetRegion,
            11 => RemoveRegion,
            12 => CloseFile,
            13 => SetSpectralRequirements,
            14 => StartAnimation,
            15 => StartAnimationAck,
            16 => StopAnimation,
            17 => RegisterViewerAck,
            18 => FileListResponse,
            19 => FileInfoResponse,
            20 => OpenFileAck,
            21 => SetRegionAck,
            22 => HistogramData,
            23 => SpatialProfileData,
            24 => SpectralProfileData,
            25 => RegionStatsData,
            26 => ErrorData,
            27 => AnimationFlowControl,
            28 => AddRequiredTiles,
            29 => RemoveRequiredTiles,
            30 => RasterTileData,
            31 => RegionListRequest,
            32 => RegionListResponse,
            33 => RegionFileInfoRequest,
            34 => RegionFileInfoResponse,
            35 => ImportRegion,
            36 => ImportRegionAck,
            37 => ExportRegion,
            38 => ExportRegionAck,
            45 => SetContourParameters,
            46 => ContourImageData,
            47 => ResumeSession,
            48 => ResumeSessionAck,
            49 => RasterTileSync,
            50 => CatalogListRequest,
            51 => CatalogListResponse,
            52 => CatalogFileInfoRequest,
            53 => CatalogFileInfoResponse,
            54 => OpenCatalogFile,
            55 => OpenCatalogFileAck,
            56 => CloseCatalogFile,
            57 => CatalogFilterRequest,
            58 => CatalogFilterResponse,
            61 => MomentRequest,
            62 => MomentResponse,
            63 => MomentProgress,
            64 => StopMomentCalc,
            65 => SaveFile,
            66 => SaveFileAck,
            71 => PvRequest,
            72 => PvResponse,
            73 => PvProgress,
            74 => StopPvCalc,
            75 => FittingRequest,
            76 => FittingResponse,
            77 => SetVectorOverlayParameters,
            78 => VectorOverlayTileData,
            79 => FittingProgress,
            80 => StopFitting,
            _ => return None,
        };
        Some(t)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trips_through_u16() {
        for raw in 0u16..=100 {
            if let Some(t) = EventType::from_u16(raw) {
                assert_eq!(t as u16, raw);
            }
        }
    }

    #[test]
    fn test_unknown_opcode_is_none() {
        assert_eq!(EventType::from_u16(999), None);
        assert_eq!(EventType::from_u16(44), None);
    }
}
