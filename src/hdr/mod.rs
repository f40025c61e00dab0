use tracing::debug;

use crate::probe::{translate, FrameDescriptor, SideDataRecord, StreamDescriptor};
use crate::utils::Result;

pub mod sidecar;

/// HDR side-channel data gathered from one probe result.
///
/// Mastering display and content light level carry their translated values;
/// Dolby Vision and HDR10+ are presence flags only, since the actual payload
/// lives in the elementary stream and is handled by the sidecar tools.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HdrMetadata {
    pub master_display: Option<String>,
    pub content_light: Option<ContentLightLevel>,
    pub dolby_vision: bool,
    pub hdr10plus: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContentLightLevel {
    pub max_cll: u32,
    pub max_fall: u32,
}

impl HdrMetadata {
    pub fn is_hdr10(&self) -> bool {
        self.master_display.is_some() || self.content_light.is_some()
    }
}

/// Scans the stream-level and first-frame side-data collections, in that
/// order, keeping the first occurrence of each metadata kind.
pub fn scan_side_data(
    stream: &StreamDescriptor,
    first_frame: Option<&FrameDescriptor>,
) -> Result<HdrMetadata> {
    let mut metadata = HdrMetadata::default();

    let frame_records = first_frame
        .map(|f| f.side_data_list.as_slice())
        .unwrap_or(&[]);

    for record in stream.side_data_list.iter().chain(frame_records) {
        apply_record(&mut metadata, record)?;
    }

    debug!(
        "HDR scan: master_display={} cll={} dolby_vision={} hdr10plus={}",
        metadata.master_display.is_some(),
        metadata.content_light.is_some(),
        metadata.dolby_vision,
        metadata.hdr10plus
    );

    Ok(metadata)
}

fn apply_record(metadata: &mut HdrMetadata, record: &SideDataRecord) -> Result<()> {
    let Some(kind) = record.side_data_type.as_deref() else {
        return Ok(());
    };

    if kind.contains("Mastering display") {
        if metadata.master_display.is_none() {
            metadata.master_display = Some(translate::master_display_string(record)?);
        }
    } else if kind.contains("Content light") {
        if metadata.content_light.is_none() {
            metadata.content_light = Some(ContentLightLevel {
                max_cll: record.max_content.unwrap_or(0),
                max_fall: record.max_average.unwrap_or(0),
            });
        }
    } else if kind.contains("DOVI configuration") {
        metadata.dolby_vision = true;
    } else if kind.contains("HDR10+") || kind.contains("SMPTE2094-40") {
        metadata.hdr10plus = true;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::Error;
    use pretty_assertions::assert_eq;

    fn mastering_record(max_luminance: &str) -> SideDataRecord {
        SideDataRecord {
            side_data_type: Some("Mastering display metadata".to_string()),
            red_x: Some("35400/50000".to_string()),
            red_y: Some("14600/50000".to_string()),
            green_x: Some("8500/50000".to_string()),
            green_y: Some("39850/50000".to_string()),
            blue_x: Some("6550/50000".to_string()),
            blue_y: Some("2300/50000".to_string()),
            white_point_x: Some("15635/50000".to_string()),
            white_point_y: Some("16450/50000".to_string()),
            max_luminance: Some(max_luminance.to_string()),
            min_luminance: Some("50/10000".to_string()),
            ..SideDataRecord::default()
        }
    }

    fn cll_record(max_content: u32) -> SideDataRecord {
        SideDataRecord {
            side_data_type: Some("Content light level metadata".to_string()),
            max_content: Some(max_content),
            max_average: Some(400),
            ..SideDataRecord::default()
        }
    }

    #[test]
    fn test_stream_level_record_wins_over_frame_level() {
        let stream = StreamDescriptor {
            side_data_list: vec![mastering_record("10000000/10000")],
            ..StreamDescriptor::default()
        };
        let frame = FrameDescriptor {
            side_data_list: vec![mastering_record("40000000/10000")],
        };

        let metadata = scan_side_data(&stream, Some(&frame)).unwrap();
        assert!(metadata
            .master_display
            .unwrap()
            .ends_with("L(10000000,50)"));
    }

    #[test]
    fn test_later_duplicates_of_same_kind_are_ignored() {
        let stream = StreamDescriptor {
            side_data_list: vec![cll_record(1000), cll_record(4000)],
            ..StreamDescriptor::default()
        };

        let metadata = scan_side_data(&stream, None).unwrap();
        assert_eq!(
            metadata.content_light,
            Some(ContentLightLevel {
                max_cll: 1000,
                max_fall: 400
            })
        );
    }

    #[test]
    fn test_presence_flags_from_frame_side_data() {
        let frame = FrameDescriptor {
            side_data_list: vec![
                SideDataRecord {
                    side_data_type: Some("DOVI configuration record".to_string()),
                    ..SideDataRecord::default()
                },
                SideDataRecord {
                    side_data_type: Some(
                        "HDR Dynamic Metadata SMPTE2094-40 (HDR10+)".to_string(),
                    ),
                    ..SideDataRecord::default()
                },
            ],
        };

        let metadata = scan_side_data(&StreamDescriptor::default(), Some(&frame)).unwrap();
        assert!(metadata.dolby_vision);
        assert!(metadata.hdr10plus);
        assert!(!metadata.is_hdr10());
    }

    #[test]
    fn test_malformed_mastering_record_fails_scan() {
        let mut record = mastering_record("10000000/10000");
        record.blue_y = None;
        let stream = StreamDescriptor {
            side_data_list: vec![record],
            ..StreamDescriptor::default()
        };

        assert!(matches!(
            scan_side_data(&stream, None),
            Err(Error::MasteringData { .. })
        ));
    }

    #[test]
    fn test_sdr_stream_yields_empty_metadata() {
        let metadata = scan_side_data(&StreamDescriptor::default(), None).unwrap();
        assert_eq!(metadata, HdrMetadata::default());
    }
}
