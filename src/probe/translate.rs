use chrono::{NaiveTime, Timelike};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::probe::{FormatMetadata, SideDataRecord, StreamDescriptor};
use crate::utils::{Error, Result};

static PIXEL_FORMAT_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"yuv[aj]*(\d{3})p(\d{1,2})?").unwrap());

/// Chromaticity coordinates scale to integer units of 0.00002 for x265.
const CHROMA_SCALE: f64 = 50_000.0;
/// Luminance scales to integer units of 0.0001 nits.
const LUMINANCE_SCALE: f64 = 10_000.0;

/// Parses ffprobe rational strings.
///
/// "N/D" yields N÷D, a bare numeric string yields its value, and any other
/// shape yields NaN. Callers must check `is_nan` before using the result.
pub fn parse_rational(value: &str) -> f64 {
    let parts: Vec<&str> = value.split('/').collect();
    match parts.as_slice() {
        [whole] => whole.trim().parse().unwrap_or(f64::NAN),
        [numerator, denominator] => {
            let n: f64 = numerator.trim().parse().unwrap_or(f64::NAN);
            let d: f64 = denominator.trim().parse().unwrap_or(f64::NAN);
            n / d
        }
        _ => f64::NAN,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelFormat {
    /// Chroma subsampling in x265 syntax, e.g. "i420".
    pub csp: String,
    /// Bit depth digits, "8" when the format string carries none.
    pub depth: String,
}

/// Translates an ffprobe pixel format string into x265 terms.
pub fn parse_pixel_format(pix_fmt: &str) -> Result<PixelFormat> {
    let captures = PIXEL_FORMAT_REGEX
        .captures(pix_fmt)
        .ok_or_else(|| Error::format(format!("unsupported pixel format: {}", pix_fmt)))?;

    Ok(PixelFormat {
        csp: format!("i{}", &captures[1]),
        depth: captures
            .get(2)
            .map(|m| m.as_str().to_string())
            .unwrap_or_else(|| "8".to_string()),
    })
}

/// Formats mastering display side data as the x265 `--master-display` value:
/// `G(gx,gy)B(bx,by)R(rx,ry)WP(wx,wy)L(max,min)`.
pub fn master_display_string(record: &SideDataRecord) -> Result<String> {
    let gx = scaled_component(record.green_x.as_deref(), CHROMA_SCALE)?;
    let gy = scaled_component(record.green_y.as_deref(), CHROMA_SCALE)?;
    let bx = scaled_component(record.blue_x.as_deref(), CHROMA_SCALE)?;
    let by = scaled_component(record.blue_y.as_deref(), CHROMA_SCALE)?;
    let rx = scaled_component(record.red_x.as_deref(), CHROMA_SCALE)?;
    let ry = scaled_component(record.red_y.as_deref(), CHROMA_SCALE)?;
    let wx = scaled_component(record.white_point_x.as_deref(), CHROMA_SCALE)?;
    let wy = scaled_component(record.white_point_y.as_deref(), CHROMA_SCALE)?;
    let max_lum = scaled_component(record.max_luminance.as_deref(), LUMINANCE_SCALE)?;
    let min_lum = scaled_component(record.min_luminance.as_deref(), LUMINANCE_SCALE)?;

    Ok(format!(
        "G({},{})B({},{})R({},{})WP({},{})L({},{})",
        gx, gy, bx, by, rx, ry, wx, wy, max_lum, min_lum
    ))
}

fn scaled_component(value: Option<&str>, scale: f64) -> Result<i64> {
    let raw = value.ok_or_else(|| Error::mastering_data("missing mastering display field"))?;
    let parsed = parse_rational(raw);
    if parsed.is_nan() {
        return Err(Error::mastering_data(format!(
            "non-numeric mastering display field: {}",
            raw
        )));
    }
    Ok((parsed * scale).round() as i64)
}

/// Resolves a stream's duration in seconds.
///
/// Preference order: the stream's own duration field, a tag whose key starts
/// with "duration" (Matroska stores per-track `DURATION` tags as timestamps),
/// the container duration. NaN when none apply.
pub fn resolve_duration(stream: &StreamDescriptor, format: &FormatMetadata) -> f64 {
    if let Some(raw) = &stream.duration {
        let seconds = parse_rational(raw);
        if !seconds.is_nan() {
            return seconds;
        }
    }

    // Tag maps are unordered; pick the lexicographically first matching key
    // so repeated probes of the same file resolve the same tag.
    let duration_tag = stream
        .tags
        .iter()
        .filter(|(key, _)| key.to_lowercase().starts_with("duration"))
        .min_by(|a, b| a.0.cmp(b.0))
        .map(|(_, value)| value);
    if let Some(value) = duration_tag {
        if let Some(seconds) = parse_timestamp(value) {
            return seconds;
        }
    }

    if let Some(raw) = &format.duration {
        let seconds = parse_rational(raw);
        if !seconds.is_nan() {
            return seconds;
        }
    }

    f64::NAN
}

fn parse_timestamp(value: &str) -> Option<f64> {
    let time = NaiveTime::parse_from_str(value.trim(), "%H:%M:%S%.f").ok()?;
    Some(f64::from(time.num_seconds_from_midnight()) + f64::from(time.nanosecond()) / 1e9)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn mastering_record() -> SideDataRecord {
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
            max_luminance: Some("10000000/10000".to_string()),
            min_luminance: Some("50/10000".to_string()),
            ..SideDataRecord::default()
        }
    }

    #[test]
    fn test_parse_rational_fractions() {
        assert_eq!(parse_rational("30/1"), 30.0);
        assert_eq!(parse_rational("24000/1001"), 24000.0 / 1001.0);
        assert_eq!(parse_rational("35400/50000"), 0.708);
    }

    #[test]
    fn test_parse_rational_bare_numbers() {
        assert_eq!(parse_rational("29.97"), 29.97);
        assert_eq!(parse_rational("3600"), 3600.0);
    }

    #[test]
    fn test_parse_rational_rejects_malformed_input() {
        assert!(parse_rational("1/2/3").is_nan());
        assert!(parse_rational("abc").is_nan());
        assert!(parse_rational("a/b").is_nan());
        assert!(parse_rational("12/x").is_nan());
        assert!(parse_rational("").is_nan());
    }

    #[test]
    fn test_parse_pixel_format() {
        assert_eq!(
            parse_pixel_format("yuv420p10le").unwrap(),
            PixelFormat {
                csp: "i420".to_string(),
                depth: "10".to_string()
            }
        );
        assert_eq!(
            parse_pixel_format("yuv444p").unwrap(),
            PixelFormat {
                csp: "i444".to_string(),
                depth: "8".to_string()
            }
        );
        assert_eq!(
            parse_pixel_format("yuv422p12le").unwrap(),
            PixelFormat {
                csp: "i422".to_string(),
                depth: "12".to_string()
            }
        );
    }

    #[test]
    fn test_parse_pixel_format_rejects_non_yuv() {
        assert!(matches!(
            parse_pixel_format("rgb24"),
            Err(Error::Format { .. })
        ));
        assert!(matches!(
            parse_pixel_format("gray16le"),
            Err(Error::Format { .. })
        ));
    }

    #[test]
    fn test_master_display_string() {
        let formatted = master_display_string(&mastering_record()).unwrap();
        assert_eq!(
            formatted,
            "G(8500,39850)B(6550,2300)R(35400,14600)WP(15635,16450)L(10000000,50)"
        );
    }

    #[test]
    fn test_master_display_string_is_deterministic() {
        let record = mastering_record();
        assert_eq!(
            master_display_string(&record).unwrap(),
            master_display_string(&record).unwrap()
        );
    }

    #[test]
    fn test_master_display_missing_field_fails() {
        let mut record = mastering_record();
        record.white_point_y = None;
        assert!(matches!(
            master_display_string(&record),
            Err(Error::MasteringData { .. })
        ));
    }

    #[test]
    fn test_master_display_non_numeric_field_fails() {
        let mut record = mastering_record();
        record.min_luminance = Some("fifty".to_string());
        assert!(matches!(
            master_display_string(&record),
            Err(Error::MasteringData { .. })
        ));
    }

    #[test]
    fn test_resolve_duration_prefers_stream_field() {
        let stream = StreamDescriptor {
            duration: Some("123.5".to_string()),
            ..StreamDescriptor::default()
        };
        assert_eq!(
            resolve_duration(&stream, &FormatMetadata::default()),
            123.5
        );
    }

    #[test]
    fn test_resolve_duration_from_tag() {
        let mut stream = StreamDescriptor::default();
        stream.tags.insert(
            "DURATION-eng".to_string(),
            "01:02:03.500000000".to_string(),
        );
        assert_eq!(
            resolve_duration(&stream, &FormatMetadata::default()),
            3723.5
        );
    }

    #[test]
    fn test_resolve_duration_picks_first_tag_key_in_order() {
        // Several duration-ish tags may coexist; the smallest key wins so
        // the choice does not depend on map iteration order.
        let mut stream = StreamDescriptor::default();
        stream
            .tags
            .insert("DURATION".to_string(), "00:00:10.000000000".to_string());
        stream.tags.insert(
            "DURATION-eng".to_string(),
            "01:00:00.000000000".to_string(),
        );
        assert_eq!(
            resolve_duration(&stream, &FormatMetadata::default()),
            10.0
        );
    }

    #[test]
    fn test_resolve_duration_falls_back_to_container() {
        let format = FormatMetadata {
            duration: Some("7200.25".to_string()),
            ..FormatMetadata::default()
        };
        assert_eq!(
            resolve_duration(&StreamDescriptor::default(), &format),
            7200.25
        );
    }

    #[test]
    fn test_resolve_duration_without_any_source_is_nan() {
        assert!(resolve_duration(&StreamDescriptor::default(), &FormatMetadata::default()).is_nan());
    }
}
