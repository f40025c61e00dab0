use std::env;

/// Executable locations for every external tool the pipeline drives.
///
/// Each path is overridable through an environment variable and falls back
/// to the bare tool name resolved via the OS search path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolPaths {
    pub ffmpeg: String,
    pub ffprobe: String,
    pub x265: String,
    pub dovi_tool: String,
    pub hdr10plus_tool: String,
    pub mkvmerge: String,
    pub opusenc: String,
}

impl ToolPaths {
    pub fn from_env() -> Self {
        Self {
            ffmpeg: tool_path("FFMPEG_PATH", "ffmpeg"),
            ffprobe: tool_path("FFPROBE_PATH", "ffprobe"),
            x265: tool_path("X265_PATH", "x265"),
            dovi_tool: tool_path("DOVI_TOOL_PATH", "dovi_tool"),
            hdr10plus_tool: tool_path("HDR10PLUS_TOOL_PATH", "hdr10plus_tool"),
            mkvmerge: tool_path("MKVMERGE_PATH", "mkvmerge"),
            opusenc: tool_path("OPUSENC_PATH", "opusenc"),
        }
    }
}

impl Default for ToolPaths {
    fn default() -> Self {
        Self {
            ffmpeg: "ffmpeg".to_string(),
            ffprobe: "ffprobe".to_string(),
            x265: "x265".to_string(),
            dovi_tool: "dovi_tool".to_string(),
            hdr10plus_tool: "hdr10plus_tool".to_string(),
            mkvmerge: "mkvmerge".to_string(),
            opusenc: "opusenc".to_string(),
        }
    }
}

fn tool_path(var: &str, default: &str) -> String {
    env::var(var)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| default.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_default_tool_names() {
        let tools = ToolPaths::default();
        assert_eq!(tools.ffprobe, "ffprobe");
        assert_eq!(tools.dovi_tool, "dovi_tool");
        assert_eq!(tools.hdr10plus_tool, "hdr10plus_tool");
        assert_eq!(tools.mkvmerge, "mkvmerge");
    }
}
