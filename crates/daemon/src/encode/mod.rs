//! Encoding modules for the chunkstream daemon

pub mod ffmpeg;

pub use ffmpeg::{build_ffmpeg_command, run_ffmpeg, EncodeError, TranscodeParams};

/// One target resolution: a label used to prefix output filenames and the
/// ffmpeg scale argument in `W:H` form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    pub label: &'static str,
    pub scale: &'static str,
}

/// The full resolution table the encoder can be asked to produce.
///
/// Deployments enable a subset via configuration; the default enables
/// only 144p.
pub const RESOLUTION_TABLE: &[Resolution] = &[
    Resolution { label: "144p", scale: "256:144" },
    Resolution { label: "240p", scale: "426:240" },
    Resolution { label: "360p", scale: "640:360" },
    Resolution { label: "480p", scale: "854:480" },
    Resolution { label: "720p", scale: "1280:720" },
    Resolution { label: "1080p", scale: "1920:1080" },
    Resolution { label: "2k", scale: "2560:1440" },
    Resolution { label: "4k", scale: "3840:2160" },
];

/// Look up a resolution by its label
pub fn resolution_for_label(label: &str) -> Option<Resolution> {
    RESOLUTION_TABLE.iter().copied().find(|r| r.label == label)
}

/// Resolve a list of configured labels against the resolution table.
///
/// Returns the unrecognized label on failure so startup can report it.
pub fn resolve_resolutions(labels: &[String]) -> Result<Vec<Resolution>, String> {
    labels
        .iter()
        .map(|label| resolution_for_label(label).ok_or_else(|| label.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolution_table_entries() {
        assert_eq!(RESOLUTION_TABLE.len(), 8);
        assert_eq!(resolution_for_label("144p").unwrap().scale, "256:144");
        assert_eq!(resolution_for_label("480p").unwrap().scale, "854:480");
        assert_eq!(resolution_for_label("1080p").unwrap().scale, "1920:1080");
        assert_eq!(resolution_for_label("4k").unwrap().scale, "3840:2160");
    }

    #[test]
    fn test_resolution_lookup_unknown_label() {
        assert!(resolution_for_label("8k").is_none());
        assert!(resolution_for_label("").is_none());
    }

    #[test]
    fn test_resolve_resolutions_accepts_known_labels() {
        let labels = vec!["144p".to_string(), "720p".to_string()];
        let resolved = resolve_resolutions(&labels).unwrap();
        assert_eq!(resolved.len(), 2);
        assert_eq!(resolved[0].label, "144p");
        assert_eq!(resolved[1].scale, "1280:720");
    }

    #[test]
    fn test_resolve_resolutions_reports_unknown_label() {
        let labels = vec!["144p".to_string(), "900p".to_string()];
        assert_eq!(resolve_resolutions(&labels), Err("900p".to_string()));
    }
}
