use url::Url;

use super::manifest::{Manifest, Rendition};
use super::MediaKind;
use crate::DigestError;

/// The chosen rendition of one kind with its absolute base URL
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedRendition {
    pub kind: MediaKind,
    pub base_url: String,
    pub rendition: Rendition,
}

/// Best rendition per kind; either may be absent
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Selection {
    pub audio: Option<ResolvedRendition>,
    pub video: Option<ResolvedRendition>,
}

impl Selection {
    /// Audio is mandatory for every run
    pub fn require_audio(&self) -> Result<&ResolvedRendition, DigestError> {
        self.audio
            .as_ref()
            .ok_or(DigestError::MissingRendition(MediaKind::Audio))
    }
}

/// Highest `avg_bitrate` wins; on ties the later rendition wins.
pub fn pick_highest(renditions: &[Rendition]) -> Option<&Rendition> {
    let mut sorted: Vec<&Rendition> = renditions.iter().collect();
    sorted.sort_by(|a, b| a.avg_bitrate.total_cmp(&b.avg_bitrate));
    sorted.pop()
}

/// Resolve `rendition_base` against `manifest_base`, itself resolved against the manifest URL.
pub fn resolve_base_url(
    source_url: &Url,
    manifest_base: &str,
    rendition_base: &str,
) -> Result<Url, DigestError> {
    source_url
        .join(manifest_base)
        .and_then(|base| base.join(rendition_base))
        .map_err(|e| {
            DigestError::InvalidUrl(format!(
                "{} + {} + {}: {}",
                source_url, manifest_base, rendition_base, e
            ))
        })
}

pub fn select_renditions(manifest: &Manifest, source_url: &Url) -> Result<Selection, DigestError> {
    let resolve = |kind: MediaKind, renditions: &[Rendition]| {
        pick_highest(renditions)
            .map(|rendition| {
                let base_url = resolve_base_url(source_url, &manifest.base_url, &rendition.base_url)?;
                tracing::debug!(
                    %kind,
                    id = %rendition.id,
                    avg_bitrate = rendition.avg_bitrate,
                    base_url = %base_url,
                    "Selected rendition"
                );
                Ok::<_, DigestError>(ResolvedRendition {
                    kind,
                    base_url: base_url.to_string(),
                    rendition: rendition.clone(),
                })
            })
            .transpose()
    };

    Ok(Selection {
        audio: resolve(MediaKind::Audio, &manifest.audio_renditions)?,
        video: resolve(MediaKind::Video, &manifest.video_renditions)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rendition(id: &str, avg_bitrate: f64, base_url: &str) -> Rendition {
        Rendition {
            id: id.to_string(),
            base_url: base_url.to_string(),
            format: "dash".to_string(),
            mime_type: String::new(),
            codec_info: String::new(),
            bitrate: avg_bitrate,
            avg_bitrate,
            duration_seconds: 10.0,
            init_segment: String::new(),
            index_segment: None,
            index_segment_range: None,
            segments: Vec::new(),
        }
    }

    fn manifest(audio: Vec<Rendition>, video: Vec<Rendition>) -> Manifest {
        Manifest {
            clip_id: "clip".to_string(),
            base_url: "../".to_string(),
            video_renditions: video,
            audio_renditions: audio,
        }
    }

    #[test]
    fn test_picks_highest_average_bitrate() {
        let renditions = vec![
            rendition("low", 64000.0, ""),
            rendition("high", 192000.0, ""),
            rendition("mid", 128000.0, ""),
        ];
        assert_eq!(pick_highest(&renditions).unwrap().id, "high");
        assert!(pick_highest(&[]).is_none());
    }

    #[test]
    fn test_ties_resolve_to_last() {
        let renditions = vec![
            rendition("first", 128000.0, ""),
            rendition("low", 1000.0, ""),
            rendition("second", 128000.0, ""),
        ];
        assert_eq!(pick_highest(&renditions).unwrap().id, "second");
    }

    #[test]
    fn test_two_level_base_url_resolution() {
        let source = Url::parse("https://vod.example/exp=1/video/123/master.json?base64_init=1").unwrap();
        let resolved = resolve_base_url(&source, "../../", "audio/a1/").unwrap();
        assert_eq!(resolved.as_str(), "https://vod.example/exp=1/audio/a1/");

        let absolute = resolve_base_url(&source, "https://cdn.example/", "aud/").unwrap();
        assert_eq!(absolute.as_str(), "https://cdn.example/aud/");
    }

    #[test]
    fn test_selects_both_kinds() {
        let source = Url::parse("https://vod.example/v/master.json").unwrap();
        let manifest = manifest(
            vec![rendition("a-low", 1.0, "a-low/"), rendition("a-high", 2.0, "a-high/")],
            vec![rendition("v-high", 9.0, "v-high/"), rendition("v-low", 3.0, "v-low/")],
        );

        let selection = select_renditions(&manifest, &source).unwrap();
        let audio = selection.require_audio().unwrap();
        assert_eq!(audio.kind, MediaKind::Audio);
        assert_eq!(audio.rendition.id, "a-high");
        assert_eq!(audio.base_url, "https://vod.example/a-high/");

        let video = selection.video.unwrap();
        assert_eq!(video.rendition.id, "v-high");
        assert_eq!(video.base_url, "https://vod.example/v-high/");
    }

    #[test]
    fn test_missing_video_is_audio_only() {
        let source = Url::parse("https://vod.example/v/master.json").unwrap();
        let selection = select_renditions(&manifest(vec![rendition("a", 1.0, "a/")], vec![]), &source).unwrap();
        assert!(selection.video.is_none());
        assert!(selection.require_audio().is_ok());
    }

    #[test]
    fn test_missing_audio_is_an_error() {
        let source = Url::parse("https://vod.example/v/master.json").unwrap();
        let selection = select_renditions(&manifest(vec![], vec![rendition("v", 1.0, "v/")]), &source).unwrap();
        let err = selection.require_audio().unwrap_err();
        assert!(matches!(err, DigestError::MissingRendition(MediaKind::Audio)));
    }
}
