use reqwest::{Client, StatusCode};
use serde::{Deserialize, Deserializer, Serialize};
use url::Url;

use crate::DigestError;

/// Renditions and segment lists of one clip, as served by `master.json`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    #[serde(default, deserialize_with = "null_as_default")]
    pub clip_id: String,

    /// Relative to the manifest URL
    #[serde(default, deserialize_with = "null_as_default")]
    pub base_url: String,

    #[serde(rename = "video", default, deserialize_with = "null_as_default")]
    pub video_renditions: Vec<Rendition>,

    #[serde(rename = "audio", default, deserialize_with = "null_as_default")]
    pub audio_renditions: Vec<Rendition>,
}

/// One encoded variant of the audio or video stream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rendition {
    #[serde(default, deserialize_with = "null_as_default")]
    pub id: String,

    /// Relative to the manifest's `base_url`
    #[serde(default, deserialize_with = "null_as_default")]
    pub base_url: String,

    #[serde(default, deserialize_with = "null_as_default")]
    pub format: String,

    #[serde(default, deserialize_with = "null_as_default")]
    pub mime_type: String,

    #[serde(rename = "codecs", default, deserialize_with = "null_as_default")]
    pub codec_info: String,

    #[serde(default)]
    pub bitrate: f64,

    #[serde(default)]
    pub avg_bitrate: f64,

    #[serde(rename = "duration", default)]
    pub duration_seconds: f64,

    /// Base64 container header
    #[serde(default, deserialize_with = "null_as_default")]
    pub init_segment: String,

    #[serde(default)]
    pub index_segment: Option<String>,

    #[serde(default)]
    pub index_segment_range: Option<String>,

    #[serde(default, deserialize_with = "null_as_default")]
    pub segments: Vec<Segment>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    #[serde(default)]
    pub start: f64,

    #[serde(default)]
    pub end: f64,

    /// Empty when the rendition is addressed by byte range
    #[serde(default, deserialize_with = "null_as_default")]
    pub url: String,

    #[serde(default)]
    pub size: u64,

    #[serde(default)]
    pub range: Option<String>,
}

/// `null` reads as the field's default
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Parse a manifest body
pub fn parse_manifest(body: &[u8]) -> Result<Manifest, DigestError> {
    serde_json::from_slice(body).map_err(|e| DigestError::ManifestParse(e.to_string()))
}

/// Vimeo answers expired manifests with `410 Gone`
pub fn is_expired(status: StatusCode) -> bool {
    status
        .canonical_reason()
        .map(|reason| reason.eq_ignore_ascii_case("gone"))
        .unwrap_or(false)
}

/// Fetches and parses manifests. No retries: a failure here ends the run.
pub struct ManifestFetcher {
    client: Client,
}

impl ManifestFetcher {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    pub async fn fetch(&self, url: &Url) -> Result<Manifest, DigestError> {
        tracing::debug!("Fetching manifest: {}", url);

        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(DigestError::transport)?;

        if is_expired(response.status()) {
            return Err(DigestError::ManifestExpired);
        }

        let body = response.bytes().await.map_err(DigestError::transport)?;
        let manifest = parse_manifest(&body)?;

        tracing::info!(
            clip_id = %manifest.clip_id,
            audio = manifest.audio_renditions.len(),
            video = manifest.video_renditions.len(),
            "Manifest loaded"
        );
        Ok(manifest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::vimeo::test_server::{client, refused_url, Response, TestServer};

    const MASTER_JSON: &str = r#"{
        "clip_id": "c1",
        "base_url": "../",
        "video": [
            {
                "id": "v1", "base_url": "video/v1/", "format": "dash", "mime_type": "video/mp4",
                "codecs": "avc1.64001F", "bitrate": 900000, "avg_bitrate": 800000,
                "duration": 12.5, "framerate": 25, "max_segment_duration": 6,
                "init_segment": "AAAA", "index_segment": "idx",
                "segments": [{"start": 0, "end": 6, "url": "segment-1.m4s", "size": 1000}]
            }
        ],
        "audio": [
            {
                "id": "a1", "base_url": "audio/a1/", "format": "dash", "mime_type": "audio/mp4",
                "codecs": "mp4a.40.2", "bitrate": 128000, "avg_bitrate": 64000,
                "duration": 12.5, "init_segment": "AAAA", "index_segment": "idx",
                "index_segment_range": "0-99",
                "segments": [{"start": 0, "end": 6, "url": "", "size": 500, "range": "100-599"}]
            }
        ]
    }"#;

    #[test]
    fn test_parse_master_json() {
        let manifest = parse_manifest(MASTER_JSON.as_bytes()).unwrap();
        assert_eq!(manifest.clip_id, "c1");
        assert_eq!(manifest.base_url, "../");
        assert_eq!(manifest.video_renditions.len(), 1);

        let audio = &manifest.audio_renditions[0];
        assert_eq!(audio.codec_info, "mp4a.40.2");
        assert_eq!(audio.avg_bitrate, 64000.0);
        assert_eq!(audio.index_segment_range.as_deref(), Some("0-99"));
        assert_eq!(audio.segments[0].range.as_deref(), Some("100-599"));
        assert!(audio.segments[0].url.is_empty());
    }

    #[test]
    fn test_null_rendition_lists_are_empty() {
        let manifest =
            parse_manifest(br#"{"clip_id": "c", "base_url": "", "video": null, "audio": []}"#)
                .unwrap();
        assert!(manifest.video_renditions.is_empty());
        assert!(manifest.audio_renditions.is_empty());
    }

    #[test]
    fn test_null_strings_are_empty() {
        let manifest = parse_manifest(
            br#"{
                "clip_id": null,
                "base_url": null,
                "audio": [{
                    "id": "a1", "base_url": null, "codecs": null, "mime_type": null,
                    "avg_bitrate": 64000, "init_segment": null,
                    "segments": [{"url": null, "range": null}]
                }]
            }"#,
        )
        .unwrap();

        assert!(manifest.clip_id.is_empty());
        assert!(manifest.base_url.is_empty());
        assert!(manifest.video_renditions.is_empty());
        let audio = &manifest.audio_renditions[0];
        assert!(audio.base_url.is_empty());
        assert!(audio.init_segment.is_empty());
        assert!(audio.codec_info.is_empty());
        assert!(audio.segments[0].url.is_empty());
    }

    #[test]
    fn test_invalid_json_is_a_parse_error() {
        let err = parse_manifest(b"<html>gone</html>").unwrap_err();
        assert!(matches!(err, DigestError::ManifestParse(_)));
    }

    #[test]
    fn test_gone_status_means_expired() {
        assert!(is_expired(StatusCode::GONE));
        assert!(!is_expired(StatusCode::OK));
        assert!(!is_expired(StatusCode::NOT_FOUND));
    }

    #[tokio::test]
    async fn test_fetch_parses_served_manifest() {
        let server = TestServer::start(vec![Response::Full {
            status: "200 OK",
            body: MASTER_JSON.as_bytes(),
        }])
        .await;
        let url = Url::parse(&server.url("/video/1/master.json")).unwrap();

        let manifest = ManifestFetcher::new(client()).fetch(&url).await.unwrap();

        assert_eq!(manifest.clip_id, "c1");
        assert_eq!(manifest.audio_renditions.len(), 1);
        assert_eq!(server.hits(), 1);
    }

    #[tokio::test]
    async fn test_fetch_gone_is_expired() {
        let server = TestServer::start(vec![Response::Full {
            status: "410 Gone",
            body: b"gone",
        }])
        .await;
        let url = Url::parse(&server.url("/master.json")).unwrap();

        let err = ManifestFetcher::new(client()).fetch(&url).await.unwrap_err();

        assert!(matches!(err, DigestError::ManifestExpired), "got {:?}", err);
    }

    #[tokio::test]
    async fn test_fetch_refused_connection_is_transport_error() {
        let url = Url::parse(&refused_url().await).unwrap();

        let err = ManifestFetcher::new(client()).fetch(&url).await.unwrap_err();

        assert!(matches!(err, DigestError::Transport(_)), "got {:?}", err);
    }
}
