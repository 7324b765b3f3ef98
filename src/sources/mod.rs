use async_trait::async_trait;
use reqwest::Client;
use std::path::PathBuf;
use url::Url;

pub mod vimeo;
pub mod youtube;

use crate::config::{SourceKind, SourceLayout};
use crate::Result;
use vimeo::RetryPolicy;

/// Media materialized by a source in its working directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedMedia {
    /// Downloaded audio track
    pub audio: PathBuf,

    /// Downloaded video track, if one was requested and available
    pub video: Option<PathBuf>,

    /// Whether `audio` is already an mp3
    pub audio_is_mp3: bool,
}

/// Per-run options a source needs
#[derive(Debug, Clone, Copy, Default)]
pub struct FetchOptions {
    /// Skip video renditions
    pub only_audio: bool,
}

/// Trait for downloading media from different platforms
#[async_trait]
pub trait MediaSource: Send + Sync {
    /// Download the media behind `link` into the layout's working directory
    async fn fetch_media(
        &self,
        link: &Url,
        options: FetchOptions,
        layout: &SourceLayout,
    ) -> Result<FetchedMedia>;

    /// Check if this source supports the given URL
    fn supports_url(&self, url: &str) -> bool;

    /// Get the name of this platform
    fn platform_name(&self) -> &'static str;

    /// Kind used for the working directory layout
    fn kind(&self) -> SourceKind;
}

/// Registry for managing the available sources
pub struct SourceRegistry {
    sources: Vec<Box<dyn MediaSource>>,
}

impl SourceRegistry {
    pub fn new() -> Self {
        Self { sources: Vec::new() }
    }

    /// Create a registry with the Vimeo and YouTube sources
    pub fn with_defaults(client: Client, retry: RetryPolicy, show_progress: bool) -> Self {
        let mut registry = Self::new();

        registry.register(Box::new(vimeo::VimeoSource::new(client, retry, show_progress)));
        registry.register(Box::new(youtube::YoutubeSource::new()));

        registry
    }

    /// Register a new source
    pub fn register(&mut self, source: Box<dyn MediaSource>) {
        self.sources.push(source);
    }

    /// Find a source that supports the given URL
    pub fn find_source(&self, url: &str) -> Option<&dyn MediaSource> {
        self.sources
            .iter()
            .find(|source| source.supports_url(url))
            .map(|boxed| boxed.as_ref())
    }

    /// Source registered for a kind
    pub fn by_kind(&self, kind: SourceKind) -> Option<&dyn MediaSource> {
        self.sources
            .iter()
            .find(|source| source.kind() == kind)
            .map(|boxed| boxed.as_ref())
    }

    /// Pick the explicit kind if given, otherwise match on the URL
    pub fn resolve(&self, kind: Option<SourceKind>, url: &str) -> Result<&dyn MediaSource> {
        match kind {
            Some(kind) => self
                .by_kind(kind)
                .ok_or_else(|| anyhow::anyhow!("No source registered for kind: {}", kind)),
            None => self
                .find_source(url)
                .ok_or_else(|| anyhow::anyhow!("No source found for URL: {}", url)),
        }
    }

    /// List all supported platforms
    pub fn list_platforms(&self) -> Vec<&'static str> {
        self.sources
            .iter()
            .map(|source| source.platform_name())
            .collect()
    }
}

impl Default for SourceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct StubSource(SourceKind, &'static str);

    #[async_trait]
    impl MediaSource for StubSource {
        async fn fetch_media(
            &self,
            _link: &Url,
            _options: FetchOptions,
            _layout: &SourceLayout,
        ) -> Result<FetchedMedia> {
            anyhow::bail!("not used")
        }

        fn supports_url(&self, url: &str) -> bool {
            url.contains(self.1)
        }

        fn platform_name(&self) -> &'static str {
            self.1
        }

        fn kind(&self) -> SourceKind {
            self.0
        }
    }

    fn registry() -> SourceRegistry {
        let mut registry = SourceRegistry::new();
        registry.register(Box::new(StubSource(SourceKind::Youtube, "youtube")));
        registry.register(Box::new(StubSource(SourceKind::Vimeo, "vimeo")));
        registry
    }

    #[test]
    fn test_resolve_by_url() {
        let registry = registry();
        let source = registry.resolve(None, "https://vimeo.example/master.json").unwrap();
        assert_eq!(source.kind(), SourceKind::Vimeo);
        assert!(registry.resolve(None, "https://example.com/file").is_err());
    }

    #[test]
    fn test_explicit_kind_wins() {
        let registry = registry();
        let source = registry
            .resolve(Some(SourceKind::Youtube), "https://vimeo.example/master.json")
            .unwrap();
        assert_eq!(source.kind(), SourceKind::Youtube);
        assert_eq!(registry.list_platforms(), vec!["youtube", "vimeo"]);
    }

    #[test]
    fn test_fetch_errors_propagate() {
        let registry = registry();
        let source = registry.resolve(Some(SourceKind::Vimeo), "").unwrap();
        let layout = SourceLayout::new(&crate::config::PathsConfig::default(), SourceKind::Vimeo);
        let link = Url::parse("https://vimeo.example/master.json").unwrap();

        let result = tokio_test::block_on(source.fetch_media(&link, FetchOptions::default(), &layout));
        assert!(result.is_err());
    }

    #[test]
    fn test_default_sources() {
        let registry = SourceRegistry::with_defaults(Client::new(), RetryPolicy::default(), false);
        assert_eq!(registry.list_platforms(), vec!["Vimeo", "YouTube"]);

        let vimeo = registry
            .resolve(None, "https://skyfire.vimeocdn.com/1/2/master.json?base64_init=1")
            .unwrap();
        assert_eq!(vimeo.kind(), SourceKind::Vimeo);

        let youtube = registry
            .resolve(None, "https://www.youtube.com/watch?v=dQw4w9WgXcQ")
            .unwrap();
        assert_eq!(youtube.kind(), SourceKind::Youtube);
    }
}
