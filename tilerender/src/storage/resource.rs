//! Fetchable resource identities.

use std::fmt;

/// What a resource is used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ResourceKind {
    #[default]
    Unknown,
    Style,
    Source,
    Tile,
    Glyphs,
    SpriteImage,
    SpriteJson,
}

impl ResourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Unknown => "unknown",
            ResourceKind::Style => "style",
            ResourceKind::Source => "source",
            ResourceKind::Tile => "tile",
            ResourceKind::Glyphs => "glyphs",
            ResourceKind::SpriteImage => "sprite-image",
            ResourceKind::SpriteJson => "sprite-json",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A fetch target: URL-like key plus kind.
///
/// `prior_etag` carries the validator of a previously cached copy so the
/// transport can ask for a conditional response.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Resource {
    pub kind: ResourceKind,
    pub url: String,
    pub prior_etag: Option<String>,
}

impl Resource {
    pub fn new(kind: ResourceKind, url: impl Into<String>) -> Self {
        Self {
            kind,
            url: url.into(),
            prior_etag: None,
        }
    }

    pub fn style(url: impl Into<String>) -> Self {
        Self::new(ResourceKind::Style, url)
    }

    pub fn source(url: impl Into<String>) -> Self {
        Self::new(ResourceKind::Source, url)
    }

    pub fn tile(url: impl Into<String>) -> Self {
        Self::new(ResourceKind::Tile, url)
    }

    pub fn glyphs(url: impl Into<String>) -> Self {
        Self::new(ResourceKind::Glyphs, url)
    }

    pub fn sprite_image(url: impl Into<String>) -> Self {
        Self::new(ResourceKind::SpriteImage, url)
    }

    pub fn sprite_json(url: impl Into<String>) -> Self {
        Self::new(ResourceKind::SpriteJson, url)
    }

    /// Attaches the etag of a cached copy.
    pub fn with_prior_etag(mut self, etag: impl Into<String>) -> Self {
        self.prior_etag = Some(etag.into());
        self
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind, self.url)
    }
}
