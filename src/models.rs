use crate::errors::ValidationError;
use chrono::{DateTime, DurationRound, TimeDelta, Utc};
use serde::{Deserialize, Serialize, Serializer};
use url::Url;

/// Key prefix holding submissions awaiting moderation.
pub const PENDING_PREFIX: &str = "uploaded/";
/// Key prefix holding approved, publicly served images.
pub const PUBLISHED_PREFIX: &str = "images/";
/// Extension of the sidecar metadata object.
pub const SIDECAR_EXTENSION: &str = ".json";

/// Metadata submitted alongside one photo. Stored as the JSON sidecar
/// `uploaded/{id}.json` next to the image itself.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct Photo {
    #[serde(rename = "Copyright")]
    pub copyright: String,
    #[serde(rename = "BikeModel", default)]
    pub bike_model: String, // i.e. Fr8, Kr8
    #[serde(rename = "Colors")]
    pub colors: String,
    #[serde(rename = "SourceURL", default)]
    pub source_url: String,
    #[serde(rename = "ImageReference", default)]
    pub image_reference: String,
    #[serde(rename = "SubmittedAt", default, serialize_with = "serialize_minutes")]
    pub submitted_at: Option<DateTime<Utc>>,
}

fn truncate_to_minute(at: DateTime<Utc>) -> DateTime<Utc> {
    at.duration_trunc(TimeDelta::minutes(1)).unwrap_or(at)
}

fn serialize_minutes<S>(at: &Option<DateTime<Utc>>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    at.map(truncate_to_minute).serialize(serializer)
}

/// Accepts absolute URLs and relative references such as
/// `www.flickr.com/photos/x`. Rejects control characters, malformed percent
/// escapes in the path, and a colon in the first segment of a scheme-less link.
fn is_link(source: &str) -> bool {
    if source.chars().any(char::is_control) {
        return false;
    }
    let path = source.split(['?', '#']).next().unwrap_or_default();
    if !has_valid_escapes(path) {
        return false;
    }
    match Url::parse(source) {
        Ok(_) => true,
        Err(url::ParseError::RelativeUrlWithoutBase) => {
            let first_segment = path.split('/').next().unwrap_or_default();
            !first_segment.contains(':')
                && Url::parse("http://localhost/")
                    .and_then(|base| base.join(source))
                    .is_ok()
        }
        Err(_) => false,
    }
}

fn has_valid_escapes(raw: &str) -> bool {
    let bytes = raw.as_bytes();
    bytes.iter().enumerate().all(|(i, b)| {
        *b != b'%'
            || bytes
                .get(i + 1..i + 3)
                .is_some_and(|hex| hex.iter().all(u8::is_ascii_hexdigit))
    })
}

impl Photo {
    /// Checks the required fields and the optional source link.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.copyright.trim().is_empty() {
            return Err(ValidationError::CopyrightMissing);
        }
        if self.colors.trim().is_empty() {
            return Err(ValidationError::ColorsMissing);
        }
        let source = self.source_url.trim();
        if !source.is_empty() && !is_link(source) {
            return Err(ValidationError::InvalidUrl);
        }
        Ok(())
    }

    /// Color names, split on anything that is not a letter or digit.
    pub fn color_tokens(&self) -> Vec<String> {
        self.colors
            .split(|c: char| !c.is_alphanumeric())
            .filter(|token| !token.is_empty())
            .map(str::to_string)
            .collect()
    }

    /// The entry an operator copies into the published gallery data.
    pub fn gallery_entry(&self) -> GalleryEntry {
        GalleryEntry {
            copyright: self.copyright.trim().to_string(),
            bike: self.bike_model.trim().to_string(),
            src: self.source_url.trim().to_string(),
            added: self.submitted_at.map(truncate_to_minute),
            image: format!("{}{}", PUBLISHED_PREFIX, self.image_reference),
            color: self.color_tokens(),
        }
    }
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct GalleryEntry {
    pub copyright: String,
    pub bike: String,
    pub src: String,
    pub added: Option<DateTime<Utc>>,
    pub image: String,
    pub color: Vec<String>,
}

/// A sidecar read back from the pending area.
#[derive(Debug, Clone)]
pub struct PendingPhoto {
    pub key: String,
    pub photo: Photo,
}

/// Supported image formats. Nothing else is stored or served.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageKind {
    Jpeg,
    Png,
}

impl ImageKind {
    pub fn from_content_type(content_type: &str) -> Option<Self> {
        let essence = content_type.split(';').next().unwrap_or_default().trim();
        match essence.to_ascii_lowercase().as_str() {
            "image/jpeg" => Some(ImageKind::Jpeg),
            "image/png" => Some(ImageKind::Png),
            _ => None,
        }
    }

    /// Identifies the format from the file signature.
    pub fn sniff(data: &[u8]) -> Option<Self> {
        const JPEG: &[u8] = &[0xFF, 0xD8, 0xFF];
        const PNG: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
        if data.starts_with(JPEG) {
            Some(ImageKind::Jpeg)
        } else if data.starts_with(PNG) {
            Some(ImageKind::Png)
        } else {
            None
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            ImageKind::Jpeg => "jpg",
            ImageKind::Png => "png",
        }
    }

    pub fn content_type(self) -> &'static str {
        match self {
            ImageKind::Jpeg => "image/jpeg",
            ImageKind::Png => "image/png",
        }
    }
}

/// Splits a client-supplied image name into `(stem, kind)`.
///
/// Only a bare `{stem}.jpg` / `{stem}.png` is accepted: no separators, no
/// leading dot, no empty stem. Keys are always built by prefixing the result,
/// so a name that passes can never address anything outside its area.
pub fn parse_image_name(name: &str) -> Option<(&str, ImageKind)> {
    if name.is_empty()
        || name.starts_with('.')
        || name.contains(['/', '\\'])
        || name.chars().any(char::is_control)
    {
        return None;
    }
    let (stem, ext) = name.rsplit_once('.')?;
    if stem.is_empty() {
        return None;
    }
    let kind = match ext {
        "jpg" => ImageKind::Jpeg,
        "png" => ImageKind::Png,
        _ => return None,
    };
    Some((stem, kind))
}

pub fn pending_key(name: &str) -> String {
    format!("{}{}", PENDING_PREFIX, name)
}

pub fn published_key(name: &str) -> String {
    format!("{}{}", PUBLISHED_PREFIX, name)
}

pub fn sidecar_key(stem: &str) -> String {
    format!("{}{}{}", PENDING_PREFIX, stem, SIDECAR_EXTENSION)
}
