use std::path::Path;

use anyhow::{bail, Context};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::{Deserialize, Serialize};

const DOWNLOAD_NAME_MAX_CHARS: usize = 20;
const FILE_NAME_RESERVED: &[char] = &['/', '\\', ':', '*', '?', '"', '<', '>', '|'];

/// Base64 image payload as exchanged with the image services.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageData {
    pub data: String,
    pub mime_type: String,
}

impl ImageData {
    pub fn new(data: impl Into<String>, mime_type: impl Into<String>) -> Self {
        Self {
            data: data.into(),
            mime_type: mime_type.into(),
        }
    }

    pub fn from_bytes(bytes: &[u8], mime_type: impl Into<String>) -> Self {
        Self::new(BASE64.encode(bytes), mime_type)
    }

    pub fn from_path(path: &Path) -> anyhow::Result<Self> {
        let bytes =
            std::fs::read(path).with_context(|| format!("failed reading {}", path.display()))?;
        let mime = mime_for_path(path).unwrap_or("image/png");
        Ok(Self::from_bytes(&bytes, mime))
    }

    pub fn to_data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.data)
    }

    /// Accepts only `data:image/<subtype>;base64,<payload>`.
    pub fn from_data_url(url: &str) -> anyhow::Result<Self> {
        let Some(rest) = url.strip_prefix("data:") else {
            bail!("invalid image data URL");
        };
        let Some((mime_type, data)) = rest.split_once(";base64,") else {
            bail!("invalid image data URL");
        };
        if !mime_type.starts_with("image/") || data.is_empty() {
            bail!("invalid image data URL");
        }
        Ok(Self::new(data, mime_type))
    }

    pub fn decode_bytes(&self) -> anyhow::Result<Vec<u8>> {
        BASE64
            .decode(self.data.as_bytes())
            .context("image base64 decode failed")
    }
}

pub fn mime_for_path(path: &Path) -> Option<&'static str> {
    let ext = path
        .extension()
        .and_then(|value| value.to_str())
        .map(str::to_ascii_lowercase)?;
    match ext.as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "webp" => Some("image/webp"),
        "gif" => Some("image/gif"),
        "heic" => Some("image/heic"),
        "heif" => Some("image/heif"),
        _ => None,
    }
}

/// File name offered when saving a result: the start of its prompt with
/// whitespace, path separators and other characters file systems reject
/// turned into underscores. Never contains a separator or starts with `.`.
pub fn download_file_name(prompt: &str) -> String {
    let stem = prompt
        .chars()
        .take(DOWNLOAD_NAME_MAX_CHARS)
        .map(|ch| {
            if ch.is_whitespace() || ch.is_control() || FILE_NAME_RESERVED.contains(&ch) {
                '_'
            } else {
                ch
            }
        })
        .collect::<String>();
    let stem = stem.trim_start_matches('.');
    if stem.is_empty() {
        return "ai-image.png".to_string();
    }
    format!("{stem}.png")
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::{download_file_name, mime_for_path, ImageData};

    #[test]
    fn data_url_roundtrip() -> anyhow::Result<()> {
        let image = ImageData::from_bytes(b"png-bytes", "image/png");
        let url = image.to_data_url();
        assert!(url.starts_with("data:image/png;base64,"));
        let parsed = ImageData::from_data_url(&url)?;
        assert_eq!(parsed, image);
        assert_eq!(parsed.decode_bytes()?, b"png-bytes");
        Ok(())
    }

    #[test]
    fn rejects_non_image_data_urls() {
        for url in [
            "https://example.com/a.png",
            "data:text/plain;base64,aGk=",
            "data:image/png,raw",
            "data:image/png;base64,",
        ] {
            let err = ImageData::from_data_url(url).unwrap_err();
            assert_eq!(err.to_string(), "invalid image data URL", "{url}");
        }
    }

    #[test]
    fn from_path_reads_and_detects_mime() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("photo.JPG");
        std::fs::write(&path, [1u8, 2, 3])?;
        let image = ImageData::from_path(&path)?;
        assert_eq!(image.mime_type, "image/jpeg");
        assert_eq!(image.decode_bytes()?, vec![1, 2, 3]);
        Ok(())
    }

    #[test]
    fn unknown_extension_has_no_mime() {
        assert_eq!(mime_for_path(Path::new("notes.txt")), None);
        assert_eq!(mime_for_path(Path::new("noext")), None);
    }

    #[test]
    fn download_name_uses_prompt_prefix() {
        assert_eq!(download_file_name("a red fox"), "a_red_fox.png");
        assert_eq!(
            download_file_name("a very long prompt about mountains"),
            "a_very_long_prompt_a.png"
        );
        assert_eq!(download_file_name(""), "ai-image.png");
    }

    #[test]
    fn download_name_never_forms_a_path() {
        assert_eq!(download_file_name("../../x"), "_.._x.png");
        assert_eq!(download_file_name("day/night"), "day_night.png");
        assert_eq!(download_file_name(r"c:\temp\cat"), "c__temp_cat.png");
        assert_eq!(download_file_name("what? <neon> | \"a\""), "what___neon_____a_.png");
        assert_eq!(download_file_name(".."), "ai-image.png");
        assert_eq!(download_file_name(".hidden fox"), "hidden_fox.png");
        for prompt in ["../../x", "day/night", "a\\b", "..", "x\ny"] {
            let name = download_file_name(prompt);
            assert!(!name.contains('/') && !name.contains('\\'), "{name}");
            assert!(!name.starts_with('.'), "{name}");
        }
    }
}
