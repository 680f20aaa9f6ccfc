use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind} '{value}'")]
pub struct UnknownSelector {
    pub kind: &'static str,
    pub value: String,
}

fn unknown(kind: &'static str, value: &str) -> UnknownSelector {
    UnknownSelector {
        kind,
        value: value.to_string(),
    }
}

macro_rules! wire_selector {
    (
        $(#[$meta:meta])*
        $name:ident, $kind:literal, default = $default:ident {
            $($variant:ident => $wire:literal),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(
                #[serde(rename = $wire)]
                $variant,
            )+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(self) -> &'static str {
                match self {
                    $($name::$variant => $wire,)+
                }
            }
        }

        impl Default for $name {
            fn default() -> Self {
                $name::$default
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = UnknownSelector;

            fn from_str(raw: &str) -> Result<Self, Self::Err> {
                let normalized = raw.trim().to_ascii_lowercase();
                $name::ALL
                    .iter()
                    .copied()
                    .find(|candidate| candidate.as_str() == normalized)
                    .ok_or_else(|| unknown($kind, raw))
            }
        }
    };
}

wire_selector! {
    Mode, "mode", default = Create {
        Create => "create",
        Edit => "edit",
    }
}

wire_selector! {
    /// Which template wraps the prompt when generating from scratch.
    CreateFunction, "creation function", default = Free {
        Free => "free",
        Sticker => "sticker",
        LogoText => "text",
        Comic => "comic",
        TextEffect => "text-effect",
    }
}

wire_selector! {
    /// Which template wraps the instruction when modifying an existing image.
    EditFunction, "edit function", default = AddRemove {
        AddRemove => "add-remove",
        Retouch => "retouch",
        StyleTransfer => "style",
        Compose => "compose",
        Upscale => "upscale",
        Blur => "blur",
    }
}

wire_selector! {
    AspectRatio, "aspect ratio", default = Square {
        Square => "1:1",
        Landscape => "16:9",
        Portrait => "9:16",
        Standard => "4:3",
        StandardPortrait => "3:4",
    }
}

impl EditFunction {
    /// Compose takes two source images, everything else takes one.
    pub fn required_images(self) -> usize {
        match self {
            EditFunction::Compose => 2,
            _ => 1,
        }
    }
}

/// Text-effect styles offered by the picker. Any other name still renders
/// through a generic cinematic template.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum TextEffectStyle {
    #[default]
    Neon,
    Glowing,
    Metallic3d,
    Fire,
    Wood,
    Other(String),
}

impl TextEffectStyle {
    pub const PRESETS: &'static [TextEffectStyle] = &[
        TextEffectStyle::Neon,
        TextEffectStyle::Glowing,
        TextEffectStyle::Metallic3d,
        TextEffectStyle::Fire,
        TextEffectStyle::Wood,
    ];

    pub fn label(&self) -> &str {
        match self {
            TextEffectStyle::Neon => "Neon",
            TextEffectStyle::Glowing => "Glowing",
            TextEffectStyle::Metallic3d => "3D Metallic",
            TextEffectStyle::Fire => "Fire",
            TextEffectStyle::Wood => "Wood",
            TextEffectStyle::Other(name) => name.as_str(),
        }
    }

    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        let normalized = trimmed.to_ascii_lowercase().replace(['-', '_'], " ");
        match normalized.as_str() {
            "neon" => TextEffectStyle::Neon,
            "glowing" => TextEffectStyle::Glowing,
            "3d metallic" | "metallic" | "3d" => TextEffectStyle::Metallic3d,
            "fire" => TextEffectStyle::Fire,
            "wood" => TextEffectStyle::Wood,
            _ => TextEffectStyle::Other(trimmed.to_string()),
        }
    }
}

impl fmt::Display for TextEffectStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl From<String> for TextEffectStyle {
    fn from(value: String) -> Self {
        TextEffectStyle::parse(&value)
    }
}

impl From<TextEffectStyle> for String {
    fn from(value: TextEffectStyle) -> Self {
        value.label().to_string()
    }
}

impl FromStr for TextEffectStyle {
    type Err = std::convert::Infallible;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        Ok(TextEffectStyle::parse(raw))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_names_parse_case_insensitively() {
        assert_eq!("Sticker".parse::<CreateFunction>(), Ok(CreateFunction::Sticker));
        assert_eq!("text".parse::<CreateFunction>(), Ok(CreateFunction::LogoText));
        assert_eq!(" BLUR ".parse::<EditFunction>(), Ok(EditFunction::Blur));
        assert_eq!("16:9".parse::<AspectRatio>(), Ok(AspectRatio::Landscape));
    }

    #[test]
    fn unknown_wire_name_reports_kind() {
        let err = "watercolor".parse::<EditFunction>().unwrap_err();
        assert_eq!(err.to_string(), "unknown edit function 'watercolor'");
    }

    #[test]
    fn defaults_match_initial_selection() {
        assert_eq!(Mode::default(), Mode::Create);
        assert_eq!(CreateFunction::default(), CreateFunction::Free);
        assert_eq!(EditFunction::default(), EditFunction::AddRemove);
        assert_eq!(AspectRatio::default(), AspectRatio::Square);
        assert_eq!(TextEffectStyle::default(), TextEffectStyle::Neon);
    }

    #[test]
    fn text_effect_style_accepts_labels_and_aliases() {
        assert_eq!(TextEffectStyle::parse("3D Metallic"), TextEffectStyle::Metallic3d);
        assert_eq!(TextEffectStyle::parse("3d-metallic"), TextEffectStyle::Metallic3d);
        assert_eq!(TextEffectStyle::parse("fire"), TextEffectStyle::Fire);
        assert_eq!(
            TextEffectStyle::parse("Ice"),
            TextEffectStyle::Other("Ice".to_string())
        );
        assert_eq!(TextEffectStyle::Metallic3d.to_string(), "3D Metallic");
    }

    #[test]
    fn compose_needs_two_images() {
        assert_eq!(EditFunction::Compose.required_images(), 2);
        assert_eq!(EditFunction::Blur.required_images(), 1);
    }
}
