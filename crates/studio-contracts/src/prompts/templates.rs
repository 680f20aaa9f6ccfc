use super::selectors::{CreateFunction, EditFunction, TextEffectStyle};
use super::TextEffect;

pub const DEFAULT_BLUR_AMOUNT: u8 = 50;
pub const MAX_BLUR_AMOUNT: u8 = 100;

/// Wraps the user's description in the template for `function`, then adds
/// the exclusion suffix when `negative` has content.
pub fn create_prompt(
    prompt: &str,
    negative: &str,
    function: CreateFunction,
    text_effect: Option<&TextEffect>,
) -> String {
    let base = match function {
        CreateFunction::TextEffect => match text_effect {
            Some(effect) => text_effect_prompt(&effect.text, &effect.style),
            None => prompt.to_string(),
        },
        CreateFunction::Sticker => format!(
            "A vibrant, die-cut sticker of {prompt}, vector art, cartoon style, with a thick white border, on a clean white background."
        ),
        CreateFunction::LogoText => format!(
            "A minimalist and modern text-based logo for \"{prompt}\". The logo should be clean, professional, and easily readable. Black text on a white background."
        ),
        CreateFunction::Comic => format!(
            "A comic book style panel illustration of {prompt}, vibrant colors, bold outlines, dynamic action, half-tone dots for shading."
        ),
        CreateFunction::Free => {
            format!("{prompt}, photorealistic, 8k, detailed, professional photography.")
        }
    };
    with_negative(base, negative)
}

fn with_negative(base: String, negative: &str) -> String {
    let negative = negative.trim();
    if negative.is_empty() {
        return base;
    }
    format!("{base}. Negative prompt: do not include {negative}.")
}

pub fn text_effect_prompt(text: &str, style: &TextEffectStyle) -> String {
    match style {
        TextEffectStyle::Neon => format!(
            "Vibrant neon sign text spelling out '{text}'. The neon should have a bright, electric glow, with subtle light bloom. The scene is set in a dark, moody environment, with dramatic cinematic lighting and a shallow depth of field to make the text pop. Photorealistic, 8k, highly detailed."
        ),
        TextEffectStyle::Glowing => format!(
            "Ethereal, magical text '{text}' glowing softly from within. The light should be gentle and diffuse, casting a soft aura. Set against a mystical, dark background with subtle particles in the air. Emphasize cinematic lighting to create drama and a shallow depth of field for focus. Photorealistic, 8k."
        ),
        TextEffectStyle::Metallic3d => format!(
            "Bold, 3D metallic text '{text}' with a polished chrome or gold finish. Reflections on the metallic surface should be sharp and detailed. Use dramatic cinematic lighting to highlight the metallic sheen and contours, with a clean background and shallow depth of field. Photorealistic, 8k."
        ),
        TextEffectStyle::Fire => format!(
            "The text '{text}' forged in roaring flames and embers. The fire should be dynamic, with sparks flying off. The background is a dark, cavernous space, lit only by the fire from the text. Intense cinematic lighting, with heat distortion effects and a shallow depth of field focusing on the fiery letters. Photorealistic, 8k."
        ),
        TextEffectStyle::Wood => format!(
            "The text '{text}' intricately carved from rich, dark oak wood. Show detailed wood grain, texture, and imperfections. The text is resting in a rustic, workshop-like setting. Soft, warm cinematic lighting from a single source creates long shadows. A shallow depth of field highlights the craftsmanship of the carving. Photorealistic, 8k."
        ),
        TextEffectStyle::Other(name) => format!(
            "Cinematic, photorealistic, 8k, detailed image of the text \"{text}\" with a dramatic {name} effect. The text should be the main focus of the image. The background should be dark and complementary, with cinematic lighting and depth of field."
        ),
    }
}

/// Instruction sent alongside the source image(s). `blur_amount` only
/// matters for [`EditFunction::Blur`]; `None` means the default intensity.
pub fn edit_prompt(prompt: &str, function: EditFunction, blur_amount: Option<u8>) -> String {
    match function {
        EditFunction::AddRemove => format!(
            "Please edit the image by following this instruction: {prompt}. Only change what is requested."
        ),
        EditFunction::Retouch => format!(
            "Retouch this image to make it look more professional and high-quality, focusing on {prompt}. Improve lighting and color balance."
        ),
        EditFunction::StyleTransfer => format!(
            "Change the style of this image to be {prompt}. For example: \"impressionist painting\", \"cyberpunk\", \"vintage black and white photo\"."
        ),
        EditFunction::Blur => blur_prompt(prompt, blur_amount),
        EditFunction::Upscale => "Upscale this image to a higher resolution, like 4k. Enhance all details, textures, and the overall quality. Make the image sharper and more defined without changing the original subject or composition.".to_string(),
        EditFunction::Compose => compose_prompt(prompt),
    }
}

fn blur_prompt(focus: &str, blur_amount: Option<u8>) -> String {
    let intensity = blur_amount
        .unwrap_or(DEFAULT_BLUR_AMOUNT)
        .min(MAX_BLUR_AMOUNT);
    if focus.trim().is_empty() {
        return format!(
            "Apply a Gaussian blur effect to the entire image. The blur intensity should be {intensity} on a scale of 0 to 100, where 100 is maximum blur."
        );
    }
    format!(
        "Apply a blur effect to the image, focusing on: {focus}. The blur intensity should be {intensity} on a scale of 0 to 100, where 100 is maximum blur."
    )
}

pub fn compose_prompt(prompt: &str) -> String {
    format!("Combine elements from both images according to this instruction: {prompt}.")
}
