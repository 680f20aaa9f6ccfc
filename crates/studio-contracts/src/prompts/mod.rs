mod selectors;
mod templates;

use serde::{Deserialize, Serialize};

pub use selectors::{
    AspectRatio, CreateFunction, EditFunction, Mode, TextEffectStyle, UnknownSelector,
};
pub use templates::{
    compose_prompt, create_prompt, edit_prompt, text_effect_prompt, DEFAULT_BLUR_AMOUNT,
    MAX_BLUR_AMOUNT,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextEffect {
    pub text: String,
    pub style: TextEffectStyle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", content = "function", rename_all = "snake_case")]
pub enum PromptFunction {
    Create(CreateFunction),
    Edit(EditFunction),
}

impl PromptFunction {
    pub fn mode(self) -> Mode {
        match self {
            PromptFunction::Create(_) => Mode::Create,
            PromptFunction::Edit(_) => Mode::Edit,
        }
    }
}

/// Everything the user selected for one request. Built once with the
/// `with_*` methods and then only read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptRequest {
    function: PromptFunction,
    prompt: String,
    negative_prompt: Option<String>,
    aspect_ratio: AspectRatio,
    text_effect: Option<TextEffect>,
    blur_amount: u8,
}

impl PromptRequest {
    pub fn create(function: CreateFunction, prompt: impl Into<String>) -> Self {
        Self::new(PromptFunction::Create(function), prompt.into())
    }

    pub fn edit(function: EditFunction, prompt: impl Into<String>) -> Self {
        Self::new(PromptFunction::Edit(function), prompt.into())
    }

    fn new(function: PromptFunction, prompt: String) -> Self {
        Self {
            function,
            prompt,
            negative_prompt: None,
            aspect_ratio: AspectRatio::default(),
            text_effect: None,
            blur_amount: DEFAULT_BLUR_AMOUNT,
        }
    }

    pub fn with_negative_prompt(mut self, negative: impl Into<String>) -> Self {
        let negative = negative.into();
        self.negative_prompt = if negative.trim().is_empty() {
            None
        } else {
            Some(negative)
        };
        self
    }

    pub fn with_aspect_ratio(mut self, aspect_ratio: AspectRatio) -> Self {
        self.aspect_ratio = aspect_ratio;
        self
    }

    pub fn with_text_effect(mut self, text: impl Into<String>, style: TextEffectStyle) -> Self {
        self.text_effect = Some(TextEffect {
            text: text.into(),
            style,
        });
        self
    }

    pub fn with_blur_amount(mut self, amount: u8) -> Self {
        self.blur_amount = amount.min(MAX_BLUR_AMOUNT);
        self
    }

    pub fn mode(&self) -> Mode {
        self.function.mode()
    }

    pub fn function(&self) -> PromptFunction {
        self.function
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    pub fn negative_prompt(&self) -> Option<&str> {
        self.negative_prompt.as_deref()
    }

    pub fn aspect_ratio(&self) -> AspectRatio {
        self.aspect_ratio
    }

    pub fn text_effect(&self) -> Option<&TextEffect> {
        self.text_effect.as_ref()
    }

    pub fn blur_amount(&self) -> u8 {
        self.blur_amount
    }

    /// Text the user typed for this request: the effect text for
    /// text-effect generation, the prompt otherwise.
    pub fn history_text(&self) -> &str {
        match (self.function, self.text_effect.as_ref()) {
            (PromptFunction::Create(CreateFunction::TextEffect), Some(effect)) => &effect.text,
            _ => &self.prompt,
        }
    }

    pub fn final_prompt(&self) -> String {
        match self.function {
            PromptFunction::Create(function) => create_prompt(
                &self.prompt,
                self.negative_prompt.as_deref().unwrap_or(""),
                function,
                self.text_effect.as_ref(),
            ),
            PromptFunction::Edit(function) => {
                edit_prompt(&self.prompt, function, Some(self.blur_amount))
            }
        }
    }
}
