use std::io::{BufRead, ErrorKind, Write};
use std::path::{Path, PathBuf};

use anyhow::Result;
use studio_contracts::chat::{parse_intent, Intent, CHAT_HELP_COMMANDS};
use studio_contracts::prompts::{
    AspectRatio, CreateFunction, EditFunction, Mode, PromptRequest, TextEffectStyle,
    DEFAULT_BLUR_AMOUNT, MAX_BLUR_AMOUNT,
};
use studio_engine::{Slot, Studio, StudioError};
use tracing::debug;

/// Selections made so far in an interactive session. Turned into a fresh
/// [`PromptRequest`] on every submission.
#[derive(Debug, Clone, PartialEq)]
pub struct Selections {
    pub mode: Mode,
    pub create_function: CreateFunction,
    pub edit_function: EditFunction,
    pub aspect_ratio: AspectRatio,
    pub prompt: String,
    pub negative_prompt: String,
    pub effect_text: String,
    pub effect_style: TextEffectStyle,
    pub blur_amount: u8,
}

impl Default for Selections {
    fn default() -> Self {
        Self {
            mode: Mode::Create,
            create_function: CreateFunction::Free,
            edit_function: EditFunction::AddRemove,
            aspect_ratio: AspectRatio::Square,
            prompt: String::new(),
            negative_prompt: String::new(),
            effect_text: String::new(),
            effect_style: TextEffectStyle::Neon,
            blur_amount: DEFAULT_BLUR_AMOUNT,
        }
    }
}

impl Selections {
    pub fn request(&self) -> PromptRequest {
        match self.mode {
            Mode::Create => {
                let mut request = PromptRequest::create(self.create_function, self.prompt.clone())
                    .with_negative_prompt(self.negative_prompt.clone())
                    .with_aspect_ratio(self.aspect_ratio);
                if self.create_function == CreateFunction::TextEffect {
                    request = request
                        .with_text_effect(self.effect_text.clone(), self.effect_style.clone());
                }
                request
            }
            Mode::Edit => PromptRequest::edit(self.edit_function, self.prompt.clone())
                .with_blur_amount(self.blur_amount),
        }
    }

    fn summary(&self) -> String {
        match self.mode {
            Mode::Create => {
                let mut parts = vec![
                    "mode=create".to_string(),
                    format!("function={}", self.create_function),
                    format!("ratio={}", self.aspect_ratio),
                ];
                if self.create_function == CreateFunction::TextEffect {
                    parts.push(format!("style={}", self.effect_style.label()));
                }
                if !self.negative_prompt.trim().is_empty() {
                    parts.push(format!("negative=\"{}\"", self.negative_prompt.trim()));
                }
                parts.join(" ")
            }
            Mode::Edit => {
                let mut parts = vec![
                    "mode=edit".to_string(),
                    format!("function={}", self.edit_function),
                ];
                if self.edit_function == EditFunction::Blur {
                    parts.push(format!("blur={}", self.blur_amount));
                }
                parts.join(" ")
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Quit,
}

/// Reads slash commands and prompts from `input` until end of input or
/// `/quit`. Every outcome, including request failures, is reported on
/// `out`; only IO errors end the loop early.
pub fn run_session(
    studio: &mut Studio,
    mut input: impl BufRead,
    out: &mut impl Write,
    save_dir: &Path,
) -> Result<()> {
    let mut selections = Selections::default();
    let mut line = String::new();

    writeln!(out, "Studio session started. Type /help for commands.")?;
    loop {
        write!(out, "> ")?;
        out.flush()?;

        line.clear();
        let read = match input.read_line(&mut line) {
            Ok(read) => read,
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => return Err(err.into()),
        };
        if read == 0 {
            break;
        }

        let intent = parse_intent(line.trim_end_matches(['\n', '\r']));
        debug!(action = %intent.action, "session input");
        if handle_intent(studio, &mut selections, &intent, out, save_dir)? == Flow::Quit {
            break;
        }
    }
    Ok(())
}

fn handle_intent(
    studio: &mut Studio,
    selections: &mut Selections,
    intent: &Intent,
    out: &mut impl Write,
    save_dir: &Path,
) -> Result<Flow> {
    match intent.action.as_str() {
        "noop" => {}
        "help" => writeln!(out, "Commands: {}", CHAT_HELP_COMMANDS.join("  "))?,
        "quit" => return Ok(Flow::Quit),
        "status" => {
            writeln!(out, "{}", selections.summary())?;
            for (label, slot) in [("image1", Slot::First), ("image2", Slot::Second)] {
                let state = studio
                    .image(slot)
                    .map(|image| image.mime_type.as_str())
                    .unwrap_or("empty");
                writeln!(out, "{label}: {state}")?;
            }
        }
        "set_mode" => match intent.arg_str("mode").map(str::parse::<Mode>) {
            Some(Ok(mode)) => {
                selections.mode = mode;
                writeln!(out, "Mode set to {mode}")?;
            }
            Some(Err(err)) => writeln!(out, "{err}")?,
            None => writeln!(out, "/mode requires create or edit")?,
        },
        "set_create_function" => {
            match intent.arg_str("function").map(str::parse::<CreateFunction>) {
                Some(Ok(function)) => {
                    selections.mode = Mode::Create;
                    selections.create_function = function;
                    writeln!(out, "Create function set to {function}")?;
                }
                Some(Err(err)) => writeln!(out, "{err}")?,
                None => writeln!(out, "Create function: {}", selections.create_function)?,
            }
        }
        "set_edit_function" => match intent.arg_str("function").map(str::parse::<EditFunction>) {
            Some(Ok(function)) => {
                selections.mode = Mode::Edit;
                selections.edit_function = function;
                writeln!(out, "Edit function set to {function}")?;
            }
            Some(Err(err)) => writeln!(out, "{err}")?,
            None => writeln!(out, "Edit function: {}", selections.edit_function)?,
        },
        "set_ratio" => match intent.arg_str("ratio").map(str::parse::<AspectRatio>) {
            Some(Ok(ratio)) => {
                selections.aspect_ratio = ratio;
                writeln!(out, "Aspect ratio set to {ratio}")?;
            }
            Some(Err(err)) => writeln!(out, "{err}")?,
            None => writeln!(out, "Aspect ratio: {}", selections.aspect_ratio)?,
        },
        "set_negative" => {
            selections.negative_prompt = intent.arg_str("text").unwrap_or("").to_string();
            if selections.negative_prompt.is_empty() {
                writeln!(out, "Negative prompt cleared")?;
            } else {
                writeln!(out, "Negative prompt set")?;
            }
        }
        "set_effect_text" => {
            selections.effect_text = intent.arg_str("text").unwrap_or("").to_string();
            writeln!(out, "Effect text set to \"{}\"", selections.effect_text)?;
        }
        "set_effect_style" => {
            if let Some(raw) = intent.arg_str("style") {
                selections.effect_style = TextEffectStyle::parse(raw);
            }
            writeln!(out, "Text effect style: {}", selections.effect_style.label())?;
        }
        "set_blur" => match intent.arg_u64("amount") {
            Some(amount) => {
                selections.blur_amount = amount.min(u64::from(MAX_BLUR_AMOUNT)) as u8;
                writeln!(out, "Blur intensity set to {}", selections.blur_amount)?;
            }
            None => writeln!(out, "/blur requires a number from 0 to {MAX_BLUR_AMOUNT}")?,
        },
        "set_image1" | "set_image2" => {
            let slot = if intent.action == "set_image1" {
                Slot::First
            } else {
                Slot::Second
            };
            match intent.arg_str("path") {
                Some(path) => match studio.load_image(slot, Path::new(path)) {
                    Ok(()) => writeln!(out, "Loaded {path}")?,
                    Err(err) => writeln!(out, "{err}")?,
                },
                None => {
                    studio.set_image(slot, None);
                    writeln!(out, "Image slot cleared")?;
                }
            }
        }
        "generate" => {
            selections.prompt = intent.prompt.clone().unwrap_or_default();
            if selections.mode == Mode::Create
                && selections.create_function == CreateFunction::TextEffect
            {
                selections.effect_text = selections.prompt.clone();
            }
            submit(studio, &selections.request(), out)?;
        }
        "submit" => submit(studio, &selections.request(), out)?,
        "upscale" => report(studio.upscale_current(), out)?,
        "list_images" => {
            if studio.image_history().is_empty() {
                writeln!(out, "No images yet.")?;
            }
            for (index, entry) in studio.image_history().entries().iter().enumerate() {
                writeln!(out, "{}. {}", index + 1, entry.prompt)?;
            }
        }
        "list_prompts" => {
            if studio.prompt_history().is_empty() {
                writeln!(out, "No prompts yet.")?;
            }
            for (index, prompt) in studio.prompt_history().entries().iter().enumerate() {
                writeln!(out, "{}. {prompt}", index + 1)?;
            }
        }
        "select_history" => match intent.arg_u64("index").filter(|index| *index > 0) {
            Some(index) => match studio.select_from_history((index - 1) as usize) {
                Ok(entry) => writeln!(out, "Showing: {}", entry.prompt)?,
                Err(err) => writeln!(out, "{err}")?,
            },
            None => writeln!(out, "/use requires a history position (1 = newest)")?,
        },
        "save" => {
            let target = intent
                .arg_str("path")
                .map(PathBuf::from)
                .unwrap_or_else(|| save_dir.to_path_buf());
            match studio.save_current(&target) {
                Ok(path) => writeln!(out, "Saved {}", path.display())?,
                Err(err) => writeln!(out, "{err}")?,
            }
        }
        "edit_current" => match studio.edit_current() {
            Ok(()) => {
                selections.mode = Mode::Edit;
                selections.edit_function = EditFunction::AddRemove;
                writeln!(out, "Current image moved to image1; mode=edit function=add-remove")?;
            }
            Err(err) => writeln!(out, "{err}")?,
        },
        "clear_images" => {
            studio.clear_image_history();
            writeln!(out, "Image history cleared")?;
        }
        "clear_prompts" => {
            studio.clear_prompt_history();
            writeln!(out, "Prompt history cleared")?;
        }
        "reset" => {
            studio.reset();
            *selections = Selections::default();
            writeln!(out, "Started over")?;
        }
        _ => {
            let command = intent.arg_str("command").unwrap_or("?");
            writeln!(out, "Unknown command /{command}. Type /help for commands.")?;
        }
    }
    Ok(Flow::Continue)
}

fn submit(studio: &mut Studio, request: &PromptRequest, out: &mut impl Write) -> Result<()> {
    report(studio.generate(request), out)
}

fn report(
    outcome: std::result::Result<studio_contracts::history::ImageHistoryEntry, StudioError>,
    out: &mut impl Write,
) -> Result<()> {
    match outcome {
        Ok(entry) => writeln!(
            out,
            "Image ready ({}). /save to write it out, /upscale or /edit_current to keep going.",
            studio_engine::studio::image_fingerprint(&entry.url)
        )?,
        Err(err) => writeln!(out, "{err}")?,
    }
    Ok(())
}
