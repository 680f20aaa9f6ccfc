mod session;

use std::io;
use std::path::{Path, PathBuf};

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use studio_contracts::history::ImageHistoryEntry;
use studio_contracts::prompts::{
    AspectRatio, CreateFunction, EditFunction, PromptRequest, TextEffectStyle,
    DEFAULT_BLUR_AMOUNT,
};
use studio_engine::{default_service_registry, Slot, Studio, StudioConfig, StudioError};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "studio-rs", version, about = "AI image studio: create, edit and compose images")]
struct Cli {
    /// Directory for history and event logs (overrides STUDIO_HOME).
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,
    /// Force an image provider: imagen, gemini or dryrun.
    #[arg(long, global = true)]
    provider: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    Create(CreateArgs),
    Edit(EditArgs),
    Compose(ComposeArgs),
    /// Upscale the newest image in the history.
    Upscale(OutArgs),
    History {
        #[command(subcommand)]
        command: HistoryCommand,
    },
    /// Interactive slash-command session.
    Session(OutArgs),
}

#[derive(Debug, Parser)]
struct CreateArgs {
    #[arg(long, default_value = "")]
    prompt: String,
    #[arg(long, default_value_t = CreateFunction::Free)]
    function: CreateFunction,
    #[arg(long)]
    negative: Option<String>,
    #[arg(long, default_value_t = AspectRatio::Square)]
    ratio: AspectRatio,
    /// Text to render for `--function text-effect`.
    #[arg(long)]
    effect_text: Option<String>,
    #[arg(long, default_value_t = TextEffectStyle::Neon)]
    effect_style: TextEffectStyle,
    #[arg(long, default_value = ".")]
    out: PathBuf,
}

#[derive(Debug, Parser)]
struct EditArgs {
    #[arg(long, default_value = "")]
    prompt: String,
    #[arg(long, default_value_t = EditFunction::AddRemove)]
    function: EditFunction,
    #[arg(long)]
    image: PathBuf,
    #[arg(long)]
    image2: Option<PathBuf>,
    #[arg(long, default_value_t = DEFAULT_BLUR_AMOUNT)]
    blur: u8,
    #[arg(long, default_value = ".")]
    out: PathBuf,
}

#[derive(Debug, Parser)]
struct ComposeArgs {
    #[arg(long)]
    prompt: String,
    #[arg(long)]
    image: PathBuf,
    #[arg(long)]
    image2: PathBuf,
    #[arg(long, default_value = ".")]
    out: PathBuf,
}

#[derive(Debug, Parser)]
struct OutArgs {
    /// File or directory to save results into.
    #[arg(long, default_value = ".")]
    out: PathBuf,
}

#[derive(Debug, Subcommand)]
enum HistoryCommand {
    Prompts,
    Images,
    /// Save history entry `n` (1 = newest).
    Show {
        n: usize,
        #[arg(long, default_value = ".")]
        out: PathBuf,
    },
    ClearPrompts,
    ClearImages,
}

fn main() {
    init_tracing();
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("studio-rs error: {err:#}");
            std::process::exit(1);
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    let mut config = StudioConfig::from_env().with_provider(cli.provider.clone());
    if let Some(data_dir) = cli.data_dir.clone() {
        config = config.with_data_dir(data_dir);
    }
    let services = default_service_registry(&config)?;
    let mut studio = Studio::new(config, services);
    dispatch(&mut studio, cli.command)
}

fn dispatch(studio: &mut Studio, command: Command) -> Result<i32> {
    match command {
        Command::Create(args) => {
            let mut request = PromptRequest::create(args.function, args.prompt)
                .with_aspect_ratio(args.ratio)
                .with_negative_prompt(args.negative.unwrap_or_default());
            if let Some(text) = args.effect_text {
                request = request.with_text_effect(text, args.effect_style);
            }
            generate_and_save(studio, &request, &args.out)
        }
        Command::Edit(args) => {
            studio.load_image(Slot::First, &args.image)?;
            if let Some(second) = args.image2.as_deref() {
                studio.load_image(Slot::Second, second)?;
            }
            let request =
                PromptRequest::edit(args.function, args.prompt).with_blur_amount(args.blur);
            generate_and_save(studio, &request, &args.out)
        }
        Command::Compose(args) => {
            studio.load_image(Slot::First, &args.image)?;
            studio.load_image(Slot::Second, &args.image2)?;
            let request = PromptRequest::edit(EditFunction::Compose, args.prompt);
            generate_and_save(studio, &request, &args.out)
        }
        Command::Upscale(args) => {
            if studio.image_history().is_empty() {
                bail!("image history is empty, nothing to upscale");
            }
            studio.select_from_history(0)?;
            let entry = studio.upscale_current()?;
            save_and_report(studio, &entry, &args.out)
        }
        Command::History { command } => history(studio, command),
        Command::Session(args) => {
            let stdin = io::stdin();
            let mut stdout = io::stdout();
            session::run_session(studio, stdin.lock(), &mut stdout, &args.out)?;
            Ok(0)
        }
    }
}

fn history(studio: &mut Studio, command: HistoryCommand) -> Result<i32> {
    match command {
        HistoryCommand::Prompts => {
            for (index, prompt) in studio.prompt_history().entries().iter().enumerate() {
                println!("{}. {prompt}", index + 1);
            }
        }
        HistoryCommand::Images => {
            for (index, entry) in studio.image_history().entries().iter().enumerate() {
                println!(
                    "{}. {} [{}]",
                    index + 1,
                    entry.prompt,
                    studio_engine::studio::image_fingerprint(&entry.url)
                );
            }
        }
        HistoryCommand::Show { n, out } => {
            if n == 0 {
                bail!("history positions start at 1");
            }
            let entry = studio.select_from_history(n - 1)?;
            return save_and_report(studio, &entry, &out);
        }
        HistoryCommand::ClearPrompts => {
            studio.clear_prompt_history();
            println!("Prompt history cleared");
        }
        HistoryCommand::ClearImages => {
            studio.clear_image_history();
            println!("Image history cleared");
        }
    }
    Ok(0)
}

fn generate_and_save(studio: &mut Studio, request: &PromptRequest, out: &Path) -> Result<i32> {
    match studio.generate(request) {
        Ok(entry) => save_and_report(studio, &entry, out),
        // validation failures exit 2 without the error prefix
        Err(err @ StudioError::Validation(_)) => {
            eprintln!("{err}");
            Ok(2)
        }
        Err(err) => Err(err.into()),
    }
}

fn save_and_report(studio: &Studio, entry: &ImageHistoryEntry, out: &Path) -> Result<i32> {
    let path = studio.save_current(out)?;
    println!("{}", path.display());
    tracing::info!(prompt = %entry.prompt, path = %path.display(), "image saved");
    Ok(0)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use clap::Parser;
    use studio_contracts::events::EventLog;
    use studio_contracts::prompts::{AspectRatio, CreateFunction, EditFunction, TextEffectStyle};
    use studio_contracts::storage::{HistoryStorage, MemoryStorage};
    use studio_engine::{DryrunProvider, ServiceRegistry, Studio, StudioConfig};

    use super::{dispatch, Cli, Command, HistoryCommand};

    fn dryrun_studio(temp: &tempfile::TempDir) -> Studio {
        let config = StudioConfig::from_lookup(|_| None)
            .with_data_dir(temp.path())
            .with_provider(Some("dryrun".to_string()));
        let mut services = ServiceRegistry::new();
        services.register(DryrunProvider);
        let storage: Arc<dyn HistoryStorage> = Arc::new(MemoryStorage::new());
        Studio::with_storage(
            config.clone(),
            services,
            storage,
            EventLog::new(config.events_path(), "cli-test"),
        )
    }

    #[test]
    fn create_flags_parse_wire_names() -> anyhow::Result<()> {
        let cli = Cli::try_parse_from([
            "studio-rs",
            "--provider",
            "dryrun",
            "create",
            "--function",
            "text-effect",
            "--ratio",
            "9:16",
            "--effect-text",
            "OPEN",
            "--effect-style",
            "3d",
        ])?;
        assert_eq!(cli.provider.as_deref(), Some("dryrun"));
        let Command::Create(args) = cli.command else {
            anyhow::bail!("expected create");
        };
        assert_eq!(args.function, CreateFunction::TextEffect);
        assert_eq!(args.ratio, AspectRatio::Portrait);
        assert_eq!(args.effect_style, TextEffectStyle::Metallic3d);
        Ok(())
    }

    #[test]
    fn unknown_function_is_rejected() {
        let parsed = Cli::try_parse_from([
            "studio-rs",
            "edit",
            "--function",
            "paint",
            "--image",
            "a.png",
        ]);
        assert!(parsed.is_err());
    }

    #[test]
    fn edit_defaults() -> anyhow::Result<()> {
        let cli = Cli::try_parse_from(["studio-rs", "edit", "--image", "a.png"])?;
        let Command::Edit(args) = cli.command else {
            anyhow::bail!("expected edit");
        };
        assert_eq!(args.function, EditFunction::AddRemove);
        assert_eq!(args.blur, 50);
        assert_eq!(args.image2, None);
        Ok(())
    }

    #[test]
    fn create_then_history_show_and_upscale() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let mut studio = dryrun_studio(&temp);
        let out_dir = temp.path().to_string_lossy().to_string();

        let cli = Cli::try_parse_from([
            "studio-rs",
            "create",
            "--prompt",
            "a red fox",
            "--function",
            "sticker",
            "--out",
            out_dir.as_str(),
        ])?;
        assert_eq!(dispatch(&mut studio, cli.command)?, 0);
        assert!(temp.path().join("a_red_fox.png").is_file());

        let upscaled = temp.path().join("upscaled.png");
        let upscaled_arg = upscaled.to_string_lossy().to_string();
        let cli = Cli::try_parse_from(["studio-rs", "upscale", "--out", upscaled_arg.as_str()])?;
        assert_eq!(dispatch(&mut studio, cli.command)?, 0);
        assert!(upscaled.is_file());
        assert_eq!(studio.image_history().len(), 2);

        let shown = temp.path().join("second.png");
        let command = Command::History {
            command: HistoryCommand::Show {
                n: 2,
                out: shown.clone(),
            },
        };
        assert_eq!(dispatch(&mut studio, command)?, 0);
        assert!(shown.is_file());
        Ok(())
    }

    #[test]
    fn blank_prompt_exits_with_validation_code() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let mut studio = dryrun_studio(&temp);
        let cli = Cli::try_parse_from(["studio-rs", "create"])?;
        assert_eq!(dispatch(&mut studio, cli.command)?, 2);
        assert!(studio.image_history().is_empty());
        Ok(())
    }

    #[test]
    fn upscale_with_empty_history_fails() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let mut studio = dryrun_studio(&temp);
        let cli = Cli::try_parse_from(["studio-rs", "upscale"])?;
        let err = dispatch(&mut studio, cli.command)
            .err()
            .ok_or_else(|| anyhow::anyhow!("expected failure"))?;
        assert!(err.to_string().contains("nothing to upscale"));
        Ok(())
    }
}
