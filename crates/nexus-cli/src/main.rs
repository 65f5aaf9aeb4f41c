//! Command line front end for Nexus Forge
//!
//! Composes workspace files into a preview document and drives the code
//! assistant against the configured generation backend. Generated text is
//! streamed to stdout as it arrives; Ctrl-C cancels the session and leaves
//! any output file untouched.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::LevelFilter;
use nexus_core::assistant::{GenerationOptions, Intent};
use nexus_core::config::{ConfigLoader, NexusConfig, ReasoningEffort};
use nexus_core::llm::create_backend;
use nexus_core::stream::{SessionHandle, StreamOutcome};
use nexus_core::{CodeAssistant, Language, NexusError, Workspace};
use std::io::Write;
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[clap(author, version, about = "Nexus - AI code workspace on the command line")]
struct Cli {
    #[clap(subcommand)]
    command: Commands,

    #[clap(long, short, global = true, help = "YAML configuration file")]
    config: Option<PathBuf>,

    #[clap(long, short, global = true, help = "Log level (overrides logging.level from the config)")]
    log_level: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Combine markup, stylesheet and script files into one preview document
    Compose {
        #[clap(required = true)]
        files: Vec<PathBuf>,

        #[clap(long, short, help = "Write the document here instead of stdout")]
        output: Option<PathBuf>,
    },
    /// Generate code from a natural language request
    Generate {
        #[clap(long, short)]
        prompt: String,

        #[clap(long, help = "Target language (defaults to the output file's extension)")]
        language: Option<String>,

        #[clap(long, short, help = "Write the finished code to this file")]
        out: Option<PathBuf>,

        #[clap(long)]
        temperature: Option<f32>,

        #[clap(long, value_parser = parse_reasoning)]
        reasoning: Option<ReasoningEffort>,
    },
    /// Explain the errors in a file and propose a fix
    Debug {
        file: PathBuf,

        #[clap(long)]
        language: Option<String>,
    },
    /// Interpret a spoken coding command
    Interpret {
        transcript: String,

        #[clap(long, help = "Generate code right away when the command asks to build something")]
        build: bool,
    },
}

fn parse_reasoning(value: &str) -> Result<ReasoningEffort, String> {
    match value.to_ascii_lowercase().as_str() {
        "low" => Ok(ReasoningEffort::Low),
        "high" => Ok(ReasoningEffort::High),
        other => Err(format!("unknown reasoning effort '{}', expected low or high", other)),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = ConfigLoader::load_or_default(cli.config.as_deref()).await?;
    init_logging(cli.log_level.as_deref(), &config)?;
    if let Some(path) = &cli.config {
        log::info!("Loaded configuration from {}", path.display());
    }

    match cli.command {
        Commands::Compose { files, output } => compose(files, output).await,
        Commands::Generate {
            prompt,
            language,
            out,
            temperature,
            reasoning,
        } => {
            let options = GenerationOptions {
                temperature,
                reasoning_effort: reasoning,
            };
            generate(&config, &prompt, language.as_deref(), out, options).await
        }
        Commands::Debug { file, language } => debug(&config, &file, language.as_deref()).await,
        Commands::Interpret { transcript, build } => interpret(&config, &transcript, build).await,
    }
}

fn init_logging(cli_level: Option<&str>, config: &NexusConfig) -> Result<()> {
    let level = cli_level.unwrap_or(&config.logging.level);
    let level_filter = level.parse().unwrap_or(LevelFilter::Info);

    let mut builder = env_logger::Builder::new();
    builder.filter_level(level_filter);
    if let Some(path) = &config.logging.file {
        let file = std::fs::File::create(path)
            .with_context(|| format!("Failed to open log file {}", path.display()))?;
        builder.target(env_logger::Target::Pipe(Box::new(file)));
    }
    builder.init();
    Ok(())
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Explicit language, then the file extension, then the configured default.
fn resolve_language(explicit: Option<&str>, path: Option<&Path>, config: &NexusConfig) -> Result<Language> {
    if let Some(name) = explicit {
        return Ok(name.parse()?);
    }
    Ok(path
        .and_then(|path| Language::from_file_name(&file_name(path)))
        .unwrap_or(config.workspace.default_language))
}

async fn compose(files: Vec<PathBuf>, output: Option<PathBuf>) -> Result<()> {
    let mut entries = Vec::with_capacity(files.len());
    for path in &files {
        let content = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let name = file_name(path);
        let language = Language::from_file_name(&name).unwrap_or(Language::Plaintext);
        log::debug!("Adding {} as {}", name, language);
        entries.push((name, language, content));
    }

    let workspace = Workspace::from_files(entries)?;
    let document = workspace.compose();
    for id in &document.ignored_markup {
        if let Some(file) = workspace.get(*id) {
            log::warn!("Only the first markup file is previewed; ignoring {}", file.name);
        }
    }

    match output {
        Some(path) => {
            tokio::fs::write(&path, document.as_str())
                .await
                .with_context(|| format!("Failed to write {}", path.display()))?;
            log::info!("Wrote preview document to {}", path.display());
        }
        None => print!("{}", document),
    }
    Ok(())
}

async fn generate(
    config: &NexusConfig,
    prompt: &str,
    language: Option<&str>,
    out: Option<PathBuf>,
    options: GenerationOptions,
) -> Result<()> {
    let language = resolve_language(language, out.as_deref(), config)?;
    let assistant = CodeAssistant::new(create_backend(&config.llm)?);

    let handle = assistant.generate_code_with(prompt, language, options, stdout_printer());
    let outcome = wait_interruptible(handle).await;
    println!();

    if let Some(path) = out {
        let mut workspace = Workspace::from_files([(file_name(&path), language, String::new())])?;
        let id = workspace.active_id();
        if CodeAssistant::write_back(&mut workspace, id, &outcome, None)? {
            tokio::fs::write(&path, &workspace.active().content)
                .await
                .with_context(|| format!("Failed to write {}", path.display()))?;
            log::info!("Wrote generated {} code to {}", language.display_name(), path.display());
        }
    }

    report(outcome)
}

async fn debug(config: &NexusConfig, file: &Path, language: Option<&str>) -> Result<()> {
    let code = tokio::fs::read_to_string(file)
        .await
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let language = resolve_language(language, Some(file), config)?;
    let assistant = CodeAssistant::new(create_backend(&config.llm)?);

    let handle = assistant.debug_code(&code, language, stdout_printer());
    let outcome = wait_interruptible(handle).await;
    println!();
    report(outcome)
}

async fn interpret(config: &NexusConfig, transcript: &str, build: bool) -> Result<()> {
    let assistant = CodeAssistant::new(create_backend(&config.llm)?);
    let command = assistant.interpret_command(transcript).await?;
    println!("{}", serde_json::to_string_pretty(&command)?);

    if build && command.intent == Intent::Build {
        let language = command.language().unwrap_or(config.workspace.default_language);
        log::info!("Building '{}' in {}", command.description, language);
        let handle = assistant.generate_code(&command.description, language, stdout_printer());
        let outcome = wait_interruptible(handle).await;
        println!();
        return report(outcome);
    }
    Ok(())
}

/// Prints only the text added since the previous update.
fn stdout_printer() -> impl FnMut(&str) + Send + 'static {
    let mut printed = 0;
    move |text: &str| {
        if let Some(fresh) = text.get(printed..) {
            let mut stdout = std::io::stdout().lock();
            let _ = stdout.write_all(fresh.as_bytes());
            let _ = stdout.flush();
        }
        printed = text.len();
    }
}

/// Waits for the session, cancelling it on Ctrl-C.
async fn wait_interruptible(handle: SessionHandle) -> Result<StreamOutcome, NexusError> {
    let canceller = handle.canceller();
    let watcher = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::warn!("Interrupted, cancelling generation");
            canceller.cancel();
        }
    });

    let outcome = handle.wait().await;
    watcher.abort();
    outcome
}

fn report(outcome: Result<StreamOutcome, NexusError>) -> Result<()> {
    match outcome? {
        StreamOutcome::Completed(_) => Ok(()),
        StreamOutcome::Cancelled => {
            eprintln!("Generation cancelled");
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_reasoning() {
        assert_eq!(parse_reasoning("HIGH").unwrap(), ReasoningEffort::High);
        assert!(parse_reasoning("medium").is_err());
    }

    #[test]
    fn test_resolve_language_order() {
        let config = NexusConfig::default();
        assert_eq!(
            resolve_language(Some("py"), Some(Path::new("x.html")), &config).unwrap(),
            Language::Python
        );
        assert_eq!(
            resolve_language(None, Some(Path::new("site/index.html")), &config).unwrap(),
            Language::Html
        );
        assert_eq!(
            resolve_language(None, None, &config).unwrap(),
            config.workspace.default_language
        );
        assert!(resolve_language(Some("klingon"), None, &config).is_err());
    }

    #[test]
    fn test_cli_parses_generate() {
        let cli = Cli::parse_from([
            "nexus",
            "--log-level",
            "debug",
            "generate",
            "--prompt",
            "a clock",
            "--out",
            "clock.html",
            "--reasoning",
            "high",
        ]);
        match cli.command {
            Commands::Generate { prompt, out, reasoning, .. } => {
                assert_eq!(prompt, "a clock");
                assert_eq!(out, Some(PathBuf::from("clock.html")));
                assert_eq!(reasoning, Some(ReasoningEffort::High));
            }
            other => panic!("unexpected command: {:?}", other),
        }
        assert_eq!(cli.log_level.as_deref(), Some("debug"));
    }
}
