#![allow(clippy::uninlined_format_args)]

use anyhow::{Result, anyhow};
use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::{Shell, generate};
use log::{Level, LevelFilter, Log, Metadata, Record, SetLoggerError, info, warn};
use std::io::Write;
use std::path::{Path, PathBuf};

use subtx::app_config::{self, Config, TranslationProvider};
use subtx::app_controller::{Controller, FileOutcome};
use subtx::storage::Settings;
use subtx::translation::GlossaryIndex;

/// CLI Wrapper for TranslationProvider to implement ValueEnum
#[derive(Debug, Clone, ValueEnum)]
enum CliTranslationProvider {
    #[value(name = "deepseek")]
    DeepSeek,
    #[value(name = "openai")]
    OpenAI,
    Anthropic,
    #[value(name = "lmstudio")]
    LMStudio,
}

impl From<CliTranslationProvider> for TranslationProvider {
    fn from(cli_provider: CliTranslationProvider) -> Self {
        match cli_provider {
            CliTranslationProvider::DeepSeek => TranslationProvider::DeepSeek,
            CliTranslationProvider::OpenAI => TranslationProvider::OpenAI,
            CliTranslationProvider::Anthropic => TranslationProvider::Anthropic,
            CliTranslationProvider::LMStudio => TranslationProvider::LMStudio,
        }
    }
}

/// CLI Wrapper for LogLevel to implement ValueEnum
#[derive(Debug, Clone, ValueEnum)]
enum CliLogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<CliLogLevel> for app_config::LogLevel {
    fn from(cli_level: CliLogLevel) -> Self {
        match cli_level {
            CliLogLevel::Error => app_config::LogLevel::Error,
            CliLogLevel::Warn => app_config::LogLevel::Warn,
            CliLogLevel::Info => app_config::LogLevel::Info,
            CliLogLevel::Debug => app_config::LogLevel::Debug,
            CliLogLevel::Trace => app_config::LogLevel::Trace,
        }
    }
}

/// subtx - batch subtitle translation through LLM chat endpoints
#[derive(Parser, Debug)]
#[command(name = "subtx")]
#[command(version)]
#[command(about = "Translate SRT subtitles with an LLM, one output line per input line")]
#[command(long_about = "subtx translates SRT subtitle files in batches through an LLM chat endpoint.
Every translated line is tied back to its source index; lines the model drops are
marked and retried, and proper nouns are kept consistent through a glossary.

EXAMPLES:
    subtx translate movie.srt                    # Translate using default config
    subtx translate -f movie.srt                 # Overwrite an existing translation
    subtx translate -p openai -m gpt-4o /subs/   # Translate every .srt below a folder
    subtx translate -s en -t fr movie.en.srt     # English to French, writes movie.fr.srt
    subtx glossary set Rome 罗马                  # Fix a glossary entry
    subtx glossary rename Rome 羅馬 --srt movie.zh.srt
    subtx settings set-key sk-...                # Persist the API key
    subtx completions bash > subtx.bash

CONFIGURATION:
    Configuration is stored in conf.json by default. If the file doesn't exist,
    a default one is created. API key and custom instruction fall back to the
    values stored with `subtx settings`.")]
struct CommandLineOptions {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path
    #[arg(short, long, global = true, default_value = "conf.json")]
    config_path: PathBuf,

    /// Set logging level
    #[arg(short, long, global = true, value_enum)]
    log_level: Option<CliLogLevel>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Translate an SRT file or every SRT file in a folder
    Translate(TranslateArgs),

    /// Inspect and edit the proper-noun glossary
    #[command(subcommand)]
    Glossary(GlossaryCommand),

    /// Manage persisted settings
    #[command(subcommand)]
    Settings(SettingsCommand),

    /// Generate shell completions for subtx
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Parser, Debug)]
struct TranslateArgs {
    /// Input SRT file or directory to process
    #[arg(value_name = "INPUT_PATH")]
    input_path: PathBuf,

    /// Force overwrite of existing output files
    #[arg(short, long)]
    force_overwrite: bool,

    /// Translation provider to use
    #[arg(short, long, value_enum)]
    provider: Option<CliTranslationProvider>,

    /// Model name to use for translation
    #[arg(short, long)]
    model: Option<String>,

    /// Source language code (e.g., 'en', 'es', 'fr')
    #[arg(short, long)]
    source_language: Option<String>,

    /// Target language code (e.g., 'en', 'es', 'fr')
    #[arg(short, long)]
    target_language: Option<String>,

    /// Segments per request
    #[arg(short, long)]
    batch_size: Option<usize>,

    /// Context segments shown on each side of a batch
    #[arg(long)]
    context_size: Option<usize>,
}

#[derive(Subcommand, Debug)]
enum GlossaryCommand {
    /// Print every term
    List,
    /// Set a term's translation without touching any file
    Set { term: String, translation: String },
    /// Change a term's translation and replace the old one in a translated file
    Rename {
        term: String,
        translation: String,
        /// Translated SRT file to update
        #[arg(long)]
        srt: Option<PathBuf>,
    },
    /// Remove a term
    Remove { term: String },
    /// Remove every term
    Clear,
}

#[derive(Subcommand, Debug)]
enum SettingsCommand {
    /// Persist the API key used when the config leaves it empty
    SetKey { key: String },
    /// Persist a custom tone/register instruction; an empty value removes it
    SetInstruction { instruction: String },
    /// Remove every persisted setting and the glossary
    Clear,
}

// @struct: Custom logger implementation
struct CustomLogger {
    level: LevelFilter,
}

impl CustomLogger {
    fn new(level: LevelFilter) -> Self {
        CustomLogger { level }
    }

    // @initializes: Global logger
    fn init(level: LevelFilter) -> Result<(), SetLoggerError> {
        log::set_boxed_logger(Box::new(CustomLogger::new(level)))?;
        log::set_max_level(level);
        Ok(())
    }

    // @returns: ANSI colour of a level
    fn color_for_level(level: Level) -> &'static str {
        match level {
            Level::Error => "1;31",
            Level::Warn => "1;33",
            Level::Info => "1;32",
            Level::Debug => "1;36",
            Level::Trace => "1;35",
        }
    }
}

impl Log for CustomLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level && metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            let now = chrono::Local::now().format("%H:%M:%S.%3f");
            let _ = writeln!(
                std::io::stderr(),
                "\x1B[{}m{} {:<5} {}\x1B[0m",
                Self::color_for_level(record.level()),
                now,
                record.level(),
                record.args()
            );
        }
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Install at the most verbose level; the effective level is the global max
    CustomLogger::init(LevelFilter::Trace)?;
    log::set_max_level(LevelFilter::Info);

    let cli = CommandLineOptions::parse();
    if let Some(level) = &cli.log_level {
        let level: app_config::LogLevel = level.clone().into();
        log::set_max_level(level.to_level_filter());
    }

    match cli.command {
        Commands::Completions { shell } => {
            let mut cmd = CommandLineOptions::command();
            generate(shell, &mut cmd, "subtx", &mut std::io::stdout());
            Ok(())
        }
        Commands::Translate(args) => {
            let config = load_config(&cli.config_path, cli.log_level.is_some())?;
            run_translate(config, args).await
        }
        Commands::Glossary(command) => {
            let config = load_config(&cli.config_path, cli.log_level.is_some())?;
            run_glossary(&config, command)
        }
        Commands::Settings(command) => {
            let config = load_config(&cli.config_path, cli.log_level.is_some())?;
            run_settings(&config, command)
        }
    }
}

fn load_config(config_path: &Path, log_level_from_cli: bool) -> Result<Config> {
    let config = Config::load_or_create(config_path)?;
    if !log_level_from_cli {
        log::set_max_level(config.log_level.to_level_filter());
    }
    Ok(config)
}

async fn run_translate(mut config: Config, options: TranslateArgs) -> Result<()> {
    if let Some(provider) = options.provider {
        config.translation.provider = provider.into();
    }
    if let Some(model) = &options.model {
        config.translation.set_model(model);
    }
    if let Some(source_lang) = options.source_language {
        config.source_language = source_lang;
    }
    if let Some(target_lang) = options.target_language {
        config.target_language = target_lang;
    }
    if let Some(batch_size) = options.batch_size {
        config.translation.common.batch_size = batch_size;
    }
    if let Some(context_size) = options.context_size {
        config.translation.common.context_size = context_size;
    }

    let controller = Controller::with_config(config)?;

    if options.input_path.is_file() {
        let output_dir = options.input_path.parent().unwrap_or(Path::new(".")).to_path_buf();
        if let FileOutcome::Translated { report, .. } = controller
            .run(&options.input_path, &output_dir, options.force_overwrite)
            .await?
        {
            info!(
                "{} translated, {} missing, {} new glossary terms",
                report.translated,
                report.missing,
                report.accepted_terms.len()
            );
        }
    } else if options.input_path.is_dir() {
        let summary = controller.run_folder(&options.input_path, options.force_overwrite).await?;
        if summary.failed > 0 {
            return Err(anyhow!("{} files failed to translate", summary.failed));
        }
    } else {
        return Err(anyhow!("Input path does not exist: {:?}", options.input_path));
    }

    Ok(())
}

fn run_glossary(config: &Config, command: GlossaryCommand) -> Result<()> {
    let store = Controller::open_store(&config.storage)?;
    let mut glossary = GlossaryIndex::load(store);

    match command {
        GlossaryCommand::List => {
            if glossary.is_empty() {
                println!("Glossary is empty");
            }
            for (term, translation) in glossary.entries() {
                println!("{} => {}", term, translation);
            }
        }
        GlossaryCommand::Set { term, translation } => {
            glossary.update(&term, &translation)?;
            info!("Set '{}' => '{}'", term, translation);
        }
        GlossaryCommand::Rename { term, translation, srt } => {
            let changed = Controller::rename_glossary_term(&mut glossary, &term, &translation, srt.as_deref())?;
            info!("Renamed '{}' => '{}' ({} subtitle entries updated)", term, translation, changed);
        }
        GlossaryCommand::Remove { term } => match glossary.remove(&term)? {
            Some(previous) => info!("Removed '{}' (was '{}')", term, previous),
            None => warn!("'{}' is not in the glossary", term),
        },
        GlossaryCommand::Clear => {
            glossary.clear()?;
            info!("Glossary cleared");
        }
    }

    Ok(())
}

fn run_settings(config: &Config, command: SettingsCommand) -> Result<()> {
    let settings = Settings::new(Controller::open_store(&config.storage)?);

    match command {
        SettingsCommand::SetKey { key } => {
            settings.set_api_key(&key)?;
            info!("API key saved");
        }
        SettingsCommand::SetInstruction { instruction } => {
            settings.set_custom_instruction(&instruction)?;
            info!("Custom instruction saved");
        }
        SettingsCommand::Clear => {
            settings.clear_all()?;
            info!("Settings cleared");
        }
    }

    Ok(())
}
