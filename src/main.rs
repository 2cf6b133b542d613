use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use indexmap::IndexMap;
use manuscript_screener::config::{
    find_config_file, load_config, OutputFormat, ScoreWeights, DEFAULT_CONFIG_FILE,
};
use manuscript_screener::filters::{classify, detect_language, language_name, TopicProfile};
use manuscript_screener::pipeline::StageEvent;
use manuscript_screener::ui::{self, Spinner, Status};
use manuscript_screener::{Screener, ScreeningConfig};
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Manuscript Screener - screen manuscript metadata before full-text review
#[derive(Parser, Debug)]
#[command(name = "manuscript-screener")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Screen batches of manuscript metadata with deduplication, language, article type and topic filters", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose logging (-v for debug, -vv for trace)
    #[arg(long, short, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Only log errors
    #[arg(long, short, global = true)]
    quiet: bool,

    /// Log output format
    #[arg(long, value_enum, global = true, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum LogFormat {
    /// Human-readable lines
    Text,
    /// One JSON object per event
    Json,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum ResultFormat {
    Csv,
    Json,
}

impl From<ResultFormat> for OutputFormat {
    fn from(format: ResultFormat) -> Self {
        match format {
            ResultFormat::Csv => OutputFormat::Csv,
            ResultFormat::Json => OutputFormat::Json,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the screening pipeline described by a configuration file
    Screen {
        /// Configuration file (defaults to ./screening.toml or the user config dir)
        #[arg(long, short)]
        config: Option<PathBuf>,

        /// Override the configured output format
        #[arg(long, value_enum)]
        output_format: Option<ResultFormat>,

        /// Skip the pause between consecutive AI-assisted filters
        #[arg(long)]
        no_cooldown: bool,
    },

    /// Detect the language of a piece of text
    #[command(alias = "lang")]
    DetectLanguage {
        /// Text to analyse
        text: String,
    },

    /// Classify a manuscript's article type
    Classify {
        /// Title and/or abstract text
        #[arg(required_unless_present = "file")]
        text: Option<String>,

        /// Read the text from a file instead
        #[arg(long, short, conflicts_with = "text")]
        file: Option<PathBuf>,
    },

    /// Score text against one or more topics
    Relevance {
        /// Topic description (repeatable)
        #[arg(long = "topic", short, required = true)]
        topics: Vec<String>,

        /// Minimum score for the text to count as relevant
        #[arg(long, default_value_t = 0.5)]
        min_score: f64,

        /// Abstract or other text to score
        text: String,
    },

    /// Write a starter configuration file
    Init {
        /// Destination path
        #[arg(default_value = DEFAULT_CONFIG_FILE)]
        path: PathBuf,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

fn init_tracing(cli: &Cli) {
    let level = match (cli.quiet, cli.verbose) {
        (true, _) => "error",
        (false, 0) => "info",
        (false, 1) => "debug",
        (false, _) => "trace",
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("manuscript_screener={}", level)));

    let registry = tracing_subscriber::registry().with(filter);
    match cli.log_format {
        LogFormat::Text => registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init(),
        LogFormat::Json => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .init(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli);

    match cli.command {
        Commands::Screen {
            config,
            output_format,
            no_cooldown,
        } => run_screen(config, output_format, no_cooldown).await,
        Commands::DetectLanguage { text } => {
            let code = detect_language(&text);
            println!("{} ({})", code, language_name(code));
            Ok(())
        }
        Commands::Classify { text, file } => {
            let text = match (text, file) {
                (_, Some(path)) => std::fs::read_to_string(&path)
                    .with_context(|| format!("Failed to read {}", path.display()))?,
                (Some(text), None) => text,
                (None, None) => bail!("provide TEXT or --file"),
            };
            ui::print_classification(&classify(&text));
            Ok(())
        }
        Commands::Relevance {
            topics,
            min_score,
            text,
        } => {
            if !(0.0..=1.0).contains(&min_score) {
                bail!("--min-score must be between 0 and 1");
            }
            let profile = TopicProfile::new(&topics).context("Invalid topics")?;
            let mut fields = IndexMap::new();
            fields.insert("abstract".to_string(), text);
            let score = profile
                .score(&fields, &ScoreWeights::default())
                .with_threshold(min_score);
            ui::print_relevance(&score);
            Ok(())
        }
        Commands::Init { path, force } => {
            if path.exists() && !force {
                bail!("{} already exists (use --force to overwrite)", path.display());
            }
            ScreeningConfig::starter()
                .save(&path)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            ui::print_status(
                Status::Success,
                format!("Wrote starter configuration to {}", path.display()),
            );
            Ok(())
        }
    }
}

async fn run_screen(
    config_path: Option<PathBuf>,
    output_format: Option<ResultFormat>,
    no_cooldown: bool,
) -> Result<()> {
    let config_path = match config_path.or_else(find_config_file) {
        Some(path) => path,
        None => bail!(
            "no configuration found; pass --config or run `manuscript-screener init`"
        ),
    };
    tracing::info!("Using config file: {}", config_path.display());

    let mut config = load_config(&config_path)
        .with_context(|| format!("Failed to load {}", config_path.display()))?;
    if let Some(format) = output_format {
        config.project.output_format = format.into();
    }

    let mut screener = Screener::new();
    if no_cooldown {
        screener = screener.with_cooldown(Duration::ZERO);
    }

    let spinner = Spinner::new("Loading records...");
    let on_event = |event: StageEvent| match event {
        StageEvent::Started { filter, uses_ai } => {
            let mode = if uses_ai { "AI-assisted" } else { "rule-based" };
            spinner.set_message(&format!("Running {} filter ({})...", filter, mode));
        }
        StageEvent::CoolingDown(delay) => {
            spinner.set_message(&format!("Cooling down for {}s...", delay.as_secs()));
        }
        StageEvent::Finished { filter, excluded } => {
            spinner.println(&format!(
                "{} {}: {} excluded",
                ui::status_icon(Status::Success),
                filter,
                excluded
            ));
        }
    };

    let report = match screener.screen_with_events(&config, on_event).await {
        Ok(report) => report,
        Err(e) => {
            spinner.finish_with_error("Screening failed");
            return Err(e).context("Screening failed");
        }
    };
    spinner.finish_with_success(&format!(
        "Screened {} records",
        ui::format_number(report.run.total_records)
    ));

    ui::print_section(if config.project.name.is_empty() {
        "Summary"
    } else {
        config.project.name.as_str()
    });
    println!("{}", ui::summary_table(&report.run));
    ui::print_status(
        Status::Info,
        format!("Results written to {}", report.output_path.display()),
    );
    if let Some(log) = &report.detail_log_path {
        ui::print_status(Status::Info, format!("Detailed log written to {}", log.display()));
    }

    Ok(())
}
