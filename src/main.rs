use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use product_critique::{
    favicon_url, parse_analysis_sections, render_report_html, Analyzer, Config, ContextSource,
    Error, EXAMPLE_PRODUCTS,
};

#[derive(Parser)]
#[command(name = "product-critique")]
#[command(about = "Structured product breakdowns from a product name or URL")]
#[command(version)]
struct Cli {
    /// Path to a TOML config file
    #[arg(long, global = true, env = "PRODUCT_CRITIQUE_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze a product by name (e.g. "Figma") or URL
    Analyze {
        product: String,
        /// Write a standalone HTML report here instead of printing markdown
        #[arg(long, value_name = "OUT")]
        html: Option<PathBuf>,
    },
    /// Check whether a URL would be allowed through the fetch gate
    Check { url: String },
    /// Render a saved analysis (markdown) as an HTML report on stdout
    Render {
        file: PathBuf,
        /// Product name for the report heading (defaults to the file name)
        #[arg(long)]
        product: Option<String>,
    },
    /// List example products
    Examples,
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,product_critique=debug"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // a missing .env is fine
    dotenvy::dotenv().ok();
    init_logging();

    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Analyze { product, html } => analyze(&config, &product, html).await,
        Commands::Check { url } => {
            if config.gate.gate().is_safe_url(&url).await {
                println!("safe");
                Ok(ExitCode::SUCCESS)
            } else {
                println!("unsafe");
                Ok(ExitCode::FAILURE)
            }
        }
        Commands::Render { file, product } => {
            let markdown = std::fs::read_to_string(&file)
                .with_context(|| format!("reading {}", file.display()))?;
            let product = product.unwrap_or_else(|| {
                file.file_stem()
                    .map(|s| s.to_string_lossy().into_owned())
                    .unwrap_or_default()
            });
            let favicon = favicon_url(&config.gate.gate(), &product).await;
            print!("{}", render_report_html(&product, &markdown, favicon.as_deref()));
            Ok(ExitCode::SUCCESS)
        }
        Commands::Examples => {
            for product in EXAMPLE_PRODUCTS {
                println!("{}", product);
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}

async fn analyze(config: &Config, product: &str, html: Option<PathBuf>) -> Result<ExitCode> {
    let analysis = match Analyzer::from_config(config) {
        Ok(analyzer) => analyzer.analyze(product).await,
        Err(e) => Err(e),
    };

    let analysis = match analysis {
        Ok(analysis) => analysis,
        Err(e) => {
            eprintln!("{}", friendly_message(&e));
            return Ok(ExitCode::FAILURE);
        }
    };

    if analysis.context == ContextSource::Unavailable {
        eprintln!("Could not read that page. The analysis is based on the URL alone.");
    }

    match html {
        Some(out) => {
            let favicon = favicon_url(&config.gate.gate(), &analysis.product).await;
            let report = render_report_html(&analysis.product, &analysis.markdown, favicon.as_deref());
            std::fs::write(&out, report).with_context(|| format!("writing {}", out.display()))?;
            eprintln!("Report written to {}", out.display());
        }
        None => {
            let sections = parse_analysis_sections(&analysis.markdown);
            let body: Vec<&str> = sections.iter().map(|s| s.markdown.as_str()).collect();
            println!("{}", body.join("\n\n"));
        }
    }

    Ok(ExitCode::SUCCESS)
}

fn friendly_message(err: &Error) -> String {
    match err {
        Error::EmptyInput => "Please enter a product name or URL.".to_string(),
        Error::MissingApiKey => "No API key found. Set GOOGLE_API_KEY (or llm.api_key in the \
             config file). Get a free key at https://ai.google.dev"
            .to_string(),
        Error::InvalidApiKey => "Invalid API key. Check GOOGLE_API_KEY and try again. \
             Get a free key at https://ai.google.dev"
            .to_string(),
        Error::RateLimited { .. } => {
            "Rate limit or quota hit. Wait a minute and try again.".to_string()
        }
        Error::ResponseBlocked { .. } => {
            "The model declined to answer (safety filters). Try rephrasing the product name."
                .to_string()
        }
        Error::EmptyResponse => "The model didn't return any text. Try again.".to_string(),
        other => format!("Analysis failed: {}", other),
    }
}
