use anyhow::{Context, Result};
use clap::Parser;
use sheetcount::{SheetCounterApp, SheetcountConfig};
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "sheetcount")]
#[command(about = "Count sheets leaving a machine from a stream of per-frame detections")]
#[command(version)]
#[command(long_about = "Reads per-frame object detections, tracks each sheet across frames and \
counts it once when its leading edge crosses the counting line. The running total is seeded \
from and mirrored to a persistent ledger so it survives restarts.")]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "sheetcount.toml", help = "Path to TOML configuration file")]
    config: String,

    /// Override the frame source from the configuration
    #[arg(short, long, value_name = "URI", help = "Frame source: '-' for stdin, a path or file:// uri")]
    source: Option<String>,

    /// Enable debug logging (most verbose)
    #[arg(short, long, help = "Enable debug level logging")]
    debug: bool,

    /// Enable verbose logging (info level)
    #[arg(short, long, help = "Enable verbose info level logging")]
    verbose: bool,

    /// Enable quiet mode (errors only)
    #[arg(short, long, help = "Enable quiet mode - only log errors")]
    quiet: bool,

    /// Validate configuration and exit
    #[arg(long, help = "Validate configuration file and exit without counting")]
    validate_config: bool,

    /// Print default configuration and exit
    #[arg(long, help = "Print default configuration in TOML format and exit")]
    print_config: bool,

    /// Override log format (json, pretty, compact)
    #[arg(long, value_name = "FORMAT", help = "Log output format: json, pretty, or compact")]
    log_format: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    if args.print_config {
        print_default_config()?;
        return Ok(());
    }

    init_logging(&args)?;

    info!("Starting sheetcount v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration file: {}", args.config);

    let mut config = SheetcountConfig::load_from_file(&args.config)
        .with_context(|| format!("Failed to load configuration from {}", args.config))?;

    if let Some(source) = args.source {
        config.stream.source = source;
    }

    if let Err(e) = config.validate() {
        error!("Configuration validation failed: {}", e);
        if args.validate_config {
            eprintln!("✗ Configuration validation failed: {}", e);
            std::process::exit(1);
        }
        return Err(e.into());
    }

    if args.validate_config {
        info!("Configuration validation successful");
        println!("✓ Configuration is valid");
        return Ok(());
    }

    let mut app = SheetCounterApp::new(config).map_err(|e| {
        error!("Failed to create sheet counter: {}", e);
        e
    })?;

    app.start().await.map_err(|e| {
        error!("Failed to start sheet counter: {}", e);
        e
    })?;

    let summary = app.run().await.map_err(|e| {
        error!("Sheet counter failed: {}", e);
        e
    })?;

    info!(
        "Stopped ({:?}): {} sheets counted this run, total {}, {} events persisted, {} dropped, {} failed",
        summary.reason,
        summary.sheets_counted,
        summary.final_total,
        summary.sink.persisted,
        summary.sink.dropped,
        summary.sink.failed
    );

    // Exit without waiting on a blocked standard input read in the runtime
    std::process::exit(0);
}

fn init_logging(args: &Args) -> Result<()> {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

    let log_level = if args.debug {
        "debug"
    } else if args.verbose {
        "info"
    } else if args.quiet {
        "error"
    } else {
        "warn"
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("sheetcount={}", log_level)));

    // Log records go to stderr; stdout carries the status line
    let fmt_layer = match args.log_format.as_deref() {
        Some("json") => fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true)
            .boxed(),
        Some("compact") => fmt::layer()
            .compact()
            .with_writer(std::io::stderr)
            .with_target(false)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false)
            .boxed(),
        Some("pretty") | None => fmt::layer()
            .pretty()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_thread_ids(args.debug)
            .with_file(args.debug)
            .with_line_number(args.debug)
            .boxed(),
        Some(format) => {
            eprintln!("Warning: Unknown log format '{}', using default", format);
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_thread_ids(args.debug)
                .with_file(args.debug)
                .with_line_number(args.debug)
                .boxed()
        }
    };

    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(env_filter)
        .try_init()
        .context("Failed to initialize logging")?;

    Ok(())
}

/// Print default configuration in TOML format
fn print_default_config() -> Result<()> {
    let rendered = toml::to_string_pretty(&SheetcountConfig::default())
        .context("Failed to render default configuration")?;

    println!("# sheetcount configuration file");
    println!("# Every value below is the built-in default. Environment variables");
    println!("# override it as SHEETCOUNT_<SECTION>__<KEY>, e.g. SHEETCOUNT_COUNTING__LINE_Y=320");
    println!();
    println!("{}", rendered);
    Ok(())
}
