use anyhow::Result;
use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use waypoint_exif::highlight::{HighlightResolver, KomootHighlightResolver};
use waypoint_exif::{config, exif, pipeline, record};

#[derive(Parser, Debug)]
#[command(
    name = "waypoint-exif",
    version,
    about = "Download tour photos and embed description, author, capture time and GPS as EXIF"
)]
struct Cli {
    /// Record JSON files or directories of them (JPEG files with --show-exif)
    #[arg(value_name = "PATH")]
    paths: Vec<PathBuf>,

    /// Output directory (default from config)
    #[arg(short, long, value_name = "DIR")]
    output: Option<PathBuf>,

    /// Path to config file (default: config.json next to binary)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Initialize a default config.json and exit
    #[arg(long)]
    init: bool,

    /// IANA time zone for capture timestamps, e.g. Europe/Berlin
    #[arg(short = 'z', long, value_name = "TZ")]
    timezone: Option<String>,

    /// JPEG quality (1-100) used when re-encoding PNGs
    #[arg(short, long, value_name = "1-100")]
    quality: Option<u8>,

    /// Keep the record's own description and author when a highlight lookup fails
    #[arg(long)]
    ignore_highlight_errors: bool,

    /// Display the embedded metadata of JPEG files and exit
    #[arg(long = "show-exif")]
    show_exif: bool,

    /// Output results as JSON
    #[arg(long)]
    json: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level))
        .format_timestamp(None)
        .init();

    // Handle --init
    if cli.init {
        let config = config::Config::default();
        let path = cli.config.as_deref();
        config.save(path)?;
        let save_path = match path {
            Some(p) => p.to_path_buf(),
            None => config::Config::config_path()?,
        };
        println!("Default config written to {}", save_path.display());
        return Ok(());
    }

    if cli.paths.is_empty() {
        anyhow::bail!("No input files or directories specified. Use --help for usage.");
    }

    // Handle --show-exif
    if cli.show_exif {
        let images = pipeline::collect_jpeg_files(&cli.paths);
        if images.is_empty() {
            anyhow::bail!("No JPEG files found in the specified paths.");
        }
        for image_path in &images {
            print_full_exif(image_path, cli.json)?;
        }
        return Ok(());
    }

    // Load config and apply CLI overrides
    let mut config = config::Config::load(cli.config.as_deref())?;
    if let Some(ref tz) = cli.timezone {
        config.timezone = tz.clone();
    }
    if let Some(q) = cli.quality {
        config.jpeg_quality = q;
    }
    if cli.ignore_highlight_errors {
        config.highlight.ignore_errors = true;
    }
    let output_dir = cli
        .output
        .clone()
        .unwrap_or_else(|| config.output.directory.clone());

    // Collect records
    let files = pipeline::collect_record_files(&cli.paths);
    if files.is_empty() {
        anyhow::bail!("No record files found in the specified paths.");
    }

    let mut records = Vec::new();
    for file in &files {
        let loaded = record::load_records(file)?;
        log::debug!("{}: {} record(s)", file.display(), loaded.len());
        records.extend(loaded);
    }
    if records.is_empty() {
        anyhow::bail!("The specified files contain no records.");
    }

    log::info!(
        "Found {} record(s), writing to {} ({})",
        records.len(),
        output_dir.display(),
        config.timezone
    );

    let resolver = build_resolver(&config)?;

    // Process each record
    let mut results = Vec::new();
    let total = records.len();

    for (i, rec) in records.into_iter().enumerate() {
        log::info!("[{}/{}] Processing: {}", i + 1, total, rec.id);

        let result = pipeline::process_record(rec, resolver.clone(), &config, &output_dir).await;

        if let Some(ref err) = result.error {
            log::error!("  Error: {err}");
        } else if result.written {
            log::info!("  Wrote: {}", result.output.display());
        }

        results.push(result);
    }

    // JSON output
    if cli.json {
        println!("{}", serde_json::to_string_pretty(&results)?);
    }

    // Summary
    let written = results.iter().filter(|r| r.written).count();
    let skipped = results.iter().filter(|r| r.skipped).count();
    let failed = results.iter().filter(|r| r.error.is_some()).count();
    log::info!(
        "Done: {written} written, {skipped} skipped, {failed} failed out of {total} records"
    );

    if failed > 0 {
        std::process::exit(1);
    }

    Ok(())
}

fn build_resolver(config: &config::Config) -> Result<Option<Arc<dyn HighlightResolver>>> {
    if !config.highlight.enabled {
        log::debug!("Highlight lookup disabled");
        return Ok(None);
    }

    let resolver = KomootHighlightResolver::with_timeout(
        &config.highlight.api_base,
        std::time::Duration::from_secs(config.fetch_timeout_secs),
    )?;
    log::debug!("Highlight lookup via {}", config.highlight.api_base);
    Ok(Some(Arc::new(resolver)))
}

// ANSI color codes
const DIM: &str = "\x1b[2m";
const RESET: &str = "\x1b[0m";
const BOLD: &str = "\x1b[1m";

/// Max width for the value column before wrapping.
const VAL_WIDTH: usize = 46;
/// Indent for continuation lines (tag column width + " : " = 25 chars + 2 leading spaces).
const INDENT: &str = "                           ";

/// Print the embedded metadata of a JPEG, as a table or as JSON.
fn print_full_exif(path: &Path, json: bool) -> Result<()> {
    let data = exif::read_exif(path)?;

    if json {
        let value = serde_json::json!({
            "path": path.display().to_string(),
            "exif": data,
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    println!();
    println!("{BOLD}File:{RESET} {}", path.display());
    println!("{DIM}{}{RESET}", "═".repeat(72));

    // --- Descriptive ---
    let desc_fields: Vec<(&str, Option<&str>)> = vec![
        ("ImageDescription", data.description.as_deref()),
        ("Artist", data.artist.as_deref()),
        ("DateTimeOriginal", data.date_time_original.as_deref()),
        ("CreateDate", data.create_date.as_deref()),
    ];
    if desc_fields.iter().any(|(_, v)| v.is_some()) {
        println!("  {BOLD}Descriptive Metadata{RESET}");
        println!("  {DIM}{}{RESET}", "─".repeat(70));
        for (tag, val) in &desc_fields {
            if let Some(v) = val {
                print_row(tag, v);
            }
        }
        println!();
    }

    // --- GPS ---
    if data.has_gps() {
        println!("  {BOLD}GPS{RESET}");
        println!("  {DIM}{}{RESET}", "─".repeat(70));
        if let Some(lat) = data.gps_latitude {
            print_row("GPSLatitude", &format!("{lat:.6}"));
        }
        if let Some(lon) = data.gps_longitude {
            print_row("GPSLongitude", &format!("{lon:.6}"));
        }
        if let Some(alt) = data.gps_altitude {
            print_row("GPSAltitude", &format!("{alt:.2} m"));
        }
        println!();
    }

    if data == exif::ExifData::default() {
        println!("  {DIM}(no EXIF metadata found){RESET}");
        println!();
    }

    Ok(())
}

/// Print a `tag : value` row, wrapping long values under the value column.
fn print_row(tag: &str, val: &str) {
    let mut lines = wrap_words(val, VAL_WIDTH).into_iter();
    println!("  {tag:<22} : {}", lines.next().unwrap_or_default());
    for line in lines {
        println!("  {INDENT}{line}");
    }
}

/// Greedy word wrap by character count. Words longer than `width` keep their own line.
fn wrap_words(text: &str, width: usize) -> Vec<String> {
    let mut lines: Vec<String> = Vec::new();

    for word in text.split_whitespace() {
        match lines.last_mut() {
            Some(line) if line.chars().count() + 1 + word.chars().count() <= width => {
                line.push(' ');
                line.push_str(word);
            }
            _ => lines.push(word.to_string()),
        }
    }

    lines
}
