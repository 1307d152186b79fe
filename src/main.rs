use clap::{Parser, Subcommand};
use image_convert::batch::{BatchRunner, CancelToken};
use image_convert::codec::{Quality, RustCodec};
use image_convert::config::{self, ConvertConfig};
use image_convert::format::Format;
use image_convert::output;
use image_convert::policy::AnimationPolicy;
use std::path::{Path, PathBuf};

/// Flags of the `convert` command. Each one overrides its config key.
#[derive(clap::Args, Clone)]
struct ConvertArgs {
    /// Image files or directories (directories are not searched recursively)
    #[arg(required = true)]
    paths: Vec<PathBuf>,

    /// Target format: jpeg, png, gif, bmp, tiff, webp or ico
    #[arg(long)]
    to: Option<Format>,

    /// Quality 0-100, or low (50), medium (85), high (100)
    #[arg(long)]
    quality: Option<Quality>,

    /// What to do with animated sources when the target cannot animate
    #[arg(long, value_enum)]
    animation: Option<AnimationPolicy>,

    /// Write outputs here instead of next to each source
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Number of parallel workers
    #[arg(short, long)]
    jobs: Option<usize>,

    /// Replace existing files instead of adding a numeric suffix
    #[arg(long)]
    overwrite: bool,

    /// Write the batch report as JSON to this file
    #[arg(long)]
    report: Option<PathBuf>,
}

#[derive(Parser)]
#[command(name = "image-convert")]
#[command(about = "Batch image format converter")]
#[command(long_about = "\
Batch image format converter

Converts images between JPEG, PNG, GIF, BMP, TIFF, WebP and ICO. Animated
sources stay animated when the target can hold an animation (GIF, WebP);
otherwise --animation decides:

  auto / force-first-frame   keep the first frame
  force-split                one file per frame (name_0000.png, ...)
  skip-if-animated           leave the source alone

Outputs are written next to each source (or to --output-dir) and never
replace a source image. Directories convert into <dir>_converted/.

Run 'image-convert gen-config' to generate a documented image-convert.toml.")]
#[command(version)]
struct Cli {
    /// Config file [default: image-convert.toml if present]
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Debug logging (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Convert images to another format
    Convert(ConvertArgs),
    /// List supported formats and what each can hold
    Formats,
    /// Print a stock image-convert.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "image_convert=debug".to_string()
        } else {
            "image_convert=info".to_string()
        }
    });
    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Command::Convert(args) => {
            let config = resolve_config(cli.config.as_deref(), &args)?;
            convert(&config, args)?;
        }
        Command::Formats => {
            output::print_capability_table();
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

/// Load the config file and apply command-line overrides on top.
///
/// An explicitly named config file must exist; the default one is optional.
fn resolve_config(
    path: Option<&Path>,
    args: &ConvertArgs,
) -> Result<ConvertConfig, Box<dyn std::error::Error>> {
    let mut config = match path {
        Some(path) if !path.exists() => {
            return Err(format!("Config file not found: {}", path.display()).into());
        }
        Some(path) => config::load_config(path)?,
        None => config::load_config(Path::new(config::DEFAULT_CONFIG_FILE))?,
    };

    let conversion = &mut config.conversion;
    if let Some(format) = args.to {
        conversion.format = format;
    }
    if let Some(quality) = args.quality {
        conversion.quality = quality.value() as u32;
    }
    if let Some(animation) = args.animation {
        conversion.animation = animation;
    }
    if let Some(dir) = &args.output_dir {
        conversion.output_dir = Some(dir.clone());
    }
    conversion.overwrite |= args.overwrite;

    config.validate()?;
    Ok(config)
}

fn convert(config: &ConvertConfig, args: ConvertArgs) -> Result<(), Box<dyn std::error::Error>> {
    let target = config.target_spec();
    let concurrency = args
        .jobs
        .unwrap_or_else(|| config::effective_threads(&config.processing));

    // Ctrl-C stops dispatch; running conversions finish and the report is
    // still printed. Pressing it again exits at once.
    let cancel = CancelToken::new();
    cancel.cancel_on_interrupt()?;

    let (tx, rx) = std::sync::mpsc::channel();
    let printer = std::thread::spawn(move || {
        for event in rx {
            output::print_batch_event(&event);
        }
    });

    let codec = RustCodec::new();
    let result = BatchRunner::new(&codec)
        .overwrite_existing(config.conversion.overwrite)
        .with_cancel(cancel)
        .with_events(tx)
        .submit(
            &args.paths,
            target,
            config.conversion.output_dir.as_deref(),
            concurrency,
        );
    printer
        .join()
        .map_err(|_| "progress printer thread panicked")?;
    let report = result?;

    output::print_summary(&report.summary());
    if let Some(path) = &args.report {
        std::fs::write(path, report.into_submission_order().to_json()?)?;
    }
    Ok(())
}
