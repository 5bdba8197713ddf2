use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use texview::bridge::WgpuBridge;
use texview::cache::{ThumbnailCache, ThumbnailStats};
use texview::config::{self, Config};
use texview::imaging::PixelBuffer;
use texview::output;
use texview::source::SourceImage;
use texview::texture::FileKind;
use texview::thumbnail::{ThumbnailOutcome, ThumbnailPipeline, ThumbnailStatus, WorkerGovernor};
use tracing::{Level, debug, info, warn};
use tracing_subscriber::{EnvFilter, fmt};
use walkdir::WalkDir;

/// How long the thumbs command sleeps between polls.
const POLL_INTERVAL: Duration = Duration::from_millis(10);

#[derive(Parser)]
#[command(name = "texview")]
#[command(about = "Inspect textures and build their thumbnail cache")]
#[command(long_about = "\
Inspect textures and build their thumbnail cache

Reads PNG, JPEG, TGA, BMP, GIF, TIFF and WebP images as well as DDS
textures (DXT1/3/5, uncompressed RGB(A), mip chains and cube maps).
Block-compressed textures are decoded on the GPU.

Thumbnails are cached on disk, keyed by file path, size, timestamps and
thumbnail size, so an unchanged file is only ever decoded once.

Run 'texview gen-config' to generate a documented config.toml.")]
#[command(version)]
struct Cli {
    /// Config file (default: <user config dir>/texview/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Thumbnail cache directory, overriding the config file
    #[arg(long, global = true)]
    cache_dir: Option<PathBuf>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Load an image and print what was loaded
    Info {
        file: PathBuf,
        /// Print the info record as JSON
        #[arg(long)]
        json: bool,
    },
    /// Write a loaded image out as PNG
    Export {
        file: PathBuf,
        out: PathBuf,
        /// Export the mip strip or cube cross instead of the base level
        #[arg(long)]
        alt: bool,
    },
    /// Generate thumbnails for files and directories
    Thumbs {
        #[arg(required = true)]
        paths: Vec<PathBuf>,
        /// Also write every thumbnail as PNG into this directory
        #[arg(long)]
        export: Option<PathBuf>,
    },
    /// Print a stock config.toml with all options documented
    GenConfig,
}

fn init_tracing(verbosity: u8) -> Result<()> {
    let level = match verbosity {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };
    let filter = EnvFilter::from_default_env()
        .add_directive(format!("texview={level}").parse()?)
        .add_directive("wgpu_core=warn".parse()?)
        .add_directive("wgpu_hal=warn".parse()?)
        .add_directive("naga=warn".parse()?);
    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose)?;

    match cli.command {
        Command::Info { file, json } => {
            let image = load_image(&file)?;
            if json {
                println!("{}", serde_json::to_string_pretty(image.info())?);
            } else {
                output::print_info(&file, image.info());
            }
        }
        Command::Export { file, out, alt } => {
            let mut image = load_image(&file)?;
            image.set_alt_enabled(alt);
            let picture = if alt {
                image.alt().context("image has no mip strip or cube cross")?
            } else {
                image.pictures().first().context("image has no pictures")?
            };
            save_png(picture, &out)?;
            info!(out = %out.display(), "exported {}x{}", picture.width(), picture.height());
        }
        Command::Thumbs { paths, export } => {
            let cfg = load_settings(cli.config.as_deref(), cli.cache_dir)?;
            run_thumbs(&cfg, &paths, export.as_deref())?;
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

/// Config from `--config` or the default location, with `--cache-dir` applied.
fn load_settings(path: Option<&Path>, cache_dir: Option<PathBuf>) -> Result<Config> {
    let path = path.map(Path::to_path_buf).or_else(config::default_config_path);
    let mut cfg = match path {
        Some(path) => config::load_config(&path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => Config::default(),
    };
    if cache_dir.is_some() {
        cfg.cache_dir = cache_dir;
    }
    Ok(cfg)
}

fn load_image(file: &Path) -> Result<SourceImage> {
    let mut image = SourceImage::new(file);
    image
        .load(&WgpuBridge::new())
        .with_context(|| format!("loading {}", file.display()))?;
    Ok(image)
}

fn save_png(picture: &PixelBuffer, out: &Path) -> Result<()> {
    let rgba = image::RgbaImage::from_raw(
        picture.width(),
        picture.height(),
        picture.to_rgba_top_down(),
    )
    .context("picture size does not match its pixel data")?;
    rgba.save_with_format(out, image::ImageFormat::Png)
        .with_context(|| format!("writing {}", out.display()))?;
    Ok(())
}

/// Every supported file under `paths`, directories walked recursively.
fn collect_sources(paths: &[PathBuf]) -> Vec<PathBuf> {
    let mut files = Vec::new();
    for path in paths {
        if path.is_dir() {
            files.extend(
                WalkDir::new(path)
                    .into_iter()
                    .filter_map(|entry| entry.ok())
                    .filter(|entry| entry.file_type().is_file())
                    .map(|entry| entry.into_path())
                    .filter(|p| FileKind::is_supported_path(p)),
            );
        } else {
            files.push(path.clone());
        }
    }
    files.sort();
    files
}

fn run_thumbs(cfg: &Config, paths: &[PathBuf], export: Option<&Path>) -> Result<()> {
    let cache_dir = config::resolve_cache_dir(cfg)?;
    let cores = config::logical_cores(&cfg.processing);
    let pipeline = ThumbnailPipeline::new(
        WorkerGovernor::for_cores(cores),
        ThumbnailCache::new(&cache_dir),
        Arc::new(WgpuBridge::new()),
        cfg.thumbnails.target(),
    );
    info!(
        cache = %cache_dir.display(),
        workers = pipeline.governor().limit(),
        "generating thumbnails"
    );

    let mut images: Vec<SourceImage> = collect_sources(paths)
        .into_iter()
        .map(SourceImage::new)
        .collect();
    let mut pending: Vec<usize> = (0..images.len()).collect();
    let mut stats = ThumbnailStats::default();

    while !pending.is_empty() {
        pending.retain(|&i| {
            let image = &mut images[i];
            if !image.is_thumbnail_requested() {
                // Refused requests are simply asked again next round.
                if !image.request_thumbnail(&pipeline) {
                    debug!(path = %image.path().display(), "deferred");
                }
                return true;
            }
            match image.poll_thumbnail() {
                ThumbnailStatus::NotRequested | ThumbnailStatus::Running => true,
                ThumbnailStatus::Ready | ThumbnailStatus::Failed => {
                    let outcome = image
                        .thumbnail_outcome()
                        .unwrap_or(ThumbnailOutcome::Failed);
                    stats.record(outcome);
                    output::print_thumb_line(image.path(), outcome);
                    false
                }
            }
        });
        if !pending.is_empty() {
            std::thread::sleep(POLL_INTERVAL);
        }
    }

    if let Some(dir) = export {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("creating {}", dir.display()))?;
        for image in &images {
            let (Some(thumb), Some(name)) = (image.thumbnail(), image.path().file_name()) else {
                continue;
            };
            let out = dir.join(format!("{}.png", name.to_string_lossy()));
            if let Err(e) = save_png(thumb, &out) {
                warn!("{e:#}");
            }
        }
    }

    output::print_summary(&stats);
    Ok(())
}
