use std::path::{Path, PathBuf};

use clap::Parser;
use color_eyre::eyre::{Result, eyre};
use image::ImageFormat;
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use oxiload::application::{ImageLoader, ImageRequest, LoadResult};
use oxiload::domain::entities::SourceData;
use oxiload::domain::errors::RequestError;
use oxiload::infrastructure::image::{Blur, CenterCrop, Grayscale};
use oxiload::infrastructure::{AppConfig, CliArgs, ImageLoaderBuilder, StorageManager};

fn init_logging(config: &AppConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.to_string()));

    if let Some(log_path) = &config.log_path {
        if let Some(parent) = log_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(log_path)?;

        let file_layer = fmt::layer()
            .with_writer(file)
            .with_ansi(false)
            .with_target(true)
            .with_thread_names(true);

        tracing_subscriber::registry()
            .with(filter)
            .with(file_layer)
            .init();

        info!(path = %log_path.display(), "Logging initialized");
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_writer(std::io::stderr))
            .init();
    }

    Ok(())
}

fn load_config(args: &CliArgs) -> Result<AppConfig> {
    let storage = StorageManager::new()?;
    let mut config = storage.load_config(args.config.as_deref())?;
    config.merge_with_args(args);
    Ok(config)
}

fn source_data(source: &str) -> SourceData {
    if source.starts_with("http://") || source.starts_with("https://") {
        SourceData::Uri(source.to_string())
    } else {
        SourceData::File(PathBuf::from(source))
    }
}

fn build_request(
    loader: &ImageLoader,
    args: &CliArgs,
    source: &str,
) -> Result<ImageRequest, RequestError> {
    let mut request = loader.request(source_data(source))?;
    if let Some((width, height)) = args.size {
        request = request.size(width, height);
    }
    if let Some((width, height)) = args.crop {
        request = request.transform(CenterCrop::new(width, height));
    }
    if args.grayscale {
        request = request.transform(Grayscale);
    }
    if let Some(sigma) = args.blur {
        request = request.transform(Blur::new(sigma));
    }
    Ok(request)
}

fn write_output(dir: &Path, index: usize, result: &LoadResult) -> Result<()> {
    if let Some(loaded) = result.image() {
        let path = dir.join(format!("{index}.png"));
        loaded.image.save_with_format(&path, ImageFormat::Png)?;
        info!(path = %path.display(), "Wrote image");
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let args = CliArgs::parse();
    let config = load_config(&args)?;
    init_logging(&config)?;

    info!(version = oxiload::VERSION, "Starting oxiload");

    let loader = ImageLoaderBuilder::new(config.loader.clone()).build()?;
    if args.clear_cache {
        loader.clear_all_caches();
    }
    if let Some(out) = &args.out {
        std::fs::create_dir_all(out)?;
    }

    let (tx, mut rx) = mpsc::unbounded_channel::<(usize, LoadResult)>();
    let mut failed = 0usize;

    for (index, source) in args.sources.iter().enumerate() {
        let request = match build_request(&loader, &args, source) {
            Ok(request) => request,
            Err(e) => {
                eprintln!("{source}: {e}");
                failed += 1;
                continue;
            }
        };

        let on_load = tx.clone();
        let on_error = tx.clone();
        let on_cancelled = tx.clone();
        let request = request
            .on_load(move |image| {
                let _ = on_load.send((index, LoadResult::Loaded(image)));
            })
            .on_error(move |error| {
                let _ = on_error.send((index, LoadResult::Failed(error)));
            })
            .on_cancelled(move |reason| {
                let _ = on_cancelled.send((index, LoadResult::Cancelled(reason)));
            });

        if let Err(e) = loader.submit(request) {
            eprintln!("{source}: {e}");
            failed += 1;
        }
    }
    drop(tx);

    while let Some((index, result)) = rx.recv().await {
        let source = &args.sources[index];
        match &result {
            LoadResult::Loaded(loaded) => println!(
                "{source}: {}x{} from {}",
                loaded.image.width(),
                loaded.image.height(),
                loaded.source
            ),
            LoadResult::Failed(error) => {
                failed += 1;
                println!("{source}: failed: {error}");
            }
            LoadResult::Cancelled(reason) => {
                failed += 1;
                println!("{source}: cancelled ({reason})");
            }
        }
        if let Some(out) = &args.out
            && let Err(e) = write_output(out, index, &result)
        {
            warn!(source = %source, error = %e, "Failed to write output");
        }
    }

    loader.shutdown();

    if failed > 0 {
        return Err(eyre!("{failed} of {} images failed", args.sources.len()));
    }
    Ok(())
}
