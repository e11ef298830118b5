mod app;
mod gl;
mod ui;

// Re-export so `crate::state` resolves to the lib crate everywhere in the binary.
pub use notebook_gui_lib::state;

use std::path::PathBuf;

use shared::{ImageSource, ViewerConfig, MAX_PAGE_COUNT};

use app::NotebookApp;
use state::ViewerSettings;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "notebook_gui=info,notebook_gui_lib=info".into()),
        )
        .init();

    let settings = ViewerSettings::load();
    let config = initial_config(parse_args(), &settings);

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .thread_name("notebook-io")
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            tracing::error!("Failed to start async runtime: {e}");
            return;
        }
    };

    let native_options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_title("Notebook Viewer")
            .with_inner_size([1100.0, 760.0])
            .with_min_inner_size([640.0, 420.0]),
        ..Default::default()
    };

    if let Err(e) = eframe::run_native(
        "notebook-gui",
        native_options,
        Box::new(move |cc| Ok(Box::new(NotebookApp::new(cc, config, settings, runtime)))),
    ) {
        tracing::error!("Failed to start application: {e}");
    }
}

#[derive(Debug, Default)]
struct CliArgs {
    pages: Option<u32>,
    image: Option<String>,
    config: Option<PathBuf>,
}

/// Parse `--pages <n>`, `--image <path-or-uri>` and `--config <file.json>`
fn parse_args() -> CliArgs {
    let args: Vec<String> = std::env::args().collect();
    let mut out = CliArgs::default();
    let mut i = 1;
    while i < args.len() {
        let value = args.get(i + 1);
        match (args[i].as_str(), value) {
            ("--pages", Some(v)) => match v.parse::<u32>() {
                Ok(n) => out.pages = Some(n),
                Err(e) => tracing::error!("Invalid --pages value {v}: {e}"),
            },
            ("--image", Some(v)) => out.image = Some(v.clone()),
            ("--config", Some(v)) => out.config = Some(PathBuf::from(v)),
            (flag, _) => {
                tracing::warn!("Ignoring argument {flag}");
                i += 1;
                continue;
            }
        }
        i += 2;
    }
    out
}

/// CLI wins over the config file, which wins over persisted settings
fn initial_config(args: CliArgs, settings: &ViewerSettings) -> ViewerConfig {
    let mut config = args
        .config
        .and_then(|path| match std::fs::read_to_string(&path) {
            Ok(json) => match ViewerConfig::from_json(&json) {
                Ok(config) => {
                    tracing::info!("Loaded config from {}", path.display());
                    Some(config)
                }
                Err(e) => {
                    tracing::error!("Failed to parse config {}: {e}", path.display());
                    None
                }
            },
            Err(e) => {
                tracing::error!("Failed to read config {}: {e}", path.display());
                None
            }
        })
        .unwrap_or_else(|| ViewerConfig::new(settings.ui.page_count));

    if let Some(pages) = args.pages {
        config.page_count = pages;
    }
    if let Some(image) = args.image {
        config.replacement_image = Some(ImageSource::uri(image));
    }
    if let Err(e) = config.validate() {
        tracing::warn!("{e}; clamping");
        config.page_count = config.page_count.clamp(1, MAX_PAGE_COUNT);
    }
    config
}
