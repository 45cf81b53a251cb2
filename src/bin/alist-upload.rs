use alist_uploader::{
    logging, settings::parse_concurrency, ProgressSnapshot, TransferMode, UploadError, UploadFile,
    UploadManager, UploaderConfig,
};
use clap::Parser;
use std::{
    path::PathBuf,
    process::ExitCode,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};

/// Upload local files to an Alist server.
#[derive(Debug, Parser)]
#[command(name = "alist-upload", version)]
struct Cli {
    /// JSON config file; flags below override its values.
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[arg(long)]
    base_url: Option<String>,

    #[arg(short, long)]
    username: Option<String>,

    #[arg(short, long)]
    password: Option<String>,

    /// Remote folder to upload into.
    #[arg(short, long)]
    root: Option<String>,

    /// Create a YYYYMMDDHHMMSS subfolder for this batch.
    #[arg(long)]
    timestamp_folder: bool,

    /// Transfer mode: form or stream.
    #[arg(short, long)]
    mode: Option<TransferMode>,

    #[arg(short = 'j', long, value_parser = parse_concurrency)]
    concurrency: Option<usize>,

    /// Per-file request timeout in seconds.
    #[arg(long)]
    timeout: Option<u64>,

    #[arg(long)]
    debug: bool,

    /// Print progress snapshots as JSON lines.
    #[arg(long)]
    json: bool,

    #[arg(required = true)]
    files: Vec<PathBuf>,
}

impl Cli {
    fn build_config(&self) -> Result<UploaderConfig, UploadError> {
        let mut config = match &self.config {
            Some(path) => UploaderConfig::from_json_file(path)?,
            None => {
                let missing = |flag: &str| {
                    UploadError::Config(format!("--{flag} is required without --config"))
                };
                UploaderConfig::new(
                    self.base_url.as_deref().ok_or_else(|| missing("base-url"))?,
                    self.username.clone().ok_or_else(|| missing("username"))?,
                    self.password.clone().ok_or_else(|| missing("password"))?,
                )?
            }
        };
        if self.config.is_some() {
            if let Some(url) = &self.base_url {
                config = config.with_service_base_url(url)?;
            }
            if let Some(username) = &self.username {
                config = config.with_username(username.clone());
            }
            if let Some(password) = &self.password {
                config = config.with_password(password.clone());
            }
        }
        if let Some(root) = &self.root {
            config = config.with_root_folder(root);
        }
        if self.timestamp_folder {
            config = config.with_timestamp_folder(true);
        }
        if let Some(mode) = self.mode {
            config = config.with_transfer_mode(mode);
        }
        if let Some(limit) = self.concurrency {
            config = config.with_concurrency_limit(limit as i64);
        }
        if let Some(secs) = self.timeout.filter(|secs| *secs > 0) {
            config = config.with_request_timeout(Duration::from_secs(secs));
        }
        if self.debug {
            config = config.with_debug(true);
        }
        Ok(config)
    }
}

fn render_progress(snapshot: &ProgressSnapshot) -> String {
    snapshot
        .iter()
        .map(|(name, record)| format!("{name} {} {}", record.progress_text, record.speed_text))
        .collect::<Vec<_>>()
        .join(" | ")
}

async fn run(cli: Cli) -> Result<bool, UploadError> {
    let config = cli.build_config()?;
    logging::init(config.debug());

    let files = cli
        .files
        .iter()
        .map(UploadFile::from_path)
        .collect::<Result<Vec<_>, _>>()?;
    let manager = UploadManager::new(config)?;

    let json = cli.json;
    manager.on_progress(Arc::new(move |snapshot: &ProgressSnapshot| {
        if json {
            if let Ok(line) = serde_json::to_string(snapshot) {
                println!("{line}");
            }
        } else {
            eprint!("\r{}", render_progress(snapshot));
        }
    }));
    manager.on_error(Arc::new(|err: &UploadError| eprintln!("\nerror: {err}")));
    let succeeded = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&succeeded);
    manager.on_complete(Arc::new(move |ok: &bool| flag.store(*ok, Ordering::Release)));

    let aborter = manager.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\ninterrupted; cancelling upload");
            aborter.abort_upload();
        }
    });

    let folder = manager.upload_files(files).await?;
    eprintln!();
    if let Some(folder) = folder {
        println!("uploaded to {}{}", manager.config().service_base_url(), folder);
    }
    Ok(succeeded.load(Ordering::Acquire))
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => {
            eprintln!("some files failed to upload");
            ExitCode::from(2)
        }
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}
