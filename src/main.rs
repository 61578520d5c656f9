//! odoremover: command-line front end for the Odoremover processing client.
//!
//! Uploads a file for one backend operation, shows upload progress, and
//! downloads the processed result.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use anyhow::{bail, Context};

use odoremover_client::cli::{Cli, Command, ProcessArgs};
use odoremover_client::client::{CancelToken, ProgressCallback};
use odoremover_client::logging::init_tracing;
use odoremover_client::{
    AudioFile, ClientConfig, ProcessingClient, ProcessingRequest, SubmissionState,
};

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse_args();
    init_tracing(cli.verbose);

    let config = cli.apply_to(ClientConfig::from_env());
    if let Some(reason) = config.validate() {
        bail!("invalid configuration: {}", reason);
    }

    match &cli.command {
        Command::Url { reference } => {
            // Pure string construction; no backend needed.
            let client = ProcessingClient::new(config)?;
            println!("{}", client.resolve_download_url(reference));
            Ok(())
        }
        Command::Health => {
            let client = connect(&cli, config).await?;
            run_health(&client).await
        }
        Command::Download {
            reference,
            output_dir,
        } => {
            let client = connect(&cli, config).await?;
            let dir = output_dir
                .clone()
                .unwrap_or_else(|| client.config().effective_download_dir());
            let path = download_result(&client, reference, &dir).await?;
            eprintln!("Saved to: {}", path.display());
            Ok(())
        }
        _ => {
            let args = cli
                .process_args()
                .context("subcommand takes no input file")?
                .clone();
            let request = build_request(&cli.command, &args).await?;
            let client = connect(&cli, config).await?;
            run_processing(&client, request, &args).await
        }
    }
}

/// Resolves the backend once: direct when no fallbacks are given,
/// otherwise by probing the candidates in order.
async fn connect(cli: &Cli, config: ClientConfig) -> anyhow::Result<ProcessingClient> {
    if cli.fallbacks.is_empty() {
        return Ok(ProcessingClient::new(config)?);
    }
    let candidates = cli.candidates(&config);
    eprintln!("Probing {} backend candidates...", candidates.len());
    let client = ProcessingClient::discover(config, &candidates).await?;
    eprintln!("Using backend: {}", client.base_url());
    Ok(client)
}

/// Reads the input file(s) and builds the request for a subcommand.
async fn build_request(command: &Command, args: &ProcessArgs) -> anyhow::Result<ProcessingRequest> {
    let file = read_audio(&args.input).await?;

    let request = match command {
        Command::RemoveVocals { .. } => ProcessingRequest::remove_vocals(file),
        Command::PitchTempo { pitch, tempo, .. } => {
            ProcessingRequest::adjust_pitch_tempo(file, *pitch, *tempo)
        }
        Command::Convert { format, .. } => ProcessingRequest::convert_format(file, format.as_str()),
        Command::Cut { start, end, .. } => ProcessingRequest::cut(file, *start, *end),
        Command::Join { with, .. } => ProcessingRequest::join(file, read_audio(with).await?),
        Command::ReduceNoise { strength, .. } => ProcessingRequest::reduce_noise(file, *strength),
        Command::Health | Command::Url { .. } | Command::Download { .. } => {
            bail!("subcommand does not upload a file")
        }
    };

    Ok(args
        .extra_params()
        .into_iter()
        .fold(request, |request, (key, value)| request.with_param(key, value)))
}

async fn read_audio(path: &Path) -> anyhow::Result<AudioFile> {
    let file = AudioFile::from_path(path).await?;
    if file.is_empty() {
        bail!("{} is empty", path.display());
    }
    Ok(file)
}

/// Uploads, waits for the backend, then downloads or prints the result.
async fn run_processing(
    client: &ProcessingClient,
    request: ProcessingRequest,
    args: &ProcessArgs,
) -> anyhow::Result<()> {
    let operation = request.operation;
    let size_mb = request.upload_size() as f64 / (1024.0 * 1024.0);

    eprintln!("=== odoremover {} ===", operation);
    eprintln!("Backend: {}", client.base_url());
    eprintln!("Input: {} ({:.1} MB)", args.input.display(), size_mb);
    eprintln!();

    let cancel = CancelToken::new();
    let on_ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!();
            eprintln!("Cancelling...");
            on_ctrl_c.cancel();
        }
    });

    let state = Arc::new(Mutex::new(SubmissionState::default()));
    lock_state(&state).start();
    let on_progress = tracked_progress(Arc::clone(&state), percent_printer("Uploading"));

    let start_time = Instant::now();
    let outcome = client
        .submit_cancellable(request, Some(on_progress), &cancel)
        .await;
    let state = {
        let mut state = lock_state(&state);
        state.on_outcome(&outcome);
        state.clone()
    };
    let result = outcome?;

    eprintln!();
    eprintln!("Processing complete!");
    eprintln!("  Time: {:.2}s", start_time.elapsed().as_secs_f32());
    if let Some(message) = result.message() {
        eprintln!("  Backend: {}", message);
    }

    let reference = match state {
        SubmissionState::Succeeded {
            download_reference: Some(reference),
        } => reference,
        SubmissionState::Succeeded {
            download_reference: None,
        } => {
            eprintln!("  No downloadable file in response:");
            println!("{}", serde_json::to_string_pretty(&result.payload)?);
            return Ok(());
        }
        SubmissionState::Failed { kind, message } => bail!("[{}] {}", kind, message),
        other => bail!("unexpected submission state {:?}", other),
    };

    if args.no_download {
        println!("{}", client.resolve_download_url(&reference));
        return Ok(());
    }

    let dir = args
        .output_dir
        .clone()
        .unwrap_or_else(|| client.config().effective_download_dir());
    let path = download_result(client, &reference, &dir).await?;
    eprintln!("Saved to: {}", path.display());
    Ok(())
}

async fn run_health(client: &ProcessingClient) -> anyhow::Result<()> {
    let health = client.health().await?;
    let verdict = if health.is_healthy() { "healthy" } else { "unhealthy" };
    eprintln!("Backend {} is {}", client.base_url(), verdict);
    for name in health.service_names() {
        eprintln!("  service: {}", name);
    }
    println!("{}", serde_json::to_string_pretty(&health)?);
    if !health.is_healthy() {
        bail!("backend reported an unhealthy state");
    }
    Ok(())
}

async fn download_result(
    client: &ProcessingClient,
    reference: &str,
    dir: &Path,
) -> anyhow::Result<PathBuf> {
    eprint!("Downloading {}... ", reference);
    let path = client
        .download(reference, dir, Some(percent_printer("")))
        .await
        .with_context(|| format!("failed to download {}", reference))?;
    eprintln!("done");
    Ok(path)
}

fn lock_state(state: &Mutex<SubmissionState>) -> std::sync::MutexGuard<'_, SubmissionState> {
    state.lock().unwrap_or_else(|e| e.into_inner())
}

/// Folds upload percentages into `state` before forwarding them.
///
/// Announces the switch to `Processing` once the upload is fully sent.
fn tracked_progress(
    state: Arc<Mutex<SubmissionState>>,
    forward: ProgressCallback,
) -> ProgressCallback {
    Arc::new(move |percent: u8| {
        let entered_processing = {
            let mut state = lock_state(&state);
            let was_processing = *state == SubmissionState::Processing;
            state.on_progress(percent);
            !was_processing && *state == SubmissionState::Processing
        };
        forward(percent);
        if entered_processing {
            eprintln!("Upload complete, waiting for the backend...");
        }
    })
}

/// Prints every 10% step to stderr.
fn percent_printer(label: &'static str) -> ProgressCallback {
    let last = Arc::new(std::sync::atomic::AtomicU8::new(0));
    Arc::new(move |percent: u8| {
        let step = percent / 10 * 10;
        if step > 0 && step > last.fetch_max(step, std::sync::atomic::Ordering::SeqCst) {
            if label.is_empty() {
                eprint!("{}%... ", step);
            } else {
                eprintln!("{}: {}%", label, step);
            }
        }
    })
}
