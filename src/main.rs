use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use erastat::config::EngineConfig;
use erastat::device::fake::FakeBackend;
#[cfg(target_os = "linux")]
use erastat::device::linux::LinuxBackend;
use erastat::device::DeviceBackend;
use erastat::model::{Device, OperatorIdentity, Phase, TerminalStatus};
use erastat::progress::{progress_channel, CancellationToken};
use erastat::ui::ProgressBar;
use erastat::worker::Engine;
use std::io::{self, Write};
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "erastat")]
#[command(about = "Secure block-device erasure engine with signed attestation certificates")]
#[command(version = "0.1.0")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,

    /// Disable confirmation prompts and safety checks (DANGEROUS!)
    #[arg(long, global = true)]
    unsafe_mode: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// List detected non-system block devices
    List,

    /// Show the recommended wipe method and rationale for a device
    Recommend {
        /// Device path (e.g. /dev/sdb)
        device: String,
    },

    /// Erase a device, optionally signing a certificate afterwards
    Wipe {
        /// Device path (e.g. /dev/sdb)
        device: String,

        /// Wipe method: quick, dod3, dod7, gutmann35, or "auto" to use
        /// the recommended method
        #[arg(short, long, default_value = "auto")]
        method: String,

        /// Write the signed certificate to this operator identity's name
        #[arg(long)]
        operator_email: Option<String>,
    },

    /// Verify a previously issued certificate file
    Verify {
        /// Path to a certificate JSON file
        cert_path: String,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.debug {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("debug")).init();
    } else {
        env_logger::init();
    }

    let cancel = CancellationToken::new();
    setup_signal_handlers(cancel.clone())?;

    let config = EngineConfig::resolve_defaults();
    let backend: Box<dyn DeviceBackend> = make_backend();
    let engine = Arc::new(Engine::new(config, backend));

    match &cli.command {
        Commands::List => list_devices(&engine),
        Commands::Recommend { device } => recommend(&engine, device),
        Commands::Wipe {
            device,
            method,
            operator_email,
        } => wipe(&engine, device, method, operator_email.as_deref(), cancel, cli.unsafe_mode),
        Commands::Verify { cert_path } => verify(cert_path),
    }
}

#[cfg(target_os = "linux")]
fn make_backend() -> Box<dyn DeviceBackend> {
    Box::new(LinuxBackend::new())
}

#[cfg(not(target_os = "linux"))]
fn make_backend() -> Box<dyn DeviceBackend> {
    Box::new(FakeBackend::new(vec![]))
}

fn find_device(engine: &Engine, path: &str) -> Result<Device> {
    engine
        .enumerate_devices()?
        .into_iter()
        .find(|d| d.path == path)
        .ok_or_else(|| anyhow!("device not found: {path}"))
}

fn list_devices(engine: &Engine) -> Result<()> {
    let devices = engine.enumerate_devices().context("enumerating devices")?;
    if devices.is_empty() {
        println!("No non-system block devices detected.");
        return Ok(());
    }
    println!("{:<14} {:<20} {:<16} {:<10} {:<10}", "DEVICE", "MODEL", "SERIAL", "SIZE", "TYPE");
    println!("{}", "-".repeat(74));
    for d in devices {
        println!(
            "{:<14} {:<20} {:<16} {:<10} {:<10}",
            d.path,
            truncate(&d.model, 20),
            truncate(&d.serial, 16),
            human_gb(d.size_bytes),
            d.class.as_str(),
        );
    }
    Ok(())
}

fn recommend(engine: &Engine, device_path: &str) -> Result<()> {
    let device = find_device(engine, device_path)?;
    let (method, rationale) = engine.recommend_method(&device);
    println!("Recommended method: {}", method.canonical_name());
    println!("Rationale: {rationale}");
    Ok(())
}

fn wipe(
    engine: &Arc<Engine>,
    device_path: &str,
    method_arg: &str,
    operator_email: Option<&str>,
    cancel: CancellationToken,
    unsafe_mode: bool,
) -> Result<()> {
    let device = find_device(engine, device_path)?;

    let method = match method_arg {
        "auto" => engine.recommend_method(&device).0,
        other => parse_method(other, &engine.supported_methods(&device))?,
    };

    if !unsafe_mode {
        println!("\nThis will PERMANENTLY ERASE all data on {device_path}");
        println!("  Model: {}", device.model);
        println!("  Serial: {}", device.serial);
        println!("  Size: {}", human_gb(device.size_bytes));
        println!("  Method: {}", method.canonical_name());
        print!("\nType 'ERASE' to confirm: ");
        io::stdout().flush()?;
        let mut input = String::new();
        io::stdin().read_line(&mut input)?;
        if input.trim() != "ERASE" {
            println!("Operation cancelled.");
            return Ok(());
        }
    }

    let (sink, rx) = progress_channel();
    let engine_for_thread = Arc::clone(engine);
    let device_for_thread = device.clone();
    let method_for_thread = method.clone();
    let cancel_for_thread = cancel.clone();
    let handle = std::thread::spawn(move || {
        engine_for_thread.begin_wipe(device_for_thread, method_for_thread, cancel_for_thread, sink)
    });

    let mut bar = ProgressBar::new(40);
    for event in rx {
        let pct = if event.bytes_total > 0 {
            (event.bytes_done as f64 / event.bytes_total as f64) * 100.0
        } else {
            0.0
        };
        let label = match event.phase {
            Phase::Preparing => "preparing",
            Phase::Writing => "writing",
            Phase::Finalizing => "finalizing",
            Phase::Verifying => "verifying",
        };
        bar.render(pct, Some(event.bytes_done), Some(event.bytes_total), &format!("{label}: {}", event.message));
    }

    let result = handle.join().map_err(|_| anyhow!("worker thread panicked"))?;

    if result.share_degraded {
        eprintln!(
            "warning: exclusive access could not be obtained; wrote with shared-write access, \
             concurrent readers may have observed inconsistent data"
        );
    }

    match result.terminal_status {
        TerminalStatus::Completed => {
            bar.finish("wipe complete");
            if let Some(email) = operator_email {
                let operator = OperatorIdentity {
                    user_id: email.to_string(),
                    email: email.to_string(),
                };
                let signed = engine.build_certificate(&result, operator)?;
                println!("Certificate issued: {}", signed.certificate.cert_id);
            }
        }
        TerminalStatus::Cancelled => {
            bar.finish("wipe cancelled");
        }
        TerminalStatus::Failed => {
            bar.finish("wipe failed");
            return Err(anyhow!(
                "wipe failed: {}",
                result.failure_kind.unwrap_or_else(|| "unknown error".to_string())
            ));
        }
    }

    Ok(())
}

fn verify(cert_path: &str) -> Result<()> {
    let text = std::fs::read_to_string(cert_path).with_context(|| format!("reading {cert_path}"))?;
    let value: serde_json::Value = serde_json::from_str(&text)?;
    match erastat::crypto::certificate::verify_json(&value) {
        Ok(()) => {
            println!("Certificate signature valid.");
            Ok(())
        }
        Err(e) => Err(anyhow!("certificate verification failed: {e}")),
    }
}

fn parse_method(
    name: &str,
    supported: &[erastat::model::WipeMethod],
) -> Result<erastat::model::WipeMethod> {
    use erastat::model::WipeMethod;
    let candidate = match name.to_lowercase().as_str() {
        "quick" => WipeMethod::Quick,
        "dod3" => WipeMethod::DoD3,
        "dod7" => WipeMethod::DoD7,
        "gutmann35" => WipeMethod::Gutmann35,
        other => return Err(anyhow!("unknown method: {other}")),
    };
    if supported.contains(&candidate) {
        Ok(candidate)
    } else {
        Err(anyhow!("{} is not supported on this device", candidate.canonical_name()))
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.len() <= max {
        s.to_string()
    } else {
        format!("{}…", &s[..max.saturating_sub(1)])
    }
}

fn human_gb(bytes: u64) -> String {
    format!("{}GB", bytes / (1024 * 1024 * 1024))
}

fn setup_signal_handlers(cancel: CancellationToken) -> Result<()> {
    use signal_hook::{consts::SIGINT, iterator::Signals};

    let mut signals = Signals::new([SIGINT])?;
    std::thread::spawn(move || {
        for sig in signals.forever() {
            if sig == SIGINT {
                eprintln!("\ninterrupt received, cancelling after the current write completes...");
                cancel.cancel();
            }
        }
    });
    Ok(())
}
