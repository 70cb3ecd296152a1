//! Capture the desktop as a PNG, optionally annotated with numbered
//! element boxes.

use clap::Parser;

#[derive(Parser)]
#[command(
    name = "agentdesk-screenshot",
    about = "Capture the desktop as a PNG file"
)]
struct Args {
    /// Output file path
    #[arg(long, default_value = "screenshot.png")]
    out: String,

    /// Draw numbered boxes around interactive elements
    #[arg(long)]
    annotate: bool,

    /// Extra down-scale multiplier (0 < scale <= 1)
    #[arg(long, default_value = "1.0")]
    scale: f64,
}

#[cfg(windows)]
fn run(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    use agentdesk_core::desktop::{Desktop, Screenshot, SnapshotOptions};
    use agentdesk_core::platform::windows::WindowsPlatform;

    let desktop = Desktop::new(WindowsPlatform::new()?);
    let options = SnapshotOptions {
        use_vision: true,
        use_annotation: args.annotate,
        as_bytes: true,
        scale: args.scale,
        ..Default::default()
    };
    let state = desktop.get_state(&options)?;

    match state.screenshot.as_ref() {
        Some(Screenshot::Png(bytes)) => {
            std::fs::write(&args.out, bytes)?;
            eprintln!("wrote {} ({} bytes)", args.out, bytes.len());
            Ok(())
        }
        _ => Err("no screenshot in snapshot".into()),
    }
}

#[cfg(windows)]
fn main() {
    env_logger::init();
    let args = Args::parse();
    if let Err(e) = run(args) {
        eprintln!("agentdesk-screenshot: {e}");
        std::process::exit(1);
    }
}

#[cfg(not(windows))]
fn main() {
    let _ = Args::parse();
    eprintln!("agentdesk-screenshot: the desktop backend is only available on Windows");
    std::process::exit(1);
}
