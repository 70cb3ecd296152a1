//! Dump the current desktop state (windows, element tree, desktops) as JSON.

use clap::Parser;

#[derive(Parser)]
#[command(name = "agentdesk-state", about = "Dump the desktop snapshot as JSON")]
struct Args {
    /// Extract browser document text when the active window is a browser
    #[arg(long)]
    dom: bool,

    /// Compact JSON output (no pretty-printing)
    #[arg(long)]
    compact: bool,
}

#[cfg(windows)]
fn run(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    use agentdesk_core::desktop::{Desktop, SnapshotOptions};
    use agentdesk_core::platform::windows::WindowsPlatform;

    let desktop = Desktop::new(WindowsPlatform::new()?);
    let options = SnapshotOptions {
        use_dom: args.dom,
        ..Default::default()
    };
    let state = desktop.get_state(&options)?;

    let json = if args.compact {
        serde_json::to_string(&*state)?
    } else {
        serde_json::to_string_pretty(&*state)?
    };
    println!("{json}");
    Ok(())
}

#[cfg(windows)]
fn main() {
    env_logger::init();
    let args = Args::parse();
    if let Err(e) = run(args) {
        eprintln!("agentdesk-state: {e}");
        std::process::exit(1);
    }
}

#[cfg(not(windows))]
fn main() {
    let _ = Args::parse();
    eprintln!("agentdesk-state: the desktop backend is only available on Windows");
    std::process::exit(1);
}
