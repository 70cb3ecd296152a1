//! Inject input actions: click, type, keys, scroll, drag, window ops.

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "agentdesk-input", about = "Inject desktop input actions")]
struct Args {
    #[command(subcommand)]
    action: Action,
}

#[derive(Subcommand)]
enum Action {
    /// Click at screen coordinates
    Click {
        x: i32,
        y: i32,
        /// left, right or middle
        #[arg(long, default_value = "left")]
        button: String,
        #[arg(long, default_value = "1")]
        clicks: u32,
    },
    /// Click to focus, then type text
    Type {
        x: i32,
        y: i32,
        text: String,
        /// Caret placement before typing: start, idle or end
        #[arg(long, default_value = "idle")]
        caret: String,
        /// Select-all + clear before typing
        #[arg(long)]
        clear: bool,
        /// Press Enter afterwards
        #[arg(long)]
        enter: bool,
    },
    /// Press a key combination, e.g. "ctrl+shift+t"
    Keys { combo: String },
    /// Scroll at the cursor (or given) position
    Scroll {
        #[arg(long)]
        x: Option<i32>,
        #[arg(long)]
        y: Option<i32>,
        /// up, down, left or right
        direction: String,
        #[arg(long, default_value = "3")]
        times: u32,
    },
    /// Drag with the left button held, optionally positioning the cursor
    /// first
    Drag {
        to_x: i32,
        to_y: i32,
        #[arg(long, requires = "from_y")]
        from_x: Option<i32>,
        #[arg(long, requires = "from_x")]
        from_y: Option<i32>,
    },
    /// Bring the window best matching a name to the foreground
    Switch { name: String },
    /// Launch an installed app by fuzzy name
    Launch { name: String },
}

#[cfg(windows)]
fn run(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    use agentdesk_core::desktop::Desktop;
    use agentdesk_core::platform::windows::WindowsPlatform;
    use agentdesk_core::platform::{CaretPosition, MouseButton, ScrollAxis, ScrollDirection};

    let desktop = Desktop::new(WindowsPlatform::new()?);
    let response = match args.action {
        Action::Click {
            x,
            y,
            button,
            clicks,
        } => desktop.click(x, y, MouseButton::parse(&button), clicks)?,
        Action::Type {
            x,
            y,
            text,
            caret,
            clear,
            enter,
        } => desktop.type_text(x, y, &text, CaretPosition::parse(&caret), clear, enter)?,
        Action::Keys { combo } => desktop.shortcut(&combo)?,
        Action::Scroll {
            x,
            y,
            direction,
            times,
        } => {
            let (axis, direction) = match direction.as_str() {
                "up" => (ScrollAxis::Vertical, ScrollDirection::Up),
                "down" => (ScrollAxis::Vertical, ScrollDirection::Down),
                "left" => (ScrollAxis::Horizontal, ScrollDirection::Left),
                "right" => (ScrollAxis::Horizontal, ScrollDirection::Right),
                other => return Err(format!("unknown scroll direction {other:?}").into()),
            };
            let at = match (x, y) {
                (Some(x), Some(y)) => Some((x, y)),
                _ => None,
            };
            desktop.scroll(at, axis, direction, times)?
        }
        Action::Drag {
            to_x,
            to_y,
            from_x,
            from_y,
        } => {
            if let (Some(x), Some(y)) = (from_x, from_y) {
                desktop.move_to(x, y)?;
            }
            desktop.drag((to_x, to_y))?
        }
        Action::Switch { name } => desktop.switch_to(&name)?,
        Action::Launch { name } => desktop.launch(&name)?,
    };

    println!("{}", response.text);
    if response.is_err() {
        std::process::exit(response.status);
    }
    Ok(())
}

#[cfg(windows)]
fn main() {
    env_logger::init();
    let args = Args::parse();
    if let Err(e) = run(args) {
        eprintln!("agentdesk-input: {e}");
        std::process::exit(1);
    }
}

#[cfg(not(windows))]
fn main() {
    let _ = Args::parse();
    eprintln!("agentdesk-input: the desktop backend is only available on Windows");
    std::process::exit(1);
}
