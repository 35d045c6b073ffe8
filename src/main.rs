//! feedmux: a live, merged timeline of several accounts in the terminal.
//!
//! ## Architecture overview
//!
//! ```text
//! ┌──────────┐  PollMsg   ┌──────────┐  draw()  ┌──────────┐
//! │  poll.rs │ ─────────► │  app.rs  │ ───────► │  ui.rs   │
//! │  (task)  │  (channel) │ (state)  │          │ (render) │
//! └──────────┘            └──────────┘          └──────────┘
//!      │ Aggregator              ▲
//!      ▼ (library)               │ handle_key_event()
//!  fan-out per account      ┌──────────┐
//!                           │ input.rs │
//!                           └──────────┘
//! ```
//!
//! * **`cli`**: argument parsing and the one-shot commands.
//! * **`logging`**: tracing subscriber setup.
//! * **`poll`**: background task that re-aggregates all accounts.
//! * **`app`**: owns all view state (posts, failures, scroll position).
//! * **`ui`**: pure rendering: reads `App` state and draws widgets.
//! * **`input`**: maps key events to `App` mutations.
//! * **`main`**: wires everything together and runs the event loop.

mod app;
mod cli;
mod input;
mod logging;
mod poll;
mod ui;

use std::io;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use crossterm::{
    event::{self, Event},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::backend::CrosstermBackend;
use ratatui::Terminal;
use tokio::runtime::Runtime;

use app::App;
use cli::{Cli, Command, GlobalArgs, TimelineArgs};
use feedmux::Aggregator;

// ---------------------------------------------------------------------------
// RAII terminal guard
// ---------------------------------------------------------------------------

/// Manages terminal raw-mode and alternate-screen lifetime via [`Drop`].
///
/// Constructing this struct enters raw mode + alternate screen. Dropping it
/// (normally or during unwinding) restores the terminal.
struct TerminalGuard {
    terminal: Terminal<CrosstermBackend<io::Stdout>>,
}

impl TerminalGuard {
    fn new() -> Result<Self> {
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen)?;
        let backend = CrosstermBackend::new(stdout);
        let terminal = Terminal::new(backend)?;
        Ok(Self { terminal })
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
        let _ = execute!(self.terminal.backend_mut(), LeaveAlternateScreen);
        let _ = self.terminal.show_cursor();
    }
}

/// Install a panic hook that restores the terminal before printing the
/// panic message.
///
/// Only a panic on the main thread ends the UI. Panics in runtime workers
/// are already reported as failed fetches, so they are logged and the
/// terminal is left alone.
fn install_panic_hook() {
    let original_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        if owns_terminal(&std::thread::current()) {
            let _ = disable_raw_mode();
            let _ = execute!(io::stdout(), LeaveAlternateScreen);
            original_hook(info);
        } else {
            tracing::error!(panic = %info, "background task panicked");
        }
    }));
}

/// The draw loop runs on the main thread.
fn owns_terminal(thread: &std::thread::Thread) -> bool {
    thread.name() == Some("main")
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    let Cli { command, global } = Cli::parse();

    let interactive = matches!(&command, Command::Timeline(args) if !args.once);
    logging::init(global.log_file.as_deref(), global.verbose, interactive)?;

    let runtime = Runtime::new()?;

    match command {
        Command::Timeline(args) if !args.once => run_timeline(&runtime, args, &global),
        other => runtime.block_on(cli::run(other, &global)),
    }
}

/// The interactive timeline: a background poller on the tokio runtime and
/// a synchronous draw/input loop on the main thread.
fn run_timeline(runtime: &Runtime, args: TimelineArgs, global: &GlobalArgs) -> Result<()> {
    if !args.has_sources() {
        anyhow::bail!("give at least one handle, --id or --following");
    }

    let client = Arc::new(global.api_client()?);
    let config = args.poll_config();
    let known = match &args.following {
        Some(handle) => runtime.block_on(cli::followed_accounts(&client, handle))?,
        None => Vec::new(),
    };
    let aggregator = Aggregator::new(client.clone());
    let mut poller = poll::spawn(
        runtime.handle(),
        aggregator,
        client,
        args.handles,
        args.ids,
        known,
        config,
    );

    install_panic_hook();

    // -- terminal setup (RAII: Drop restores on exit or panic) ---------------
    let mut guard = TerminalGuard::new()?;
    let mut app = App::new();

    // -- main event loop -----------------------------------------------------
    // Runs at ~10 fps (100 ms tick). Each iteration:
    //   1. Drain any messages from the poller.
    //   2. Render the UI.
    //   3. Poll for keyboard input (non-blocking, up to tick_rate).
    let tick_rate = Duration::from_millis(100);

    loop {
        while let Ok(msg) = poller.rx.try_recv() {
            app.apply(msg);
        }

        guard.terminal.draw(|f| ui::draw(&mut app, f))?;

        if event::poll(tick_rate)? {
            if let Event::Key(key) = event::read()? {
                input::handle_key_event(&mut app, key);
            }
        }

        if app.take_refresh_request() {
            poller.refresh();
        }

        if app.quit {
            break;
        }
    }

    // `guard` is dropped here, restoring the terminal.
    Ok(())
}
