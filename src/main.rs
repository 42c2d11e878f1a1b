mod app;
mod config;
mod fetch;
mod layout;
mod store;
mod theme;
mod ui;
mod widgets;

use anyhow::Result;
use clap::Parser;
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use std::{fs::File, io, path::PathBuf, sync::Arc, sync::Mutex};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use app::{App, Popup};
use config::{AppConfig, HotSource, Overrides};
use layout::WidgetOrder;
use store::{FileStore, SharedStore, WIDGET_ORDER_KEY};
use theme::Theme;

#[derive(Parser, Debug)]
#[command(name = "startpage")]
#[command(version = "0.1.0")]
#[command(about = "A personal start page for the terminal: clock, weather, hot search and more")]
struct Args {
    /// Config file (default: <config_dir>/startpage/config.toml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Settings store file (default: <data_dir>/startpage/storage.json)
    #[arg(long)]
    store: Option<PathBuf>,

    /// Directory holding city.json, holidays.json and nav.json
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Show the clock in 12-hour format
    #[arg(long)]
    twelve_hour: bool,

    /// Initial weather city
    #[arg(long)]
    city: Option<String>,

    /// Initial hot search source
    #[arg(long, value_enum)]
    hot_source: Option<HotSource>,

    /// Print the persisted widget order as JSON and exit
    #[arg(long)]
    print_layout: bool,

    /// Forget the persisted widget order before starting
    #[arg(long)]
    reset_layout: bool,
}

impl Args {
    fn overrides(&self) -> Overrides {
        Overrides {
            data_dir: self.data_dir.clone(),
            twelve_hour: self.twelve_hour,
            city: self.city.clone(),
            hot_source: self.hot_source,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();

    let args = Args::parse();

    let store = open_store(args.store.clone())?;

    // Handle CLI-only commands
    if args.print_layout {
        let order = WidgetOrder::load(store.as_ref());
        println!("{}", serde_json::to_string(&order.container_ids())?);
        return Ok(());
    }

    if args.reset_layout {
        store.remove(WIDGET_ORDER_KEY)?;
        tracing::info!("Widget order reset to default");
    }

    let mut config = AppConfig::load(args.config.as_deref())?;
    config.apply_overrides(&args.overrides());
    ui::init_theme(Theme::load(config.theme_file.as_deref()));

    run_tui(config, store).await
}

/// Log to `<cache_dir>/startpage/startpage.log`; the terminal belongs to the UI
fn init_logging() {
    let Some(dir) = dirs::cache_dir().map(|d| d.join("startpage")) else {
        return;
    };
    if std::fs::create_dir_all(&dir).is_err() {
        return;
    }
    let Ok(file) = File::options().create(true).append(true).open(dir.join("startpage.log")) else {
        return;
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(Mutex::new(file))
                .with_ansi(false),
        )
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
}

fn open_store(path: Option<PathBuf>) -> Result<SharedStore> {
    let path = path
        .or_else(FileStore::default_path)
        .ok_or_else(|| anyhow::anyhow!("Could not find data directory for the settings store"))?;
    tracing::info!("Using settings store {}", path.display());
    Ok(Arc::new(FileStore::open(path)))
}

async fn run_tui(config: AppConfig, store: SharedStore) -> Result<()> {
    // Create app state first so a bad start never leaves the terminal raw
    let mut app = App::new(config, store)?;

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // Main loop
    let result = run_app(&mut terminal, &mut app).await;
    app.shutdown();

    // Restore terminal
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    result
}

async fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
) -> Result<()> {
    loop {
        terminal.draw(|f| ui::draw(f, app))?;

        if event::poll(std::time::Duration::from_millis(100))? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    match key.code {
                        KeyCode::Char('q') if app.popup == Popup::None && !app.captures_input() => {
                            return Ok(())
                        }
                        KeyCode::Char('c') if key.modifiers.contains(event::KeyModifiers::CONTROL) => {
                            return Ok(())
                        }
                        _ => {
                            // Handle key and catch any errors to prevent crashes
                            if let Err(e) = app.handle_key(key) {
                                app.status_message = Some(format!("Error: {}", e));
                            }
                        }
                    }
                }
            }
        }

        // Let spawned fetches make progress between frames
        tokio::task::yield_now().await;
        app.tick();
    }
}
