use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use crossterm::event::{Event, KeyEventKind};
use ratatui::DefaultTerminal;
use tokio::sync::mpsc;

use tickflow::config::Config;
use tickflow::event::{ChannelRenderer, RenderEvent};
use tickflow::input::{parse_main_command, InstrumentPrompt, PromptOutcome, UiCommand};
use tickflow::instrument::InstrumentCode;
use tickflow::session::{ControlIntent, SessionConfig, SessionController};
use tickflow::supervisor::{ChildProcessSupervisor, DetachedSupervisor, Supervisor};
use tickflow::tick_store::SqliteConnector;
use tickflow::ui::{self, AppState};

#[derive(Debug, Default)]
struct CliArgs {
    instrument: Option<String>,
    detached: bool,
}

impl CliArgs {
    fn parse(args: impl IntoIterator<Item = String>) -> Result<Self> {
        let mut out = Self::default();
        for arg in args {
            match arg.as_str() {
                "--detached" => out.detached = true,
                s if s.starts_with("--") => bail!("unknown option '{}'", s),
                s if out.instrument.is_none() => out.instrument = Some(s.to_string()),
                s => bail!("unexpected argument '{}'", s),
            }
        }
        Ok(out)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = match Config::load() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config: {:#}", e);
            eprintln!("Make sure config/default.toml exists or TICKFLOW_CONFIG points to a config file");
            std::process::exit(1);
        }
    };

    let args = CliArgs::parse(std::env::args().skip(1))?;
    let instrument = match args.instrument.as_deref() {
        Some(raw) => match InstrumentCode::parse(raw) {
            Ok(code) => code,
            Err(e) => {
                eprintln!("{}", e);
                std::process::exit(2);
            }
        },
        None => config.instrument()?,
    };

    // Init tracing (log to file so it doesn't interfere with TUI)
    let log_file = std::fs::File::create("tickflow.log")?;
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                tracing_subscriber::EnvFilter::new(&config.logging.level)
            }),
        )
        .with_writer(log_file)
        .with_ansi(false)
        .json()
        .init();

    tracing::info!(
        instrument = %instrument,
        store = %config.store.path.display(),
        detached = args.detached,
        "Starting tickflow"
    );

    let mut supervisor: Box<dyn Supervisor + Send> = if args.detached {
        Box::new(DetachedSupervisor)
    } else {
        Box::new(
            ChildProcessSupervisor::sibling_ingest_binary()
                .context("failed to locate tickflow-ingest")?,
        )
    };
    match supervisor.restart(&instrument) {
        Ok(()) if !args.detached => tokio::time::sleep(config.settle_delay()).await,
        Ok(()) => {}
        Err(e) => tracing::error!(error = %e, "Failed to launch ingestion job"),
    }

    let (render_tx, mut render_rx) = mpsc::channel::<RenderEvent>(256);
    let (control_tx, control_rx) = mpsc::channel::<ControlIntent>(16);

    let session = SessionController::new(
        SessionConfig::from(&config),
        SqliteConnector::new(&config.store.path, config.store.busy_timeout()),
        ChannelRenderer::new(render_tx, config.ui.log_rows),
        supervisor,
        instrument.clone(),
    );
    let session_task = tokio::spawn(session.run(control_rx));

    let mut app_state = AppState::new(&instrument.to_string(), config.ui.log_rows);
    let refresh = Duration::from_millis(config.ui.refresh_rate_ms.max(10));

    // TUI main loop
    let mut terminal = ratatui::init();
    let ui_result = run_ui(
        &mut terminal,
        &mut app_state,
        &mut render_rx,
        &control_tx,
        refresh,
    );
    ratatui::restore();

    let _ = control_tx.send(ControlIntent::Quit).await;
    drop(control_tx);
    if let Err(e) = session_task.await {
        tracing::error!(error = %e, "Session task failed");
    }
    tracing::info!("tickflow exited");
    ui_result
}

fn run_ui(
    terminal: &mut DefaultTerminal,
    app_state: &mut AppState,
    render_rx: &mut mpsc::Receiver<RenderEvent>,
    control_tx: &mpsc::Sender<ControlIntent>,
    refresh: Duration,
) -> Result<()> {
    loop {
        while let Ok(event) = render_rx.try_recv() {
            app_state.apply(event);
        }
        app_state.tick(Instant::now());
        if app_state.terminated {
            return Ok(());
        }

        terminal.draw(|frame| ui::render(frame, app_state))?;

        if !crossterm::event::poll(refresh)? {
            continue;
        }
        let Event::Key(key) = crossterm::event::read()? else {
            continue;
        };
        if key.kind != KeyEventKind::Press {
            continue;
        }

        if let Some(prompt) = app_state.prompt.as_mut() {
            match prompt.handle_key(&key.code) {
                PromptOutcome::Submitted(code) => {
                    app_state.prompt = None;
                    send_intent(control_tx, ControlIntent::ChangeInstrument(code));
                }
                PromptOutcome::Cancelled => app_state.prompt = None,
                PromptOutcome::Editing => {}
            }
            continue;
        }

        match parse_main_command(&key.code) {
            Some(UiCommand::Quit) => return Ok(()),
            Some(UiCommand::TogglePause) => send_intent(control_tx, ControlIntent::TogglePause),
            Some(UiCommand::OpenInstrumentPrompt) => {
                app_state.prompt = Some(InstrumentPrompt::new());
            }
            None => {}
        }
    }
}

fn send_intent(control_tx: &mpsc::Sender<ControlIntent>, intent: ControlIntent) {
    if let Err(e) = control_tx.try_send(intent) {
        tracing::warn!(error = %e, "Control intent dropped");
    }
}
