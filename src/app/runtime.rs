use super::*;

/// Single-threaded dispatch loop. Stream results arrive on `rx` from worker
/// threads, terminal input is polled here, and both are handed to the app
/// one event at a time.
pub(crate) fn run_app(
    terminal: &mut Terminal<CrosstermBackend<Stdout>>,
    config: &Config,
    service: Arc<dyn GenerationService>,
) -> Result<()> {
    let mut app = App::new(config);
    const ACTIVE_POLL_MS: u64 = 33;
    const IDLE_POLL_MS: u64 = 100;
    const TICK_MS: u64 = 100;
    const MAX_EVENTS_PER_FRAME: u16 = 64;
    let (tx, rx) = unbounded::<AppEvent>();
    let mut last_tick = Instant::now();
    let mut needs_draw = true;

    info!(
        endpoint = %config.endpoint,
        max_tokens = config.max_tokens,
        timeout_secs = config.timeout.as_secs(),
        theme = config.theme.as_str(),
        "chat session started"
    );

    loop {
        let mut drained_results: u16 = 0;
        while let Ok(event) = rx.try_recv() {
            dispatch(&mut app, event, &service, &tx);
            needs_draw = true;
            drained_results = drained_results.saturating_add(1);
            if drained_results >= MAX_EVENTS_PER_FRAME {
                break;
            }
        }

        if last_tick.elapsed() >= Duration::from_millis(TICK_MS) {
            dispatch(&mut app, AppEvent::Tick, &service, &tx);
            last_tick = Instant::now();
            if app.is_generating() {
                needs_draw = true;
            }
        }

        if needs_draw {
            if let Ok(area) = terminal.size() {
                app.update_viewport(area.width, area.height);
            }
            app.ensure_render_cache();
            terminal.draw(|f| ui::draw(f, &app))?;
            needs_draw = false;
        }

        if app.should_quit {
            break;
        }

        let timeout = if app.is_generating() {
            Duration::from_millis(ACTIVE_POLL_MS)
        } else {
            Duration::from_millis(IDLE_POLL_MS)
        };
        if !event::poll(timeout).context("event poll")? {
            continue;
        }

        let mut drained_events: u16 = 0;
        loop {
            let terminal_event = event::read().context("event read")?;
            dispatch(&mut app, AppEvent::Terminal(terminal_event), &service, &tx);
            drained_events = drained_events.saturating_add(1);
            if app.should_quit || drained_events >= MAX_EVENTS_PER_FRAME {
                break;
            }
            if !event::poll(Duration::from_millis(0)).context("event poll drain")? {
                break;
            }
        }
        needs_draw = true;
    }

    info!(turns = app.controller.log().len(), "chat session closed");
    terminal.draw(ui::draw_exit)?;
    Ok(())
}

fn dispatch(
    app: &mut App,
    event: AppEvent,
    service: &Arc<dyn GenerationService>,
    tx: &Sender<AppEvent>,
) {
    for task in app.handle(event, Instant::now()) {
        worker::spawn_task(task, service, tx);
    }
}
