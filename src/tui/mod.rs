// File: ./src/tui/mod.rs
// Entry point and main loop for the TUI application.
pub mod action;
pub mod handlers;
pub mod network;
pub mod state;
pub mod view;

use crate::client::auth::AuthGateway;
use crate::client::{CloudBackend, FirestoreClient, HttpClient};
use crate::config::Config;
use crate::context::SharedContext;
use crate::session::CloudSession;
use crate::tui::state::AppState;
use crate::tui::view::draw;

use anyhow::Result;
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, MouseEventKind},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{Terminal, backend::CrosstermBackend};
use rpassword::prompt_password;
use std::{
    io::{self, Write},
    time::Duration,
};
use tokio::sync::mpsc;

pub async fn run(ctx: SharedContext) -> Result<()> {
    // Panic Hook
    let panic_log = ctx
        .get_data_dir()
        .map(|dir| dir.join("studysync_panic.log"))
        .unwrap_or_else(|_| std::path::PathBuf::from("studysync_panic.log"));
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        use std::io::Write;
        if let Ok(mut file) = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&panic_log)
        {
            let _ = writeln!(file, "PANIC: {:?}", info);
        }
        default_hook(info);
    }));

    let config_result = Config::load(ctx.as_ref());
    let cfg = match config_result {
        Ok(c) => c,
        Err(e) => {
            // If the error is NOT a missing config file, it's a syntax/permission error.
            // Report it and exit instead of treating it as a fresh install/onboarding.
            if !Config::is_missing_config_error(&e) {
                eprintln!("Error loading configuration:\n{}", e);
                std::process::exit(1);
            }

            // Interactive Onboarding
            println!("Welcome to StudySync (TUI). No configuration file found.");
            println!("Let's connect your study group's project.\n");

            let mut new_config = Config::default();

            loop {
                println!("--- Project Setup ---");

                print!("Project id (e.g. studysync-demo): ");
                io::stdout().flush()?;
                let mut project = String::new();
                io::stdin().read_line(&mut project)?;
                new_config.project_id = project.trim().to_string();

                let key = prompt_password("Web API key: ")?;
                new_config.api_key = key.trim().to_string();

                println!("\nTesting connection...");

                let check_result = async {
                    let http = HttpClient::new().map_err(anyhow::Error::msg)?;
                    let gateway = AuthGateway::new(http, &new_config);
                    gateway.check_connection().await?;
                    anyhow::Ok(())
                }
                .await;

                match check_result {
                    Ok(()) => {
                        println!("Success! The project accepted the API key.");
                        break;
                    }
                    Err(e) => {
                        eprintln!("Connection failed: {}", e);
                        println!("Retry configuration? [Y/n]");
                        let mut retry = String::new();
                        io::stdin().read_line(&mut retry)?;
                        if retry.trim().eq_ignore_ascii_case("n") {
                            println!("Saving the provided details anyway; edit the config file to fix them.");
                            break;
                        }
                    }
                }
            }

            if let Err(e) = new_config.save(ctx.as_ref()) {
                eprintln!("Warning: Could not save config file: {}", e);
            } else if let Ok(path) = Config::get_path_string(ctx.as_ref()) {
                println!("Configuration saved to: {}", path);
            }

            println!("Starting TUI...");
            std::thread::sleep(Duration::from_secs(1));
            new_config
        }
    };

    // --- WIRING ---
    // One HTTP client is shared by the auth gateway and the document store.
    let http = HttpClient::new().map_err(anyhow::Error::msg)?;
    let session = CloudSession::new(http.clone(), &cfg, ctx.as_ref());
    // Try to resume the previous sign-in before the first frame; the
    // network actor picks the result up from the identity watch.
    let _ = session.restore().await;
    let store = FirestoreClient::new(http, &cfg, session.token_source());
    let backend = CloudBackend::new(store, cfg.poll_secs);

    // --- TERMINAL SETUP ---
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend_term = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend_term)?;

    let mut app_state = AppState::new();

    let (action_tx, action_rx) = mpsc::channel(10);
    let (event_tx, mut event_rx) = mpsc::channel(10);

    // --- NETWORK ACTOR ---
    tokio::spawn(network::run_network_actor(
        backend,
        session,
        ctx.clone(),
        action_rx,
        event_tx,
    ));

    // --- UI LOOP ---
    loop {
        terminal.draw(|f| draw(f, &mut app_state))?;

        // A. Network Events
        if let Ok(event) = event_rx.try_recv() {
            handlers::handle_app_event(&mut app_state, event);
        }

        // B. Input Events
        if crossterm::event::poll(Duration::from_millis(50))? {
            let event = event::read()?;
            match event {
                Event::Mouse(mouse) => match mouse.kind {
                    MouseEventKind::ScrollDown => app_state.next(),
                    MouseEventKind::ScrollUp => app_state.previous(),
                    _ => {}
                },
                Event::Key(key) => {
                    // Filter out KeyRelease events to prevent double input on Windows
                    if key.kind == event::KeyEventKind::Release {
                        continue;
                    }

                    if let Some(action) = handlers::handle_key_event(key, &mut app_state) {
                        if matches!(action, action::Action::Quit) {
                            break;
                        }
                        let _ = action_tx.send(action).await;
                    }
                }
                _ => {}
            }
        }
    }

    // --- CLEANUP ---
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;
    Ok(())
}
