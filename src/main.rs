use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::signal;
use tracing_subscriber::EnvFilter;

use queuedesk::collaborator::Credentials;
use queuedesk::config::Config;
use queuedesk::console::{self, Command};
use queuedesk::coordinator::ActionOutcome;
use queuedesk::models::legal_actions;
use queuedesk::queue::StatusFilter;
use queuedesk::session::SharedSession;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    let config = Config::from_env()?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(&config.log_level)
        }))
        .init();

    tracing::info!("Starting queuedesk");

    let (Some(username), Some(password)) = (config.username.clone(), config.password.clone())
    else {
        return Err("QUEUEDESK_USERNAME and QUEUEDESK_PASSWORD must be set".into());
    };

    let session = queuedesk::build_session(&config).await?;

    if !session.login(&Credentials::new(username, password)).await? {
        return Err("Login rejected".into());
    }

    spawn_observers(&session, config.warning_seconds);

    let mut auto_refresh = session.auto_refresh();
    auto_refresh.set_enabled(config.auto_refresh);
    auto_refresh.refresh_now().await;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut logged_out = session.countdown().expirations();
    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                session.activity();

                match console::parse(&line) {
                    Ok(Command::Logout) => break,
                    Ok(Command::AutoRefresh(enabled)) => auto_refresh.set_enabled(enabled),
                    Ok(Command::Refresh) => auto_refresh.refresh_now().await,
                    Ok(command) => run_command(&session, command).await,
                    Err(e) => println!("{e}"),
                }
            }
            _ = logged_out.changed() => {
                println!("Session expired after inactivity");
                break;
            }
            _ = &mut shutdown => break,
        }
    }

    auto_refresh.disable();
    session.logout().await;

    Ok(())
}

async fn run_command(session: &SharedSession, command: Command) {
    let actions = session.actions();
    let queue = session.queue();

    match command {
        Command::List => {
            for entry in queue.visible() {
                println!(
                    "{:<38} {:<10} {:>6}/{:<6} {:<9} {}",
                    entry.id,
                    entry.status_text.unwrap_or("?"),
                    entry.processed.unwrap_or(0),
                    entry.total.map(|t| t.to_string()).unwrap_or_default(),
                    entry.elapsed_text.as_deref().unwrap_or(""),
                    entry.error_text.as_deref().unwrap_or("")
                );
            }
        }
        Command::Select(id) => {
            if actions.select(&id) {
                let allowed = actions
                    .selected()
                    .map(|e| legal_actions(e.status))
                    .unwrap_or(&[]);
                println!("Selected {id}; allowed: {allowed:?}");
            } else {
                println!("Cannot select {id}");
            }
        }
        Command::ClearSelection => {
            actions.clear_selection();
        }
        Command::Action(action) => match actions.perform_selected(action).await {
            Ok(ActionOutcome::Skipped(reason)) => println!("{action} skipped: {reason:?}"),
            Ok(outcome) => tracing::debug!("{action}: {outcome:?}"),
            Err(e) => println!("{action} failed: {}", e.message()),
        },
        Command::Filter(statuses) => queue.set_filter(StatusFilter::of(statuses)),
        Command::Help => println!("{}", console::HELP),
        Command::Empty | Command::Refresh | Command::AutoRefresh(_) | Command::Logout => {}
    }
}

/// Log queue changes and the closing-soon warning.
fn spawn_observers(session: &SharedSession, warning_seconds: i64) {
    let mut queue = session.queue().subscribe();
    tokio::spawn(async move {
        let mut last_message = None;
        while queue.changed().await.is_ok() {
            let state = queue.borrow_and_update().clone();
            if state.message != last_message {
                if let Some(message) = &state.message {
                    tracing::warn!("{message}");
                }
                last_message = state.message.clone();
            }
            tracing::info!(
                "Queue: {} visible of {}{}",
                state.visible().len(),
                state.snapshot.len(),
                if state.loading() { " (loading)" } else { "" }
            );
        }
    });

    let mut warning = session.countdown().subscribe_below(warning_seconds);
    tokio::spawn(async move {
        while let Some(remaining) = warning.next().await {
            if remaining % 10 == 0 || remaining <= 5 {
                tracing::warn!("Session closing in {remaining}s without activity");
            }
        }
    });
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install signal handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
