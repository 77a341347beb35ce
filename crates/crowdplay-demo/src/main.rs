//! Console host for a crowdplay session.
//!
//! Loads `crowdplay.ron`, applies CLI overrides, connects, and polls the
//! session at the configured frame rate, logging every event until Ctrl-C.
//! Run with `cargo run -p crowdplay-demo -- --app-id <id> --project-version-id <id>`.

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use crowdplay_config::{CliArgs, Config};
use crowdplay_net::{HttpAuthClient, WebSocketTransport};
use crowdplay_session::{FileTokenStore, InteractivityState, Services, Session};
use tokio::runtime::Handle;
use tracing::{debug, error, info, warn};

fn main() -> ExitCode {
    let args = CliArgs::parse();

    let config_dir = match args.config.clone().map_or_else(Config::default_dir, Ok) {
        Ok(dir) => dir,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::FAILURE;
        }
    };

    let mut config = Config::load_or_create(&config_dir).unwrap_or_else(|e| {
        eprintln!("Failed to load config: {e}, using defaults");
        Config::default()
    });
    config.apply_cli_overrides(&args);

    let log_dir = config.data_dir().join("logs");
    crowdplay_log::init_logging(Some(&log_dir), config.debug.file_logging, Some(&config));

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to start runtime: {e}");
            return ExitCode::FAILURE;
        }
    };
    runtime.block_on(run(config, !args.no_interactive))
}

fn register_handlers(session: &mut Session) {
    session.on_interactivity_state_changed(|session, state| {
        info!(%state, "interactivity");
        if *state == InteractivityState::Initialized {
            info!(
                scenes = session.scenes().len(),
                groups = session.groups().len(),
                participants = session.participants().len(),
                "session ready"
            );
        }
    });
    session.on_participant_state_changed(|_, change| {
        info!(
            user_id = change.participant.user_id,
            username = %change.participant.username,
            state = ?change.state,
            "participant"
        );
    });
    session.on_button(|_, event| {
        info!(
            control = %event.control_id,
            pressed = event.is_pressed,
            user = ?event.participant.as_ref().map(|p| p.username.as_str()),
            "button"
        );
    });
    session.on_joystick(|_, event| {
        debug!(control = %event.control_id, x = event.x, y = event.y, "joystick");
    });
    session.on_error(|_, event| {
        warn!(code = event.code, kind = ?event.kind, "{}", event.message);
    });
}

async fn run(config: Config, auto_interactive: bool) -> ExitCode {
    let token_path = config.token_path();
    debug!(path = %token_path.display(), "token cache");
    let services = Services {
        transport: Arc::new(WebSocketTransport::new()),
        auth: Arc::new(HttpAuthClient::new(config.service.api_base.clone())),
        tokens: Arc::new(FileTokenStore::new(token_path)),
    };

    let mut session = match Session::new(&config, services, Handle::current()) {
        Ok(session) => session,
        Err(e) => {
            error!("{e}");
            return ExitCode::FAILURE;
        }
    };
    register_handlers(&mut session);

    if let Err(e) = session.initialize(auto_interactive) {
        error!("{e}");
        return ExitCode::FAILURE;
    }

    let mut frames = tokio::time::interval(config.timing.frame_interval());
    frames.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);
    let mut shown_code: Option<String> = None;

    loop {
        tokio::select! {
            _ = frames.tick() => {
                session.poll();
                let code = session.short_code();
                if code != shown_code {
                    if let Some(code) = &code {
                        info!("Authorize this app by entering the short code {code}");
                    }
                    shown_code = code;
                }
            }
            _ = &mut shutdown => {
                info!("shutting down");
                break;
            }
        }
    }

    session.dispose();
    ExitCode::SUCCESS
}
