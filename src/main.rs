use std::{io::IsTerminal, process};

use ipsum::{
    application::{context::AppContext, error::AppError},
    config,
    infra::telemetry,
    presentation::terminal::{Flow, Shell, TerminalCommand},
};
use tokio::{
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Stdout},
    sync::broadcast::error::{RecvError, TryRecvError},
};
use tracing::{Dispatch, Level, debug, dispatcher, error, info};
use tracing_subscriber::fmt as tracing_fmt;

const CLEAR_SCREEN: &str = "\x1b[2J\x1b[H";

#[tokio::main(flavor = "current_thread")]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        log_application_error(error);
        return;
    }

    let subscriber = tracing_fmt()
        .with_max_level(Level::ERROR)
        .with_writer(std::io::stderr)
        .finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || log_application_error(error));
}

fn log_application_error(error: &AppError) {
    match error {
        AppError::Render(render) => {
            error!(origin = render.origin(), error = %error, "application error");
        }
        _ => error!(error = %error, "application error"),
    }
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()?;

    telemetry::init(&settings.logging).map_err(AppError::from)?;

    let ctx = AppContext::create(&settings)?;
    let command = cli_args.command();
    info!(
        target = "ipsum::terminal",
        ?command,
        show_people = ctx.show_people(),
        "Starting session"
    );

    let result = run_session(&ctx, command).await;
    ctx.dispose();
    result
}

/// Redraw on every input line, and on cache events when attached to a
/// terminal, until `q` or the end of input. At end of input the session waits
/// for pending fetches and draws once more, so piped command scripts print
/// their final state.
async fn run_session(ctx: &AppContext, command: config::Command) -> Result<(), AppError> {
    let mut shell = Shell::mount(ctx, command);
    let mut events = ctx.client().subscribe();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut screen = Screen::new();

    screen.draw(&shell).await?;
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else {
                    debug!("End of input");
                    shell.idle().await;
                    screen.draw(&shell).await?;
                    break;
                };
                if shell.handle(TerminalCommand::parse_line(&line)) == Flow::Quit {
                    break;
                }
            }
            event = events.recv() => {
                match event {
                    Ok(_) | Err(RecvError::Lagged(_)) => {}
                    Err(RecvError::Closed) => break,
                }
                // one redraw per burst of events
                while !matches!(events.try_recv(), Err(TryRecvError::Empty | TryRecvError::Closed)) {}
                if !screen.interactive {
                    continue;
                }
            }
        }
        screen.draw(&shell).await?;
    }

    info!(target = "ipsum::terminal", "Session finished");
    Ok(())
}

struct Screen {
    stdout: Stdout,
    interactive: bool,
}

impl Screen {
    fn new() -> Self {
        Self {
            stdout: tokio::io::stdout(),
            interactive: std::io::stdout().is_terminal(),
        }
    }

    async fn draw(&mut self, shell: &Shell) -> Result<(), AppError> {
        let mut frame = shell.render()?;
        if self.interactive {
            frame.insert_str(0, CLEAR_SCREEN);
        }
        frame.push('\n');
        self.stdout.write_all(frame.as_bytes()).await?;
        self.stdout.flush().await?;
        Ok(())
    }
}
