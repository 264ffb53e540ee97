use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::{
    capture::{
        commands::{self, Command, HELP},
        CaptureController,
    },
    render::render_panel,
};

/// Reads commands from stdin until `quit` or end of input. The feedback
/// panel is redrawn whenever the results change.
pub async fn run_shell(controller: CaptureController, color: bool) -> Result<()> {
    println!("{HELP}");
    println!("{}", render_panel(&controller.results().get(), controller.mode().await, color));

    let renderer = {
        let controller = controller.clone();
        let mut results = controller.results().subscribe();
        tokio::spawn(async move {
            while results.changed().await.is_ok() {
                let result = results.borrow_and_update().clone();
                let mode = controller.mode().await;
                println!("{}", render_panel(&result, mode, color));
            }
        })
    };

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await.context("failed to read stdin")? {
        let command = match line.parse::<Command>() {
            Ok(command) => command,
            Err(message) => {
                if !message.is_empty() {
                    eprintln!("{message}");
                }
                continue;
            }
        };

        let reply = match command {
            Command::Quit => break,
            Command::Help => Ok(Some(HELP.to_string())),
            Command::ToggleMode => commands::toggle_mode(&controller).await,
            Command::Capture => commands::capture_now(&controller).await,
            Command::SelectFile(path) => commands::select_file(&controller, path).await,
            Command::Upload(path) => commands::upload(&controller, path).await,
            Command::Status => commands::status(&controller, color).await,
        };

        match reply {
            Ok(Some(message)) => println!("{message}"),
            Ok(None) => {}
            Err(message) => eprintln!("{message}"),
        }
    }

    renderer.abort();
    Ok(())
}
