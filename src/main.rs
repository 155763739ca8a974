mod audio;
mod config;
mod network;
mod session;
mod state;

use anyhow::Result;
use std::path::Path;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info};

use config::Config;
use session::Session;

#[tokio::main]
async fn main() {
    // Initialize logging
    tracing_subscriber::fmt::init();

    if let Err(e) = run().await {
        error!("Application error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let config = match std::env::args().nth(1) {
        Some(path) => Config::load(Path::new(&path))?,
        None => Config::default(),
    };
    config.validate()?;

    info!("Starting voicelink (endpoint: {})", config.endpoint);

    let mut session = Session::new(config);

    println!("Press Enter to toggle the assistant on/off, 'q' to quit.");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        match line.trim() {
            "q" | "quit" => break,
            "" | "t" | "toggle" => {
                if session.is_active() {
                    session.stop().await?;
                    println!("Assistant off.");
                } else {
                    match session.start().await {
                        Ok(()) => println!("Assistant on."),
                        Err(e) => {
                            // Failed activation leaves the toggle where it was.
                            error!("Failed to start assistant: {:#}", e);
                            println!("Assistant remains off.");
                        }
                    }
                }
            }
            other => println!("Unknown command: {:?}", other),
        }
    }

    session.stop().await?;
    Ok(())
}
