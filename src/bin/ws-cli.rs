use std::time::Duration;

use clap::{Parser, Subcommand};
use futures_util::{SinkExt, StreamExt};
use serde_json::value::RawValue;
use serde_json::Value;
use tokio_tungstenite::{connect_async, tungstenite::Message};

use socket_router::Request;

#[derive(Parser)]
#[command(name = "ws-cli")]
#[command(about = "Smoke-test client for socket-router", long_about = None)]
struct Cli {
    /// Server base address, without scheme.
    #[arg(short, long, default_value = "localhost:8080")]
    addr: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Send one request and print every response frame
    Send {
        /// Request code, e.g. PING
        #[arg(short, long)]
        code: String,

        /// JSON body
        #[arg(short, long)]
        body: Option<String>,

        /// Upgrade path
        #[arg(long, default_value = "/conn")]
        path: String,

        /// Stop after this many seconds without a frame
        #[arg(long, default_value_t = 2)]
        wait_secs: u64,
    },
    /// Show server status
    Status,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Send {
            code,
            body,
            path,
            wait_secs,
        } => {
            let body = body.map(RawValue::from_string).transpose()?;
            let request = serde_json::to_string(&Request::new(code, body))?;

            let (mut socket, _) = connect_async(format!("ws://{}{}", cli.addr, path)).await?;
            socket.send(Message::Text(request.into())).await?;

            let wait = Duration::from_secs(wait_secs);
            while let Ok(Some(frame)) = tokio::time::timeout(wait, socket.next()).await {
                match frame? {
                    Message::Text(text) => {
                        for line in text.as_str().lines() {
                            print_json(line)?;
                        }
                    }
                    Message::Close(_) => break,
                    _ => {}
                }
            }
            socket.close(None).await?;
        }
        Commands::Status => {
            let res = reqwest::get(format!("http://{}/status", cli.addr)).await?;
            let status = res.status();
            if !status.is_success() {
                eprintln!("Error: server returned status {}", status);
                return Ok(());
            }
            let json: Value = res.json().await?;
            println!("{}", serde_json::to_string_pretty(&json)?);
        }
    }

    Ok(())
}

fn print_json(line: &str) -> Result<(), serde_json::Error> {
    match serde_json::from_str::<Value>(line) {
        Ok(json) => println!("{}", serde_json::to_string_pretty(&json)?),
        Err(_) => println!("{line}"),
    }
    Ok(())
}
