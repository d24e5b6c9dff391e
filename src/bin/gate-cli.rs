use std::path::PathBuf;

use clap::{Parser, Subcommand};
use reqwest::header::RANGE;
use serde_json::{json, Value};

#[derive(Parser)]
#[command(name = "gate-cli")]
#[command(about = "Client for a running media-gate server", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:3000")]
    url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check server liveness and active stream count
    Health,
    /// Request an access token for a resource identifier
    Auth {
        resource: String,
        #[arg(short, long)]
        requester: Option<String>,
    },
    /// List servable resources (debug endpoint)
    Resources,
    /// Show live streams (debug endpoint)
    Streams,
    /// Download a resource, optionally a byte range
    Fetch {
        name: String,
        #[arg(short, long)]
        token: String,
        /// Range header value, e.g. "bytes=0-1023"
        #[arg(short, long)]
        range: Option<String>,
        /// Write the body here instead of reporting its size
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();
    let base = cli.url.trim_end_matches('/');

    match cli.command {
        Commands::Health => {
            let res = client.get(format!("{}/health", base)).send().await?;
            print_response(res).await?;
        }
        Commands::Auth {
            resource,
            requester,
        } => {
            let res = client
                .post(format!("{}/auth", base))
                .json(&json!({ "resourceId": resource, "requesterId": requester }))
                .send()
                .await?;
            print_response(res).await?;
        }
        Commands::Resources => {
            let res = client.get(format!("{}/config", base)).send().await?;
            print_response(res).await?;
        }
        Commands::Streams => {
            let res = client.get(format!("{}/streams", base)).send().await?;
            print_response(res).await?;
        }
        Commands::Fetch {
            name,
            token,
            range,
            output,
        } => {
            let mut req = client
                .get(format!("{}/resource/{}", base, name))
                .header("X-Auth-Token", token);
            if let Some(range) = range {
                req = req.header(RANGE, range);
            }
            let res = req.send().await?;

            let status = res.status();
            if !status.is_success() {
                return report_error(res).await;
            }

            let content_range = res
                .headers()
                .get(reqwest::header::CONTENT_RANGE)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);
            let body = res.bytes().await?;

            println!("Status: {}", status);
            if let Some(content_range) = content_range {
                println!("Content-Range: {}", content_range);
            }
            match output {
                Some(path) => {
                    tokio::fs::write(&path, &body).await?;
                    println!("Wrote {} bytes to {}", body.len(), path.display());
                }
                None => println!("Received {} bytes", body.len()),
            }
        }
    }

    Ok(())
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    if !res.status().is_success() {
        return report_error(res).await;
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}

async fn report_error(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    eprintln!("Error: server returned status {}", res.status());
    if let Ok(text) = res.text().await {
        eprintln!("Response: {}", text);
    }
    Ok(())
}
