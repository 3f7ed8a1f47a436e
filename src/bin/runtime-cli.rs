use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde_json::Value;

#[derive(Parser)]
#[command(name = "runtime-cli")]
#[command(about = "Status CLI for the platform runtime", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:5050")]
    url: String,

    #[arg(short, long, env = "RUNTIME_ADMIN_KEY")]
    key: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show version, HTTP phase and registered workers
    Status,
    /// Dump the runtime health board
    Health,
    /// Show worker telemetry
    Workers {
        /// Bypass the telemetry cache
        #[arg(long)]
        refresh: bool,
    },
    /// Restart a single worker
    Restart { name: String },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    let mut headers = HeaderMap::new();
    headers.insert(
        AUTHORIZATION,
        HeaderValue::from_str(&format!("Bearer {}", cli.key))?,
    );

    let request = match cli.command {
        Commands::Status => client.get(format!("{}/admin/status", cli.url)),
        Commands::Health => client.get(format!("{}/admin/health", cli.url)),
        Commands::Workers { refresh } => client
            .get(format!("{}/admin/workers", cli.url))
            .query(&[("refresh", refresh)]),
        Commands::Restart { name } => {
            client.post(format!("{}/admin/workers/{}/restart", cli.url, name))
        }
    };

    let res = request.headers(headers).send().await?;
    print_response(res).await
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: runtime returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        return Ok(());
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
