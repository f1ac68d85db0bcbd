use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::Method;
use serde_json::Value;

#[derive(Parser)]
#[command(name = "crush-cli")]
#[command(about = "Command-line client for the crushd REST API", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8002")]
    url: String,

    /// Bearer token sent with every request.
    #[arg(short, long)]
    key: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show service status (admin)
    Status,
    /// Reload every cluster's CRUSH map now (admin)
    Refresh,
    /// List clusters
    Clusters,
    /// Show one cluster
    Cluster { fsid: String },
    /// List CRUSH rule sets of a cluster
    RuleSets { fsid: String },
    /// List CRUSH rules of a cluster
    Rules { fsid: String },
}

impl Commands {
    fn request(&self) -> (Method, String) {
        match self {
            Commands::Status => (Method::GET, "/admin/status".to_string()),
            Commands::Refresh => (Method::POST, "/admin/refresh".to_string()),
            Commands::Clusters => (Method::GET, "/api/v2/cluster".to_string()),
            Commands::Cluster { fsid } => (Method::GET, format!("/api/v2/cluster/{}", fsid)),
            Commands::RuleSets { fsid } => {
                (Method::GET, format!("/api/v2/cluster/{}/crush_rule_set", fsid))
            }
            Commands::Rules { fsid } => (Method::GET, format!("/api/v2/cluster/{}/crush_rule", fsid)),
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    let mut headers = HeaderMap::new();
    if let Some(key) = &cli.key {
        headers.insert(AUTHORIZATION, HeaderValue::from_str(&format!("Bearer {}", key))?);
    }

    let (method, path) = cli.command.request();
    let res = client
        .request(method, format!("{}{}", cli.url.trim_end_matches('/'), path))
        .headers(headers)
        .send()
        .await?;

    if !print_response(res).await? {
        std::process::exit(1);
    }
    Ok(())
}

async fn print_response(res: reqwest::Response) -> Result<bool, Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: API returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        return Ok(false);
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(true)
}
