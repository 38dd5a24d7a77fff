use clap::{Parser, Subcommand, ValueEnum};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::Method;
use serde_json::{json, Value};

#[derive(Parser)]
#[command(name = "relay-cli")]
#[command(about = "Management CLI for relay-manager", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8081")]
    url: String,

    #[arg(short, long, env = "RELAY_ADMIN_KEY", default_value = "admin-secret-key")]
    key: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show relay state, pid, uptime and restart counters
    Status,
    /// Launch the relay
    Start,
    /// Stop the relay gracefully
    Stop {
        /// Seconds to wait before killing the relay
        #[arg(long)]
        timeout: Option<u64>,
    },
    /// Ask the relay to re-read its config
    Reload {
        /// Wait up to this many seconds for the relay to settle
        #[arg(long)]
        wait: Option<u64>,
    },
    /// Print the relay's config file
    Config,
    /// Show or replace the whitelist
    Whitelist {
        #[command(subcommand)]
        action: ListAction,
    },
    /// Show or replace the blacklist
    Blacklist {
        #[command(subcommand)]
        action: ListAction,
    },
    /// Show or change the access mode
    Mode {
        #[arg(value_enum)]
        mode: Option<ModeArg>,
    },
    /// Rewrite the relay config's access lists from the database
    Reconcile,
}

#[derive(Subcommand)]
enum ListAction {
    /// Print the list
    Get,
    /// Replace the list with the given hex pubkeys
    Set {
        pubkeys: Vec<String>,
        /// Note attached to every entry
        #[arg(long)]
        note: Option<String>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum ModeArg {
    Open,
    Whitelist,
    Blacklist,
    Paid,
}

impl ModeArg {
    fn as_str(self) -> &'static str {
        match self {
            ModeArg::Open => "open",
            ModeArg::Whitelist => "whitelist",
            ModeArg::Blacklist => "blacklist",
            ModeArg::Paid => "paid",
        }
    }
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

    let (method, path, body) = match cli.command {
        Commands::Status => (Method::GET, "/admin/status".to_string(), None),
        Commands::Start => (Method::POST, "/admin/relay/start".to_string(), None),
        Commands::Stop { timeout } => {
            let path = match timeout {
                Some(secs) => format!("/admin/relay/stop?timeout_secs={secs}"),
                None => "/admin/relay/stop".to_string(),
            };
            (Method::POST, path, None)
        }
        Commands::Reload { wait } => {
            let path = match wait {
                Some(secs) => format!("/admin/relay/reload?wait_secs={secs}"),
                None => "/admin/relay/reload".to_string(),
            };
            (Method::POST, path, None)
        }
        Commands::Config => (Method::GET, "/admin/relay/config".to_string(), None),
        Commands::Whitelist { action } => list_request("/admin/whitelist", action),
        Commands::Blacklist { action } => list_request("/admin/blacklist", action),
        Commands::Mode { mode: None } => (Method::GET, "/admin/access-mode".to_string(), None),
        Commands::Mode { mode: Some(mode) } => (
            Method::PUT,
            "/admin/access-mode".to_string(),
            Some(json!({ "mode": mode.as_str() })),
        ),
        Commands::Reconcile => (Method::POST, "/admin/reconcile".to_string(), None),
    };

    let mut request = client
        .request(method, format!("{}{}", cli.url, path))
        .headers(headers);
    if let Some(body) = body {
        request = request.json(&body);
    }

    let ok = print_response(request.send().await?).await?;
    if !ok {
        std::process::exit(1);
    }
    Ok(())
}

fn list_request(path: &str, action: ListAction) -> (Method, String, Option<Value>) {
    match action {
        ListAction::Get => (Method::GET, path.to_string(), None),
        ListAction::Set { pubkeys, note } => {
            let entries: Vec<Value> = pubkeys
                .into_iter()
                .map(|pubkey| json!({ "pubkey": pubkey, "note": note }))
                .collect();
            (Method::PUT, path.to_string(), Some(Value::Array(entries)))
        }
    }
}

async fn print_response(res: reqwest::Response) -> Result<bool, Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: Admin API returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        return Ok(false);
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(true)
}
