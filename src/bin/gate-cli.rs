use clap::{Parser, Subcommand};
use serde_json::{json, Value};

#[derive(Parser)]
#[command(name = "gate-cli")]
#[command(about = "Client for a running gatekeeper service", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:4000")]
    url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check service status
    Health,
    /// Register a new account
    Register {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },
    /// Activate an account with an activation token
    Activate {
        #[arg(long)]
        token: String,
    },
    /// Exchange credentials for an authentication token
    Login {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    let res = match cli.command {
        Commands::Health => client.get(format!("{}/v1/healthcheck", cli.url)).send().await?,
        Commands::Register {
            name,
            email,
            password,
        } => {
            client
                .post(format!("{}/v1/users", cli.url))
                .json(&json!({ "name": name, "email": email, "password": password }))
                .send()
                .await?
        }
        Commands::Activate { token } => {
            client
                .put(format!("{}/v1/users/activated", cli.url))
                .json(&json!({ "token": token }))
                .send()
                .await?
        }
        Commands::Login { email, password } => {
            client
                .post(format!("{}/v1/tokens/authentication", cli.url))
                .json(&json!({ "email": email, "password": password }))
                .send()
                .await?
        }
    };

    print_response(res).await
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: service returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        return Ok(());
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
