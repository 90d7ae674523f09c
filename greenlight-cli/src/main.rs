use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use serde_json::json;

/// Greenlight: certification-reimbursement approval workflow client
#[derive(Parser, Debug)]
#[command(name = "greenlight")]
#[command(about = "Client for the Greenlight approval workflow service", long_about = None)]
struct Cli {
    /// Base URL of the Greenlight service
    #[arg(long, env = "GREENLIGHT_URL", default_value = "http://localhost:3000")]
    base_url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Submit a new reimbursement request
    Submit(SubmitArgs),
    /// Check the status of a request
    Status(StatusArgs),
    /// Approve or reject a pending request with its decision token
    Decide(DecideArgs),
    /// List all requests (tokens are never included)
    List,
    /// Check service health
    Health,
}

#[derive(Parser, Debug)]
struct SubmitArgs {
    /// Employee name
    #[arg(long)]
    name: String,

    /// Certification course
    #[arg(long)]
    course: String,

    /// Course cost
    #[arg(long)]
    cost: f64,
}

#[derive(Parser, Debug)]
struct StatusArgs {
    /// Request identifier returned by submit
    request_id: String,
}

#[derive(Parser, Debug)]
struct DecideArgs {
    /// Request identifier
    request_id: String,

    /// Decision token from the approval notification
    #[arg(long)]
    token: String,

    /// The decision to record
    #[arg(long, value_parser = ["APPROVED", "REJECTED"])]
    decision: String,
}

/// Decode a response, surfacing the service's structured error message
/// on non-success status codes.
async fn decode_response(response: reqwest::Response) -> Result<serde_json::Value> {
    let status = response.status();
    let body: serde_json::Value = response
        .json()
        .await
        .context("Failed to parse response body as JSON")?;

    if !status.is_success() {
        let message = body
            .get("error")
            .and_then(|e| e.as_str())
            .unwrap_or("unknown error");
        return Err(anyhow!("{} ({})", message, status));
    }

    Ok(body)
}

async fn submit(client: &reqwest::Client, base_url: &str, args: SubmitArgs) -> Result<()> {
    let response = client
        .post(format!("{}/request", base_url))
        .json(&json!({
            "name": args.name,
            "course": args.course,
            "cost": args.cost,
        }))
        .send()
        .await
        .context("Failed to reach the Greenlight service")?;

    let body = decode_response(response).await?;
    println!("{}", serde_json::to_string_pretty(&body)?);
    Ok(())
}

async fn status(client: &reqwest::Client, base_url: &str, args: StatusArgs) -> Result<()> {
    let response = client
        .get(format!("{}/request/{}", base_url, args.request_id))
        .send()
        .await
        .context("Failed to reach the Greenlight service")?;

    let body = decode_response(response).await?;
    println!("{}", serde_json::to_string_pretty(&body)?);
    Ok(())
}

async fn decide(client: &reqwest::Client, base_url: &str, args: DecideArgs) -> Result<()> {
    let response = client
        .post(format!("{}/approval", base_url))
        .json(&json!({
            "requestId": args.request_id,
            "taskToken": args.token,
            "decision": args.decision,
        }))
        .send()
        .await
        .context("Failed to reach the Greenlight service")?;

    let body = decode_response(response).await?;
    println!("{}", serde_json::to_string_pretty(&body)?);
    Ok(())
}

async fn list(client: &reqwest::Client, base_url: &str) -> Result<()> {
    let response = client
        .get(format!("{}/requests", base_url))
        .send()
        .await
        .context("Failed to reach the Greenlight service")?;

    let body = decode_response(response).await?;
    println!("{}", serde_json::to_string_pretty(&body)?);
    Ok(())
}

async fn health(client: &reqwest::Client, base_url: &str) -> Result<()> {
    let response = client
        .get(format!("{}/health", base_url))
        .send()
        .await
        .context("Failed to reach the Greenlight service")?;

    let body = decode_response(response).await?;
    println!("{}", serde_json::to_string_pretty(&body)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let base_url = cli.base_url.trim_end_matches('/').to_string();
    let client = reqwest::Client::new();

    match cli.command {
        Commands::Submit(args) => submit(&client, &base_url, args).await,
        Commands::Status(args) => status(&client, &base_url, args).await,
        Commands::Decide(args) => decide(&client, &base_url, args).await,
        Commands::List => list(&client, &base_url).await,
        Commands::Health => health(&client, &base_url).await,
    }
}
