//! Herald CLI - operator tool for the Herald notification dispatcher

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tabled::{Table, Tabled};

const DEFAULT_RPC_URL: &str = "http://127.0.0.1:9527";

#[derive(Parser)]
#[command(name = "herald")]
#[command(about = "Herald notification dispatcher CLI", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// RPC server URL
    #[arg(long, env = "HERALD_RPC_URL", default_value = DEFAULT_RPC_URL)]
    rpc_url: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a notification for delivery
    Send {
        /// Recipient in E.164 form (e.g. +905551112233)
        #[arg(short, long)]
        to: String,

        /// Message text (at most 40 characters)
        #[arg(short, long)]
        content: String,
    },

    /// List delivered notifications
    Sent,

    /// Control the delivery scheduler
    Scheduler {
        #[command(subcommand)]
        action: Toggle,
    },

    /// Control the retry consumer
    Consumer {
        #[command(subcommand)]
        action: ConsumerAction,
    },

    /// Show system status
    Status,
}

#[derive(Subcommand, Clone, Copy)]
enum Toggle {
    Start,
    Stop,
}

#[derive(Subcommand)]
enum ConsumerAction {
    Start {
        /// Retry ceiling (daemon default when omitted)
        #[arg(long)]
        max_retries: Option<u32>,
    },
    Stop,
}

#[derive(Serialize)]
struct JsonRpcRequest {
    jsonrpc: String,
    method: String,
    params: serde_json::Value,
    id: u64,
}

#[derive(Deserialize)]
struct JsonRpcResponse {
    #[allow(dead_code)]
    jsonrpc: String,
    #[allow(dead_code)]
    id: u64,
    result: Option<serde_json::Value>,
    error: Option<JsonRpcError>,
}

#[derive(Deserialize)]
struct JsonRpcError {
    code: i32,
    message: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct NotificationView {
    id: String,
    phone_number: String,
    content: String,
    status: String,
    created_at: String,
    updated_at: Option<String>,
}

#[derive(Deserialize)]
struct ListSentResult {
    notifications: Vec<NotificationView>,
}

#[derive(Deserialize)]
struct ToggleResult {
    running: bool,
    changed: bool,
}

#[derive(Tabled)]
struct NotificationRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "To")]
    to: String,
    #[tabled(rename = "Content")]
    content: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Created")]
    created_at: String,
    #[tabled(rename = "Updated")]
    updated_at: String,
}

impl From<NotificationView> for NotificationRow {
    fn from(n: NotificationView) -> Self {
        Self {
            id: n.id,
            to: n.phone_number,
            content: n.content,
            status: n.status,
            created_at: n.created_at,
            updated_at: n.updated_at.unwrap_or_else(|| "-".to_string()),
        }
    }
}

fn rpc_request(method: &str, params: serde_json::Value) -> JsonRpcRequest {
    JsonRpcRequest {
        jsonrpc: "2.0".to_string(),
        method: method.to_string(),
        params,
        id: 1,
    }
}

async fn call_rpc(url: &str, method: &str, params: serde_json::Value) -> Result<serde_json::Value> {
    let request = rpc_request(method, params);

    let client = reqwest::Client::new();
    let response: JsonRpcResponse = client
        .post(url)
        .json(&request)
        .send()
        .await
        .context("Failed to connect to daemon")?
        .json()
        .await
        .context("Failed to parse response")?;

    if let Some(error) = response.error {
        anyhow::bail!("RPC error ({}): {}", error.code, error.message);
    }

    response
        .result
        .ok_or_else(|| anyhow::anyhow!("No result in response"))
}

fn print_toggle(component: &str, result: serde_json::Value) -> Result<()> {
    let toggle: ToggleResult = serde_json::from_value(result)?;
    let state = if toggle.running {
        "RUNNING".green()
    } else {
        "STOPPED".yellow()
    };
    if toggle.changed {
        println!("{} {} is now {}", "✓".green().bold(), component, state);
    } else {
        println!("{} {} was already {}", "○".bold(), component, state);
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Send { to, content } => {
            let params = json!({
                "phoneNumber": to,
                "content": content,
            });

            let result = call_rpc(&cli.rpc_url, "notification.create.v1", params).await?;
            let created: NotificationView = serde_json::from_value(result)?;

            println!("{}", "✓ Notification created".green().bold());
            println!();
            println!("{}", Table::new(vec![NotificationRow::from(created)]));
        }

        Commands::Sent => {
            let result = call_rpc(&cli.rpc_url, "notification.list_sent.v1", json!({})).await?;
            let listed: ListSentResult = serde_json::from_value(result)?;

            if listed.notifications.is_empty() {
                println!("{}", "No notifications sent yet".yellow());
            } else {
                let rows: Vec<NotificationRow> = listed
                    .notifications
                    .into_iter()
                    .map(NotificationRow::from)
                    .collect();
                println!("{}", Table::new(rows));
            }
        }

        Commands::Scheduler { action } => {
            let method = match action {
                Toggle::Start => "scheduler.start.v1",
                Toggle::Stop => "scheduler.stop.v1",
            };
            let result = call_rpc(&cli.rpc_url, method, json!({})).await?;
            print_toggle("Scheduler", result)?;
        }

        Commands::Consumer { action } => {
            let (method, params) = match action {
                ConsumerAction::Start { max_retries } => (
                    "consumer.start.v1",
                    match max_retries {
                        Some(n) => json!({ "maxRetries": n }),
                        None => json!({}),
                    },
                ),
                ConsumerAction::Stop => ("consumer.stop.v1", json!({})),
            };
            let result = call_rpc(&cli.rpc_url, method, params).await?;
            print_toggle("Retry consumer", result)?;
        }

        Commands::Status => {
            println!("{}", "System Status".cyan().bold());
            println!();

            match call_rpc(&cli.rpc_url, "admin.stats.v1", json!({})).await {
                Ok(stats) => {
                    let running = |flag: &serde_json::Value| {
                        if flag.as_bool().unwrap_or(false) {
                            "RUNNING".green()
                        } else {
                            "STOPPED".yellow()
                        }
                    };

                    println!("  {} {}", "RPC URL:".bold(), cli.rpc_url);
                    println!("  {} {}", "Status:".bold(), "ONLINE".green());
                    println!("  {} {}", "Scheduler:".bold(), running(&stats["schedulerRunning"]));
                    println!(
                        "  {} {} (max retries {})",
                        "Consumer:".bold(),
                        running(&stats["consumerRunning"]),
                        stats["maxRetries"]
                    );
                    println!();
                    println!("  {} {}", "Total:".bold(), stats["total"]);
                    println!("  {} {}", "New:".bold(), stats["new"]);
                    println!("  {} {}", "Process:".bold(), stats["process"]);
                    println!("  {} {}", "Sent:".bold(), stats["sent"]);
                    println!("  {} {}", "Fail:".bold(), stats["fail"]);
                    println!("  {} {}", "Dead:".bold(), stats["dead"]);
                    println!("  {} {}", "Retry queue:".bold(), stats["retryQueueDepth"]);
                    println!();
                    println!("  {} {} seconds", "Uptime:".bold(), stats["uptimeSeconds"]);
                }
                Err(e) => {
                    println!("  {} {}", "Status:".bold(), "ERROR".red());
                    println!("  {} {}", "Error:".bold(), e);
                }
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_send() {
        let cli = Cli::try_parse_from([
            "herald",
            "--rpc-url",
            "http://localhost:1",
            "send",
            "--to",
            "+905551112233",
            "--content",
            "hi",
        ])
        .unwrap();
        assert_eq!(cli.rpc_url, "http://localhost:1");
        assert!(matches!(cli.command, Commands::Send { ref to, .. } if to == "+905551112233"));
    }

    #[test]
    fn test_parse_consumer_start_with_max_retries() {
        let cli = Cli::try_parse_from(["herald", "consumer", "start", "--max-retries", "5"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Consumer {
                action: ConsumerAction::Start { max_retries: Some(5) }
            }
        ));
    }

    #[test]
    fn test_request_envelope() {
        let value = serde_json::to_value(rpc_request("admin.stats.v1", json!({}))).unwrap();
        assert_eq!(value["jsonrpc"], "2.0");
        assert_eq!(value["method"], "admin.stats.v1");
        assert_eq!(value["params"], json!({}));
    }

    #[test]
    fn test_row_fills_missing_update_time() {
        let view: NotificationView = serde_json::from_value(json!({
            "id": "3",
            "phoneNumber": "+905551112233",
            "content": "hi",
            "status": "Sent",
            "statusCode": 3,
            "createdAt": "2024-01-01T00:00:00+00:00",
            "updatedAt": null
        }))
        .unwrap();
        let row = NotificationRow::from(view);
        assert_eq!(row.updated_at, "-");
        assert_eq!(row.to, "+905551112233");
    }
}
