//! `livetabs` client subcommands: talk to a running daemon's control server.

use anyhow::anyhow;
use serde_json::{Value, json};

use crate::config::ControlConfig;

#[derive(Debug, thiserror::Error)]
pub enum ControlError {
    #[error("livetabs daemon is not running")]
    Unavailable,

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ControlError {
    pub fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_connect() {
            Self::Unavailable
        } else {
            Self::Other(err.into())
        }
    }
}

async fn read_json(resp: reqwest::Response) -> Result<Value, ControlError> {
    let status = resp.status();
    if !status.is_success() {
        let text = resp.text().await.unwrap_or_default();
        return Err(anyhow!("{}: {}", status, text.trim()).into());
    }
    resp.json().await.map_err(ControlError::from_reqwest)
}

async fn post(ctl: &ControlConfig, path: &str, body: Value) -> Result<Value, ControlError> {
    let url = format!("{}{}", ctl.base_url(), path);
    let resp = reqwest::Client::new()
        .post(&url)
        .json(&body)
        .send()
        .await
        .map_err(ControlError::from_reqwest)?;
    read_json(resp).await
}

async fn get(ctl: &ControlConfig, path: &str) -> Result<Value, ControlError> {
    let url = format!("{}{}", ctl.base_url(), path);
    let resp = reqwest::get(&url)
        .await
        .map_err(ControlError::from_reqwest)?;
    read_json(resp).await
}

pub async fn ping_command(ctl: &ControlConfig) -> Result<(), ControlError> {
    let json = post(ctl, "/api/command", json!({ "type": "ping" })).await?;
    let enabled = json["enabled"].as_bool().unwrap_or(false);
    println!(
        "alive ({})",
        if enabled { "polling enabled" } else { "polling disabled" }
    );
    Ok(())
}

/// Force a poll cycle and print its outcome.
pub async fn poll_command(ctl: &ControlConfig) -> Result<(), ControlError> {
    let json = post(ctl, "/api/poll", json!({})).await?;
    println!("{}", format_outcome(&json));
    Ok(())
}

pub async fn reload_command(ctl: &ControlConfig) -> Result<(), ControlError> {
    let json = post(ctl, "/api/reload", json!({})).await?;
    let poll = &json["settings"]["poll"];
    println!(
        "Configuration reloaded (max_tabs={}, check_interval={}s)",
        poll["max_tabs"], poll["check_interval_sec"]
    );
    Ok(())
}

pub async fn toggle_command(ctl: &ControlConfig, enabled: Option<bool>) -> Result<(), ControlError> {
    let json = post(ctl, "/api/toggle", json!({ "enabled": enabled })).await?;
    let enabled = json["enabled"].as_bool().unwrap_or(false);
    println!("Polling {}", if enabled { "enabled" } else { "disabled" });
    Ok(())
}

pub async fn status_command(ctl: &ControlConfig, raw: bool) -> Result<(), ControlError> {
    let json = get(ctl, "/api/diagnostics").await?;
    if raw {
        let pretty = serde_json::to_string_pretty(&json).map_err(anyhow::Error::from)?;
        println!("{}", pretty);
    } else {
        print!("{}", format_status(&json));
    }
    Ok(())
}

fn string_list(value: &Value) -> String {
    let items: Vec<&str> = value
        .as_array()
        .map(|items| items.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default();
    if items.is_empty() {
        "-".to_string()
    } else {
        items.join(", ")
    }
}

pub fn format_outcome(outcome: &Value) -> String {
    match outcome["status"].as_str().unwrap_or("unknown") {
        "ran" => format!(
            "Poll ran: {} live via {}, opened {}, closed {}, {} managed tab(s) open",
            outcome["live"],
            outcome["source"].as_str().unwrap_or("none"),
            outcome["opened"],
            outcome["closed"],
            outcome["open_count"],
        ),
        "failed" => format!(
            "Poll failed: {}",
            outcome["error"].as_str().unwrap_or("unknown error")
        ),
        "still_busy" => "Poll still running after waiting; try again shortly".to_string(),
        "disabled" => "Polling is disabled".to_string(),
        other => format!("Poll skipped ({})", other),
    }
}

pub fn format_status(diag: &Value) -> String {
    let mut out = String::new();
    let enabled = diag["enabled"].as_bool().unwrap_or(false);
    out.push_str(&format!(
        "  Polling:    {}{}\n",
        if enabled { "enabled" } else { "disabled" },
        if diag["busy"].as_bool().unwrap_or(false) { " (busy)" } else { "" }
    ));
    out.push_str(&format!(
        "  Tabs:       {}/{} managed, limit {}\n",
        diag["open_count"], diag["max_tabs"], diag["tab_limit"]
    ));
    out.push_str(&format!(
        "  Live:       {} via {}\n",
        string_list(&diag["live"]),
        diag["source"].as_str().unwrap_or("none")
    ));
    out.push_str(&format!("  Open:       {}\n", string_list(&diag["open"])));
    out.push_str(&format!(
        "  Sources:    {}\n",
        string_list(&diag["sources"])
    ));
    out.push_str(&format!(
        "  Last cycle: {}\n",
        diag["last_cycle_at"].as_str().unwrap_or("never")
    ));

    if let Some(recent) = diag["recent"].as_array().filter(|r| !r.is_empty()) {
        out.push_str("\n  Recent activity:\n");
        for entry in recent {
            out.push_str(&format!(
                "    {}  {:<10} {}\n",
                entry["at"].as_str().unwrap_or(""),
                entry["kind"].as_str().unwrap_or(""),
                entry["detail"].as_str().unwrap_or("")
            ));
        }
    }
    out
}
