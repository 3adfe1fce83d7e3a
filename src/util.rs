use std::{path::Path, process::Command};

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};

pub fn format_relative_time(then: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let diff = now.signed_duration_since(then);
    if diff.num_seconds() < 0 {
        return "0s".to_string();
    }

    let seconds = diff.num_seconds();
    if seconds < 60 {
        return format!("{}s", seconds);
    }

    let minutes = diff.num_minutes();
    if minutes < 60 {
        return format!("{}m", minutes);
    }

    let hours = diff.num_hours();
    if hours < 24 {
        return format!("{}h", hours);
    }

    let days = diff.num_days();
    format!("{}d", days)
}

pub fn gh_auth_token() -> Result<String> {
    if let Ok(token) = std::env::var("GITHUB_TOKEN") {
        if !token.trim().is_empty() {
            return Ok(token.trim().to_string());
        }
    }

    let output = Command::new("gh")
        .args(["auth", "token", "-h", "github.com"])
        .output()
        .context("failed to run 'gh auth token -h github.com'")?;

    if output.status.success() {
        let token = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if !token.is_empty() {
            return Ok(token);
        }
    }

    let output = Command::new("gh")
        .args(["auth", "token"])
        .output()
        .context("failed to run 'gh auth token'")?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(anyhow!(
            "failed to read GitHub token (run 'gh auth login'): {}",
            stderr.trim()
        ));
    }

    let token = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if token.is_empty() {
        return Err(anyhow!("GitHub token was empty; run 'gh auth login'"));
    }

    Ok(token)
}

pub fn open_in_browser(url: &str) -> Result<()> {
    let status = if cfg!(target_os = "macos") {
        Command::new("open").arg(url).status()
    } else if cfg!(target_os = "windows") {
        Command::new("cmd").args(["/c", "start", "", url]).status()
    } else {
        Command::new("xdg-open").arg(url).status()
    }
    .context("failed to spawn browser command")?;

    if !status.success() {
        return Err(anyhow!("browser command failed"));
    }

    Ok(())
}

/// Splits `$VISUAL` or `$EDITOR` into a program and its arguments.
fn editor_command(visual: Option<&str>, editor: Option<&str>) -> (String, Vec<String>) {
    let configured = [visual, editor]
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|value| !value.is_empty());

    let Some(configured) = configured else {
        return ("vi".to_string(), Vec::new());
    };

    let mut parts = configured.split_whitespace().map(str::to_string);
    let program = parts.next().unwrap_or_else(|| "vi".to_string());
    (program, parts.collect())
}

pub fn open_in_editor(path: &Path) -> Result<()> {
    let visual = std::env::var("VISUAL").ok();
    let editor = std::env::var("EDITOR").ok();
    let (program, args) = editor_command(visual.as_deref(), editor.as_deref());

    let status = Command::new(&program)
        .args(&args)
        .arg(path)
        .status()
        .with_context(|| format!("failed to launch editor '{}'", program))?;

    if !status.success() {
        return Err(anyhow!("{} exited with status {}", program, status));
    }

    Ok(())
}
