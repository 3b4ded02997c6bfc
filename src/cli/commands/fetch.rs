//! One-off paced request.

use std::io::Write;

use anyhow::Context;
use console::style;
use reqwest::Method;

use crate::config::Settings;
use crate::scrapers::{RequestOptions, Requester};

pub struct FetchArgs {
    pub url: String,
    pub method: String,
    pub headers: Vec<String>,
    pub query: Vec<String>,
    pub data: Option<String>,
    pub body_only: bool,
}

/// Parse a `Name: value` header argument.
fn parse_header(raw: &str) -> anyhow::Result<(String, String)> {
    let (name, value) = raw
        .split_once(':')
        .with_context(|| format!("Invalid header '{}', expected 'Name: value'", raw))?;
    let name = name.trim();
    if name.is_empty() {
        anyhow::bail!("Invalid header '{}': empty name", raw);
    }
    Ok((name.to_string(), value.trim().to_string()))
}

/// Parse a `key=value` query argument.
fn parse_query(raw: &str) -> anyhow::Result<(String, String)> {
    let (key, value) = raw
        .split_once('=')
        .with_context(|| format!("Invalid query parameter '{}', expected 'key=value'", raw))?;
    Ok((key.to_string(), value.to_string()))
}

fn build_options(args: &FetchArgs) -> anyhow::Result<RequestOptions> {
    let mut options = RequestOptions::new();
    for raw in &args.headers {
        let (name, value) = parse_header(raw)?;
        options = options.header(name, value);
    }
    for raw in &args.query {
        let (key, value) = parse_query(raw)?;
        options = options.query(key, value);
    }
    if let Some(ref data) = args.data {
        options = options.body(data.as_bytes());
    }
    Ok(options)
}

pub async fn cmd_fetch(settings: &Settings, args: FetchArgs) -> anyhow::Result<()> {
    let method = Method::from_bytes(args.method.to_uppercase().as_bytes())
        .with_context(|| format!("Invalid HTTP method '{}'", args.method))?;
    let options = build_options(&args)?;

    let requester = Requester::new(settings.requester_config())?;
    let response = requester.fetch(method, &args.url, options).await?;

    if !args.body_only {
        let status = if response.is_success() {
            style(response.status.to_string()).green()
        } else {
            style(response.status.to_string()).red()
        };
        eprintln!(
            "{} {} ({} attempt{})",
            style("→").dim(),
            status,
            response.attempts,
            if response.attempts == 1 { "" } else { "s" }
        );
    }

    let mut stdout = std::io::stdout().lock();
    stdout.write_all(&response.body)?;
    if !response.body.ends_with(b"\n") {
        writeln!(stdout)?;
    }
    Ok(())
}
