// Copyright 2026 Forage Contributors
// SPDX-License-Identifier: Apache-2.0

use anyhow::{Context, Result};
use clap::Parser;
use forage::harvest::{HarvestConfig, Harvester};
use forage::request::{Backend, FetchMode, ImageKind, ProxyScheme, ProxySpec, SearchRequest};
use forage::session::chromium::ChromiumBrowser;
use forage::session::{Browser, NoopBrowser};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

#[derive(Parser)]
#[command(
    name = "forage",
    about = "Forage — keyword image-URL harvester for search backends",
    version
)]
struct Cli {
    /// Keyword phrase to search for
    keywords: String,

    /// Search backend (google, bing, baidu)
    #[arg(long, short, default_value = "google")]
    engine: Backend,

    /// Harvest strategy (render drives a browser, api hits paging endpoints)
    #[arg(long, default_value = "render")]
    mode: FetchMode,

    /// Maximum number of URLs to collect (0 = unlimited)
    #[arg(long, default_value_t = 100)]
    max_number: usize,

    /// Restrict results to faces
    #[arg(long)]
    face_only: bool,

    /// Ask the backend to filter explicit results (Google only)
    #[arg(long)]
    safe_mode: bool,

    /// Image type filter (photo, clipart, linedrawing, animated)
    #[arg(long)]
    image_type: Option<ImageKind>,

    /// Color filter (e.g. red, bw; Baidu accepts a fixed set)
    #[arg(long)]
    color: Option<String>,

    /// Proxy address as host:port
    #[arg(long)]
    proxy: Option<String>,

    /// Proxy scheme (http, socks5)
    #[arg(long, default_value = "http")]
    proxy_type: ProxyScheme,

    /// Run the browser with a visible window
    #[arg(long)]
    headful: bool,

    /// Write URLs to this file, one per line, instead of stdout
    #[arg(long, short)]
    output: Option<PathBuf>,

    /// Emit the full harvest report as JSON
    #[arg(long)]
    json: bool,

    /// Enable verbose/debug logging
    #[arg(long, short)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let directive = if cli.verbose {
        "forage=debug"
    } else {
        "forage=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(directive.parse().unwrap()),
        )
        .init();

    if let Err(e) = run(&cli).await {
        eprintln!("  Error: {e:#}");
        std::process::exit(1);
    }
    Ok(())
}

async fn run(cli: &Cli) -> Result<()> {
    let proxy = cli
        .proxy
        .as_ref()
        .map(|host| ProxySpec::new(cli.proxy_type, host.clone()));

    let request = SearchRequest {
        keywords: cli.keywords.clone(),
        backend: cli.engine,
        mode: cli.mode,
        max_urls: cli.max_number,
        face_only: cli.face_only,
        safe_search: cli.safe_mode,
        image_kind: cli.image_type,
        color: cli.color.clone(),
        proxy,
    };

    // API mode never touches a browser; don't require one to be installed.
    let browser: Arc<dyn Browser> = match cli.mode {
        FetchMode::Render => Arc::new(ChromiumBrowser::new()?),
        FetchMode::Api => Arc::new(NoopBrowser),
    };
    let config = HarvestConfig {
        headless: !cli.headful,
        ..HarvestConfig::default()
    };

    let harvester = Harvester::new(browser, config);
    let report = harvester.harvest(&request).await?;
    info!(
        "harvest finished with {} of {} requested",
        report.delivered(),
        report.requested
    );

    let rendered = if cli.json {
        let mut json = serde_json::to_string_pretty(&report)?;
        json.push('\n');
        json
    } else {
        let mut lines = report.urls.join("\n");
        if !lines.is_empty() {
            lines.push('\n');
        }
        lines
    };

    match &cli.output {
        Some(path) => {
            std::fs::write(path, &rendered)
                .with_context(|| format!("failed to write {}", path.display()))?;
            eprintln!("  Wrote {} url(s) to {}", report.delivered(), path.display());
        }
        None => print!("{rendered}"),
    }
    Ok(())
}
