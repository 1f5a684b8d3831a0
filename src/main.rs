//! Loadproof CLI
//!
//! Discover, explain, and verify third-party integrations:
//! ask a codebase Q&A service what a repo integrates with, cache the answers,
//! then prove on a live page render which integration scripts really load.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};

use loadproof::{
    check_batch_with_config, format_call_stack, CaptureConfig, DiscoveredIntegration,
    ExtractorClient, MatchResult, QaClient,
};

const DEFAULT_CACHE: &str = "integrations.json";

#[derive(Parser)]
#[command(name = "loadproof", version, about = "Verify third-party integrations on live pages")]
struct Cli {
    /// Path to the integrations cache file
    #[arg(long, global = true, default_value = DEFAULT_CACHE)]
    cache: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Discover integrations in a repository and cache them
    Discover {
        /// GitHub repository to analyze (owner/name)
        #[arg(long)]
        repo: String,
        /// Submit the repository for indexing first
        #[arg(long)]
        index: bool,
    },
    /// List cached integrations
    List,
    /// Explain how a cached integration works in the repository
    Explain {
        /// Integration name (as cached by discover)
        name: String,
    },
    /// Check whether a cached integration's URLs load on a website
    Check {
        /// Integration name (as cached by discover)
        name: String,
        /// Website to render
        website_url: String,
        /// Run Chrome with a visible window
        #[arg(long)]
        visible: bool,
    },
    /// Check arbitrary URL patterns on a website, without the cache
    Verify {
        /// Website to render
        website_url: String,
        /// URL substring pattern to look for (repeatable)
        #[arg(short, long = "pattern", required = true)]
        patterns: Vec<String>,
        /// Run Chrome with a visible window
        #[arg(long)]
        visible: bool,
        /// Print the report as JSON instead of text
        #[arg(long)]
        json: bool,
    },
}

/// On-disk cache of discovered integrations, owned by the CLI layer.
/// The capture engine only ever sees the `urls` entries as target patterns.
#[derive(Debug, Default, Serialize, Deserialize)]
struct IntegrationsFile {
    #[serde(default)]
    repo: String,
    #[serde(default)]
    integrations: Vec<DiscoveredIntegration>,
}

impl IntegrationsFile {
    fn load(path: &Path) -> loadproof::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let data = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&data)?)
    }

    fn save(&self, path: &Path) -> loadproof::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    fn find(&self, name: &str) -> Option<&DiscoveredIntegration> {
        self.integrations
            .iter()
            .find(|i| i.name.eq_ignore_ascii_case(name))
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("loadproof=info".parse().unwrap()),
        )
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Command::Discover { repo, index } => cmd_discover(&cli.cache, &repo, index).await,
        Command::List => cmd_list(&cli.cache),
        Command::Explain { name } => cmd_explain(&cli.cache, &name).await,
        Command::Check {
            name,
            website_url,
            visible,
        } => cmd_check(&cli.cache, &name, &website_url, visible).await,
        Command::Verify {
            website_url,
            patterns,
            visible,
            json,
        } => cmd_verify(&website_url, patterns, visible, json).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::from(1)
        }
    }
}

async fn cmd_discover(cache: &Path, repo: &str, index: bool) -> loadproof::Result<()> {
    let qa = QaClient::from_env()?;
    let extractor = ExtractorClient::from_env()?;

    if index {
        println!("Indexing {}...", repo);
        qa.index_repo(repo).await?;
    }

    println!("Discovering integrations in {}...", repo);
    let question = "List all third-party API integrations in this codebase. \
        For each integration, provide: \
        1. The name of the service (e.g., Stripe, Twilio, SendGrid) \
        2. A brief description of how it's used \
        3. Any URLs or endpoints associated with it. \
        Format your response clearly with each integration on its own section.";
    let answer = qa.ask_about_code(question, repo).await?;

    println!("Extracting integration details...");
    let integrations = extractor.extract_integrations(&answer).await?;

    if integrations.is_empty() {
        println!("No integrations found.");
        return Ok(());
    }

    println!("Found {} integration(s):", integrations.len());
    for integration in &integrations {
        println!("  {}: {}", integration.name, integration.description);
    }

    let file = IntegrationsFile {
        repo: repo.to_string(),
        integrations,
    };
    file.save(cache)?;
    println!("Saved to {}", cache.display());
    Ok(())
}

fn cmd_list(cache: &Path) -> loadproof::Result<()> {
    let file = IntegrationsFile::load(cache)?;

    if file.integrations.is_empty() {
        println!("No integrations cached. Run 'loadproof discover --repo <owner/name>' first.");
        return Ok(());
    }

    println!("Integrations in {}:\n", file.repo);
    for integration in &file.integrations {
        println!("  {}", integration.name);
        println!("    {}", integration.description);
        if integration.urls.is_empty() {
            println!("    URLs: (none)\n");
        } else {
            println!("    URLs: {}\n", integration.urls.join(", "));
        }
    }
    Ok(())
}

async fn cmd_explain(cache: &Path, name: &str) -> loadproof::Result<()> {
    let file = IntegrationsFile::load(cache)?;
    let Some(integration) = file.find(name) else {
        println!(
            "Integration '{}' not found in cache. Run 'loadproof list' to see what's available.",
            name
        );
        return Ok(());
    };

    let qa = QaClient::from_env()?;
    println!("Explaining '{}' integration...\n", integration.name);

    let question = format!(
        "Explain in detail how the {} integration works in this codebase. \
         Include: which files use it, how it's configured, and any important \
         implementation details.",
        integration.name
    );
    let answer = qa.ask_about_code(&question, &file.repo).await?;
    println!("{}", answer);

    if !integration.urls.is_empty() {
        println!("\nKnown URLs:");
        for url in &integration.urls {
            println!("  {}", url);
        }
    }
    Ok(())
}

async fn cmd_check(
    cache: &Path,
    name: &str,
    website_url: &str,
    visible: bool,
) -> loadproof::Result<()> {
    let file = IntegrationsFile::load(cache)?;
    let Some(integration) = file.find(name) else {
        println!(
            "Integration '{}' not found in cache. Run 'loadproof list' to see what's available.",
            name
        );
        return Ok(());
    };

    if integration.urls.is_empty() {
        println!(
            "No URLs cached for '{}'; edit {} to add some.",
            integration.name,
            cache.display()
        );
        return Ok(());
    }

    println!("Checking '{}' on {}...\n", integration.name, website_url);

    // One page render for the whole URL set, so per-URL results are comparable
    let config = capture_config(visible);
    let report = check_batch_with_config(website_url, integration.urls.clone(), &config).await?;

    for url in &integration.urls {
        if let Some(result) = report.result(url) {
            print_match(url, result);
        }
    }
    Ok(())
}

async fn cmd_verify(
    website_url: &str,
    patterns: Vec<String>,
    visible: bool,
    json: bool,
) -> loadproof::Result<()> {
    let config = capture_config(visible);
    let report = check_batch_with_config(website_url, patterns, &config).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("Checked {}\n", report.website_url);
    for (pattern, result) in &report.results {
        print_match(pattern, result);
    }
    Ok(())
}

fn capture_config(visible: bool) -> CaptureConfig {
    if visible {
        CaptureConfig::visible()
    } else {
        CaptureConfig::default()
    }
}


fn print_match(pattern: &str, result: &MatchResult) {
    println!("Looking for: {}", pattern);
    if !result.found {
        println!("  NOT FOUND on this page\n");
        return;
    }

    println!("  FOUND");
    for event in result.matching_requests.values() {
        match event.status {
            Some(status) => println!(
                "  {} {} {}",
                event.url,
                status,
                event.status_text.as_deref().unwrap_or("")
            ),
            None => println!("  {} (no response)", event.url),
        }
        if let Some(error) = &event.error {
            println!("  Error: {}", error);
        }
        if let Some(reason) = &event.blocked_reason {
            println!("  Blocked: {}", reason);
        }
        println!("  Initiator: {}", event.initiator_type.as_str());
        if let Some(initiator_url) = &event.initiator_url {
            println!("  Initiated by: {}", initiator_url);
        }
        println!("  Call stack:");
        for line in format_call_stack(&event.call_stack).lines() {
            println!("    {}", line);
        }
    }
    println!();
}
