//! Verify a third-party widget loads - demonstrate batch checking
//!
//! Run with: cargo run --example verify_widget

use loadproof::{check_batch, format_call_stack, Result};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("loadproof=info".parse().unwrap()),
        )
        .init();

    println!("=== Loadproof Batch Verification Example ===\n");

    let website = "https://stripe.com/";
    let patterns = ["js.stripe.com", "m.stripe.network", "not-a-real-widget.example"];

    println!("Rendering {} once, checking {} patterns...\n", website, patterns.len());
    let report = check_batch(website, patterns, true).await?;

    for (pattern, result) in &report.results {
        if result.found {
            println!("FOUND    {} ({} request(s))", pattern, result.matching_requests.len());
            for event in result.matching_requests.values() {
                println!("  {} -> {:?} {}", event.url, event.status, event.initiator_type.as_str());
                println!("{}", indent(&format_call_stack(&event.call_stack)));
            }
        } else {
            println!("MISSING  {}", pattern);
        }
    }

    println!("\n=== Done ===");
    Ok(())
}

fn indent(text: &str) -> String {
    text.lines()
        .map(|l| format!("    {}", l))
        .collect::<Vec<_>>()
        .join("\n")
}
