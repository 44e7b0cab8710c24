//! Watch the message of the day.
//!
//! Demonstrates:
//! - Building a client against a subscription server
//! - A raw subscription with an invalidate callback
//! - A subscribed query that refetches on every invalidation
//! - Status changes across reconnects
//!
//! Usage:
//!   cargo run --example 001_motd_watch
//!   cargo run --example 001_motd_watch -- --url ws://localhost:8000/subscribe
//!   cargo run --example 001_motd_watch -- --debug

mod common;

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use bolts_client::{Client, Error, FnFetcher, Result};
use common::Args;

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() {
    let args = Args::parse();
    common::init_logging(args.debug);

    if let Err(e) = run(args).await {
        eprintln!("\n[ERROR] {e}");
        std::process::exit(1);
    }
}

async fn run(args: Args) -> Result<()> {
    println!("=== 001: MOTD Watch ===\n");

    // ========================================================================
    // Create Client
    // ========================================================================

    println!("[Setup] Connecting to {}...", args.url);
    let client = Client::builder().url(&args.url).build()?;

    // ========================================================================
    // Raw Subscription
    // ========================================================================

    let invalidations = Arc::new(AtomicU64::new(0));
    let motd = client.subscribe(["motd"], {
        let invalidations = Arc::clone(&invalidations);
        move || {
            let n = invalidations.fetch_add(1, Ordering::SeqCst) + 1;
            println!("[Signal] /motd invalidated ({n})");
        }
    });

    let status = motd.wait_for_status(|s| s.is_active() || s.is_terminal()).await;
    motd.check()?;
    println!("[Subscription] /motd is {status}\n");

    // ========================================================================
    // Subscribed Query
    // ========================================================================

    // Stand-in for an HTTP GET of the resource.
    let fetches = Arc::new(AtomicU64::new(0));
    let mut query = client.query(
        ["motd"],
        FnFetcher::new({
            let fetches = Arc::clone(&fetches);
            move || {
                let n = fetches.fetch_add(1, Ordering::SeqCst) + 1;
                async move { Ok::<_, Error>(format!("message of the day, revision {n}")) }
            }
        }),
    );

    println!("[Query] Waiting for changes, Ctrl+C to exit\n");
    let mut status = client.status_receiver();
    loop {
        tokio::select! {
            state = query.changed() => {
                if let Some(data) = &state.data {
                    println!("[Query] {data} (fetches: {})", state.fetch_count);
                }
                if let Some(e) = &state.error {
                    println!("[Query] fetch failed: {e}");
                }
            }
            Ok(()) = status.changed() => {
                println!("[Connection] {}", *status.borrow_and_update());
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    client.shutdown();
    println!("\n=== Done ===");
    Ok(())
}
