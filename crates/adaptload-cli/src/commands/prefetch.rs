use adaptload_core::{
    resolve, ConnectionProfile, HttpHintSink, PrefetchOutcome, Prefetcher, PriorityTier, ProximitySignal, ResourceKind,
};
use clap::Args;
use url::Url;

#[derive(Args)]
pub struct PrefetchArgs {
    /// URLs to warm; relative URLs need --base
    #[arg(required = true)]
    urls: Vec<String>,
    /// Origin relative URLs are resolved against
    #[arg(long)]
    base: Option<Url>,
    /// Priority tier; only high grants a preload
    #[arg(long, default_value = "high")]
    tier: PriorityTier,
    /// Resource kind announced with the hint
    #[arg(long, default_value = "image")]
    kind: ResourceKind,
}

pub fn run(args: PrefetchArgs) -> Result<(), Box<dyn std::error::Error>> {
    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(async move {
        // Warming happens ahead of any viewport, on the assumption of a fast link.
        let decision = resolve(
            args.tier,
            args.kind,
            &ConnectionProfile::fast_default(),
            ProximitySignal::new(false, true),
        );
        let mut prefetcher = Prefetcher::new(HttpHintSink::new(args.base));

        for url in &args.urls {
            let outcome = prefetcher.prefetch(url, args.kind, &decision);
            let label = match outcome {
                PrefetchOutcome::Issued => "issued",
                PrefetchOutcome::AlreadyHinted => "duplicate",
                PrefetchOutcome::NotEligible => "not eligible",
                PrefetchOutcome::HintFailed => "failed",
            };
            println!("{label}: {url}");
        }

        let awaited = prefetcher.sink_mut().flush().await;
        tracing::info!(awaited, "prefetch hints flushed");
    });
    Ok(())
}
