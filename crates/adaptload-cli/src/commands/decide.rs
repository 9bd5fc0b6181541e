use adaptload_core::network::DEFAULT_DOWNLINK_MBPS;
use adaptload_core::{
    resolve_with, Config, ConnectionInfo, HostSignal, NetworkSampler, PriorityTier, ProximitySignal, ResolveOptions,
    ResourceKind,
};
use clap::Args;

#[derive(Args)]
pub struct DecideArgs {
    /// Priority tier (high, medium, low); defaults to the configured tier
    #[arg(long)]
    tier: Option<PriorityTier>,
    /// Resource kind (image, video, script, style)
    #[arg(long, default_value = "image")]
    kind: ResourceKind,
    /// Effective connection type reported by the host (4g, 3g, 2g, slow-2g)
    #[arg(long, default_value = "4g")]
    effective_type: String,
    /// Downlink estimate in Mbps
    #[arg(long, default_value_t = DEFAULT_DOWNLINK_MBPS)]
    downlink: f64,
    /// The user requested reduced data usage
    #[arg(long)]
    save_data: bool,
    /// Resolve as if the host exposes no connection signal
    #[arg(long, conflicts_with_all = ["effective_type", "downlink", "save_data"])]
    no_signal: bool,
    /// The target is inside its visibility margin
    #[arg(long)]
    in_view: bool,
    /// The target crossed its preload boundary
    #[arg(long)]
    boundary: bool,
    /// Override the preload boundary in pixels
    #[arg(long)]
    preload_distance: Option<u32>,
    /// Print JSON instead of text
    #[arg(long)]
    json: bool,
}

pub fn run(args: DecideArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load_or_default();
    let tier = args.tier.unwrap_or(config.loading.priority);

    let info = ConnectionInfo::new(args.effective_type, args.downlink, args.save_data);
    let signal = if args.no_signal {
        HostSignal::Unavailable
    } else {
        HostSignal::Available(&info)
    };
    let mut sampler = NetworkSampler::new(config.loading.connection_aware);
    let profile = sampler.sample(signal);

    let options = ResolveOptions {
        preload_distance_px: args.preload_distance.or(config.loading.preload_distance_px),
    };
    let decision = resolve_with(
        tier,
        args.kind,
        &profile,
        ProximitySignal::new(args.in_view, args.boundary),
        &options,
    );

    if args.json {
        println!("{}", serde_json::to_string_pretty(&decision)?);
        return Ok(());
    }

    println!("tier:                {tier}");
    println!("connection:          {:?}", decision.connection_class);
    println!("should_preload:      {}", decision.should_preload);
    println!("should_load_now:     {}", decision.should_load_now);
    println!("target_quality:      {}", decision.target_quality);
    println!("visibility_margin:   {}px", decision.visibility_margin_px);
    println!("visibility_threshold: {}", decision.visibility_threshold);
    println!("preload_distance:    {}px", decision.preload_distance_px);
    Ok(())
}
