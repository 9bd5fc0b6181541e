use adaptload_core::{Config, Metric, PerformanceMonitor};
use clap::Args;

#[derive(Args)]
pub struct BudgetArgs {
    /// Sample as metric=milliseconds (fcp, lcp, ttfb, fid, resource_load); repeatable
    #[arg(long = "sample", value_parser = parse_sample)]
    samples: Vec<(Metric, f64)>,
    /// Exit with an error when any metric is over budget
    #[arg(long)]
    strict: bool,
    /// Print JSON instead of text
    #[arg(long)]
    json: bool,
}

fn parse_sample(raw: &str) -> Result<(Metric, f64), String> {
    let (name, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected metric=ms, got '{raw}'"))?;
    let metric: Metric = name.parse()?;
    let value: f64 = value
        .trim()
        .parse()
        .map_err(|_| format!("invalid milliseconds for {metric}: '{value}'"))?;
    Ok((metric, value))
}

pub fn run(args: BudgetArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load_or_default();
    let mut monitor = PerformanceMonitor::new(config.monitor_config());
    for (metric, value) in args.samples {
        monitor.record(metric, value);
    }
    let report = monitor.report();

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        for line in &report {
            let observed = match line.observed {
                Some(v) => format!("{v:.0}ms"),
                None => "-".to_string(),
            };
            let status = if line.over_budget { "OVER" } else { "ok" };
            println!(
                "{:<14} {:>8} / {:>6}ms  {status}",
                line.metric.as_str(),
                observed,
                line.budget
            );
        }
    }

    let over = report.iter().filter(|r| r.over_budget).count();
    if args.strict && over > 0 {
        return Err(format!("{over} metric(s) over budget").into());
    }
    Ok(())
}
