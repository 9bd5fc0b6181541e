use adaptload_core::cache::{self, headers_for_path};
use adaptload_core::Config;
use clap::Args;
use serde_json::json;

#[derive(Args)]
pub struct HeadersArgs {
    /// Request path (e.g. "/fonts/geist.woff2")
    path: String,
    /// Print JSON instead of text
    #[arg(long)]
    json: bool,
}

pub fn run(args: HeadersArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load_or_default();
    let (class, headers) = headers_for_path(&args.path, &config.cache.cdn_mirror_headers);

    if args.json {
        let out = json!({
            "path": args.path,
            "class": class,
            "strategy": cache::assign(class),
            "headers": headers,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    println!("class: {}", class.as_str());
    for (name, value) in &headers {
        println!("{name}: {value}");
    }
    Ok(())
}
