use std::path::PathBuf;

use dealhound_engine::enrich::{build_enrich_request, run_catalog_enrich};

fn main() -> Result<(), String> {
    let args: Vec<String> = std::env::args().collect();

    if args.iter().any(|a| a == "-h" || a == "--help") {
        print_help();
        return Ok(());
    }

    let mut catalog: Option<PathBuf> = None;
    let mut images_dir: Option<PathBuf> = None;
    let mut public_prefix: Option<String> = None;
    let mut delay_ms: Option<u64> = None;
    let mut limit: Option<usize> = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--catalog" => {
                i += 1;
                let v = args
                    .get(i)
                    .ok_or_else(|| "--catalog requires a value".to_string())?;
                catalog = Some(PathBuf::from(v));
            }
            "--images-dir" => {
                i += 1;
                let v = args
                    .get(i)
                    .ok_or_else(|| "--images-dir requires a value".to_string())?;
                images_dir = Some(PathBuf::from(v));
            }
            "--public-prefix" => {
                i += 1;
                let v = args
                    .get(i)
                    .ok_or_else(|| "--public-prefix requires a value".to_string())?;
                public_prefix = Some(v.to_string());
            }
            "--delay-ms" => {
                i += 1;
                let v = args
                    .get(i)
                    .ok_or_else(|| "--delay-ms requires a value".to_string())?;
                delay_ms = Some(
                    v.parse::<u64>()
                        .map_err(|_| format!("invalid --delay-ms value: {v}"))?,
                );
            }
            "--limit" => {
                i += 1;
                let v = args
                    .get(i)
                    .ok_or_else(|| "--limit requires a value".to_string())?;
                limit = Some(
                    v.parse::<usize>()
                        .map_err(|_| format!("invalid --limit value: {v}"))?,
                );
            }
            other => return Err(format!("unknown arg: {other} (try --help)")),
        }
        i += 1;
    }

    let request = build_enrich_request(
        catalog.unwrap_or_else(|| PathBuf::from("data/deals.json")),
        images_dir.unwrap_or_else(|| PathBuf::from("public/images")),
        public_prefix,
        delay_ms,
        limit,
    )
    .map_err(|e| e.to_string())?;

    let summary = run_catalog_enrich(&request, |level, event, payload| {
        println!("[{level}] {event} {payload}");
        Ok(())
    })
    .map_err(|e| e.to_string())?;

    println!(
        "{}",
        serde_json::to_string_pretty(&summary).map_err(|e| e.to_string())?
    );
    if summary.catalog_rewritten {
        println!("Catalog rewritten: {}", summary.catalog_path);
    } else {
        println!("Catalog unchanged.");
    }

    Ok(())
}

fn print_help() {
    println!(
        r#"dealhound_enrich

Fills missing product images in the deal catalog: fetches each record's
source page, picks the best image candidate, downloads and normalizes it to
a square WebP, and records the local path back into the catalog.

Usage:
  cargo run --bin dealhound_enrich
  cargo run --bin dealhound_enrich -- --catalog data/deals.json --images-dir public/images

Options:
  --catalog <path>        Catalog JSON file (default: data/deals.json)
  --images-dir <path>     Directory for normalized images (default: public/images)
  --public-prefix <path>  Path prefix recorded into records (default: /images)
  --delay-ms <ms>         Pause after each successful record (default: 1000)
  --limit <n>             Process at most n records this run
"#
    );
}
