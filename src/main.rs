use anyhow::Context;
use authenex_lib::services::ConfigStore;
use authenex_lib::{init_logging, run, run_config, CliArgs, ConfigCommand};

fn config_main(words: &[String]) -> anyhow::Result<()> {
    let cmd = match ConfigCommand::parse(words) {
        Ok(cmd) => cmd,
        Err(usage) => {
            eprintln!("{}", usage);
            std::process::exit(2);
        }
    };
    let dir = ConfigStore::default_config_dir().context("no user config directory on this platform")?;
    let output = run_config(&cmd, &ConfigStore::new(dir)).map_err(anyhow::Error::msg)?;
    println!("{}", output);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let raw: Vec<String> = std::env::args().skip(1).collect();
    if raw.first().map(String::as_str) == Some("config") {
        init_logging();
        return config_main(&raw[1..]);
    }
    let args = match CliArgs::parse(&raw) {
        Ok(args) => args,
        Err(usage) => {
            eprintln!("{}", usage);
            std::process::exit(2);
        }
    };

    init_logging();

    let report = run(&args)
        .await
        .with_context(|| format!("analysis of {} failed", args.path.display()))?;
    let json = serde_json::to_string_pretty(&report)?;

    match &args.out {
        Some(out) => {
            std::fs::write(out, &json).with_context(|| format!("write {} failed", out.display()))?;
            eprintln!("Wrote JSON: {}", out.display());
        }
        None => println!("{}", json),
    }

    eprintln!(
        "{} (trust score {}): {}",
        report.verdict.verdict.label(),
        report.verdict.trust_score,
        report.explanation
    );
    Ok(())
}
