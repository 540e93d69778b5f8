use anyhow::Result;
use simplelog::WriteLogger;
use std::env;
use std::path::PathBuf;
use std::sync::Arc;
use studysync::context::{SharedContext, StandardContext};

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = env::args().collect();

    // Handle help flag
    if args.len() > 1 && (args[1] == "--help" || args[1] == "-h" || args[1] == "help") {
        studysync::cli::print_help("studysync");
        return Ok(());
    }

    let mut override_root: Option<PathBuf> = None;
    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--root" | "-r" => {
                if i + 1 < args.len() {
                    override_root = Some(args[i + 1].clone().into());
                    i += 1; // Also consumed the value
                }
            }
            _ => { /* Ignore unknown flags */ }
        }
        i += 1;
    }

    let ctx: SharedContext = Arc::new(StandardContext::new(override_root));

    // Log to a file; stdout belongs to the terminal UI.
    if let Some(log_path) = ctx.get_log_file_path()
        && let Ok(file) = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_path)
    {
        let _ = WriteLogger::init(
            log::LevelFilter::Info,
            simplelog::Config::default(),
            file,
        );
    }

    studysync::tui::run(ctx).await
}
