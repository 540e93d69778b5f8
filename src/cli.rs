// File: ./src/cli.rs
//! Shared command-line interface logic, like printing help.

pub fn print_help(binary_name: &str) {
    println!(
        "StudySync v{} - A shared task tracker for study groups (TUI)",
        env!("CARGO_PKG_VERSION")
    );
    println!();
    println!("USAGE:");
    println!("    {} [--root <path>]", binary_name);
    println!("    {} --help", binary_name);
    println!();
    println!("OPTIONS:");
    println!("    -r, --root <path>     Use a different directory for config and data.");
    println!("    -h, --help            Show this help message.");
    println!();
    println!("KEYBINDINGS:");
    println!("    Press '?' inside the app for full interactive help");
    println!();
    println!("CONFIGURATION:");
    println!("    On first start the app asks for the backend project id and web API");
    println!("    key, verifies them, and writes config.toml. Editable keys:");
    println!();
    println!("    api_key        Web API key of the backend project");
    println!("    project_id     Project id the document tree is rooted at");
    println!("    auth_url       Identity endpoint (override for emulators)");
    println!("    token_url      Token refresh endpoint");
    println!("    firestore_url  Document store endpoint");
    println!("    poll_secs      Seconds between live snapshot polls (default 5)");
    println!();
    println!("FILES:");
    println!("    config.toml    Connection settings (config dir)");
    println!("    session.json   Persisted sign-in, delete to force a fresh login (data dir)");
    println!("    dashboard_*.json  Offline copy of your courses and tasks (cache dir)");
    println!();
    println!("MORE INFO:");
    println!("    Repository: https://codeberg.org/studysync/studysync");
    println!("    License:    GPL-3.0");
}
