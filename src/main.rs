use std::process;

use zeus::cli;
use zeus::store::Store;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::try_from_env("ZEUS_LOG").unwrap_or_else(|_| "info".into()))
        .init();

    let cli = cli::parse();
    let cwd = std::env::current_dir().unwrap_or_else(|e| {
        eprintln!("Error: could not determine current directory: {e}");
        process::exit(1);
    });
    let root = cli::resolve_root(&cli, &cwd);

    let store = if cli::is_init(&cli) { Store::init(&root) } else { Store::open(&root) };
    let store = match store {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error: {e}");
            process::exit(e.exit_code());
        }
    };

    match cli::run(&cli, &store) {
        Ok(code) => process::exit(code),
        Err(e) => {
            eprintln!("Error: {e}");
            process::exit(e.exit_code());
        }
    }
}
