// src/main.rs

use perfrun::{cli, run};

#[tokio::main]
async fn main() {
    let args = match cli::try_parse() {
        Ok(args) => args,
        Err(err) => {
            // Help, version and bad flags all print usage and exit cleanly.
            let _ = err.print();
            std::process::exit(0);
        }
    };

    if let Err(err) = run(args).await {
        eprintln!("perfrun error: {err:#}");
        std::process::exit(err.exit_code());
    }
}
