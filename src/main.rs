//! Host-side helper: `cargo run` builds the WASM bundle into `static/pkg` and
//! serves `static/` on a local HTTP server.
//!
//! `cargo run -- 9000` picks another port.

use std::process::{Command, ExitCode};
use std::{env, path::Path};

const DEFAULT_PORT: u16 = 8000;

fn main() -> ExitCode {
    // Only meaningful on non-wasm targets.
    if env::var("TARGET").unwrap_or_default() == "wasm32-unknown-unknown" {
        return ExitCode::SUCCESS;
    }

    let port = match env::args().nth(1).map(|arg| arg.parse::<u16>()) {
        None => DEFAULT_PORT,
        Some(Ok(port)) => port,
        Some(Err(e)) => {
            eprintln!("invalid port: {e}");
            return ExitCode::FAILURE;
        }
    };

    // 1. Compile wasm via wasm-pack into static/pkg
    println!("Building WASM pkg …");
    match Command::new("wasm-pack")
        .args(["build", "--release", "--target", "web", "--out-dir", "static/pkg"])
        .status()
    {
        Ok(st) if st.success() => {}
        Ok(_) => {
            eprintln!("wasm-pack finished with errors. Ensure wasm-pack is installed (https://rustwasm.github.io/wasm-pack/).");
            return ExitCode::FAILURE;
        }
        Err(_) => {
            eprintln!("wasm-pack not found in PATH. Skipping wasm build; the site may serve stale artifacts.");
        }
    }

    if !Path::new("static/index.html").exists() {
        eprintln!("static/index.html missing; run from the crate root");
        return ExitCode::FAILURE;
    }

    // 2. Serve `static/` until interrupted
    println!("Serving http://127.0.0.1:{port} (Ctrl-C to stop) …");
    match Command::new("python3")
        .args(["-m", "http.server", &port.to_string(), "--directory", "static"])
        .status()
    {
        Ok(st) if st.success() => ExitCode::SUCCESS,
        Ok(_) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("failed to start http server: {e}");
            ExitCode::FAILURE
        }
    }
}
