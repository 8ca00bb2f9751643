#![forbid(unsafe_code)]

//! `cluster-keeper-ctl`: local CLI companion for `cluster-keeper`.
//!
//! Queries the diagnostics routes a worker serves and asks a master to
//! drain its pool.

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(
    name = "cluster-keeper-ctl",
    about = "Local CLI for cluster-keeper",
    version,
    long_about = None
)]
struct Cli {
    /// Base URL of an application with diagnostics attached.
    #[arg(long, default_value = "http://127.0.0.1:3000")]
    url: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Check `/cluster/healthcheck`.
    Health,

    /// Print the pool snapshot from `/cluster/stats`.
    Stats,

    /// Send SIGQUIT to a master so it drains its workers.
    Quit {
        /// Master process id.
        pid: i32,
    },
}

fn main() {
    let args = Cli::parse();

    let outcome = match &args.command {
        Command::Health => fetch(&args.url, "/cluster/healthcheck").map(|body| println!("{body}")),
        Command::Stats => fetch(&args.url, "/cluster/stats").map(|body| {
            match serde_json::from_str::<serde_json::Value>(&body) {
                Ok(value) => println!("{}", serde_json::to_string_pretty(&value).unwrap_or(body)),
                Err(_) => println!("{body}"),
            }
        }),
        Command::Quit { pid } => send_quit(*pid).map(|()| println!("OK")),
    };

    if let Err(err) = outcome {
        eprintln!("Error: {err}");
        if !matches!(args.command, Command::Quit { .. }) {
            eprintln!("Is a cluster-keeper worker serving {}?", args.url);
        }
        std::process::exit(1);
    }
}

/// GET `path` under `base` and return the body of a successful response.
fn fetch(base: &str, path: &str) -> std::result::Result<String, Box<dyn std::error::Error>> {
    let url = format!("{}{path}", base.trim_end_matches('/'));
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    runtime.block_on(async move {
        let resp = reqwest::get(&url).await?;
        let status = resp.status();
        let body = resp.text().await?;
        if status.is_success() {
            Ok(body)
        } else {
            Err(format!("{url} returned {status}: {body}").into())
        }
    })
}

#[cfg(unix)]
fn send_quit(pid: i32) -> std::result::Result<(), Box<dyn std::error::Error>> {
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;

    kill(Pid::from_raw(pid), Signal::SIGQUIT)?;
    Ok(())
}

#[cfg(not(unix))]
fn send_quit(_pid: i32) -> std::result::Result<(), Box<dyn std::error::Error>> {
    Err("quit is only supported on unix".into())
}
