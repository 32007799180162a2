//! echo-client: send one request to an echo-reactor server and print the reply.
//!
//! ```text
//! echo-client 127.0.0.1 1234 set key value      # length-prefixed request
//! echo-client --line 127.0.0.1 1234 ping        # newline-framed echo
//! ```
//!
//! Exits 0 on success and 1 on any failure, usage errors included.

use clap::Parser;
use echo_reactor::client::Client;
use std::process::ExitCode;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "echo-client")]
#[command(version)]
#[command(about = "Send one request to an echo-reactor server", long_about = None)]
struct Cli {
    /// Server IP address or host name
    host: String,

    /// Server port
    port: u16,

    /// Arguments sent as one request
    args: Vec<String>,

    /// Send the arguments as one newline-terminated line instead of a framed request
    #[arg(long)]
    line: bool,

    /// Give up waiting for the response after this many milliseconds
    #[arg(long)]
    timeout_ms: Option<u64>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn")]
    log_level: String,
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return if e.use_stderr() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("client error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> echo_reactor::Result<()> {
    let addr = format!("{}:{}", cli.host, cli.port);
    let mut client = Client::connect(&addr, cli.timeout_ms.map(Duration::from_millis))?;

    if cli.line {
        client.send_line(cli.args.join(" ").as_bytes())?;
        let line = client.receive_line()?;
        print!("{}", String::from_utf8_lossy(&line));
    } else {
        let response = client.call(&cli.args)?;
        println!("server says: [{}] {}", response.status, response.body_lossy());
    }
    Ok(())
}
