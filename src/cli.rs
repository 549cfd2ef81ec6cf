use std::io::{self, Write};
use std::time::Duration;

use orbitrack::parser::{self, Command};

const DEFAULT_HOST: &str = "http://127.0.0.1:8080";

fn main() {
    let host = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_HOST.to_string());
    let host = host.trim_end_matches('/').to_string();

    print_banner(&host);

    let http = match reqwest::blocking::Client::builder()
        .timeout(Duration::from_secs(15))
        .build()
    {
        Ok(client) => client,
        Err(e) => {
            println!("[\u{2717}] Could not build HTTP client: {e}");
            return;
        }
    };

    match http.get(format!("{host}/health")).send() {
        Ok(_) => println!("[\u{2713}] Connected to orbitrack at {host}!"),
        Err(_) => {
            println!("[\u{2717}] Could not reach the server at {host}.");
            println!("    Make sure the orbitrack daemon is running.");
            return;
        }
    }
    println!("Type 'HELP' for supported commands or 'EXIT' to quit.\n");

    let stdin = io::stdin();
    let mut buffer = String::new();

    loop {
        print!("orbitrack> ");
        let _ = io::stdout().flush();
        buffer.clear();

        match stdin.read_line(&mut buffer) {
            Ok(0) => break,
            Ok(_) => {}
            Err(_) => break,
        }
        if buffer.trim().is_empty() {
            continue;
        }

        match parser::parse_command(&buffer) {
            Ok(cmd) => {
                if let Err(e) = execute_command(&http, &host, cmd) {
                    println!("[\u{26a0}\u{fe0f} Error] {e}");
                }
            }
            Err(e) => {
                println!("[\u{2717} Syntax Error] {e}");
                println!("    \u{2139}\u{fe0f}  Hint: epochs look like 2025-047T12:00:00.000Z");
            }
        }
    }
}

fn print_banner(host: &str) {
    println!("\n==================================================");
    println!("   orbitrack CLI v0.1 - Epoch Query Client");
    println!("   Target: {host}");
    println!("==================================================\n");
}

fn print_help() {
    println!("\n--- Available Commands ---");
    println!("1. EPOCHS:    EPOCHS [LIMIT n] [OFFSET n]");
    println!("2. GET:       GET <epoch>");
    println!("3. SPEED:     SPEED <epoch>");
    println!("4. LOCATION:  LOCATION <epoch>");
    println!("5. NOW:       NOW");
    println!("6. EXIT:      Quit\n");
}

fn execute_command(
    http: &reqwest::blocking::Client,
    host: &str,
    cmd: Command,
) -> Result<(), String> {
    match cmd {
        Command::Help => {
            print_help();
            Ok(())
        }
        Command::Epochs { limit, offset } => {
            let mut url = format!("{host}/epochs?offset={}", offset.unwrap_or(0));
            if let Some(n) = limit {
                url.push_str(&format!("&limit={n}"));
            }
            let body = get_text(http, &url)?;

            // Pretty-print the page as one epoch key per line.
            match serde_json::from_str::<serde_json::Value>(&body) {
                Ok(serde_json::Value::Array(records)) => {
                    println!("\n{} epochs:", records.len());
                    for record in &records {
                        if let Some(epoch) = record["EPOCH"].as_str() {
                            println!("  \u{2022} {epoch}");
                        }
                    }
                    println!();
                }
                _ => println!("{body}"),
            }
            Ok(())
        }
        Command::Get { epoch } => {
            let body = get_text(http, &format!("{host}/epochs/{epoch}"))?;
            println!("\n{body}");
            Ok(())
        }
        Command::Speed { epoch } => {
            let body = get_text(http, &format!("{host}/epochs/{epoch}/speed"))?;
            println!("{body}");
            Ok(())
        }
        Command::Location { epoch } => {
            let body = get_text(http, &format!("{host}/epochs/{epoch}/location"))?;
            match serde_json::from_str::<serde_json::Value>(&body) {
                Ok(loc) => {
                    println!("\nLatitude:  {}", loc["latitude"]);
                    println!("Longitude: {}", loc["longitude"]);
                    println!("Altitude:  {} km", loc["altitude"]);
                    println!("Address:   {}\n", loc["address"].as_str().unwrap_or("Unknown"));
                }
                Err(_) => println!("{body}"),
            }
            Ok(())
        }
        Command::Now => {
            let body = get_text(http, &format!("{host}/now"))?;
            println!("\n{body}");
            Ok(())
        }
        Command::Exit => std::process::exit(0),
    }
}

/// GET a route and hand back the body; non-2xx becomes the server's error
/// line so the user sees the same text curl would.
fn get_text(http: &reqwest::blocking::Client, url: &str) -> Result<String, String> {
    let response = http.get(url).send().map_err(|e| e.to_string())?;
    let status = response.status();
    let body = response.text().map_err(|e| e.to_string())?;

    if status.is_success() {
        Ok(body)
    } else {
        Err(format!("HTTP {status}: {}", body.trim()))
    }
}
