//! One-shot CLI: `cascade [--persona KEY] [--temperature T] <message...>`
//!
//! Prints the normalized response as JSON on stdout.

use finance_chat_cascade::{CascadeOrchestrator, EnvCredentials, Persona, SendOptions, Settings};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

const USAGE: &str = "usage: cascade [--persona KEY] [--temperature T] <message...>";

fn parse_args(mut args: impl Iterator<Item = String>) -> Result<(String, SendOptions), String> {
    let mut options = SendOptions::default();
    let mut words = Vec::new();

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--persona" | "-p" => {
                let key = args.next().ok_or("--persona needs a value")?;
                let persona = Persona::from_key(&key).ok_or_else(|| {
                    let known: Vec<_> = Persona::ALL.iter().map(|p| p.key()).collect();
                    format!("unknown persona '{}', expected one of {}", key, known.join(", "))
                })?;
                options.persona = Some(persona);
            }
            "--temperature" | "-t" => {
                let value = args.next().ok_or("--temperature needs a value")?;
                let t = value
                    .parse::<f32>()
                    .map_err(|_| format!("invalid temperature '{}'", value))?;
                options.temperature = Some(t);
            }
            "--help" | "-h" => return Err(USAGE.to_string()),
            _ => words.push(arg),
        }
    }

    if words.is_empty() {
        return Err(USAGE.to_string());
    }

    Ok((words.join(" "), options))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();

    // Logs go to stderr so stdout stays pure JSON
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let (message, options) = match parse_args(std::env::args().skip(1)) {
        Ok(parsed) => parsed,
        Err(msg) => {
            eprintln!("{}", msg);
            std::process::exit(2);
        }
    };

    let settings = Settings::from_env()?;
    let cascade = CascadeOrchestrator::from_settings(&settings, Arc::new(EnvCredentials))?;

    info!(persona = ?options.persona, "Sending message");

    let response = cascade.send(&message, &[], None, options).await?;
    cascade.shutdown().await;

    println!("{}", serde_json::to_string_pretty(&response)?);

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> impl Iterator<Item = String> {
        list.iter().map(|s| s.to_string()).collect::<Vec<_>>().into_iter()
    }

    #[test]
    fn test_parse_persona_and_message() {
        let (message, options) = parse_args(args(&["--persona", "pepper", "what", "are", "fees?"])).unwrap();
        assert_eq!(message, "what are fees?");
        assert_eq!(options.persona, Some(Persona::Pepper));
    }

    #[test]
    fn test_parse_rejects_unknown_persona() {
        assert!(parse_args(args(&["-p", "nobody", "hi"])).is_err());
        assert!(parse_args(args(&[])).is_err());
    }
}
