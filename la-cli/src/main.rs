//! LA4800 Command-Line Driver
//!
//! Connects to an LA4800/LA3200 logic analyzer (or a simulated one), submits
//! the given commands as one batch and prints each command's reply.

mod settings;

use std::io;
use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::Parser;
use la_client::{CommandResult, Connector, LogicAnalyzer, StreamConnector};
use la_sim::{spawn_virtual_analyzer, VirtualAnalyzer};
use settings::Settings;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command-line interface for the logic analyzer driver.
#[derive(Parser, Debug)]
#[command(name = "la4800", version, about)]
struct Cli {
    /// Serial port the analyzer is attached to.
    #[arg(long)]
    port: Option<String>,
    /// Serial baud rate.
    #[arg(long)]
    baud: Option<u32>,
    /// Per-command response timeout in milliseconds.
    #[arg(long, value_name = "MS")]
    timeout_ms: Option<u64>,
    /// Settings file to use instead of the default location.
    #[arg(long, value_name = "FILE")]
    settings: Option<PathBuf>,
    /// Talk to a simulated analyzer instead of a serial port.
    #[arg(long)]
    simulate: bool,
    /// Store the effective settings before connecting.
    #[arg(long)]
    save: bool,
    /// Commands to submit as one batch; runs a demo sequence when omitted.
    #[arg(value_name = "COMMAND")]
    commands: Vec<String>,
}

impl Cli {
    /// Override stored settings with flags given on the command line
    fn apply(&self, settings: &mut Settings) {
        if let Some(port) = &self.port {
            settings.analyzer.port = port.clone();
        }
        if let Some(baud) = self.baud {
            settings.analyzer.baud_rate = baud;
        }
        if let Some(timeout_ms) = self.timeout_ms {
            settings.analyzer.command_timeout_ms = timeout_ms;
        }
    }

    /// Command batches to run, in order
    fn batches(&self) -> Vec<Vec<String>> {
        if self.commands.is_empty() {
            vec![vec!["LINES".to_string()], vec!["MON".to_string(), "LINES".to_string()]]
        } else {
            vec![self.commands.clone()]
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "la4800=info,la_protocol=info,la_client=info,la_sim=info".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    let path = cli.settings.clone().or_else(Settings::default_path);
    let mut settings = path
        .as_deref()
        .map(Settings::load_from)
        .unwrap_or_default();
    cli.apply(&mut settings);

    if cli.save {
        let path = path.context("could not determine settings path")?;
        settings.save_to(&path)?;
        tracing::info!("Saved settings to {}", path.display());
    }

    let batches = cli.batches();
    if cli.simulate {
        let device = settings.simulator.clone();
        let connector = StreamConnector::new("simulator", move || -> io::Result<_> {
            Ok(spawn_virtual_analyzer(VirtualAnalyzer::from_config(device.clone())).stream)
        });
        let timeout = settings.analyzer.command_timeout();
        run(LogicAnalyzer::with_timeout(connector, timeout), &batches).await
    } else {
        if settings.analyzer.port.is_empty() {
            bail!("no serial port configured; pass --port or --simulate");
        }
        run(LogicAnalyzer::from_config(&settings.analyzer), &batches).await
    }
}

async fn run<C: Connector>(
    mut analyzer: LogicAnalyzer<C>,
    batches: &[Vec<String>],
) -> anyhow::Result<()> {
    let info = analyzer.connect().await.context("failed to connect")?;
    println!("Connected to {info}");

    let mut outcome = Ok(());
    for batch in batches {
        analyzer.await_ready().await;
        let handles = match analyzer.submit(batch.iter().cloned()).await {
            Ok(handles) => handles,
            Err(e) => {
                outcome = Err(anyhow::Error::new(e).context("failed to submit commands"));
                break;
            }
        };
        for handle in handles {
            let command = handle.command().to_string();
            println!("{}", format_result(&command, &handle.wait().await));
        }
    }

    analyzer.await_ready().await;
    analyzer.disconnect().await;
    outcome
}

/// One output line per command
fn format_result(command: &str, result: &CommandResult) -> String {
    match result {
        Ok(tokens) if tokens.is_empty() => format!("{command}: OK"),
        Ok(tokens) => format!("{command}: {}", tokens.join(",")),
        Err(e) => format!("{command}: {e}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use la_client::CommandError;
    use std::time::Duration;

    #[test]
    fn test_flags_override_settings() {
        let cli = Cli::parse_from([
            "la4800", "--port", "COM9", "--baud", "19200", "--timeout-ms", "250", "LINES",
        ]);
        let mut settings = Settings::default();
        settings.analyzer.port = "/dev/ttyUSB0".into();
        cli.apply(&mut settings);

        assert_eq!(settings.analyzer.port, "COM9");
        assert_eq!(settings.analyzer.baud_rate, 19200);
        assert_eq!(settings.analyzer.command_timeout(), Duration::from_millis(250));
        assert_eq!(cli.batches(), vec![vec!["LINES".to_string()]]);
    }

    #[test]
    fn test_demo_batches_without_commands() {
        let cli = Cli::parse_from(["la4800", "--simulate"]);
        assert!(cli.simulate);
        assert_eq!(cli.batches().len(), 2);
        assert_eq!(cli.batches()[1], ["MON", "LINES"]);
    }

    #[test]
    fn test_format_result() {
        assert_eq!(format_result("MON", &Ok(Vec::new())), "MON: OK");
        assert_eq!(
            format_result("LINES", &Ok(vec!["0".into(), "1".into()])),
            "LINES: 0,1"
        );
        let failed = Err(CommandError::Device {
            code: 7,
            data: vec!["ERROR 07".into()],
        });
        assert_eq!(format_result("X", &failed), "X: command failed on device: 07");
    }

    #[tokio::test]
    async fn test_run_against_simulator() {
        let connector = StreamConnector::new("simulator", || -> io::Result<_> {
            Ok(spawn_virtual_analyzer(VirtualAnalyzer::new("cli")).stream)
        });
        let analyzer = LogicAnalyzer::with_timeout(connector, Duration::from_secs(2));
        let batches = vec![vec!["MON".to_string(), "LINES".to_string()]];
        run(analyzer, &batches).await.unwrap();
    }
}
