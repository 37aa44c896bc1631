//! Serial monitor: configures the modem, keeps the session alive and
//! bridges stdin lines to the server.

use cellsock::logging::init_logging;
use cellsock::prelude::*;
use clap::Parser;
use std::io::BufRead;
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::thread;
use std::time::Instant;
use tracing::{error, info, warn};

/// Time between statistics reports
const STATS_INTERVAL: Duration = Duration::from_secs(60);

/// Time between automatic recovery attempts
const RECOVERY_BACKOFF: Duration = Duration::from_secs(10);

#[derive(Debug, Parser)]
#[command(author, version, about = "Drive an LTE modem and bridge stdin to its socket")]
struct Cli {
    /// Serial device the modem is attached to
    #[arg(short, long, required_unless_present = "list")]
    port: Option<String>,

    /// UART speed
    #[arg(short, long, default_value_t = cellsock::client::config::DEFAULT_BAUD_RATE)]
    baud: u32,

    /// Server address
    #[arg(short, long, default_value = "127.0.0.1")]
    server: String,

    /// Server port
    #[arg(long, default_value_t = 80)]
    server_port: u16,

    /// Access point name
    #[arg(long)]
    apn: Option<String>,

    /// Raw TCP passthrough instead of a WebSocket
    #[arg(long)]
    raw: bool,

    /// WebSocket request path
    #[arg(long, default_value = "/")]
    path: String,

    /// Text frame sent once the upgrade completes
    #[arg(long)]
    greeting: Option<String>,

    /// List serial ports and exit
    #[arg(long)]
    list: bool,
}

fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    if cli.list {
        for port in available_ports()? {
            println!("{port}");
        }
        return Ok(());
    }

    init_logging()?;

    let Some(path) = cli.port.as_deref() else {
        return Err("no serial port given".into());
    };
    let transport = SerialTransport::open(path, cli.baud)?;

    let mut config = ClientConfig::default()
        .baud_rate(cli.baud)
        .websocket(!cli.raw)
        .path(cli.path.clone());
    if let Some(greeting) = &cli.greeting {
        config = config.greeting(greeting.clone());
    }

    let mut client = ModemClient::new(transport, config);
    client.begin(&cli.server, cli.server_port, cli.apn.as_deref())?;
    client.on_data(|text| println!("< {text}"));
    client.on_status(|status| info!(%status, "Session status changed"));

    if let Err(e) = client.configure() {
        error!("Initial configuration failed: {}", e);
    }

    let lines = spawn_stdin_reader();
    run(&mut client, &lines);
    Ok(())
}

fn run<T: Transport>(client: &mut ModemClient<T>, lines: &Receiver<String>) {
    let mut last_stats = Instant::now();
    let mut last_recovery = Instant::now();

    loop {
        client.handle_data();

        match lines.try_recv() {
            Ok(line) => {
                if let Err(e) = client.send_data(&line) {
                    warn!("Not sent: {}", e);
                }
            }
            Err(TryRecvError::Empty) => {}
            Err(TryRecvError::Disconnected) => {
                info!("stdin closed, disconnecting");
                client.disconnect();
                client.handle_data();
                return;
            }
        }

        if last_recovery.elapsed() >= RECOVERY_BACKOFF {
            recover(client);
            last_recovery = Instant::now();
        }

        if last_stats.elapsed() >= STATS_INTERVAL {
            println!("{}", client.statistics());
            last_stats = Instant::now();
        }

        thread::sleep(Duration::from_millis(10));
    }
}

fn recover<T: Transport>(client: &mut ModemClient<T>) {
    match client.status() {
        SessionStatus::Error => {
            warn!("Modem in error state, resetting");
            if let Err(e) = client.reset() {
                error!("Reset failed: {}", e);
            }
        }
        SessionStatus::Disconnected if client.is_configured() => {
            warn!("Session lost, reconnecting");
            if let Err(e) = client.reconnect() {
                error!("Reconnect failed: {}", e);
            }
        }
        _ => {}
    }
}

fn spawn_stdin_reader() -> Receiver<String> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            if tx.send(line).is_err() {
                break;
            }
        }
    });
    rx
}
