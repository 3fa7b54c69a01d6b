// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! tinypub-echo - Echo raw topic datagrams in real-time
//!
//! Listens on a topic's port (derived from the topic name like the library
//! does, unless `--port` is given), prints every datagram and flags lengths
//! that differ from the expected message size.

use chrono::Local;
use clap::Parser;
use colored::*;
use std::cell::RefCell;
use std::io::{self, IsTerminal, Write};
use std::net::Ipv4Addr;
use std::rc::Rc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tinypub::{auto_port, DatagramSocket, Node, NodeConfig, SystemClock, Transport, UdpTransport};

/// Datagrams handled per loop iteration before timers get a turn
const MAX_DATAGRAMS_PER_SPIN: usize = 64;

/// Echo tinypub topic datagrams in real-time
#[derive(Parser, Debug)]
#[command(name = "tinypub-echo")]
#[command(version)]
#[command(about = "Echo raw tinypub topic datagrams (like rostopic echo)")]
struct Args {
    /// Topic name (relative names are resolved against --namespace)
    topic: String,

    /// Port to listen on (default: derived from the topic name)
    #[arg(short, long)]
    port: Option<u16>,

    /// Base port for topic-derived ports (default: TINYPUB_BASE_PORT or 7000)
    #[arg(long)]
    base_port: Option<u16>,

    /// Namespace for relative topic names (default: TINYPUB_NAMESPACE)
    #[arg(long)]
    namespace: Option<String>,

    /// Expected message size in bytes; other lengths are flagged
    #[arg(short, long)]
    size: Option<usize>,

    /// Multicast group to join
    #[arg(short, long)]
    group: Option<Ipv4Addr>,

    /// Maximum number of datagrams to receive (0 = unlimited)
    #[arg(short = 'n', long, default_value = "0")]
    count: u64,

    /// Poll loop frequency in Hz
    #[arg(short, long, default_value = "200")]
    rate: f64,

    /// Seconds between statistics reports (0 = off)
    #[arg(long, default_value = "5")]
    stats_period: f64,

    /// Output format: pretty, compact, raw
    #[arg(short, long, default_value = "pretty")]
    format: OutputFormat,

    /// Disable colored output
    #[arg(long)]
    no_color: bool,

    /// Quiet mode - only output data, no headers
    #[arg(short = 'q', long)]
    quiet: bool,
}

#[derive(Clone, Copy, Debug, PartialEq)]
enum OutputFormat {
    Pretty,
    Compact,
    Raw,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pretty" | "p" => Ok(OutputFormat::Pretty),
            "compact" | "c" => Ok(OutputFormat::Compact),
            "raw" | "r" | "hex" => Ok(OutputFormat::Raw),
            _ => Err(format!("Unknown format: {}", s)),
        }
    }
}

/// Counters shared between the receive loop and the stats timer
#[derive(Debug, Default)]
struct EchoStats {
    received: u64,
    mismatched: u64,
    bytes: u64,
    received_at_last_report: u64,
}

impl EchoStats {
    fn record(&mut self, len: usize, mismatch: bool) {
        self.received += 1;
        self.bytes += len as u64;
        if mismatch {
            self.mismatched += 1;
        }
    }

    fn report(&mut self, topic: &str, period: Duration) {
        let delta = self.received - self.received_at_last_report;
        self.received_at_last_report = self.received;
        eprintln!(
            "{} {}: {} datagram(s), {} size mismatch(es), {} bytes, {:.1} msg/s",
            "---".dimmed(),
            topic.cyan(),
            self.received,
            self.mismatched,
            self.bytes,
            delta as f64 / period.as_secs_f64()
        );
    }
}

fn main() {
    // Initialize logger for RUST_LOG-based debug output
    env_logger::init();

    let args = Args::parse();

    if args.no_color || !io::stdout().is_terminal() {
        colored::control::set_override(false);
    }

    if let Err(e) = run_echo(&args) {
        eprintln!("{}: {}", "Error".red().bold(), e);
        std::process::exit(1);
    }
}

fn run_echo(args: &Args) -> Result<(), Box<dyn std::error::Error>> {
    // Setup Ctrl+C handler
    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
    })?;

    let mut config = NodeConfig::from_env("tinypub_echo");
    if let Some(base_port) = args.base_port {
        config = config.with_base_port(base_port);
    }
    if let Some(namespace) = &args.namespace {
        config = config.with_namespace(namespace);
    }

    let transport = UdpTransport::new();
    let mut node = Node::with_config(config, transport, SystemClock::new());

    let topic = node.resolve_topic_name(&args.topic);
    let port = args
        .port
        .unwrap_or_else(|| auto_port(&topic, node.config().base_port));

    let mut socket = match args.group {
        Some(group) => transport.bind_multicast(port, group)?,
        None => transport.bind(port)?,
    };

    if !args.quiet {
        print_header(args, &topic, port);
    }

    let stats = Rc::new(RefCell::new(EchoStats::default()));
    if args.stats_period > 0.0 {
        let period = Duration::try_from_secs_f64(args.stats_period)?;
        let timer_stats = Rc::clone(&stats);
        let timer_topic = topic.clone();
        node.create_timer(period, move || {
            timer_stats.borrow_mut().report(&timer_topic, period);
        })?;
    }
    let mut rate = node.create_rate(args.rate)?;

    let mut buf = [0u8; tinypub::MAX_PACKET_SIZE + 1];
    let mut seq = 0u64;

    'outer: while running.load(Ordering::SeqCst) {
        for _ in 0..MAX_DATAGRAMS_PER_SPIN {
            let len = match socket.try_recv(&mut buf) {
                Ok(Some(len)) => len,
                Ok(None) => break,
                Err(e) => {
                    log::warn!("[tinypub-echo] {}", e);
                    break;
                }
            };

            seq += 1;
            let mismatch = args.size.is_some_and(|expected| expected != len);
            stats.borrow_mut().record(len, mismatch);

            print_datagram(&buf[..len], args.format, args.size, seq);
            let _ = io::stdout().flush();

            if args.count > 0 && seq >= args.count {
                break 'outer;
            }
        }

        node.spin_once();
        rate.sleep();
    }

    if !args.quiet {
        let stats = stats.borrow();
        eprintln!(
            "\n{} Received {} datagram(s), {} size mismatch(es)",
            "---".dimmed(),
            stats.received,
            stats.mismatched
        );
    }

    Ok(())
}

fn print_header(args: &Args, topic: &str, port: u16) {
    let group = args
        .group
        .map(|g| format!(", group={}", g))
        .unwrap_or_default();
    let size = args
        .size
        .map(|s| format!(", size={}", s))
        .unwrap_or_default();
    eprintln!(
        "{} {} {} (port={}{}{}, format={:?})",
        ">>>".green().bold(),
        "Listening on".bold(),
        topic.cyan(),
        port,
        group,
        size,
        args.format
    );
    eprintln!("{}", "Press Ctrl+C to stop".dimmed());
    eprintln!();
}

fn print_datagram(data: &[u8], format: OutputFormat, expected: Option<usize>, seq: u64) {
    let flag = match expected {
        Some(expected) if expected != data.len() => {
            format!(" SIZE MISMATCH (expected {})", expected)
                .red()
                .bold()
                .to_string()
        }
        _ => String::new(),
    };

    match format {
        OutputFormat::Pretty => {
            let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S%.3f");
            println!(
                "{} {} ({} bytes){}",
                format!("[{}]", timestamp).dimmed(),
                format!("#{}", seq).yellow(),
                data.len(),
                flag
            );
            print_payload_decoded(data);
            println!();
        }
        OutputFormat::Compact => {
            let preview: String = data
                .iter()
                .take(32)
                .map(|b| format!("{:02x}", b))
                .collect();
            let suffix = if data.len() > 32 { "..." } else { "" };
            println!("#{}: {}{} ({} bytes){}", seq, preview, suffix, data.len(), flag);
        }
        OutputFormat::Raw => {
            println!("#{} ({} bytes){}", seq, data.len(), flag);
            print_hex_dump(data);
            println!();
        }
    }
}

/// Best-effort interpretation of common scalar payloads
fn print_payload_decoded(data: &[u8]) {
    match data.len() {
        0 => println!("  {}", "(empty)".dimmed()),
        4 => {
            let raw = [data[0], data[1], data[2], data[3]];
            println!(
                "  {}: {} | f32: {:.4}",
                "i32".cyan(),
                i32::from_le_bytes(raw),
                f32::from_le_bytes(raw)
            );
        }
        8 => {
            let mut raw = [0u8; 8];
            raw.copy_from_slice(data);
            println!(
                "  {}: {} | f64: {:.6}",
                "i64".cyan(),
                i64::from_le_bytes(raw),
                f64::from_le_bytes(raw)
            );
        }
        _ => {
            let preview: String = data
                .iter()
                .take(16)
                .map(|b| format!("{:02x}", b))
                .collect::<Vec<_>>()
                .join(" ");
            let suffix = if data.len() > 16 { " ..." } else { "" };
            println!("  {}: {}{}", "bytes".cyan(), preview, suffix);
        }
    }
}

fn print_hex_dump(data: &[u8]) {
    for (i, chunk) in data.chunks(16).enumerate() {
        print!("  {:04x}  ", i * 16);

        for (j, byte) in chunk.iter().enumerate() {
            if j == 8 {
                print!(" ");
            }
            print!("{:02x} ", byte);
        }

        for j in chunk.len()..16 {
            if j == 8 {
                print!(" ");
            }
            print!("   ");
        }

        print!(" |");
        for byte in chunk {
            print!(
                "{}",
                if (0x20..0x7f).contains(byte) {
                    *byte as char
                } else {
                    '.'
                }
            );
        }
        println!("|");
    }
}
