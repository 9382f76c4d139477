//! ELM327 probe client
//!
//! Connects to an ELM327-compatible server, initializes it the way common
//! diagnostic apps do, then polls a set of Mode 01 PIDs in rotation and
//! reports decoded values and per-PID latency.
//!
//! Usage: cargo run -p obdsim-probe-client -- [OPTIONS]

use clap::Parser;
use derive_more::{Display, Error, From};
use obdsim_elm327_lib::{parse_mode01, PidReading};
use std::collections::BTreeMap;
use std::io::{self, Read, Write};
use std::net::TcpStream;
use std::time::{Duration, Instant};

#[derive(Parser, Debug)]
#[command(name = "obdsim-probe")]
#[command(about = "Poll OBD2 PIDs from an ELM327 adapter")]
struct Args {
    /// Adapter address (host:port)
    #[arg(short, long, default_value = "127.0.0.1:35000")]
    address: String,

    /// Seconds to poll for (0 = until interrupted)
    #[arg(short, long, default_value_t = 10)]
    duration: u64,

    /// Mode 01 PIDs to poll, as hex (e.g. 0C,0D,05)
    #[arg(short, long, value_delimiter = ',', value_parser = parse_pid, default_values = ["0C", "0D", "05", "11", "2F"])]
    pids: Vec<u8>,

    /// Print every decoded value
    #[arg(short, long)]
    verbose: bool,

    /// Seconds between live status lines
    #[arg(short, long, default_value_t = 1.0)]
    interval: f64,
}

#[derive(Debug, Display, Error, From)]
enum ProbeError {
    #[display("I/O error: {_0}")]
    Io(io::Error),
    #[display("Invalid PID {_0:?}")]
    #[from(ignore)]
    InvalidPid(#[error(not(source))] String),
}

fn parse_pid(text: &str) -> Result<u8, ProbeError> {
    match hex::decode(text.trim()) {
        Ok(bytes) if bytes.len() == 1 => Ok(bytes[0]),
        _ => Err(ProbeError::InvalidPid(text.to_string())),
    }
}

/// What one PID has returned so far
#[derive(Debug, Default)]
struct PidStats {
    answered: u32,
    failed: u32,
    fastest: Option<Duration>,
    slowest: Duration,
    waited: Duration,
    lowest: Option<f64>,
    highest: Option<f64>,
    latest: Option<f64>,
}

impl PidStats {
    fn record(&mut self, latency: Duration, value: Option<f64>) {
        self.answered += 1;
        self.waited += latency;
        self.fastest = Some(self.fastest.map_or(latency, |f| f.min(latency)));
        self.slowest = self.slowest.max(latency);
        if let Some(v) = value {
            self.lowest = Some(self.lowest.map_or(v, |l| l.min(v)));
            self.highest = Some(self.highest.map_or(v, |h| h.max(v)));
            self.latest = Some(v);
        }
    }

    fn mean_latency(&self) -> Option<Duration> {
        (self.answered > 0).then(|| self.waited / self.answered)
    }
}

fn millis(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}

struct Report {
    per_pid: BTreeMap<u8, PidStats>,
    since_status: u32,
    status_at: Instant,
}

impl Report {
    fn new(pids: &[u8]) -> Self {
        Self {
            per_pid: pids.iter().map(|&pid| (pid, PidStats::default())).collect(),
            since_status: 0,
            status_at: Instant::now(),
        }
    }

    fn answered(&mut self, reading: &PidReading, latency: Duration) {
        self.since_status += 1;
        self.per_pid
            .entry(reading.pid)
            .or_default()
            .record(latency, reading.value());
    }

    fn failed(&mut self, pid: u8) {
        self.since_status += 1;
        self.per_pid.entry(pid).or_default().failed += 1;
    }

    /// Overwrite the status line with the request rate and latest values.
    fn status_line(&mut self) {
        let rate = f64::from(self.since_status) / self.status_at.elapsed().as_secs_f64();
        let values: Vec<String> = self
            .per_pid
            .iter()
            .filter_map(|(pid, s)| s.latest.map(|v| format!("{pid:02X}={v:.1}")))
            .collect();
        print!("\r  {rate:6.1} req/s  {}    ", values.join("  "));
        io::stdout().flush().ok();

        self.since_status = 0;
        self.status_at = Instant::now();
    }

    fn print_summary(&self, elapsed: Duration) {
        let answered: u32 = self.per_pid.values().map(|s| s.answered).sum();
        let failed: u32 = self.per_pid.values().map(|s| s.failed).sum();

        println!("\n\n=== Probe Summary ({:.1}s) ===", elapsed.as_secs_f64());
        println!(
            "{answered} answered, {failed} failed, {:.1} req/s",
            f64::from(answered + failed) / elapsed.as_secs_f64()
        );
        println!("PID  answered failed  min ms  avg ms  max ms        min        max");
        for (pid, s) in &self.per_pid {
            let range = match (s.lowest, s.highest) {
                (Some(lo), Some(hi)) => format!("{lo:10.1} {hi:10.1}"),
                _ => format!("{:>10} {:>10}", "-", "-"),
            };
            println!(
                "{pid:02X}   {:8} {:6} {:7.2} {:7.2} {:7.2} {range}",
                s.answered,
                s.failed,
                s.fastest.map_or(0.0, millis),
                s.mean_latency().map_or(0.0, millis),
                millis(s.slowest),
            );
        }
    }
}

/// Read adapter output up to and including the `>` prompt.
fn read_until_prompt(stream: &mut TcpStream) -> io::Result<String> {
    let mut reply = Vec::new();
    let mut byte = [0u8; 1];
    while byte[0] != b'>' {
        stream.read_exact(&mut byte)?;
        reply.push(byte[0]);
    }
    Ok(String::from_utf8_lossy(&reply).into_owned())
}

fn send(stream: &mut TcpStream, command: &str) -> io::Result<String> {
    stream.write_all(format!("{command}\r").as_bytes())?;
    read_until_prompt(stream)
}

fn body(reply: &str) -> &str {
    reply.trim_matches(|c: char| c.is_whitespace() || c == '>')
}

fn initialize_connection(stream: &mut TcpStream) -> io::Result<()> {
    // Some adapters greet with a prompt on connect, others stay silent
    stream.set_read_timeout(Some(Duration::from_millis(500)))?;
    match read_until_prompt(stream) {
        Ok(_) => {}
        Err(e) if matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut) => {}
        Err(e) => return Err(e),
    }
    stream.set_read_timeout(Some(Duration::from_secs(5)))?;

    let id = send(stream, "ATZ")?;
    println!("Adapter:  {}", body(&id));

    // Compact replies: no echo, no linefeeds, no spaces
    for command in ["ATE0", "ATL0", "ATS0"] {
        send(stream, command)?;
    }

    let protocol = send(stream, "ATDP")?;
    println!("Protocol: {}", body(&protocol));
    Ok(())
}

fn run_probe(args: &Args) -> Result<(), ProbeError> {
    println!("Probing {}", args.address);
    let mut stream = TcpStream::connect(&args.address)?;
    stream.set_nodelay(true)?;
    initialize_connection(&mut stream)?;

    let deadline = (args.duration > 0).then(|| Instant::now() + Duration::from_secs(args.duration));
    let status_every = Duration::from_secs_f64(args.interval);
    let mut report = Report::new(&args.pids);
    let started = Instant::now();

    println!("Polling {} PIDs\n", args.pids.len());
    for &pid in args.pids.iter().cycle() {
        if deadline.is_some_and(|d| Instant::now() >= d) {
            break;
        }

        let sent = Instant::now();
        let reply = send(&mut stream, &format!("01{pid:02X}"))?;
        let latency = sent.elapsed();

        match parse_mode01(&reply) {
            Some(reading) if reading.pid == pid => {
                if args.verbose {
                    match reading.value() {
                        Some(v) => println!("{pid:02X}: {v:.2} ({:.2}ms)", millis(latency)),
                        None => println!("{pid:02X}: {:02X?}", reading.data),
                    }
                }
                report.answered(&reading, latency);
            }
            _ => {
                if args.verbose {
                    println!("{pid:02X}: {}", body(&reply).escape_debug());
                }
                report.failed(pid);
            }
        }

        if !args.verbose && report.status_at.elapsed() >= status_every {
            report.status_line();
        }
    }

    report.print_summary(started.elapsed());
    Ok(())
}

fn main() {
    let args = Args::parse();

    if let Err(e) = run_probe(&args) {
        eprintln!("\nError: {e}");
        std::process::exit(1);
    }
}
