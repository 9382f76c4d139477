//! Line transport: carries command lines to the shared simulator and framed
//! responses back to the client.

use log::{debug, error, info, warn};
use obdsim_elm327_lib::framing::{frame_response, session_prompt};
use obdsim_elm327_lib::{CommandRequest, SessionEvent, Simulator};
use std::io::{self, BufReader, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::{Arc, Mutex};
use std::time::Instant;

/// The single adapter persona, shared by every listener and session
pub type SharedSimulator = Arc<Mutex<Simulator>>;

/// Longest command line kept; extra bytes are dropped until the terminator
const MAX_COMMAND_LEN: usize = 64;

/// Run one client session over any byte stream.
///
/// Sends the initial prompt, then answers each `\r`- or `\n`-terminated line
/// until the reader hits EOF. Returns the number of commands handled.
pub fn serve_session<R: Read, W: Write>(
    reader: R,
    mut writer: W,
    origin: &str,
    simulator: &Mutex<Simulator>,
) -> io::Result<u32> {
    simulator.lock().unwrap().session_event(&SessionEvent::Started {
        origin: origin.to_string(),
    });
    writer.write_all(session_prompt().as_bytes())?;
    writer.flush()?;

    let result = exchange_commands(reader, &mut writer, origin, simulator);

    simulator.lock().unwrap().session_event(&SessionEvent::Ended {
        origin: origin.to_string(),
    });
    result
}

fn exchange_commands<R: Read, W: Write>(
    reader: R,
    writer: &mut W,
    origin: &str,
    simulator: &Mutex<Simulator>,
) -> io::Result<u32> {
    let mut buffer = Vec::with_capacity(MAX_COMMAND_LEN);
    let mut commands = 0;

    for byte in BufReader::new(reader).bytes() {
        let ch = byte?;

        if ch != b'\r' && ch != b'\n' {
            if buffer.len() < MAX_COMMAND_LEN {
                buffer.push(ch);
            }
            continue;
        }

        let raw = String::from_utf8_lossy(&buffer).trim().to_string();
        buffer.clear();
        if raw.is_empty() {
            continue;
        }

        commands += 1;
        debug!("[{origin}] RX #{commands}: {raw:?}");

        let framed = {
            let mut sim = simulator.lock().unwrap();
            sim.poll(Instant::now());
            let body = sim.handle(&CommandRequest::new(raw.as_str(), origin));
            frame_response(&raw, &body, sim.config())
        };

        debug!("[{origin}] TX: {}", framed.escape_debug());
        writer.write_all(framed.as_bytes())?;
        writer.flush()?;
    }

    Ok(commands)
}

fn handle_client(stream: TcpStream, origin: &str, simulator: &Mutex<Simulator>) {
    let peer = stream
        .peer_addr()
        .map_or_else(|_| "unknown".to_string(), |addr| addr.to_string());
    info!("[{origin}] Client connected: {peer}");

    if let Err(e) = stream.set_nodelay(true) {
        warn!("[{origin}] Failed to set TCP_NODELAY: {e}");
    }
    let writer = match stream.try_clone() {
        Ok(writer) => writer,
        Err(e) => {
            error!("[{origin}] Failed to clone stream for {peer}: {e}");
            return;
        }
    };

    let started = Instant::now();
    match serve_session(stream, writer, origin, simulator) {
        Ok(commands) => info!(
            "[{origin}] Client {peer} disconnected after {:.1}s, {commands} commands",
            started.elapsed().as_secs_f32()
        ),
        Err(e) => warn!(
            "[{origin}] Client {peer} dropped after {:.1}s: {e}",
            started.elapsed().as_secs_f32()
        ),
    }
}

/// Accept clients on `listener` forever, one thread per client.
pub fn run_listener(listener: TcpListener, origin: String, simulator: SharedSimulator) {
    for stream in listener.incoming() {
        match stream {
            Ok(stream) => {
                let origin = origin.clone();
                let simulator = Arc::clone(&simulator);
                std::thread::spawn(move || handle_client(stream, &origin, &simulator));
            }
            Err(e) => error!("[{origin}] Connection error: {e}"),
        }
    }
}
