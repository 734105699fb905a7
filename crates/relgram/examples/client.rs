//! Periodic-ping client using relgram.
//!
//! Run against the echo server:
//! - cargo run -p relgram --example client
//! - cargo run -p relgram --example client -- 127.0.0.1:7777

use std::{
    cell::RefCell,
    env,
    net::SocketAddr,
    rc::Rc,
    thread,
    time::{Duration, Instant},
};

use relgram::{AckListener, Connection, ConnectionStatus, ReliableChannel, UdpService};

struct AckPrinter;

impl AckListener for AckPrinter {
    fn on_packet_acked(&mut self, tag: i32) {
        println!("[acked] tag={}", tag);
    }
}

fn parse_server_addr() -> Option<SocketAddr> {
    let mut args = env::args().skip(1);
    args.next().and_then(|s| s.parse().ok())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let server_addr = parse_server_addr().unwrap_or_else(|| "127.0.0.1:9000".parse().unwrap());
    let mut service = UdpService::bind_any()?;
    let connection = service.connect(server_addr)?;
    println!("connecting to {}", server_addr);

    while connection.status() != ConnectionStatus::Open {
        service.poll(Instant::now());
        thread::sleep(Duration::from_millis(5));
    }
    println!("connected, id={}", connection.connection_id());

    let mut channel = ReliableChannel::new(connection);
    let listener = Rc::new(RefCell::new(AckPrinter));
    channel.add_ack_listener(&listener);

    let mut tag = 0;
    let mut last_ping: Option<Instant> = None;

    loop {
        service.poll(Instant::now());

        if last_ping.map_or(true, |at| at.elapsed() >= Duration::from_secs(1)) {
            let message = format!("ping {}", tag);
            channel.send_tagged(message.as_bytes(), tag)?;
            tag += 1;
            last_ping = Some(Instant::now());
        }

        while let Some(payload) = channel.receive()? {
            println!(
                "[echo] \"{}\" (latency {:?})",
                String::from_utf8_lossy(&payload),
                channel.latency()
            );
        }

        thread::sleep(Duration::from_millis(10));
    }
}
