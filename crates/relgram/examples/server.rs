//! Tagged-echo server using relgram.
//!
//! Run:
//! - cargo run -p relgram --example server
//! - cargo run -p relgram --example server -- 127.0.0.1:7777

use std::{
    env,
    net::SocketAddr,
    thread,
    time::{Duration, Instant},
};

use relgram::{ReliableChannel, UdpConnectionHandle, UdpService};

fn parse_bind_addr() -> Option<SocketAddr> {
    let mut args = env::args().skip(1);
    args.next().and_then(|s| s.parse().ok())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let bind_addr = parse_bind_addr().unwrap_or_else(|| "127.0.0.1:9000".parse().unwrap());
    let mut service = UdpService::bind(bind_addr)?;
    let events = service.events();
    println!("relgram echo server listening on {}", service.local_addr()?);

    let mut channels: Vec<ReliableChannel<UdpConnectionHandle>> = Vec::new();

    loop {
        service.poll(Instant::now());

        while let Some(connection) = service.accept() {
            println!("[accept] {} id={}", connection.remote_addr(), connection.connection_id());
            channels.push(ReliableChannel::new(connection));
        }

        channels.retain_mut(|channel| loop {
            match channel.receive() {
                Ok(Some(payload)) => {
                    let text = String::from_utf8_lossy(&payload);
                    println!("[packet] \"{}\" (latency {:?})", text, channel.latency());
                    if let Err(err) = channel.send(&payload) {
                        eprintln!("[drop] failed to queue echo: {}", err);
                        return false;
                    }
                }
                Ok(None) => return !channel.status().is_terminal(),
                Err(err) => {
                    eprintln!("[drop] channel fault: {}", err);
                    return false;
                }
            }
        });

        while let Ok(event) = events.try_recv() {
            println!("[event] {:?}", event);
        }

        thread::sleep(Duration::from_millis(10));
    }
}
