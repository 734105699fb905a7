use std::{io, net::UdpSocket};

use relgram_core::config::Config;
use socket2::Socket as Socket2;

/// Applies configured socket options to a bound UDP socket.
pub(crate) fn apply_socket_options(socket: &UdpSocket, config: &Config) -> io::Result<()> {
    let socket2 = Socket2::from(socket.try_clone()?);

    if let Some(size) = config.socket_recv_buffer_size {
        socket2.set_recv_buffer_size(size)?;
    }

    if let Some(size) = config.socket_send_buffer_size {
        socket2.set_send_buffer_size(size)?;
    }

    if let Some(ttl) = config.socket_ttl {
        socket.set_ttl(ttl)?;
    }

    Ok(())
}
