//! Control channel client: one command datagram out, at most one reply back.

use std::fmt;
use std::io::ErrorKind;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::time::Duration;

use tokio::net::UdpSocket;
use zed_core::protocol::decode_reply;
use zed_core::Command;

use crate::error::Error;

const MAX_REPLY: usize = 1024;

/// Board reply to a control command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Text(String),
    /// Nothing came back within the reply timeout.
    None,
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reply::Text(s) => f.write_str(s),
            Reply::None => f.write_str("(no reply)"),
        }
    }
}

/// Send a typed command to the board.
pub async fn send_command(
    board: SocketAddr,
    command: &Command,
    reply_timeout: Duration,
) -> Result<Reply, Error> {
    send_text(board, &command.to_wire(), reply_timeout).await
}

/// Send a raw ASCII command and wait up to `reply_timeout` for one reply.
/// Uses a fresh socket owned by this call.
pub async fn send_text(board: SocketAddr, text: &str, reply_timeout: Duration) -> Result<Reply, Error> {
    let socket = UdpSocket::bind(unspecified_for(&board)).await?;
    socket.send_to(text.as_bytes(), board).await?;
    log::debug!("sent {:?} to {}", text, board);

    let mut buf = [0u8; MAX_REPLY];
    match tokio::time::timeout(reply_timeout, socket.recv_from(&mut buf)).await {
        Ok(Ok((n, _))) => Ok(Reply::Text(decode_reply(&buf[..n]))),
        // ICMP port unreachable surfaces here on some platforms: nobody is listening.
        Ok(Err(e)) if e.kind() == ErrorKind::ConnectionRefused => Ok(Reply::None),
        Ok(Err(e)) => Err(e.into()),
        Err(_) => Ok(Reply::None),
    }
}

fn unspecified_for(peer: &SocketAddr) -> SocketAddr {
    let ip = match peer.ip() {
        IpAddr::V4(_) => IpAddr::V4(Ipv4Addr::UNSPECIFIED),
        IpAddr::V6(_) => IpAddr::V6(Ipv6Addr::UNSPECIFIED),
    };
    SocketAddr::new(ip, 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[tokio::test]
    async fn reply_is_returned_trimmed() {
        let board = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let addr = board.local_addr().unwrap();
        let server = tokio::spawn(async move {
            let mut buf = [0u8; 64];
            let (n, from) = board.recv_from(&mut buf).await.unwrap();
            board.send_to(b"OK\n", from).await.unwrap();
            String::from_utf8(buf[..n].to_vec()).unwrap()
        });
        let reply = send_command(addr, &Command::LedOn, Duration::from_secs(2))
            .await
            .unwrap();
        assert_eq!(reply, Reply::Text("OK".into()));
        assert_eq!(server.await.unwrap(), "LedOn");
    }

    #[tokio::test]
    async fn no_listener_means_no_reply() {
        // Reserve a port, then free it so nothing listens there.
        let addr = {
            let s = UdpSocket::bind("127.0.0.1:0").await.unwrap();
            s.local_addr().unwrap()
        };
        let timeout = Duration::from_millis(300);
        let started = Instant::now();
        let reply = send_command(addr, &Command::LedOn, timeout).await.unwrap();
        assert_eq!(reply, Reply::None);
        assert_eq!(reply.to_string(), "(no reply)");
        assert!(started.elapsed() < timeout + Duration::from_secs(1));
    }

    #[tokio::test]
    async fn silent_board_times_out() {
        let board = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let addr = board.local_addr().unwrap();
        let timeout = Duration::from_millis(200);
        let started = Instant::now();
        let reply = send_text(addr, "LedOff", timeout).await.unwrap();
        assert_eq!(reply, Reply::None);
        assert!(started.elapsed() >= timeout);
        drop(board);
    }
}
