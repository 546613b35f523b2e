//! UDP control server: LedOn | LedOff | Request_img <port>, one reply per command.

use std::future::Future;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use tokio::net::UdpSocket;
use zed_core::protocol::{REPLY_ERR, REPLY_OK};
use zed_core::Command;

use crate::led::Led;
use crate::sender;

const MAX_COMMAND: usize = 128;

pub struct ControlServer<L: Led> {
    socket: UdpSocket,
    led: L,
    image_path: PathBuf,
    chunk_size: usize,
    send_delay: Duration,
    next_frame_id: u32,
}

impl<L: Led> ControlServer<L> {
    pub fn new(
        socket: UdpSocket,
        led: L,
        image_path: PathBuf,
        chunk_size: usize,
        send_delay: Duration,
    ) -> Self {
        Self {
            socket,
            led,
            image_path,
            chunk_size,
            send_delay,
            next_frame_id: 1,
        }
    }

    /// Serve commands until `shutdown` resolves. Receive errors are logged and skipped.
    pub async fn run(mut self, shutdown: impl Future<Output = ()>) {
        let mut buf = [0u8; MAX_COMMAND];
        tokio::pin!(shutdown);
        loop {
            let received = tokio::select! {
                _ = &mut shutdown => break,
                r = self.socket.recv_from(&mut buf) => r,
            };
            let (n, client) = match received {
                Ok(v) => v,
                Err(e) => {
                    log::warn!("control receive failed: {}", e);
                    continue;
                }
            };
            let text = String::from_utf8_lossy(&buf[..n]).into_owned();
            let reply = self.handle(&text, client).await;
            if let Err(e) = self.socket.send_to(reply.as_bytes(), client).await {
                log::warn!("reply to {} failed: {}", client, e);
            }
        }
        log::info!("control server stopped");
    }

    /// Execute one command and return the reply to send back to `client`.
    async fn handle(&mut self, text: &str, client: SocketAddr) -> &'static str {
        let command = match Command::parse(text) {
            Ok(c) => c,
            Err(e) => {
                log::info!("{} from {}", e, client);
                return REPLY_ERR;
            }
        };
        log::info!("{} from {}", command, client);
        match command {
            Command::LedOn | Command::LedOff => {
                match self.led.set(command == Command::LedOn) {
                    Ok(()) => REPLY_OK,
                    Err(e) => {
                        log::warn!("LED write failed: {}", e);
                        REPLY_ERR
                    }
                }
            }
            Command::RequestImage { port } => {
                // Stream to the requester's IP at the requested port, not the command's source port.
                let dst = SocketAddr::new(client.ip(), port);
                let frame_id = self.next_frame_id;
                self.next_frame_id = self.next_frame_id.wrapping_add(1);
                match sender::send_file(
                    &self.socket,
                    dst,
                    &self.image_path,
                    frame_id,
                    self.chunk_size,
                    self.send_delay,
                )
                .await
                {
                    Ok(_) => REPLY_OK,
                    Err(e) => {
                        log::warn!("image frame_id={} to {} failed: {}", frame_id, dst, e);
                        REPLY_ERR
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::sync::{Arc, Mutex};
    use tokio::sync::oneshot;
    use zed_core::{Outcome, Reassembler};

    #[derive(Clone, Default)]
    struct MemoryLed {
        state: Arc<Mutex<Option<bool>>>,
        broken: bool,
    }

    impl Led for MemoryLed {
        fn set(&mut self, on: bool) -> io::Result<()> {
            if self.broken {
                return Err(io::Error::new(io::ErrorKind::PermissionDenied, "read-only"));
            }
            *self.state.lock().unwrap() = Some(on);
            Ok(())
        }
    }

    struct Running {
        addr: SocketAddr,
        stop: oneshot::Sender<()>,
        task: tokio::task::JoinHandle<()>,
    }

    async fn start(led: MemoryLed, image_path: PathBuf) -> Running {
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let addr = socket.local_addr().unwrap();
        let server = ControlServer::new(socket, led, image_path, 1000, Duration::ZERO);
        let (stop, stopped) = oneshot::channel::<()>();
        let task = tokio::spawn(server.run(async {
            let _ = stopped.await;
        }));
        Running { addr, stop, task }
    }

    async fn ask(board: SocketAddr, text: &str) -> String {
        let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        client.send_to(text.as_bytes(), board).await.unwrap();
        let mut buf = [0u8; 64];
        let (n, _) = tokio::time::timeout(Duration::from_secs(5), client.recv_from(&mut buf))
            .await
            .unwrap()
            .unwrap();
        String::from_utf8(buf[..n].to_vec()).unwrap()
    }

    #[tokio::test]
    async fn led_commands_switch_led() {
        let led = MemoryLed::default();
        let state = led.state.clone();
        let board = start(led, PathBuf::from("/nonexistent")).await;

        assert_eq!(ask(board.addr, "LedOn").await, "OK\n");
        assert_eq!(*state.lock().unwrap(), Some(true));
        assert_eq!(ask(board.addr, "LedOff\r\n").await, "OK\n");
        assert_eq!(*state.lock().unwrap(), Some(false));
        assert_eq!(ask(board.addr, "Blink").await, "ERR\n");

        board.stop.send(()).unwrap();
        board.task.await.unwrap();
    }

    #[tokio::test]
    async fn led_failure_replies_err() {
        let led = MemoryLed {
            broken: true,
            ..MemoryLed::default()
        };
        let board = start(led, PathBuf::from("/nonexistent")).await;
        assert_eq!(ask(board.addr, "LedOn").await, "ERR\n");
        board.stop.send(()).unwrap();
    }

    #[tokio::test]
    async fn request_img_streams_to_requested_port() {
        let dir = tempfile::tempdir().unwrap();
        let image_path = dir.path().join("image.jpg");
        let image: Vec<u8> = (0..3500u32).map(|i| (i % 199) as u8).collect();
        std::fs::write(&image_path, &image).unwrap();
        let board = start(MemoryLed::default(), image_path).await;

        let rx = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let port = rx.local_addr().unwrap().port();
        let mut frames = Vec::new();
        for _ in 0..2 {
            assert_eq!(ask(board.addr, &format!("Request_img {}", port)).await, "OK\n");
            let mut engine = Reassembler::new();
            let mut buf = vec![0u8; 2048];
            let frame = loop {
                let (n, from) = rx.recv_from(&mut buf).await.unwrap();
                if let Some(Outcome::FrameComplete(f)) = engine.accept(&buf[..n], from).pop() {
                    break f;
                }
            };
            assert_eq!(frame.bytes, image);
            frames.push(frame.frame_id);
        }
        assert_eq!(frames, vec![1, 2]);
        board.stop.send(()).unwrap();
    }

    #[tokio::test]
    async fn request_img_without_image_replies_err() {
        let dir = tempfile::tempdir().unwrap();
        let board = start(MemoryLed::default(), dir.path().join("missing.jpg")).await;
        assert_eq!(ask(board.addr, "Request_img 50999").await, "ERR\n");
        assert_eq!(ask(board.addr, "Request_img 0").await, "ERR\n");
        board.stop.send(()).unwrap();
    }
}
