// MicroZed board host (PetaLinux): UDP control server, GPIO LED, image sender.

mod config;
mod led;
mod sender;
mod server;

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

use anyhow::Context;
use tokio::net::UdpSocket;

const VERSION: &str = env!("CARGO_PKG_VERSION");

const USAGE: &str = "\
Usage: zed-board <command>
  serve                          run the control server (LedOn | LedOff | Request_img <port>)
  send <dest_ip> <dest_port> <file>   send one file as frame_id 1
  -V, --version";

/// One operation requested on the command line.
#[derive(Debug, Clone, PartialEq)]
enum Op {
    Serve,
    Send { dst: SocketAddr, file: PathBuf },
    Version,
}

fn parse_args(args: &[String]) -> Result<Op, String> {
    let args: Vec<&str> = args.iter().map(String::as_str).collect();
    match args.as_slice() {
        ["-V"] | ["--version"] => Ok(Op::Version),
        ["serve"] => Ok(Op::Serve),
        ["send", ip, port, file] => {
            let ip: IpAddr = ip.parse().map_err(|_| format!("invalid ip: {}", ip))?;
            let port: u16 = port
                .parse()
                .map_err(|_| format!("invalid port: {}", port))?;
            Ok(Op::Send {
                dst: SocketAddr::new(ip, port),
                file: PathBuf::from(file),
            })
        }
        _ => Err(USAGE.to_string()),
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let op = match parse_args(&args) {
        Ok(op) => op,
        Err(msg) => {
            eprintln!("{}", msg);
            std::process::exit(2);
        }
    };
    if op == Op::Version {
        println!("zed-board {}", VERSION);
        return Ok(());
    }

    let cfg = config::load();
    let rt = tokio::runtime::Runtime::new()?;
    match op {
        Op::Serve => rt.block_on(serve(cfg)),
        Op::Send { dst, file } => rt.block_on(send_once(&cfg, dst, file)),
        Op::Version => Ok(()),
    }
}

async fn serve(cfg: config::BoardConfig) -> anyhow::Result<()> {
    let mut led = led::SysfsLed::new(cfg.led_gpio);
    if let Err(e) = led.init() {
        log::warn!("GPIO {} init failed: {}", cfg.led_gpio, e);
    }
    let socket = UdpSocket::bind(("0.0.0.0", cfg.ctrl_port))
        .await
        .with_context(|| format!("bind control port {}", cfg.ctrl_port))?;
    log::info!("UDP control server listening on port {}", cfg.ctrl_port);
    log::info!("Commands: LedOn | LedOff | Request_img <port>");
    let server = server::ControlServer::new(
        socket,
        led,
        cfg.image_path.clone(),
        cfg.chunk_size,
        cfg.send_delay(),
    );
    server.run(shutdown_signal()).await;
    Ok(())
}

async fn send_once(cfg: &config::BoardConfig, dst: SocketAddr, file: PathBuf) -> anyhow::Result<()> {
    let socket = UdpSocket::bind(("0.0.0.0", 0)).await?;
    let report = sender::send_file(&socket, dst, &file, 1, cfg.chunk_size, cfg.send_delay()).await?;
    println!(
        "File sent: {} ({} bytes) as frame_id={} in {} chunks",
        file.display(),
        report.bytes,
        report.frame_id,
        report.chunks
    );
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM (Unix).
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = sigterm.recv() => {}
                }
            }
            Err(e) => {
                log::warn!("SIGTERM handler unavailable: {}", e);
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn parses_operations() {
        assert_eq!(parse_args(&args(&["--version"])), Ok(Op::Version));
        assert_eq!(parse_args(&args(&["serve"])), Ok(Op::Serve));
        assert_eq!(
            parse_args(&args(&["send", "192.168.1.10", "50001", "img.jpg"])),
            Ok(Op::Send {
                dst: "192.168.1.10:50001".parse().unwrap(),
                file: PathBuf::from("img.jpg"),
            })
        );
    }

    #[test]
    fn rejects_bad_arguments() {
        assert!(parse_args(&args(&[])).is_err());
        assert!(parse_args(&args(&["serve", "now"])).is_err());
        assert!(parse_args(&args(&["send", "board", "50001", "img.jpg"])).is_err());
        assert!(parse_args(&args(&["send", "10.0.0.1", "70000", "img.jpg"])).is_err());
    }
}
