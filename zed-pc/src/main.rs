// MicroZed PC host: LED control commands and UDP image reception.

mod config;
mod control;
mod error;
mod receiver;
mod status;

use std::path::PathBuf;

use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use zed_core::Command;

use crate::error::Error;
use crate::status::{report, Status, StatusTx};

const VERSION: &str = env!("CARGO_PKG_VERSION");

const USAGE: &str = "\
Usage: zed-pc <command>
  listen [port] [output]   receive images until Ctrl+C
  led on|off               switch the board LED
  request [output]         request one image and wait for it
  send <text>              send a raw control command
  -V, --version";

/// One operation requested on the command line.
#[derive(Debug, Clone, PartialEq)]
enum Op {
    Listen {
        port: Option<u16>,
        output: Option<PathBuf>,
    },
    Command(Command),
    Request {
        output: Option<PathBuf>,
    },
    Raw(String),
    Version,
}

fn parse_args(args: &[String]) -> Result<Op, String> {
    let args: Vec<&str> = args.iter().map(String::as_str).collect();
    match args.as_slice() {
        ["-V"] | ["--version"] => Ok(Op::Version),
        ["listen", rest @ ..] if rest.len() <= 2 => {
            let port = match rest.first() {
                Some(p) => Some(
                    p.parse::<u16>()
                        .map_err(|_| format!("invalid port: {}", p))?,
                ),
                None => None,
            };
            Ok(Op::Listen {
                port,
                output: rest.get(1).map(PathBuf::from),
            })
        }
        ["led", "on"] => Ok(Op::Command(Command::LedOn)),
        ["led", "off"] => Ok(Op::Command(Command::LedOff)),
        ["request"] => Ok(Op::Request { output: None }),
        ["request", out] => Ok(Op::Request {
            output: Some(PathBuf::from(out)),
        }),
        ["send", text @ ..] if !text.is_empty() => Ok(Op::Raw(text.join(" "))),
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
        println!("zed-pc {}", VERSION);
        return Ok(());
    }

    let mut cfg = config::load();
    match &op {
        Op::Listen { port, output } => {
            if let Some(p) = port {
                cfg.image_port = *p;
            }
            if let Some(o) = output {
                cfg.output = o.clone();
            }
        }
        Op::Request { output: Some(o) } => cfg.output = o.clone(),
        _ => {}
    }

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async move {
        let (status_tx, mut status_rx) = mpsc::unbounded_channel();
        // The operation runs on its own worker; the foreground only prints status.
        let worker = tokio::spawn(run_op(op, cfg, status_tx));
        while let Some(s) = status_rx.recv().await {
            println!("{}", s);
        }
        worker.await?.map_err(anyhow::Error::from)
    })
}

async fn run_op(op: Op, cfg: config::Config, status: StatusTx) -> Result<(), Error> {
    match op {
        Op::Listen { .. } => {
            let addr = cfg.image_listen_addr();
            let socket = UdpSocket::bind(addr).await?;
            report(&status, Status::Listening { addr });
            receiver::run_server(
                socket,
                &cfg.output,
                cfg.poll_timeout(),
                &status,
                shutdown_signal(),
            )
            .await
        }
        Op::Command(cmd) => {
            let reply =
                control::send_command(cfg.board_ctrl_addr(), &cmd, cfg.reply_timeout()).await?;
            report(
                &status,
                Status::CommandReply {
                    command: cmd.to_wire(),
                    reply,
                },
            );
            Ok(())
        }
        Op::Raw(text) => {
            let reply = control::send_text(cfg.board_ctrl_addr(), &text, cfg.reply_timeout()).await?;
            report(
                &status,
                Status::CommandReply {
                    command: text,
                    reply,
                },
            );
            Ok(())
        }
        Op::Request { .. } => {
            let got = receiver::request_image(&cfg, &status).await?;
            log::info!(
                "frame_id={} saved to {} ({} bytes, {:.2}s)",
                got.frame_id,
                got.path.display(),
                got.bytes,
                got.elapsed.as_secs_f64()
            );
            Ok(())
        }
        Op::Version => Ok(()),
    }
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
    log::info!("shutdown requested");
}
