//! seqread-send: queue one message on a running seqread-rs daemon.
//!
//! Text comes from the command line, or from stdin when no words are given.
//!
//!     seqread-send "build finished"
//!     make 2>&1 | tail -1 | seqread-send

use std::io::Read;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use serde::Serialize;
use tokio::net::UnixDatagram;

use seqread::config::{Config, DEFAULT_MAX_DATAGRAM};

#[derive(Parser, Debug)]
#[command(name = "seqread-send", version, about = "Send a message to seqread-rs")]
struct Args {
    /// Socket path (overrides the config file)
    #[arg(short, long)]
    socket: Option<PathBuf>,

    /// Path to the daemon's config.yaml, used to find the socket
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Message words; read from stdin when empty
    words: Vec<String>,
}

#[derive(Serialize)]
struct OutboundMessage<'a> {
    message: &'a str,
}

/// Message text: the words joined by spaces, or all of `input` when there are none.
fn read_message(words: &[String], mut input: impl Read) -> Result<String, String> {
    if !words.is_empty() {
        return Ok(words.join(" "));
    }
    let mut text = String::new();
    input
        .read_to_string(&mut text)
        .map_err(|e| format!("failed to read stdin: {e}"))?;
    Ok(text.trim_end().to_string())
}

/// JSON datagram for `message`, refused when it would not fit the daemon's buffer.
fn encode_message(message: &str) -> Result<Vec<u8>, String> {
    if message.trim().is_empty() {
        return Err("nothing to send".into());
    }
    let payload = serde_json::to_vec(&OutboundMessage { message }).map_err(|e| e.to_string())?;
    if payload.len() > DEFAULT_MAX_DATAGRAM {
        return Err(format!(
            "message is {} bytes encoded, limit is {DEFAULT_MAX_DATAGRAM}",
            payload.len()
        ));
    }
    Ok(payload)
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let args = Args::parse();

    let payload = match read_message(&args.words, std::io::stdin())
        .and_then(|message| encode_message(&message))
    {
        Ok(payload) => payload,
        Err(e) => {
            eprintln!("seqread-send: {e}");
            return ExitCode::FAILURE;
        }
    };

    let socket_path = args
        .socket
        .unwrap_or_else(|| Config::load(args.config.as_deref()).socket.path);

    let result = async {
        let socket = UnixDatagram::unbound()?;
        socket.send_to(&payload, &socket_path).await
    }
    .await;

    match result {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("seqread-send: cannot reach {}: {e}", socket_path.display());
            ExitCode::FAILURE
        }
    }
}
