//! Terminal client for exercising a running server by hand.
//!
//! Lines typed on stdin are sent as guesses. `/point <x> <y>` sends a stroke
//! and `/quit` disconnects. Liveness challenges are answered automatically.

use clap::Parser;
use log::{info, warn};
use shared::{ClientMessage, Point, Role, ServerMessage, DEFAULT_PORT, MAX_DATAGRAM_SIZE};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::{lookup_host, UdpSocket};
use tokio::time::{interval, Instant};

/// The server challenges every ~2s, so this much silence means trouble
const SILENCE_TIMEOUT: Duration = Duration::from_secs(3);

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server address
    #[arg(default_value = "127.0.0.1")]
    address: String,

    /// Server port
    #[arg(default_value_t = DEFAULT_PORT)]
    port: u16,
}

enum Input {
    Send(ClientMessage),
    Quit,
    Ignore,
}

fn parse_input(line: &str) -> Input {
    let line = line.trim();
    if line.is_empty() {
        return Input::Ignore;
    }
    if line == "/quit" {
        return Input::Quit;
    }

    if let Some(rest) = line.strip_prefix("/point") {
        let coords: Vec<i32> = rest
            .split_whitespace()
            .filter_map(|v| v.parse().ok())
            .collect();
        return match coords.as_slice() {
            [x, y] => Input::Send(ClientMessage::Point(Point::new(*x, *y))),
            _ => {
                eprintln!("usage: /point <x> <y>");
                Input::Ignore
            }
        };
    }

    Input::Send(ClientMessage::Guess {
        text: line.to_string(),
    })
}

fn print_message(message: &ServerMessage) {
    match message {
        ServerMessage::Connected { id } => println!("Connected as: Player {}", id),
        ServerMessage::Chat { text, bold, .. } if *bold => println!("** {} **", text),
        ServerMessage::Chat { text, .. } => println!("{}", text),
        ServerMessage::Points(points) => info!("Received {} points", points.len()),
        ServerMessage::Scores(scores) => {
            let board: Vec<String> = scores
                .iter()
                .map(|s| format!("Player {}: {}", s.id, s.score))
                .collect();
            println!("Scores: {}", board.join(", "));
        }
        ServerMessage::Drawing { word } => println!("New round! You are drawing: {}", word),
        ServerMessage::Guessing => println!("New round! Guess the word."),
        ServerMessage::Waiting => println!("Waiting for more players..."),
        ServerMessage::GameState(role) => match role {
            Role::Guessing => println!("You are guessing."),
            Role::Drawing { word } => println!("You are drawing: {}", word),
            Role::Correct => println!("You guessed correctly!"),
            Role::Waiting => println!("Waiting for more players..."),
        },
        ServerMessage::Check { .. } => {}
    }
}

async fn send(socket: &UdpSocket, message: &ClientMessage) -> std::io::Result<()> {
    socket.send(message.encode().as_bytes()).await?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let args = Args::parse();
    let server_addr: SocketAddr = lookup_host((args.address.as_str(), args.port))
        .await?
        .next()
        .ok_or("could not resolve server address")?;

    let socket = UdpSocket::bind("0.0.0.0:0").await?;
    socket.connect(server_addr).await?;
    println!("Connecting to {}...", server_addr);
    send(&socket, &ClientMessage::Connect).await?;

    let mut stdin = BufReader::new(tokio::io::stdin()).lines();
    let mut buffer = [0u8; MAX_DATAGRAM_SIZE];
    let mut watchdog = interval(SILENCE_TIMEOUT);
    let mut last_heard = Instant::now();
    let mut warned = false;

    loop {
        tokio::select! {
            result = socket.recv(&mut buffer) => {
                let len = match result {
                    Ok(len) => len,
                    Err(e) => {
                        eprintln!("Lost connection to server: {}", e);
                        break;
                    }
                };
                last_heard = Instant::now();
                warned = false;

                match ServerMessage::decode(&buffer[..len]) {
                    Ok(ServerMessage::Check { token }) => {
                        send(&socket, &ClientMessage::Check { token }).await?;
                    }
                    Ok(message) => print_message(&message),
                    Err(e) => warn!("Unrecognized message: {}", e),
                }
            }

            line = stdin.next_line() => {
                match line? {
                    None => break,
                    Some(line) => match parse_input(&line) {
                        Input::Send(message) => send(&socket, &message).await?,
                        Input::Quit => break,
                        Input::Ignore => {}
                    },
                }
            }

            _ = watchdog.tick() => {
                if last_heard.elapsed() < SILENCE_TIMEOUT {
                    continue;
                }
                if warned {
                    eprintln!("Connection to server timed out");
                    break;
                }
                println!("Connecting...");
                warned = true;
            }
        }
    }

    // Best effort; the server evicts us anyway if this is lost
    let _ = send(&socket, &ClientMessage::Disconnect).await;
    Ok(())
}
