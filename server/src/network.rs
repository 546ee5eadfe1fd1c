//! Server network layer handling UDP communications and the receive loop

use crate::config::ServerConfig;
use crate::error::Result;
use crate::session::{Outgoing, Session};
use log::{debug, error, info};
use shared::MAX_DATAGRAM_SIZE;
use std::io;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::task::JoinHandle;
use tokio::time::timeout;

/// Owns the socket and drives a [`Session`]
///
/// Every datagram, every liveness sweep and every state change happens on the
/// task that calls [`Server::run`]. The only other task is the liveness timer,
/// which does nothing but raise a flag.
pub struct Server {
    socket: UdpSocket,
    session: Session,
    config: ServerConfig,
    liveness_timer: Option<JoinHandle<()>>,
}

impl Server {
    /// Validates `config`, sets up the game and binds the UDP socket
    ///
    /// The liveness timer is not started until [`Server::run`] is called.
    pub async fn bind(config: ServerConfig) -> Result<Self> {
        let session = Session::new(&config)?;
        let socket = UdpSocket::bind(config.bind_addr()).await?;
        info!("Server listening on {}", socket.local_addr()?);

        Ok(Server {
            socket,
            session,
            config,
            liveness_timer: None,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Main server loop
    ///
    /// Receives with a short timeout so pending liveness sweeps are picked up
    /// even when nobody is sending anything. Only returns if the socket can no
    /// longer be used; dropping the future closes the socket and stops the
    /// game.
    pub async fn run(&mut self) -> Result<()> {
        if self.liveness_timer.is_none() {
            let timer = self.session.liveness().spawn_timer(&self.config.liveness);
            self.liveness_timer = Some(timer);
        }

        let mut buffer = [0u8; MAX_DATAGRAM_SIZE];
        info!("Server started successfully");

        loop {
            if self.session.poll_liveness() {
                debug!(
                    "Liveness sweep done, {} players remain",
                    self.session.registry().len()
                );
            }
            self.flush().await;

            let received =
                match timeout(self.config.poll_timeout, self.socket.recv_from(&mut buffer)).await {
                    Ok(received) => received,
                    // No traffic; go look at the liveness flag again
                    Err(_) => continue,
                };
            self.handle_received(received, &buffer).await;
        }
    }

    /// Handles the outcome of one receive
    ///
    /// A receive error is logged and followed by a short pause; it never ends
    /// the loop.
    async fn handle_received(&mut self, received: io::Result<(usize, SocketAddr)>, buffer: &[u8]) {
        match received {
            Ok((len, addr)) => {
                self.session.handle_datagram(addr, &buffer[..len]);
                self.flush().await;
            }
            Err(e) => {
                // ICMP port unreachable from a vanished client shows up here
                // on some platforms
                error!("Error receiving packet: {}", e);
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        }
    }

    /// Sends everything the session queued. A failed send is logged and the
    /// remaining messages still go out.
    async fn flush(&mut self) {
        for Outgoing { addr, message } in self.session.take_outbox() {
            let data = message.encode();
            if let Err(e) = self.socket.send_to(data.as_bytes(), addr).await {
                error!("Failed to send {} to {}: {}", message.kind(), addr, e);
            }
        }
    }
}

impl Drop for Server {
    fn drop(&mut self) {
        if let Some(timer) = self.liveness_timer.take() {
            timer.abort();
        }
    }
}
