//! The top-level connection state machine.
//!
//! `Session` owns the lifecycle of one TCP connection to a panel: connect,
//! log in, run for as long as the socket stays up, and tear down. The
//! entity cache in [`Dispatcher`] outlives any individual connection so a
//! host application can still read last-known state immediately after a
//! loss is observed, before deciding whether to reconnect — this crate does
//! not reconnect automatically (see `DESIGN.md`).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use log::{debug, info, warn};
use tokio::io::split;
use tokio::net::TcpStream;
use tokio::sync::Mutex as AsyncMutex;
use tokio::task::JoinHandle;
use tokio::time::timeout;

use crate::config::Config;
use crate::constants::{
    cmd_group, error_code, monitor_kind, subcmd, ChecksumMode, ACK_CONFIG_FULL, CALL_TIMEOUT_SECS,
    CONNECT_TIMEOUT_SECS, KEEPALIVE_INTERVAL_SECS, LOGIN_TIMEOUT_SECONDS, PROBE_TIMEOUT_SECS,
};
use crate::dispatcher::Dispatcher;
use crate::entities::{Area, Door, Input, Output};
use crate::error::{Error, Result};
use crate::listener::ListenerHandle;
use crate::multiplexer::{CommandResponse, Multiplexer};
use crate::reader;
use crate::send_gate::SendGate;

/// The wire's checksum framing. Fixed: nothing in the source under review
/// suggests a panel-negotiable checksum mode, so this crate always uses the
/// single trailing sum-8 byte.
const WIRE_CHECKSUM_MODE: ChecksumMode = ChecksumMode::Sum8;

/// The kind of entity passed to [`Session::monitor`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorKind {
    Door,
    Input,
    Output,
    Area,
}

impl MonitorKind {
    fn wire_value(self) -> u16 {
        match self {
            MonitorKind::Door => monitor_kind::DOOR,
            MonitorKind::Input => monitor_kind::INPUT,
            MonitorKind::Output => monitor_kind::OUTPUT,
            MonitorKind::Area => monitor_kind::AREA,
        }
    }
}

/// Lifecycle states a `Session` moves through.
///
/// There is no automatic transition back to `Connected` from `Lost`: a
/// caller that wants to resume talking to the panel calls `connect` again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connecting,
    Connected,
    LoggingIn,
    Authenticated,
    Disconnecting,
    Lost,
}

struct Connection {
    multiplexer: Arc<Multiplexer>,
    reader_task: JoinHandle<()>,
    writer_task: JoinHandle<()>,
    keepalive_shutdown: Arc<AtomicBool>,
    keepalive_task: Option<JoinHandle<()>>,
}

/// An async client for one Protege panel connection.
///
/// Cheaply cloneable is not supported directly — share a `Session` across
/// tasks behind an `Arc` if more than one task needs it; every method takes
/// `&self`.
pub struct Session {
    config: Config,
    dispatcher: Arc<Dispatcher>,
    state: Arc<StdMutex<SessionState>>,
    conn: AsyncMutex<Option<Connection>>,
}

impl Session {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            dispatcher: Arc::new(Dispatcher::new()),
            state: Arc::new(StdMutex::new(SessionState::Disconnected)),
            conn: AsyncMutex::new(None),
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        *self.state.lock().expect("session state lock poisoned")
    }

    fn set_state(&self, new_state: SessionState) {
        *self.state.lock().expect("session state lock poisoned") = new_state;
    }

    /// `true` only once the panel has accepted login.
    pub fn is_connected(&self) -> bool {
        self.state() == SessionState::Authenticated
    }

    /// Open the TCP connection, start the Packet Reader and send gate, and
    /// probe the panel with an `ARE_YOU_THERE`. Absence of a reply to the
    /// probe is logged and tolerated — some panels don't answer it — but a
    /// connection failure or any other error propagates.
    pub async fn connect(&self) -> Result<()> {
        self.set_state(SessionState::Connecting);

        let stream = match timeout(
            Duration::from_secs(CONNECT_TIMEOUT_SECS),
            TcpStream::connect((self.config.host.as_str(), self.config.port)),
        )
        .await
        {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => {
                self.set_state(SessionState::Disconnected);
                return Err(Error::ConnectFailed(e));
            }
            Err(_elapsed) => {
                self.set_state(SessionState::Disconnected);
                return Err(Error::ConnectFailed(std::io::Error::new(
                    std::io::ErrorKind::TimedOut,
                    "connect timed out",
                )));
            }
        };

        let (read_half, write_half) = split(stream);
        let (send_gate, writer_task) = SendGate::spawn(write_half);

        let terminate_state = Arc::clone(&self.state);
        let on_terminate = move || {
            let mut guard = terminate_state.lock().expect("session state lock poisoned");
            if !matches!(*guard, SessionState::Disconnecting | SessionState::Disconnected) {
                warn!("connection lost unexpectedly");
                *guard = SessionState::Lost;
            }
        };

        let (response_rx, reader_task) = reader::spawn(
            read_half,
            WIRE_CHECKSUM_MODE,
            Arc::clone(&self.dispatcher),
            send_gate.clone(),
            on_terminate,
        );

        let multiplexer = Arc::new(Multiplexer::new(send_gate, WIRE_CHECKSUM_MODE, response_rx));

        *self.conn.lock().await = Some(Connection {
            multiplexer: Arc::clone(&multiplexer),
            reader_task,
            writer_task,
            keepalive_shutdown: Arc::new(AtomicBool::new(false)),
            keepalive_task: None,
        });

        self.set_state(SessionState::Connected);

        match multiplexer
            .call_with_timeout(
                cmd_group::SYSTEM,
                subcmd::ARE_YOU_THERE,
                &[],
                Duration::from_secs(PROBE_TIMEOUT_SECS),
            )
            .await
        {
            Ok(_) => debug!("panel answered are-you-there probe"),
            Err(Error::Timeout) => debug!("panel did not answer are-you-there probe, continuing"),
            Err(e) => return Err(e),
        }

        Ok(())
    }

    /// Log in with the configured PIN, then set the 10-minute login
    /// timeout, request full acknowledgments, and start the keepalive task.
    pub async fn login(&self) -> Result<()> {
        if self.state() != SessionState::Connected {
            return Err(Error::NotAuthenticated);
        }
        self.set_state(SessionState::LoggingIn);

        let multiplexer = self.multiplexer().await?;

        let mut params = self.config.pin_digits();
        params.push(0xFF);

        match multiplexer.call(cmd_group::SYSTEM, subcmd::LOGIN, &params).await {
            Ok(CommandResponse::Ack) => {}
            Ok(CommandResponse::Nack(code))
                if code == error_code::INVALID_USER || code == error_code::NO_ACCESS_RIGHTS =>
            {
                self.set_state(SessionState::Connected);
                return Err(Error::AuthenticationFailed { code });
            }
            Ok(CommandResponse::Nack(code)) => {
                self.set_state(SessionState::Connected);
                return Err(Error::PanelError { code });
            }
            Ok(CommandResponse::Data(_)) => {
                self.set_state(SessionState::Connected);
                return Err(Error::FramingError("unexpected data reply to login".into()));
            }
            Err(e) => {
                self.set_state(SessionState::Connected);
                return Err(e);
            }
        }

        let timeout_params = LOGIN_TIMEOUT_SECONDS.to_le_bytes();
        multiplexer
            .call(cmd_group::SYSTEM, subcmd::SET_LOGIN_TIME, &timeout_params)
            .await?;
        multiplexer
            .call(cmd_group::SYSTEM, subcmd::ACK_CONFIG, &ACK_CONFIG_FULL)
            .await?;

        self.start_keepalive().await;
        self.set_state(SessionState::Authenticated);
        info!("logged in to panel");
        Ok(())
    }

    /// Request pushed events in human-readable form. Call after `login`.
    pub async fn start_events(&self) -> Result<()> {
        let multiplexer = self.authenticated_multiplexer().await?;
        multiplexer
            .call(cmd_group::SYSTEM, subcmd::REQUEST_EVENTS, &[0x01, 0x01])
            .await?;
        Ok(())
    }

    /// Start or stop status-change monitoring for one entity.
    pub async fn monitor(
        &self,
        kind: MonitorKind,
        index: u32,
        enable: bool,
        force_update: bool,
    ) -> Result<()> {
        let multiplexer = self.authenticated_multiplexer().await?;

        let mut flags = if enable { 0x01 } else { 0x00 };
        if force_update {
            flags |= 0x02;
        }

        let mut params = Vec::with_capacity(7);
        params.extend_from_slice(&kind.wire_value().to_le_bytes());
        params.extend_from_slice(&index.to_le_bytes());
        params.push(flags);

        multiplexer
            .call(cmd_group::SYSTEM, subcmd::REQUEST_TO_MONITOR, &params)
            .await?;
        Ok(())
    }

    /// Send a `COMMAND` and await its response. Used by [`crate::commands`];
    /// every such command requires an authenticated session.
    pub(crate) async fn call(&self, cmd_group: u8, subcmd: u8, params: &[u8]) -> Result<CommandResponse> {
        let multiplexer = self.authenticated_multiplexer().await?;
        multiplexer.call(cmd_group, subcmd, params).await
    }

    /// Best-effort logout, then tear down the connection's background
    /// tasks in reverse start order (keepalive, reader, writer) and drop
    /// the send gate.
    pub async fn disconnect(&self) {
        self.set_state(SessionState::Disconnecting);

        if let Ok(multiplexer) = self.multiplexer().await {
            let _ = multiplexer
                .call_with_timeout(
                    cmd_group::SYSTEM,
                    subcmd::LOGOUT,
                    &[],
                    Duration::from_secs(CALL_TIMEOUT_SECS),
                )
                .await;
        }

        if let Some(conn) = self.conn.lock().await.take() {
            if let Some(task) = conn.keepalive_task {
                conn.keepalive_shutdown.store(true, Ordering::Release);
                task.abort();
            }
            conn.reader_task.abort();
            conn.writer_task.abort();
        }

        self.set_state(SessionState::Disconnected);
        info!("disconnected from panel");
    }

    async fn start_keepalive(&self) {
        let mut guard = self.conn.lock().await;
        let Some(conn) = guard.as_mut() else { return };

        let multiplexer = Arc::clone(&conn.multiplexer);
        let shutdown = Arc::clone(&conn.keepalive_shutdown);

        let task = tokio::spawn(async move {
            loop {
                tokio::time::sleep(Duration::from_secs(KEEPALIVE_INTERVAL_SECS)).await;
                if shutdown.load(Ordering::Acquire) {
                    break;
                }
                if !multiplexer.send_fire_and_forget(cmd_group::SYSTEM, subcmd::ARE_YOU_THERE) {
                    warn!("keepalive: send gate closed, stopping");
                    break;
                }
                debug!("keepalive sent");
            }
        });

        conn.keepalive_task = Some(task);
    }

    async fn multiplexer(&self) -> Result<Arc<Multiplexer>> {
        self.conn
            .lock()
            .await
            .as_ref()
            .map(|c| Arc::clone(&c.multiplexer))
            .ok_or(Error::ConnectionLost)
    }

    async fn authenticated_multiplexer(&self) -> Result<Arc<Multiplexer>> {
        if self.state() != SessionState::Authenticated {
            return Err(Error::NotAuthenticated);
        }
        self.multiplexer().await
    }

    // -- Cache reads, delegated to the Dispatcher. Valid even while disconnected. --

    pub fn door(&self, index: u32) -> Option<Door> {
        self.dispatcher.door(index)
    }

    pub fn input(&self, index: u32) -> Option<Input> {
        self.dispatcher.input(index)
    }

    pub fn output(&self, index: u32) -> Option<Output> {
        self.dispatcher.output(index)
    }

    pub fn area(&self, index: u32) -> Option<Area> {
        self.dispatcher.area(index)
    }

    pub fn doors(&self) -> Vec<Door> {
        self.dispatcher.doors()
    }

    pub fn inputs(&self) -> Vec<Input> {
        self.dispatcher.inputs()
    }

    pub fn outputs(&self) -> Vec<Output> {
        self.dispatcher.outputs()
    }

    pub fn areas(&self) -> Vec<Area> {
        self.dispatcher.areas()
    }

    // -- Listener registration, delegated to the Dispatcher. --

    pub fn on_door<F: FnMut(Door) + Send + 'static>(&self, callback: F) -> ListenerHandle {
        self.dispatcher.on_door(callback)
    }

    pub fn on_input<F: FnMut(Input) + Send + 'static>(&self, callback: F) -> ListenerHandle {
        self.dispatcher.on_input(callback)
    }

    pub fn on_output<F: FnMut(Output) + Send + 'static>(&self, callback: F) -> ListenerHandle {
        self.dispatcher.on_output(callback)
    }

    pub fn on_area<F: FnMut(Area) + Send + 'static>(&self, callback: F) -> ListenerHandle {
        self.dispatcher.on_area(callback)
    }

    pub fn on_event<F: FnMut(String) + Send + 'static>(&self, callback: F) -> ListenerHandle {
        self.dispatcher.on_event(callback)
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("host", &self.config.host)
            .field("port", &self.config.port)
            .field("state", &self.state())
            .finish()
    }
}
