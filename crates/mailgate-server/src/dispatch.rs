//! Dispatcher — the request entry point.
//!
//! One context object owns the process-wide state: the immutable config
//! snapshot, the lazily-built shared transport, the duplicate gate and the
//! idle timer. Requests flow through [`Dispatcher::receive`]; sends run as
//! spawned tasks and report back over the reply channel.

use crate::config::ServerConfig;
use crate::idle::IdleTimer;
use crate::protocol::{Reply, Request};
use lettre::{AsyncSmtpTransport, Tokio1Executor};
use mailgate_core::{normalize, DedupGate, Message, TransportOptions};
use mailgate_send::{build_transport, deliver, SendError};
use std::sync::{Arc, Mutex};
use tokio::sync::{mpsc, Notify};

/// Cheap-clone handle to the dispatcher context.
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<Inner>,
}

struct Inner {
    config: ServerConfig,
    shared: tokio::sync::Mutex<Option<Arc<AsyncSmtpTransport<Tokio1Executor>>>>,
    dedup: Mutex<DedupGate>,
    idle: IdleTimer,
    replies: mpsc::Sender<Reply>,
}

impl Dispatcher {
    /// Build the dispatcher context. The config must already be the
    /// decrypted startup snapshot.
    pub fn new(config: ServerConfig, replies: mpsc::Sender<Reply>, stop: Arc<Notify>) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                shared: tokio::sync::Mutex::new(None),
                dedup: Mutex::new(DedupGate::new()),
                idle: IdleTimer::new(stop),
                replies,
            }),
        }
    }

    /// Arm the idle timer at startup.
    pub fn arm_idle(&self) {
        self.inner.idle.reset(self.inner.config.is_subscribe());
    }

    /// Cancel pending work at shutdown.
    pub fn shutdown(&self) {
        self.inner.idle.cancel();
    }

    /// Handle one inbound request.
    ///
    /// Dedup-memo and idle-timer updates happen synchronously, in arrival
    /// order; the send itself is a spawned task, so overlapping sends do
    /// not serialize against each other.
    pub fn receive(&self, request: Request) {
        let Some(mut payload) = request.message else {
            return;
        };

        if let Ok(mut gate) = self.inner.dedup.lock() {
            if !gate.admit(&payload.message) {
                return;
            }
        }

        // Request in flight: no auto-stop until it completes.
        self.inner.idle.cancel();

        if let Some(options) = payload.options.take() {
            // Per-request options: a one-off transport, never the shared
            // one, and a completion reply when the caller asked for one.
            let reply_to = match (request.from, request.callback) {
                (Some(from), Some(callback)) => Some((from, callback)),
                _ => None,
            };
            let message = payload.message;
            let dispatcher = self.clone();
            tokio::spawn(async move {
                let result = dispatcher.send_one_off(options, message).await;
                if let Err(err) = &result {
                    log::error!("Error {}", err);
                }
                if let Some((to, callback)) = reply_to {
                    let reply = Reply {
                        to,
                        callback,
                        error: result.err().map(|err| err.to_string()),
                    };
                    if dispatcher.inner.replies.send(reply).await.is_err() {
                        log::warn!(
                            "Reply channel closed before the send result could be delivered"
                        );
                    }
                }
                dispatcher.reset_idle();
            });
        } else {
            let message = payload.message;
            let dispatcher = self.clone();
            tokio::spawn(async move {
                if let Err(err) = dispatcher.send_shared(message).await {
                    log::error!("Error {}", err);
                }
                dispatcher.reset_idle();
            });
        }

        self.reset_idle();
    }

    fn reset_idle(&self) {
        self.inner.idle.reset(self.inner.config.is_subscribe());
    }

    async fn send_one_off(
        &self,
        mut options: TransportOptions,
        mut message: Message,
    ) -> Result<(), SendError> {
        normalize(&mut options);
        let mailer = build_transport(&options)?;
        message.fill_defaults(&self.inner.config.defaults);
        deliver(&mailer, &message).await
    }

    async fn send_shared(&self, mut message: Message) -> Result<(), SendError> {
        let mailer = self.shared_transport().await?;
        message.fill_defaults(&self.inner.config.defaults);
        deliver(&mailer, &message).await
    }

    /// Get-or-create accessor for the process-wide transport: built lazily
    /// from the configured options on first use, reused afterwards.
    async fn shared_transport(
        &self,
    ) -> Result<Arc<AsyncSmtpTransport<Tokio1Executor>>, SendError> {
        let mut slot = self.inner.shared.lock().await;
        if let Some(mailer) = slot.as_ref() {
            return Ok(Arc::clone(mailer));
        }

        let mut options = self.inner.config.transport.clone();
        normalize(&mut options);
        let mailer = Arc::new(build_transport(&options)?);
        *slot = Some(Arc::clone(&mailer));
        Ok(mailer)
    }
}
