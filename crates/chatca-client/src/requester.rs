//! Rendezvous with the authority and request a certificate
//!
//! A request sent before the authority is reading the conversation could
//! be answered before our own subscription sees the reply. The client
//! therefore subscribes first, then repeats `AckRequest--<username>` with a
//! growing delay until the authority answers `Ack--<username>`, and only
//! then sends the signature request. Replies carrying another uuid belong to
//! somebody else's request and are skipped.

use std::sync::Arc;
use std::time::Duration;

use chatca_core::protocol::{self, Classified};
use chatca_core::{
    classify, ClientConfig, MessagingChannel, SignatureRequest, SignatureResponse, Subscription,
};
use indicatif::{ProgressBar, ProgressStyle};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::{ClientError, Result};

/// How long to wait for an ungated certificate
pub const UNGATED_TIMEOUT: Duration = Duration::from_secs(5);

/// How long to wait when approvals may be needed
pub const GATED_TIMEOUT: Duration = Duration::from_secs(60 * 60);

/// Delay before the next ack request after `sent` have gone out
pub fn ack_backoff(sent: u32) -> Duration {
    Duration::from_millis(100 + 10 * u64::from(sent))
}

/// Time allowed for a request.
///
/// The client cannot tell which teams are gated, so any explicitly
/// requested principal gets the long timeout.
pub fn request_timeout(request: &SignatureRequest) -> Duration {
    if request.requested_principal.is_empty() {
        UNGATED_TIMEOUT
    } else {
        GATED_TIMEOUT
    }
}

/// Talks to one authority over a messaging channel
pub struct Requester<C> {
    channel: Arc<C>,
    config: ClientConfig,
    show_progress: bool,
}

impl<C> Requester<C>
where
    C: MessagingChannel + 'static,
{
    /// Create a requester for the authority described by `config`
    pub fn new(channel: Arc<C>, config: ClientConfig) -> Self {
        Self {
            channel,
            config,
            show_progress: false,
        }
    }

    /// Show a spinner on the terminal while waiting
    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    /// The authority's config
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Perform the handshake and return the authority's response
    pub async fn request_signature(&self, request: &SignatureRequest) -> Result<SignatureResponse> {
        let username = self.channel.username().to_string();
        if username == self.config.bot_name {
            return Err(ClientError::SameUser { username });
        }

        let mut subscription = self.channel.subscribe().await?;

        let cancel = CancellationToken::new();
        let ack_cancel = cancel.child_token();
        let ack_task = self.spawn_ack_requests(username.clone(), ack_cancel.clone());
        let spinner = self
            .show_progress
            .then(|| spawn_spinner(&self.config.bot_name, cancel.clone()));

        let timeout = request_timeout(request);
        let outcome = tokio::time::timeout(
            timeout,
            self.await_response(&mut subscription, &username, request, &ack_cancel),
        )
        .await;

        cancel.cancel();
        if let Err(e) = ack_task.await {
            warn!(error = %e, "ack request task failed");
        }
        if let Some(spinner) = spinner {
            let _ = spinner.await;
        }

        outcome.unwrap_or(Err(ClientError::Timeout { after: timeout }))
    }

    fn spawn_ack_requests(&self, username: String, cancel: CancellationToken) -> JoinHandle<()> {
        let channel = self.channel.clone();
        let config = self.config.clone();
        tokio::spawn(async move {
            let body = protocol::ack_request(&username);
            let mut sent = 0u32;
            loop {
                if cancel.is_cancelled() {
                    return;
                }
                if let Err(e) = channel.send(&config.team_name, config.channel(), &body).await {
                    warn!(error = %e, "failed to send ack request");
                }
                sent += 1;
                tokio::select! {
                    _ = cancel.cancelled() => return,
                    _ = tokio::time::sleep(ack_backoff(sent)) => {}
                }
            }
        })
    }

    async fn await_response(
        &self,
        subscription: &mut Subscription,
        username: &str,
        request: &SignatureRequest,
        ack_cancel: &CancellationToken,
    ) -> Result<SignatureResponse> {
        let mut acked = false;
        loop {
            let message = subscription.next().await?;
            if message.sender.username != self.config.bot_name {
                continue;
            }

            match classify(&message, &self.config.bot_name) {
                Classified::AckResponse { username: acked_user }
                    if !acked && acked_user == username =>
                {
                    acked = true;
                    ack_cancel.cancel();
                    debug!(bot = %self.config.bot_name, "authority acknowledged, sending signature request");
                    self.channel
                        .send(
                            &self.config.team_name,
                            self.config.channel(),
                            &request.to_message()?,
                        )
                        .await?;
                }
                Classified::SignatureResponse(body) => {
                    let response = SignatureResponse::parse(body)?;
                    if response.uuid != request.uuid {
                        debug!(uuid = %response.uuid, "skipping response to another request");
                        continue;
                    }
                    return Ok(response);
                }
                _ => {}
            }
        }
    }
}

fn spawn_spinner(bot: &str, cancel: CancellationToken) -> JoinHandle<()> {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.set_message(format!("Waiting for a certificate from {}...", bot));

    tokio::spawn(async move {
        let mut tick = tokio::time::interval(Duration::from_millis(100));
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tick.tick() => spinner.tick(),
            }
        }
        spinner.finish_and_clear();
    })
}
