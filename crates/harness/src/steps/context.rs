use std::collections::BTreeMap;
use std::time::Duration;

use adminprobe_common::protocol::{AdminCommand, ProtocolMessage};
use tracing::debug;

use crate::auth::{AuthError, AuthToken, Credentials, LoginClient};
use crate::bridge::{Exchange, MessageBridge, PreparedWait};
use crate::config::Endpoints;
use crate::fixture::DocumentFixture;
use crate::registry::{ChannelId, ConnectionRegistry};
use crate::transport::{ChannelHandle, Inbound, WsTransport};

use super::StepError;

/// State carried from one step to the next.
///
/// Dropping the context drops every channel handle, which aborts their
/// reader tasks.
#[derive(Debug)]
pub struct AdminContext {
    pub(super) endpoints: Endpoints,
    pub(super) credentials: Credentials,
    pub(super) login: LoginClient,
    pub(super) fixture: DocumentFixture,
    pub(super) transport: WsTransport,
    pub(super) registry: ConnectionRegistry,
    pub(super) auth_token: Option<AuthToken>,
    message_timeout: Duration,
    bridge: MessageBridge,
    admin: Option<(ChannelId, ChannelHandle)>,
    pub(super) documents: BTreeMap<ChannelId, ChannelHandle>,
}

impl AdminContext {
    pub fn new(
        endpoints: Endpoints,
        credentials: Credentials,
        fixture: DocumentFixture,
        message_timeout: Duration,
    ) -> Result<Self, AuthError> {
        let login = LoginClient::new(endpoints.admin_console(), message_timeout)?;
        Ok(Self {
            endpoints,
            credentials,
            login,
            fixture,
            transport: WsTransport::new(message_timeout),
            registry: ConnectionRegistry::new(),
            auth_token: None,
            message_timeout,
            bridge: MessageBridge::new(),
            admin: None,
            documents: BTreeMap::new(),
        })
    }

    pub fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }

    pub fn has_auth_token(&self) -> bool {
        self.auth_token.is_some()
    }

    /// Replace the admin channel with a fresh, unauthenticated one.
    pub(super) async fn open_admin_channel(&mut self) -> Result<(), StepError> {
        if let Some((id, handle)) = self.admin.take() {
            handle.close().await;
            self.registry.close_channel(id)?;
        }

        let endpoint = self.endpoints.admin_channel();
        let id = self.registry.open_admin_channel();
        let inbound = Inbound::Bridge(self.bridge.clone());
        let opened = self.transport.open(id.to_string(), &endpoint, inbound).await;
        match opened {
            Ok(handle) => {
                self.admin = Some((id, handle));
                Ok(())
            }
            Err(error) => {
                self.registry.close_channel(id)?;
                Err(error.into())
            }
        }
    }

    /// Send a command that has no reply.
    pub(super) async fn admin_send(&mut self, command: &AdminCommand) -> Result<(), StepError> {
        let (_, handle) = self.admin.as_mut().ok_or(StepError::NoAdminChannel)?;
        handle.send(command.to_string()).await?;
        Ok(())
    }

    /// Send a command and wait for the admin channel's answer.
    pub(super) async fn admin_exchange(
        &mut self,
        command: &AdminCommand,
        awaiting: &'static str,
    ) -> Result<ProtocolMessage, StepError> {
        let wait = self.prepare();
        self.admin_send(command).await?;
        self.await_message(wait, awaiting).await
    }

    /// Arm the bridge before triggering a notification.
    pub(super) fn prepare(&self) -> PreparedWait {
        self.bridge.prepare()
    }

    pub(super) async fn await_message(
        &self,
        wait: PreparedWait,
        awaiting: &'static str,
    ) -> Result<ProtocolMessage, StepError> {
        match wait.wait(self.message_timeout).await {
            Exchange::Delivered(raw) => {
                debug!(awaiting, message = %raw, "admin message delivered");
                Ok(ProtocolMessage::parse(raw))
            }
            Exchange::TimedOut => Err(StepError::TimedOut {
                awaiting,
                timeout_ms: self.message_timeout.as_millis() as u64,
            }),
        }
    }

    /// Close every open channel, document views first.
    pub async fn close_all(&mut self) {
        for (id, handle) in std::mem::take(&mut self.documents) {
            handle.close().await;
            self.forget_channel(id);
        }
        if let Some((id, handle)) = self.admin.take() {
            handle.close().await;
            self.forget_channel(id);
        }
    }

    fn forget_channel(&mut self, id: ChannelId) {
        if let Err(error) = self.registry.close_channel(id) {
            debug!(channel = %id, %error, "channel already gone from registry");
        }
    }
}
