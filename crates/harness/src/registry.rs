// Ground-truth view of the channels the harness holds open.
//
// The counters here are what the server is expected to report through
// `active_users_count` / `active_docs_count`. A document channel only
// counts once the server has announced it with an `adddoc` carrying its
// pid; a document counts while at least one such channel is open on it.

use std::collections::BTreeMap;
use std::fmt;

use thiserror::Error;

/// Harness-local identifier of one logical channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChannelId(u64);

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ch{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelRole {
    Admin,
    Document,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Channel {
    pub id: ChannelId,
    pub role: ChannelRole,
    /// Server-assigned process id, learned from `adddoc`.
    pub pid: Option<u32>,
    /// Document URL the channel was opened against (document channels only).
    pub doc_url: Option<String>,
}

impl Channel {
    fn counts_as_user(&self) -> bool {
        self.role == ChannelRole::Document && self.pid.is_some()
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("unknown channel {0}")]
    UnknownChannel(ChannelId),

    #[error("channel {0} is not a document channel")]
    NotDocument(ChannelId),

    #[error("channel {id} already has pid {pid}")]
    PidAlreadyAssigned { id: ChannelId, pid: u32 },
}

#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    next_id: u64,
    channels: BTreeMap<ChannelId, Channel>,
    active_users: usize,
    active_docs: usize,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn active_users(&self) -> usize {
        self.active_users
    }

    pub fn active_docs(&self) -> usize {
        self.active_docs
    }

    pub fn channel(&self, id: ChannelId) -> Option<&Channel> {
        self.channels.get(&id)
    }

    /// First open document channel announced with `pid`.
    pub fn channel_by_pid(&self, pid: u32) -> Option<&Channel> {
        self.channels
            .values()
            .find(|channel| channel.role == ChannelRole::Document && channel.pid == Some(pid))
    }

    /// Open document channels in the order they were opened.
    pub fn document_channels(&self) -> impl Iterator<Item = &Channel> {
        self.channels.values().filter(|channel| channel.role == ChannelRole::Document)
    }

    pub fn open_admin_channel(&mut self) -> ChannelId {
        self.insert(ChannelRole::Admin, None)
    }

    /// Record a document channel that has not been announced yet.
    pub fn open_document_channel(&mut self, doc_url: impl Into<String>) -> ChannelId {
        self.insert(ChannelRole::Document, Some(doc_url.into()))
    }

    /// Record the pid from the channel's `adddoc` and count it.
    pub fn assign_pid(&mut self, id: ChannelId, pid: u32) -> Result<(), RegistryError> {
        let channel = self.channels.get(&id).ok_or(RegistryError::UnknownChannel(id))?;
        if channel.role != ChannelRole::Document {
            return Err(RegistryError::NotDocument(id));
        }
        if let Some(existing) = channel.pid {
            return Err(RegistryError::PidAlreadyAssigned { id, pid: existing });
        }

        let first_for_document = !self.document_is_active(channel.doc_url.as_deref());
        if let Some(channel) = self.channels.get_mut(&id) {
            channel.pid = Some(pid);
        }

        self.active_users += 1;
        if first_for_document {
            self.active_docs += 1;
        }
        Ok(())
    }

    /// Forget a channel, uncounting it if it had been announced.
    pub fn close_channel(&mut self, id: ChannelId) -> Result<Channel, RegistryError> {
        let channel = self.channels.remove(&id).ok_or(RegistryError::UnknownChannel(id))?;
        if channel.counts_as_user() {
            self.active_users -= 1;
            if !self.document_is_active(channel.doc_url.as_deref()) {
                self.active_docs -= 1;
            }
        }
        Ok(channel)
    }

    /// Drop every channel and zero the counters.
    pub fn reset(&mut self) {
        self.channels.clear();
        self.active_users = 0;
        self.active_docs = 0;
    }

    fn insert(&mut self, role: ChannelRole, doc_url: Option<String>) -> ChannelId {
        self.next_id += 1;
        let id = ChannelId(self.next_id);
        self.channels.insert(id, Channel { id, role, pid: None, doc_url });
        id
    }

    fn document_is_active(&self, doc_url: Option<&str>) -> bool {
        self.channels
            .values()
            .any(|channel| channel.counts_as_user() && channel.doc_url.as_deref() == doc_url)
    }
}
