use adminprobe_common::path::basename;
use adminprobe_common::protocol::response::{ACTIVE_DOCS_COUNT, ADD_DOC, RM_DOC};
use adminprobe_common::protocol::{AddDoc, AdminCommand, Count, CountKind, Event, RmDoc};
use tracing::info;

use crate::registry::ChannelId;
use crate::transport::Inbound;

use super::{AdminContext, StepError, FIRST_DOCUMENT, SECOND_DOCUMENT};

/// Views opened by `add_doc_notify`, in order.
const VIEWS: [&str; 3] = [FIRST_DOCUMENT, FIRST_DOCUMENT, SECOND_DOCUMENT];

/// Every document view opened is announced on a subscribed admin channel.
pub(super) async fn add_doc_notify(ctx: &mut AdminContext) -> Result<(), StepError> {
    let token = ctx.auth_token.clone().ok_or(StepError::MissingAuthToken)?;

    ctx.open_admin_channel().await?;
    ctx.admin_send(&AdminCommand::Auth { token: token.expose().to_owned() }).await?;
    subscribe(ctx, Event::AddDoc).await?;

    for name in VIEWS {
        open_view(ctx, name).await?;
    }

    info!(
        users = ctx.registry.active_users(),
        docs = ctx.registry.active_docs(),
        "document views announced"
    );
    Ok(())
}

/// Subscribe to `event` and wait until the server has taken the subscription.
async fn subscribe(ctx: &mut AdminContext, event: Event) -> Result<(), StepError> {
    ctx.admin_send(&AdminCommand::Subscribe(event)).await?;
    // `subscribe` has no reply and notifications are triggered on other
    // sockets. Commands on one channel are handled in order, so any answer
    // to a later command means the subscription is active.
    let reply = ctx.admin_exchange(&AdminCommand::ActiveDocsCount, ACTIVE_DOCS_COUNT).await?;
    Count::decode(&reply, CountKind::ActiveDocs)?;
    Ok(())
}

/// Open one view of `name` and record the pid its `adddoc` carries.
async fn open_view(ctx: &mut AdminContext, name: &str) -> Result<ChannelId, StepError> {
    let document = ctx.fixture.document(name)?;
    let endpoint = ctx.endpoints.document_channel(&document.url);

    // Armed before the channel exists: the announcement may race the load reply.
    let wait = ctx.prepare();
    let id = ctx.registry.open_document_channel(document.url.as_str());
    let mut handle = match ctx.transport.open(id.to_string(), &endpoint, Inbound::Discard).await {
        Ok(handle) => handle,
        Err(error) => {
            ctx.registry.close_channel(id)?;
            return Err(error.into());
        }
    };
    let sent = handle.send(AdminCommand::Load { url: document.url.clone() }.to_string()).await;
    ctx.documents.insert(id, handle);
    sent?;

    let reply = ctx.await_message(wait, ADD_DOC).await?;
    let announced = AddDoc::decode(&reply)?;
    let expected = basename(&document.url);
    if announced.doc_name != expected {
        return Err(StepError::DocumentMismatch {
            expected: expected.to_owned(),
            actual: announced.doc_name,
        });
    }

    ctx.registry.assign_pid(id, announced.pid)?;
    info!(channel = %id, pid = announced.pid, document = name, "view announced");
    Ok(id)
}

/// Closing a view is announced with the pid it was opened under.
pub(super) async fn rm_doc_notify(ctx: &mut AdminContext) -> Result<(), StepError> {
    subscribe(ctx, Event::RmDoc).await?;

    let (id, pid) = ctx
        .registry
        .document_channels()
        .find(|channel| {
            channel.doc_url.as_deref().map(basename) == Some(FIRST_DOCUMENT)
                && channel.pid.is_some()
        })
        .and_then(|channel| channel.pid.map(|pid| (channel.id, pid)))
        .ok_or(StepError::NoDocumentView(FIRST_DOCUMENT))?;
    let handle = ctx.documents.remove(&id).ok_or(StepError::NoDocumentView(FIRST_DOCUMENT))?;

    let wait = ctx.prepare();
    handle.close().await;

    // The view only leaves the counters once the server has announced it.
    let reply = ctx.await_message(wait, RM_DOC).await?;
    let removed = RmDoc::decode(&reply)?;
    if removed.pid != pid {
        return Err(StepError::PidMismatch { expected: pid, actual: removed.pid });
    }
    ctx.registry.close_channel(id)?;

    info!(channel = %id, pid, reason = %removed.reason, "view removal announced");
    Ok(())
}
