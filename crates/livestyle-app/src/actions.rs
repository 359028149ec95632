//! Background task spawning
//!
//! Every suspension point of the engine (timers, resource host requests,
//! diff engine calls) runs in its own task and reports back as a
//! [`Message`]. Nothing here touches engine state.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use livestyle_core::prelude::*;
use livestyle_core::{Patch, TabId};
use livestyle_host::{DiffEngine, DiffRequest, PatchRequest, ResourceChannel, APPLY_PATCH, CALCULATE_DIFF};

use crate::diff_queue::DiffJob;
use crate::message::Message;
use crate::transaction::{TxEvent, TxKey};

fn deliver(msg_tx: &mpsc::UnboundedSender<Message>, msg: Message) {
    if msg_tx.send(msg).is_err() {
        trace!("Engine loop gone, dropping task result");
    }
}

/// Deliver `msg` after `delay`
pub(crate) fn spawn_timer(delay: Duration, msg: Message, msg_tx: mpsc::UnboundedSender<Message>) {
    tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        deliver(&msg_tx, msg);
    });
}

/// Read a resource for a transaction
pub(crate) fn spawn_fetch_content(channel: ResourceChannel, key: TxKey, msg_tx: mpsc::UnboundedSender<Message>) {
    tokio::spawn(async move {
        let result = channel.get_resource_content(&key.url).await;
        deliver(&msg_tx, Message::Transaction(TxEvent::ContentFetched { key, result }));
    });
}

/// Read a resource to seed the diff baseline
pub(crate) fn spawn_fetch_baseline(channel: ResourceChannel, key: TxKey, msg_tx: mpsc::UnboundedSender<Message>) {
    tokio::spawn(async move {
        let result = channel.get_resource_content(&key.url).await;
        deliver(&msg_tx, Message::BaselineFetched { key, result });
    });
}

/// Ask the diff engine to apply a transaction's snapshot, bounded by `timeout`
pub(crate) fn spawn_apply_patches<D>(
    engine: Arc<D>,
    key: TxKey,
    content: String,
    patches: Arc<Vec<Patch>>,
    timeout: Duration,
    msg_tx: mpsc::UnboundedSender<Message>,
) where
    D: DiffEngine + Sync + 'static,
{
    tokio::spawn(async move {
        let request = PatchRequest::css(key.url.clone(), content, patches.to_vec());
        let result = match tokio::time::timeout(timeout, engine.patch(request)).await {
            Ok(result) => result,
            Err(_) => Err(Error::response_timeout(APPLY_PATCH, timeout.as_millis() as u64)),
        };
        deliver(&msg_tx, Message::Transaction(TxEvent::PatchesApplied { key, result }));
    });
}

/// Commit patched content to the resource
pub(crate) fn spawn_write_back(
    channel: ResourceChannel,
    key: TxKey,
    content: String,
    msg_tx: mpsc::UnboundedSender<Message>,
) {
    tokio::spawn(async move {
        let result = channel.update_resource(&key.url, &content).await;
        deliver(&msg_tx, Message::Transaction(TxEvent::WriteBackDone { key, result }));
    });
}

/// Compute the patches of a browser-side edit, bounded by `timeout`
pub(crate) fn spawn_calculate_diff<D>(
    engine: Arc<D>,
    job: DiffJob,
    timeout: Duration,
    msg_tx: mpsc::UnboundedSender<Message>,
) where
    D: DiffEngine + Sync + 'static,
{
    tokio::spawn(async move {
        let DiffJob {
            key,
            previous,
            content,
        } = job;
        let request = DiffRequest::css(key.url.clone(), content, previous);
        let result = match tokio::time::timeout(timeout, engine.diff(request)).await {
            Ok(result) => result,
            Err(_) => Err(Error::response_timeout(CALCULATE_DIFF, timeout.as_millis() as u64)),
        };
        deliver(&msg_tx, Message::DiffComputed { key, result });
    });
}

/// List the stylesheets the resource host knows for a tab
pub(crate) fn spawn_fetch_stylesheets(channel: ResourceChannel, msg_tx: mpsc::UnboundedSender<Message>) {
    tokio::spawn(async move {
        let tab: TabId = channel.tab();
        let result = channel.get_stylesheets().await;
        deliver(&msg_tx, Message::StylesheetsFetched { tab, result });
    });
}
