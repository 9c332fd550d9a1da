// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Inbound dispatch table (`spec.md` §4.4, §6.2): one arm per
//! [`InboundMessage`] variant, translating wire requests into calls onto the
//! agent manager / terminal service / checkout engine / filesystem browser
//! and back into a [`Response`].
//!
//! Mirrors the teacher's `handle_request` match in `listener/mod.rs`
//! (`examples/alfredjeanlab-oddjobs/crates/daemon/src/listener/mod.rs`): a
//! single exhaustive match over the request enum, one function call per arm,
//! no handler touching the socket directly.

use std::sync::Arc;

use paseo_core::{AgentId, CheckoutDiffMode, HostError, PermissionRequestId, ProviderKind, TerminalId};
use paseo_wire::{InboundMessage, Push, Response, TerminalInput as WireTerminalInput, TimelineDirection};

use crate::timeline_store::AfterQueryResult;

use super::connection::ConnectionState;
use super::{multiplex, now_ms, HubCtx};

fn parse_agent_id(s: &str) -> AgentId {
    AgentId::from_string(s)
}

fn parse_terminal_id(s: &str) -> TerminalId {
    TerminalId::from_string(s)
}

fn parse_provider(s: &str) -> Result<ProviderKind, HostError> {
    ProviderKind::parse(s).ok_or_else(|| HostError::validation(format!("unknown provider {s:?}")))
}

/// Dispatches one inbound message, returning the payload for its
/// `*_response` envelope. Side-effecting subscribe operations also spawn a
/// forwarder task that streams subsequent pushes to `conn` for the life of
/// the subscription.
pub(crate) async fn handle(
    ctx: &Arc<HubCtx>,
    conn: &Arc<ConnectionState>,
    msg: InboundMessage,
) -> Result<Response, HostError> {
    match msg {
        InboundMessage::Heartbeat { .. } => unreachable!("handled before dispatch"),

        InboundMessage::RegisterPushToken { .. } => {
            // Push delivery is an external collaborator (`spec.md` §1
            // Non-goals); the RPC shape is honored, nothing is stored.
            Ok(Response::Ack)
        }

        InboundMessage::CreateAgent { provider, cwd, title, mode_id, model, labels } => {
            let provider = parse_provider(&provider)?;
            let agent = ctx
                .agents
                .create_agent(provider, cwd, title, mode_id, model, labels.into_iter().collect())
                .await?;
            Ok(Response::AgentResponse { agent })
        }

        InboundMessage::SendMessage { agent_id, text, images } => {
            ctx.agents.send_message(&parse_agent_id(&agent_id), text, images).await?;
            Ok(Response::Ack)
        }

        InboundMessage::CancelTurn { agent_id } => {
            ctx.agents.cancel_turn(&parse_agent_id(&agent_id)).await?;
            Ok(Response::Ack)
        }

        InboundMessage::RespondToPermission { agent_id, permission_request_id, decision } => {
            ctx.agents
                .respond_to_permission(
                    &parse_agent_id(&agent_id),
                    PermissionRequestId::from_string(permission_request_id),
                    decision,
                )
                .await?;
            Ok(Response::Ack)
        }

        InboundMessage::ArchiveAgent { agent_id } => {
            ctx.agents.archive_agent(&parse_agent_id(&agent_id)).await?;
            Ok(Response::Ack)
        }

        InboundMessage::UpdateAgent { agent_id, title, labels } => {
            let agent = ctx
                .agents
                .update_agent(&parse_agent_id(&agent_id), title, labels.map(|l| l.into_iter().collect()))
                .await?;
            Ok(Response::AgentResponse { agent })
        }

        InboundMessage::DeleteAgent { agent_id } => {
            ctx.agents.delete_agent(&parse_agent_id(&agent_id)).await?;
            Ok(Response::Ack)
        }

        InboundMessage::FetchAgents => Ok(Response::AgentsResponse { agents: ctx.agents.fetch_agents() }),

        InboundMessage::FetchAgent { agent_id } => {
            Ok(Response::AgentResponse { agent: ctx.agents.fetch_agent(&parse_agent_id(&agent_id))? })
        }

        InboundMessage::FetchAgentTimeline { agent_id, direction, cursor, limit, projection } => {
            let agent_id = parse_agent_id(&agent_id);
            let timeline = ctx.agents.timeline();
            let limit = limit as usize;
            let (out_cursor, items) = match direction {
                TimelineDirection::Tail => {
                    let items = timeline.tail(&agent_id, limit, projection);
                    (timeline.current_cursor(&agent_id), items)
                }
                TimelineDirection::After => {
                    let cursor = cursor
                        .map(|c| paseo_core::TimelineCursor { epoch: c.epoch, seq: c.seq })
                        .unwrap_or(paseo_core::TimelineCursor::START);
                    match timeline.after(&agent_id, cursor, limit, projection) {
                        AfterQueryResult::Items { cursor, items } => (cursor, items),
                        AfterQueryResult::EpochBumped { new_cursor } => (new_cursor, Vec::new()),
                    }
                }
            };
            Ok(Response::AgentTimelineResponse {
                agent_id,
                cursor: out_cursor,
                items: items.into_iter().map(|(_, item)| item).collect(),
            })
        }

        InboundMessage::EnsureAgentInitialized { agent_id } => {
            Ok(Response::AgentResponse { agent: ctx.agents.ensure_agent_initialized(&parse_agent_id(&agent_id)).await? })
        }

        InboundMessage::RefreshAgent { agent_id } => {
            Ok(Response::AgentResponse { agent: ctx.agents.refresh_agent(&parse_agent_id(&agent_id)).await? })
        }

        InboundMessage::SetMode { agent_id, mode_id } => {
            ctx.agents.set_mode(&parse_agent_id(&agent_id), mode_id).await?;
            Ok(Response::Ack)
        }

        InboundMessage::ListProviderModels { provider } => {
            let provider = parse_provider(&provider)?;
            Ok(Response::ProviderModelsResponse { models: ctx.agents.list_provider_models(provider).await? })
        }

        InboundMessage::ListCommands { agent_id } => {
            Ok(Response::CommandsResponse { commands: ctx.agents.list_commands(&parse_agent_id(&agent_id)).await? })
        }

        InboundMessage::ExploreFilesystem { path } => {
            Ok(Response::FilesystemEntriesResponse { entries: crate::files::explore_filesystem(path).await? })
        }

        InboundMessage::RequestDownloadToken { path } => {
            let (token, expires_at_ms) = ctx.downloads.issue(path);
            Ok(Response::DownloadTokenResponse { token, expires_at_ms })
        }

        InboundMessage::SubscribeCheckoutDiff { subscription_id, cwd, mode } => {
            subscribe_checkout_diff(ctx, conn, subscription_id, cwd, mode).await
        }

        InboundMessage::UnsubscribeCheckoutDiff { subscription_id } => {
            ctx.subscriptions.unsubscribe(conn.id, &subscription_id);
            if let Some((cwd, mode)) = conn.checkout_subs.lock().remove(&subscription_id) {
                ctx.checkout.release(&cwd, mode);
            }
            Ok(Response::Ack)
        }

        InboundMessage::GetHighlightedDiff { cwd, path } => {
            let html = ctx.checkout.highlighted_diff(&cwd, &path, CheckoutDiffMode::Uncommitted).await?;
            Ok(Response::HighlightedDiffResponse { html })
        }

        InboundMessage::CheckoutStatus { cwd } => {
            let status = ctx.checkout.status(&cwd).await?;
            Ok(Response::CheckoutStatusResponse {
                branch: status.branch,
                dirty: status.dirty,
                ahead: status.ahead,
                behind: status.behind,
            })
        }

        InboundMessage::CheckoutPrStatus { cwd } => {
            // Always unavailable: no forge integration is in scope
            // (`SPEC_FULL.md` supplemented features).
            let _ = ctx.checkout.pr_status(&cwd);
            Ok(Response::CheckoutPrStatusResponse { pr_number: None, state: None, url: None })
        }

        InboundMessage::ListTerminals { cwd } => {
            let mut terminals = ctx.terminals.list_for_cwd(&cwd);
            if terminals.is_empty() {
                // First listing of a `cwd` auto-creates "Terminal 1" (`spec.md` §4.5).
                let created = ctx.terminals.create(&cwd, None, now_ms())?;
                terminals.push(created);
            }
            Ok(Response::TerminalsResponse {
                terminals: terminals.iter().map(|t| terminal_summary(t)).collect(),
            })
        }

        InboundMessage::CreateTerminal { cwd, name } => {
            let terminal = ctx.terminals.create(&cwd, name, now_ms())?;
            Ok(Response::TerminalResponse { terminal: terminal_summary(&terminal) })
        }

        InboundMessage::SubscribeTerminal { subscription_id, terminal_id, rows, cols } => {
            subscribe_terminal(ctx, conn, subscription_id, terminal_id, rows, cols).await
        }

        InboundMessage::UnsubscribeTerminal { subscription_id } => {
            ctx.subscriptions.unsubscribe(conn.id, &subscription_id);
            if let Some(token) = conn.terminal_subs.lock().remove(&subscription_id) {
                token.cancel();
            }
            Ok(Response::Ack)
        }

        InboundMessage::SendTerminalInput { terminal_id, input } => {
            let terminal_id = parse_terminal_id(&terminal_id);
            match input {
                WireTerminalInput::Input { data } => {
                    ctx.terminals.send_input(&terminal_id, data.as_bytes()).await?;
                }
                WireTerminalInput::Resize { rows, cols } => {
                    ctx.terminals.resize(&terminal_id, rows, cols).await?;
                }
                WireTerminalInput::Signal { signal } => {
                    ctx.terminals.send_signal(&terminal_id, &signal).await?;
                }
            }
            Ok(Response::Ack)
        }

        InboundMessage::KillTerminal { terminal_id } => {
            ctx.terminals.kill(&parse_terminal_id(&terminal_id)).await?;
            Ok(Response::Ack)
        }
    }
}

fn terminal_summary(t: &paseo_term::Terminal) -> paseo_wire::TerminalSummary {
    let (rows, cols) = t.rows_cols();
    paseo_wire::TerminalSummary {
        id: t.id.clone(),
        cwd: t.cwd.clone(),
        name: t.name.clone(),
        lifecycle: *t.lifecycle.lock(),
        rows,
        cols,
        cursor: t.screen.cursor(),
        created_at_ms: t.created_at_ms,
    }
}

/// Installs a checkout-diff subscription and pushes its current state
/// immediately, guaranteeing "the initial response of any subscribe includes
/// the current state" (`spec.md` §4.6) without a separate priming query.
async fn subscribe_checkout_diff(
    ctx: &Arc<HubCtx>,
    conn: &Arc<ConnectionState>,
    subscription_id: String,
    cwd: String,
    mode: CheckoutDiffMode,
) -> Result<Response, HostError> {
    let target = paseo_core::SubscriptionTarget::CheckoutDiff { cwd: cwd.clone(), mode };
    let mut rx = ctx.subscriptions.subscribe(conn.id, subscription_id.clone(), &target);
    ctx.checkout.ensure_watching(cwd.clone(), mode);
    conn.checkout_subs.lock().insert(subscription_id.clone(), (cwd.clone(), mode));

    let initial = ctx.checkout.current_diff(&cwd, mode).await?;
    let initial_files = initial.iter().map(paseo_wire::DiffFileView::from).collect();
    conn.send_push(Push::CheckoutDiffUpdate {
        subscription_id: subscription_id.clone(),
        cwd: cwd.clone(),
        files: initial_files,
    });

    let conn = conn.clone();
    tokio::spawn(async move {
        while let Some(push) = rx.recv().await {
            conn.send_push(patch_subscription_id(push, &subscription_id));
        }
    });

    Ok(Response::Ack)
}

/// Every [`SubscriptionHub`](crate::subscriptions::SubscriptionHub) push is
/// published once per topic with an empty `subscription_id`; each
/// connection's forwarder fills in the id of the binding it owns before
/// writing the frame (`spec.md` §3.5: subscriptions are per-connection).
fn patch_subscription_id(push: Push, subscription_id: &str) -> Push {
    match push {
        Push::CheckoutDiffUpdate { cwd, files, .. } => {
            Push::CheckoutDiffUpdate { subscription_id: subscription_id.to_string(), cwd, files }
        }
        other => other,
    }
}

/// Installs a terminal subscription: pushes the current `terminal_state`
/// immediately, then forwards both future state snapshots and raw PTY bytes
/// (over the binary multiplex) for the life of the subscription.
async fn subscribe_terminal(
    ctx: &Arc<HubCtx>,
    conn: &Arc<ConnectionState>,
    subscription_id: String,
    terminal_id: String,
    rows: Option<u16>,
    cols: Option<u16>,
) -> Result<Response, HostError> {
    let terminal_id = parse_terminal_id(&terminal_id);
    if let (Some(rows), Some(cols)) = (rows, cols) {
        ctx.terminals.resize(&terminal_id, rows, cols).await?;
    }

    let terminal = ctx.terminals.get(&terminal_id).map_err(HostError::from)?;
    let target = paseo_core::SubscriptionTarget::Terminal { terminal_id: terminal_id.clone() };
    // Registered only so `SubscriptionHub::has_subscribers` can see this
    // binding; actual delivery below reads straight off the terminal's own
    // watch/broadcast channels rather than `rx`, since raw PTY bytes aren't
    // `Push` JSON values.
    let _state_rx = ctx.subscriptions.subscribe(conn.id, subscription_id.clone(), &target);

    // Cancelling this token is the only thing that stops the two forwarder
    // tasks below; `UnsubscribeTerminal` and connection teardown both fire
    // it (`spec.md` §4.4/§5 — a dropped subscription must stop delivery).
    let cancel = tokio_util::sync::CancellationToken::new();
    conn.terminal_subs.lock().insert(subscription_id.clone(), cancel.clone());

    conn.send_push(terminal_state_push(&terminal));

    // State-snapshot forwarder: watches the screen's version counter and
    // re-publishes `terminal_state` on every mutation (`spec.md` §4.5).
    let mut updates = terminal.subscribe_updates();
    let snapshot_terminal = terminal.clone();
    let snapshot_conn = conn.clone();
    let snapshot_cancel = cancel.clone();
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = snapshot_cancel.cancelled() => break,
                changed = updates.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    snapshot_conn.send_push(terminal_state_push(&snapshot_terminal));
                }
            }
        }
    });

    // Raw-output forwarder: streams PTY bytes over the binary multiplex on
    // this connection's own stream id (`spec.md` §4.4, §4.5).
    let stream_id = conn.next_stream_id();
    let mut raw_rx = terminal.subscribe_raw_output();
    let raw_conn = conn.clone();
    tokio::spawn(async move {
        let mut offset: u64 = 0;
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                received = raw_rx.recv() => match received {
                    Ok(bytes) => {
                        let (header, payload) = multiplex::terminal_output_frame(stream_id, offset, &bytes);
                        offset += bytes.len() as u64;
                        let frame = multiplex::encode(&header, &payload);
                        let _ = raw_conn.out_tx.try_send(super::connection::OutFrame::Binary(frame));
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                }
            }
        }
    });

    Ok(Response::Ack)
}

fn terminal_state_push(terminal: &paseo_term::Terminal) -> Push {
    let (rows, cols) = terminal.rows_cols();
    Push::TerminalState {
        terminal_id: terminal.id.clone(),
        name: terminal.name.clone(),
        rows,
        cols,
        cursor: terminal.screen.cursor(),
    }
}
