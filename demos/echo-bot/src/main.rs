use mirai_ws::prelude::*;
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

// ---------------------------------------------------------------------------
// Echo rules
// ---------------------------------------------------------------------------

/// Where a reply goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Target {
    Friend(i64),
    Group(i64),
}

/// Work handed from the event handler to the main loop.
#[derive(Debug)]
enum Action {
    Reply(Target, MessageChain),
    Stop,
}

/// Copies the sendable part of a received chain.
fn echo_of(chain: &MessageChain) -> MessageChain {
    chain
        .iter()
        .filter(|block| !matches!(block, MessageBlock::Inert(_)))
        .cloned()
        .collect()
}

/// Decides how to answer an event. Friends get every message echoed;
/// groups only get messages that mention the bot.
fn action_for(event: &ClientEvent, bot_qq: Option<i64>) -> Option<Action> {
    match event {
        ClientEvent::FriendMessage(m) => {
            let echo = echo_of(&m.chain);
            (!echo.is_empty()).then(|| Action::Reply(Target::Friend(m.sender.id), echo))
        }
        ClientEvent::GroupMessage(m) => {
            let bot = bot_qq?;
            if !m.chain.mentions(bot) {
                return None;
            }
            let mut reply = MessageChain::new().at(m.sender.id).plain(" ");
            reply.blocks.extend(
                m.chain
                    .iter()
                    .filter(|block| match block {
                        MessageBlock::At { target, .. } => *target != bot,
                        MessageBlock::AtAll | MessageBlock::Inert(_) => false,
                        _ => true,
                    })
                    .cloned(),
            );
            Some(Action::Reply(Target::Group(m.sender.group.id), reply))
        }
        ClientEvent::Closed => Some(Action::Stop),
        _ => None,
    }
}

fn log_event(event: &ClientEvent) {
    match event {
        ClientEvent::Connected(Ok(())) => tracing::info!("connected, waiting for auth"),
        ClientEvent::Connected(Err(e)) => tracing::error!(error = %e, "connect failed"),
        ClientEvent::Auth(auth) if auth.is_success() => {
            tracing::info!(session = ?auth.session, "authenticated")
        }
        ClientEvent::Auth(auth) => {
            tracing::error!(code = auth.code, message = ?auth.message, "authentication rejected")
        }
        ClientEvent::NetworkError(e) => tracing::warn!(error = %e, "connection lost"),
        ClientEvent::MalformedMessage { error, .. } => tracing::warn!(%error, "bad message"),
        ClientEvent::FriendMessage(m) => {
            tracing::info!(from = m.sender.id, text = %m.chain, "friend message")
        }
        ClientEvent::GroupMessage(m) => tracing::info!(
            group = m.sender.group.id,
            from = m.sender.id,
            text = %m.chain,
            "group message"
        ),
        ClientEvent::Closed => tracing::info!("closed"),
        other => tracing::debug!(?other, "event"),
    }
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Applies overrides from `MIRAI_WS_*` variables, read through `var`.
fn config_from(var: impl Fn(&str) -> Option<String>) -> Result<ClientConfig, String> {
    let mut builder = ClientConfig::builder();
    if let Some(host) = var("MIRAI_WS_HOST") {
        builder = builder.server_name(host);
    }
    if let Some(port) = var("MIRAI_WS_PORT") {
        let port = port.parse().map_err(|e| format!("MIRAI_WS_PORT: {e}"))?;
        builder = builder.port(port);
    }
    if let Some(secure) = var("MIRAI_WS_SECURE") {
        builder = builder.secure(matches!(secure.as_str(), "1" | "true" | "yes"));
    }
    if let Some(key) = var("MIRAI_WS_VERIFY_KEY") {
        builder = builder.verify_key(key);
    }
    if let Some(qq) = var("MIRAI_WS_QQ") {
        let qq = qq.parse().map_err(|e| format!("MIRAI_WS_QQ: {e}"))?;
        builder = builder.qq(qq);
    }
    Ok(builder.build())
}

// ---------------------------------------------------------------------------
// Bootstrap
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = config_from(|name| std::env::var(name).ok())?;
    let bot_qq = config.qq;
    let (actions_tx, mut actions) = mpsc::unbounded_channel();

    let client = Client::new(config, move |event: &ClientEvent| {
        log_event(event);
        if let Some(action) = action_for(event, bot_qq) {
            let _ = actions_tx.send(action);
        }
    });
    client.connect()?;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("shutting down");
                client.destroy();
            }
            action = actions.recv() => match action {
                Some(Action::Reply(target, chain)) => {
                    let on_receipt = move |receipt: SendReceipt| {
                        tracing::info!(code = receipt.code, message_id = receipt.message_id, "sent");
                    };
                    let result = match target {
                        Target::Friend(id) => client.send_friend_message(id, &chain, on_receipt),
                        Target::Group(id) => client.send_group_message(id, &chain, on_receipt),
                    };
                    if let Err(e) = result {
                        tracing::warn!(error = %e, ?target, "reply not sent");
                    }
                }
                Some(Action::Stop) | None => break,
            },
        }
    }

    Ok(())
}
