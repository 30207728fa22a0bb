use std::error::Error;

use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::IntoResponse,
    routing::get,
    Router,
};
use clap::Parser;
use futures_util::{stream::StreamExt, SinkExt};
use tokio::sync::mpsc;
use tracing::info;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use big_two_core::{ClientMessage, ServerMessage};

mod config;
mod relay;

use config::Config;
use relay::{Command, RelayHandle};

#[derive(Clone)]
struct AppState {
    relay: RelayHandle,
    queue: usize,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::parse();
    let state = AppState {
        relay: relay::spawn(config.inbox),
        queue: config.queue,
    };

    let app = Router::new()
        .route("/ws", get(websocket_handler))
        .with_state(state);

    info!("服务器正在监听 {}", config.bind);
    let listener = tokio::net::TcpListener::bind(config.bind).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

/// 处理 WebSocket 连接请求
async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

/// 处理单个 WebSocket 连接的生命周期
async fn handle_socket(socket: WebSocket, state: AppState) {
    let (mut sender, mut receiver) = socket.split();
    let conn = Uuid::new_v4();

    // 中继任务通过这个通道把消息交给本连接，中继丢弃发送端时写任务结束
    let (tx, mut rx) = mpsc::channel::<ServerMessage>(state.queue);

    let writer = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            let payload = match serde_json::to_string(&msg) {
                Ok(payload) => payload,
                Err(e) => {
                    tracing::error!("序列化消息失败: {}", e);
                    continue;
                }
            };
            if sender.send(Message::Text(payload.into())).await.is_err() {
                // 发送失败，说明客户端已断开，退出任务
                break;
            }
        }
        let _ = sender.close().await;
    });

    if let Err(e) = state.relay.send(Command::Connect { conn, outbox: tx }).await {
        tracing::warn!("连接 {} 无法入座: {}", conn, e);
        return;
    }
    info!("连接 {} 已建立", conn);

    // 主循环，处理从客户端接收到的消息
    while let Some(Ok(msg)) = receiver.next().await {
        match msg {
            Message::Text(text) => match serde_json::from_str::<ClientMessage>(text.as_str()) {
                Ok(msg) => {
                    if state.relay.send(Command::Message { conn, msg }).await.is_err() {
                        break;
                    }
                }
                Err(e) => {
                    tracing::warn!("解析消息失败: {}", e);
                }
            },
            Message::Close(_) => break,
            _ => {}
        }
    }

    // 客户端断开连接，执行清理工作
    let _ = state.relay.send(Command::Disconnect { conn }).await;
    writer.abort();
    info!("连接 {} 已关闭", conn);
}
