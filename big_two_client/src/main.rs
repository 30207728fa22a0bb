use std::error::Error;
use std::io::Write;
use std::sync::{Arc, OnceLock};

use clap::Parser;
use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::protocol::Message};
use tracing_subscriber::EnvFilter;
use url::Url;

use big_two_core::sync::{self, Applied, EventOutcome, Replica, Sequenced};
use big_two_core::{ClientMessage, GamePhase, GameState, SEATS, Seat, ServerMessage, TableEvent};

mod command;

use command::Command;

#[derive(Debug, Parser)]
#[command(name = "big_two_client", about = "锄大地终端客户端")]
struct Args {
    /// 服务器地址
    #[arg(long, env = "BIG_TWO_SERVER", default_value = "ws://127.0.0.1:2396/ws")]
    server: Url,

    /// 玩家名字
    #[arg(long, default_value = "Unnamed")]
    name: String,

    /// 有序事件通道长度
    #[arg(long, default_value_t = 64)]
    feed: usize,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();
    let args = Args::parse();

    println!("正在连接到: {}", args.server);
    let (ws_stream, _) = connect_async(args.server.as_str()).await?;
    println!("连接成功!");

    let (mut write, mut read) = ws_stream.split();

    // 发往服务器的消息统一经过这个通道
    let (out_tx, mut out_rx) = mpsc::channel::<ClientMessage>(32);
    tokio::spawn(async move {
        while let Some(msg) = out_rx.recv().await {
            let Ok(payload) = serde_json::to_string(&msg) else { continue };
            if write.send(Message::Text(payload.into())).await.is_err() {
                break;
            }
        }
    });

    let replica = Arc::new(Replica::default());
    let my_seat: Arc<OnceLock<Seat>> = Arc::new(OnceLock::new());
    let (feed_tx, feed) = sync::feed(args.feed);

    // 唯一修改副本的任务：按序执行事件
    {
        let replica = replica.clone();
        let my_seat = my_seat.clone();
        let out_tx = out_tx.clone();
        tokio::spawn(async move {
            let observer = |item: &Sequenced, outcome: &EventOutcome| {
                report(&replica, my_seat.get().copied(), item, outcome, &out_tx);
            };
            if let Err(e) = feed.run(replica.clone(), observer).await {
                eprintln!("事件流出错: {}", e);
            }
        });
    }

    // 接收服务器消息
    {
        let replica = replica.clone();
        let my_seat = my_seat.clone();
        let out_tx = out_tx.clone();
        let name = args.name.clone();
        tokio::spawn(async move {
            while let Some(msg) = read.next().await {
                let text = match msg {
                    Ok(Message::Text(text)) => text,
                    Ok(Message::Close(_)) => break,
                    Ok(_) => continue,
                    Err(e) => {
                        eprintln!("接收消息时出错: {}", e);
                        break;
                    }
                };
                let server_msg = match serde_json::from_str::<ServerMessage>(text.as_str()) {
                    Ok(msg) => msg,
                    Err(e) => {
                        tracing::warn!("解析服务器消息失败: {}", e);
                        continue;
                    }
                };

                match server_msg {
                    ServerMessage::Welcome { your_seat, names, next_seq } => {
                        let _ = my_seat.set(your_seat);
                        replica.resume_at(next_seq);
                        replica.update_local(|s| {
                            for (seat, name) in names.into_iter().enumerate() {
                                match name {
                                    Some(name) => s.set_party_name(seat, name),
                                    None => s.clear_party_name(seat),
                                }
                            }
                        });
                        println!("已入座，座位号 {}", your_seat);
                        let _ = out_tx.send(ClientMessage::Join { name: name.clone() }).await;
                    }
                    ServerMessage::Joined { seat, name } => {
                        println!("{} 加入了游戏 (座位 {})", name, seat);
                        replica.update_local(|s| s.set_party_name(seat, name));
                        if my_seat.get() == Some(&seat) {
                            let _ = out_tx.send(ClientMessage::Ready).await;
                        }
                    }
                    ServerMessage::Full => {
                        println!("服务器已满，无法加入游戏");
                        break;
                    }
                    ServerMessage::Left { seat } => {
                        println!("{} 离开了游戏", display_name(&replica, seat));
                        replica.update_local(|s| s.clear_party_name(seat));
                    }
                    ServerMessage::Ready { seat } => {
                        println!("{} 已准备", display_name(&replica, seat));
                    }
                    ServerMessage::Event { seq, event } => {
                        if feed_tx.send(seq, event).await.is_err() {
                            break;
                        }
                    }
                    ServerMessage::Chat { seat, text } => {
                        println!("[{}]: {}", display_name(&replica, seat), text);
                    }
                    ServerMessage::Error { message } => eprintln!("服务器错误: {}", message),
                }
                prompt();
            }
            println!("与服务器的连接已断开");
            std::process::exit(0);
        });
    }

    // 主任务处理用户输入
    let mut stdin = BufReader::new(tokio::io::stdin()).lines();
    println!("{}", command::USAGE);

    loop {
        prompt();
        let Some(line) = stdin.next_line().await? else { break };
        let command = match command::parse(&line) {
            Ok(command) => command,
            Err(message) => {
                println!("{}", message);
                continue;
            }
        };

        let msg = match command {
            Command::Play(positions) => intent(&replica, my_seat.get().copied(), ClientMessage::play(positions)),
            Command::Pass => intent(&replica, my_seat.get().copied(), ClientMessage::pass()),
            Command::Say(text) => Some(ClientMessage::Chat { text }),
            Command::Ready => Some(ClientMessage::Ready),
            Command::Hand => {
                if let Some(seat) = my_seat.get() {
                    replica.read(|s| print_hand(s, *seat));
                }
                None
            }
            Command::Table => {
                replica.read(print_table);
                None
            }
            Command::Help => {
                println!("{}", command::USAGE);
                None
            }
            Command::Exit => {
                println!("正在断开连接...");
                break;
            }
        };

        // 出牌意图只发给服务器，等它按顺序广播回来后才生效
        if let Some(msg) = msg {
            out_tx.send(msg).await?;
        }
    }

    Ok(())
}

/// 还没轮到自己时不发送出牌意图
fn intent(replica: &Replica, my_seat: Option<Seat>, msg: ClientMessage) -> Option<ClientMessage> {
    let my_turn = replica.read(|s| s.phase == GamePhase::InRound && Some(s.current_turn()) == my_seat);
    if !my_turn {
        println!("还没轮到你");
        return None;
    }
    Some(msg)
}

/// 打印一个事件的执行结果
fn report(
    replica: &Replica,
    my_seat: Option<Seat>,
    item: &Sequenced,
    outcome: &EventOutcome,
    out_tx: &mpsc::Sender<ClientMessage>,
) {
    let state = replica.snapshot();
    match outcome {
        Ok(Applied::Dealt { first_turn }) => {
            println!("\n所有人已准备，游戏开始。{} 先出牌", name_in(&state, *first_turn));
            if let Some(seat) = my_seat {
                print_hand(&state, seat);
            }
        }
        Ok(Applied::Moved(report)) => {
            match &report.hand {
                Some(hand) => println!("{}: {}", name_in(&state, report.seat), hand),
                None => println!("{}: {{过牌}}", name_in(&state, report.seat)),
            }
            if let Some(result) = report.result {
                println!("本局结束。");
                for seat in 0..SEATS {
                    if seat == result.winner {
                        println!("  {} 赢了", name_in(&state, seat));
                    } else {
                        println!("  {} 还剩 {} 张牌", name_in(&state, seat), result.remaining[seat]);
                    }
                }
                ready_again(out_tx);
            } else if my_seat == Some(report.next_turn) {
                println!("轮到你了");
                print_hand(&state, report.next_turn);
            }
        }
        Ok(Applied::Aborted(abort)) => {
            if abort.cleared {
                println!("座位 {} 离开，牌局中止", abort.by);
                ready_again(out_tx);
            }
        }
        Err(e) => {
            // 只提示自己的非法出牌，其他人的非法意图对本地没有影响
            if let TableEvent::Move { seat, .. } = &item.event {
                if Some(*seat) == my_seat {
                    println!("不合法的出牌: {}", e);
                }
            }
        }
    }
    prompt();
}

/// 一局结束或中止后自动准备下一局，发送队列满时提示手动准备
fn ready_again(out_tx: &mpsc::Sender<ClientMessage>) -> bool {
    match out_tx.try_send(ClientMessage::Ready) {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!("自动准备失败，请输入 ready 手动准备: {}", e);
            false
        }
    }
}

fn print_hand(state: &GameState, seat: Seat) {
    let Some(party) = state.party(seat) else { return };
    let cards: Vec<String> = party.cards.iter().enumerate().map(|(i, c)| format!("[{}]{}", i, c)).collect();
    println!("你的手牌: {}", cards.join(" "));
}

fn print_table(state: &GameState) {
    match state.table_top() {
        Some(hand) => println!("桌面: {} ({} 出)", hand, name_in(state, hand.owner())),
        None => println!("桌面: 空"),
    }
    for (seat, count) in state.remaining_counts().iter().enumerate() {
        let marker = if state.phase == GamePhase::InRound && state.current_turn() == seat { "*" } else { " " };
        println!("{} {}: {} 张", marker, name_in(state, seat), count);
    }
}

fn name_in(state: &GameState, seat: Seat) -> String {
    state
        .party(seat)
        .and_then(|p| p.name.clone())
        .unwrap_or_else(|| format!("座位 {}", seat))
}

fn display_name(replica: &Replica, seat: Seat) -> String {
    replica.read(|s| name_in(s, seat))
}

fn prompt() {
    print!("> ");
    let _ = std::io::stdout().flush();
}

// --- 单元测试 ---

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ready_again_reports_full_queue() {
        let (out_tx, mut out_rx) = mpsc::channel(1);
        assert!(ready_again(&out_tx));
        assert!(!ready_again(&out_tx));
        assert_eq!(out_rx.try_recv(), Ok(ClientMessage::Ready));

        drop(out_rx);
        assert!(!ready_again(&out_tx));
    }
}
