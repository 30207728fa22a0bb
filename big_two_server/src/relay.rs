//! 中继：座位管理和全局事件排序
//!
//! 所有连接的消息都进入同一个收件箱，由一个任务逐条处理并按顺序广播，
//! 所以每个参与者收到的 `Event` 顺序完全一致。中继不解释任何出牌规则。

use std::collections::HashMap;

use big_two_core::{ClientMessage, Deck, SEATS, Seat, ServerMessage, TableEvent};
use rand::SeedableRng;
use rand::rngs::StdRng;
use tokio::sync::mpsc;
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

pub type ConnId = Uuid;

/// 发给中继任务的命令
pub enum Command {
    Connect { conn: ConnId, outbox: mpsc::Sender<ServerMessage> },
    Message { conn: ConnId, msg: ClientMessage },
    Disconnect { conn: ConnId },
}

/// 座位表处理完一条命令后需要发出的消息
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    /// 只发给一个连接
    Direct(ConnId, ServerMessage),
    /// 发给所有已入座的连接 (包括发送者)
    Broadcast(ServerMessage),
    /// 发完这条消息后关闭连接
    Close(ConnId, ServerMessage),
}

#[derive(Debug)]
struct SeatSlot {
    conn: ConnId,
    name: Option<String>,
    ready: bool,
}

/// 纯粹的座位状态机，不涉及网络，方便单独测试
#[derive(Debug, Default)]
pub struct SeatTable {
    slots: [Option<SeatSlot>; SEATS],
    next_seq: u64,
    // 自上次中止以来是否发过牌
    dealt: bool,
}

impl SeatTable {
    pub fn new() -> Self {
        Self::default()
    }

    fn seat_of(&self, conn: ConnId) -> Option<Seat> {
        self.slots.iter().position(|s| s.as_ref().is_some_and(|s| s.conn == conn))
    }

    fn names(&self) -> [Option<String>; SEATS] {
        std::array::from_fn(|i| self.slots[i].as_ref().and_then(|s| s.name.clone()))
    }

    fn sequenced(&mut self, event: TableEvent) -> Delivery {
        let seq = self.next_seq;
        self.next_seq += 1;
        Delivery::Broadcast(ServerMessage::Event { seq, event })
    }

    /// 新连接坐到编号最小的空座位；没有空位则回复 `Full` 并关闭
    pub fn connect(&mut self, conn: ConnId) -> Vec<Delivery> {
        let Some(seat) = self.slots.iter().position(Option::is_none) else {
            return vec![Delivery::Close(conn, ServerMessage::Full)];
        };
        self.slots[seat] = Some(SeatSlot { conn, name: None, ready: false });
        vec![Delivery::Direct(conn, ServerMessage::Welcome { your_seat: seat, names: self.names(), next_seq: self.next_seq })]
    }

    /// 处理已入座连接发来的消息，`shuffle` 只在需要发牌时调用
    pub fn receive(&mut self, conn: ConnId, msg: ClientMessage, shuffle: impl FnOnce() -> Deck) -> Vec<Delivery> {
        let Some(seat) = self.seat_of(conn) else {
            return Vec::new();
        };

        match msg {
            ClientMessage::Join { name } => {
                let name = match name.trim() {
                    "" => "Unnamed".to_string(),
                    trimmed => trimmed.to_string(),
                };
                if let Some(slot) = self.slots[seat].as_mut() {
                    slot.name = Some(name.clone());
                }
                vec![Delivery::Broadcast(ServerMessage::Joined { seat, name })]
            }
            ClientMessage::Ready => {
                let Some(slot) = self.slots[seat].as_mut() else { return Vec::new() };
                if slot.name.is_none() {
                    return vec![Delivery::Direct(conn, ServerMessage::Error { message: "请先设置名字".to_string() })];
                }
                slot.ready = true;

                let mut out = vec![Delivery::Broadcast(ServerMessage::Ready { seat })];
                let all_ready = self
                    .slots
                    .iter()
                    .all(|s| s.as_ref().is_some_and(|s| s.ready && s.name.is_some()));
                if all_ready {
                    for slot in self.slots.iter_mut().flatten() {
                        slot.ready = false;
                    }
                    self.dealt = true;
                    out.push(self.sequenced(TableEvent::Deal { deck: shuffle() }));
                }
                out
            }
            // 出牌意图加上发送者的座位号，成为有序事件
            ClientMessage::Move { cards } => vec![self.sequenced(TableEvent::Move { seat, cards })],
            ClientMessage::Chat { text } => vec![Delivery::Broadcast(ServerMessage::Chat { seat, text })],
        }
    }

    /// 连接断开：空出座位，通知其他人；发过牌则在事件流中加入中止事件
    pub fn disconnect(&mut self, conn: ConnId) -> Vec<Delivery> {
        let Some(seat) = self.seat_of(conn) else {
            return Vec::new();
        };
        self.slots[seat] = None;

        let mut out = vec![Delivery::Broadcast(ServerMessage::Left { seat })];
        if self.dealt {
            self.dealt = false;
            out.push(self.sequenced(TableEvent::Abort { seat }));
        }
        out
    }

    /// 已入座连接，按座位顺序
    pub fn seated(&self) -> impl Iterator<Item = ConnId> + '_ {
        self.slots.iter().flatten().map(|s| s.conn)
    }
}

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("中继任务已停止")]
    Stopped,
}

/// 中继任务的句柄
#[derive(Clone)]
pub struct RelayHandle {
    sender: mpsc::Sender<Command>,
}

impl RelayHandle {
    pub async fn send(&self, command: Command) -> Result<(), RelayError> {
        self.sender.send(command).await.map_err(|_| RelayError::Stopped)
    }
}

/// 启动中继任务
pub fn spawn(capacity: usize) -> RelayHandle {
    let (sender, inbox) = mpsc::channel(capacity);
    tokio::spawn(run(inbox));
    RelayHandle { sender }
}

async fn run(mut inbox: mpsc::Receiver<Command>) {
    let mut table = SeatTable::new();
    let mut outboxes: HashMap<ConnId, mpsc::Sender<ServerMessage>> = HashMap::new();
    let mut rng = StdRng::from_os_rng();

    while let Some(command) = inbox.recv().await {
        let deliveries = match command {
            Command::Connect { conn, outbox } => {
                outboxes.insert(conn, outbox);
                table.connect(conn)
            }
            Command::Message { conn, msg } => table.receive(conn, msg, || Deck::shuffled(&mut rng)),
            Command::Disconnect { conn } => {
                outboxes.remove(&conn);
                table.disconnect(conn)
            }
        };

        for delivery in deliveries {
            match delivery {
                Delivery::Direct(conn, msg) => deliver(&outboxes, conn, msg).await,
                Delivery::Close(conn, msg) => {
                    deliver(&outboxes, conn, msg).await;
                    // 丢弃发送端，连接的写任务随之结束
                    outboxes.remove(&conn);
                    info!("座位已满，拒绝连接 {}", conn);
                }
                Delivery::Broadcast(msg) => {
                    if let ServerMessage::Event { seq, event } = &msg {
                        info!(seq, ?event, "广播事件");
                    }
                    let targets: Vec<ConnId> = table.seated().collect();
                    for conn in targets {
                        deliver(&outboxes, conn, msg.clone()).await;
                    }
                }
            }
        }
    }
}

async fn deliver(outboxes: &HashMap<ConnId, mpsc::Sender<ServerMessage>>, conn: ConnId, msg: ServerMessage) {
    let Some(outbox) = outboxes.get(&conn) else { return };
    if outbox.send(msg).await.is_err() {
        // 发送失败，说明该连接已断开，后续由其自己的连接任务清理
        warn!("向连接 {} 发送消息失败（可能已断开）", conn);
    }
}

// --- 单元测试 ---

#[cfg(test)]
mod tests {
    use super::*;

    fn seated_table() -> (SeatTable, Vec<ConnId>) {
        let mut table = SeatTable::new();
        let conns: Vec<ConnId> = (0..SEATS).map(|_| Uuid::new_v4()).collect();
        for (i, conn) in conns.iter().enumerate() {
            table.connect(*conn);
            table.receive(*conn, ClientMessage::Join { name: format!("p{i}") }, Deck::standard);
        }
        (table, conns)
    }

    fn ready_all(table: &mut SeatTable, conns: &[ConnId]) -> Vec<Delivery> {
        conns
            .iter()
            .flat_map(|c| table.receive(*c, ClientMessage::Ready, Deck::standard))
            .collect()
    }

    #[test]
    fn test_seats_fill_lowest_first() {
        let mut table = SeatTable::new();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();

        let out = table.connect(a);
        assert_eq!(out, vec![Delivery::Direct(a, ServerMessage::Welcome { your_seat: 0, names: Default::default(), next_seq: 0 })]);
        table.receive(a, ClientMessage::Join { name: "  alice ".into() }, Deck::standard);

        let out = table.connect(b);
        let Delivery::Direct(_, ServerMessage::Welcome { your_seat, names, .. }) = &out[0] else { panic!() };
        assert_eq!(*your_seat, 1);
        assert_eq!(names[0].as_deref(), Some("alice"));

        // 座位 0 空出后，新连接补到座位 0
        table.disconnect(a);
        let c = Uuid::new_v4();
        let out = table.connect(c);
        assert!(matches!(&out[0], Delivery::Direct(_, ServerMessage::Welcome { your_seat: 0, .. })));
    }

    #[test]
    fn test_fifth_connection_is_rejected() {
        let (mut table, _) = seated_table();
        let late = Uuid::new_v4();
        assert_eq!(table.connect(late), vec![Delivery::Close(late, ServerMessage::Full)]);
        assert_eq!(table.seated().count(), SEATS);
    }

    #[test]
    fn test_blank_name_becomes_unnamed() {
        let mut table = SeatTable::new();
        let a = Uuid::new_v4();
        table.connect(a);
        let out = table.receive(a, ClientMessage::Join { name: " ".into() }, Deck::standard);
        assert_eq!(out, vec![Delivery::Broadcast(ServerMessage::Joined { seat: 0, name: "Unnamed".into() })]);
    }

    #[test]
    fn test_ready_requires_name() {
        let mut table = SeatTable::new();
        let a = Uuid::new_v4();
        table.connect(a);
        let out = table.receive(a, ClientMessage::Ready, Deck::standard);
        assert!(matches!(&out[0], Delivery::Direct(_, ServerMessage::Error { .. })));
    }

    #[test]
    fn test_deal_when_all_four_ready() {
        let (mut table, conns) = seated_table();
        let out = ready_all(&mut table, &conns);

        assert_eq!(out.len(), SEATS + 1);
        assert_eq!(
            out.last(),
            Some(&Delivery::Broadcast(ServerMessage::Event { seq: 0, event: TableEvent::Deal { deck: Deck::standard() } }))
        );

        // 准备标记已清空，下一局需要重新准备
        let out = table.receive(conns[0], ClientMessage::Ready, Deck::standard);
        assert_eq!(out.len(), 1);
    }

    #[test]
    fn test_moves_are_stamped_and_sequenced() {
        let (mut table, conns) = seated_table();
        ready_all(&mut table, &conns);

        let out = table.receive(conns[2], ClientMessage::play(vec![0, 1]), Deck::standard);
        assert_eq!(
            out,
            vec![Delivery::Broadcast(ServerMessage::Event { seq: 1, event: TableEvent::Move { seat: 2, cards: vec![0, 1] } })]
        );
        let out = table.receive(conns[3], ClientMessage::pass(), Deck::standard);
        assert_eq!(
            out,
            vec![Delivery::Broadcast(ServerMessage::Event { seq: 2, event: TableEvent::Move { seat: 3, cards: vec![] } })]
        );
    }

    #[test]
    fn test_disconnect_after_deal_aborts() {
        let (mut table, conns) = seated_table();
        ready_all(&mut table, &conns);

        let out = table.disconnect(conns[1]);
        assert_eq!(
            out,
            vec![
                Delivery::Broadcast(ServerMessage::Left { seat: 1 }),
                Delivery::Broadcast(ServerMessage::Event { seq: 1, event: TableEvent::Abort { seat: 1 } }),
            ]
        );

        // 再有人离开不会重复中止
        let out = table.disconnect(conns[2]);
        assert_eq!(out, vec![Delivery::Broadcast(ServerMessage::Left { seat: 2 })]);
    }

    #[test]
    fn test_replacement_starts_at_current_seq() {
        let (mut table, conns) = seated_table();
        ready_all(&mut table, &conns);
        table.disconnect(conns[3]);

        let late = Uuid::new_v4();
        let out = table.connect(late);
        assert!(matches!(&out[0], Delivery::Direct(_, ServerMessage::Welcome { your_seat: 3, next_seq: 2, .. })));
    }

    #[test]
    fn test_disconnect_before_deal_only_notifies() {
        let (mut table, conns) = seated_table();
        assert_eq!(table.disconnect(conns[0]), vec![Delivery::Broadcast(ServerMessage::Left { seat: 0 })]);
        assert!(table.disconnect(conns[0]).is_empty());
    }

    #[test]
    fn test_unknown_connection_is_ignored() {
        let (mut table, _) = seated_table();
        let stranger = Uuid::new_v4();
        assert!(table.receive(stranger, ClientMessage::pass(), Deck::standard).is_empty());
    }

    #[test]
    fn test_chat_is_broadcast() {
        let (mut table, conns) = seated_table();
        let out = table.receive(conns[1], ClientMessage::Chat { text: "hi".into() }, Deck::standard);
        assert_eq!(out, vec![Delivery::Broadcast(ServerMessage::Chat { seat: 1, text: "hi".into() })]);
    }

    // --- 中继任务 ---

    async fn connect(relay: &RelayHandle) -> (ConnId, mpsc::Receiver<ServerMessage>) {
        let conn = Uuid::new_v4();
        let (outbox, rx) = mpsc::channel(16);
        relay.send(Command::Connect { conn, outbox }).await.unwrap();
        (conn, rx)
    }

    #[tokio::test]
    async fn test_relay_task_delivers_in_order() {
        let relay = spawn(16);
        let mut seated = Vec::new();
        for seat in 0..SEATS {
            let (conn, mut rx) = connect(&relay).await;
            let Some(ServerMessage::Welcome { your_seat, .. }) = rx.recv().await else { panic!("应该收到 Welcome") };
            assert_eq!(your_seat, seat);
            seated.push((conn, rx));
        }

        // 第五个连接收到 Full 后发送端被丢弃
        let (_, mut late) = connect(&relay).await;
        assert_eq!(late.recv().await, Some(ServerMessage::Full));
        assert_eq!(late.recv().await, None);

        let alice = seated[0].0;
        relay.send(Command::Message { conn: alice, msg: ClientMessage::Join { name: "alice".into() } }).await.unwrap();
        for (_, rx) in seated.iter_mut() {
            assert_eq!(rx.recv().await, Some(ServerMessage::Joined { seat: 0, name: "alice".into() }));
        }

        let (gone, mut gone_rx) = seated.pop().unwrap();
        relay.send(Command::Disconnect { conn: gone }).await.unwrap();
        assert_eq!(gone_rx.recv().await, None);
        for (_, rx) in seated.iter_mut() {
            assert_eq!(rx.recv().await, Some(ServerMessage::Left { seat: 3 }));
        }
    }
}
