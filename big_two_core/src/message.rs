use crate::card::Deck;
use crate::state::{SEATS, Seat};
use serde::{Deserialize, Serialize};

// --- 有序游戏事件 ---
// 中继服务器给每个事件分配全局序号后广播给所有人 (包括发送者)，
// 每个副本按序号依次执行，从而得到相同的状态。

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub enum TableEvent {
    /// 所有人都准备好了，用这副洗好的牌开始新的一局
    Deal { deck: Deck },
    /// 某个座位出牌，`cards` 是其手牌中的下标，为空表示过牌
    Move { seat: Seat, cards: Vec<usize> },
    /// 某个座位离开，牌局中止
    Abort { seat: Seat },
}

// --- 客户端 -> 服务器 的消息 ---
// 客户端从不声明自己的座位号，由服务器根据连接填写。

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub enum ClientMessage {
    /// 设置自己的名字
    Join { name: String },
    /// 准备开始下一局
    Ready,
    /// 出牌意图，不会在本地直接生效，要等服务器广播回来
    Move { cards: Vec<usize> },
    /// 聊天
    Chat { text: String },
}

// --- 服务器 -> 客户端 的消息 ---

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub enum ServerMessage {
    /// 连接成功后私密地发给该玩家：分配到的座位和当前所有座位的名字
    Welcome {
        your_seat: Seat,
        names: [Option<String>; SEATS],
        /// 下一个事件的序号，中途入座的副本从这里开始
        next_seq: u64,
    },
    /// 某个座位设置了名字
    Joined { seat: Seat, name: String },
    /// 四个座位都有人了，连接将被关闭
    Full,
    /// 某个座位断开了连接
    Left { seat: Seat },
    /// 某个座位准备好了
    Ready { seat: Seat },
    /// 有序事件流，`seq` 从 0 开始连续递增
    Event { seq: u64, event: TableEvent },
    Chat { seat: Seat, text: String },
    Error { message: String },
}

impl ClientMessage {
    pub fn pass() -> Self {
        ClientMessage::Move { cards: Vec::new() }
    }

    pub fn play(positions: impl Into<Vec<usize>>) -> Self {
        ClientMessage::Move { cards: positions.into() }
    }
}
