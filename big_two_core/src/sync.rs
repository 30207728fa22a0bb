//! 副本同步
//!
//! 每个参与者持有一个 [`Replica`]。服务器保证所有人看到的事件顺序一致，
//! 而规则函数是确定性的，所以各个副本执行完同一串事件后状态完全相同，
//! 不需要交换完整状态。
//!
//! 事件通过有界通道 [`feed`] 送入，[`EventFeed::run`] 是副本唯一的写入者。

use crate::error::{GameError, SyncError};
use crate::message::TableEvent;
use crate::state::{AbortReport, GameState, MoveReport, Seat};
use parking_lot::RwLock;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// 事件被成功执行后的结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Applied {
    Dealt { first_turn: Seat },
    Moved(MoveReport),
    Aborted(AbortReport),
}

/// 每个事件都会得到一个明确的结果：执行成功，或者被拒绝并附带原因
pub type EventOutcome = Result<Applied, GameError>;

pub struct Replica {
    state: RwLock<GameState>,
    next_seq: RwLock<u64>,
}

impl Default for Replica {
    fn default() -> Self {
        Self::new(GameState::new())
    }
}

impl Replica {
    pub fn new(state: GameState) -> Self {
        Replica { state: RwLock::new(state), next_seq: RwLock::new(0) }
    }

    /// 执行一个有序事件。
    ///
    /// 序号必须正好是下一个期望的序号，否则什么都不做并返回 `OutOfOrder`。
    /// 整个事件在一次写锁内完成，读者看不到执行到一半的状态。
    pub fn apply(&self, seq: u64, event: &TableEvent) -> Result<EventOutcome, SyncError> {
        let mut next_seq = self.next_seq.write();
        if seq != *next_seq {
            warn!(expected = *next_seq, got = seq, "事件序号不连续");
            return Err(SyncError::OutOfOrder { expected: *next_seq, got: seq });
        }
        *next_seq += 1;

        let mut state = self.state.write();
        let outcome = execute(&mut state, event);
        match &outcome {
            Ok(applied) => debug!(seq, ?applied, "事件已执行"),
            Err(e) => debug!(seq, error = %e, kind = ?e.kind(), "事件被拒绝"),
        }
        Ok(outcome)
    }

    /// 一致的状态快照
    pub fn snapshot(&self) -> GameState {
        self.state.read().clone()
    }

    /// 在读锁内查看状态，避免整份克隆
    pub fn read<T>(&self, f: impl FnOnce(&GameState) -> T) -> T {
        f(&self.state.read())
    }

    /// 修改不属于有序事件流的本地信息 (例如座位名字)
    pub fn update_local<T>(&self, f: impl FnOnce(&mut GameState) -> T) -> T {
        f(&mut self.state.write())
    }

    /// 中途加入时从服务器给出的序号开始，只应在收到第一个事件之前调用
    pub fn resume_at(&self, seq: u64) {
        *self.next_seq.write() = seq;
    }

    pub fn next_seq(&self) -> u64 {
        *self.next_seq.read()
    }
}

/// 把一个事件交给状态机
pub fn execute(state: &mut GameState, event: &TableEvent) -> EventOutcome {
    match event {
        TableEvent::Deal { deck } => {
            state.deal(deck.clone()).map(|first_turn| Applied::Dealt { first_turn })
        }
        TableEvent::Move { seat, cards } => state.attempt_move(*seat, cards).map(Applied::Moved),
        TableEvent::Abort { seat } => Ok(Applied::Aborted(state.abort(*seat))),
    }
}

// --- 有序事件通道 ---

/// 通道中的一条有序事件
#[derive(Debug, Clone)]
pub struct Sequenced {
    pub seq: u64,
    pub event: TableEvent,
}

#[derive(Clone)]
pub struct FeedSender {
    sender: mpsc::Sender<Sequenced>,
}

pub struct EventFeed {
    inbox: mpsc::Receiver<Sequenced>,
}

/// 创建一个有界的有序事件通道
pub fn feed(capacity: usize) -> (FeedSender, EventFeed) {
    let (sender, inbox) = mpsc::channel(capacity);
    (FeedSender { sender }, EventFeed { inbox })
}

impl FeedSender {
    /// 通道满时等待；接收端已经关闭时返回 `FeedClosed`
    pub async fn send(&self, seq: u64, event: TableEvent) -> Result<(), SyncError> {
        self.sender
            .send(Sequenced { seq, event })
            .await
            .map_err(|_| SyncError::FeedClosed)
    }
}

impl EventFeed {
    /// 依次把事件交给副本执行，每个结果都会交给 `observer`。
    /// 所有发送端关闭后正常返回；遇到序号错误立即返回该错误。
    pub async fn run<F>(mut self, replica: Arc<Replica>, mut observer: F) -> Result<(), SyncError>
    where
        F: FnMut(&Sequenced, &EventOutcome),
    {
        while let Some(item) = self.inbox.recv().await {
            let outcome = replica.apply(item.seq, &item.event)?;
            observer(&item, &outcome);
        }
        Ok(())
    }
}

// --- 单元测试 ---
