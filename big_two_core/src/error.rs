use crate::card::Card;
use crate::state::Seat;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// 出牌、发牌被拒绝的原因。
/// 所有错误都不是致命的：状态保持不变，随时可以通过重新发牌恢复。
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum GameError {
    // --- 违反规则 (IllegalMove) ---
    #[error("当前没有进行中的牌局")]
    NoRoundInProgress,
    #[error("不能在桌面为空时过牌")]
    PassOnEmptyTable,
    #[error("不能对自己打出的牌过牌")]
    PassOnOwnHand,
    #[error("所选的牌不能组成合法牌型")]
    NotAHand,
    #[error("必须出 {expected} 张牌，实际出了 {actual} 张")]
    SizeMismatch { expected: usize, actual: usize },
    #[error("{hand} 压不过 {top}")]
    DoesNotBeat { hand: String, top: String },

    // --- 轮次错误 (OutOfTurn) ---
    #[error("现在轮到座位 {expected}，不是座位 {seat}")]
    NotYourTurn { seat: Seat, expected: Seat },

    // --- 格式错误的意图 (MalformedIntent) ---
    #[error("座位号 {0} 不存在")]
    InvalidSeat(Seat),
    #[error("牌的下标 {position} 超出手牌范围 (共 {held} 张)")]
    PositionOutOfRange { position: usize, held: usize },
    #[error("牌的下标 {0} 重复")]
    DuplicatePosition(usize),

    // --- 发牌错误 (InvalidDeal) ---
    #[error("牌局正在进行，不能重新发牌")]
    RoundInProgress,
    #[error("牌组必须是 52 张，实际 {0} 张")]
    DeckSize(usize),
    #[error("{0} 重复出现")]
    DuplicateCard(Card),
}

/// 错误分类，对应“违规 / 格式错误 / 顺序错误”三类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    IllegalMove,
    MalformedIntent,
    OutOfTurn,
    InvalidDeal,
}

impl GameError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            GameError::NoRoundInProgress
            | GameError::PassOnEmptyTable
            | GameError::PassOnOwnHand
            | GameError::NotAHand
            | GameError::SizeMismatch { .. }
            | GameError::DoesNotBeat { .. } => ErrorKind::IllegalMove,
            GameError::NotYourTurn { .. } => ErrorKind::OutOfTurn,
            GameError::InvalidSeat(_)
            | GameError::PositionOutOfRange { .. }
            | GameError::DuplicatePosition(_) => ErrorKind::MalformedIntent,
            GameError::RoundInProgress | GameError::DeckSize(_) | GameError::DuplicateCard(_) => {
                ErrorKind::InvalidDeal
            }
        }
    }
}

/// 事件流本身出错 (与游戏规则无关)
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyncError {
    /// 序号不连续：丢失、重复或乱序的事件
    #[error("事件序号错误: 期望 {expected}，收到 {got}")]
    OutOfOrder { expected: u64, got: u64 },
    #[error("事件通道已关闭")]
    FeedClosed,
}
