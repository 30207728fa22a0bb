use crate::card::{Card, CardSequence, Deck};
use crate::hand::Hand;
use serde::{Deserialize, Serialize};

/// 座位号，0..4
pub type Seat = usize;

/// 每桌固定四个座位
pub const SEATS: usize = 4;
/// 发牌后每人 13 张
pub const CARDS_PER_PARTY: usize = 13;

/// 一个副本 (replica) 上的完整游戏状态。
/// 每个参与者各自持有一份，只通过有序事件流来改变。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameState {
    pub parties: [Party; SEATS],
    // 本局已经打出的牌，只追加，重新发牌或中止时才清空
    pub table: Vec<Hand>,
    pub cur_party_idx: Seat, // 当前应该出牌的座位
    pub phase: GamePhase,
    // 本局使用的牌组
    pub deck: Option<Deck>,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Party {
    pub name: Option<String>, // 加入完成之前为空
    pub cards: CardSequence,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GamePhase {
    /// 还没有发过牌
    Idle,
    /// 发牌完成，按轮出牌
    InRound,
    /// 有人出完了手牌
    RoundOver { winner: Seat },
    /// 有人中途离开，所有牌已收回，需要重新准备后发牌
    Aborted { by: Seat },
}

/// 一局结束时的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundResult {
    pub winner: Seat,
    /// 每个座位剩余的牌数 (赢家为 0)
    pub remaining: [usize; SEATS],
}

/// 一次成功的出牌或过牌
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveReport {
    pub seat: Seat,
    /// 打出的牌，过牌时为 None
    pub hand: Option<Hand>,
    pub next_turn: Seat,
    /// 这一步结束了本局
    pub result: Option<RoundResult>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbortReport {
    pub by: Seat,
    /// 是否真的收回了牌 (只有牌局进行中才会)
    pub cleared: bool,
}

impl Default for GameState {
    fn default() -> Self {
        GameState {
            parties: Default::default(),
            table: Vec::new(),
            cur_party_idx: 0,
            phase: GamePhase::Idle,
            deck: None,
        }
    }
}

// --- GameState 的查询方法 ---

impl GameState {
    pub fn new() -> Self {
        Self::default()
    }

    /// 当前应该行动的座位
    pub fn current_turn(&self) -> Seat {
        self.cur_party_idx
    }

    /// 桌面上最近打出的一手牌
    pub fn table_top(&self) -> Option<&Hand> {
        self.table.last()
    }

    pub fn is_round_over(&self) -> bool {
        matches!(self.phase, GamePhase::RoundOver { .. })
    }

    pub fn winner(&self) -> Option<Seat> {
        match self.phase {
            GamePhase::RoundOver { winner } => Some(winner),
            _ => None,
        }
    }

    pub fn party(&self, seat: Seat) -> Option<&Party> {
        self.parties.get(seat)
    }

    pub fn remaining_counts(&self) -> [usize; SEATS] {
        std::array::from_fn(|i| self.parties[i].cards.len())
    }

    /// 已入座 (有名字) 的人数
    pub fn seated_count(&self) -> usize {
        self.parties.iter().filter(|p| p.name.is_some()).count()
    }

    pub fn set_party_name(&mut self, seat: Seat, name: String) {
        if let Some(party) = self.parties.get_mut(seat) {
            party.name = Some(name);
        }
    }

    pub fn clear_party_name(&mut self, seat: Seat) {
        if let Some(party) = self.parties.get_mut(seat) {
            party.name = None;
        }
    }

    /// 所有玩家手里的牌加上桌面上的牌。
    /// 牌局进行中，这些牌恰好就是本局牌组的 52 张。
    pub fn cards_in_play(&self) -> Vec<Card> {
        self.parties
            .iter()
            .flat_map(|p| p.cards.iter().copied())
            .chain(self.table.iter().flat_map(|h| h.cards().iter().copied()))
            .collect()
    }
}
