use crate::card::*;
use crate::error::GameError;
use crate::hand::Hand;
use crate::state::*;

// --- 核心游戏流程函数 ---

impl GameState {
    /// 用一副洗好的牌开始新的一局
    ///
    /// - 清空所有玩家的手牌和桌面。
    /// - 第 i 张牌发给座位 i % 4，每人 13 张，然后各自理牌。
    /// - 持有全场最小的牌 (方块 3) 的玩家先出。
    ///
    /// 只能从 Idle / RoundOver / Aborted 进入；牌局进行中返回 `RoundInProgress`，状态不变。
    pub fn deal(&mut self, deck: Deck) -> Result<Seat, GameError> {
        if self.phase == GamePhase::InRound {
            return Err(GameError::RoundInProgress);
        }

        for party in self.parties.iter_mut() {
            party.cards.clear();
        }
        self.table.clear();

        for (i, card) in deck.cards().iter().enumerate() {
            self.parties[i % SEATS].cards.add(*card);
        }
        for party in self.parties.iter_mut() {
            party.cards.sort();
        }

        // 牌组完整，最小的牌一定在某人手里；理牌后它就是那人的第一张
        let lowest = deck.cards().iter().min().copied();
        self.cur_party_idx = self
            .parties
            .iter()
            .position(|p| p.cards.get(0).copied() == lowest)
            .unwrap_or(0);
        self.deck = Some(deck);
        self.phase = GamePhase::InRound;

        Ok(self.cur_party_idx)
    }

    /// 处理一次出牌意图，`positions` 为空表示过牌
    ///
    /// 检查顺序：牌局是否进行中、座位是否合法、是否轮到该座位、下标是否合法，
    /// 最后才是过牌 / 出牌规则。任何被拒绝的意图都不会修改状态。
    pub fn attempt_move(&mut self, seat: Seat, positions: &[usize]) -> Result<MoveReport, GameError> {
        if self.phase != GamePhase::InRound {
            return Err(GameError::NoRoundInProgress);
        }
        if seat >= SEATS {
            return Err(GameError::InvalidSeat(seat));
        }
        if seat != self.cur_party_idx {
            return Err(GameError::NotYourTurn { seat, expected: self.cur_party_idx });
        }

        let cards = self.parties[seat].cards.select(positions)?;

        if cards.is_empty() {
            self.check_pass(seat)?;
            self.advance_turn();
            return Ok(MoveReport { seat, hand: None, next_turn: self.cur_party_idx, result: None });
        }

        let hand = Hand::classify(&cards, seat).ok_or(GameError::NotAHand)?;
        self.check_follow(&hand)?;

        self.parties[seat].cards.remove_all(hand.cards());
        self.table.push(hand.clone());
        self.advance_turn();
        let result = self.check_round_over();

        Ok(MoveReport { seat, hand: Some(hand), next_turn: self.cur_party_idx, result })
    }

    /// 有人离开。牌局进行中则收回所有牌并进入 Aborted；
    /// 已结束的牌局保留结果，不做修改。
    pub fn abort(&mut self, by: Seat) -> AbortReport {
        if self.phase != GamePhase::InRound {
            return AbortReport { by, cleared: false };
        }

        for party in self.parties.iter_mut() {
            party.cards.clear();
        }
        self.table.clear();
        self.deck = None;
        self.phase = GamePhase::Aborted { by };
        AbortReport { by, cleared: true }
    }

    // --- 辅助逻辑函数 ---

    /// 桌面为空，或者桌面上最后一手是自己打的，都不能过牌
    fn check_pass(&self, seat: Seat) -> Result<(), GameError> {
        match self.table_top() {
            None => Err(GameError::PassOnEmptyTable),
            Some(top) if top.owner() == seat => Err(GameError::PassOnOwnHand),
            Some(_) => Ok(()),
        }
    }

    /// 跟别人的牌时，张数必须相同并且要压得过。
    /// 桌面为空，或者其他人都过了牌又轮回自己，则可以任意出。
    fn check_follow(&self, hand: &Hand) -> Result<(), GameError> {
        let Some(top) = self.table_top() else {
            return Ok(());
        };
        if top.owner() == hand.owner() {
            return Ok(());
        }
        let (expected, actual) = (top.cards().len(), hand.cards().len());
        if expected != actual {
            return Err(GameError::SizeMismatch { expected, actual });
        }
        if !hand.beats(top) {
            return Err(GameError::DoesNotBeat { hand: hand.to_string(), top: top.to_string() });
        }
        Ok(())
    }

    fn advance_turn(&mut self) {
        self.cur_party_idx = (self.cur_party_idx + 1) % SEATS;
    }

    /// 有人手牌出完则本局结束，不会自动重新发牌
    fn check_round_over(&mut self) -> Option<RoundResult> {
        let winner = self.parties.iter().position(|p| p.cards.is_empty())?;
        self.phase = GamePhase::RoundOver { winner };
        Some(RoundResult { winner, remaining: self.remaining_counts() })
    }
}

// --- 单元测试 ---
