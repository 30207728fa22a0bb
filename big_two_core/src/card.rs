use crate::error::GameError;
use rand::Rng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashSet;
use std::fmt;

/// 一副牌的张数
pub const DECK_SIZE: usize = 52;

// --- 核心数据结构定义 ---

/// 花色 (Suit)
/// 顺序从小到大：方块 < 梅花 < 红心 < 黑桃，`Ord` 的派生直接反映这个顺序
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Clone, Copy, Serialize, Deserialize)]
pub enum Suit {
    Diamond = 0, // 方块 ♦️
    Club = 1,    // 梅花 ♣️
    Heart = 2,   // 红心 ♥️
    Spade = 3,   // 黑桃 ♠️
}

/// 点数 (Rank)
/// 变体的顺序是自然牌序 (A, 2, 3, ..., K)，并不是锄大地的大小顺序，
/// 比较大小请使用 [`Card::effective_rank`]
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy, Serialize, Deserialize)]
pub enum Rank {
    Ace = 0,
    Two = 1,
    Three = 2,
    Four = 3,
    Five = 4,
    Six = 5,
    Seven = 6,
    Eight = 7,
    Nine = 8,
    Ten = 9,
    Jack = 10,
    Queen = 11,
    King = 12,
}

/// 单张扑克牌 (Card)
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy, Serialize, Deserialize)]
pub struct Card {
    pub suit: Suit,
    pub rank: Rank,
}

impl Suit {
    pub const ALL: [Suit; 4] = [Suit::Diamond, Suit::Club, Suit::Heart, Suit::Spade];
}

impl Rank {
    pub const ALL: [Rank; 13] = [
        Rank::Ace, Rank::Two, Rank::Three, Rank::Four, Rank::Five, Rank::Six, Rank::Seven,
        Rank::Eight, Rank::Nine, Rank::Ten, Rank::Jack, Rank::Queen, Rank::King,
    ];
}

impl TryFrom<u8> for Suit {
    type Error = u8;

    fn try_from(n: u8) -> Result<Self, Self::Error> {
        Suit::ALL.get(n as usize).copied().ok_or(n)
    }
}

impl TryFrom<u8> for Rank {
    type Error = u8;

    fn try_from(n: u8) -> Result<Self, Self::Error> {
        Rank::ALL.get(n as usize).copied().ok_or(n)
    }
}

impl Card {
    pub fn new(suit: Suit, rank: Rank) -> Card {
        Card { suit, rank }
    }

    /// 用原始下标构造牌，suit ∈ 0..4，rank ∈ 0..13
    pub fn from_indices(suit: u8, rank: u8) -> Option<Card> {
        Some(Card { suit: Suit::try_from(suit).ok()?, rank: Rank::try_from(rank).ok()? })
    }

    /// 锄大地中的实际大小：3 最小 (0)，2 最大 (12)
    pub fn effective_rank(&self) -> u8 {
        (self.rank as u8 + 11) % 13
    }

    /// 点数相同 (不看花色)
    pub fn same_rank(&self, other: &Card) -> bool {
        self.rank == other.rank
    }
}

/// 先比实际点数，点数相同再比花色。
/// 52 张牌的 (花色, 点数) 互不相同，所以这是严格全序。
impl Ord for Card {
    fn cmp(&self, other: &Self) -> Ordering {
        self.effective_rank()
            .cmp(&other.effective_rank())
            .then(self.suit.cmp(&other.suit))
    }
}

impl PartialOrd for Card {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

// --- 牌序列 ---

/// 一串互不相同的牌，可以是玩家手里的牌，也可以是打出的一手牌。
/// 反序列化时拒绝重复的牌。
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Card>", into = "Vec<Card>")]
pub struct CardSequence {
    cards: Vec<Card>,
}

impl CardSequence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.cards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }

    pub fn get(&self, i: usize) -> Option<&Card> {
        self.cards.get(i)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Card> {
        self.cards.iter()
    }

    pub fn as_slice(&self) -> &[Card] {
        &self.cards
    }

    pub fn contains(&self, card: &Card) -> bool {
        self.cards.contains(card)
    }

    /// 加入一张牌；已存在则不加，返回 false
    pub fn add(&mut self, card: Card) -> bool {
        if self.contains(&card) {
            return false;
        }
        self.cards.push(card);
        true
    }

    pub fn remove(&mut self, card: &Card) -> bool {
        match self.cards.iter().position(|c| c == card) {
            Some(pos) => {
                self.cards.remove(pos);
                true
            }
            None => false,
        }
    }

    pub fn remove_at(&mut self, i: usize) -> Option<Card> {
        (i < self.cards.len()).then(|| self.cards.remove(i))
    }

    pub fn remove_all(&mut self, other: &CardSequence) {
        self.cards.retain(|c| !other.contains(c));
    }

    pub fn sort(&mut self) {
        self.cards.sort();
    }

    pub fn clear(&mut self) {
        self.cards.clear();
    }

    /// 按下标取出对应的牌 (不修改自身)。
    /// 下标越界或重复都属于格式错误的意图，而不是违反规则。
    pub fn select(&self, positions: &[usize]) -> Result<CardSequence, GameError> {
        let mut seen = HashSet::with_capacity(positions.len());
        let mut selected = CardSequence::new();
        for &position in positions {
            if !seen.insert(position) {
                return Err(GameError::DuplicatePosition(position));
            }
            let card = self.cards.get(position).ok_or(GameError::PositionOutOfRange {
                position,
                held: self.cards.len(),
            })?;
            selected.cards.push(*card);
        }
        Ok(selected)
    }
}

impl FromIterator<Card> for CardSequence {
    fn from_iter<I: IntoIterator<Item = Card>>(iter: I) -> Self {
        let mut seq = CardSequence::new();
        for card in iter {
            seq.add(card);
        }
        seq
    }
}

impl TryFrom<Vec<Card>> for CardSequence {
    type Error = GameError;

    fn try_from(cards: Vec<Card>) -> Result<Self, Self::Error> {
        let mut seq = CardSequence { cards: Vec::with_capacity(cards.len()) };
        for card in cards {
            if !seq.add(card) {
                return Err(GameError::DuplicateCard(card));
            }
        }
        Ok(seq)
    }
}

impl From<CardSequence> for Vec<Card> {
    fn from(seq: CardSequence) -> Self {
        seq.cards
    }
}

impl<'a> IntoIterator for &'a CardSequence {
    type Item = &'a Card;
    type IntoIter = std::slice::Iter<'a, Card>;

    fn into_iter(self) -> Self::IntoIter {
        self.cards.iter()
    }
}

// --- 牌组 ---

/// 完整的 52 张牌，每种 (花色, 点数) 恰好一张。
/// 反序列化时会校验，消息里的残缺牌组在解码阶段就会被拒绝。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Card>", into = "Vec<Card>")]
pub struct Deck {
    cards: Vec<Card>,
}

impl Deck {
    /// 未洗的新牌，按花色再按点数排列
    pub fn standard() -> Deck {
        let cards = Suit::ALL
            .iter()
            .flat_map(|&suit| Rank::ALL.iter().map(move |&rank| Card { suit, rank }))
            .collect();
        Deck { cards }
    }

    pub fn shuffled<R: Rng + ?Sized>(rng: &mut R) -> Deck {
        let mut deck = Deck::standard();
        deck.cards.shuffle(rng);
        deck
    }

    pub fn cards(&self) -> &[Card] {
        &self.cards
    }
}

impl TryFrom<Vec<Card>> for Deck {
    type Error = GameError;

    fn try_from(cards: Vec<Card>) -> Result<Self, Self::Error> {
        if cards.len() != DECK_SIZE {
            return Err(GameError::DeckSize(cards.len()));
        }
        let mut seen = HashSet::with_capacity(DECK_SIZE);
        for card in &cards {
            if !seen.insert(*card) {
                return Err(GameError::DuplicateCard(*card));
            }
        }
        Ok(Deck { cards })
    }
}

impl From<Deck> for Vec<Card> {
    fn from(deck: Deck) -> Self {
        deck.cards
    }
}

// --- 实现辅助功能 ---

impl fmt::Display for Suit {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", match self {
            Suit::Diamond => "♦",
            Suit::Club => "♣",
            Suit::Heart => "♥",
            Suit::Spade => "♠",
        })
    }
}

impl fmt::Display for Rank {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", match self {
            Rank::Ace => "A",
            Rank::Two => "2",
            Rank::Three => "3",
            Rank::Four => "4",
            Rank::Five => "5",
            Rank::Six => "6",
            Rank::Seven => "7",
            Rank::Eight => "8",
            Rank::Nine => "9",
            Rank::Ten => "T",
            Rank::Jack => "J",
            Rank::Queen => "Q",
            Rank::King => "K",
        })
    }
}

impl fmt::Display for Card {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}{}", self.suit, self.rank)
    }
}

impl fmt::Display for CardSequence {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let cards: Vec<String> = self.cards.iter().map(|c| c.to_string()).collect();
        write!(f, "[{}]", cards.join(" "))
    }
}

// --- 单元测试 ---
