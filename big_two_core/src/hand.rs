use crate::card::{Card, CardSequence};
use crate::error::GameError;
use crate::state::{SEATS, Seat};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// 牌型 (Shape)
/// 八种牌型是封闭集合，新增牌型时 `match` 会在编译期提示所有需要处理的地方
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy, Serialize, Deserialize)]
pub enum Shape {
    Single,        // 单张
    Pair,          // 对子
    Triple,        // 三条
    Straight,      // 顺子
    Flush,         // 同花
    FullHouse,     // 葫芦
    Quad,          // 四带一
    StraightFlush, // 同花顺
}

impl Shape {
    /// 五张牌型之间的强弱：顺子 < 同花 < 葫芦 < 四带一 < 同花顺。
    /// 一到三张的牌型返回 None。
    pub fn five_card_strength(&self) -> Option<u8> {
        match self {
            Shape::Single | Shape::Pair | Shape::Triple => None,
            Shape::Straight => Some(0),
            Shape::Flush => Some(1),
            Shape::FullHouse => Some(2),
            Shape::Quad => Some(3),
            Shape::StraightFlush => Some(4),
        }
    }
}

/// 一手经过校验的牌：牌已排好序，并记录是谁打出的。
/// 反序列化时重新识别牌型，牌型对不上或座位号不存在都会被拒绝。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawHand")]
pub struct Hand {
    shape: Shape,
    cards: CardSequence,
    owner: Seat,
}

#[derive(Deserialize)]
struct RawHand {
    shape: Shape,
    cards: CardSequence,
    owner: Seat,
}

impl TryFrom<RawHand> for Hand {
    type Error = GameError;

    fn try_from(raw: RawHand) -> Result<Self, Self::Error> {
        if raw.owner >= SEATS {
            return Err(GameError::InvalidSeat(raw.owner));
        }
        match Hand::classify(&raw.cards, raw.owner) {
            Some(hand) if hand.shape == raw.shape => Ok(hand),
            _ => Err(GameError::NotAHand),
        }
    }
}

impl Hand {
    /// 牌型识别。
    /// 按 单张、对子、三条、同花顺、四带一、葫芦、同花、顺子 的顺序检查，第一个匹配的牌型胜出。
    /// 组不成任何牌型时返回 None。
    pub fn classify(cards: &CardSequence, owner: Seat) -> Option<Hand> {
        let mut cards = cards.clone();
        cards.sort();
        let c = cards.as_slice();

        let shape = match c.len() {
            1 => Shape::Single,
            2 if c[0].same_rank(&c[1]) => Shape::Pair,
            3 if all_same_rank(c) => Shape::Triple,
            5 if is_flush(c) && is_run(c) => Shape::StraightFlush,
            5 if is_quad(c) => Shape::Quad,
            5 if is_full_house(c) => Shape::FullHouse,
            5 if is_flush(c) => Shape::Flush,
            5 if is_run(c) => Shape::Straight,
            _ => return None,
        };

        Some(Hand { shape, cards, owner })
    }

    pub fn shape(&self) -> Shape {
        self.shape
    }

    pub fn cards(&self) -> &CardSequence {
        &self.cards
    }

    pub fn owner(&self) -> Seat {
        self.owner
    }

    /// 决定大小的那张牌。
    /// 四带一和葫芦取“多的那组”中最大的一张，其余牌型取整手牌中最大的一张。
    pub fn top_card(&self) -> Card {
        let c = self.cards.as_slice();
        match self.shape {
            Shape::Single
            | Shape::Pair
            | Shape::Triple
            | Shape::Straight
            | Shape::Flush
            | Shape::StraightFlush => c[c.len() - 1],
            Shape::Quad => {
                if c[3].same_rank(&c[4]) { c[4] } else { c[3] }
            }
            Shape::FullHouse => {
                if c[2].same_rank(&c[3]) { c[4] } else { c[2] }
            }
        }
    }

    /// `self` 是否压得过 `other`。
    ///
    /// 调用前提：两手牌张数相同。五张对五张时先比牌型强弱，牌型相同再比关键牌；
    /// 其余情况直接比关键牌。张数不同的比较没有定义，状态机也从不这样调用。
    pub fn beats(&self, other: &Hand) -> bool {
        debug_assert_eq!(self.cards.len(), other.cards.len(), "只能比较张数相同的两手牌");

        if let (Some(mine), Some(theirs)) =
            (self.shape.five_card_strength(), other.shape.five_card_strength())
        {
            match mine.cmp(&theirs) {
                Ordering::Greater => return true,
                Ordering::Less => return false,
                Ordering::Equal => {}
            }
        }
        self.top_card() > other.top_card()
    }
}

// --- 牌型判断的辅助函数 (输入都是已排序的牌) ---

fn all_same_rank(cards: &[Card]) -> bool {
    cards.windows(2).all(|w| w[0].same_rank(&w[1]))
}

fn is_flush(cards: &[Card]) -> bool {
    cards.windows(2).all(|w| w[0].suit == w[1].suit)
}

/// 实际点数连续递增，不允许首尾相接 (2-3-4-5-6 不是顺子)
fn is_run(cards: &[Card]) -> bool {
    cards.windows(2).all(|w| w[1].effective_rank() == w[0].effective_rank() + 1)
}

fn is_quad(c: &[Card]) -> bool {
    all_same_rank(&c[..4]) || all_same_rank(&c[1..])
}

fn is_full_house(c: &[Card]) -> bool {
    (all_same_rank(&c[..2]) && all_same_rank(&c[2..]))
        || (all_same_rank(&c[..3]) && all_same_rank(&c[3..]))
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", match self {
            Shape::Single => "单张",
            Shape::Pair => "对子",
            Shape::Triple => "三条",
            Shape::Straight => "顺子",
            Shape::Flush => "同花",
            Shape::FullHouse => "葫芦",
            Shape::Quad => "四带一",
            Shape::StraightFlush => "同花顺",
        })
    }
}

impl fmt::Display for Hand {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{{{}}} {}", self.shape, self.cards)
    }
}

// --- 单元测试 ---
