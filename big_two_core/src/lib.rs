//! # 锄大地 (Big Two) 核心逻辑库
//!
//! 这个 `core` crate 包含了锄大地的牌型识别与比较、四人轮流出牌的状态机，
//! 以及客户端-服务器之间的消息定义和副本同步逻辑。
//! 它不关心网络连接和界面，可以被服务器、客户端或测试直接复用。

mod card;
mod error;
mod hand;
mod logic;
mod message;
mod state;
pub mod sync;

pub use card::*;

pub use error::*;

pub use hand::*;

pub use message::*;

pub use state::*;
