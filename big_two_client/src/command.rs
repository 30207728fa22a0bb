//! 终端命令解析

/// 用户输入的一条命令
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// 按手牌下标出牌
    Play(Vec<usize>),
    Pass,
    Say(String),
    Ready,
    /// 显示自己的手牌
    Hand,
    /// 显示桌面和各座位的牌数
    Table,
    Help,
    Exit,
}

pub const USAGE: &str = "\
可用命令:
  play <下标...>            - 出牌，例如 play 0 3 4
  pass                      - 过牌
  say <内容>                - 聊天
  ready                     - 准备开始下一局
  hand                      - 显示手牌
  table                     - 显示桌面
  help                      - 显示帮助
  exit                      - 退出";

pub fn parse(line: &str) -> Result<Command, String> {
    let line = line.trim();
    let (head, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
    let rest = rest.trim();

    match head {
        "play" | "p" => {
            let positions = rest
                .split_whitespace()
                .map(|s| s.parse::<usize>().map_err(|_| format!("无效的下标: {}", s)))
                .collect::<Result<Vec<_>, _>>()?;
            if positions.is_empty() {
                return Err("用法: play <下标...>".to_string());
            }
            Ok(Command::Play(positions))
        }
        "pass" => Ok(Command::Pass),
        "say" if !rest.is_empty() => Ok(Command::Say(rest.to_string())),
        "say" => Err("用法: say <内容>".to_string()),
        "ready" => Ok(Command::Ready),
        "hand" => Ok(Command::Hand),
        "table" => Ok(Command::Table),
        "help" | "" => Ok(Command::Help),
        "exit" | "quit" => Ok(Command::Exit),
        _ => Err(format!("未知命令: {}", line)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_play() {
        assert_eq!(parse("play 0 3 4"), Ok(Command::Play(vec![0, 3, 4])));
        assert_eq!(parse("  p 12 "), Ok(Command::Play(vec![12])));
    }

    #[test]
    fn test_play_requires_positions() {
        assert!(parse("play").is_err());
        assert_eq!(parse("play 1 x"), Err("无效的下标: x".to_string()));
        assert!(parse("play -1").is_err());
    }

    #[test]
    fn test_say_keeps_spaces() {
        assert_eq!(parse("say good  game"), Ok(Command::Say("good  game".to_string())));
        assert!(parse("say").is_err());
    }

    #[test]
    fn test_simple_commands() {
        assert_eq!(parse("pass"), Ok(Command::Pass));
        assert_eq!(parse("ready"), Ok(Command::Ready));
        assert_eq!(parse("quit"), Ok(Command::Exit));
        assert_eq!(parse(""), Ok(Command::Help));
        assert!(parse("fold").is_err());
    }
}
