//! 服务器配置：命令行参数优先，其次是环境变量，最后是默认值

use std::net::SocketAddr;

use clap::Parser;

#[derive(Debug, Clone, Parser)]
#[command(name = "big_two_server", about = "锄大地中继服务器")]
pub struct Config {
    /// 监听地址
    #[arg(long, env = "BIG_TWO_BIND", default_value = "0.0.0.0:2396")]
    pub bind: SocketAddr,

    /// 每个连接的发送队列长度
    #[arg(long, env = "BIG_TWO_QUEUE", default_value_t = 32)]
    pub queue: usize,

    /// 中继任务收件箱长度
    #[arg(long, env = "BIG_TWO_INBOX", default_value_t = 256)]
    pub inbox: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_override_defaults() {
        let config = Config::try_parse_from(["big_two_server", "--bind", "127.0.0.1:9000", "--queue", "8"]).unwrap();
        assert_eq!(config.bind, "127.0.0.1:9000".parse().unwrap());
        assert_eq!(config.queue, 8);
    }

    #[test]
    fn test_rejects_bad_address() {
        assert!(Config::try_parse_from(["big_two_server", "--bind", "not-an-address"]).is_err());
    }
}
