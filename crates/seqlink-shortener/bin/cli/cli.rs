use clap::{Parser, Subcommand, ValueEnum};
use seqlink_core::{CodeAlphabet, DEFAULT_SYMBOLS};
use std::fmt::{Display, Formatter};

pub const STORE_BACKEND_ENV: &str = "SEQLINK_STORE_BACKEND";
pub const COUNTER_BACKEND_ENV: &str = "SEQLINK_COUNTER_BACKEND";
pub const MYSQL_DSN_ENV: &str = "SEQLINK_MYSQL_DSN";
pub const REDIS_URL_ENV: &str = "SEQLINK_REDIS_URL";
pub const COUNTER_NAME_ENV: &str = "SEQLINK_COUNTER_NAME";
pub const ALPHABET_ENV: &str = "SEQLINK_ALPHABET";
pub const RESERVED_CODES_ENV: &str = "SEQLINK_RESERVED_CODES";
pub const BASE_URL_ENV: &str = "SEQLINK_BASE_URL";
pub const LOG_FORMAT_ENV: &str = "SEQLINK_LOG_FORMAT";

pub const DEFAULT_COUNTER_NAME: &str = "links";

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StoreBackendArg {
    #[value(name = "in-memory")]
    InMemory,
    #[value(name = "mysql")]
    Mysql,
}

impl Display for StoreBackendArg {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreBackendArg::InMemory => write!(f, "in-memory"),
            StoreBackendArg::Mysql => write!(f, "mysql"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum CounterBackendArg {
    #[value(name = "in-memory")]
    InMemory,
    #[value(name = "mysql")]
    Mysql,
    #[value(name = "redis")]
    Redis,
}

impl Display for CounterBackendArg {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            CounterBackendArg::InMemory => write!(f, "in-memory"),
            CounterBackendArg::Mysql => write!(f, "mysql"),
            CounterBackendArg::Redis => write!(f, "redis"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormatArg {
    Text,
    Json,
}

#[derive(Debug, Parser)]
#[command(name = "seqlink", about = "Shorten and resolve URLs with sequential codes")]
pub struct CLI {
    #[arg(
        long,
        env = STORE_BACKEND_ENV,
        value_enum,
        default_value_t = StoreBackendArg::InMemory
    )]
    pub store: StoreBackendArg,

    /// Defaults to the store backend.
    #[arg(long, env = COUNTER_BACKEND_ENV, value_enum)]
    pub counter: Option<CounterBackendArg>,

    #[arg(
        long,
        env = MYSQL_DSN_ENV,
        required_if_eq_any([("store", "mysql"), ("counter", "mysql")])
    )]
    pub mysql_dsn: Option<String>,

    /// Create the MySQL tables before running the command.
    #[arg(long)]
    pub migrate: bool,

    #[arg(long, env = REDIS_URL_ENV, required_if_eq("counter", "redis"))]
    pub redis_url: Option<String>,

    /// Counter row (MySQL) or key (Redis) to draw sequence numbers from.
    #[arg(long, env = COUNTER_NAME_ENV, default_value = DEFAULT_COUNTER_NAME)]
    pub counter_name: String,

    #[arg(long, env = ALPHABET_ENV, default_value = DEFAULT_SYMBOLS)]
    pub alphabet: CodeAlphabet,

    /// Codes that are never handed out, e.g. routes of the HTTP front end.
    #[arg(long = "reserved-code", env = RESERVED_CODES_ENV, value_delimiter = ',')]
    pub reserved_codes: Vec<String>,

    /// Public base URL; when set, `shorten` prints full short URLs.
    #[arg(long, env = BASE_URL_ENV)]
    pub base_url: Option<String>,

    #[arg(long, env = LOG_FORMAT_ENV, value_enum, default_value_t = LogFormatArg::Text)]
    pub log_format: LogFormatArg,

    #[command(subcommand)]
    pub command: Command,
}

impl CLI {
    /// The counter backend to use, following the store when none was chosen.
    pub fn counter_backend(&self) -> CounterBackendArg {
        self.counter.unwrap_or(match self.store {
            StoreBackendArg::InMemory => CounterBackendArg::InMemory,
            StoreBackendArg::Mysql => CounterBackendArg::Mysql,
        })
    }

    /// Rejects a durable store paired with a counter that restarts at zero
    /// with every process, which would hand out codes already stored.
    pub fn check_backends(&self) -> Result<(), String> {
        match (self.store, self.counter_backend()) {
            (StoreBackendArg::Mysql, CounterBackendArg::InMemory) => Err(format!(
                "the {} store needs a durable counter; use --counter mysql or --counter redis",
                self.store
            )),
            _ => Ok(()),
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Shorten one or more URLs, printing one code per line.
    Shorten {
        #[arg(required = true)]
        urls: Vec<String>,
    },
    /// Print the URL behind a code and count a hit.
    Resolve { code: String },
    /// Print the stored record for a code as JSON without counting a hit.
    Inspect { code: String },
    /// Print the code for a sequence number.
    Encode { sequence: u64 },
    /// Print the sequence number behind a code.
    Decode { code: String },
    /// Print the next sequence number the counter will issue.
    Status,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_is_well_formed() {
        use clap::CommandFactory;
        CLI::command().debug_assert();
    }

    #[test]
    fn mysql_store_requires_dsn() {
        let err = CLI::try_parse_from(["seqlink", "--store", "mysql", "status"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::MissingRequiredArgument);
    }

    #[test]
    fn counter_follows_the_store_backend() {
        let cli = CLI::try_parse_from(["seqlink", "status"]).unwrap();
        assert_eq!(cli.counter_backend(), CounterBackendArg::InMemory);
        assert!(cli.check_backends().is_ok());

        let cli = CLI::try_parse_from([
            "seqlink",
            "--store",
            "mysql",
            "--mysql-dsn",
            "mysql://seqlink@localhost/seqlink",
            "status",
        ])
        .unwrap();
        assert_eq!(cli.counter_backend(), CounterBackendArg::Mysql);
        assert!(cli.check_backends().is_ok());
    }

    #[test]
    fn mysql_store_rejects_in_memory_counter() {
        let cli = CLI::try_parse_from([
            "seqlink",
            "--store",
            "mysql",
            "--counter",
            "in-memory",
            "--mysql-dsn",
            "mysql://seqlink@localhost/seqlink",
            "shorten",
            "https://example.com",
        ])
        .unwrap();

        let err = cli.check_backends().unwrap_err();
        assert!(err.contains("durable counter"), "{err}");
    }

    #[test]
    fn mysql_store_accepts_redis_counter() {
        let cli = CLI::try_parse_from([
            "seqlink",
            "--store",
            "mysql",
            "--counter",
            "redis",
            "--mysql-dsn",
            "mysql://seqlink@localhost/seqlink",
            "--redis-url",
            "redis://127.0.0.1:6379",
            "status",
        ])
        .unwrap();

        assert_eq!(cli.counter_backend(), CounterBackendArg::Redis);
        assert!(cli.check_backends().is_ok());
    }

    #[test]
    fn reserved_codes_split_on_commas() {
        let cli = CLI::try_parse_from([
            "seqlink",
            "--reserved-code",
            "reverse,admin",
            "encode",
            "0",
        ])
        .unwrap();
        assert_eq!(cli.reserved_codes, ["reverse", "admin"]);
        assert_eq!(cli.alphabet.radix(), 62);
    }

    #[test]
    fn rejects_invalid_alphabet() {
        let err = CLI::try_parse_from(["seqlink", "--alphabet", "a", "status"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    }
}
