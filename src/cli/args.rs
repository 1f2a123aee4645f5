use clap::{ArgAction, Parser};

#[derive(Parser, Debug, Clone)]
#[command(
    name = "dirbrute",
    version,
    about = "concurrent HTTP wordlist probing tool",
    long_about = "Dirbrute probes a target over a wordlist of candidate names with concurrent HTTP HEAD requests, in directory or subdomain mode.\n\nExamples:\n  dirbrute -u https://target.tld -w ./wordlists/common.txt\n  dirbrute -u target.tld -w words.txt -m subdomain -t 50\n  dirbrute --history-list 10\n\nTip: Use --config to persist scan settings and keep CLI invocations short."
)]
pub struct CliArgs {
    #[arg(
        short = 'v',
        long = "verbose",
        action = ArgAction::Count,
        help_heading = "Output",
        help = "Increase verbosity (-v, -vv)."
    )]
    pub verbose: u8,

    #[arg(
        long = "no-color",
        help_heading = "Output",
        help = "Disable colored output."
    )]
    pub no_color: bool,

    #[arg(
        short = 'u',
        long = "url",
        value_name = "URL",
        help_heading = "Input",
        help = "Base URL to probe (scheme defaults to https)."
    )]
    pub url: Option<String>,

    #[arg(
        short = 'w',
        long = "wordlist",
        value_name = "FILE",
        help_heading = "Input",
        help = "Wordlist file (one candidate per line)."
    )]
    pub wordlist: Option<String>,

    #[arg(
        short = 'm',
        long = "mode",
        value_name = "MODE",
        help_heading = "Input",
        help = "Probe mode: directory or subdomain."
    )]
    pub mode: Option<String>,

    #[arg(
        short = 'C',
        long = "config",
        value_name = "FILE",
        help_heading = "Input",
        help = "Path to config file (defaults to ~/.dirbrute/config.yml)."
    )]
    pub config: Option<String>,

    #[arg(
        short = 't',
        long = "threads",
        value_name = "N",
        help_heading = "Performance",
        help = "Concurrent probe workers per batch."
    )]
    pub threads: Option<usize>,

    #[arg(
        long = "timeout",
        value_name = "SECONDS",
        help_heading = "Performance",
        help = "Per-request timeout in seconds."
    )]
    pub timeout: Option<u64>,

    #[arg(
        long = "delay-ms",
        value_name = "MS",
        help_heading = "Performance",
        help = "Fixed delay before each request, in milliseconds."
    )]
    pub delay_ms: Option<u64>,

    #[arg(
        short = 'b',
        long = "batch-size",
        value_name = "N",
        help_heading = "Performance",
        help = "Targets processed per batch."
    )]
    pub batch_size: Option<usize>,

    #[arg(
        short = 'r',
        long = "retries",
        value_name = "N",
        help_heading = "Performance",
        help = "Retries per target on transient network failure."
    )]
    pub retries: Option<u32>,

    #[arg(
        long = "rate",
        value_name = "N",
        help_heading = "Performance",
        help = "Max requests admitted per rate-limit period."
    )]
    pub rate_max_requests: Option<usize>,

    #[arg(
        long = "rate-period",
        value_name = "SECONDS",
        help_heading = "Performance",
        help = "Rate-limit window length in seconds (default 1 when --rate is set)."
    )]
    pub rate_period_seconds: Option<u64>,

    #[arg(
        long = "cache-size",
        value_name = "N",
        help_heading = "Performance",
        help = "Result cache capacity (0 disables caching)."
    )]
    pub cache_size: Option<usize>,

    #[arg(
        short = 'k',
        long = "insecure",
        help_heading = "HTTP",
        help = "Skip TLS certificate verification."
    )]
    pub insecure: bool,

    #[arg(
        short = 'A',
        long = "user-agent",
        value_name = "UA",
        help_heading = "HTTP",
        help = "User-Agent header value."
    )]
    pub user_agent: Option<String>,

    #[arg(
        long = "auth",
        value_name = "USER:PASS",
        help_heading = "HTTP",
        help = "Basic auth credentials."
    )]
    pub auth: Option<String>,

    #[arg(
        short = 'x',
        long = "proxy",
        value_name = "URL",
        help_heading = "HTTP",
        help = "Upstream HTTP(S) proxy."
    )]
    pub proxy: Option<String>,

    #[arg(
        long = "history",
        value_name = "FILE",
        help_heading = "History",
        help = "History store path (defaults to ~/.dirbrute/history.json)."
    )]
    pub history: Option<String>,

    #[arg(
        long = "no-history",
        help_heading = "History",
        help = "Do not persist this session to the history store."
    )]
    pub no_history: bool,

    #[arg(
        long = "history-list",
        value_name = "N",
        help_heading = "History",
        help = "Print the N most recent sessions and exit."
    )]
    pub history_list: Option<usize>,
}
