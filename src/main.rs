use std::path::PathBuf;
use std::process::exit;

use clap::Parser;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use tracing_subscriber::EnvFilter;

use dirbrute::cli::args::CliArgs;
use dirbrute::cli::validation;
use dirbrute::config;
use dirbrute::history::HistoryStore;
use dirbrute::runner::{
    Bruteforcer, CancelFlag, Credentials, Options, RateLimitConfig, WordlistSource,
};
use dirbrute::targets::ProbeMode;

fn print_banner() {
    const BANNER: &str = r#"
        __ _      __                __
   ____/ /(_)____/ /_  _____ __  __/ /_ ___
  / __  // // ___/ __ \/ ___// / / / __// _ \
 / /_/ // // /  / /_/ / /   / /_/ / /_ /  __/
 \__,_//_//_/  /_.___/_/    \__,_/\__/ \___/

              concurrent wordlist prober
    "#;
    println!("{}", BANNER.bold().blue());
    println!(
        "{}{}{} {}\n",
        "[".bold().white(),
        "WRN".bold().yellow(),
        "]".bold().white(),
        "Only probe targets you are authorized to test. You are responsible for your actions."
            .bold()
            .white()
    );
}

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("dirbrute={default_level}")));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn fatal(message: impl AsRef<str>) -> ! {
    eprintln!(
        "{}{}{} {}",
        "[".bold().white(),
        "ERR".bold().red(),
        "]".bold().white(),
        message.as_ref().bold().white()
    );
    exit(1);
}

fn build_options(args: &CliArgs, file: &config::ConfigFile) -> Options {
    let defaults = Options::default();

    let base_url = args
        .url
        .clone()
        .or_else(|| file.url.clone())
        .unwrap_or_else(|| fatal("no target URL provided, use --url or set 'url' in the config"));
    let wordlist_path = args
        .wordlist
        .clone()
        .or_else(|| file.wordlist.clone())
        .unwrap_or_else(|| {
            fatal("no wordlist provided, use --wordlist or set 'wordlist' in the config")
        });
    let mode = args
        .mode
        .clone()
        .or_else(|| file.mode.clone())
        .map(|raw| {
            raw.parse::<ProbeMode>()
                .unwrap_or_else(|e| fatal(e.to_string()))
        })
        .unwrap_or(defaults.mode);
    let auth: Option<Credentials> = args
        .auth
        .clone()
        .or_else(|| file.auth.clone())
        .map(|raw| validation::parse_credentials(&raw).unwrap_or_else(|e| fatal(e)));
    let rate_limit = args
        .rate_max_requests
        .or(file.rate_max_requests)
        .map(|max_requests| RateLimitConfig {
            max_requests,
            period_seconds: args
                .rate_period_seconds
                .or(file.rate_period_seconds)
                .unwrap_or(1),
        });

    Options {
        base_url,
        wordlist: WordlistSource::FilePath(wordlist_path),
        mode,
        threads: args.threads.or(file.threads).unwrap_or(defaults.threads),
        timeout_seconds: args
            .timeout
            .or(file.timeout)
            .unwrap_or(defaults.timeout_seconds),
        user_agent: args
            .user_agent
            .clone()
            .or_else(|| file.user_agent.clone())
            .unwrap_or(defaults.user_agent),
        delay_ms: args.delay_ms.or(file.delay_ms).unwrap_or(defaults.delay_ms),
        verify_ssl: if args.insecure {
            false
        } else {
            file.verify_ssl.unwrap_or(defaults.verify_ssl)
        },
        auth,
        proxy: args.proxy.clone().or_else(|| file.proxy.clone()),
        retries: args.retries.or(file.retries).unwrap_or(defaults.retries),
        batch_size: args
            .batch_size
            .or(file.batch_size)
            .unwrap_or(defaults.batch_size),
        rate_limit,
        cache_size: args
            .cache_size
            .or(file.cache_size)
            .unwrap_or(defaults.cache_size),
    }
}

fn history_path(args: &CliArgs, file: &config::ConfigFile) -> Option<PathBuf> {
    if args.no_history {
        return None;
    }
    args.history
        .clone()
        .or_else(|| file.history.clone())
        .map(|p| config::expand_tilde(&p))
        .or_else(config::default_history_path)
}

async fn print_history(store: &HistoryStore, limit: usize) {
    let sessions = match store.list(limit).await {
        Ok(sessions) => sessions,
        Err(e) => fatal(format!("failed to read history: {e}")),
    };
    if sessions.is_empty() {
        println!("no recorded sessions");
        return;
    }
    for session in sessions {
        println!(
            "{} {} {} {} {} {}",
            format!("#{}", session.id).bold().blue(),
            session.start_time.format("%Y-%m-%d %H:%M:%S"),
            session.url.bold().white(),
            session.mode,
            format!("{} requests", session.total_requests),
            format!("{} found", session.found_count).bold().green(),
        );
    }
}

#[tokio::main]
async fn main() {
    let args = CliArgs::parse();

    if !args.no_color {
        colored::control::set_override(true);
    } else {
        colored::control::set_override(false);
    }

    init_tracing(args.verbose);

    if let Err(e) = validation::validate(&args) {
        fatal(e);
    }

    let file = match args.config.as_deref() {
        Some(path) => {
            let path = config::expand_tilde(path);
            config::load_config(&path, false).unwrap_or_else(|e| fatal(e))
        }
        None => match config::default_config_path() {
            Some(path) => {
                if let Err(e) = config::ensure_default_config_file(&path) {
                    tracing::warn!(error = %e, "could not write default config file");
                }
                config::load_config(&path, true).unwrap_or_else(|e| fatal(e))
            }
            None => config::ConfigFile::default(),
        },
    };

    if file.no_color.unwrap_or(false) && !args.no_color {
        colored::control::unset_override();
    }

    // --history-list short-circuits the scan entirely.
    if let Some(limit) = args.history_list {
        let path = history_path(&args, &file)
            .unwrap_or_else(|| fatal("no history path available with --no-history"));
        let store = HistoryStore::open(path).unwrap_or_else(|e| fatal(e.to_string()));
        print_history(&store, limit.max(1)).await;
        return;
    }

    print_banner();

    let options = build_options(&args, &file);

    let progress = ProgressBar::with_draw_target(None, ProgressDrawTarget::stderr());
    progress.set_style(
        ProgressStyle::with_template("{spinner} [{bar:40.blue}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );

    let mut engine = Bruteforcer::new(options).unwrap_or_else(|e| fatal(e.to_string()));
    engine = engine.with_progress(progress.clone());

    if let Some(path) = history_path(&args, &file) {
        match HistoryStore::open(path) {
            Ok(store) => engine = engine.with_history(store),
            Err(e) => tracing::warn!(error = %e, "history store unavailable, continuing without"),
        }
    }

    let cancel = CancelFlag::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("interrupt received, finishing in-flight requests");
                cancel.cancel();
            }
        });
    }

    let outcome = match engine.run(cancel).await {
        Ok(outcome) => outcome,
        Err(e) => fatal(e.to_string()),
    };
    progress.finish_and_clear();

    println!("{}", "-".repeat(72).white());
    if outcome.matches.is_empty() {
        println!("{}", "no targets found".bold().yellow());
    } else {
        for result in &outcome.matches {
            println!(
                "{} {} {}",
                format!("{}", result.status).bold().green(),
                result.target.bold().white(),
                result.content_type.dimmed(),
            );
        }
    }
    println!("{}", "-".repeat(72).white());
    println!(
        "{} {} requests, {} found, {:.2?} elapsed{}",
        if outcome.cancelled {
            "interrupted:".bold().yellow()
        } else {
            "done:".bold().green()
        },
        outcome.total_requests,
        outcome.matches.len(),
        outcome.elapsed,
        match outcome.session_id {
            Some(id) => format!(", session #{id}"),
            None => String::new(),
        },
    );
}
