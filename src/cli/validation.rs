use crate::cli::args::CliArgs;
use crate::runner::Credentials;
use crate::targets::ProbeMode;

pub fn validate(args: &CliArgs) -> Result<(), String> {
    if let Some(raw) = args.mode.as_deref() {
        raw.parse::<ProbeMode>()?;
    }
    if let Some(threads) = args.threads {
        if threads == 0 {
            return Err("invalid --threads, expected at least 1".to_string());
        }
    }
    if let Some(batch_size) = args.batch_size {
        if batch_size == 0 {
            return Err("invalid --batch-size, expected at least 1".to_string());
        }
    }
    if let Some(max_requests) = args.rate_max_requests {
        if max_requests == 0 {
            return Err("invalid --rate, expected at least 1".to_string());
        }
    }
    if let Some(period) = args.rate_period_seconds {
        if period == 0 {
            return Err("invalid --rate-period, expected at least 1".to_string());
        }
        if args.rate_max_requests.is_none() {
            return Err("--rate-period requires --rate".to_string());
        }
    }
    if let Some(raw) = args.auth.as_deref() {
        parse_credentials(raw)?;
    }
    Ok(())
}

pub fn parse_credentials(raw: &str) -> Result<Credentials, String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err("credentials are empty, expected USER:PASS".to_string());
    }
    match trimmed.split_once(':') {
        Some((user, _)) if user.is_empty() => {
            Err("credentials have an empty user, expected USER:PASS".to_string())
        }
        Some((user, pass)) => Ok(Credentials {
            username: user.to_string(),
            password: if pass.is_empty() {
                None
            } else {
                Some(pass.to_string())
            },
        }),
        None => Ok(Credentials {
            username: trimmed.to_string(),
            password: None,
        }),
    }
}
