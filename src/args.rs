use anyhow::{bail, Result};
use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, TimeZone as _, Utc};
use clap::Parser;
use std::path::PathBuf;

use crate::config::DEFAULT_CONFIG_PATH;

/// Import all transactions from different banks in a given timeframe into Firefly III.
/// Without a timeframe, the auto importer runs: it remembers the time of its last execution
/// and imports all transactions since then.
#[derive(Parser, Debug)]
#[clap(after_help = "Date and time inputs need to be formatted in ISO 8601 format. \
    Date: YYYY-MM-DD, Datetime: YYYY-MM-DDTHH:mm[:ss][+/-HH:mm]")]
pub struct Args {
    /// Path to the config file
    #[clap(short, long, default_value = DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,

    /// Start time limit for transactions. If no value is provided the auto importer is used
    #[clap(short, long, value_parser = parse_datetime)]
    pub from: Option<DateTime<Utc>>,

    /// End time limit for transactions. Defaults to now ('--from' needs to be defined)
    #[clap(short, long, value_parser = parse_datetime)]
    pub to: Option<DateTime<Utc>>,

    /// Reset the auto importer so its next run only imports transactions from now on
    #[clap(long, conflicts_with_all = ["list", "from", "to"])]
    pub reset: bool,

    /// Only print the transactions instead of importing them.
    /// Starts at the last auto import if '--from' isn't given
    #[clap(short, long)]
    pub list: bool,
}

#[derive(Debug, PartialEq, Eq)]
pub enum Operation {
    AutoImport,
    Run {
        start: DateTime<Utc>,
        end: Option<DateTime<Utc>>,
    },
    Reset,
    List {
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    },
}

impl Args {
    pub fn operation(&self) -> Result<Operation> {
        if self.reset {
            return Ok(Operation::Reset);
        }
        if self.list {
            return Ok(Operation::List {
                start: self.from,
                end: self.to,
            });
        }
        match (self.from, self.to) {
            (Some(start), end) => Ok(Operation::Run { start, end }),
            (None, Some(_)) => {
                bail!("Please provide a 'from' date as well when using the 'to' date")
            }
            (None, None) => Ok(Operation::AutoImport),
        }
    }
}

pub fn parse() -> Args {
    Args::parse()
}

/// Accepts RFC 3339, or a date or datetime without offset which is taken as local time
pub fn parse_datetime(input: &str) -> Result<DateTime<Utc>, String> {
    if let Ok(datetime) = DateTime::parse_from_rfc3339(input) {
        return Ok(datetime.with_timezone(&Utc));
    }
    if let Ok(datetime) = DateTime::parse_from_str(input, "%Y-%m-%dT%H:%M%:z") {
        return Ok(datetime.with_timezone(&Utc));
    }
    let naive = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(input, format).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(input, "%Y-%m-%d")
                .ok()
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })
        .ok_or_else(|| format!("'{input}' is not an ISO 8601 date or datetime"))?;
    Local
        .from_local_datetime(&naive)
        .earliest()
        .map(|local| local.with_timezone(&Utc))
        .ok_or_else(|| format!("'{input}' doesn't exist in the local timezone"))
}
