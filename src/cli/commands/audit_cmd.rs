//! `credvault audit` — list committed credential changes.
//!
//!   credvault audit --last 20
//!   credvault audit --since 7d --user alice
//!   credvault audit --since 2026-01-01T00:00:00Z

use chrono::{DateTime, TimeDelta, Utc};

use crate::cli::Cli;
use crate::errors::{CredVaultError, Result};

/// Execute the `audit` command.
#[cfg(feature = "audit-log")]
pub fn execute(cli: &Cli, last: usize, since: Option<&str>, user: Option<&str>) -> Result<()> {
    use crate::audit::{AuditTrail, Filter};
    use crate::cli::{open_store, output};

    let filter = Filter {
        limit: last,
        since: since.map(|s| parse_since(s, Utc::now())).transpose()?,
        subject: user.map(str::to_string),
    };

    let (_settings, store) = open_store(cli)?;
    let trail_path = AuditTrail::path_for(store.path());
    if !trail_path.exists() {
        output::info("No changes recorded yet.");
        return Ok(());
    }

    let rows = AuditTrail::open(store.path())?.recent(&filter)?;
    if rows.is_empty() {
        output::info("No changes match.");
        return Ok(());
    }

    print_changes(&rows);
    Ok(())
}

#[cfg(not(feature = "audit-log"))]
pub fn execute(cli: &Cli, last: usize, since: Option<&str>, user: Option<&str>) -> Result<()> {
    let _ = (cli, last, since, user);
    Err(CredVaultError::AuditError(
        "this build has no audit trail (enable the `audit-log` feature)".into(),
    ))
}

/// Resolve `--since` to an instant: either `<n><unit>` before `now`
/// (units `s`, `m`, `h`, `d`, `w`) or an RFC 3339 timestamp.
#[cfg_attr(not(feature = "audit-log"), allow(dead_code))]
fn parse_since(input: &str, now: DateTime<Utc>) -> Result<DateTime<Utc>> {
    let input = input.trim();
    let bad = || {
        CredVaultError::CommandFailed(format!(
            "invalid --since value '{input}': use 30m, 24h, 7d, 2w or an RFC 3339 time"
        ))
    };

    if let Ok(at) = DateTime::parse_from_rfc3339(input) {
        return Ok(at.with_timezone(&Utc));
    }

    let unit_at = input
        .find(|c: char| !c.is_ascii_digit())
        .ok_or_else(bad)?;
    let (amount, unit) = input.split_at(unit_at);
    let amount: i64 = amount.parse().map_err(|_| bad())?;

    let span = match unit {
        "s" => TimeDelta::try_seconds(amount),
        "m" => TimeDelta::try_minutes(amount),
        "h" => TimeDelta::try_hours(amount),
        "d" => TimeDelta::try_days(amount),
        "w" => TimeDelta::try_weeks(amount),
        _ => None,
    }
    .ok_or_else(bad)?;

    now.checked_sub_signed(span).ok_or_else(bad)
}

#[cfg(feature = "audit-log")]
fn print_changes(rows: &[crate::audit::Recorded]) {
    use comfy_table::{ContentArrangement, Table};
    use console::style;

    use crate::audit::Action;

    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["#", "When (UTC)", "Action", "User", "Users after", "Note"]);

    for row in rows {
        let action = match row.action {
            Some(a @ (Action::RemoveUser | Action::RotateKey)) => style(a).yellow().to_string(),
            Some(a) => a.to_string(),
            None => style("unknown").dim().to_string(),
        };
        table.add_row(vec![
            row.seq.to_string(),
            row.at.format("%Y-%m-%d %H:%M:%S").to_string(),
            action,
            row.subject.clone().unwrap_or_default(),
            row.users_after.to_string(),
            row.note.clone().unwrap_or_default(),
        ]);
    }

    println!("{table}");
}
