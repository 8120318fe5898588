//! Sessions command - inspect and maintain stored sessions.

use anyhow::{Result, bail};
use chrono::{TimeDelta, Utc};
use clap::{Args, Subcommand};
use console::{Style, style};
use serde_json::json;
use shiny_session::UserKey;
use tracing::debug;

use super::Context;

/// Arguments for the sessions command.
#[derive(Args, Debug)]
pub struct SessionsArgs {
    #[command(subcommand)]
    pub command: SessionsCommand,
}

#[derive(Subcommand, Debug)]
pub enum SessionsCommand {
    /// List stored sessions
    List {
        /// Only sessions belonging to this user
        #[arg(short, long)]
        user: Option<String>,

        /// Maximum sessions to show
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },

    /// Show one session
    Show {
        /// Session identifier
        id: String,
    },

    /// Refresh the last access time of sessions through the cache
    Touch {
        /// Session identifiers
        #[arg(required = true)]
        ids: Vec<String>,
    },

    /// Delete a session from the store
    Delete {
        /// Session identifier
        id: String,
    },

    /// Delete sessions idle for longer than the given number of seconds
    Prune {
        /// Idle threshold in seconds
        #[arg(long)]
        idle_secs: u64,
    },
}

/// Run the sessions command.
pub fn run(args: SessionsArgs, ctx: &Context) -> Result<()> {
    match args.command {
        SessionsCommand::List { user, limit } => cmd_list(user, limit, ctx),
        SessionsCommand::Show { id } => cmd_show(&id, ctx),
        SessionsCommand::Touch { ids } => cmd_touch(&ids, ctx),
        SessionsCommand::Delete { id } => cmd_delete(&id, ctx),
        SessionsCommand::Prune { idle_secs } => cmd_prune(idle_secs, ctx),
    }
}

fn cmd_list(user: Option<String>, limit: usize, ctx: &Context) -> Result<()> {
    let store = ctx.open_store()?;
    let dim = Style::new().dim();

    if let Some(user) = user {
        let ids: Vec<String> = store
            .ids_for_user(&UserKey::new(user.as_str()))?
            .into_iter()
            .take(limit)
            .collect();
        if ctx.json_output {
            println!("{}", serde_json::to_string_pretty(&ids)?);
        } else if ids.is_empty() {
            println!("{}", dim.apply_to(format!("No sessions for {user}")));
        } else {
            for id in &ids {
                println!("{id}");
            }
        }
        return Ok(());
    }

    let sessions = store.list(limit)?;
    if ctx.json_output {
        let rows: Vec<_> = sessions
            .iter()
            .map(|s| {
                json!({
                    "id": s.id,
                    "user": s.user,
                    "created": s.created,
                    "last_access": s.last_access,
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&rows)?);
    } else if sessions.is_empty() {
        println!("{}", dim.apply_to("No stored sessions"));
    } else {
        println!("{}", style("Stored Sessions").bold());
        println!("{}", dim.apply_to("─".repeat(50)));
        for s in &sessions {
            let user = s.user.as_ref().map_or("anonymous", UserKey::as_str);
            println!(
                "{}  {}  {}",
                style(&s.id).cyan(),
                user,
                dim.apply_to(s.last_access.to_rfc3339())
            );
        }
        if ctx.verbose {
            println!();
            println!("{}", dim.apply_to(format!("{} total", store.count()?)));
        }
    }

    Ok(())
}

fn cmd_show(id: &str, ctx: &Context) -> Result<()> {
    let store = ctx.open_store()?;
    let cache = ctx.cache(&store);

    let Some(session) = cache.get(id)? else {
        bail!("Session not found: {id}");
    };
    let data = session.snapshot();

    if ctx.json_output {
        println!(
            "{}",
            serde_json::to_string_pretty(&json!({ "id": id, "session": data }))?
        );
        return Ok(());
    }

    let dim = Style::new().dim();
    println!("{}", style(id).bold());
    println!("{}", dim.apply_to("─".repeat(50)));
    println!(
        "  user            {}",
        data.user.as_ref().map_or("anonymous", UserKey::as_str)
    );
    println!("  created         {}", data.created.to_rfc3339());
    println!("  last access     {}", data.last_access.to_rfc3339());
    if let Some(addr) = &data.last_remote_addr {
        println!("  remote address  {addr}");
    }
    if let Some(newer) = &data.superseded_by {
        println!("  superseded by   {newer}");
    }
    if !data.attributes.is_empty() {
        println!("  attributes");
        for (key, value) in &data.attributes {
            println!("    {key} = {value}");
        }
    }

    Ok(())
}

fn cmd_touch(ids: &[String], ctx: &Context) -> Result<()> {
    let store = ctx.open_store()?;
    let cache = ctx.cache(&store);

    let mut touched = 0;
    let mut missing = Vec::new();
    for id in ids {
        match cache.get(id)? {
            Some(session) => {
                cache.set(&session)?;
                touched += 1;
            }
            None => missing.push(id.clone()),
        }
    }

    let stats = cache.stats();
    debug!(cached = stats.size, capacity = %stats.capacity, "Touch complete");
    cache.purge_all();

    if ctx.json_output {
        println!(
            "{}",
            serde_json::to_string_pretty(&json!({ "touched": touched, "missing": missing }))?
        );
    } else {
        println!("Touched {touched} session(s)");
        for id in &missing {
            let red = Style::new().red();
            eprintln!("{} {}", red.apply_to("Not found:"), id);
        }
    }

    Ok(())
}

fn cmd_delete(id: &str, ctx: &Context) -> Result<()> {
    let store = ctx.open_store()?;

    if store.delete(id)? {
        println!("Deleted {id}");
    } else {
        bail!("Session not found: {id}");
    }
    Ok(())
}

fn cmd_prune(idle_secs: u64, ctx: &Context) -> Result<()> {
    let store = ctx.open_store()?;

    let idle = TimeDelta::try_seconds(i64::try_from(idle_secs)?)
        .ok_or_else(|| anyhow::anyhow!("idle threshold too large: {idle_secs}"))?;
    let removed = store.delete_idle_before(Utc::now() - idle)?;

    if ctx.json_output {
        println!("{}", json!({ "removed": removed }));
    } else {
        println!("Removed {removed} idle session(s)");
    }
    Ok(())
}
