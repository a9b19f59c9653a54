use crate::api::PortalApi;
use crate::config::Config;
use crate::diagnostics::Diagnostics;
use crate::Args;
use anyhow::{anyhow, Result};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use serde_json::Value;
use std::cell::RefCell;
use std::rc::Rc;

pub struct Context {
    pub args: Args,
    pub config: Config,
    pub api: RefCell<PortalApi>,
    pub diagnostics: Rc<RefCell<Diagnostics>>,
    pub session_id: String,
}

pub fn run_once(ctx: &Context, command: &str) -> Result<()> {
    dispatch(ctx, command)
}

pub fn run_repl(ctx: Context) -> Result<()> {
    let mut rl = DefaultEditor::new()?;
    let history = ctx.config.state_dir().join("history.txt");
    let _ = rl.load_history(&history);

    println!("portalctl - type /help for commands, /exit to quit");

    loop {
        match rl.readline("portal> ") {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                rl.add_history_entry(line)?;

                if matches!(line, "/exit" | "/quit" | "exit" | "quit") {
                    break;
                }
                if let Err(e) = dispatch(&ctx, line) {
                    eprintln!("Error: {:#}", e);
                }
            }
            Err(ReadlineError::Interrupted | ReadlineError::Eof) => break,
            Err(e) => {
                eprintln!("Input error: {}", e);
                break;
            }
        }
    }

    let _ = rl.save_history(&history);
    Ok(())
}

fn dispatch(ctx: &Context, line: &str) -> Result<()> {
    let line = line.strip_prefix('/').unwrap_or(line);
    let tokens = shell_words::split(line)?;
    let Some((command, args)) = tokens.split_first() else {
        return Ok(());
    };

    match command.as_str() {
        "help" => {
            print_help();
            Ok(())
        }
        "login" => cmd_login(ctx, args),
        "channels" => cmd_channels(ctx, args),
        "movies" => cmd_movies(ctx, args),
        "series" => cmd_series(ctx, args),
        "link" => cmd_link(ctx, args),
        "epg" => cmd_epg(ctx, args),
        "profile" => cmd_profile(ctx),
        "test" => cmd_test(ctx),
        "session" => cmd_session(ctx),
        "diag" => cmd_diag(ctx, args),
        "refresh" => cmd_refresh(ctx),
        "logout" => cmd_logout(ctx),
        other => Err(anyhow!("unknown command '{}', try /help", other)),
    }
}

fn print_help() {
    println!("Commands:");
    println!("  /login [portal] [mac]    - authenticate against a portal");
    println!("  /channels [page]         - list TV channels");
    println!("  /movies [page]           - list movies");
    println!("  /series [page]           - list series");
    println!("  /link itv <cmd>          - resolve a channel stream link");
    println!("  /link vod <id> [episode] - resolve a movie/episode stream link");
    println!("  /epg <ch_id> [hours]     - programme guide for a channel");
    println!("  /profile                 - fetch the account profile");
    println!("  /test                    - test portal connectivity");
    println!("  /session                 - show session info");
    println!("  /diag [n|clear]          - show or clear request diagnostics");
    println!("  /refresh                 - refresh the token if expired");
    println!("  /logout                  - clear the session");
    println!("  /exit                    - quit");
}

/// Guard for content commands: the view layer's sole authentication check.
fn require_session(ctx: &Context) -> Result<()> {
    if ctx.api.borrow_mut().protect_page() {
        Ok(())
    } else {
        Err(anyhow!("not logged in or session expired; use /login"))
    }
}

fn parse_page(args: &[String]) -> Result<u32> {
    match args.first() {
        Some(raw) => raw
            .parse()
            .map_err(|_| anyhow!("page must be a number, got '{}'", raw)),
        None => Ok(1),
    }
}

fn cmd_login(ctx: &Context, args: &[String]) -> Result<()> {
    let mut api = ctx.api.borrow_mut();
    let (last_portal, last_mac) = api.auth().last_login();

    let portal = args
        .first()
        .cloned()
        .or_else(|| ctx.config.portal.clone())
        .or(last_portal)
        .ok_or_else(|| anyhow!("no portal URL; use /login <portal> <mac> or set it in config"))?;
    let mac = args
        .get(1)
        .cloned()
        .or_else(|| ctx.config.mac.clone())
        .or(last_mac)
        .ok_or_else(|| anyhow!("no MAC address; use /login <portal> <mac> or set it in config"))?;

    let outcome = api.login(&portal, &mac);
    if let Some(session) = outcome.session {
        println!("Logged in to {}", session.portal_url);
        println!("Token expires {}", session.token_expiry);
    } else {
        println!(
            "Login failed: {}",
            outcome.error.unwrap_or_else(|| "unknown error".to_string())
        );
    }
    Ok(())
}

fn cmd_channels(ctx: &Context, args: &[String]) -> Result<()> {
    require_session(ctx)?;
    let page = parse_page(args)?;
    let payload = ctx.api.borrow().get_channels(page)?;
    print_payload(ctx, &payload);
    Ok(())
}

fn cmd_movies(ctx: &Context, args: &[String]) -> Result<()> {
    require_session(ctx)?;
    let page = parse_page(args)?;
    let payload = ctx.api.borrow().get_movies(page)?;
    print_payload(ctx, &payload);
    Ok(())
}

fn cmd_series(ctx: &Context, args: &[String]) -> Result<()> {
    require_session(ctx)?;
    let page = parse_page(args)?;
    let payload = ctx.api.borrow().get_series(page)?;
    print_payload(ctx, &payload);
    Ok(())
}

fn cmd_link(ctx: &Context, args: &[String]) -> Result<()> {
    require_session(ctx)?;
    let kind = args.first().map(String::as_str).unwrap_or("");
    let payload = match kind {
        "itv" => {
            let cmd = args
                .get(1)
                .ok_or_else(|| anyhow!("usage: /link itv <cmd>"))?;
            ctx.api.borrow().get_channel_link(cmd)?
        }
        "vod" => {
            let id = args
                .get(1)
                .ok_or_else(|| anyhow!("usage: /link vod <id> [episode]"))?;
            match args.get(2) {
                Some(raw) => {
                    let episode = raw
                        .parse()
                        .map_err(|_| anyhow!("episode must be a number, got '{}'", raw))?;
                    ctx.api.borrow().get_series_link(id, episode)?
                }
                None => ctx.api.borrow().get_movie_link(id)?,
            }
        }
        _ => return Err(anyhow!("usage: /link <itv|vod> <id> [episode]")),
    };

    match payload.get("cmd").and_then(Value::as_str) {
        Some(cmd) => println!("{}", cmd.trim()),
        None => print_payload(ctx, &payload),
    }
    Ok(())
}

fn cmd_epg(ctx: &Context, args: &[String]) -> Result<()> {
    require_session(ctx)?;
    let ch_id = args
        .first()
        .ok_or_else(|| anyhow!("usage: /epg <ch_id> [hours]"))?;
    let hours = match args.get(1) {
        Some(raw) => raw
            .parse()
            .map_err(|_| anyhow!("hours must be a number, got '{}'", raw))?,
        None => 3,
    };
    let payload = ctx.api.borrow().get_epg(ch_id, hours)?;
    print_payload(ctx, &payload);
    Ok(())
}

fn cmd_profile(ctx: &Context) -> Result<()> {
    require_session(ctx)?;
    let payload = ctx.api.borrow().get_profile()?;
    print_payload(ctx, &payload);
    Ok(())
}

fn cmd_test(ctx: &Context) -> Result<()> {
    require_session(ctx)?;
    if ctx.api.borrow().test_connection() {
        println!("Portal reachable");
    } else {
        println!("Portal unreachable (see /diag for attempts)");
    }
    Ok(())
}

fn cmd_session(ctx: &Context) -> Result<()> {
    let api = ctx.api.borrow();
    match api.session() {
        Some(session) => {
            println!("Portal:  {}", session.portal_url);
            println!("MAC:     {}", session.mac_address);
            println!("Login:   {}", session.login_time);
            println!(
                "Expires: {}{}",
                session.token_expiry,
                if session.is_expired() { " (expired)" } else { "" }
            );
        }
        None => println!("Not logged in"),
    }
    println!("CLI session: {}", ctx.session_id);
    Ok(())
}

fn cmd_diag(ctx: &Context, args: &[String]) -> Result<()> {
    if args.first().map(String::as_str) == Some("clear") {
        ctx.diagnostics.borrow_mut().clear();
        println!("Diagnostics cleared");
        return Ok(());
    }
    let n = match args.first() {
        Some(raw) => raw
            .parse()
            .map_err(|_| anyhow!("count must be a number, got '{}'", raw))?,
        None => 20,
    };
    let diagnostics = ctx.diagnostics.borrow();
    if diagnostics.is_empty() {
        println!("No requests recorded");
        return Ok(());
    }
    for record in diagnostics.recent(n) {
        println!(
            "{} {:>4} {:>5}ms {} {}{}",
            if record.ok { "ok " } else { "ERR" },
            record
                .status
                .map(|s| s.to_string())
                .unwrap_or_else(|| "-".to_string()),
            record.duration_ms,
            record.method,
            record.url,
            record
                .error
                .as_deref()
                .map(|e| format!("  ({})", e))
                .unwrap_or_default(),
        );
    }
    println!(
        "{} recorded, {} failures",
        diagnostics.len(),
        diagnostics.failure_count()
    );
    Ok(())
}

fn cmd_refresh(ctx: &Context) -> Result<()> {
    if ctx.api.borrow_mut().refresh_token_if_needed() {
        println!("Session valid");
    } else {
        println!("Refresh failed; use /login");
    }
    Ok(())
}

fn cmd_logout(ctx: &Context) -> Result<()> {
    ctx.api.borrow_mut().logout();
    println!("Logged out");
    Ok(())
}

fn print_payload(ctx: &Context, payload: &Value) {
    if ctx.args.json {
        println!(
            "{}",
            serde_json::to_string_pretty(payload).unwrap_or_else(|_| payload.to_string())
        );
        return;
    }
    print_listing(payload);
}

/// Render an ordered-list payload as a table, or fall back to JSON for
/// shapes we do not recognize.
fn print_listing(payload: &Value) {
    let items = payload.get("data").and_then(Value::as_array);
    match items {
        Some(items) if !items.is_empty() => {
            for item in items {
                let number = item
                    .get("number")
                    .map(display_field)
                    .unwrap_or_else(|| "-".to_string());
                let name = item
                    .get("name")
                    .or_else(|| item.get("title"))
                    .map(display_field)
                    .unwrap_or_else(|| "<unnamed>".to_string());
                println!("{:>5}  {}", number, name);
            }
            if let Some(total) = payload.get("total_items") {
                println!("total: {}", display_field(total));
            }
        }
        _ => println!(
            "{}",
            serde_json::to_string_pretty(payload).unwrap_or_else(|_| payload.to_string())
        ),
    }
}

/// Portals return numbers both as JSON numbers and as strings.
fn display_field(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_page() {
        assert_eq!(parse_page(&[]).unwrap(), 1);
        assert_eq!(parse_page(&["7".to_string()]).unwrap(), 7);
        assert!(parse_page(&["x".to_string()]).is_err());
    }

    #[test]
    fn test_display_field_handles_numbers_and_strings() {
        assert_eq!(display_field(&serde_json::json!("12")), "12");
        assert_eq!(display_field(&serde_json::json!(12)), "12");
    }
}
