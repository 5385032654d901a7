use std::fs;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use botflow_engine::{
    Caller, Catalogue, Engine, EngineConfig, KeyboardKind, MemoryLocalization, MemorySessionStore,
    RenderedReply, StaticSpecLoader,
};
use clap::Args;
use tracing::info;

use super::{ensure_valid, load_spec, print_report};

#[derive(Args, Debug, Clone)]
pub struct ChatArgs {
    /// Bot spec to run
    #[arg(value_name = "SPEC")]
    pub spec: PathBuf,
    #[arg(long = "bot-id", default_value_t = 1)]
    pub bot_id: i64,
    #[arg(long = "user-id", default_value_t = 1)]
    pub user_id: i64,
    /// Stored user locale, used when the spec selects locales per user
    #[arg(long = "locale", value_name = "LOCALE")]
    pub locale: Option<String>,
    /// Engine settings as TOML
    #[arg(long = "config", value_name = "config.toml")]
    pub config: Option<PathBuf>,
    /// Message catalogue as `locale=file.json`; repeatable
    #[arg(long = "catalog", value_name = "LOCALE=FILE")]
    pub catalogs: Vec<String>,
}

pub fn run(args: ChatArgs) -> Result<()> {
    let (spec, report) = load_spec(&args.spec)?;
    print_report(&report);
    ensure_valid(&args.spec, &report)?;

    let config = match &args.config {
        Some(path) => {
            let raw = fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
            EngineConfig::from_toml_str(&raw).with_context(|| format!("invalid config {}", path.display()))?
        }
        None => EngineConfig::default(),
    };

    let localization = MemoryLocalization::new();
    for entry in &args.catalogs {
        let (locale, catalogue) = load_catalog(entry)?;
        localization.set_catalogue(args.bot_id, &locale, catalogue);
    }
    if let Some(locale) = &args.locale {
        localization.set_user_locale(args.bot_id, args.user_id, locale.clone());
    }

    let specs = Arc::new(StaticSpecLoader::new().with_spec(args.bot_id, spec));
    let engine = Engine::builder(specs, Arc::new(MemorySessionStore::new()))
        .config(config)
        .localization(Arc::new(localization))
        .build();
    let caller = Caller::new(args.bot_id, args.user_id);
    info!(bot_id = caller.bot_id, user_id = caller.user_id, "chat session started");

    let runtime = tokio::runtime::Runtime::new().context("failed to start async runtime")?;
    let stdin = io::stdin();
    let mut stdout = io::stdout().lock();
    for line in stdin.lock().lines() {
        let line = line.context("failed to read stdin")?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match line.strip_prefix("cb ") {
            Some(token) => match runtime.block_on(engine.handle_callback_as(caller, token.trim())) {
                Some(reply) => print_reply(&mut stdout, &reply)?,
                None => writeln!(stdout, "(no reply)")?,
            },
            None => {
                let reply = runtime.block_on(engine.handle_as(caller, line));
                print_reply(&mut stdout, &reply)?;
            }
        }
        stdout.flush()?;
    }
    info!(metrics = ?engine.metrics(), "chat session ended");
    Ok(())
}

fn load_catalog(entry: &str) -> Result<(String, Catalogue)> {
    let (locale, path) = entry
        .split_once('=')
        .ok_or_else(|| anyhow!("catalog `{entry}` must look like locale=file.json"))?;
    let raw = fs::read_to_string(path).with_context(|| format!("failed to read {path}"))?;
    let catalogue: Catalogue =
        serde_json::from_str(&raw).with_context(|| format!("catalog {path} is not a string map"))?;
    Ok((locale.trim().to_string(), catalogue))
}

fn print_reply(out: &mut impl Write, reply: &RenderedReply) -> Result<()> {
    writeln!(out, "{}", reply.text)?;
    let Some(keyboard) = &reply.keyboard else {
        return Ok(());
    };
    for row in &keyboard.rows {
        let buttons: Vec<String> = row
            .iter()
            .map(|button| match (&button.callback_token, keyboard.kind) {
                (Some(token), KeyboardKind::Inline) => format!("[{} -> {token}]", button.label),
                _ => format!("[{}]", button.label),
            })
            .collect();
        writeln!(out, "  {}", buttons.join(" "))?;
    }
    Ok(())
}
