//! Plan Agent 命令行入口
//!
//! 初始化日志与配置，逐行读取 stdin 调用 `chat`，流式打印回复。
//! `--debug` 打印过程记录，`--config <path>` 追加配置文件，输入 `/quit` 退出。

use std::io::Write;
use std::path::PathBuf;

use anyhow::Context;
use plan_agent::config::{load_config, AppConfig};
use plan_agent::{observability, AgentBuilder, AgentEvent};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

struct Args {
    debug: bool,
    config: Option<PathBuf>,
}

fn parse_args() -> Args {
    let mut args = Args {
        debug: false,
        config: None,
    };
    let mut it = std::env::args().skip(1);
    while let Some(arg) = it.next() {
        match arg.as_str() {
            "--debug" => args.debug = true,
            "--config" => args.config = it.next().map(PathBuf::from),
            other => eprintln!("ignoring unknown argument: {other}"),
        }
    }
    args
}

fn print_event(event: AgentEvent) {
    let mut out = std::io::stdout();
    match event {
        AgentEvent::Transcript { line } => {
            let _ = writeln!(out, "{line}");
        }
        AgentEvent::ResponseChunk { text } => {
            let _ = write!(out, "{text}");
        }
        AgentEvent::ResponseDone => {
            let _ = writeln!(out);
        }
        AgentEvent::Phase { .. } => {}
    }
    let _ = out.flush();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    observability::init();
    let args = parse_args();

    let cfg = load_config(args.config.clone()).unwrap_or_else(|e| {
        tracing::warn!("Config load failed ({}), using defaults", e);
        AppConfig::default()
    });

    let (event_tx, mut event_rx) = mpsc::unbounded_channel::<AgentEvent>();

    let mut agent = AgentBuilder::new(cfg)
        .with_event_tx(event_tx)
        .build()
        .context("Failed to create agent")?;
    tracing::info!(session = agent.session_id(), "session started");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("> ");
        std::io::stdout().flush().ok();
        let Some(line) = lines.next_line().await.context("read stdin")? else {
            break;
        };
        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        if input == "/quit" {
            break;
        }

        // 边生成边打印事件
        let chat = agent.chat(input, args.debug);
        tokio::pin!(chat);
        let result = loop {
            tokio::select! {
                result = &mut chat => break result,
                Some(event) = event_rx.recv() => print_event(event),
            }
        };
        while let Ok(event) = event_rx.try_recv() {
            print_event(event);
        }
        if let Err(e) = result {
            tracing::error!(error = %e, "chat failed");
            eprintln!("Error: {e}");
        }
    }

    Ok(())
}
