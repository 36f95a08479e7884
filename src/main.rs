use std::io::BufRead;
use std::sync::Arc;

use anyhow::Context;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use riskwatch::kernel::event::{Command, Event};
use riskwatch::kernel::time::SystemClock;
use riskwatch::kernel::view::WorkflowView;
use riskwatch::services::assessment::Decision;
use riskwatch::{AssessmentBackend, AssessmentClient, MonitorConfig, Reactor};

const HELP: &str = "Commands: next | confirm | dismiss | refresh | state | frames | current | quit";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Setup Logging
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = FmtSubscriber::builder().with_env_filter(filter).finish();
    tracing::subscriber::set_global_default(subscriber).context("setting default subscriber failed")?;

    let config = MonitorConfig::from_env().context("loading configuration")?;
    tracing::info!("Starting riskwatch against {}", config.api_base);

    // 2. Backend
    let backend = Arc::new(AssessmentClient::new(config.api_base.clone()));
    match backend.health().await {
        Ok(health) => tracing::info!("Backend health: {}", health.status),
        Err(e) => tracing::warn!("{} ({}); continuing", e, e.detail()),
    }

    // 3. Reactor + Channels
    let (tx, rx) = mpsc::channel(100);
    let mut reactor = Reactor::new(rx, tx.clone(), backend.clone(), Arc::new(SystemClock), config);
    let shutdown = CancellationToken::new();

    tokio::spawn(render(reactor.subscribe()));

    // 4. Operator input (stdin)
    let input_shutdown = shutdown.clone();
    let views = reactor.subscribe();
    let mut lines = stdin_lines();
    tokio::spawn(async move {
        println!("{}", HELP);

        while let Some(line) = lines.recv().await {
            let command = match line.trim().to_ascii_lowercase().as_str() {
                "" => continue,
                "n" | "next" => Command::Analyze,
                "r" | "refresh" => Command::Refresh,
                "c" | "confirm" => Command::Verify(Decision::Confirm),
                "d" | "dismiss" | "false_alarm" => Command::Verify(Decision::FalseAlarm),
                "s" | "state" => {
                    println!("{}", *views.borrow());
                    continue;
                }
                "f" | "frames" => {
                    match backend.list_frames().await {
                        Ok(list) => println!("frames: {}", list.frames.join(", ")),
                        Err(e) => tracing::warn!("{} ({})", e, e.detail()),
                    }
                    continue;
                }
                "current" => {
                    match backend.current_frame().await {
                        Ok(resp) => println!("backend cursor: {}", resp.current.as_deref().unwrap_or("-")),
                        Err(e) => tracing::warn!("{} ({})", e, e.detail()),
                    }
                    continue;
                }
                "q" | "quit" | "exit" => {
                    input_shutdown.cancel();
                    break;
                }
                other => {
                    println!("Unknown command '{}'. {}", other, HELP);
                    continue;
                }
            };

            tracing::debug!("Console command: {:?}", command);
            if tx.send(Event::Command(command)).await.is_err() {
                break;
            }
        }
    });

    let signal_shutdown = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupt received, shutting down");
        }
        signal_shutdown.cancel();
    });

    // 5. Run
    reactor.run(shutdown).await;
    Ok(())
}

/// Reads stdin on a detached thread so a pending read never holds up
/// runtime shutdown.
fn stdin_lines() -> mpsc::Receiver<String> {
    let (tx, rx) = mpsc::channel(16);
    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            if tx.blocking_send(line).is_err() {
                break;
            }
        }
    });
    rx
}

/// Prints the view on every change. Countdown-only changes print one line.
async fn render(mut views: watch::Receiver<WorkflowView>) {
    let mut last: Option<WorkflowView> = None;

    while views.changed().await.is_ok() {
        let view = views.borrow_and_update().clone();

        let countdown_only = last.as_ref().is_some_and(|prev| {
            prev.seconds_left != view.seconds_left
                && WorkflowView { seconds_left: view.seconds_left, ..prev.clone() } == view
        });

        if countdown_only {
            if let Some(left) = view.seconds_left {
                println!("Time left: {}s", left);
            }
        } else if last.as_ref() != Some(&view) {
            println!("{}\n", view);
        }

        last = Some(view);
    }
}
