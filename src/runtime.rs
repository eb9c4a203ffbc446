//! Control loop runtime — one thread, two cooperative tasks.
//!
//! Runs in a dedicated thread using `edge-executor` for task scheduling and
//! `async-io-mini` for reactor-driven timers.  Two futures share the
//! thread:
//!
//! 1. **Ingest** — awaits the [`SampleFeed`] channel and publishes each
//!    sample into the arbiter's [`SampleCache`] (single writer).
//! 2. **Control** — applies pending operator commands, ticks the arbiter,
//!    then sleeps until the next period boundary (single reader).
//!
//! ```text
//!  ┌──────────────────────────────────────────────────────────┐
//!  │  Control thread                                          │
//!  │  ┌────────────────────────────────────────────────────┐  │
//!  │  │  futures_lite::future::block_on                    │  │
//!  │  │  ┌──────────────────────────────────────────────┐  │  │
//!  │  │  │  edge_executor::LocalExecutor                │  │  │
//!  │  │  │  ┌──────────────┐      ┌─────────────────┐   │  │  │
//!  │  │  │  │ Ingest       │      │ Control         │   │  │  │
//!  │  │  │  │ wake-on-push │      │ period ⏱        │   │  │  │
//!  │  │  │  └──────────────┘      └─────────────────┘   │  │  │
//!  │  │  └──────────────────────────────────────────────┘  │  │
//!  │  └────────────────────────────────────────────────────┘  │
//!  └──────────────────────────────────────────────────────────┘
//! ```
//!
//! Stopping the loop hands the arbiter and its adapters back to the caller.
//! The last dispatched power stays readable through [`PowerMonitor`]; the
//! loop never zeros the fan on the way out.

use core::time::Duration;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::Instant;

use anyhow::{Context, Result, anyhow};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use log::{info, warn};

use crate::app::commands::OperatorCommand;
use crate::app::ports::{ActuationLink, Clock, EventSink, HistorySink};
use crate::app::service::ControlArbiter;
use crate::sensors::{PowerMonitor, SampleCache, SampleFeed};

/// Pending operator commands between two ticks.
pub const COMMAND_DEPTH: usize = 8;

type CommandChannel = Channel<CriticalSectionRawMutex, OperatorCommand, COMMAND_DEPTH>;

/// The adapters the control task drives.
pub struct LoopIo<L, H, E, C> {
    pub link: L,
    pub history: H,
    pub events: E,
    pub clock: C,
}

/// Cloneable producer handle for operator commands.
#[derive(Clone)]
pub struct CommandSender {
    channel: Arc<CommandChannel>,
}

impl CommandSender {
    /// Queue a command for the next tick.  `false` if the queue is full.
    pub fn submit(&self, cmd: OperatorCommand) -> bool {
        match self.channel.try_send(cmd) {
            Ok(()) => true,
            Err(_) => {
                warn!("RUNTIME: command queue full, dropping command");
                false
            }
        }
    }
}

/// Owner-side handle to a running control loop.
pub struct ControlLoopHandle<L, H, E, C> {
    stop: Arc<AtomicBool>,
    join: JoinHandle<(ControlArbiter, LoopIo<L, H, E, C>)>,
    power: PowerMonitor,
    commands: CommandSender,
    feed: SampleFeed,
}

impl<L, H, E, C> ControlLoopHandle<L, H, E, C> {
    pub fn feed(&self) -> SampleFeed {
        self.feed.clone()
    }

    pub fn commands(&self) -> CommandSender {
        self.commands.clone()
    }

    pub fn power_monitor(&self) -> PowerMonitor {
        self.power.clone()
    }

    pub fn is_running(&self) -> bool {
        !self.join.is_finished()
    }

    /// Stop after the current tick and take the arbiter back.
    pub fn stop(self) -> Result<(ControlArbiter, LoopIo<L, H, E, C>)> {
        self.stop.store(true, Ordering::Release);
        self.join
            .join()
            .map_err(|_| anyhow!("control thread panicked"))
    }
}

// ── Tasks ─────────────────────────────────────────────────────

/// Ingest task — wakes when the link reader pushes a sample.
async fn ingest_loop(feed: SampleFeed, cache: Arc<SampleCache>) {
    loop {
        let sample = feed.receive().await;
        cache.publish(sample);
    }
}

/// Control task — ticks until `stop` is raised, then returns its state.
async fn control_loop<L, H, E, C>(
    mut arbiter: ControlArbiter,
    mut io: LoopIo<L, H, E, C>,
    commands: Arc<CommandChannel>,
    stop: Arc<AtomicBool>,
    period: Duration,
) -> (ControlArbiter, LoopIo<L, H, E, C>)
where
    L: ActuationLink,
    H: HistorySink,
    E: EventSink,
    C: Clock,
{
    arbiter.start(&mut io.events);
    let mut next = Instant::now();
    while !stop.load(Ordering::Acquire) {
        while let Ok(cmd) = commands.try_receive() {
            arbiter.handle_command(cmd, &mut io.link, &mut io.events);
        }
        arbiter.tick(&io.clock, &mut io.link, &mut io.history, &mut io.events);

        next += period;
        let now = Instant::now();
        if next <= now {
            // Overran; realign instead of bursting to catch up.
            next = now;
            futures_lite::future::yield_now().await;
        } else {
            async_io_mini::Timer::after(next - now).await;
        }
    }
    info!("RUNTIME: control loop stopped after {} ticks", arbiter.tick_count());
    (arbiter, io)
}

// ── Thread spawn ──────────────────────────────────────────────

/// Spawn the control thread.
///
/// `period` is normally `ArbiterConfig::control_period_ms`.  The arbiter is
/// started inside the thread.
pub fn spawn<L, H, E, C>(
    arbiter: ControlArbiter,
    io: LoopIo<L, H, E, C>,
    period: Duration,
) -> Result<ControlLoopHandle<L, H, E, C>>
where
    L: ActuationLink + Send + 'static,
    H: HistorySink + Send + 'static,
    E: EventSink + Send + 'static,
    C: Clock + Send + 'static,
{
    let stop = Arc::new(AtomicBool::new(false));
    let commands = Arc::new(CommandChannel::new());
    let feed = SampleFeed::new();
    let power = arbiter.power_monitor();
    let period = period.max(Duration::from_millis(1));

    let join = std::thread::Builder::new()
        .name("control".into())
        .spawn({
            let stop = Arc::clone(&stop);
            let commands = Arc::clone(&commands);
            let feed = feed.clone();
            move || {
                let executor: edge_executor::LocalExecutor<'_, 4> =
                    edge_executor::LocalExecutor::new();
                executor.spawn(ingest_loop(feed, arbiter.cache())).detach();
                info!("RUNTIME: control loop started ({} ms period)", period.as_millis());
                futures_lite::future::block_on(
                    executor.run(control_loop(arbiter, io, commands, stop, period)),
                )
            }
        })
        .context("spawning control thread")?;

    Ok(ControlLoopHandle {
        stop,
        join,
        power,
        commands: CommandSender { channel: commands },
        feed,
    })
}
