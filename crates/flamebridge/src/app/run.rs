//! Process lifecycle: open devices, tick until told to stop, black out

use anyhow::{Context, Result};
use std::future::Future;
use std::time::{Duration, Instant};
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};

use flamebridge_control::{DmxSource, EnttecInput, SacnTransport, UniverseSink};
use flamebridge_core::BridgeConfig;

use super::bridge::Bridge;

/// Run the bridge on a single-threaded runtime until interrupted
pub fn run(config: BridgeConfig, debug: bool) -> Result<()> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to start runtime")?;
    runtime.block_on(run_bridge(config, debug))
}

async fn run_bridge(config: BridgeConfig, debug: bool) -> Result<()> {
    // Without the widget the fire keeps burning on the built-in defaults
    let input = match EnttecInput::open(&config.input) {
        Ok(input) => Some(input),
        Err(e) => {
            error!("DMX input unavailable, running without console control: {}", e);
            None
        }
    };
    let output = SacnTransport::new(&config.output).context("Cannot create sACN output")?;

    let mut bridge = Bridge::new(&config, input, output, Instant::now())
        .context("Invalid configuration")?
        .with_debug(debug);

    let period = Duration::from_secs(1) / config.timing.target_fps.max(1);
    let debug_note = if debug {
        " (debug values every 10 ticks)"
    } else {
        ""
    };
    info!(
        "Running at {} FPS{}. Press Ctrl+C to stop",
        config.timing.target_fps, debug_note
    );

    drive(&mut bridge, period, shutdown_signal()).await;

    bridge.shutdown();
    info!("Stopped after {} ticks", bridge.metrics().total_ticks());
    Ok(())
}

/// Tick every `period` until `stop` resolves; late ticks are skipped, not bunched
pub async fn drive<I, O>(bridge: &mut Bridge<I, O>, period: Duration, stop: impl Future<Output = ()>)
where
    I: DmxSource,
    O: UniverseSink,
{
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    tokio::pin!(stop);
    loop {
        tokio::select! {
            () = &mut stop => break,
            instant = interval.tick() => {
                bridge.tick(instant.into_std());
            }
        }
    }
}

/// Resolves on Ctrl+C, or on SIGTERM from a service manager
async fn shutdown_signal() {
    let interrupt = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C, stopping: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = interrupt => info!("Interrupted, stopping"),
        () = terminate => info!("Terminated, stopping"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::test_support::{frame, small_config, RecordingSink, ScriptedSource};

    #[tokio::test]
    async fn test_drive_ticks_until_stopped() {
        let mut bridge = Bridge::new(
            &small_config(),
            None::<ScriptedSource>,
            RecordingSink::default(),
            Instant::now(),
        )
        .unwrap();

        drive(
            &mut bridge,
            Duration::from_millis(5),
            tokio::time::sleep(Duration::from_millis(60)),
        )
        .await;

        let ticks = bridge.metrics().total_ticks();
        assert!(ticks >= 2, "only {} ticks", ticks);
        assert_eq!(bridge.output().sent.len() as u64, ticks);
    }

    #[tokio::test]
    async fn test_stop_then_blackout() {
        let source = ScriptedSource::new(vec![Ok(vec![frame(&[(6, 255), (7, 255), (8, 255)])])]);
        let mut bridge = Bridge::new(
            &small_config(),
            Some(source),
            RecordingSink::default(),
            Instant::now(),
        )
        .unwrap();

        drive(
            &mut bridge,
            Duration::from_millis(5),
            tokio::time::sleep(Duration::from_millis(40)),
        )
        .await;
        bridge.shutdown();

        let sent = &bridge.output().sent;
        assert!(sent.len() >= 2);
        assert!(sent[sent.len() - 2].data.iter().any(|&v| v > 0));
        assert_eq!(sent[sent.len() - 1].data, vec![0; 24]);
        assert!(!bridge.has_input());
    }
}
