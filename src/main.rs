use anyhow::{Context, Result};
use rand::{rngs::StdRng, SeedableRng};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use reefer_fleet_sim::{
    config::Config,
    fleet::{generate_fleet, FleetRegistry},
    simulation::{EngineError, SimulationEngine},
    telemetry,
};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    telemetry::init_tracing();

    let cfg = Config::load().context("loading configuration")?;

    let engine_cfg = cfg.engine_config();
    let mut rng = StdRng::seed_from_u64(cfg.simulation.seed);
    let fleet = generate_fleet(cfg.simulation.fleet_size, engine_cfg.start_time, &mut rng);
    let registry = Arc::new(FleetRegistry::from_vehicles(fleet)?);

    let mut engine = SimulationEngine::builder(engine_cfg)
        .registry(registry)
        .motion(cfg.motion.clone())
        .environment(cfg.environment_provider()?)
        .reading_sink(cfg.reading_sink()?)
        .alert_channel(cfg.alert_channel()?)
        .build()
        .context("building simulation engine")?;

    info!(
        vehicles = cfg.simulation.fleet_size,
        provider = %cfg.environment.provider,
        readings = %cfg.sinks.readings.kind,
        alerts = %cfg.sinks.alerts.kind,
        "starting reefer fleet simulator"
    );

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            telemetry::shutdown_signal().await;
            cancel.cancel();
        });
    }

    #[cfg(feature = "api")]
    let server = if cfg.server.enabled {
        use reefer_fleet_sim::api;

        let state = api::AppState::new(engine.registry(), engine.history());
        let app = api::router(state, &cfg.server);
        let addr = cfg.server.socket_addr()?;
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .with_context(|| format!("binding {addr}"))?;
        info!(%addr, "status API listening");

        let shutdown = cancel.clone();
        Some(tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move { shutdown.cancelled().await })
                .await
        }))
    } else {
        None
    };

    let outcome = engine.run(cancel.clone()).await;
    cancel.cancel();

    #[cfg(feature = "api")]
    {
        if let Some(server) = server {
            match server.await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!(error = %e, "status API stopped with error"),
                Err(e) => warn!(error = %e, "status API task failed"),
            }
        }
    }

    match outcome {
        Ok(summary) => {
            info!(
                ticks = summary.ticks,
                readings = summary.readings,
                alerts = summary.alerts,
                excluded = summary.excluded,
                "shutdown complete"
            );
            Ok(())
        }
        Err(e @ EngineError::FleetExhausted { .. }) => {
            error!(error = %e, "simulation halted");
            Err(e.into())
        }
        Err(e) => Err(e.into()),
    }
}
