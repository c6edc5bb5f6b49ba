use anyhow::{Context, Result};
use led_node::actuator::{ActuatorDriver, LogPin, OutputPin, Polarity, SysfsPin};
use led_node::config::{GpioBackend, NodeConfig};
use led_node::link::{HostLink, LinkManager};
use led_node::session::{MqttSession, SessionManager};
use led_node::supervisor::{CommandDispatcher, Supervisor};

use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    let config = NodeConfig::from_env().context("Failed to load configuration")?;

    info!("LED node starting: {}", config.device_type);
    info!(
        "  Broker: {}:{}",
        config.session.broker_host, config.session.broker_port
    );
    info!("  Topic: {}", config.session.topic);

    // Actuator, driven to Off before anything connects
    let pin: Box<dyn OutputPin> = match config.actuator.backend {
        GpioBackend::Log => Box::new(LogPin::new(config.actuator.pin)),
        GpioBackend::Sysfs => Box::new(
            SysfsPin::open(config.actuator.pin).context("Failed to open LED GPIO")?,
        ),
    };
    let polarity = if config.actuator.active_low {
        Polarity::ActiveLow
    } else {
        Polarity::ActiveHigh
    };
    let dispatcher = CommandDispatcher::new(ActuatorDriver::new(pin, polarity));
    info!(
        "LED on GPIO{} ({:?}, {:?} backend)",
        config.actuator.pin, polarity, config.actuator.backend
    );

    let link_driver = HostLink::new(
        format!(
            "{}:{}",
            config.session.broker_host, config.session.broker_port
        ),
        config.link.interface.clone(),
        config.link.hardware_id.clone(),
    );
    let link = LinkManager::new(Box::new(link_driver), config.link.clone());
    let session = SessionManager::new(
        Box::new(MqttSession::new(&config.session)),
        config.session.clone(),
    );

    let mut supervisor = Supervisor::new(
        link,
        session,
        dispatcher,
        config.device_type.clone(),
        config.cycle_interval,
    );

    supervisor
        .bring_up()
        .await
        .context("Link did not come up")?;
    info!("Setup complete!");

    supervisor
        .run(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("Failed to listen for Ctrl-C: {}", e);
                std::future::pending::<()>().await;
            }
        })
        .await;

    info!("LED node stopped");
    Ok(())
}
