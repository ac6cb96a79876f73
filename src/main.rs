use std::sync::Arc;
use std::time::Duration;

use dockprox::docker::DockerDiscovery;
use dockprox::logging::init_logging;
use dockprox::mapping::{MappingResolver, RouteDeriver};
use dockprox::server::{self, ProxyServer};
use dockprox::settings::Settings;
use tracing::{error, info};

#[tokio::main]
async fn main() {
    let settings = match Settings::load().await {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("설정 로드 실패: {}", e);
            std::process::exit(1);
        }
    };

    let _guard = init_logging(&settings.logging);

    if let Err(e) = run(settings).await {
        error!(error = %e, "프록시 실행 실패");
        std::process::exit(1);
    }
}

async fn run(settings: Settings) -> server::Result<()> {
    let network = Some(settings.discovery.network.clone()).filter(|n| !n.is_empty());
    let discovery = Arc::new(DockerDiscovery::connect(network)?);

    let resolver = Arc::new(MappingResolver::new(
        discovery,
        RouteDeriver::new(&settings.discovery),
        Duration::from_millis(settings.discovery.debounce_ms),
    ));
    let table = resolver.shared_table();
    let reconciler = resolver.start().await;

    let mut server = ProxyServer::new(settings, table);
    server.start().await?;

    tokio::signal::ctrl_c().await?;
    info!("종료 신호 수신");

    server.shutdown();
    reconciler.abort();
    Ok(())
}
