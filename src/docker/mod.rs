//! bollard 기반 Docker 서비스 탐색 어댑터입니다.

use std::collections::HashMap;

use async_trait::async_trait;
use bollard::container::{InspectContainerOptions, ListContainersOptions};
use bollard::models::{ContainerInspectResponse, EventMessage};
use bollard::system::EventsOptions;
use bollard::Docker;
use futures_util::stream::StreamExt;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::discovery::{
    DiscoveryError, DiscoveryEvent, ServiceChange, ServiceDescriptor, ServiceDiscovery,
};

const EVENT_CHANNEL_SIZE: usize = 64;

pub struct DockerDiscovery {
    docker: Docker,
    /// 백엔드 주소를 우선적으로 가져올 네트워크 이름
    network: Option<String>,
}

impl DockerDiscovery {
    /// 로컬 기본 설정(소켓 또는 DOCKER_HOST)으로 Docker 데몬에 연결합니다.
    pub fn connect(network: Option<String>) -> Result<Self, DiscoveryError> {
        let docker = Docker::connect_with_local_defaults().map_err(|e| DiscoveryError::Connection {
            source: e,
            context: "로컬 Docker 데몬".to_string(),
        })?;
        Ok(Self::new(docker, network))
    }

    pub fn new(docker: Docker, network: Option<String>) -> Self {
        Self {
            docker,
            network: network.filter(|n| !n.is_empty()),
        }
    }

    fn create_event_filters() -> HashMap<String, Vec<String>> {
        let mut filters = HashMap::new();
        filters.insert("type".to_string(), vec!["container".to_string()]);
        filters.insert(
            "event".to_string(),
            ["start", "stop", "die", "destroy", "update", "rename"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        );
        filters
    }

    fn to_change(event: &EventMessage) -> ServiceChange {
        ServiceChange {
            service_id: event
                .actor
                .as_ref()
                .and_then(|actor| actor.id.clone())
                .unwrap_or_else(|| "unknown".to_string()),
            action: event.action.clone().unwrap_or_else(|| "unknown".to_string()),
        }
    }
}

/// inspect 응답을 정규화된 서비스 기술자로 변환합니다.
pub fn descriptor_from_inspect(
    container: ContainerInspectResponse,
    preferred_network: Option<&str>,
) -> ServiceDescriptor {
    let config = container.config.unwrap_or_default();

    let mut networks: Vec<(String, String)> = container
        .network_settings
        .and_then(|settings| settings.networks)
        .unwrap_or_default()
        .into_iter()
        .filter_map(|(name, endpoint)| {
            endpoint
                .ip_address
                .filter(|ip| !ip.is_empty())
                .map(|ip| (name, ip))
        })
        .collect();

    // 선호 네트워크가 맨 앞, 나머지는 이름순
    networks.sort_by(|(a, _), (b, _)| {
        let a_pref = Some(a.as_str()) != preferred_network;
        let b_pref = Some(b.as_str()) != preferred_network;
        a_pref.cmp(&b_pref).then_with(|| a.cmp(b))
    });

    ServiceDescriptor {
        id: container.id.unwrap_or_default(),
        name: container.name.unwrap_or_default(),
        labels: config.labels.unwrap_or_default(),
        addresses: networks.into_iter().map(|(_, ip)| ip).collect(),
        domain: config.domainname.filter(|d| !d.is_empty()),
    }
}

#[async_trait]
impl ServiceDiscovery for DockerDiscovery {
    async fn list_services(&self) -> Result<Vec<ServiceDescriptor>, DiscoveryError> {
        let options = Some(ListContainersOptions::<String> {
            all: false,
            ..Default::default()
        });

        let containers = self.docker.list_containers(options).await.map_err(|e| {
            DiscoveryError::ListServices {
                source: e,
                context: "실행 중인 컨테이너 조회".to_string(),
            }
        })?;
        debug!(count = containers.len(), "컨테이너 목록 조회 성공");

        let mut services = Vec::with_capacity(containers.len());
        for summary in containers {
            let Some(id) = summary.id else { continue };
            match self
                .docker
                .inspect_container(&id, None::<InspectContainerOptions>)
                .await
            {
                Ok(container) => {
                    services.push(descriptor_from_inspect(container, self.network.as_deref()));
                }
                // 목록 조회와 inspect 사이에 사라진 컨테이너
                Err(bollard::errors::Error::DockerResponseServerError { status_code: 404, .. }) => {
                    debug!(container_id = %id, "inspect 중 컨테이너가 사라짐");
                }
                Err(e) => {
                    warn!(
                        error = %DiscoveryError::InspectService { service_id: id.clone(), source: e },
                        container_id = %id,
                        "컨테이너 상세 조회 실패, 건너뜀"
                    );
                }
            }
        }

        Ok(services)
    }

    async fn subscribe(&self) -> Result<mpsc::Receiver<DiscoveryEvent>, DiscoveryError> {
        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_SIZE);
        let docker = self.docker.clone();

        tokio::spawn(async move {
            let options = EventsOptions::<String> {
                filters: DockerDiscovery::create_event_filters(),
                ..Default::default()
            };
            let mut events = Box::pin(docker.events(Some(options)));

            while let Some(event) = events.next().await {
                let message = match event {
                    Ok(event) => {
                        let change = DockerDiscovery::to_change(&event);
                        debug!(
                            container_id = %change.service_id,
                            action = %change.action,
                            "컨테이너 이벤트 수신"
                        );
                        Ok(change)
                    }
                    Err(e) => Err(DiscoveryError::EventStream { source: e }),
                };
                if tx.send(message).await.is_err() {
                    debug!("이벤트 수신자가 종료됨");
                    return;
                }
            }
            info!("Docker 이벤트 스트림 종료");
        });

        Ok(rx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bollard::models::{ContainerConfig, EndpointSettings, NetworkSettings};

    fn inspect(networks: &[(&str, &str)]) -> ContainerInspectResponse {
        ContainerInspectResponse {
            id: Some("abc123".to_string()),
            name: Some("/web".to_string()),
            config: Some(ContainerConfig {
                labels: Some(HashMap::from([(
                    "dockprox.host".to_string(),
                    "web.test".to_string(),
                )])),
                domainname: Some(String::new()),
                ..Default::default()
            }),
            network_settings: Some(NetworkSettings {
                networks: Some(
                    networks
                        .iter()
                        .map(|(name, ip)| {
                            (
                                name.to_string(),
                                EndpointSettings {
                                    ip_address: Some(ip.to_string()),
                                    ..Default::default()
                                },
                            )
                        })
                        .collect(),
                ),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    #[test]
    fn preferred_network_comes_first() {
        let container = inspect(&[("a_net", "10.0.0.2"), ("proxy", "172.18.0.5")]);
        let descriptor = descriptor_from_inspect(container, Some("proxy"));
        assert_eq!(descriptor.addresses, vec!["172.18.0.5", "10.0.0.2"]);
        assert_eq!(descriptor.name, "/web");
        assert_eq!(descriptor.domain, None);
    }

    #[test]
    fn networks_sorted_by_name_without_preference() {
        let container = inspect(&[("zeta", "10.0.0.9"), ("alpha", "10.0.0.1"), ("empty", "")]);
        let descriptor = descriptor_from_inspect(container, None);
        assert_eq!(descriptor.addresses, vec!["10.0.0.1", "10.0.0.9"]);
    }
}
