use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use async_trait::async_trait;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, error, info, instrument, warn};

use crate::discovery::{
    with_retry, DiscoveryError, DiscoveryEvent, RetryPolicy, RetryableOperation, ServiceDescriptor,
    ServiceDiscovery,
};
use crate::mapping::RouteDeriver;
use crate::routing::RoutingTable;

/// 연결 핸들러들이 공유하는 라우팅 테이블 슬롯. 읽기 경로에 락이 없습니다.
pub type SharedRoutingTable = Arc<ArcSwap<RoutingTable>>;

const CHANGE_CHANNEL_SIZE: usize = 16;

/// 서비스 탐색 결과로부터 라우팅 테이블을 계산하고, 의미 있는 변경만 게시합니다.
pub struct MappingResolver {
    discovery: Arc<dyn ServiceDiscovery>,
    deriver: RouteDeriver,
    debounce: Duration,
    retry: RetryPolicy,
    table: SharedRoutingTable,
    changes: broadcast::Sender<Arc<RoutingTable>>,
}

struct ResolveOperation<'a> {
    resolver: &'a MappingResolver,
}

#[async_trait]
impl<'a> RetryableOperation for ResolveOperation<'a> {
    type Output = RoutingTable;

    async fn execute(&self) -> Result<Self::Output, DiscoveryError> {
        self.resolver.resolve().await
    }
}

impl MappingResolver {
    pub fn new(discovery: Arc<dyn ServiceDiscovery>, deriver: RouteDeriver, debounce: Duration) -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_SIZE);
        Self {
            discovery,
            deriver,
            debounce,
            retry: RetryPolicy::default(),
            table: Arc::new(ArcSwap::from_pointee(RoutingTable::default())),
            changes,
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// 프록시 엔진에 주입할 테이블 핸들
    pub fn shared_table(&self) -> SharedRoutingTable {
        self.table.clone()
    }

    pub fn current_table(&self) -> Arc<RoutingTable> {
        self.table.load_full()
    }

    /// 게시되는 새 테이블을 구독합니다. 실제 내용이 바뀐 경우에만 알림이 옵니다.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<RoutingTable>> {
        self.changes.subscribe()
    }

    /// 전체 서비스 목록에서 테이블을 새로 계산합니다. 게시하지 않습니다.
    pub async fn resolve(&self) -> Result<RoutingTable, DiscoveryError> {
        let services = self.discovery.list_services().await?;
        Ok(self.build_table(&services))
    }

    pub fn build_table(&self, services: &[ServiceDescriptor]) -> RoutingTable {
        services
            .iter()
            .flat_map(|service| match self.deriver.derive(service) {
                Ok(rules) => rules,
                Err(e) => {
                    warn!(error = %e, service_id = %service.id, "라우트 도출 실패, 규칙 제외");
                    Vec::new()
                }
            })
            .collect()
    }

    /// 테이블을 재계산하고 이전 테이블과 다를 때만 교체 후 알립니다.
    #[instrument(skip(self), level = "debug")]
    pub async fn reconcile(&self) -> bool {
        match self.resolve().await {
            Ok(table) => {
                if *self.table.load_full() == table {
                    debug!(route_count = table.len(), "라우팅 테이블 변경 없음");
                    false
                } else {
                    self.publish(table);
                    true
                }
            }
            Err(e) => {
                error!(error = %e, "라우팅 테이블 재계산 실패, 이전 테이블 유지");
                false
            }
        }
    }

    /// 시작 시 초기 테이블을 계산해 게시합니다. 재시도 후에도 실패하면 빈 테이블을 유지합니다.
    pub async fn initialize(&self) {
        match with_retry(ResolveOperation { resolver: self }, self.retry.clone()).await {
            Ok(table) => self.publish(table),
            Err(e) => error!(error = %e, "초기 라우팅 테이블 계산 실패, 빈 테이블로 시작"),
        }
    }

    fn publish(&self, table: RoutingTable) {
        let table = Arc::new(table);
        self.table.store(table.clone());
        info!(route_count = table.len(), "Mapping: {}", table);
        for rule in table.rules() {
            debug!("{}", rule);
        }
        // 구독자가 없으면 실패하지만 게시 자체는 끝난 상태
        let _ = self.changes.send(table);
    }

    /// 이벤트를 구독하고 초기 테이블을 게시한 뒤, 조정 루프를 백그라운드에서 실행합니다.
    ///
    /// 구독을 먼저 열어 초기 조회와 구독 사이의 이벤트를 놓치지 않습니다.
    pub async fn start(self: Arc<Self>) -> JoinHandle<()> {
        let events = match self.discovery.subscribe().await {
            Ok(events) => Some(events),
            Err(e) => {
                error!(error = %e, "서비스 이벤트 구독 실패");
                None
            }
        };
        self.initialize().await;
        tokio::spawn(async move { self.run(events).await })
    }

    async fn run(&self, mut events: Option<mpsc::Receiver<DiscoveryEvent>>) {
        loop {
            let mut rx = match events.take() {
                Some(rx) => rx,
                None => {
                    sleep(self.retry.interval).await;
                    match self.discovery.subscribe().await {
                        Ok(rx) => {
                            info!("서비스 이벤트 재구독");
                            // 끊긴 동안 놓친 변경 반영
                            self.reconcile().await;
                            rx
                        }
                        Err(e) => {
                            error!(error = %e, "서비스 이벤트 재구독 실패");
                            continue;
                        }
                    }
                }
            };
            self.debounce_events(&mut rx).await;
            warn!("서비스 이벤트 스트림 종료");
        }
    }

    /// 이벤트가 조용해질 때까지 기다렸다가 한 번만 재계산합니다. 채널이 닫히면 반환합니다.
    pub async fn debounce_events(&self, events: &mut mpsc::Receiver<DiscoveryEvent>) {
        loop {
            match events.recv().await {
                None => return,
                Some(event) => {
                    if !Self::observe(event) {
                        continue;
                    }
                }
            }

            let mut closed = false;
            loop {
                tokio::select! {
                    event = events.recv() => match event {
                        // 새 이벤트마다 대기 시간을 다시 시작
                        Some(event) => { Self::observe(event); }
                        None => { closed = true; break; }
                    },
                    _ = sleep(self.debounce) => break,
                }
            }

            self.reconcile().await;
            if closed {
                return;
            }
        }
    }

    fn observe(event: DiscoveryEvent) -> bool {
        match event {
            Ok(change) => {
                debug!(service_id = %change.service_id, action = %change.action, "서비스 변경 감지");
                true
            }
            Err(e) => {
                error!(error = %e, "서비스 이벤트 수신 오류");
                false
            }
        }
    }
}
