use std::path::Path;
use std::time::Instant;

use time::format_description::well_known::Rfc3339;
use tracing::{error, info, warn, Level};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::EnvFilter;

use crate::settings::{LogFormat, LogOutput, LogSettings};

/// 설정에 따라 전역 tracing 구독자를 설치합니다.
///
/// 반환된 가드는 프로세스가 끝날 때까지 유지해야 버퍼된 로그가 유실되지 않습니다.
pub fn init_logging(settings: &LogSettings) -> WorkerGuard {
    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::from_level(settings.level).into())
        .from_env_lossy();

    let (writer, guard) = match &settings.output {
        LogOutput::Stdout => tracing_appender::non_blocking(std::io::stdout()),
        LogOutput::File(path) => {
            let path = Path::new(path);
            let directory = path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or(Path::new("."));
            let file_name = path.file_name().unwrap_or(path.as_os_str());
            tracing_appender::non_blocking(tracing_appender::rolling::daily(directory, file_name))
        }
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_timer(UtcTime::new(Rfc3339))
        .with_target(true);

    let result = match settings.format {
        LogFormat::Json => builder.json().try_init(),
        LogFormat::Text => builder.try_init(),
    };
    if let Err(e) = result {
        eprintln!("로깅 초기화 실패: {}", e);
    }

    guard
}

/// 요청 하나의 처리 결과를 모아 마지막에 한 번 기록합니다.
#[derive(Debug)]
pub struct RequestLog {
    pub request_id: String,
    pub method: String,
    pub url: String,
    pub target: Option<String>,
    pub status_code: u16,
    pub error: Option<String>,
    started: Instant,
}

impl RequestLog {
    pub fn new(request_id: String, method: &hyper::Method, url: String) -> Self {
        Self {
            request_id,
            method: method.to_string(),
            url,
            target: None,
            status_code: 0,
            error: None,
            started: Instant::now(),
        }
    }

    pub fn with_target(&mut self, target: impl Into<String>) {
        self.target = Some(target.into());
    }

    pub fn with_response(&mut self, status: hyper::StatusCode) {
        self.status_code = status.as_u16();
    }

    pub fn with_error(&mut self, error: impl std::fmt::Display) {
        self.error = Some(error.to_string());
    }

    pub fn duration_ms(&self) -> u64 {
        self.started.elapsed().as_millis() as u64
    }
}

pub fn log_request(log: &RequestLog) {
    let level = if log.error.is_some() {
        Level::ERROR
    } else if log.status_code >= 400 {
        Level::WARN
    } else {
        Level::INFO
    };

    match level {
        Level::ERROR => error!(
            request_id = %log.request_id,
            method = %log.method,
            url = %log.url,
            target = ?log.target,
            status = log.status_code,
            duration_ms = log.duration_ms(),
            error = ?log.error,
            "요청 실패"
        ),
        Level::WARN => warn!(
            request_id = %log.request_id,
            method = %log.method,
            url = %log.url,
            target = ?log.target,
            status = log.status_code,
            duration_ms = log.duration_ms(),
            "요청 완료 (오류 응답)"
        ),
        _ => info!(
            request_id = %log.request_id,
            method = %log.method,
            url = %log.url,
            target = ?log.target,
            status = log.status_code,
            duration_ms = log.duration_ms(),
            "요청 완료"
        ),
    }
}
