//! 플러그인 시스템 — 모듈 등록 및 생명주기 관리
//!
//! [`Plugin`] trait은 데몬이 관리하는 모든 모듈의 공통 생명주기를
//! 정의합니다. [`PluginRegistry`]는 등록 순서를 보존하며 일괄
//! init/start/stop/health_check를 수행합니다.
//!
//! # 생명주기
//! ```text
//! Created → init() → Initialized → start() → Running → stop() → Stopped
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{PluginError, ScorewatchError};
use crate::pipeline::{BoxFuture, HealthStatus};

// ─── PluginType ──────────────────────────────────────────────────────

/// 플러그인 유형
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PluginType {
    /// 로그 인제스트 파이프라인
    Ingest,
    /// 사용자 정의 플러그인
    Custom(String),
}

impl fmt::Display for PluginType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ingest => write!(f, "ingest"),
            Self::Custom(name) => write!(f, "custom:{name}"),
        }
    }
}

// ─── PluginInfo ──────────────────────────────────────────────────────

/// 플러그인 메타데이터
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginInfo {
    /// 플러그인 고유 이름 (예: `"ingest"`)
    pub name: String,
    /// 플러그인 버전 (semver)
    pub version: String,
    /// 플러그인 설명
    pub description: String,
    /// 플러그인 유형
    pub plugin_type: PluginType,
}

// ─── PluginState ─────────────────────────────────────────────────────

/// 플러그인 생명주기 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PluginState {
    /// 생성됨 (init 전)
    Created,
    /// 초기화 완료 (start 가능)
    Initialized,
    /// 실행 중
    Running,
    /// 정지됨
    Stopped,
    /// 오류 상태
    Failed,
}

impl fmt::Display for PluginState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Created => write!(f, "created"),
            Self::Initialized => write!(f, "initialized"),
            Self::Running => write!(f, "running"),
            Self::Stopped => write!(f, "stopped"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

// ─── Plugin Trait ────────────────────────────────────────────────────

/// 데몬이 관리하는 모듈이 구현하는 trait
///
/// RPITIT를 사용하므로 `dyn Plugin`은 불가합니다. 동적 관리가 필요하면
/// 자동 구현되는 [`DynPlugin`]을 사용하세요.
pub trait Plugin: Send + Sync {
    /// 플러그인 메타데이터를 반환합니다.
    fn info(&self) -> &PluginInfo;

    /// 현재 플러그인 상태를 반환합니다.
    fn state(&self) -> PluginState;

    /// 플러그인을 초기화합니다. `Created` 상태에서만 호출 가능합니다.
    fn init(&mut self) -> impl Future<Output = Result<(), ScorewatchError>> + Send;

    /// 플러그인을 시작합니다. `Initialized` 또는 `Stopped` 상태에서 호출합니다.
    fn start(&mut self) -> impl Future<Output = Result<(), ScorewatchError>> + Send;

    /// 플러그인을 정지합니다. Graceful shutdown을 수행합니다.
    fn stop(&mut self) -> impl Future<Output = Result<(), ScorewatchError>> + Send;

    /// 플러그인의 건강 상태를 확인합니다.
    fn health_check(&self) -> impl Future<Output = HealthStatus> + Send;
}

// ─── DynPlugin Trait ─────────────────────────────────────────────────

/// dyn-compatible 플러그인 trait
///
/// `BoxFuture`를 반환하여 `Vec<Box<dyn DynPlugin>>` 관리를 가능하게 합니다.
pub trait DynPlugin: Send + Sync {
    /// 플러그인 메타데이터를 반환합니다.
    fn info(&self) -> &PluginInfo;

    /// 현재 플러그인 상태를 반환합니다.
    fn state(&self) -> PluginState;

    /// 플러그인을 초기화합니다.
    fn init(&mut self) -> BoxFuture<'_, Result<(), ScorewatchError>>;

    /// 플러그인을 시작합니다.
    fn start(&mut self) -> BoxFuture<'_, Result<(), ScorewatchError>>;

    /// 플러그인을 정지합니다.
    fn stop(&mut self) -> BoxFuture<'_, Result<(), ScorewatchError>>;

    /// 플러그인의 건강 상태를 확인합니다.
    fn health_check(&self) -> BoxFuture<'_, HealthStatus>;
}

/// Plugin을 구현한 타입은 자동으로 DynPlugin도 구현됩니다.
impl<T: Plugin> DynPlugin for T {
    fn info(&self) -> &PluginInfo {
        Plugin::info(self)
    }

    fn state(&self) -> PluginState {
        Plugin::state(self)
    }

    fn init(&mut self) -> BoxFuture<'_, Result<(), ScorewatchError>> {
        Box::pin(Plugin::init(self))
    }

    fn start(&mut self) -> BoxFuture<'_, Result<(), ScorewatchError>> {
        Box::pin(Plugin::start(self))
    }

    fn stop(&mut self) -> BoxFuture<'_, Result<(), ScorewatchError>> {
        Box::pin(Plugin::stop(self))
    }

    fn health_check(&self) -> BoxFuture<'_, HealthStatus> {
        Box::pin(Plugin::health_check(self))
    }
}

// ─── PluginRegistry ──────────────────────────────────────────────────

/// 플러그인 레지스트리
///
/// 등록 순서가 보존됩니다. 생산자를 먼저 등록하고 소비자를 나중에
/// 등록하면 정지 시 소비자가 잔여 이벤트를 드레인할 수 있습니다.
pub struct PluginRegistry {
    plugins: Vec<Box<dyn DynPlugin>>,
}

impl PluginRegistry {
    /// 빈 레지스트리를 생성합니다.
    pub fn new() -> Self {
        Self {
            plugins: Vec::new(),
        }
    }

    /// 플러그인을 등록합니다. 이름 중복 시 에러를 반환합니다.
    pub fn register(&mut self, plugin: Box<dyn DynPlugin>) -> Result<(), ScorewatchError> {
        let name = plugin.info().name.clone();
        if self.plugins.iter().any(|p| p.info().name == name) {
            return Err(PluginError::AlreadyRegistered { name }.into());
        }
        self.plugins.push(plugin);
        Ok(())
    }

    /// 이름으로 플러그인을 조회합니다.
    pub fn get(&self, name: &str) -> Option<&dyn DynPlugin> {
        self.plugins
            .iter()
            .find(|p| p.info().name == name)
            .map(|p| p.as_ref())
    }

    /// 모든 플러그인을 등록 순서대로 초기화합니다 (fail-fast).
    pub async fn init_all(&mut self) -> Result<(), ScorewatchError> {
        for plugin in &mut self.plugins {
            plugin.init().await?;
        }
        Ok(())
    }

    /// 모든 플러그인을 등록 순서대로 시작합니다 (fail-fast).
    ///
    /// 이미 시작된 플러그인은 롤백하지 않으므로, 실패 시 호출자가
    /// `stop_all`을 호출해야 합니다.
    pub async fn start_all(&mut self) -> Result<(), ScorewatchError> {
        for plugin in &mut self.plugins {
            plugin.start().await?;
        }
        Ok(())
    }

    /// 모든 플러그인을 등록 순서대로 정지합니다.
    ///
    /// 개별 정지 실패 시에도 나머지 플러그인의 정지를 계속하며,
    /// 모든 에러를 수집하여 반환합니다.
    pub async fn stop_all(&mut self) -> Result<(), ScorewatchError> {
        let mut errors = Vec::new();
        for plugin in &mut self.plugins {
            if let Err(e) = plugin.stop().await {
                errors.push(format!("{}: {}", plugin.info().name, e));
            }
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(PluginError::StopFailed(errors.join("; ")).into())
        }
    }

    /// 등록된 플러그인 수를 반환합니다.
    pub fn count(&self) -> usize {
        self.plugins.len()
    }

    /// 등록된 모든 플러그인의 정보를 반환합니다.
    pub fn list(&self) -> Vec<&PluginInfo> {
        self.plugins.iter().map(|p| p.info()).collect()
    }

    /// 모든 플러그인의 건강 상태를 조회합니다.
    pub async fn health_check_all(&self) -> Vec<(String, PluginState, HealthStatus)> {
        let mut statuses = Vec::new();
        for plugin in &self.plugins {
            let name = plugin.info().name.clone();
            let state = plugin.state();
            let health = plugin.health_check().await;
            statuses.push((name, state, health));
        }
        statuses
    }
}

impl Default for PluginRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// ─── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PipelineError;

    struct MockPlugin {
        info: PluginInfo,
        state: PluginState,
        fail_on_stop: bool,
    }

    impl MockPlugin {
        fn new(name: &str) -> Self {
            Self {
                info: PluginInfo {
                    name: name.to_owned(),
                    version: "0.1.0".to_owned(),
                    description: format!("mock plugin: {name}"),
                    plugin_type: PluginType::Ingest,
                },
                state: PluginState::Created,
                fail_on_stop: false,
            }
        }

        fn failing_stop(mut self) -> Self {
            self.fail_on_stop = true;
            self
        }
    }

    impl Plugin for MockPlugin {
        fn info(&self) -> &PluginInfo {
            &self.info
        }

        fn state(&self) -> PluginState {
            self.state
        }

        async fn init(&mut self) -> Result<(), ScorewatchError> {
            self.state = PluginState::Initialized;
            Ok(())
        }

        async fn start(&mut self) -> Result<(), ScorewatchError> {
            self.state = PluginState::Running;
            Ok(())
        }

        async fn stop(&mut self) -> Result<(), ScorewatchError> {
            if self.fail_on_stop {
                self.state = PluginState::Failed;
                return Err(PipelineError::ShutdownFailed("mock stop failure".to_owned()).into());
            }
            self.state = PluginState::Stopped;
            Ok(())
        }

        async fn health_check(&self) -> HealthStatus {
            match self.state {
                PluginState::Running => HealthStatus::Healthy,
                PluginState::Failed => HealthStatus::Unhealthy("failed".to_owned()),
                _ => HealthStatus::Degraded("not running".to_owned()),
            }
        }
    }

    #[test]
    fn plugin_type_display() {
        assert_eq!(PluginType::Ingest.to_string(), "ingest");
        assert_eq!(
            PluginType::Custom("replay-audit".to_owned()).to_string(),
            "custom:replay-audit"
        );
    }

    #[test]
    fn plugin_state_display() {
        assert_eq!(PluginState::Created.to_string(), "created");
        assert_eq!(PluginState::Running.to_string(), "running");
        assert_eq!(PluginState::Failed.to_string(), "failed");
    }

    #[tokio::test]
    async fn plugin_lifecycle_init_start_stop() {
        let mut plugin = MockPlugin::new("test");
        assert_eq!(Plugin::state(&plugin), PluginState::Created);

        Plugin::init(&mut plugin).await.unwrap();
        assert_eq!(Plugin::state(&plugin), PluginState::Initialized);

        Plugin::start(&mut plugin).await.unwrap();
        assert_eq!(Plugin::state(&plugin), PluginState::Running);

        Plugin::stop(&mut plugin).await.unwrap();
        assert_eq!(Plugin::state(&plugin), PluginState::Stopped);
    }

    #[tokio::test]
    async fn dyn_plugin_can_be_boxed() {
        let mut plugin: Box<dyn DynPlugin> = Box::new(MockPlugin::new("boxed"));
        plugin.init().await.unwrap();
        plugin.start().await.unwrap();
        assert!(plugin.health_check().await.is_healthy());
        plugin.stop().await.unwrap();
        assert_eq!(plugin.state(), PluginState::Stopped);
    }

    #[test]
    fn registry_register_duplicate_name_fails() {
        let mut registry = PluginRegistry::new();
        registry
            .register(Box::new(MockPlugin::new("dup")))
            .unwrap();
        let err = registry
            .register(Box::new(MockPlugin::new("dup")))
            .unwrap_err();
        assert!(err.to_string().contains("already registered"));
        assert_eq!(registry.count(), 1);
    }

    #[tokio::test]
    async fn registry_full_lifecycle() {
        let mut registry = PluginRegistry::new();
        registry
            .register(Box::new(MockPlugin::new("ingest")))
            .unwrap();

        registry.init_all().await.unwrap();
        registry.start_all().await.unwrap();

        let statuses = registry.health_check_all().await;
        assert_eq!(statuses.len(), 1);
        assert!(statuses[0].2.is_healthy());

        registry.stop_all().await.unwrap();
        assert_eq!(
            registry.get("ingest").unwrap().state(),
            PluginState::Stopped
        );
    }

    #[tokio::test]
    async fn registry_stop_all_continues_on_error() {
        let mut registry = PluginRegistry::new();
        registry
            .register(Box::new(MockPlugin::new("fail").failing_stop()))
            .unwrap();
        registry
            .register(Box::new(MockPlugin::new("ok")))
            .unwrap();

        registry.init_all().await.unwrap();
        registry.start_all().await.unwrap();

        let result = registry.stop_all().await;
        assert!(result.is_err());
        assert_eq!(registry.get("ok").unwrap().state(), PluginState::Stopped);
    }

    #[test]
    fn registry_preserves_registration_order() {
        let mut registry = PluginRegistry::new();
        for name in ["alpha", "beta", "gamma"] {
            registry.register(Box::new(MockPlugin::new(name))).unwrap();
        }
        let list: Vec<&str> = registry.list().iter().map(|i| i.name.as_str()).collect();
        assert_eq!(list, vec!["alpha", "beta", "gamma"]);
    }
}
