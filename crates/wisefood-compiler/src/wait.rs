//! Dependency wait primitives
//!
//! A [`ReadinessCheck`] describes how to tell that a service is up. The same
//! check renders two ways:
//!
//! - as an [`InitStep`]: an init container on a *dependent* workload that
//!   makes one attempt against the dependency and exits non-zero on failure.
//!   The kubelet restarts failed init containers with backoff, so retrying is
//!   left to the orchestrator.
//! - as a [`Probe`] on the workload itself, with orchestrator-native timing.
//!
//! Steps are idempotent: running one again against a ready dependency
//! succeeds again.

use crate::k8s::{Container, ExecAction, HttpGetAction, Probe, TcpSocketAction};

/// Default seconds a single wait attempt may take
pub const DEFAULT_WAIT_TIMEOUT_SECONDS: u32 = 5;

/// How readiness is established
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CheckKind {
    /// TCP handshake succeeds
    Tcp,
    /// HTTP GET returns a success status
    Http,
    /// Command exits with status zero
    Exec,
}

/// A readiness condition for one target
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ReadinessCheck {
    /// TCP handshake against host:port
    Tcp {
        /// Service host
        host: String,
        /// Port
        port: u16,
    },
    /// HTTP GET against host:port/path
    Http {
        /// Service host
        host: String,
        /// Port
        port: u16,
        /// Request path
        path: String,
    },
    /// Command run in a container that has the needed client
    Exec {
        /// Command and arguments
        command: Vec<String>,
    },
}

impl ReadinessCheck {
    /// TCP handshake check
    pub fn tcp(host: impl Into<String>, port: u16) -> Self {
        Self::Tcp {
            host: host.into(),
            port,
        }
    }

    /// HTTP GET check
    pub fn http(host: impl Into<String>, port: u16, path: impl Into<String>) -> Self {
        Self::Http {
            host: host.into(),
            port,
            path: path.into(),
        }
    }

    /// Exit-status check
    pub fn exec<S: Into<String>>(command: impl IntoIterator<Item = S>) -> Self {
        Self::Exec {
            command: command.into_iter().map(Into::into).collect(),
        }
    }

    /// Kind of check
    pub fn kind(&self) -> CheckKind {
        match self {
            Self::Tcp { .. } => CheckKind::Tcp,
            Self::Http { .. } => CheckKind::Http,
            Self::Exec { .. } => CheckKind::Exec,
        }
    }

    /// Render as a probe on the workload itself.
    ///
    /// The kubelet probes the pod's own address, so the host is dropped.
    pub fn probe(&self, timing: ProbeTiming) -> Probe {
        let mut probe = Probe {
            initial_delay_seconds: Some(timing.initial_delay_seconds),
            period_seconds: Some(timing.period_seconds),
            timeout_seconds: Some(timing.timeout_seconds),
            failure_threshold: Some(timing.failure_threshold),
            ..Default::default()
        };
        match self {
            Self::Tcp { port, .. } => probe.tcp_socket = Some(TcpSocketAction { port: *port }),
            Self::Http { port, path, .. } => {
                probe.http_get = Some(HttpGetAction {
                    path: path.clone(),
                    port: *port,
                })
            }
            Self::Exec { command } => {
                probe.exec = Some(ExecAction {
                    command: command.clone(),
                })
            }
        }
        probe
    }
}

/// Orchestrator-native probe timing
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ProbeTiming {
    /// Seconds after container start before the first probe
    pub initial_delay_seconds: u32,
    /// Seconds between probes
    pub period_seconds: u32,
    /// Seconds before a probe attempt times out
    pub timeout_seconds: u32,
    /// Consecutive failures before the container is marked unready
    pub failure_threshold: u32,
}

impl ProbeTiming {
    /// Timing with the given initial delay and defaults for the rest
    pub fn after(initial_delay_seconds: u32) -> Self {
        Self {
            initial_delay_seconds,
            ..Self::default()
        }
    }
}

impl Default for ProbeTiming {
    fn default() -> Self {
        Self {
            initial_delay_seconds: 10,
            period_seconds: 10,
            timeout_seconds: 5,
            failure_threshold: 6,
        }
    }
}

/// Image and timeout for a wait step
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WaitParams {
    /// Image that provides the check's client (`nc`/`wget`, or the command for exec)
    pub image: String,
    /// Seconds one attempt may take
    pub timeout_seconds: u32,
}

impl WaitParams {
    /// Parameters with the default timeout
    pub fn new(image: impl Into<String>) -> Self {
        Self {
            image: image.into(),
            timeout_seconds: DEFAULT_WAIT_TIMEOUT_SECONDS,
        }
    }

    /// Override the per-attempt timeout
    pub fn with_timeout(mut self, timeout_seconds: u32) -> Self {
        self.timeout_seconds = timeout_seconds;
        self
    }
}

/// An ordered start-up pre-condition of a workload
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InitStep {
    /// Dependency name, used for the init container name
    pub target: String,
    /// Readiness condition
    pub check: ReadinessCheck,
    /// Image and timeout
    pub params: WaitParams,
}

/// Build a wait step for `target`
pub fn wait_for(target: impl Into<String>, check: ReadinessCheck, params: &WaitParams) -> InitStep {
    InitStep {
        target: target.into(),
        check,
        params: params.clone(),
    }
}

impl InitStep {
    /// Kind of check this step runs
    pub fn kind(&self) -> CheckKind {
        self.check.kind()
    }

    /// Init container running one attempt of the check
    pub fn container(&self) -> Container {
        let timeout = self.params.timeout_seconds.to_string();
        let command: Vec<String> = match &self.check {
            ReadinessCheck::Tcp { host, port } => vec![
                "nc".to_string(),
                "-z".to_string(),
                "-w".to_string(),
                timeout,
                host.clone(),
                port.to_string(),
            ],
            ReadinessCheck::Http { host, port, path } => vec![
                "wget".to_string(),
                "-q".to_string(),
                "-O".to_string(),
                "/dev/null".to_string(),
                "-T".to_string(),
                timeout,
                format!("http://{}:{}{}", host, port, path),
            ],
            ReadinessCheck::Exec { command } => command.clone(),
        };
        Container::new(format!("wait-for-{}", self.target), &self.params.image).with_command(command)
    }
}

/// Render steps as init containers, preserving order
pub fn init_containers(steps: &[InitStep]) -> Vec<Container> {
    steps.iter().map(InitStep::container).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> WaitParams {
        WaitParams::new("busybox:1.36")
    }

    #[test]
    fn tcp_step_runs_netcat_once() {
        let step = wait_for("redis", ReadinessCheck::tcp("redis", 6379), &params());
        assert_eq!(step.kind(), CheckKind::Tcp);

        let container = step.container();
        assert_eq!(container.name, "wait-for-redis");
        assert_eq!(container.image, "busybox:1.36");
        assert_eq!(
            container.command.unwrap(),
            vec!["nc", "-z", "-w", "5", "redis", "6379"]
        );
    }

    #[test]
    fn http_step_gets_full_url() {
        let step = wait_for(
            "keycloak",
            ReadinessCheck::http("keycloak", 9000, "/health/ready"),
            &params().with_timeout(3),
        );
        let command = step.container().command.unwrap();
        assert_eq!(command[0], "wget");
        assert!(command.contains(&"3".to_string()));
        assert_eq!(command.last().unwrap(), "http://keycloak:9000/health/ready");
    }

    #[test]
    fn exec_step_uses_given_image_and_command() {
        let step = wait_for(
            "postgres",
            ReadinessCheck::exec(["pg_isready", "-h", "postgres", "-p", "5432"]),
            &WaitParams::new("postgres:16"),
        );
        assert_eq!(step.kind(), CheckKind::Exec);
        let container = step.container();
        assert_eq!(container.image, "postgres:16");
        assert_eq!(container.command.unwrap()[0], "pg_isready");
    }

    #[test]
    fn probe_carries_timing_and_drops_host() {
        let timing = ProbeTiming {
            initial_delay_seconds: 30,
            period_seconds: 15,
            timeout_seconds: 3,
            failure_threshold: 10,
        };
        let probe = ReadinessCheck::http("keycloak", 9000, "/health/ready").probe(timing);

        let http = probe.http_get.unwrap();
        assert_eq!(http.port, 9000);
        assert_eq!(http.path, "/health/ready");
        assert_eq!(probe.initial_delay_seconds, Some(30));
        assert_eq!(probe.period_seconds, Some(15));
        assert_eq!(probe.timeout_seconds, Some(3));
        assert_eq!(probe.failure_threshold, Some(10));
        assert!(probe.tcp_socket.is_none());
    }

    #[test]
    fn init_containers_keep_step_order() {
        let steps = vec![
            wait_for("postgres", ReadinessCheck::tcp("postgres", 5432), &params()),
            wait_for("keycloak", ReadinessCheck::tcp("keycloak", 8080), &params()),
        ];
        let names: Vec<_> = init_containers(&steps).into_iter().map(|c| c.name).collect();
        assert_eq!(names, vec!["wait-for-postgres", "wait-for-keycloak"]);
    }
}
