// Copyright 2025 RustFS Team
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use clap::Args;
use std::time::Duration;

/// Controller tuning, from flags or the environment.
#[derive(Args, Clone, Debug)]
pub struct OperatorConfig {
    /// Upper bound on a single readiness wait
    #[arg(long, env = "WORKSHOP_READINESS_TIMEOUT", default_value_t = 420, value_name = "SECONDS")]
    pub readiness_timeout: u64,

    /// Poll interval used alongside the readiness watch
    #[arg(long, env = "WORKSHOP_READINESS_POLL", default_value_t = 5, value_name = "SECONDS")]
    pub readiness_poll: u64,

    /// Requeue delay when a dependency is not ready yet
    #[arg(long, env = "WORKSHOP_NOT_READY_REQUEUE", default_value_t = 15, value_name = "SECONDS")]
    pub not_ready_requeue: u64,

    /// Requeue delay after a transient API or HTTP failure
    #[arg(long, env = "WORKSHOP_TRANSIENT_REQUEUE", default_value_t = 10, value_name = "SECONDS")]
    pub transient_requeue: u64,

    /// Resync interval once everything has converged
    #[arg(long, env = "WORKSHOP_RESYNC_INTERVAL", default_value_t = 600, value_name = "SECONDS")]
    pub resync_interval: u64,

    /// First backoff delay after a fatal reconcile error
    #[arg(long, env = "WORKSHOP_ERROR_BACKOFF", default_value_t = 5, value_name = "SECONDS")]
    pub error_backoff: u64,

    /// Cap on the fatal error backoff
    #[arg(long, env = "WORKSHOP_ERROR_BACKOFF_MAX", default_value_t = 300, value_name = "SECONDS")]
    pub error_backoff_max: u64,

    /// Timeout for each bootstrap HTTP call
    #[arg(long, env = "WORKSHOP_HTTP_TIMEOUT", default_value_t = 30, value_name = "SECONDS")]
    pub http_timeout: u64,

    /// Accept self-signed certificates on workshop routes
    #[arg(long, env = "WORKSHOP_INSECURE_ROUTES", default_value_t = false)]
    pub insecure_routes: bool,

    /// Attempts for a conditional write that keeps hitting conflicts
    #[arg(long, env = "WORKSHOP_CONFLICT_RETRIES", default_value_t = 5)]
    pub conflict_retries: u32,

    /// Log lines collected from a pod that failed its readiness wait
    #[arg(long, env = "WORKSHOP_LOG_TAIL_LINES", default_value_t = 20)]
    pub log_tail_lines: i64,
}

impl OperatorConfig {
    pub fn settings(&self) -> Settings {
        Settings {
            readiness_timeout: Duration::from_secs(self.readiness_timeout),
            readiness_poll: Duration::from_secs(self.readiness_poll.max(1)),
            not_ready_requeue: Duration::from_secs(self.not_ready_requeue),
            transient_requeue: Duration::from_secs(self.transient_requeue),
            resync_interval: Duration::from_secs(self.resync_interval),
            error_backoff: Duration::from_secs(self.error_backoff),
            error_backoff_max: Duration::from_secs(self.error_backoff_max),
            http_timeout: Duration::from_secs(self.http_timeout),
            insecure_routes: self.insecure_routes,
            conflict_retries: self.conflict_retries.max(1),
            log_tail_lines: self.log_tail_lines,
        }
    }
}

/// Runtime form of [`OperatorConfig`].
#[derive(Clone, Debug, PartialEq)]
pub struct Settings {
    pub readiness_timeout: Duration,
    pub readiness_poll: Duration,
    pub not_ready_requeue: Duration,
    pub transient_requeue: Duration,
    pub resync_interval: Duration,
    pub error_backoff: Duration,
    pub error_backoff_max: Duration,
    pub http_timeout: Duration,
    pub insecure_routes: bool,
    pub conflict_retries: u32,
    pub log_tail_lines: i64,
}

impl Settings {
    /// Delay before the next attempt after `failures` consecutive fatal errors.
    pub fn error_backoff_for(&self, failures: u32) -> Duration {
        let factor = 2u32.saturating_pow(failures.saturating_sub(1));
        self.error_backoff
            .saturating_mul(factor)
            .min(self.error_backoff_max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct Cli {
        #[command(flatten)]
        config: OperatorConfig,
    }

    #[test]
    fn test_defaults() {
        let cli = Cli::parse_from(["workshop-operator"]);
        let settings = cli.config.settings();
        assert_eq!(settings.readiness_timeout, Duration::from_secs(420));
        assert_eq!(settings.resync_interval, Duration::from_secs(600));
        assert_eq!(settings.conflict_retries, 5);
        assert!(!settings.insecure_routes);
    }

    #[test]
    fn test_flags_override_defaults() {
        let cli = Cli::parse_from([
            "workshop-operator",
            "--readiness-timeout",
            "60",
            "--insecure-routes",
        ]);
        let settings = cli.config.settings();
        assert_eq!(settings.readiness_timeout, Duration::from_secs(60));
        assert!(settings.insecure_routes);
    }

    #[test]
    fn test_error_backoff_doubles_up_to_cap() {
        let settings = Cli::parse_from(["workshop-operator"]).config.settings();
        assert_eq!(settings.error_backoff_for(1), Duration::from_secs(5));
        assert_eq!(settings.error_backoff_for(2), Duration::from_secs(10));
        assert_eq!(settings.error_backoff_for(4), Duration::from_secs(40));
        assert_eq!(settings.error_backoff_for(20), Duration::from_secs(300));
        assert_eq!(settings.error_backoff_for(64), Duration::from_secs(300));
    }
}
