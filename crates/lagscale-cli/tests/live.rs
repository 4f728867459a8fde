//! Live-cluster scenario run
//!
//! Needs a cluster with KEDA installed, plus `kubectl` and `helm` on PATH.
//!
//! # Running
//!
//! ```bash
//! LAGSCALE_KUBECONFIG=/path/to/kubeconfig \
//! cargo test -p lagscale-cli --test live -- --ignored --nocapture
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use lagscale_cli::params::BaseNames;
use lagscale_cli::runner::{RunPhase, Runner, RunnerOptions};
use lagscale_cli::scenarios;
use lagscale_common::exec::ShellRunner;
use lagscale_common::kube_utils::{create_client, KubeCluster};

fn kubeconfig() -> Option<PathBuf> {
    std::env::var_os("LAGSCALE_KUBECONFIG").map(PathBuf::from)
}

/// Earliest-policy scenario end to end, in its own suffixed namespace
#[tokio::test]
#[ignore]
async fn test_earliest_policy_on_live_cluster() {
    let kubeconfig = kubeconfig();
    let client = create_client(kubeconfig.as_deref()).await.unwrap();

    let mut commands = ShellRunner::new(Duration::from_secs(120));
    if let Some(path) = &kubeconfig {
        commands = commands.with_kubeconfig(path);
    }

    let names = BaseNames::new(Some("live"));
    let selected = scenarios::select(scenarios::all(&names), &["earliest-policy".to_string()]);
    let mut runner = Runner::new(
        names,
        Arc::new(KubeCluster::new(client)),
        Arc::new(commands),
        RunnerOptions::default(),
    );

    let report = runner.run(&selected).await;
    println!("{}", report);

    assert_eq!(runner.phase(), RunPhase::Done);
    assert!(report.is_success());
}
